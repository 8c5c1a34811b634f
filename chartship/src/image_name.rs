//! Validation for image repositories and tags, following the grammar of
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```text
//! name             := [domain '/'] path-component ['/' path-component]*
//! domain           := domain-component ['.' domain-component]* [':' port-number]
//! domain-component := /([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])/
//! path-component   := alpha-numeric [separator alpha-numeric]*
//! tag              := /[\w][\w.-]{0,127}/
//! ```

use std::{fmt, sync::LazyLock};

use regex::Regex;

static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*(?::[0-9]+)?$").unwrap()
});

static PATH_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").unwrap());

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").unwrap());

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidImageName(String);

impl std::error::Error for InvalidImageName {}

impl fmt::Display for InvalidImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid image repository: {:?}", self.0)
    }
}

/// An image repository such as `gcr.io/project/user-image`, without tag or digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    repository: String,
}

impl ImageName {
    pub fn parse(input: &str) -> Result<Self, InvalidImageName> {
        let invalid = || InvalidImageName(input.to_owned());

        let (domain, path) = match input.split_once('/') {
            Some((first, rest)) if is_domain_like(first) => (Some(first), rest),
            _ => (None, input),
        };

        if let Some(domain) = domain {
            if !DOMAIN.is_match(domain) {
                return Err(invalid());
            }
        }

        if path.is_empty() || !path.split('/').all(|c| PATH_COMPONENT.is_match(c)) {
            return Err(invalid());
        }

        Ok(Self {
            repository: input.to_owned(),
        })
    }

    pub fn with_tag(&self, tag: &str) -> String {
        format!("{repository}:{tag}", repository = self.repository)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository)
    }
}

// Same heuristic as the docker CLI: the first component names a registry when it looks like a
// host name.
fn is_domain_like(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

pub fn is_valid_tag(tag: &str) -> bool {
    TAG.is_match(tag)
}
