use std::path::PathBuf;

use thiserror::Error;

use crate::{config::ProviderKind, process};

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "could not auto-detect commit-range, and --check-registry is not set\n\
         specify --commit-range manually, or pass --check-registry"
    )]
    AmbiguousTrigger,

    #[error("invalid commit range {0:?}")]
    InvalidCommitRange(String),

    #[error("failed to read deployment config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("unknown provider {provider:?} found in `{field}`")]
    UnknownProvider { field: String, provider: String },

    #[error("the service key file {} does not exist", path.display())]
    MissingCredentialFile { path: PathBuf },

    #[error("{provider} authentication failed: {source}")]
    Auth {
        provider: ProviderKind,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to determine the home directory")]
    NoHomeDir,

    #[error("could not resolve a tag for image {image}: {reason}")]
    UnresolvedTag { image: String, reason: String },

    #[error("failed to check registry for image {image}: {cause}")]
    RegistryProbe { image: String, cause: Box<Error> },

    #[error("failed to fetch parent image {image}: {cause}")]
    FetchParentFailed { image: String, cause: Box<Error> },

    #[error("failed to build image {image}: {cause}")]
    BuildFailed { image: String, cause: Box<Error> },

    #[error("failed to push image {image}: {cause}")]
    PushFailed { image: String, cause: Box<Error> },

    #[error("failed to deploy release {release}: {cause}")]
    DeployFailed { release: String, cause: Box<Error> },

    #[error("{} image(s) failed: {}", images.len(), images.join(", "))]
    ImagesFailed { images: Vec<String> },

    #[error(transparent)]
    Process(#[from] process::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
