//! Decides whether an image needs to be rebuilt.

use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    config,
    docker::ImageBackend,
    error::{Error, Result},
    git::Vcs,
    image::Image,
};

/// How rebuilds are triggered for a run. Exactly one mode applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// Rebuild images whose build context changed within the commit range.
    CommitRange(String),
    /// Rebuild images whose tag is missing from the upstream registry.
    CheckRegistry,
}

impl TriggerMode {
    /// `commit_range` is either given explicitly or auto-detected; it may be empty when detection
    /// failed.
    pub fn resolve(commit_range: Option<&str>, check_registry: bool) -> Result<Self> {
        if check_registry {
            return Ok(TriggerMode::CheckRegistry);
        }
        match commit_range.map(str::trim) {
            Some(range) if !range.is_empty() => Ok(TriggerMode::CommitRange(range.to_owned())),
            _ => Err(Error::AmbiguousTrigger),
        }
    }
}

/// Files changed within a commit range, collected once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    range: String,
    files: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn collect(range: &str, vcs: &dyn Vcs) -> Result<Self> {
        if range.trim().is_empty() {
            return Err(Error::InvalidCommitRange(range.to_owned()));
        }
        Ok(Self::new(range, vcs.changed_files(range)?))
    }

    pub fn new(range: &str, files: Vec<PathBuf>) -> Self {
        Self {
            range: range.to_owned(),
            files: files.iter().map(|file| config::normalize(file)).collect(),
        }
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    /// The changed files that lie within `dir`, compared component-wise.
    pub fn touched(&self, dir: &Path) -> Vec<PathBuf> {
        let dir = config::normalize(dir);
        self.files
            .iter()
            .filter(|file| file.starts_with(&dir))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    CommitRange(ChangeSet),
    CheckRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evidence {
    CommitRange { range: String, touched: Vec<PathBuf> },
    Registry { image: String, present: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub needed: bool,
    pub evidence: Evidence,
}

pub fn needs_building(
    image: &Image,
    trigger: &Trigger,
    registry: &dyn ImageBackend,
) -> Result<Decision> {
    let decision = match trigger {
        Trigger::CommitRange(changes) => {
            let touched = changes.touched(&image.context);
            Decision {
                needed: !touched.is_empty(),
                evidence: Evidence::CommitRange {
                    range: changes.range().to_owned(),
                    touched,
                },
            }
        }
        Trigger::CheckRegistry => {
            let reference = image.reference();
            let present =
                registry
                    .exists_in_registry(&reference)
                    .map_err(|cause| Error::RegistryProbe {
                        image: reference.clone(),
                        cause: Box::new(cause),
                    })?;
            Decision {
                needed: !present,
                evidence: Evidence::Registry {
                    image: reference,
                    present,
                },
            }
        }
    };
    debug!("{image}: {decision:?}", image = image.reference());
    Ok(decision)
}
