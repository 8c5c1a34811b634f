use std::{path::Path, sync::LazyLock};

use log::debug;
use regex::Regex;

use crate::{error::Result, process};

pub struct BuildArgs<'a> {
    pub context: &'a Path,
    /// Full `repository:tag` reference of the image to produce.
    pub image: &'a str,
    pub cache_from: Option<&'a str>,
}

/// The container toolchain operations an image goes through.
pub trait ImageBackend {
    /// Whether `image` is present in its upstream registry.
    fn exists_in_registry(&self, image: &str) -> Result<bool>;

    fn exists_locally(&self, image: &str) -> Result<bool>;

    /// Pulls `image`. Returns `false` when the registry does not have it.
    fn pull(&self, image: &str) -> Result<bool>;

    fn build(&self, args: BuildArgs) -> Result<()>;

    fn push(&self, image: &str) -> Result<()>;
}

/// Drives the `docker` command line client.
pub struct DockerBackend;

impl DockerBackend {
    /// Runs `command` and maps a failure that reports a missing image to `Ok(false)`.
    fn probe(command: process::Command) -> Result<bool> {
        let output = command.try_output()?;
        if output.status.success() {
            return Ok(true);
        }

        let stderr = output.stderr_lossy();
        if is_not_found(&stderr) {
            debug!("not found: {stderr}", stderr = stderr.trim());
            Ok(false)
        } else {
            debug!("stderr: {stderr}", stderr = stderr.trim());
            Err(output.into_error().into())
        }
    }
}

impl ImageBackend for DockerBackend {
    fn exists_in_registry(&self, image: &str) -> Result<bool> {
        Self::probe(process::command!("docker", "manifest", "inspect", image))
    }

    fn exists_locally(&self, image: &str) -> Result<bool> {
        Self::probe(process::command!(
            "docker",
            "image",
            "inspect",
            "--format={{.Id}}",
            image
        ))
    }

    fn pull(&self, image: &str) -> Result<bool> {
        Self::probe(process::command!("docker", "pull", "--quiet", image))
    }

    fn build(&self, args: BuildArgs) -> Result<()> {
        let BuildArgs {
            context,
            image,
            cache_from,
        } = args;

        let command = process::command!("docker", "build", "--tag", image);
        let command = match cache_from {
            Some(cache_from) => process::args!(command, "--cache-from", cache_from),
            None => command,
        };
        process::args!(command, context).status()?;
        Ok(())
    }

    fn push(&self, image: &str) -> Result<()> {
        process::command!("docker", "push", image).status()?;
        Ok(())
    }
}

static MANIFEST_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"manifest for \S+ not found").unwrap());

/// Recognizes the messages docker and the common registries emit for a missing image or tag.
/// Failures of a credential helper are never a missing image, even when they say "not found".
fn is_not_found(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "no such manifest",
        "no such image",
        "manifest unknown",
        "repository does not exist",
    ];
    const CREDENTIAL_FAILURES: &[&str] = &["error getting credentials", "executable file not found"];

    let stderr = stderr.to_ascii_lowercase();
    if CREDENTIAL_FAILURES.iter().any(|marker| stderr.contains(marker)) {
        return false;
    }
    MARKERS.iter().any(|marker| stderr.contains(marker)) || MANIFEST_NOT_FOUND.is_match(&stderr)
}
