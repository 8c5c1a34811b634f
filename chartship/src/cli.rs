mod build;
mod deploy;

use std::path::Path;

use clap::{Parser, Subcommand};

use crate::{
    auth::ProviderAuthenticator, docker::DockerBackend, git::Git, helm::Helm, pipeline::Pipeline,
    Result,
};

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the images of a deployment
    #[command(arg_required_else_help = true)]
    Build(build::BuildArgs),

    /// Deploy a chart to the given environment
    #[command(arg_required_else_help = true, disable_version_flag = true)]
    Deploy(deploy::DeployArgs),
}

impl Cli {
    pub fn run(self) -> Result<()> {
        // Relative to the working directory, like the paths `git diff --relative` reports.
        let root = Path::new("");
        match self.command {
            Commands::Build(args) => build::build(root, args),
            Commands::Deploy(args) => deploy::deploy(root, args),
        }
    }
}

/// Runs `f` with a pipeline wired to the real command line tools.
fn with_pipeline<T>(f: impl FnOnce(&Pipeline) -> Result<T>) -> Result<T> {
    let authenticator = ProviderAuthenticator::from_env()?;
    f(&Pipeline {
        authenticator: &authenticator,
        vcs: &Git,
        images: &DockerBackend,
        charts: &Helm,
    })
}

fn deployment(root: &Path, name: &str) -> Result<crate::config::Deployment> {
    let deployment = crate::config::Deployment::load(root, name)?;
    log::debug!(
        "loaded deployment {name} with {count} image(s)",
        count = deployment.images.len()
    );
    Ok(deployment)
}
