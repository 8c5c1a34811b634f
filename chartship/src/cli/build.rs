use std::path::Path;

use clap::Args;

use crate::{commit_range, pipeline::BuildRequest, Result};

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Name of the deployment directory under `deployments/`.
    pub deployment: String,

    /// Trigger image rebuilds only if files in the image directory have changed in this git commit
    /// range. Detected automatically on GitHub Actions, Travis CI and CircleCI.
    #[arg(long = "commit-range", conflicts_with = "check_registry")]
    pub commit_range: Option<String>,

    /// Trigger image rebuilds if an image with the expected name and tag is not in the upstream
    /// registry.
    #[arg(long = "check-registry", default_value_t)]
    pub check_registry: bool,

    /// Push built images to the registry.
    #[arg(long = "push", default_value_t)]
    pub push: bool,
}

pub fn build(root: &Path, args: BuildArgs) -> Result<()> {
    let BuildArgs {
        deployment,
        commit_range,
        check_registry,
        push,
    } = args;

    let deployment = super::deployment(root, &deployment)?;

    let commit_range = if check_registry {
        None
    } else {
        commit_range.or_else(commit_range::detect)
    };

    let request = BuildRequest {
        commit_range,
        check_registry,
        push,
    };

    let report = super::with_pipeline(|pipeline| pipeline.build(&deployment, &request))?;
    report.log_summary();
    report.into_result()?;
    Ok(())
}
