use std::path::{Path, PathBuf};

use clap::Args;
use log::info;

use crate::{
    helm::{ChartOptions, Environment},
    Result,
};

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Name of the deployment directory under `deployments/`.
    pub deployment: String,

    /// Path to the chart directory.
    pub chart: PathBuf,

    #[arg(value_enum)]
    pub environment: Environment,

    /// Namespace to install into. Defaults to `<deployment>-<environment>`.
    #[arg(long = "namespace")]
    pub namespace: Option<String>,

    /// Chart value override of the form `key=value`, may be repeated.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Chart version constraint.
    #[arg(long = "version")]
    pub version: Option<String>,

    /// Time to wait for the release to become ready, e.g. `600s`.
    #[arg(long = "timeout")]
    pub timeout: Option<String>,

    /// Force resource updates through delete and recreate if needed.
    #[arg(long = "force", default_value_t)]
    pub force: bool,
}

pub fn deploy(root: &Path, args: DeployArgs) -> Result<()> {
    let DeployArgs {
        deployment,
        chart,
        environment,
        namespace,
        set,
        version,
        timeout,
        force,
    } = args;

    let deployment = super::deployment(root, &deployment)?;

    let options = ChartOptions {
        namespace,
        overrides: set,
        version,
        timeout,
        force,
    };

    let release = super::with_pipeline(|pipeline| {
        pipeline.deploy(&deployment, &chart, environment, options)
    })?;
    info!(
        "deployed release {name} to namespace {namespace}",
        name = release.name,
        namespace = release.namespace
    );
    Ok(())
}
