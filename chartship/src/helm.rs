use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use log::info;

use crate::{config::Deployment, error::Result, image::Image, process};

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Environment {
    Develop,
    Staging,
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Develop => "develop",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        })
    }
}

/// Release settings passed through to helm as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartOptions {
    pub namespace: Option<String>,
    pub overrides: Vec<String>,
    pub version: Option<String>,
    pub timeout: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub namespace: String,
    pub chart: PathBuf,
    pub value_files: Vec<PathBuf>,
    pub overrides: Vec<String>,
    pub version: Option<String>,
    pub timeout: Option<String>,
    pub force: bool,
}

impl Release {
    /// The release is named `<deployment>-<environment>` and installed into a namespace of the same
    /// name unless one is given. Value files are picked up from the deployment directory, and every
    /// image's name and tag is set at its chart path after the user supplied overrides.
    pub fn new(
        deployment: &Deployment,
        chart: &Path,
        environment: Environment,
        images: &[(Image, &str)],
        options: ChartOptions,
    ) -> Self {
        let ChartOptions {
            namespace,
            mut overrides,
            version,
            timeout,
            force,
        } = options;

        let name = format!("{deployment}-{environment}", deployment = deployment.name);

        let value_files = [
            deployment.dir.join("config").join("common.yaml"),
            deployment.dir.join("config").join(format!("{environment}.yaml")),
            deployment.dir.join("secrets").join(format!("{environment}.yaml")),
        ]
        .into_iter()
        .filter(|path| path.is_file())
        .collect();

        for (image, chart_path) in images {
            overrides.push(format!("{chart_path}.name={name}", name = image.name));
            overrides.push(format!("{chart_path}.tag={tag}", tag = image.tag));
        }

        Self {
            namespace: namespace.unwrap_or_else(|| name.clone()),
            name,
            chart: chart.to_owned(),
            value_files,
            overrides,
            version,
            timeout,
            force,
        }
    }

    fn upgrade_args(&self) -> Vec<String> {
        let mut args = vec![
            "upgrade".to_owned(),
            "--wait".to_owned(),
            "--install".to_owned(),
            "--namespace".to_owned(),
            self.namespace.clone(),
            self.name.clone(),
            self.chart.display().to_string(),
        ];
        if let Some(version) = &self.version {
            args.extend(["--version".to_owned(), version.clone()]);
        }
        if let Some(timeout) = &self.timeout {
            args.extend(["--timeout".to_owned(), timeout.clone()]);
        }
        if self.force {
            args.push("--force".to_owned());
        }
        for file in &self.value_files {
            args.extend(["-f".to_owned(), file.display().to_string()]);
        }
        for value in &self.overrides {
            args.extend(["--set".to_owned(), value.clone()]);
        }
        args
    }
}

/// Applies a chart release to the current cluster context.
pub trait ChartBackend {
    fn upgrade(&self, release: &Release) -> Result<()>;
}

pub struct Helm;

impl ChartBackend for Helm {
    fn upgrade(&self, release: &Release) -> Result<()> {
        process::command!("helm", "dependency", "update")
            .current_dir(&release.chart)
            .status()?;

        info!(
            "upgrading release {name} in namespace {namespace}",
            name = release.name,
            namespace = release.namespace
        );
        process::Command::new("helm")
            .args(release.upgrade_args().iter().map(OsStr::new))
            .status()?;
        Ok(())
    }
}
