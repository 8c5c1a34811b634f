//! Sequencing of authentication, image builds and chart deployment for one deployment.
//!
//! Build: resolve the trigger mode, collect changes (commit range mode), authenticate the registry
//! when pushing or checking the registry, then build each image in order. Authentication and
//! trigger errors abort the run before any image is touched. Errors of a single image are recorded
//! in the [`BuildReport`] and the remaining images are still attempted.
//!
//! Deploy: authenticate the cluster, then apply the chart.

use std::path::Path;

use log::{error, info, warn};

use crate::{
    auth::{AuthTarget, Authenticator},
    change::{self, ChangeSet, Decision, Trigger, TriggerMode},
    config::{Deployment, ImageDefinition},
    docker::ImageBackend,
    error::{Error, Result},
    git::Vcs,
    helm::{ChartBackend, ChartOptions, Environment, Release},
    image::Image,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildRequest {
    /// Explicit or auto-detected commit range; empty when detection failed.
    pub commit_range: Option<String>,
    pub check_registry: bool,
    pub push: bool,
}

#[derive(Debug)]
pub enum Outcome {
    Skipped,
    Built,
    Pushed,
    Failed(Error),
}

#[derive(Debug)]
pub struct ImageReport {
    /// Image repository as configured.
    pub name: String,
    /// Resolved `repository:tag`, when tag resolution succeeded.
    pub reference: Option<String>,
    pub decision: Option<Decision>,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct BuildReport {
    pub mode: TriggerMode,
    pub images: Vec<ImageReport>,
}

impl BuildReport {
    pub fn failed(&self) -> impl Iterator<Item = &ImageReport> {
        self.images
            .iter()
            .filter(|image| matches!(image.outcome, Outcome::Failed(_)))
    }

    pub fn log_summary(&self) {
        for image in &self.images {
            let name = image.reference.as_deref().unwrap_or(&image.name);
            match &image.outcome {
                Outcome::Skipped => info!("{name}: skipped, no rebuild needed"),
                Outcome::Built => info!("{name}: built"),
                Outcome::Pushed => info!("{name}: built and pushed"),
                Outcome::Failed(error) => error!("{name}: {error}"),
            }
        }
    }

    /// Fails with every failed image listed when at least one image failed.
    pub fn into_result(self) -> Result<Self> {
        let failed = self
            .failed()
            .map(|image| image.name.clone())
            .collect::<Vec<_>>();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(Error::ImagesFailed { images: failed })
        }
    }
}

pub struct Pipeline<'a> {
    pub authenticator: &'a dyn Authenticator,
    pub vcs: &'a dyn Vcs,
    pub images: &'a dyn ImageBackend,
    pub charts: &'a dyn ChartBackend,
}

impl Pipeline<'_> {
    pub fn build(&self, deployment: &Deployment, request: &BuildRequest) -> Result<BuildReport> {
        let mode = TriggerMode::resolve(request.commit_range.as_deref(), request.check_registry)?;
        info!("build trigger for {}: {mode:?}", deployment.name);

        let trigger = match &mode {
            TriggerMode::CommitRange(range) => {
                Trigger::CommitRange(ChangeSet::collect(range, self.vcs)?)
            }
            TriggerMode::CheckRegistry => Trigger::CheckRegistry,
        };

        if request.push || request.check_registry {
            match &deployment.registry {
                Some(credential) => self.authenticator.authenticate(AuthTarget::Registry {
                    deployment,
                    credential,
                })?,
                None => warn!(
                    "No registry configured for deployment {}, relying on existing registry credentials.",
                    deployment.name
                ),
            }
        }

        let images = deployment
            .images
            .iter()
            .map(|definition| self.build_image(definition, &trigger, request.push))
            .collect();

        Ok(BuildReport { mode, images })
    }

    fn build_image(&self, definition: &ImageDefinition, trigger: &Trigger, push: bool) -> ImageReport {
        let mut report = ImageReport {
            name: definition.name.to_string(),
            reference: None,
            decision: None,
            outcome: Outcome::Skipped,
        };

        let result = (|| -> Result<Outcome> {
            let image = Image::resolve(definition, self.vcs)?;
            report.reference = Some(image.reference());

            let decision = change::needs_building(&image, trigger, self.images)?;
            let needed = decision.needed;
            report.decision = Some(decision);
            if !needed {
                return Ok(Outcome::Skipped);
            }

            let cache_from = image.fetch_parent_image(self.images)?;
            image.build(self.images, cache_from.as_deref())?;
            if !push {
                return Ok(Outcome::Built);
            }
            image.push(self.images)?;
            Ok(Outcome::Pushed)
        })();

        report.outcome = result.unwrap_or_else(Outcome::Failed);
        report
    }

    /// Returns the applied release.
    pub fn deploy(
        &self,
        deployment: &Deployment,
        chart: &Path,
        environment: Environment,
        options: ChartOptions,
    ) -> Result<Release> {
        match &deployment.cluster {
            Some(credential) => self.authenticator.authenticate(AuthTarget::Cluster {
                deployment,
                credential,
            })?,
            None => warn!(
                "No cluster configured for deployment {}, using the current kubeconfig context.",
                deployment.name
            ),
        }

        let images = deployment
            .images
            .iter()
            .map(|definition| -> Result<_> {
                Ok((
                    Image::resolve(definition, self.vcs)?,
                    definition.chart_path.as_str(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let release = Release::new(deployment, chart, environment, &images, options);
        self.charts
            .upgrade(&release)
            .map_err(|cause| Error::DeployFailed {
                release: release.name.clone(),
                cause: Box::new(cause),
            })?;
        Ok(release)
    }
}
