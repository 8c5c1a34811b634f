//! Deployment configuration, read from `deployments/<name>/chartship.yaml`.
//!
//! ```yaml
//! images:
//!   registry:
//!     provider: gcloud
//!     gcloud:
//!       project: my-project
//!       service_key: registry-key.json
//!   images:
//!     - name: gcr.io/my-project/user-image
//!       path: images/user
//! cluster:
//!   provider: aws
//!   aws:
//!     project: my-project
//!     cluster: my-cluster
//!     zone: us-west-2
//!     service_key: cluster-key.json
//! ```
//!
//! Parsing happens in two stages: serde reads the raw document, then [`Deployment::from_yaml`]
//! validates it into typed credentials so that nothing downstream ever branches on a provider
//! string.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    image_name::{self, ImageName},
};

pub const DEPLOYMENTS_DIR: &str = "deployments";
pub const CONFIG_FILE: &str = "chartship.yaml";
pub const SECRETS_DIR: &str = "secrets";
pub const DEFAULT_CHART_PATH: &str = "jupyterhub.singleuser.image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gcloud,
    Aws,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Gcloud => "gcloud",
            ProviderKind::Aws => "aws",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryParams {
    pub project: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCredential {
    Gcloud(RegistryParams),
    Aws(RegistryParams),
}

impl RegistryCredential {
    pub fn provider(&self) -> ProviderKind {
        match self {
            RegistryCredential::Gcloud(_) => ProviderKind::Gcloud,
            RegistryCredential::Aws(_) => ProviderKind::Aws,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GkeCluster {
    pub project: String,
    pub cluster: String,
    pub zone: String,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EksCluster {
    pub project: Option<String>,
    pub cluster: String,
    /// Passed as `--region` when set; otherwise the region comes from the credentials profile.
    pub region: Option<String>,
    pub service_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCredential {
    Gcloud(GkeCluster),
    Aws(EksCluster),
}

impl ClusterCredential {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ClusterCredential::Gcloud(_) => ProviderKind::Gcloud,
            ClusterCredential::Aws(_) => ProviderKind::Aws,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    pub name: ImageName,
    /// Build context, inside the deployment directory.
    pub context: PathBuf,
    pub tag: Option<String>,
    /// Dotted chart value path that receives `name` and `tag` on deploy.
    pub chart_path: String,
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub name: String,
    pub dir: PathBuf,
    pub registry: Option<RegistryCredential>,
    pub cluster: Option<ClusterCredential>,
    pub images: Vec<ImageDefinition>,
}

impl Deployment {
    /// Reads `deployments/<name>/chartship.yaml` relative to `root`.
    pub fn load(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(DEPLOYMENTS_DIR).join(name);
        let path = dir.join(CONFIG_FILE);
        let wrap = |source: Error| Error::Config {
            path: path.clone(),
            source: Box::new(source),
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| wrap(e.into()))?;
        Self::from_yaml(name, dir.clone(), &contents).map_err(wrap)
    }

    pub fn from_yaml(name: &str, dir: PathBuf, yaml: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        let raw_images = raw.images.unwrap_or_default();

        let registry = raw_images
            .registry
            .map(|block| registry_credential(block.into_provider("images.registry")?))
            .transpose()?;

        let cluster = raw
            .cluster
            .map(|block| cluster_credential(block.into_provider("cluster")?))
            .transpose()?;

        let images = raw_images
            .images
            .into_iter()
            .enumerate()
            .map(|(index, image)| image.validate(&dir, &format!("images.images[{index}]")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_owned(),
            dir,
            registry,
            cluster,
            images,
        })
    }

    pub fn secret_path(&self, file: &str) -> PathBuf {
        self.dir.join(SECRETS_DIR).join(file)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    images: Option<RawImages>,
    cluster: Option<RawProviderBlock<RawClusterParams>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawImages {
    registry: Option<RawProviderBlock<RawRegistryParams>>,
    #[serde(default)]
    images: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct RawProviderBlock<P> {
    provider: Option<String>,
    gcloud: Option<P>,
    aws: Option<P>,
}

impl<P> RawProviderBlock<P> {
    fn into_provider(self, field: &str) -> Result<(ProviderKind, P)> {
        let (kind, params) = match self.provider.as_deref() {
            Some("gcloud") => (ProviderKind::Gcloud, self.gcloud),
            Some("aws") => (ProviderKind::Aws, self.aws),
            Some(other) => {
                return Err(Error::UnknownProvider {
                    field: format!("{field}.provider"),
                    provider: other.to_owned(),
                })
            }
            None => {
                return Err(Error::invalid_config(
                    format!("{field}.provider"),
                    "a provider is required",
                ))
            }
        };
        let params = params.ok_or_else(|| {
            Error::invalid_config(
                format!("{field}.{kind}"),
                format!("parameters for provider {kind} are missing"),
            )
        })?;
        Ok((kind, params))
    }
}

#[derive(Debug, Deserialize)]
struct RawRegistryParams {
    project: Option<String>,
    service_key: Option<String>,
}

impl RawRegistryParams {
    fn validate(self, field: &str) -> Result<RegistryParams> {
        Ok(RegistryParams {
            project: required(self.project, field, "project")?,
            service_key: service_key(self.service_key, field)?,
        })
    }
}

fn registry_credential((kind, raw): (ProviderKind, RawRegistryParams)) -> Result<RegistryCredential> {
    let field = format!("images.registry.{kind}");
    Ok(match kind {
        ProviderKind::Gcloud => RegistryCredential::Gcloud(raw.validate(&field)?),
        ProviderKind::Aws => RegistryCredential::Aws(raw.validate(&field)?),
    })
}

#[derive(Debug, Deserialize)]
struct RawClusterParams {
    project: Option<String>,
    cluster: Option<String>,
    zone: Option<String>,
    service_key: Option<String>,
}

fn cluster_credential((kind, raw): (ProviderKind, RawClusterParams)) -> Result<ClusterCredential> {
    let field = format!("cluster.{kind}");
    Ok(match kind {
        ProviderKind::Gcloud => ClusterCredential::Gcloud(GkeCluster {
            project: required(raw.project, &field, "project")?,
            cluster: required(raw.cluster, &field, "cluster")?,
            zone: required(raw.zone, &field, "zone")?,
            service_key: service_key(raw.service_key, &field)?,
        }),
        ProviderKind::Aws => ClusterCredential::Aws(EksCluster {
            project: raw.project,
            cluster: required(raw.cluster, &field, "cluster")?,
            region: raw.zone,
            service_key: service_key(raw.service_key, &field)?,
        }),
    })
}

#[derive(Debug, Deserialize)]
struct RawImage {
    name: String,
    path: PathBuf,
    tag: Option<String>,
    #[serde(alias = "helm_substitution_path")]
    chart_path: Option<String>,
}

impl RawImage {
    fn validate(self, deployment_dir: &Path, field: &str) -> Result<ImageDefinition> {
        let name = ImageName::parse(&self.name)
            .map_err(|error| Error::invalid_config(format!("{field}.name"), error.to_string()))?;

        if let Some(tag) = self.tag.as_deref() {
            if !image_name::is_valid_tag(tag) {
                return Err(Error::invalid_config(
                    format!("{field}.tag"),
                    format!("{tag:?} is not a valid image tag"),
                ));
            }
        }

        let escapes = self
            .path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if self.path.as_os_str().is_empty() || escapes {
            return Err(Error::invalid_config(
                format!("{field}.path"),
                "expected a relative path inside the deployment directory",
            ));
        }

        Ok(ImageDefinition {
            name,
            context: normalize(&deployment_dir.join(&self.path)),
            tag: self.tag,
            chart_path: self
                .chart_path
                .unwrap_or_else(|| DEFAULT_CHART_PATH.to_owned()),
        })
    }
}

fn required(value: Option<String>, field: &str, key: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(Error::invalid_config(
            format!("{field}.{key}"),
            "a value is required",
        )),
    }
}

fn service_key(value: Option<String>, field: &str) -> Result<String> {
    let value = required(value, field, "service_key")?;
    if Path::new(&value)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(value)
    } else {
        Err(Error::invalid_config(
            format!("{field}.service_key"),
            "expected a file name inside the deployment's secrets directory",
        ))
    }
}

/// Drops `.` components so that paths compare component-wise with `git` output.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
