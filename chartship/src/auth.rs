//! Registry and cluster authentication.
//!
//! Every handler here changes *global machine state*, such as the docker credential setup or the
//! current kubeconfig context. Calls are not reentrant; the pipeline issues them one at a time,
//! before any image or chart work.

mod aws;
mod gcloud;

use std::path::PathBuf;

use log::info;

use crate::{
    config::{ClusterCredential, Deployment, ProviderKind, RegistryCredential},
    error::{Error, Result},
};

/// Environment variable read by the aws CLI and the ECR credential helper.
pub const AWS_SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

#[derive(Debug, Clone, Copy)]
pub enum AuthTarget<'a> {
    Registry {
        deployment: &'a Deployment,
        credential: &'a RegistryCredential,
    },
    Cluster {
        deployment: &'a Deployment,
        credential: &'a ClusterCredential,
    },
}

impl AuthTarget<'_> {
    pub fn provider(&self) -> ProviderKind {
        match self {
            AuthTarget::Registry { credential, .. } => credential.provider(),
            AuthTarget::Cluster { credential, .. } => credential.provider(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AuthTarget::Registry { .. } => "registry",
            AuthTarget::Cluster { .. } => "cluster",
        }
    }
}

pub trait Authenticator {
    fn authenticate(&self, target: AuthTarget<'_>) -> Result<()>;
}

/// Authenticates through the provider command line tools.
pub struct ProviderAuthenticator {
    /// Directory holding the docker client `config.json`.
    pub docker_config_dir: PathBuf,
}

impl ProviderAuthenticator {
    /// Uses `$DOCKER_CONFIG` when set, `~/.docker` otherwise, like the docker CLI does.
    pub fn from_env() -> Result<Self> {
        let docker_config_dir = match std::env::var_os("DOCKER_CONFIG") {
            Some(dir) => PathBuf::from(dir),
            None => home::home_dir().ok_or(Error::NoHomeDir)?.join(".docker"),
        };
        Ok(Self { docker_config_dir })
    }
}

impl Authenticator for ProviderAuthenticator {
    fn authenticate(&self, target: AuthTarget<'_>) -> Result<()> {
        let provider = target.provider();
        info!(
            "authenticating {kind} with {provider}",
            kind = target.kind()
        );

        let result = match target {
            AuthTarget::Registry {
                deployment,
                credential: RegistryCredential::Gcloud(params),
            } => gcloud::registry(deployment, params),
            AuthTarget::Registry {
                deployment,
                credential: RegistryCredential::Aws(params),
            } => aws::registry(deployment, params, &self.docker_config_dir),
            AuthTarget::Cluster {
                deployment,
                credential: ClusterCredential::Gcloud(cluster),
            } => gcloud::cluster(deployment, cluster),
            AuthTarget::Cluster {
                deployment,
                credential: ClusterCredential::Aws(cluster),
            } => aws::cluster(deployment, cluster),
        };

        result.map_err(|error| match error {
            Error::MissingCredentialFile { .. } => error,
            source => Error::Auth {
                provider,
                source: Box::new(source),
            },
        })
    }
}
