use std::path::{Path, PathBuf};

use log::{debug, info};

use super::AWS_SHARED_CREDENTIALS_FILE;
use crate::{
    config::{Deployment, EksCluster, RegistryParams},
    error::{Error, Result},
    process,
};

const DOCKER_CONFIG_FILE: &str = "config.json";
const ECR_CREDENTIAL_HELPER: &str = "ecr-login";

fn credentials_file(deployment: &Deployment, service_key: &str) -> Result<PathBuf> {
    let path = deployment.secret_path(service_key);
    if !path.is_file() {
        return Err(Error::MissingCredentialFile { path });
    }
    Ok(std::path::absolute(path)?)
}

/// Routes registry operations through `docker-credential-ecr-login`.
///
/// The credential helper is spawned by later `docker` invocations and reads
/// `AWS_SHARED_CREDENTIALS_FILE` from their environment, so the variable is set for the rest of
/// this process. The docker client config keeps the helper setting after the process exits.
pub fn registry(deployment: &Deployment, params: &RegistryParams, docker_config_dir: &Path) -> Result<()> {
    let credentials = credentials_file(deployment, &params.service_key)?;

    debug!("{AWS_SHARED_CREDENTIALS_FILE}={}", credentials.display());
    std::env::set_var(AWS_SHARED_CREDENTIALS_FILE, &credentials);

    let path = docker_config_dir.join(DOCKER_CONFIG_FILE);
    set_credential_store(&path, ECR_CREDENTIAL_HELPER)?;
    info!(
        "docker credential store set to {ECR_CREDENTIAL_HELPER} in {}",
        path.display()
    );
    Ok(())
}

/// Merges `credsStore` into the docker client config, keeping every other setting.
fn set_credential_store(path: &Path, helper: &str) -> Result<()> {
    let mut config = match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => serde_json::from_slice(&bytes)?,
        Ok(_) => serde_json::Map::new(),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
        Err(error) => return Err(error.into()),
    };
    config.insert("credsStore".to_owned(), helper.into());

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(&config)?)?;
    Ok(())
}

/// Points the current kubeconfig context at the EKS cluster. The credentials file is only visible
/// to the `aws` child process.
pub fn cluster(deployment: &Deployment, cluster: &EksCluster) -> Result<()> {
    let credentials = credentials_file(deployment, &cluster.service_key)?;

    let command = process::command!("aws", "eks", "update-kubeconfig", "--name", cluster.cluster);
    let command = match cluster.region.as_deref() {
        Some(region) => process::args!(command, "--region", region),
        None => command,
    };
    command
        .env(AWS_SHARED_CREDENTIALS_FILE, credentials)
        .status()?;
    Ok(())
}
