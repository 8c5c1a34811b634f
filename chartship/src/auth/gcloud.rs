use std::path::Path;

use crate::{
    config::{Deployment, GkeCluster, RegistryParams},
    error::Result,
    process,
};

fn activate_service_account(key_file: &Path) -> Result<()> {
    let key_file = std::path::absolute(key_file)?;
    process::command!(
        "gcloud",
        "auth",
        "activate-service-account",
        "--key-file",
        key_file,
    )
    .status()?;
    Ok(())
}

/// Lets `docker` push to the Google registries through the gcloud credential helper.
pub fn registry(deployment: &Deployment, params: &RegistryParams) -> Result<()> {
    activate_service_account(&deployment.secret_path(&params.service_key))?;
    process::command!("gcloud", "auth", "configure-docker", "--quiet").status()?;
    Ok(())
}

/// Points the current kubeconfig context at the GKE cluster.
pub fn cluster(deployment: &Deployment, cluster: &GkeCluster) -> Result<()> {
    activate_service_account(&deployment.secret_path(&cluster.service_key))?;
    process::command!(
        "gcloud",
        "container",
        "clusters",
        format!("--zone={}", cluster.zone),
        format!("--project={}", cluster.project),
        "get-credentials",
        cluster.cluster,
    )
    .status()?;
    Ok(())
}
