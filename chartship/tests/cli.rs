use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;

const CI_VARIABLES: [&str; 3] = ["GITHUB_EVENT_PATH", "TRAVIS_COMMIT_RANGE", "CIRCLE_COMPARE_URL"];
const CALLS_FILE: &str = "calls.log";

fn write_deployment(root: &Path, name: &str, config: &str) {
    let dir = root.join("deployments").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("chartship.yaml"), config).unwrap();
}

fn write_secret(root: &Path, deployment: &str, file: &str) {
    let dir = root.join("deployments").join(deployment).join("secrets");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), "[default]\n").unwrap();
}

/// The binary with no CI variables and a `PATH` holding only the tools installed with [`stub`], so
/// that an unexpected call to `git`, `docker` or a provider CLI fails loudly.
fn chartship(root: &Path) -> Command {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();

    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("chartship"));
    command
        .current_dir(root)
        .env("PATH", &bin)
        .env("HOME", root)
        .env("CHARTSHIP_CALLS", root.join(CALLS_FILE))
        .env_remove("DOCKER_CONFIG")
        .env_remove("AWS_SHARED_CREDENTIALS_FILE")
        .env_remove("RUST_LOG");
    for variable in CI_VARIABLES {
        command.env_remove(variable);
    }
    command
}

/// Installs a shell script named `program` that appends its arguments to the calls file and then
/// runs `body`.
#[cfg(unix)]
fn stub(root: &Path, program: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let path = bin.join(program);
    fs::write(
        &path,
        format!("#!/bin/sh\necho \"{program} $*\" >> \"$CHARTSHIP_CALLS\"\n{body}\n"),
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Records the credentials file variable as the stubbed tool sees it.
#[cfg(unix)]
fn record_credentials_env(program: &str) -> String {
    format!("echo \"{program} env $AWS_SHARED_CREDENTIALS_FILE\" >> \"$CHARTSHIP_CALLS\"")
}

#[cfg(unix)]
fn calls(root: &Path) -> Vec<String> {
    fs::read_to_string(root.join(CALLS_FILE))
        .unwrap_or_default()
        .lines()
        .map(|line| line.trim_end().to_owned())
        .collect()
}

#[test]
fn help_shows_commands() {
    let root = tempfile::tempdir().unwrap();
    chartship(root.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn build_without_trigger_fails_before_any_tool_runs() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "staging-hub",
        "images:\n  images:\n    - name: gcr.io/project/user-image\n      path: images/user\n",
    );

    chartship(root.path())
        .args(["build", "staging-hub", "--push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "could not auto-detect commit-range, and --check-registry is not set",
        ))
        .stderr(predicate::str::contains(
            "specify --commit-range manually, or pass --check-registry",
        ));
}

#[test]
fn commit_range_and_check_registry_are_exclusive() {
    let root = tempfile::tempdir().unwrap();
    chartship(root.path())
        .args([
            "build",
            "staging-hub",
            "--commit-range",
            "abc..def",
            "--check-registry",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_deployment_names_the_config_file() {
    let root = tempfile::tempdir().unwrap();
    chartship(root.path())
        .args(["build", "nowhere", "--check-registry"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("deployments/nowhere/chartship.yaml"));
}

#[test]
fn deploy_with_unknown_cluster_provider_fails_before_helm() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "staging-hub",
        "cluster:\n  provider: azure\n  azure:\n    cluster: hub\n",
    );

    chartship(root.path())
        .args(["deploy", "staging-hub", "hub", "staging"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown provider \"azure\""))
        .stderr(predicate::str::contains("cluster.provider"))
        .stderr(predicate::str::contains("helm").not());
}

#[test]
fn deploy_rejects_unknown_environment() {
    let root = tempfile::tempdir().unwrap();
    chartship(root.path())
        .args(["deploy", "staging-hub", "hub", "qa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'qa'"));
}

#[test]
fn aws_registry_without_key_file_fails_before_images() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "staging-hub",
        r#"
images:
  registry:
    provider: aws
    aws:
      project: project
      service_key: ecr.cfg
  images:
    - name: 123456789.dkr.ecr.us-west-2.amazonaws.com/user-image
      path: images/user
      tag: pinned
"#,
    );

    chartship(root.path())
        .args(["build", "staging-hub", "--check-registry"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("secrets/ecr.cfg does not exist"))
        .stderr(predicate::str::contains("docker").not());

    assert!(!root.path().join(".docker").exists());
}

#[cfg(unix)]
const GCLOUD_REGISTRY_DEPLOYMENT: &str = r#"
images:
  registry:
    provider: gcloud
    gcloud:
      project: my-project
      service_key: gcr.json
  images:
    - name: gcr.io/my-project/user-image
      path: images/user
      tag: pinned
"#;

#[cfg(unix)]
#[test]
fn gcloud_registry_activates_the_account_before_configuring_docker() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(root.path(), "hub", GCLOUD_REGISTRY_DEPLOYMENT);
    write_secret(root.path(), "hub", "gcr.json");
    stub(root.path(), "gcloud", "exit 0");
    stub(root.path(), "docker", "exit 0");

    chartship(root.path())
        .args(["build", "hub", "--check-registry"])
        .assert()
        .success();

    let calls = calls(root.path());
    let [activate, configure, probe] = &calls[..] else {
        panic!("unexpected calls: {calls:?}");
    };
    let key_file = activate
        .strip_prefix("gcloud auth activate-service-account --key-file ")
        .unwrap();
    assert!(Path::new(key_file).is_absolute());
    assert!(key_file.ends_with("deployments/hub/secrets/gcr.json"));
    assert_eq!(configure, "gcloud auth configure-docker --quiet");
    assert_eq!(probe, "docker manifest inspect gcr.io/my-project/user-image:pinned");
}

#[cfg(unix)]
#[test]
fn credential_helper_failure_fails_the_image_instead_of_rebuilding_it() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(root.path(), "hub", GCLOUD_REGISTRY_DEPLOYMENT);
    write_secret(root.path(), "hub", "gcr.json");
    stub(root.path(), "gcloud", "exit 0");
    stub(
        root.path(),
        "docker",
        r#"echo 'error getting credentials - err: exec: "docker-credential-gcloud": executable file not found in $PATH, out: ``' >&2
exit 1"#,
    );

    chartship(root.path())
        .args(["build", "hub", "--check-registry", "--push"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to check registry"))
        .stderr(predicate::str::contains("1 image(s) failed: gcr.io/my-project/user-image"));

    let calls = calls(root.path());
    assert!(calls.iter().all(|call| !call.starts_with("docker build")
        && !call.starts_with("docker push")));
}

#[cfg(unix)]
#[test]
fn aws_registry_exports_credentials_to_docker() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "hub",
        r#"
images:
  registry:
    provider: aws
    aws:
      project: my-project
      service_key: ecr.cfg
  images:
    - name: 123456789.dkr.ecr.us-west-2.amazonaws.com/user-image
      path: images/user
      tag: pinned
"#,
    );
    write_secret(root.path(), "hub", "ecr.cfg");
    stub(root.path(), "docker", &record_credentials_env("docker"));

    chartship(root.path())
        .args(["build", "hub", "--check-registry"])
        .assert()
        .success();

    let calls = calls(root.path());
    let [probe, env] = &calls[..] else {
        panic!("unexpected calls: {calls:?}");
    };
    assert_eq!(
        probe,
        "docker manifest inspect 123456789.dkr.ecr.us-west-2.amazonaws.com/user-image:pinned"
    );
    assert!(env.ends_with("deployments/hub/secrets/ecr.cfg"));

    let config: serde_json::Value =
        serde_json::from_slice(&fs::read(root.path().join(".docker/config.json")).unwrap())
            .unwrap();
    assert_eq!(config["credsStore"], "ecr-login");
}

#[cfg(unix)]
#[test]
fn gcloud_cluster_fetches_credentials_before_helm() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "hub",
        r#"
cluster:
  provider: gcloud
  gcloud:
    project: my-project
    cluster: hub-cluster
    zone: us-central1-b
    service_key: gke.json
"#,
    );
    write_secret(root.path(), "hub", "gke.json");
    fs::create_dir_all(root.path().join("chart")).unwrap();
    stub(root.path(), "gcloud", "exit 0");
    stub(root.path(), "helm", "exit 0");

    chartship(root.path())
        .args(["deploy", "hub", "chart", "staging"])
        .assert()
        .success();

    let calls = calls(root.path());
    assert_eq!(calls.len(), 4, "unexpected calls: {calls:?}");
    assert!(calls[0].starts_with("gcloud auth activate-service-account --key-file /"));
    assert!(calls[0].ends_with("deployments/hub/secrets/gke.json"));
    assert_eq!(
        calls[1],
        "gcloud container clusters --zone=us-central1-b --project=my-project get-credentials hub-cluster"
    );
    assert_eq!(calls[2], "helm dependency update");
    assert_eq!(
        calls[3],
        "helm upgrade --wait --install --namespace hub-staging hub-staging chart"
    );
}

#[cfg(unix)]
#[test]
fn aws_cluster_credentials_are_only_visible_to_the_aws_cli() {
    let root = tempfile::tempdir().unwrap();
    write_deployment(
        root.path(),
        "hub",
        r#"
cluster:
  provider: aws
  aws:
    cluster: hub-cluster
    zone: us-west-2
    service_key: eks.cfg
"#,
    );
    write_secret(root.path(), "hub", "eks.cfg");
    fs::create_dir_all(root.path().join("chart")).unwrap();
    stub(root.path(), "aws", &record_credentials_env("aws"));
    stub(root.path(), "helm", &record_credentials_env("helm"));

    chartship(root.path())
        .args(["deploy", "hub", "chart", "prod"])
        .assert()
        .success();

    let calls = calls(root.path());
    assert_eq!(calls.len(), 6, "unexpected calls: {calls:?}");
    assert_eq!(calls[0], "aws eks update-kubeconfig --name hub-cluster --region us-west-2");
    assert!(calls[1].starts_with("aws env /"));
    assert!(calls[1].ends_with("deployments/hub/secrets/eks.cfg"));
    assert_eq!(calls[2], "helm dependency update");
    assert_eq!(calls[3], "helm env");
    assert_eq!(
        calls[4],
        "helm upgrade --wait --install --namespace hub-prod hub-prod chart"
    );
    assert_eq!(calls[5], "helm env");
}
