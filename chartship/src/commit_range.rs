//! Detection of the commit range under test when running on a CI service.

use std::path::Path;

use log::{debug, warn};
use serde::Deserialize;

const GITHUB_EVENT_PATH: &str = "GITHUB_EVENT_PATH";
const TRAVIS_COMMIT_RANGE: &str = "TRAVIS_COMMIT_RANGE";
const CIRCLE_COMPARE_URL: &str = "CIRCLE_COMPARE_URL";

/// Returns the commit range of the current CI build, or `None` if it can not be determined.
pub fn detect() -> Option<String> {
    let range = std::env::var_os(GITHUB_EVENT_PATH)
        .and_then(|path| from_github_event(Path::new(&path)))
        .or_else(|| non_empty_var(TRAVIS_COMMIT_RANGE))
        .or_else(|| non_empty_var(CIRCLE_COMPARE_URL).and_then(|url| from_compare_url(&url)));
    debug!("detected commit range: {range:?}");
    range
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Deserialize)]
struct PullRequest {
    base: Commit,
    head: Commit,
}

/// The parts of a GitHub Actions `push` or `pull_request` event payload we look at.
#[derive(Deserialize)]
struct GithubEvent {
    pull_request: Option<PullRequest>,
    before: Option<String>,
    after: Option<String>,
}

fn from_github_event(path: &Path) -> Option<String> {
    let event = std::fs::read(path)
        .map_err(crate::error::Error::from)
        .and_then(|bytes| Ok(serde_json::from_slice::<GithubEvent>(&bytes)?))
        .inspect_err(|error| {
            warn!(
                "Unable to read GitHub event from {path}: {error}",
                path = path.display()
            )
        })
        .ok()?;

    let (from, to) = match event {
        GithubEvent {
            pull_request: Some(pull_request),
            ..
        } => (pull_request.base.sha, pull_request.head.sha),
        GithubEvent {
            before: Some(before),
            after: Some(after),
            ..
        } => (before, after),
        _ => return None,
    };

    // A push that creates a branch has no previous commit.
    if is_null_sha(&from) || is_null_sha(&to) {
        return None;
    }
    Some(format!("{from}...{to}"))
}

fn is_null_sha(sha: &str) -> bool {
    sha.is_empty() || sha.bytes().all(|b| b == b'0')
}

/// Extracts `abc...def` from `https://github.com/org/repo/compare/abc...def`.
fn from_compare_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    last.contains("..").then(|| last.to_owned())
}
