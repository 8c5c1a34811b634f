//! In-memory stand-ins for the external tools, recording every call in a shared journal.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    io,
    path::{Path, PathBuf},
    rc::Rc,
};

use crate::{
    auth::{AuthTarget, Authenticator},
    docker::{BuildArgs, ImageBackend},
    error::{Error, Result},
    git::Vcs,
    helm::{ChartBackend, Release},
};

fn tool_failure(message: &str) -> Error {
    Error::Io(io::Error::other(message.to_owned()))
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeVcs {
    journal: Journal,
    changes: HashMap<String, Vec<PathBuf>>,
    history: HashMap<PathBuf, Vec<String>>,
}

impl FakeVcs {
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn with_changes(mut self, range: &str, files: &[&str]) -> Self {
        self.changes
            .insert(range.to_owned(), files.iter().map(PathBuf::from).collect());
        self
    }

    pub fn with_history(mut self, path: &str, commits: &[&str]) -> Self {
        self.history.insert(
            PathBuf::from(path),
            commits.iter().map(|c| (*c).to_owned()).collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.entries()
    }
}

impl Vcs for FakeVcs {
    fn changed_files(&self, range: &str) -> Result<Vec<PathBuf>> {
        self.journal.record(format!("changed_files {range}"));
        self.changes
            .get(range)
            .cloned()
            .ok_or_else(|| tool_failure("fatal: bad revision"))
    }

    fn last_modified_commits(&self, path: &Path, count: usize) -> Result<Vec<String>> {
        Ok(self
            .history
            .get(path)
            .map(|commits| commits.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct FakeImageBackend {
    journal: Journal,
    remote: HashSet<String>,
    local: HashSet<String>,
    failing_probes: HashSet<String>,
    failing_builds: HashSet<String>,
    failing_pushes: HashSet<String>,
    built: RefCell<Vec<(String, Option<String>)>>,
}

impl FakeImageBackend {
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn with_remote(mut self, image: &str) -> Self {
        self.remote.insert(image.to_owned());
        self
    }

    pub fn with_local(mut self, image: &str) -> Self {
        self.local.insert(image.to_owned());
        self
    }

    pub fn failing_probe(mut self, image: &str) -> Self {
        self.failing_probes.insert(image.to_owned());
        self
    }

    pub fn failing_build(mut self, image: &str) -> Self {
        self.failing_builds.insert(image.to_owned());
        self
    }

    pub fn failing_push(mut self, image: &str) -> Self {
        self.failing_pushes.insert(image.to_owned());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.journal.entries()
    }

    /// Successfully built images with the cache they were built from.
    pub fn built(&self) -> Vec<(String, Option<String>)> {
        self.built.borrow().clone()
    }
}

impl ImageBackend for FakeImageBackend {
    fn exists_in_registry(&self, image: &str) -> Result<bool> {
        self.journal.record(format!("exists_in_registry {image}"));
        if self.failing_probes.contains(image) {
            return Err(tool_failure("unauthorized: authentication required"));
        }
        Ok(self.remote.contains(image))
    }

    fn exists_locally(&self, image: &str) -> Result<bool> {
        self.journal.record(format!("exists_locally {image}"));
        Ok(self.local.contains(image))
    }

    fn pull(&self, image: &str) -> Result<bool> {
        self.journal.record(format!("pull {image}"));
        Ok(self.remote.contains(image))
    }

    fn build(&self, args: BuildArgs) -> Result<()> {
        self.journal.record(format!("build {}", args.image));
        if self.failing_builds.contains(args.image) {
            return Err(tool_failure("build backend exited with 1"));
        }
        self.built
            .borrow_mut()
            .push((args.image.to_owned(), args.cache_from.map(str::to_owned)));
        Ok(())
    }

    fn push(&self, image: &str) -> Result<()> {
        self.journal.record(format!("push {image}"));
        if self.failing_pushes.contains(image) {
            return Err(tool_failure("denied: requested access to the resource is denied"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeAuthenticator {
    journal: Journal,
    fail: bool,
}

impl FakeAuthenticator {
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

impl Authenticator for FakeAuthenticator {
    fn authenticate(&self, target: AuthTarget<'_>) -> Result<()> {
        let kind = match target {
            AuthTarget::Registry { .. } => "registry",
            AuthTarget::Cluster { .. } => "cluster",
        };
        let provider = target.provider();
        self.journal
            .record(format!("authenticate {kind} {provider}"));
        if self.fail {
            return Err(Error::Auth {
                provider,
                source: Box::new(tool_failure("gcloud exited with 1")),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeChartBackend {
    journal: Journal,
    fail: bool,
    releases: RefCell<Vec<Release>>,
}

impl FakeChartBackend {
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = journal.clone();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn releases(&self) -> Vec<Release> {
        self.releases.borrow().clone()
    }
}

impl ChartBackend for FakeChartBackend {
    fn upgrade(&self, release: &Release) -> Result<()> {
        self.journal.record(format!("upgrade {}", release.name));
        if self.fail {
            return Err(tool_failure("helm exited with 1"));
        }
        self.releases.borrow_mut().push(release.clone());
        Ok(())
    }
}
