use std::path::{Path, PathBuf};

use log::debug;

use crate::{error::Result, process};

/// Version control queries used to decide what to build and how to tag it.
pub trait Vcs {
    /// Files changed within `range`, relative to the working directory.
    fn changed_files(&self, range: &str) -> Result<Vec<PathBuf>>;

    /// Abbreviated hashes of the last `count` commits touching `path`, newest first.
    fn last_modified_commits(&self, path: &Path, count: usize) -> Result<Vec<String>>;
}

pub struct Git;

impl Vcs for Git {
    fn changed_files(&self, range: &str) -> Result<Vec<PathBuf>> {
        let output =
            process::command!("git", "diff", "--name-only", "--relative", range, "--").output()?;

        let files = non_empty_lines(output.stdout_str()?)
            .map(PathBuf::from)
            .collect::<Vec<_>>();
        debug!("{count} file(s) changed in {range}", count = files.len());
        Ok(files)
    }

    fn last_modified_commits(&self, path: &Path, count: usize) -> Result<Vec<String>> {
        let output = process::command!(
            "git",
            "log",
            "-n",
            count.to_string(),
            "--pretty=format:%h",
            "--",
            path,
        )
        .output()?;

        Ok(non_empty_lines(output.stdout_str()?)
            .map(str::to_owned)
            .collect())
    }
}

fn non_empty_lines(stdout: &str) -> impl Iterator<Item = &str> {
    stdout.lines().map(str::trim).filter(|line| !line.is_empty())
}
