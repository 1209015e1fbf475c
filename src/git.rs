//! Version-control collaborator.
//!
//! Cloning, checkouts and the `rev-list --before` lookup go through the `git`
//! binary; reading the commit range and resolving HEAD use libgit2.

use std::path::Path;
use std::process::Command;

use chrono::{DateTime, FixedOffset, NaiveDate};
use git2::{Repository, Sort};
use tempfile::TempDir;
use tracing::debug;

use crate::error::{MetricsError, Result};

/// The temporary directory holding the clone for one run.
///
/// Removed when dropped, on success and on every error path.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("scc_metrics_").tempdir()?;
        Ok(Workspace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Operations the sampler needs from version control
pub trait Vcs {
    fn clone_repo(&self, url: &str, workspace: &Workspace) -> Result<()>;

    fn checkout(&self, workspace: &Workspace, rev: &str) -> Result<()>;

    /// Resolve the ref to sample; `HEAD` becomes the checked-out branch name
    fn resolve_branch(&self, workspace: &Workspace, branch: &str) -> Result<String>;

    /// Dates of the oldest and newest commit reachable from `branch`
    fn commit_date_range(
        &self,
        workspace: &Workspace,
        branch: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate)>>;

    /// Most recent commit on `branch` at or before the end of `as_of`
    fn commit_before(
        &self,
        workspace: &Workspace,
        branch: &str,
        as_of: NaiveDate,
    ) -> Result<Option<String>>;
}

/// `Vcs` backed by the `git` executable and libgit2
pub struct GitCli;

impl GitCli {
    fn run(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd
            .output()
            .map_err(|e| MetricsError::Command(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MetricsError::Command(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Vcs for GitCli {
    fn clone_repo(&self, url: &str, workspace: &Workspace) -> Result<()> {
        let dest = workspace.path().to_string_lossy();
        self.run(None, &["clone", url, dest.as_ref()])
            .map_err(|e| MetricsError::Command(format!("Error cloning repository: {}", e)))?;
        Ok(())
    }

    fn checkout(&self, workspace: &Workspace, rev: &str) -> Result<()> {
        self.run(Some(workspace.path()), &["checkout", "--quiet", rev, "--"])?;
        Ok(())
    }

    fn resolve_branch(&self, workspace: &Workspace, branch: &str) -> Result<String> {
        if branch != "HEAD" {
            self.checkout(workspace, branch).map_err(|e| {
                MetricsError::Command(format!("Error checking out branch {}: {}", branch, e))
            })?;
            return Ok(branch.to_string());
        }

        let repo = Repository::open(workspace.path())?;
        let head = repo.head()?;

        // A detached HEAD moves with every checkout, so pin the commit instead
        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(name.to_string());
            }
        }

        head.target()
            .map(|oid| oid.to_string())
            .ok_or_else(|| MetricsError::Validation("Error resolving HEAD branch".to_string()))
    }

    fn commit_date_range(
        &self,
        workspace: &Workspace,
        branch: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let repo = Repository::open(workspace.path())?;
        let tip = repo.revparse_single(branch)?.peel_to_commit()?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(tip.id())?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut first = None;
        let mut last = None;
        for oid_result in revwalk {
            let commit = repo.find_commit(oid_result?)?;
            let date = commit_local_date(&commit.time());
            if last.is_none() {
                last = date;
            }
            first = date.or(first);
        }

        debug!(?first, ?last, branch, "commit date range");
        Ok(first.zip(last))
    }

    fn commit_before(
        &self,
        workspace: &Workspace,
        branch: &str,
        as_of: NaiveDate,
    ) -> Result<Option<String>> {
        let before = format!("{} 23:59:59", as_of.format("%Y-%m-%d"));
        let stdout = self.run(
            Some(workspace.path()),
            &["rev-list", "-1", "--before", &before, branch, "--"],
        )?;

        let commit = stdout.trim();
        if commit.is_empty() {
            Ok(None)
        } else {
            Ok(Some(commit.to_string()))
        }
    }
}

/// Calendar date of a commit time in the commit's own timezone
fn commit_local_date(time: &git2::Time) -> Option<NaiveDate> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)?;
    DateTime::from_timestamp(time.seconds(), 0).map(|dt| dt.with_timezone(&offset).date_naive())
}
