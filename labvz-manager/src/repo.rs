//! Lab repository synchronization.
//!
//! Each lab is cloned once into the cache directory and refreshed on later
//! syncs. All `git` calls go through the executor's timed runner.

use std::path::{Path, PathBuf};

use labvz_executor::{run_tool, ToolOutput};

use crate::config::LabConfig;
use crate::labspec::{read_lab_spec, LabSpec};
use crate::LabError;

/// Cache directory name for a lab: the lab id followed by the last path
/// segment of the url without a trailing `.git`.
///
/// `("cse02", "git@github.com:vlead/ovpl.git")` gives `cse02ovpl`.
#[must_use]
pub fn repo_name(lab_id: &str, lab_src_url: &str) -> String {
    let last = lab_src_url.rsplit('/').next().unwrap_or(lab_src_url);
    let repo = last.strip_suffix(".git").unwrap_or(last);
    format!("{lab_id}{repo}")
}

/// Keeps local clones of lab repositories up to date.
#[derive(Debug, Clone)]
pub struct RepoSync {
    config: LabConfig,
}

impl RepoSync {
    #[must_use]
    pub fn new(config: LabConfig) -> Self {
        Self { config }
    }

    /// Local checkout directory for a lab.
    ///
    /// # Errors
    /// Returns [`LabError::InvalidRepository`] if the derived name is empty or
    /// would escape the cache directory.
    pub fn repo_path(&self, lab_id: &str, lab_src_url: &str) -> Result<PathBuf, LabError> {
        let name = repo_name(lab_id, lab_src_url);
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(LabError::InvalidRepository(format!(
                "cannot derive a cache directory from lab id {lab_id:?} and url {lab_src_url:?}"
            )));
        }
        Ok(self.config.repo_cache_dir.join(name))
    }

    /// Clone or refresh the lab repository, check out `version` if given, and
    /// read its lab spec.
    ///
    /// An existing checkout is hard-reset and pulled, discarding local edits.
    ///
    /// # Errors
    /// Returns [`LabError::Executor`] if a `git` step fails or times out, and
    /// the errors of [`read_lab_spec`].
    pub async fn sync(
        &self,
        lab_id: &str,
        lab_src_url: &str,
        version: Option<&str>,
    ) -> Result<LabSpec, LabError> {
        let path = self.repo_path(lab_id, lab_src_url)?;
        let exists = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_dir());

        if exists {
            tracing::info!(lab_id, repo = %path.display(), "refreshing lab repository");
            self.git(Some(path.as_path()), &["reset", "--hard"]).await?;
            self.git(Some(path.as_path()), &["pull"]).await?;
        } else {
            tracing::info!(
                lab_id,
                url = lab_src_url,
                repo = %path.display(),
                "cloning lab repository"
            );
            tokio::fs::create_dir_all(&self.config.repo_cache_dir).await?;
            let target = path.display().to_string();
            self.git(None, &["clone", "--", lab_src_url, &target]).await?;
        }

        if let Some(version) = version.map(str::trim).filter(|v| !v.is_empty()) {
            tracing::info!(lab_id, version, "checking out lab version");
            self.git(Some(path.as_path()), &["checkout", version]).await?;
        }

        read_lab_spec(&self.config.lab_spec_location(&path)).await
    }

    async fn git(&self, repo: Option<&Path>, args: &[&str]) -> Result<ToolOutput, LabError> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(repo) = repo {
            full.push("-C".to_owned());
            full.push(repo.display().to_string());
        }
        full.extend(args.iter().map(|a| (*a).to_owned()));
        Ok(run_tool(&self.config.git_path, &full, None, self.config.git_timeout()).await?)
    }
}
