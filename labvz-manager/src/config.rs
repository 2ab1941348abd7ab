//! Lab repository and test-trigger settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where lab repositories are cached and how labs are tested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct LabConfig {
    /// Directory holding one clone per lab repository.
    pub repo_cache_dir: PathBuf,

    /// Location of the lab spec inside a repository.
    pub lab_spec_path: String,

    /// Path of the test-lab API on the management agent.
    pub test_lab_uri: String,

    /// Delay before each test-lab attempt, in seconds.
    pub retry_delays_secs: Vec<u64>,

    /// Path to `git`; a bare name is looked up on `PATH`.
    pub git_path: PathBuf,

    /// Per-invocation timeout for `git`, in seconds.
    pub git_timeout_secs: u64,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            repo_cache_dir: PathBuf::from("./lab-repo-cache"),
            lab_spec_path: "/scripts/labspec.json".to_owned(),
            test_lab_uri: "/api/1.0/test-lab".to_owned(),
            retry_delays_secs: vec![1, 2, 4, 8, 16],
            git_path: PathBuf::from("git"),
            git_timeout_secs: 600,
        }
    }
}

impl LabConfig {
    /// Replace the repository cache directory.
    #[must_use]
    pub fn with_repo_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repo_cache_dir = dir.into();
        self
    }

    /// Replace the `git` binary.
    #[must_use]
    pub fn with_git_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.git_path = path.into();
        self
    }

    /// Delays before each test-lab attempt.
    #[must_use]
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }

    /// Per-invocation timeout for `git`.
    #[must_use]
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// Lab spec file inside a checked-out repository.
    #[must_use]
    pub fn lab_spec_location(&self, repo_dir: &Path) -> PathBuf {
        repo_dir.join(self.lab_spec_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_lab_layout() {
        let config = LabConfig::default();
        assert_eq!(config.test_lab_uri, "/api/1.0/test-lab");
        assert_eq!(
            config.retry_delays(),
            [1, 2, 4, 8, 16].map(Duration::from_secs)
        );
        assert_eq!(
            config.lab_spec_location(Path::new("/cache/cse02ovpl")),
            PathBuf::from("/cache/cse02ovpl/scripts/labspec.json")
        );
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: LabConfig = match toml::from_str("retry_delays_secs = [0, 0]\n") {
            Ok(c) => c,
            Err(e) => panic!("unexpected parse error: {e}"),
        };
        assert_eq!(config.retry_delays_secs, [0, 0]);
        assert_eq!(config.lab_spec_path, "/scripts/labspec.json");
        assert_eq!(config.git_path, PathBuf::from("git"));
    }
}
