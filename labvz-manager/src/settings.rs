//! The TOML settings file.
//!
//! ```toml
//! [provision]
//! subnets = ["10.1.100.0/24"]
//! partial_failure = "teardown"
//!
//! [tool]
//! timeout_secs = 120
//!
//! [lab]
//! repo_cache_dir = "/var/cache/labvz"
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use labvz_core::ProvisionConfig;
use labvz_executor::ToolConfig;
use serde::{Deserialize, Serialize};

use crate::config::LabConfig;
use crate::LabError;

/// All settings, one section per crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Settings {
    pub provision: ProvisionConfig,
    pub tool: ToolConfig,
    pub lab: LabConfig,
}

impl Settings {
    /// Parse settings from TOML text.
    ///
    /// # Errors
    /// Returns the parser's message for malformed TOML or unknown sections.
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Load settings from `path`, or use defaults when no path is given.
    ///
    /// # Errors
    /// Returns [`LabError::Settings`] if the file cannot be read, cannot be
    /// parsed, or holds an invalid provisioning section.
    pub async fn load(path: Option<&Path>) -> Result<Self, LabError> {
        let Some(path) = path else {
            tracing::debug!("no settings file given, using defaults");
            return Ok(Self::default());
        };
        let settings_error = |reason: String| LabError::Settings {
            path: path.to_path_buf(),
            reason,
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| settings_error(e.to_string()))?;
        let settings = Self::parse(&text).map_err(settings_error)?;
        settings
            .provision
            .validate()
            .map_err(|e| settings_error(e.to_string()))?;

        tracing::info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }
}
