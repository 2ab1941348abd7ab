//! OS template resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of an OS image template, e.g. `ubuntu-12.04-x86_64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OsTemplate(String);

impl OsTemplate {
    /// Template name as passed to the control tool.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OsTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the resolution table.
struct TemplateEntry {
    /// Upper-case OS name.
    os: &'static str,
    /// Accepted spellings of the version.
    versions: &'static [&'static str],
    template: &'static str,
}

const TEMPLATES: &[TemplateEntry] = &[
    TemplateEntry { os: "UBUNTU", versions: &["12.04", "12"], template: "ubuntu-12.04-x86_64" },
    TemplateEntry { os: "UBUNTU", versions: &["11.10", "11"], template: "ubuntu-11.10-x86_64" },
    TemplateEntry { os: "CENTOS", versions: &["6.3"], template: "centos-6.3-x86_64" },
    TemplateEntry { os: "CENTOS", versions: &["6.2"], template: "centos-6.2-x86_64" },
    TemplateEntry { os: "DEBIAN", versions: &["6.0", "6"], template: "debian-6.0-x86_64" },
];

/// Maps a requested (OS, version) pair to a template name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateResolver {
    default_os: String,
    default_version: String,
}

impl TemplateResolver {
    /// Create a resolver that fills blank fields with the given defaults.
    #[must_use]
    pub fn new(default_os: &str, default_version: &str) -> Self {
        Self {
            default_os: default_os.trim().to_uppercase(),
            default_version: default_version.trim().to_owned(),
        }
    }

    /// Resolve an OS name and version to a template.
    ///
    /// OS names compare case-insensitively; both fields are trimmed and a blank
    /// field takes the configured default.
    ///
    /// # Errors
    /// Returns [`CoreError::UnsupportedTemplate`] if no table row matches.
    pub fn resolve(&self, os: &str, version: &str) -> Result<OsTemplate, CoreError> {
        let os = match os.trim() {
            "" => self.default_os.clone(),
            given => given.to_uppercase(),
        };
        let version = match version.trim() {
            "" => self.default_version.as_str(),
            given => given,
        };

        TEMPLATES
            .iter()
            .find(|entry| entry.os == os && entry.versions.contains(&version))
            .map(|entry| OsTemplate(entry.template.to_owned()))
            .ok_or_else(|| CoreError::UnsupportedTemplate {
                os,
                version: version.to_owned(),
            })
    }
}
