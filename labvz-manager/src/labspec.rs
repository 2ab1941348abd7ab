//! Loading of a lab's JSON spec file.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::LabError;

/// The JSON object describing a lab, kept as parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LabSpec(Map<String, Value>);

impl LabSpec {
    /// Parse a lab spec document.
    ///
    /// # Errors
    /// Returns [`LabError::LabSpecInvalid`] if `text` is not JSON or is JSON
    /// other than an object.
    pub fn parse(text: &str) -> Result<Self, LabError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LabError::LabSpecInvalid(format!("lab spec JSON invalid: {e}")))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(LabError::LabSpecInvalid(format!(
                "lab spec JSON invalid: expected an object, found {}",
                kind(&other)
            ))),
        }
    }

    /// Top-level field of the lab spec.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The whole object.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl fmt::Display for LabSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(&self.0) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse the lab spec at `path`.
///
/// # Errors
/// Returns [`LabError::LabSpecInvalid`] if the file does not exist or does not
/// hold a JSON object, and [`LabError::Io`] for other read failures.
pub async fn read_lab_spec(path: &Path) -> Result<LabSpec, LabError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::error!(path = %path.display(), "lab spec file not found");
            return Err(LabError::LabSpecInvalid(format!(
                "lab spec file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    LabSpec::parse(&text).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "unreadable lab spec");
    })
}
