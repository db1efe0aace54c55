//! Version manifest and pre-warm asset list.

use serde::Deserialize;
use serde_json::Value;

use crate::Error;

/// The deployment manifest served by the application origin.
///
/// Only `version` is read; every other field is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    version: Option<Value>,
}

impl VersionManifest {
    /// Parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManifestInvalid` if the bytes are not a JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::ManifestInvalid(e.to_string()))
    }

    /// The non-empty version string, accepting JSON strings and numbers.
    ///
    /// # Errors
    ///
    /// Returns `Error::ManifestInvalid` when `version` is missing, empty or
    /// of another JSON type.
    pub fn version(&self) -> Result<String, Error> {
        let version = match &self.version {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => return Err(Error::ManifestInvalid(format!("version must be a string, got {other}"))),
            None => return Err(Error::ManifestInvalid("missing version field".into())),
        };

        if version.is_empty() {
            return Err(Error::ManifestInvalid("empty version field".into()));
        }

        Ok(version)
    }
}

/// Ordered list of origin-relative paths to pre-warm.
///
/// Duplicates collapse to their first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    paths: Vec<String>,
}

impl AssetManifest {
    pub fn new(paths: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        Self { paths: unique }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }
}
