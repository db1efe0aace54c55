//! Versioned cache namespace naming.
//!
//! Namespaces follow `<prefix>-v<version-with-dots-stripped>`, e.g. version
//! `2.2.2` under prefix `gym-sync` becomes `gym-sync-v222`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A versioned name identifying one isolated cache store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheNamespace(String);

impl CacheNamespace {
    /// Derive the namespace for a deployment version.
    ///
    /// Returns `None` when the version normalizes to nothing.
    pub fn from_version(prefix: &str, version: &str) -> Option<Self> {
        let tag = normalize_version(version);
        if tag.is_empty() { None } else { Some(Self::compose(prefix, &tag)) }
    }

    /// Join a prefix and an already-normalized version tag.
    pub fn compose(prefix: &str, tag: &str) -> Self {
        Self(format!("{prefix}-v{tag}"))
    }

    /// Wrap an existing store name, e.g. one listed by the cache backend.
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The version tag when this namespace belongs to `prefix`, e.g. `222`
    /// for `gym-sync-v222` under `gym-sync`.
    pub fn version_tag(&self, prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(prefix)?
            .strip_prefix("-v")
            .filter(|tag| !tag.is_empty())
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheNamespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a version string to a namespace-safe tag.
///
/// Trims whitespace, drops a leading `v`, and keeps only ASCII alphanumerics
/// and `-` (dots and everything else are stripped).
pub fn normalize_version(version: &str) -> String {
    let trimmed = version.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_from_version() {
        let ns = CacheNamespace::from_version("gym-sync", "2.2.2").unwrap();
        assert_eq!(ns.as_str(), "gym-sync-v222");
    }

    #[test]
    fn test_normalize_strips_leading_v_and_noise() {
        assert_eq!(normalize_version(" v3.0.1-beta "), "301-beta");
        assert_eq!(normalize_version("1.2/3"), "123");
    }

    #[test]
    fn test_empty_version_has_no_namespace() {
        assert!(CacheNamespace::from_version("gym-sync", "").is_none());
        assert!(CacheNamespace::from_version("gym-sync", " ... ").is_none());
    }

    #[test]
    fn test_version_tag_requires_matching_prefix() {
        let ns = CacheNamespace::from_raw("gym-sync-v310");
        assert_eq!(ns.version_tag("gym-sync"), Some("310"));
        assert_eq!(ns.version_tag("gym"), None);
        assert_eq!(CacheNamespace::from_raw("gym-sync-v").version_tag("gym-sync"), None);
        assert_eq!(CacheNamespace::from_raw("other-app-v9").version_tag("gym-sync"), None);
    }
}
