//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (GYM_SYNC_*)
//! 2. TOML config file (if GYM_SYNC_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! It also holds the deployment-derived types the worker is configured with:
//! the [`CacheNamespace`], the [`AssetManifest`] and the [`VersionManifest`].

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod manifest;
mod namespace;
mod validation;

pub use manifest::{AssetManifest, VersionManifest};
pub use namespace::{CacheNamespace, normalize_version};
pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (GYM_SYNC_*)
/// 2. TOML config file (if GYM_SYNC_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the web application the proxy fronts.
    ///
    /// Set via GYM_SYNC_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Socket address the proxy host listens on.
    ///
    /// Set via GYM_SYNC_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via GYM_SYNC_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Product prefix every cache namespace starts with.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version used when the manifest cannot be read.
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Origin-relative path of the JSON manifest carrying `version`.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Origin-relative paths pre-warmed on install and on REFRESH_CACHE.
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,

    /// Path prefixes that are never cached (backend API routes).
    #[serde(default = "default_excluded_paths")]
    pub excluded_paths: Vec<String>,

    /// Cached image served when an image request cannot be answered.
    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,

    /// User-Agent string for upstream requests.
    ///
    /// Set via GYM_SYNC_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes buffered per upstream response.
    ///
    /// Set via GYM_SYNC_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upstream request timeout in milliseconds.
    ///
    /// Set via GYM_SYNC_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether the host starts navigation fetches in parallel with routing.
    #[serde(default = "default_true")]
    pub navigation_preload: bool,

    /// Emit worker debug lines.
    ///
    /// Set via GYM_SYNC_DEBUG environment variable.
    #[serde(default)]
    pub debug: bool,
}

fn default_origin() -> String {
    "http://127.0.0.1:5173".into()
}

fn default_listen_addr() -> String {
    "127.0.0.1:8787".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./gym-sync-cache.sqlite")
}

fn default_cache_prefix() -> String {
    "gym-sync".into()
}

fn default_version() -> String {
    "2.2.2".into()
}

fn default_manifest_path() -> String {
    "/manifest.json".into()
}

fn default_static_assets() -> Vec<String> {
    vec![
        "/".into(),
        "/index.html".into(),
        "/manifest.json".into(),
        "/favicon.ico".into(),
        "/icons/icon-192x192.png".into(),
        "/icons/icon-512x512.png".into(),
    ]
}

fn default_excluded_paths() -> Vec<String> {
    vec!["/api/".into()]
}

fn default_placeholder_image() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_user_agent() -> String {
    "gym-sync/0.1".into()
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            default_version: default_version(),
            manifest_path: default_manifest_path(),
            static_assets: default_static_assets(),
            excluded_paths: default_excluded_paths(),
            placeholder_image: default_placeholder_image(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            navigation_preload: true,
            debug: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme: {scheme}") }),
        }
    }

    /// Namespace used when the manifest is unreachable.
    pub fn default_namespace(&self) -> CacheNamespace {
        CacheNamespace::from_version(&self.cache_prefix, &self.default_version)
            .unwrap_or_else(|| CacheNamespace::compose(&self.cache_prefix, &normalize_version(&default_version())))
    }

    /// The configured pre-warm list as an ordered, de-duplicated manifest.
    pub fn asset_manifest(&self) -> AssetManifest {
        AssetManifest::new(self.static_assets.iter().cloned())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `GYM_SYNC_`
    /// 2. TOML file from `GYM_SYNC_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("GYM_SYNC_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("GYM_SYNC_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
