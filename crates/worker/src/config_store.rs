//! Worker configuration resolved once per generation.
//!
//! The store fetches the deployment manifest from the origin, derives the
//! cache namespace from its `version`, and freezes the result into a
//! [`WorkerConfig`] shared read-only by every component. Manifest problems
//! never fail initialization: the configured default version is used and the
//! config is marked degraded.

use gym_sync_core::{AppConfig, AssetManifest, CacheNamespace, ConfigError, Error, VersionManifest};
use reqwest::{StatusCode, Url};

use crate::fetch::{self, NetRequest, Network};

/// Immutable configuration of one worker generation.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub origin: Url,
    pub cache_prefix: String,
    pub version: String,
    pub namespace: CacheNamespace,
    pub assets: AssetManifest,
    pub excluded_paths: Vec<String>,
    pub placeholder_image: String,
    pub debug: bool,
    pub navigation_preload: bool,
    /// True when the manifest could not be read and defaults were used.
    pub degraded: bool,
}

impl WorkerConfig {
    /// The ordered pre-warm list.
    pub fn static_assets(&self) -> &AssetManifest {
        &self.assets
    }

    /// Absolute URL of an origin-relative path.
    pub fn url_for(&self, path: &str) -> Result<Url, Error> {
        fetch::resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    /// Whether `path` falls under one of the excluded prefixes.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Builds [`WorkerConfig`] values from the application config and manifest.
pub struct ConfigStore;

impl ConfigStore {
    /// Resolve the configuration for a new worker generation.
    ///
    /// # Errors
    ///
    /// Only an invalid `origin` in `app` is an error; manifest failures fall
    /// back to `app.default_version`.
    pub async fn initialize(app: &AppConfig, network: &dyn Network) -> Result<WorkerConfig, ConfigError> {
        let origin = app.origin_url()?;

        let (version, namespace, degraded) = match Self::read_version(app, &origin, network).await {
            Ok((version, namespace)) => (version, namespace, false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default_version = %app.default_version,
                    "version manifest unavailable, using default namespace"
                );
                (app.default_version.clone(), app.default_namespace(), true)
            }
        };

        tracing::info!(%version, %namespace, degraded, "worker configuration resolved");

        Ok(WorkerConfig {
            origin,
            cache_prefix: app.cache_prefix.clone(),
            version,
            namespace,
            assets: app.asset_manifest(),
            excluded_paths: app.excluded_paths.clone(),
            placeholder_image: app.placeholder_image.clone(),
            debug: app.debug,
            navigation_preload: app.navigation_preload,
            degraded,
        })
    }

    async fn read_version(
        app: &AppConfig, origin: &Url, network: &dyn Network,
    ) -> Result<(String, CacheNamespace), Error> {
        let url = fetch::resolve(origin, &app.manifest_path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let request = NetRequest::get(url).with_header(
            reqwest::header::CACHE_CONTROL,
            reqwest::header::HeaderValue::from_static("no-cache"),
        );

        let response = network.fetch(&request).await?;
        if response.status != StatusCode::OK {
            return Err(Error::ManifestInvalid(format!("status {}", response.status.as_u16())));
        }

        let version = VersionManifest::parse(&response.body)?.version()?;
        let namespace = CacheNamespace::from_version(&app.cache_prefix, &version)
            .ok_or_else(|| Error::ManifestInvalid(format!("version '{version}' normalizes to nothing")))?;

        Ok((version, namespace))
    }
}
