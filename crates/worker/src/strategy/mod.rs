//! Cache strategies.
//!
//! - [`resource`]: cache-first with background revalidation.
//! - [`navigation`]: network-first with cached shell and offline fallback.
//!
//! Both strategies only ever read and write the generation's own namespace.

mod navigation;
mod resource;

use std::sync::Arc;

use gym_sync_core::{CacheStorage, Error, Logger};
use reqwest::{StatusCode, Url};
use serde_json::json;

use crate::config_store::WorkerConfig;
use crate::fallback::OfflineFallback;
use crate::fetch::{NetResponse, Network, ResponseType};

pub use self::navigation::PreloadHandle;
pub use self::resource::ResourceOutcome;

/// Executes the resource and navigation strategies for one generation.
#[derive(Clone)]
pub struct CacheStrategyEngine {
    config: Arc<WorkerConfig>,
    cache: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    fallback: OfflineFallback,
    logger: Logger,
}

impl CacheStrategyEngine {
    pub fn new(
        config: Arc<WorkerConfig>, cache: Arc<dyn CacheStorage>, network: Arc<dyn Network>, fallback: OfflineFallback,
        logger: Logger,
    ) -> Self {
        Self { config, cache, network, fallback, logger }
    }

    /// Only complete same-origin responses are worth keeping.
    pub fn is_storable(&self, response: &NetResponse) -> bool {
        response.status == StatusCode::OK && response.response_type(&self.config.origin) == ResponseType::Basic
    }

    /// Look up `url` in the current namespace; read failures count as a miss.
    async fn lookup(&self, url: &Url) -> Option<NetResponse> {
        match self.cache.match_entry(&self.config.namespace, "GET", url.as_str()).await {
            Ok(Some(entry)) => match NetResponse::from_entry(&entry) {
                Ok(response) => Some(response),
                Err(e) => {
                    self.logger.error(
                        "discarding unreadable cache entry",
                        Some(&json!({ "url": url.as_str(), "error": e.to_string() })),
                    );
                    if let Err(e) = self.cache.delete_entry(&self.config.namespace, "GET", url.as_str()).await {
                        self.logger.error("failed to delete cache entry", Some(&json!({ "error": e.to_string() })));
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.logger.error("cache read failed", Some(&json!({ "url": url.as_str(), "error": e.to_string() })));
                None
            }
        }
    }

    /// Store `response` under `url` when storable. Write failures are logged only;
    /// a generation whose namespace was evicted silently stops writing.
    async fn store(&self, url: &Url, response: &NetResponse) -> bool {
        if !self.is_storable(response) {
            return false;
        }

        match self.cache.put_entry(&response.to_entry(&self.config.namespace, url)).await {
            Ok(()) => true,
            Err(Error::NamespaceClosed(namespace)) => {
                self.logger.debug(
                    "namespace evicted, dropping write",
                    Some(&json!({ "url": url.as_str(), "namespace": namespace })),
                );
                false
            }
            Err(e) => {
                self.logger.error("cache write failed", Some(&json!({ "url": url.as_str(), "error": e.to_string() })));
                false
            }
        }
    }
}
