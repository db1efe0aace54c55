use gym_sync_core::Error;
use reqwest::header::{CACHE_CONTROL, HeaderValue};
use serde_json::json;
use tokio::task::JoinHandle;

use super::CacheStrategyEngine;
use crate::fallback::FallbackKind;
use crate::fetch::{NetRequest, NetResponse};

/// Shell documents tried, in order, when a navigation cannot reach the network.
const SHELL_PATHS: &[&str] = &["/", "/index.html"];

/// A navigation fetch started by the host in parallel with worker routing.
pub type PreloadHandle = JoinHandle<Result<NetResponse, Error>>;

impl CacheStrategyEngine {
    /// Network-first strategy for top-level documents.
    ///
    /// A network answer with any status is served as-is. Only when no answer
    /// arrives is the cached shell used, then the offline page. Navigation
    /// responses are never written to the cache.
    pub async fn navigation(&self, request: &NetRequest, preload: Option<PreloadHandle>) -> Result<NetResponse, Error> {
        match self.live_document(request, preload).await {
            Ok(response) => return Ok(response),
            Err(e) => self.logger.info(
                "navigation offline, trying cache",
                Some(&json!({ "url": request.url.as_str(), "error": e.to_string() })),
            ),
        }

        for path in SHELL_PATHS {
            let Ok(shell_url) = self.config.url_for(path) else {
                continue;
            };
            if let Some(mut response) = self.lookup(&shell_url).await {
                self.logger.debug("serving cached shell", Some(&json!({ "shell": path, "url": request.url.as_str() })));
                response.url = request.url.clone();
                return Ok(response);
            }
        }

        self.fallback.build_fallback(FallbackKind::Document, &request.url).await
    }

    async fn live_document(&self, request: &NetRequest, preload: Option<PreloadHandle>) -> Result<NetResponse, Error> {
        if let Some(handle) = preload {
            match handle.await {
                Ok(result) => {
                    self.logger.debug("using preloaded navigation", Some(&json!({ "url": request.url.as_str() })));
                    return result;
                }
                Err(e) => {
                    self.logger.error("navigation preload task failed", Some(&json!({ "error": e.to_string() })));
                }
            }
        }

        let live = request
            .clone()
            .with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        self.network.fetch(&live).await
    }
}
