use gym_sync_core::Error;
use serde_json::json;
use tokio::task::JoinHandle;

use super::CacheStrategyEngine;
use crate::fallback::FallbackKind;
use crate::fetch::{NetRequest, NetResponse};

/// A served resource plus the handle of its background refresh, if one was started.
#[derive(Debug)]
pub struct ResourceOutcome {
    pub response: NetResponse,
    pub revalidation: Option<JoinHandle<()>>,
}

impl CacheStrategyEngine {
    /// Cache-first strategy with background revalidation.
    ///
    /// # Errors
    ///
    /// Returns `Error::Offline` when the resource is neither cached nor
    /// reachable and no fallback exists for it.
    pub async fn resource(&self, request: &NetRequest) -> Result<NetResponse, Error> {
        self.serve_resource(request).await.map(|outcome| outcome.response)
    }

    /// Like [`resource`](Self::resource), but hands back the revalidation
    /// task instead of detaching it.
    pub async fn serve_resource(&self, request: &NetRequest) -> Result<ResourceOutcome, Error> {
        if let Some(response) = self.lookup(&request.url).await {
            self.logger.debug("cache hit", Some(&json!({ "url": request.url.as_str() })));
            let revalidation = self.spawn_revalidation(request.clone());
            return Ok(ResourceOutcome { response, revalidation: Some(revalidation) });
        }

        self.logger.debug("cache miss", Some(&json!({ "url": request.url.as_str() })));
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store(&request.url, &response).await;
                Ok(ResourceOutcome { response, revalidation: None })
            }
            Err(e) => {
                self.logger.info(
                    "resource unreachable",
                    Some(&json!({ "url": request.url.as_str(), "error": e.to_string() })),
                );
                let response = self.fallback.build_fallback(FallbackKind::Resource, &request.url).await?;
                Ok(ResourceOutcome { response, revalidation: None })
            }
        }
    }

    fn spawn_revalidation(&self, request: NetRequest) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.network.fetch(&request).await {
                Ok(fresh) if engine.is_storable(&fresh) => {
                    if engine.store(&request.url, &fresh).await {
                        engine.logger.debug("revalidated", Some(&json!({ "url": request.url.as_str() })));
                    }
                }
                Ok(fresh) => engine.logger.debug(
                    "revalidation skipped",
                    Some(&json!({ "url": request.url.as_str(), "status": fresh.status.as_u16() })),
                ),
                Err(e) => engine.logger.debug(
                    "revalidation failed",
                    Some(&json!({ "url": request.url.as_str(), "error": e.to_string() })),
                ),
            }
        })
    }
}
