//! One worker generation: components wired around a frozen [`WorkerConfig`].

use std::sync::Arc;

use gym_sync_core::{CacheStorage, Error, Logger};
use reqwest::header::HeaderValue;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config_store::WorkerConfig;
use crate::control::{ControlChannel, ControlMessage, PlatformCommand};
use crate::fallback::OfflineFallback;
use crate::fetch::{NetRequest, NetResponse, Network, RequestMode};
use crate::intercept::{Interceptor, Route};
use crate::lifecycle::{LifecycleController, PrecacheReport, WorkerState};
use crate::strategy::{CacheStrategyEngine, PreloadHandle};

/// Header the platform adds to navigation preload requests.
const PRELOAD_HEADER: &str = "service-worker-navigation-preload";

/// A request handed to the worker, with the preload fetch if one was started.
pub struct FetchEvent {
    pub request: NetRequest,
    pub preload: Option<PreloadHandle>,
}

impl FetchEvent {
    pub fn new(request: NetRequest) -> Self {
        Self { request, preload: None }
    }

    pub fn with_preload(mut self, preload: Option<PreloadHandle>) -> Self {
        self.preload = preload;
        self
    }
}

pub struct ServiceWorker {
    config: Arc<WorkerConfig>,
    network: Arc<dyn Network>,
    logger: Logger,
    interceptor: Interceptor,
    engine: CacheStrategyEngine,
    lifecycle: Arc<LifecycleController>,
    control: ControlChannel,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig, cache: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
        platform: mpsc::UnboundedSender<PlatformCommand>,
    ) -> Self {
        let config = Arc::new(config);
        let logger = Logger::new(config.version.clone(), config.debug);
        let fallback = OfflineFallback::new(config.clone(), cache.clone(), logger.clone());
        let engine = CacheStrategyEngine::new(config.clone(), cache.clone(), network.clone(), fallback, logger.clone());
        let lifecycle = Arc::new(LifecycleController::new(
            config.clone(),
            cache,
            network.clone(),
            engine.clone(),
            logger.clone(),
        ));
        let control = ControlChannel::new(lifecycle.clone(), platform, logger.clone());
        let interceptor = Interceptor::new(config.clone());

        Self { config, network, logger, interceptor, engine, lifecycle, control }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    /// Run install and activation.
    pub async fn start(&self) -> Result<PrecacheReport, Error> {
        self.lifecycle.run().await
    }

    /// Start the navigation preload for `request`, if it will be routed as a
    /// navigation and preload is enabled.
    pub fn start_preload(&self, request: &NetRequest) -> Option<PreloadHandle> {
        if !self.lifecycle.navigation_preload_enabled()
            || request.mode != RequestMode::Navigate
            || self.interceptor.intercept(request) != Route::Navigation
        {
            return None;
        }

        let preload = request
            .clone()
            .with_header(reqwest::header::HeaderName::from_static(PRELOAD_HEADER), HeaderValue::from_static("true"));
        let network = self.network.clone();
        Some(tokio::spawn(async move { network.fetch(&preload).await }))
    }

    /// Answer one intercepted request.
    ///
    /// # Errors
    ///
    /// Passthrough requests surface network errors unchanged; routed
    /// requests only fail with `Error::Offline`.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Result<NetResponse, Error> {
        let FetchEvent { request, preload } = event;

        if !self.lifecycle.is_controlling() {
            if let Some(preload) = preload {
                preload.abort();
            }
            return self.network.fetch(&request).await;
        }

        match self.interceptor.intercept(&request) {
            Route::Passthrough(reason) => {
                if let Some(preload) = preload {
                    preload.abort();
                }
                self.logger.debug(
                    "passthrough",
                    Some(&json!({ "url": request.url.as_str(), "reason": format!("{reason:?}") })),
                );
                self.network.fetch(&request).await
            }
            Route::Navigation => self.engine.navigation(&request, preload).await,
            Route::Resource => self.engine.resource(&request).await,
        }
    }

    /// Deliver a raw control message payload.
    pub fn post_message(&self, payload: &[u8]) -> Option<JoinHandle<()>> {
        self.control.handle(ControlMessage::parse(payload))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use gym_sync_core::CacheNamespace;
    use reqwest::header::{ACCEPT, HeaderMap};
    use reqwest::{Method, StatusCode};

    use super::*;
    use crate::testing::{CountingCache, ScriptedNetwork, script_origin, url, worker_config};

    struct Harness {
        worker: ServiceWorker,
        network: Arc<ScriptedNetwork>,
        cache: Arc<CountingCache>,
        platform: mpsc::UnboundedReceiver<PlatformCommand>,
    }

    async fn harness() -> Harness {
        let network = Arc::new(ScriptedNetwork::new());
        let cache = Arc::new(CountingCache::new().await);
        script_origin(&network, "2.2.2");
        let (tx, platform) = mpsc::unbounded_channel();
        let worker = ServiceWorker::new(worker_config("2.2.2"), cache.clone(), network.clone(), tx);
        Harness { worker, network, cache, platform }
    }

    async fn started() -> Harness {
        let h = harness().await;
        h.worker.start().await.unwrap();
        h
    }

    fn current() -> CacheNamespace {
        CacheNamespace::from_raw("gym-sync-v222")
    }

    #[tokio::test]
    async fn test_cache_hit_needs_no_network() {
        let h = started().await;
        h.network.pause();

        let request = NetRequest::get(url("/app.js"));
        let response = tokio::time::timeout(
            Duration::from_secs(1),
            h.worker.handle_fetch(FetchEvent::new(request)),
        )
        .await
        .expect("cache hit must not wait on the network")
        .unwrap();

        assert_eq!(&response.body[..], b"boot()");
        h.network.resume();
    }

    #[tokio::test]
    async fn test_navigation_serves_live_content() {
        let h = started().await;
        h.network.respond("https://gym.example/", 200, "text/html", "<html>fresh shell</html>");

        let response = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::navigate(url("/"))))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"<html>fresh shell</html>");
    }

    #[tokio::test]
    async fn test_activation_leaves_only_current_namespace() {
        let h = harness().await;
        h.cache.open_namespace(&CacheNamespace::from_raw("gym-sync-v1")).await.unwrap();
        h.cache.open_namespace(&CacheNamespace::from_raw("gym-sync-v2")).await.unwrap();

        h.worker.start().await.unwrap();

        let live = h.cache.namespaces().await.unwrap();
        assert_eq!(live, vec![current()]);
    }

    #[tokio::test]
    async fn test_refresh_cache_is_idempotent() {
        let h = started().await;
        h.network.respond("https://gym.example/styles.css", 200, "text/css", "body{}");
        h.worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/styles.css"))))
            .await
            .unwrap();
        assert_eq!(h.cache.keys(&current()).await.unwrap().len(), 5);

        for _ in 0..2 {
            h.worker
                .post_message(br#"{"type":"REFRESH_CACHE"}"#)
                .unwrap()
                .await
                .unwrap();
        }

        let mut keys = h.cache.keys(&current()).await.unwrap();
        keys.sort();
        let mut expected: Vec<String> = h
            .worker
            .config()
            .static_assets()
            .iter()
            .map(|path| url(path).to_string())
            .collect();
        expected.sort();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_waiting_worker() {
        let h = harness().await;
        h.worker.lifecycle().install().await.unwrap();
        assert_eq!(h.worker.state(), WorkerState::Installed);
        assert!(!h.worker.lifecycle().is_controlling());

        h.worker
            .post_message(br#"{"type":"SKIP_WAITING"}"#)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(h.worker.state(), WorkerState::Active);
        assert!(h.worker.lifecycle().is_controlling());
    }

    #[tokio::test]
    async fn test_superseded_generation_cannot_revive_its_namespace() {
        let old = started().await;
        old.network.respond("https://gym.example/styles.css", 200, "text/css", "body{}");
        old.worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/styles.css"))))
            .await
            .unwrap();

        old.network.hold("https://gym.example/styles.css");
        let outcome = old.worker.engine.serve_resource(&NetRequest::get(url("/styles.css"))).await.unwrap();
        let revalidation = outcome.revalidation.unwrap();

        let (tx, _platform) = mpsc::unbounded_channel();
        let next = ServiceWorker::new(worker_config("2.3.0"), old.cache.clone(), old.network.clone(), tx);
        next.start().await.unwrap();
        let survivors = vec![CacheNamespace::from_raw("gym-sync-v230")];
        assert_eq!(old.cache.namespaces().await.unwrap(), survivors);

        // Still answering until the registration swaps it out.
        old.network.respond("https://gym.example/late.js", 200, "text/javascript", "late()");
        let late = old
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/late.js"))))
            .await
            .unwrap();
        assert_eq!(&late.body[..], b"late()");

        old.worker.lifecycle().mark_redundant();
        old.network.release("https://gym.example/styles.css");
        revalidation.await.unwrap();

        assert_eq!(old.cache.namespaces().await.unwrap(), survivors);
    }

    #[tokio::test]
    async fn test_offline_round_trip_is_byte_identical() {
        let h = started().await;
        let body: &[u8] = b"\x00\x01binary\xffpayload";
        h.network.respond("https://gym.example/data/plan.bin", 200, "application/octet-stream", body);

        let online = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/data/plan.bin"))))
            .await
            .unwrap();
        h.network.set_online(false);
        let offline = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/data/plan.bin"))))
            .await
            .unwrap();

        assert_eq!(online.body, offline.body);
        assert_eq!(&offline.body[..], body);
    }

    #[tokio::test]
    async fn test_offline_image_gets_placeholder() {
        let h = started().await;
        h.network.set_online(false);

        let response = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/uploads/students/ana.jpg"))))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"\x89PNG-placeholder");
    }

    #[tokio::test]
    async fn test_post_never_touches_cache() {
        let h = started().await;
        let (reads, writes) = (h.cache.reads(), h.cache.writes());
        h.network.respond("https://gym.example/app.js", 201, "text/plain", "created");

        let request = NetRequest::new(Method::POST, url("/app.js"), HeaderMap::new(), Bytes::from_static(b"{}"));
        let response = h.worker.handle_fetch(FetchEvent::new(request)).await.unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(h.cache.reads(), reads);
        assert_eq!(h.cache.writes(), writes);
    }

    #[tokio::test]
    async fn test_uncontrolled_worker_passes_through() {
        let h = harness().await;
        let response = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/app.js"))))
            .await
            .unwrap();

        assert_eq!(&response.body[..], b"boot()");
        assert_eq!(h.cache.reads(), 0);
    }

    #[tokio::test]
    async fn test_api_requests_bypass_cache_offline() {
        let h = started().await;
        h.network.set_online(false);

        let result = h
            .worker
            .handle_fetch(FetchEvent::new(NetRequest::get(url("/api/students"))))
            .await;
        assert!(result.is_err_and(|e| e.is_network_failure()));
    }

    #[tokio::test]
    async fn test_check_for_updates_reaches_platform() {
        let mut h = started().await;
        assert!(h.worker.post_message(br#"{"type":"CHECK_FOR_UPDATES"}"#).is_none());
        assert_eq!(h.platform.recv().await, Some(PlatformCommand::CheckForUpdates));
    }

    #[tokio::test]
    async fn test_unknown_message_is_ignored() {
        let h = started().await;
        assert!(h.worker.post_message(br#"{"type":"SELF_DESTRUCT"}"#).is_none());
        assert_eq!(h.worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_preload_only_for_navigations() {
        let h = started().await;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html"));
        let navigation = NetRequest::new(Method::GET, url("/students"), headers, Bytes::new());
        h.network.respond("https://gym.example/students", 200, "text/html", "<html>students</html>");

        assert!(h.worker.start_preload(&NetRequest::get(url("/app.js"))).is_none());
        let preload = h.worker.start_preload(&navigation);
        assert!(preload.is_some());

        let response = h
            .worker
            .handle_fetch(FetchEvent::new(navigation).with_preload(preload))
            .await
            .unwrap();
        assert_eq!(&response.body[..], b"<html>students</html>");
        assert_eq!(h.network.call_count("https://gym.example/students"), 1);
    }
}
