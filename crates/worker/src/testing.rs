//! In-process doubles for the network and cache seams.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use gym_sync_core::{AppConfig, CacheDb, CacheEntry, CacheNamespace, CacheStorage, Error, NamespaceInfo};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use tokio::sync::watch;

use crate::config_store::WorkerConfig;
use crate::fetch::{NetRequest, NetResponse, Network};

pub const ORIGIN: &str = "https://gym.example";

/// Network double answering from a URL table.
///
/// Unscripted URLs answer 404. While offline every fetch fails with
/// `Error::Network`. While paused, fetches block until resumed; a held URL
/// blocks only its own fetches until released.
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, (u16, String, Bytes)>>,
    online: AtomicBool,
    open: watch::Sender<bool>,
    held: watch::Sender<HashSet<String>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        let (held, _) = watch::channel(HashSet::new());
        Self {
            routes: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            open,
            held,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, url: &str, status: u16, content_type: &str, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, content_type.to_string(), body.into()));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.open.send_replace(true);
    }

    pub fn hold(&self, url: &str) {
        self.held.send_modify(|held| {
            held.insert(url.to_string());
        });
    }

    pub fn release(&self, url: &str) {
        self.held.send_modify(|held| {
            held.remove(url);
        });
    }

    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, u)| u == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &NetRequest) -> Result<NetResponse, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method.clone(), request.url.to_string()));

        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !held.contains(request.url.as_str())).await;

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: connection refused", request.url)));
        }

        let scripted = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, content_type, body) = scripted.unwrap_or((404, "text/plain".into(), Bytes::from_static(b"")));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type).unwrap());
        Ok(NetResponse::new(request.url.clone(), StatusCode::from_u16(status).unwrap(), headers, body))
    }
}

/// Cache wrapper counting every read and write reaching the store.
pub struct CountingCache {
    inner: CacheDb,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingCache {
    pub async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// A store with `namespace` already open, as after install.
    pub async fn opened(namespace: &CacheNamespace) -> Self {
        let cache = Self::new().await;
        cache.inner.open_namespace(namespace).await.unwrap();
        cache
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for CountingCache {
    async fn open_namespace(&self, namespace: &CacheNamespace) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.open_namespace(namespace).await
    }

    async fn match_entry(
        &self, namespace: &CacheNamespace, method: &str, url: &str,
    ) -> Result<Option<CacheEntry>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.match_entry(namespace, method, url).await
    }

    async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("simulated quota exceeded".into()));
        }
        self.inner.put_entry(entry).await
    }

    async fn delete_entry(&self, namespace: &CacheNamespace, method: &str, url: &str) -> Result<bool, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_entry(namespace, method, url).await
    }

    async fn keys(&self, namespace: &CacheNamespace) -> Result<Vec<String>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.keys(namespace).await
    }

    async fn namespaces(&self) -> Result<Vec<CacheNamespace>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.namespaces().await
    }

    async fn delete_namespace(&self, namespace: &CacheNamespace) -> Result<bool, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_namespace(namespace).await
    }

    async fn namespace_info(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.namespace_info().await
    }
}

/// Application config pointed at [`ORIGIN`] with a small asset list.
pub fn app_config() -> AppConfig {
    AppConfig {
        origin: ORIGIN.into(),
        static_assets: vec![
            "/".into(),
            "/index.html".into(),
            "/app.js".into(),
            "/icons/icon-192x192.png".into(),
        ],
        debug: true,
        ..Default::default()
    }
}

/// Worker config for `version` without going through the manifest.
pub fn worker_config(version: &str) -> WorkerConfig {
    let app = app_config();
    WorkerConfig {
        origin: Url::parse(ORIGIN).unwrap(),
        cache_prefix: app.cache_prefix.clone(),
        version: version.to_string(),
        namespace: CacheNamespace::from_version(&app.cache_prefix, version).unwrap(),
        assets: app.asset_manifest(),
        excluded_paths: app.excluded_paths.clone(),
        placeholder_image: app.placeholder_image.clone(),
        debug: true,
        navigation_preload: true,
        degraded: false,
    }
}

/// Script every asset of [`app_config`] plus a manifest for `version`.
pub fn script_origin(network: &ScriptedNetwork, version: &str) {
    network.respond(
        "https://gym.example/manifest.json",
        200,
        "application/json",
        format!(r#"{{"name":"Gym Sync","version":"{version}"}}"#),
    );
    network.respond("https://gym.example/", 200, "text/html", "<html>shell</html>");
    network.respond("https://gym.example/index.html", 200, "text/html", "<html>shell</html>");
    network.respond("https://gym.example/app.js", 200, "text/javascript", "boot()");
    network.respond("https://gym.example/icons/icon-192x192.png", 200, "image/png", &b"\x89PNG-placeholder"[..]);
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Formatted log output collected from the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Route this thread's events into the buffer until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
