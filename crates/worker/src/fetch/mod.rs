//! Network seam and the reqwest-backed upstream fetch pipeline.
//!
//! ### Request model
//! - [`NetRequest`] is an owned snapshot of what the page asked for, with the
//!   navigation-vs-resource [`RequestMode`] already detected.
//! - [`NetResponse`] is a fully buffered response; any HTTP status is a
//!   successful fetch, only transport failures are errors.
//!
//! ### Safety gates
//! - Max redirects: 5
//! - Max body bytes: configurable (`max_bytes`)
//! - Hop-by-hop headers are never forwarded in either direction.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use gym_sync_core::{AppConfig, CacheEntry, CacheNamespace, Error};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, is_same_origin, resolve};

/// Headers scoped to a single connection; never forwarded or stored.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Whether a request replaces the top-level document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    Subresource,
}

impl RequestMode {
    /// Detect the mode from fetch metadata headers.
    ///
    /// `Sec-Fetch-Mode: navigate` or `Sec-Fetch-Dest: document` win; without
    /// either, a GET that accepts `text/html` is treated as a navigation.
    pub fn detect(method: &Method, headers: &HeaderMap) -> Self {
        let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        if let Some(mode) = header_str("sec-fetch-mode") {
            return if mode.eq_ignore_ascii_case("navigate") { Self::Navigate } else { Self::Subresource };
        }
        if let Some(dest) = header_str("sec-fetch-dest") {
            return if dest.eq_ignore_ascii_case("document") { Self::Navigate } else { Self::Subresource };
        }

        let accepts_html = header_str("accept").is_some_and(|accept| accept.contains("text/html"));
        if method == Method::GET && accepts_html { Self::Navigate } else { Self::Subresource }
    }
}

/// An intercepted request as handed to the worker.
#[derive(Debug, Clone)]
pub struct NetRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub mode: RequestMode,
}

impl NetRequest {
    /// A body-less GET sub-resource request.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: HeaderMap::new(), body: Bytes::new(), mode: RequestMode::Subresource }
    }

    /// A body-less GET top-level document request.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    /// Build a request and detect its mode from the headers.
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Bytes) -> Self {
        let mode = RequestMode::detect(&method, &headers);
        Self { method, url, headers, body, mode }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// The platform's response type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// Same-origin response.
    Basic,
    /// Response whose final URL left the origin.
    Cors,
}

/// A fully buffered upstream or synthesized response.
#[derive(Debug, Clone)]
pub struct NetResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Time taken to fetch in milliseconds (0 for cache or synthesized responses).
    pub fetch_ms: u64,
}

impl NetResponse {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers, body: body.into(), fetch_ms: 0 }
    }

    pub fn response_type(&self, origin: &Url) -> ResponseType {
        if is_same_origin(&self.url, origin) { ResponseType::Basic } else { ResponseType::Cors }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Snapshot this response as a cache entry for `request_url`.
    pub fn to_entry(&self, namespace: &CacheNamespace, request_url: &Url) -> CacheEntry {
        let headers = self
            .headers
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_string())))
            .collect();

        CacheEntry::new(namespace.clone(), request_url.as_str(), self.status.as_u16(), headers, self.body.to_vec())
    }

    /// Rebuild a response from a stored entry.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptEntry` if the stored URL or status is invalid.
    pub fn from_entry(entry: &CacheEntry) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status).map_err(|e| Error::CorruptEntry(e.to_string()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                headers.append(name, value);
            }
        }

        Ok(Self::new(url, status, headers, entry.body.clone()))
    }
}

/// Whether a header is connection-scoped.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// The network as seen by the worker.
///
/// Any HTTP status is `Ok`; `Err` means no response was obtained.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &NetRequest) -> Result<NetResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "gym-sync/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 20MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "gym-sync/0.1".to_string(),
            max_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// HTTP fetch client for the application origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Network for FetchClient {
    /// Forward a request upstream, returning the buffered response.
    ///
    /// Respects redirect and byte limits.
    async fn fetch(&self, request: &NetRequest) -> Result<NetResponse, Error> {
        let start = Instant::now();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name.as_str()) {
                headers.append(name.clone(), value.clone());
            }
        }

        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{} after {}ms", request.url, self.config.timeout.as_millis()))
            } else {
                Error::Network(format!("{}: {e}", request.url))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{} while reading body", request.url))
            } else {
                Error::Network(format!("failed to read response: {e}"))
            }
        })?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            fetch_ms,
            body.len()
        );

        Ok(NetResponse { url: final_url, status, headers, body, fetch_ms })
    }
}
