//! Offline fallback responses.
//!
//! Used when neither the cache nor the network can answer. Every synthesized
//! response carries a success status so the page renders it instead of a
//! generic network-error screen.

use std::sync::Arc;

use gym_sync_core::{CacheStorage, Error, Logger};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde_json::json;

use crate::config_store::WorkerConfig;
use crate::fetch::NetResponse;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];

const OFFLINE_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Gym Sync - Offline</title>
<style>
body{margin:0;min-height:100vh;display:flex;align-items:center;justify-content:center;font-family:system-ui,sans-serif;background:#111827;color:#f9fafb}
main{text-align:center;padding:2rem;max-width:28rem}
h1{font-size:1.5rem;margin-bottom:.5rem}
p{color:#d1d5db;line-height:1.5}
button{margin-top:1.5rem;padding:.75rem 1.5rem;border:0;border-radius:.5rem;background:#2563eb;color:#fff;font-size:1rem;cursor:pointer}
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>Gym Sync could not reach the server. Your saved data is still on this device; check your connection and try again.</p>
<button type="button" onclick="window.location.reload()">Try again</button>
</main>
</body>
</html>
"#;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="192" height="192" viewBox="0 0 192 192"><rect width="192" height="192" fill="#e5e7eb"/><path d="M48 136l32-40 24 28 16-20 24 32z" fill="#9ca3af"/><circle cx="128" cy="64" r="12" fill="#9ca3af"/></svg>"##;

/// What kind of response the caller was waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Document,
    Resource,
}

/// Synthesizes responses for requests nothing else could answer.
#[derive(Clone)]
pub struct OfflineFallback {
    config: Arc<WorkerConfig>,
    cache: Arc<dyn CacheStorage>,
    logger: Logger,
}

impl OfflineFallback {
    pub fn new(config: Arc<WorkerConfig>, cache: Arc<dyn CacheStorage>, logger: Logger) -> Self {
        Self { config, cache, logger }
    }

    /// Build the fallback for a request to `url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Offline` for non-image resources; there is no template
    /// for them.
    pub async fn build_fallback(&self, kind: FallbackKind, url: &Url) -> Result<NetResponse, Error> {
        match kind {
            FallbackKind::Document => Ok(self.offline_document(url)),
            FallbackKind::Resource if is_image_path(url.path()) => Ok(self.placeholder_image(url).await),
            FallbackKind::Resource => {
                self.logger.debug("no fallback for offline resource", Some(&json!({ "url": url.as_str() })));
                Err(Error::Offline(url.to_string()))
            }
        }
    }

    fn offline_document(&self, url: &Url) -> NetResponse {
        self.logger.debug("serving offline page", Some(&json!({ "url": url.as_str() })));
        NetResponse::new(url.clone(), StatusCode::OK, synthesized_headers("text/html; charset=utf-8"), OFFLINE_PAGE)
    }

    async fn placeholder_image(&self, url: &Url) -> NetResponse {
        if let Ok(placeholder_url) = self.config.url_for(&self.config.placeholder_image) {
            match self
                .cache
                .match_entry(&self.config.namespace, "GET", placeholder_url.as_str())
                .await
            {
                Ok(Some(entry)) => match NetResponse::from_entry(&entry) {
                    Ok(mut response) => {
                        self.logger.debug("serving cached placeholder image", Some(&json!({ "url": url.as_str() })));
                        response.url = url.clone();
                        return response;
                    }
                    Err(e) => self.logger.error("cached placeholder unreadable", Some(&json!({ "error": e.to_string() }))),
                },
                Ok(None) => {}
                Err(e) => self.logger.error("placeholder lookup failed", Some(&json!({ "error": e.to_string() }))),
            }
        }

        self.logger.debug("serving built-in placeholder image", Some(&json!({ "url": url.as_str() })));
        NetResponse::new(url.clone(), StatusCode::OK, synthesized_headers("image/svg+xml"), PLACEHOLDER_SVG)
    }
}

fn synthesized_headers(content_type: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers
}

/// Whether the path ends in a known image extension.
pub fn is_image_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
