//! Request classification.
//!
//! Decides, without touching the cache or the network, whether a request is
//! passed through untouched or routed to one of the caching strategies.

use std::sync::Arc;

use reqwest::{Method, Url};

use crate::config_store::WorkerConfig;
use crate::fetch::{self, NetRequest, RequestMode};

/// Per-call classification record. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub same_origin: bool,
}

/// Why a request bypasses the caching layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassReason {
    Method,
    CrossOrigin,
    Excluded,
}

/// Where a request is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Passthrough(PassReason),
    Navigation,
    Resource,
}

/// Classifies requests against the worker's origin and exclusion list.
#[derive(Clone)]
pub struct Interceptor {
    config: Arc<WorkerConfig>,
}

impl Interceptor {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        Self { config }
    }

    pub fn classify(&self, request: &NetRequest) -> InterceptedRequest {
        InterceptedRequest {
            url: request.url.clone(),
            method: request.method.clone(),
            mode: request.mode,
            same_origin: fetch::is_same_origin(&request.url, &self.config.origin),
        }
    }

    pub fn route(&self, request: &InterceptedRequest) -> Route {
        if request.method != Method::GET {
            return Route::Passthrough(PassReason::Method);
        }
        if !request.same_origin {
            return Route::Passthrough(PassReason::CrossOrigin);
        }
        if self.config.is_excluded(request.url.path()) {
            return Route::Passthrough(PassReason::Excluded);
        }

        match request.mode {
            RequestMode::Navigate => Route::Navigation,
            RequestMode::Subresource => Route::Resource,
        }
    }

    pub fn intercept(&self, request: &NetRequest) -> Route {
        self.route(&self.classify(request))
    }
}
