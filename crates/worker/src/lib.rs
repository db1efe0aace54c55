//! Offline worker for gym-sync.
//!
//! This crate provides the request interception, caching strategies, offline
//! fallbacks and install/activate lifecycle that sit between the app and its
//! origin. The server crate hosts it behind an HTTP proxy.

pub mod config_store;
pub mod control;
pub mod fallback;
pub mod fetch;
pub mod intercept;
pub mod lifecycle;
pub mod registration;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config_store::{ConfigStore, WorkerConfig};
pub use control::{ControlChannel, ControlMessage, PlatformCommand};
pub use fallback::{FallbackKind, OfflineFallback};
pub use fetch::{FetchClient, FetchConfig, NetRequest, NetResponse, Network, RequestMode};
pub use intercept::{Interceptor, Route};
pub use lifecycle::{LifecycleController, PrecacheReport, WorkerState};
pub use registration::{Registration, UpdateOutcome};
pub use strategy::{CacheStrategyEngine, PreloadHandle};
pub use worker::{FetchEvent, ServiceWorker};
