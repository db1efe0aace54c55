//! Core types and shared functionality for gym-sync.
//!
//! This crate provides:
//! - Namespaced response cache with SQLite backend
//! - Unified error types
//! - Configuration structures and the version manifest model
//! - The version-tagged worker logger

pub mod cache;
pub mod config;
pub mod error;
pub mod log;

pub use cache::{CacheDb, CacheEntry, CacheStorage, NamespaceInfo};
pub use config::{AppConfig, AssetManifest, CacheNamespace, ConfigError, VersionManifest};
pub use error::Error;
pub use log::Logger;
