//! SQLite-backed, namespaced response cache.
//!
//! This module provides the persistent store the worker serves from, using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Isolated, versioned namespaces (one per deployment)
//! - Entries keyed by (method, URL) through SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! The [`CacheStorage`] trait is the seam the worker is written against;
//! [`CacheDb`] is its production implementation.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod namespaces;
mod storage;

use async_trait::async_trait;

pub use crate::Error;
use crate::config::CacheNamespace;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use namespaces::NamespaceInfo;

/// Namespaced response storage.
///
/// A single `put_entry` is atomic; concurrent writers to the same key resolve
/// last-writer-wins.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist yet.
    async fn open_namespace(&self, namespace: &CacheNamespace) -> Result<(), Error>;

    /// Look up the entry stored for `(method, url)` in `namespace`.
    async fn match_entry(&self, namespace: &CacheNamespace, method: &str, url: &str)
    -> Result<Option<CacheEntry>, Error>;

    /// Insert or replace an entry.
    ///
    /// Fails with `Error::NamespaceClosed` unless the entry's namespace is open.
    async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error>;

    /// Remove one entry. Returns whether it existed.
    async fn delete_entry(&self, namespace: &CacheNamespace, method: &str, url: &str) -> Result<bool, Error>;

    /// URLs stored in `namespace`, in insertion order.
    async fn keys(&self, namespace: &CacheNamespace) -> Result<Vec<String>, Error>;

    /// Every live namespace, oldest first.
    async fn namespaces(&self) -> Result<Vec<CacheNamespace>, Error>;

    /// Drop a namespace and all of its entries. Returns whether it existed.
    async fn delete_namespace(&self, namespace: &CacheNamespace) -> Result<bool, Error>;

    /// Per-namespace entry counts and sizes for diagnostics.
    async fn namespace_info(&self) -> Result<Vec<NamespaceInfo>, Error>;
}
