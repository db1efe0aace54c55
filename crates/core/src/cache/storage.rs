//! [`CacheStorage`] implementation for the SQLite store.

use async_trait::async_trait;

use super::{CacheDb, CacheEntry, CacheStorage, NamespaceInfo};
use crate::Error;
use crate::config::CacheNamespace;

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_namespace(&self, namespace: &CacheNamespace) -> Result<(), Error> {
        self.ensure_namespace(namespace).await
    }

    async fn match_entry(
        &self, namespace: &CacheNamespace, method: &str, url: &str,
    ) -> Result<Option<CacheEntry>, Error> {
        self.get(namespace, method, url).await
    }

    async fn put_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        self.put(entry).await
    }

    async fn delete_entry(&self, namespace: &CacheNamespace, method: &str, url: &str) -> Result<bool, Error> {
        self.delete(namespace, method, url).await
    }

    async fn keys(&self, namespace: &CacheNamespace) -> Result<Vec<String>, Error> {
        self.entry_urls(namespace).await
    }

    async fn namespaces(&self) -> Result<Vec<CacheNamespace>, Error> {
        self.list_namespaces().await
    }

    async fn delete_namespace(&self, namespace: &CacheNamespace) -> Result<bool, Error> {
        self.drop_namespace(namespace).await
    }

    async fn namespace_info(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.namespace_stats().await
    }
}
