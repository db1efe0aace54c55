//! Entry CRUD operations.
//!
//! Provides the request-keyed response snapshots the worker serves from.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::config::CacheNamespace;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot.
///
/// Keyed by (method, URL) inside one namespace. Only `GET` entries are
/// accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub namespace: CacheNamespace,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Build a `GET` entry stamped with the current time.
    pub fn new(
        namespace: CacheNamespace, url: impl Into<String>, status: u16, headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            namespace,
            method: "GET".into(),
            url: url.into(),
            status,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn key_hash(&self) -> String {
        compute_entry_key(&self.method, &self.url)
    }

    /// First header value with the given (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl CacheDb {
    /// Insert or replace an entry.
    ///
    /// The namespace must already exist; a write racing an eviction is
    /// dropped rather than bringing the namespace back.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-GET entries and
    /// `Error::NamespaceClosed` when the namespace does not exist.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        if !entry.method.eq_ignore_ascii_case("GET") {
            return Err(Error::InvalidInput(format!("only GET entries are cached, got {}", entry.method)));
        }

        let entry = entry.clone();
        let key_hash = entry.key_hash();
        let headers_json = serde_json::to_string(&entry.headers)?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let written = conn.execute(
                    "INSERT INTO cache_entries (
                        namespace, key_hash, method, url, status_code, headers_json, body, stored_at
                    )
                    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                    WHERE EXISTS (SELECT 1 FROM cache_namespaces WHERE name = ?1)
                    ON CONFLICT(namespace, key_hash) DO UPDATE SET
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        entry.namespace.as_str(),
                        key_hash,
                        entry.method.to_ascii_uppercase(),
                        entry.url,
                        entry.status,
                        headers_json,
                        entry.body,
                        entry.stored_at,
                    ],
                )?;

                if written == 0 {
                    return Err(Error::NamespaceClosed(entry.namespace.to_string()));
                }
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `(method, url)` in `namespace`.
    ///
    /// Returns None if nothing is stored under that key.
    pub async fn get(&self, namespace: &CacheNamespace, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let key_hash = compute_entry_key(method, url);
        let namespace = namespace.clone();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status_code, headers_json, body, stored_at
                    FROM cache_entries WHERE namespace = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![namespace.as_str(), key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((method, url, status, headers_json, body, stored_at)) => Ok(Some(CacheEntry {
                        namespace,
                        method,
                        url,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at,
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete one entry. Returns whether a row was removed.
    pub async fn delete(&self, namespace: &CacheNamespace, method: &str, url: &str) -> Result<bool, Error> {
        let key_hash = compute_entry_key(method, url);
        let namespace = namespace.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND key_hash = ?2",
                    params![namespace, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a namespace, oldest write first.
    pub async fn entry_urls(&self, namespace: &CacheNamespace) -> Result<Vec<String>, Error> {
        let namespace = namespace.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT url FROM cache_entries WHERE namespace = ?1 ORDER BY stored_at ASC, rowid ASC")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
