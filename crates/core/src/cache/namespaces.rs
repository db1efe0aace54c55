//! Namespace lifecycle operations.
//!
//! Namespaces are created explicitly on install and dropped wholesale when a
//! newer deployment activates. Writes never recreate a dropped namespace.

use super::connection::CacheDb;
use crate::Error;
use crate::config::CacheNamespace;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Diagnostic summary of one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: CacheNamespace,
    pub entry_count: u64,
    pub total_bytes: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Create a namespace if it doesn't exist yet.
    pub async fn ensure_namespace(&self, namespace: &CacheNamespace) -> Result<(), Error> {
        let name = namespace.as_str().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// List namespaces, oldest first.
    pub async fn list_namespaces(&self) -> Result<Vec<CacheNamespace>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheNamespace>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_namespaces ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names.into_iter().map(CacheNamespace::from_raw).collect())
            })
            .await
            .map_err(Error::from)
    }

    /// Drop a namespace; its entries go with it through the foreign key.
    ///
    /// Returns whether the namespace existed.
    pub async fn drop_namespace(&self, namespace: &CacheNamespace) -> Result<bool, Error> {
        let name = namespace.as_str().to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_namespaces WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and byte totals per namespace.
    pub async fn namespace_stats(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<NamespaceInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT n.name, n.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                    FROM cache_namespaces n
                    LEFT JOIN cache_entries e ON e.namespace = n.name
                    GROUP BY n.name, n.created_at
                    ORDER BY n.created_at ASC, n.name ASC",
                )?;
                let infos = stmt
                    .query_map([], |row| {
                        Ok(NamespaceInfo {
                            name: CacheNamespace::from_raw(row.get::<_, String>(0)?),
                            created_at: row.get(1)?,
                            entry_count: row.get::<_, i64>(2)? as u64,
                            total_bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(infos)
            })
            .await
            .map_err(Error::from)
    }
}
