//! Named caches and their request/response entries.
//!
//! `CacheDb` holds any number of named caches. A `Cache` handle is obtained
//! with [`CacheDb::open_cache`], which creates the cache on first use.
//! Entries are keyed by request method and normalized URL.
//!
//! Matching is by method and URL only; `Vary` headers are not consulted.
//! Header values are stored as raw bytes (hex in the `headers_json` column)
//! so values that are not valid UTF-8 survive a round trip.

use super::connection::CacheDb;
use super::hash::compute_request_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response snapshot together with the request it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Response headers in wire order; values are raw bytes.
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    pub cached_at: String,
}

impl CacheEntry {
    /// Storage key of the request this entry answers.
    pub fn key(&self) -> String {
        compute_request_key(&self.method, &self.url)
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CacheEntry, String)> {
        let headers_json: String = row.get(3)?;
        let entry = CacheEntry {
            method: row.get(0)?,
            url: row.get(1)?,
            status: row.get(2)?,
            headers: Vec::new(),
            body: row.get(4)?,
            cached_at: row.get(5)?,
        };
        Ok((entry, headers_json))
    }
}

/// Request descriptor listed by [`Cache::keys`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CachedRequest {
    pub method: String,
    pub url: String,
    pub cached_at: String,
}

/// Handle to one named cache inside the storage.
#[derive(Debug, Clone)]
pub struct Cache {
    db: CacheDb,
    name: String,
}

const ENTRY_COLUMNS: &str = "e.method, e.url, e.status, e.headers_json, e.body, e.cached_at";

fn decode(row: Option<(CacheEntry, String)>) -> Result<Option<CacheEntry>, Error> {
    match row {
        Some((mut entry, headers_json)) => {
            entry.headers = decode_headers(&headers_json)?;
            Ok(Some(entry))
        }
        None => Ok(None),
    }
}

fn encode_headers(headers: &[(String, Vec<u8>)]) -> Result<String, Error> {
    let encoded: Vec<(&str, String)> = headers.iter().map(|(name, value)| (name.as_str(), hex::encode(value))).collect();
    Ok(serde_json::to_string(&encoded)?)
}

fn decode_headers(headers_json: &str) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let encoded: Vec<(String, String)> = serde_json::from_str(headers_json)?;
    encoded
        .into_iter()
        .map(|(name, value)| {
            let bytes = hex::decode(&value).map_err(|e| Error::CorruptEntry(format!("header {name}: {e}")))?;
            Ok((name, bytes))
        })
        .collect()
}

impl CacheDb {
    /// Open the named cache, creating it if absent.
    pub async fn open_cache(&self, name: &str) -> Result<Cache, Error> {
        let cache_name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO caches (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![cache_name, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Cache { db: self.clone(), name: name.to_string() })
    }

    /// Check whether a cache with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all caches, in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY created_at ASC, rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up across every cache, oldest cache first.
    ///
    /// Returns the first matching entry, or None.
    pub async fn match_request(&self, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let key = compute_request_key(method, url);
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(CacheEntry, String)>, Error> {
                let sql = format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e JOIN caches c ON c.name = e.cache_name
                     WHERE e.key_hash = ?1
                     ORDER BY c.created_at ASC, c.rowid ASC LIMIT 1"
                );
                match conn.query_row(&sql, params![key], CacheEntry::from_row) {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        decode(row)
    }
}

impl Cache {
    /// Cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a batch of entries in one transaction.
    ///
    /// Either every entry is written or none is. Existing entries with the
    /// same request key are replaced; other entries are left untouched.
    /// Returns the number of entries written.
    pub async fn put_all(&self, entries: Vec<CacheEntry>) -> Result<usize, Error> {
        let name = self.name.clone();
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let headers_json = encode_headers(&entry.headers)?;
            rows.push((entry.key(), headers_json, entry));
        }

        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (
                            cache_name, key_hash, method, url, status, headers_json, body, cached_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                        ON CONFLICT(cache_name, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            cached_at = excluded.cached_at",
                    )?;
                    for (key, headers_json, entry) in &rows {
                        stmt.execute(params![
                            &name,
                            key,
                            &entry.method,
                            &entry.url,
                            entry.status,
                            headers_json,
                            &entry.body,
                            &entry.cached_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look a request up in this cache only.
    pub async fn match_request(&self, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let name = self.name.clone();
        let key = compute_request_key(method, url);
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(CacheEntry, String)>, Error> {
                let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.cache_name = ?1 AND e.key_hash = ?2");
                match conn.query_row(&sql, params![name, key], CacheEntry::from_row) {
                    Ok(found) => Ok(Some(found)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        decode(row)
    }

    /// Request descriptors stored in this cache, in insertion order.
    pub async fn keys(&self) -> Result<Vec<CachedRequest>, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<CachedRequest>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, cached_at FROM entries WHERE cache_name = ?1 ORDER BY rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![name], |row| {
                        Ok(CachedRequest { method: row.get(0)?, url: row.get(1)?, cached_at: row.get(2)? })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this cache.
    pub async fn len(&self) -> Result<u64, Error> {
        let name = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE cache_name = ?1", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Whether this cache holds no entries.
    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }
}
