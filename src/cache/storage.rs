//! Response cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::db::{format_datetime, parse_datetime, Database};
use crate::net::HttpResponse;

/// A response read back from the cache.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: HttpResponse,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

/// Trait for response cache backends.
///
/// Responses live in named caches (one per cache version) and are keyed by
/// absolute URL.
pub trait CacheStorage: Send + Sync {
  /// Store (or replace) the response for a URL.
  fn put(&self, cache_name: &str, url: &str, response: &HttpResponse) -> Result<()>;

  /// Store several responses atomically: either all are written or none.
  fn put_all(&self, cache_name: &str, entries: &[(String, HttpResponse)]) -> Result<()>;

  /// Look up the cached response for a URL.
  fn match_url(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>>;

  /// Names of every cache holding at least one response.
  fn cache_names(&self) -> Result<Vec<String>>;

  /// Drop a whole cache. Returns the number of responses removed.
  fn delete_cache(&self, cache_name: &str) -> Result<usize>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn put(&self, _cache_name: &str, _url: &str, _response: &HttpResponse) -> Result<()> {
    Ok(()) // Discard
  }

  fn put_all(&self, _cache_name: &str, _entries: &[(String, HttpResponse)]) -> Result<()> {
    Ok(()) // Discard
  }

  fn match_url(&self, _cache_name: &str, _url: &str) -> Result<Option<CachedResponse>> {
    Ok(None) // Always miss
  }

  fn cache_names(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }

  fn delete_cache(&self, _cache_name: &str) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based response storage in the shared offline database.
pub struct SqliteStorage {
  db: Database,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn put(&self, cache_name: &str, url: &str, response: &HttpResponse) -> Result<()> {
    let conn = self.db.conn()?;
    insert_response(&conn, cache_name, url, response)
  }

  fn put_all(&self, cache_name: &str, entries: &[(String, HttpResponse)]) -> Result<()> {
    let mut conn = self.db.conn()?;
    // Rolls back on drop unless committed
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (url, response) in entries {
      insert_response(&tx, cache_name, url, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn match_url(&self, cache_name: &str, url: &str) -> Result<Option<CachedResponse>> {
    let conn = self.db.conn()?;

    let row: Option<(u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM response_cache
         WHERE cache_name = ? AND key_hash = ?",
        params![cache_name, cache_key(url)],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query response cache: {}", e))?;

    match row {
      Some((status, headers, body, cached_at)) => {
        let headers: BTreeMap<String, String> = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;
        Ok(Some(CachedResponse {
          response: HttpResponse {
            status,
            headers,
            body,
          },
          cached_at: parse_datetime(&cached_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn cache_names(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT DISTINCT cache_name FROM response_cache ORDER BY cache_name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete_cache(&self, cache_name: &str) -> Result<usize> {
    self
      .db
      .conn()?
      .execute(
        "DELETE FROM response_cache WHERE cache_name = ?",
        params![cache_name],
      )
      .map_err(|e| eyre!("Failed to delete cache {}: {}", cache_name, e))
  }
}

fn insert_response(
  conn: &Connection,
  cache_name: &str,
  url: &str,
  response: &HttpResponse,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO response_cache (cache_name, key_hash, url, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, ?, ?)",
      params![
        cache_name,
        cache_key(url),
        url,
        response.status,
        headers,
        response.body,
        format_datetime(&Utc::now()),
      ],
    )
    .map_err(|e| eyre!("Failed to store response for {}: {}", url, e))?;

  Ok(())
}

/// SHA256 of the URL for stable, fixed-length keys.
fn cache_key(url: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  hex::encode(hasher.finalize())
}
