//! Persistent store of mutations waiting to be replayed.
//!
//! Rows are keyed by an auto-incrementing id; listing returns them in that
//! order. Only the sync layer writes here: the queuer inserts, the sync engine
//! deletes after a successful replay.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{format_datetime, parse_datetime, Database};
use crate::net::HttpRequest;

/// A persisted mutation awaiting replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
  pub id: i64,
  pub url: String,
  pub method: String,
  pub headers: BTreeMap<String, String>,
  pub body: Option<String>,
  /// Category tag such as "patients"; some callers omit it
  pub entity_type: Option<String>,
  pub entity_id: Option<String>,
  pub queued_at: DateTime<Utc>,
}

impl QueuedRequest {
  /// Rebuild the HTTP request for replay.
  pub fn to_http(&self) -> HttpRequest {
    HttpRequest {
      method: self.method.clone(),
      url: self.url.clone(),
      headers: self.headers.clone(),
      body: self.body.clone(),
    }
  }

  /// Short label used in logs: `PATCH /api/patients/7/`.
  pub fn action(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

/// Fields supplied when queuing; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQueuedRequest {
  pub request: HttpRequest,
  pub entity_type: Option<String>,
  pub entity_id: Option<String>,
}

/// SQLite-backed request store.
#[derive(Clone)]
pub struct RequestStore {
  db: Database,
}

impl RequestStore {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Persist a request and return its id.
  pub fn enqueue(&self, new: &NewQueuedRequest) -> Result<i64> {
    let conn = self.db.conn()?;
    let headers = serde_json::to_string(&new.request.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT INTO pending_requests (url, method, headers, body, entity_type, entity_id, queued_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          new.request.url,
          new.request.method.to_uppercase(),
          headers,
          new.request.body,
          new.entity_type,
          new.entity_id,
          format_datetime(&Utc::now()),
        ],
      )
      .map_err(|e| eyre!("Failed to queue request: {}", e))?;

    Ok(conn.last_insert_rowid())
  }

  /// All queued requests in storage order.
  pub fn list(&self) -> Result<Vec<QueuedRequest>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT id, url, method, headers, body, entity_type, entity_id, queued_at
         FROM pending_requests ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], read_row)
      .map_err(|e| eyre!("Failed to query pending requests: {}", e))?;

    let mut requests = Vec::new();
    for row in rows {
      let raw = row.map_err(|e| eyre!("Failed to read pending request: {}", e))?;
      requests.push(raw.into_request()?);
    }
    Ok(requests)
  }

  pub fn get(&self, id: i64) -> Result<Option<QueuedRequest>> {
    let conn = self.db.conn()?;
    let raw = conn
      .query_row(
        "SELECT id, url, method, headers, body, entity_type, entity_id, queued_at
         FROM pending_requests WHERE id = ?",
        params![id],
        read_row,
      )
      .optional()
      .map_err(|e| eyre!("Failed to load pending request {}: {}", id, e))?;

    raw.map(RawRow::into_request).transpose()
  }

  /// Delete a request. Returns false if it was already gone.
  pub fn remove(&self, id: i64) -> Result<bool> {
    let deleted = self
      .db
      .conn()?
      .execute("DELETE FROM pending_requests WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove pending request {}: {}", id, e))?;
    Ok(deleted > 0)
  }

  pub fn count(&self) -> Result<usize> {
    let count: i64 = self
      .db
      .conn()?
      .query_row("SELECT COUNT(*) FROM pending_requests", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count pending requests: {}", e))?;
    Ok(count as usize)
  }

  /// Drop every queued request.
  pub fn clear(&self) -> Result<usize> {
    self
      .db
      .conn()?
      .execute("DELETE FROM pending_requests", [])
      .map_err(|e| eyre!("Failed to clear pending requests: {}", e))
  }
}

struct RawRow {
  id: i64,
  url: String,
  method: String,
  headers: String,
  body: Option<String>,
  entity_type: Option<String>,
  entity_id: Option<String>,
  queued_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
  Ok(RawRow {
    id: row.get(0)?,
    url: row.get(1)?,
    method: row.get(2)?,
    headers: row.get(3)?,
    body: row.get(4)?,
    entity_type: row.get(5)?,
    entity_id: row.get(6)?,
    queued_at: row.get(7)?,
  })
}

impl RawRow {
  fn into_request(self) -> Result<QueuedRequest> {
    let headers = serde_json::from_str(&self.headers)
      .map_err(|e| eyre!("Corrupt headers on pending request {}: {}", self.id, e))?;
    Ok(QueuedRequest {
      id: self.id,
      url: self.url,
      method: self.method,
      headers,
      body: self.body,
      entity_type: self.entity_type,
      entity_id: self.entity_id,
      queued_at: parse_datetime(&self.queued_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn store() -> RequestStore {
    RequestStore::new(Database::open_in_memory().unwrap())
  }

  fn patch_patient(id: u32, body: &str) -> NewQueuedRequest {
    let mut request = HttpRequest::get(format!("/api/patients/{}/", id));
    request.method = "patch".to_string();
    request.body = Some(body.to_string());
    request
      .headers
      .insert("Content-Type".to_string(), "application/json".to_string());
    NewQueuedRequest {
      request,
      entity_type: Some("patients".to_string()),
      entity_id: Some(id.to_string()),
    }
  }

  #[test]
  fn test_empty_store() {
    let store = store();
    assert_eq!(store.count().unwrap(), 0);
    assert!(store.list().unwrap().is_empty());
  }

  #[test]
  fn test_enqueue_assigns_increasing_ids() {
    let store = store();
    let first = store.enqueue(&patch_patient(1, "{}")).unwrap();
    let second = store.enqueue(&patch_patient(2, "{}")).unwrap();

    assert!(second > first);
    assert_eq!(store.count().unwrap(), 2);
  }

  #[test]
  fn test_list_preserves_storage_order_and_fields() {
    let store = store();
    store
      .enqueue(&patch_patient(7, r#"{"first_name":"Jane"}"#))
      .unwrap();
    store.enqueue(&patch_patient(8, r#"{"last_name":"Doe"}"#)).unwrap();

    let queued = store.list().unwrap();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].url, "/api/patients/7/");
    assert_eq!(queued[0].method, "PATCH");
    assert_eq!(queued[0].body.as_deref(), Some(r#"{"first_name":"Jane"}"#));
    assert_eq!(queued[0].entity_id.as_deref(), Some("7"));
    assert_eq!(
      queued[0].headers.get("Content-Type").map(String::as_str),
      Some("application/json")
    );
    assert_eq!(queued[1].entity_id.as_deref(), Some("8"));
  }

  #[test]
  fn test_remove_is_idempotent() {
    let store = store();
    let id = store.enqueue(&patch_patient(1, "{}")).unwrap();

    assert!(store.remove(id).unwrap());
    assert!(!store.remove(id).unwrap());
    assert!(store.get(id).unwrap().is_none());
  }

  #[test]
  fn test_entity_identity_is_optional() {
    let store = store();
    let mut new = patch_patient(1, "{}");
    new.entity_type = None;
    new.entity_id = None;
    let id = store.enqueue(&new).unwrap();

    let queued = store.get(id).unwrap().unwrap();
    assert_eq!(queued.entity_type, None);
    assert_eq!(queued.action(), "PATCH /api/patients/1/");
  }

  #[test]
  fn test_clear_removes_everything() {
    let store = store();
    store.enqueue(&patch_patient(1, "{}")).unwrap();
    store.enqueue(&patch_patient(2, "{}")).unwrap();

    assert_eq!(store.clear().unwrap(), 2);
    assert_eq!(store.count().unwrap(), 0);
  }
}
