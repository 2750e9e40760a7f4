//! Singleton sync state.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use serde::Serialize;

use crate::db::{format_datetime, parse_datetime, Database};
use crate::queue::RequestStore;

/// A sync claim whose heartbeat is older than this is considered abandoned.
///
/// The engine renews the heartbeat after every replayed request, and each
/// request is bounded by the HTTP client timeout.
pub const SYNC_LEASE_SECS: i64 = 300;

/// Snapshot of the sync state shown by status badges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncMetadata {
  /// When the last sync attempt finished, if ever
  pub last_sync_time: Option<DateTime<Utc>>,
  /// Number of queued requests, read from the request store
  pub pending_changes: usize,
  /// A sync holds a live claim, in this process or another one
  pub sync_in_progress: bool,
}

/// Reads and writes the `sync_metadata` row.
///
/// The pending count is never stored; it is the request store's row count at
/// read time, so it cannot drift from the queue.
///
/// The in-progress flag doubles as a lease shared by every process using the
/// database: `claim` succeeds only when no other owner holds a live claim.
#[derive(Clone)]
pub struct MetadataStore {
  db: Database,
  requests: RequestStore,
}

fn lease_cutoff(now: DateTime<Utc>) -> i64 {
  now.timestamp_millis() - SYNC_LEASE_SECS * 1000
}

impl MetadataStore {
  pub fn new(db: Database, requests: RequestStore) -> Self {
    Self { db, requests }
  }

  pub fn get(&self) -> Result<SyncMetadata> {
    let (last_sync, in_progress, heartbeat): (Option<String>, bool, Option<i64>) = self
      .db
      .conn()?
      .query_row(
        "SELECT last_sync_time, sync_in_progress, sync_heartbeat FROM sync_metadata WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .map_err(|e| eyre!("Failed to read sync metadata: {}", e))?;

    let live = heartbeat.is_some_and(|at| at >= lease_cutoff(Utc::now()));

    Ok(SyncMetadata {
      last_sync_time: last_sync.as_deref().map(parse_datetime).transpose()?,
      pending_changes: self.requests.count()?,
      sync_in_progress: in_progress && live,
    })
  }

  /// Atomically take the sync claim for `owner`.
  ///
  /// Returns false when another owner holds a claim whose heartbeat is still
  /// within the lease. An expired claim is taken over.
  pub fn claim(&self, owner: &str, now: DateTime<Utc>) -> Result<bool> {
    let changed = self
      .db
      .conn()?
      .execute(
        "UPDATE sync_metadata
         SET sync_in_progress = 1, sync_owner = ?1, sync_heartbeat = ?2
         WHERE id = 1
           AND (sync_in_progress = 0 OR sync_heartbeat IS NULL OR sync_heartbeat < ?3)",
        params![owner, now.timestamp_millis(), lease_cutoff(now)],
      )
      .map_err(|e| eyre!("Failed to claim sync: {}", e))?;
    Ok(changed == 1)
  }

  /// Extend a held claim. A no-op if `owner` no longer holds it.
  pub fn heartbeat(&self, owner: &str, now: DateTime<Utc>) -> Result<()> {
    self
      .db
      .conn()?
      .execute(
        "UPDATE sync_metadata SET sync_heartbeat = ?2
         WHERE id = 1 AND sync_in_progress = 1 AND sync_owner = ?1",
        params![owner, now.timestamp_millis()],
      )
      .map_err(|e| eyre!("Failed to renew sync claim: {}", e))?;
    Ok(())
  }

  /// Give up a claim without recording a sync.
  pub fn release(&self, owner: &str) -> Result<()> {
    self
      .db
      .conn()?
      .execute(
        "UPDATE sync_metadata SET sync_in_progress = 0, sync_owner = NULL, sync_heartbeat = NULL
         WHERE id = 1 AND sync_owner = ?1",
        params![owner],
      )
      .map_err(|e| eyre!("Failed to release sync claim: {}", e))?;
    Ok(())
  }

  /// Record a finished sync attempt and release `owner`'s claim.
  pub fn record_sync(&self, owner: &str, at: DateTime<Utc>) -> Result<()> {
    let mut conn = self.db.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "UPDATE sync_metadata SET last_sync_time = ?1 WHERE id = 1",
      params![format_datetime(&at)],
    )
    .map_err(|e| eyre!("Failed to update sync metadata: {}", e))?;
    tx.execute(
      "UPDATE sync_metadata SET sync_in_progress = 0, sync_owner = NULL, sync_heartbeat = NULL
       WHERE id = 1 AND sync_owner = ?1",
      params![owner],
    )
    .map_err(|e| eyre!("Failed to release sync claim: {}", e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit sync metadata: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::HttpRequest;
  use crate::queue::NewQueuedRequest;
  use chrono::Duration;

  fn stores() -> (MetadataStore, RequestStore) {
    let db = Database::open_in_memory().unwrap();
    let requests = RequestStore::new(db.clone());
    (MetadataStore::new(db, requests.clone()), requests)
  }

  #[test]
  fn test_fresh_metadata() {
    let (metadata, _) = stores();
    let snapshot = metadata.get().unwrap();

    assert_eq!(snapshot.last_sync_time, None);
    assert_eq!(snapshot.pending_changes, 0);
    assert!(!snapshot.sync_in_progress);
  }

  #[test]
  fn test_pending_changes_follows_request_store() {
    let (metadata, requests) = stores();
    let new = NewQueuedRequest {
      request: HttpRequest::get("/api/queue/1/"),
      entity_type: None,
      entity_id: None,
    };
    let id = requests.enqueue(&new).unwrap();
    requests.enqueue(&new).unwrap();
    assert_eq!(metadata.get().unwrap().pending_changes, 2);

    requests.remove(id).unwrap();
    assert_eq!(metadata.get().unwrap().pending_changes, 1);
  }

  #[test]
  fn test_claim_is_exclusive_until_released() {
    let (metadata, _) = stores();
    let now = Utc::now();

    assert!(metadata.claim("dashboard", now).unwrap());
    assert!(metadata.get().unwrap().sync_in_progress);
    assert!(!metadata.claim("cli", now).unwrap());

    metadata.release("dashboard").unwrap();
    assert!(!metadata.get().unwrap().sync_in_progress);
    assert!(metadata.claim("cli", now).unwrap());
  }

  #[test]
  fn test_release_by_other_owner_keeps_claim() {
    let (metadata, _) = stores();
    let now = Utc::now();
    metadata.claim("dashboard", now).unwrap();

    metadata.release("cli").unwrap();
    metadata.record_sync("cli", now).unwrap();

    assert!(metadata.get().unwrap().sync_in_progress);
    assert!(!metadata.claim("cli", now).unwrap());
  }

  #[test]
  fn test_record_sync_releases_claim() {
    let (metadata, _) = stores();
    let now = Utc::now();
    metadata.claim("dashboard", now).unwrap();

    metadata.record_sync("dashboard", now).unwrap();

    let snapshot = metadata.get().unwrap();
    assert!(!snapshot.sync_in_progress);
    assert_eq!(snapshot.last_sync_time, Some(now));
  }

  #[test]
  fn test_expired_claim_is_taken_over() {
    let (metadata, _) = stores();
    let crashed_at = Utc::now() - Duration::seconds(SYNC_LEASE_SECS + 60);
    metadata.claim("crashed", crashed_at).unwrap();

    // Nobody renewed it, so it no longer counts as a running sync
    assert!(!metadata.get().unwrap().sync_in_progress);
    assert!(metadata.claim("cli", Utc::now()).unwrap());
  }

  #[test]
  fn test_heartbeat_keeps_claim_alive() {
    let (metadata, _) = stores();
    let now = Utc::now();
    metadata
      .claim("dashboard", now - Duration::seconds(SYNC_LEASE_SECS + 60))
      .unwrap();

    metadata.heartbeat("dashboard", now).unwrap();

    assert!(metadata.get().unwrap().sync_in_progress);
    assert!(!metadata.claim("cli", now).unwrap());
  }
}
