//! Append-only diagnostic log of replay attempts.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::params;
use serde::Serialize;
use std::fmt;

use crate::db::{format_datetime, parse_datetime, Database};

/// Outcome recorded for one replay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
  Success,
  Error,
  Conflict,
}

impl LogStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::Error => "error",
      Self::Conflict => "conflict",
    }
  }

  fn parse(s: &str) -> Result<Self> {
    match s {
      "success" => Ok(Self::Success),
      "error" => Ok(Self::Error),
      "conflict" => Ok(Self::Conflict),
      other => Err(eyre!("Unknown sync log status '{}'", other)),
    }
  }
}

impl fmt::Display for LogStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncLogEntry {
  pub id: i64,
  pub timestamp: DateTime<Utc>,
  pub action: String,
  pub status: LogStatus,
  pub details: String,
  pub entity_type: String,
  pub entity_id: String,
}

#[derive(Clone)]
pub struct SyncLog {
  db: Database,
}

impl SyncLog {
  pub fn new(db: Database) -> Self {
    Self { db }
  }

  /// Append an entry. Missing entity identity is recorded as "unknown".
  pub fn append(
    &self,
    action: &str,
    status: LogStatus,
    details: &str,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
  ) -> Result<()> {
    self
      .db
      .conn()?
      .execute(
        "INSERT INTO sync_log (timestamp, action, status, details, entity_type, entity_id)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
          format_datetime(&Utc::now()),
          action,
          status.as_str(),
          details,
          entity_type.unwrap_or("unknown"),
          entity_id.unwrap_or("unknown"),
        ],
      )
      .map_err(|e| eyre!("Failed to append sync log entry: {}", e))?;
    Ok(())
  }

  /// Entries newest first.
  pub fn list(&self) -> Result<Vec<SyncLogEntry>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare(
        "SELECT id, timestamp, action, status, details, entity_type, entity_id
         FROM sync_log ORDER BY id DESC",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
          row.get::<_, String>(4)?,
          row.get::<_, String>(5)?,
          row.get::<_, String>(6)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query sync log: {}", e))?;

    let mut entries = Vec::new();
    for row in rows {
      let (id, timestamp, action, status, details, entity_type, entity_id) =
        row.map_err(|e| eyre!("Failed to read sync log entry: {}", e))?;
      entries.push(SyncLogEntry {
        id,
        timestamp: parse_datetime(&timestamp)?,
        action,
        status: LogStatus::parse(&status)?,
        details,
        entity_type,
        entity_id,
      });
    }
    Ok(entries)
  }

  /// Remove every entry, returning how many were dropped.
  pub fn clear(&self) -> Result<usize> {
    self
      .db
      .conn()?
      .execute("DELETE FROM sync_log", [])
      .map_err(|e| eyre!("Failed to clear sync log: {}", e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_entries_listed_newest_first() {
    let log = SyncLog::new(Database::open_in_memory().unwrap());
    log
      .append("PATCH /api/patients/7/", LogStatus::Success, "Successfully synced", Some("patients"), Some("7"))
      .unwrap();
    log
      .append("DELETE /api/queue/3/", LogStatus::Conflict, "Conflict detected for queue 3", Some("queue"), Some("3"))
      .unwrap();

    let entries = log.list().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, LogStatus::Conflict);
    assert_eq!(entries[1].action, "PATCH /api/patients/7/");
  }

  #[test]
  fn test_missing_entity_logged_as_unknown() {
    let log = SyncLog::new(Database::open_in_memory().unwrap());
    log
      .append("POST /api/visits/", LogStatus::Error, "Failed with status 500", None, None)
      .unwrap();

    let entry = &log.list().unwrap()[0];
    assert_eq!(entry.entity_type, "unknown");
    assert_eq!(entry.entity_id, "unknown");
  }

  #[test]
  fn test_clear() {
    let log = SyncLog::new(Database::open_in_memory().unwrap());
    log.append("a", LogStatus::Success, "", None, None).unwrap();
    log.append("b", LogStatus::Error, "", None, None).unwrap();

    assert_eq!(log.clear().unwrap(), 2);
    assert!(log.list().unwrap().is_empty());
  }
}
