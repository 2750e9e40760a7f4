//! Replays queued requests against the API.

use chrono::Utc;
use color_eyre::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::connectivity::Connectivity;
use super::log::{LogStatus, SyncLog};
use super::metadata::MetadataStore;
use crate::net::Transport;
use crate::queue::{QueuedRequest, RequestStore};

/// Summary of one `sync_now` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
  pub success: bool,
  pub message: String,
  pub succeeded: usize,
  pub conflicts: usize,
  pub failed: usize,
}

impl SyncOutcome {
  fn rejected(message: impl Into<String>) -> Self {
    Self {
      success: false,
      message: message.into(),
      succeeded: 0,
      conflicts: 0,
      failed: 0,
    }
  }
}

/// Result of replaying a single queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
  Synced,
  Conflict,
  Failed,
}

static NEXT_ENGINE: AtomicU64 = AtomicU64::new(0);

/// Drains the request store. Cheap to clone; clones share the sync lock.
///
/// Two guards keep syncs from overlapping: an in-process mutex, and a claim on
/// the shared `sync_metadata` row for other processes using the same database.
///
/// There is no retry policy: a request that fails stays queued until the next
/// sync, however many times that takes.
#[derive(Clone)]
pub struct SyncEngine {
  requests: RequestStore,
  metadata: MetadataStore,
  log: SyncLog,
  transport: Arc<dyn Transport>,
  connectivity: Connectivity,
  lock: Arc<Mutex<()>>,
  /// Identifies this engine's claim on the metadata row
  owner: Arc<str>,
}

impl SyncEngine {
  pub fn new(
    requests: RequestStore,
    metadata: MetadataStore,
    log: SyncLog,
    transport: Arc<dyn Transport>,
    connectivity: Connectivity,
  ) -> Self {
    Self {
      requests,
      metadata,
      log,
      transport,
      connectivity,
      lock: Arc::new(Mutex::new(())),
      owner: format!(
        "{}-{}",
        std::process::id(),
        NEXT_ENGINE.fetch_add(1, Ordering::Relaxed)
      )
      .into(),
    }
  }

  /// Whether a sync in this process currently holds the lock.
  pub fn is_syncing(&self) -> bool {
    self.lock.try_lock().is_err()
  }

  pub fn pending_changes(&self) -> Result<usize> {
    self.requests.count()
  }

  /// Replay every queued request once.
  ///
  /// Returns a failed outcome without touching the network when offline or
  /// when another sync is running, here or in another process. Errors are
  /// reported in the outcome, never propagated.
  pub async fn sync_now(&self) -> SyncOutcome {
    if !self.connectivity.is_online() {
      return SyncOutcome::rejected("Cannot sync while offline");
    }

    let Ok(_guard) = self.lock.try_lock() else {
      return SyncOutcome::rejected("Sync already in progress");
    };

    match self.metadata.claim(&self.owner, Utc::now()) {
      Ok(true) => {}
      Ok(false) => {
        debug!("Another process holds the sync claim");
        return SyncOutcome::rejected("Sync already in progress");
      }
      Err(e) => {
        error!("Sync error: {}", e);
        return SyncOutcome::rejected(format!("Sync failed: {}", e));
      }
    }

    match self.replay_all().await {
      Ok(outcome) => outcome,
      Err(e) => {
        error!("Sync error: {}", e);
        if let Err(e) = self.metadata.release(&self.owner) {
          warn!("Failed to clear sync flag: {}", e);
        }
        SyncOutcome::rejected(format!("Sync failed: {}", e))
      }
    }
  }

  async fn replay_all(&self) -> Result<SyncOutcome> {
    let pending = self.requests.list()?;
    if pending.is_empty() {
      self.metadata.record_sync(&self.owner, Utc::now())?;
      return Ok(SyncOutcome {
        success: true,
        message: "No changes to sync".to_string(),
        succeeded: 0,
        conflicts: 0,
        failed: 0,
      });
    }

    info!(count = pending.len(), "Replaying queued requests");

    let (mut succeeded, mut conflicts, mut failed) = (0, 0, 0);
    for request in &pending {
      match self.replay(request).await? {
        Replay::Synced => succeeded += 1,
        Replay::Conflict => conflicts += 1,
        Replay::Failed => failed += 1,
      }
      self.metadata.heartbeat(&self.owner, Utc::now())?;
    }

    self.metadata.record_sync(&self.owner, Utc::now())?;

    Ok(SyncOutcome {
      success: failed == 0,
      message: format!(
        "Sync completed: {} succeeded, {} conflicts, {} failed",
        succeeded, conflicts, failed
      ),
      succeeded,
      conflicts,
      failed,
    })
  }

  async fn replay(&self, request: &QueuedRequest) -> Result<Replay> {
    let action = request.action();

    match self.transport.send(request.to_http()).await {
      Ok(response) if response.is_success() => {
        self.requests.remove(request.id)?;
        debug!(id = request.id, "{} synced", action);
        self.record(request, LogStatus::Success, "Successfully synced");
        Ok(Replay::Synced)
      }
      Ok(response) if response.status == 409 => {
        warn!(id = request.id, "{} conflicted", action);
        let details = format!(
          "Conflict detected for {} {}",
          request.entity_type.as_deref().unwrap_or("unknown"),
          request.entity_id.as_deref().unwrap_or("unknown"),
        );
        self.record(request, LogStatus::Conflict, &details);
        Ok(Replay::Conflict)
      }
      Ok(response) => {
        warn!(id = request.id, status = response.status, "{} rejected", action);
        self.record(
          request,
          LogStatus::Error,
          &format!("Failed with status {}", response.status),
        );
        Ok(Replay::Failed)
      }
      Err(e) => {
        warn!(id = request.id, "{} failed: {}", action, e);
        self.record(request, LogStatus::Error, &format!("Exception: {}", e));
        Ok(Replay::Failed)
      }
    }
  }

  fn record(&self, request: &QueuedRequest, status: LogStatus, details: &str) {
    if let Err(e) = self.log.append(
      &request.action(),
      status,
      details,
      request.entity_type.as_deref(),
      request.entity_id.as_deref(),
    ) {
      warn!("Failed to write sync log: {}", e);
    }
  }
}
