//! The sync context: one object, built at startup, that owns the offline
//! data layer and is handed to every consumer.

use color_eyre::Result;
use std::sync::Arc;

use super::connectivity::{Connectivity, ConnectivityObserver, ObserverHandle, ObserverOptions};
use super::engine::{SyncEngine, SyncOutcome};
use super::log::SyncLog;
use super::metadata::{MetadataStore, SyncMetadata};
use super::queuer::{MutationOutcome, RequestQueuer};
use crate::api::MutationRequest;
use crate::db::Database;
use crate::net::Transport;
use crate::queue::{QueuedRequest, RequestStore};

#[derive(Clone)]
pub struct SyncContext {
  requests: RequestStore,
  metadata: MetadataStore,
  log: SyncLog,
  engine: SyncEngine,
  queuer: RequestQueuer,
  connectivity: Connectivity,
  transport: Arc<dyn Transport>,
}

impl SyncContext {
  /// Wire up the stores and engine over an open database.
  ///
  /// The persisted sync claim is left alone: another process may be syncing
  /// right now, and a claim abandoned by a crash expires with its lease.
  pub fn init(db: Database, transport: Arc<dyn Transport>, online: bool) -> Result<Self> {
    let requests = RequestStore::new(db.clone());
    let metadata = MetadataStore::new(db.clone(), requests.clone());
    let log = SyncLog::new(db);
    let connectivity = Connectivity::new(online);

    let engine = SyncEngine::new(
      requests.clone(),
      metadata.clone(),
      log.clone(),
      transport.clone(),
      connectivity.clone(),
    );
    let queuer = RequestQueuer::new(requests.clone(), transport.clone(), connectivity.clone());

    Ok(Self {
      requests,
      metadata,
      log,
      engine,
      queuer,
      connectivity,
      transport,
    })
  }

  /// Start reacting to connectivity changes. Call `shutdown` on the handle at teardown.
  pub fn start_observer(&self, options: ObserverOptions) -> ObserverHandle {
    ConnectivityObserver::spawn(
      self.connectivity.clone(),
      self.engine.clone(),
      self.transport.clone(),
      options,
    )
  }

  pub async fn queue_operation(&self, mutation: &MutationRequest) -> Result<MutationOutcome> {
    self.queuer.queue_operation(mutation).await
  }

  pub async fn sync_now(&self) -> SyncOutcome {
    self.engine.sync_now().await
  }

  pub fn metadata(&self) -> Result<SyncMetadata> {
    self.metadata.get()
  }

  pub fn pending_requests(&self) -> Result<Vec<QueuedRequest>> {
    self.requests.list()
  }

  pub fn pending_request(&self, id: i64) -> Result<Option<QueuedRequest>> {
    self.requests.get(id)
  }

  /// Drop every queued request without sending it. Returns how many were dropped.
  pub fn discard_pending(&self) -> Result<usize> {
    self.requests.clear()
  }

  pub fn sync_log(&self) -> &SyncLog {
    &self.log
  }

  pub fn connectivity(&self) -> &Connectivity {
    &self.connectivity
  }

  pub fn engine(&self) -> &SyncEngine {
    &self.engine
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::mock::MockTransport;
  use serde_json::json;
  use std::time::Duration;

  fn context(transport: Arc<MockTransport>, online: bool) -> SyncContext {
    SyncContext::init(Database::open_in_memory().unwrap(), transport, online).unwrap()
  }

  async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
      while !condition() {
        tokio::time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .expect("condition not reached in time");
  }

  #[tokio::test]
  async fn test_offline_patch_then_sync_scenario() {
    let transport = Arc::new(MockTransport::responding(200, json!({"id": 7})));
    let ctx = context(transport.clone(), false);

    let outcome = ctx
      .queue_operation(&MutationRequest::update_patient(7, json!({"first_name": "Jane"})))
      .await
      .unwrap();
    assert!(matches!(outcome, MutationOutcome::Queued { .. }));
    assert_eq!(ctx.metadata().unwrap().pending_changes, 1);

    ctx.connectivity().set_online(true);
    let result = ctx.sync_now().await;
    assert!(result.success);

    let snapshot = ctx.metadata().unwrap();
    assert!(ctx.pending_requests().unwrap().is_empty());
    assert_eq!(snapshot.pending_changes, 0);
    assert!(snapshot.last_sync_time.is_some());

    let sent = &transport.calls()[0];
    assert_eq!(sent.method, "PATCH");
    assert_eq!(sent.url, "/api/patients/7/");
    assert_eq!(sent.body.as_deref(), Some(r#"{"first_name":"Jane"}"#));
  }

  #[tokio::test]
  async fn test_pending_equals_number_of_offline_mutations() {
    let ctx = context(Arc::new(MockTransport::unreachable()), false);

    for id in 0..5 {
      ctx
        .queue_operation(&MutationRequest::update_queue_entry(id, json!({"priority": "high"})))
        .await
        .unwrap();
    }

    assert_eq!(ctx.metadata().unwrap().pending_changes, 5);
  }

  #[tokio::test]
  async fn test_reconnect_triggers_exactly_one_sync() {
    let transport = Arc::new(MockTransport::responding(200, json!({})));
    let ctx = context(transport.clone(), false);
    ctx
      .queue_operation(&MutationRequest::delete_queue_entry(9))
      .await
      .unwrap();

    let observer = ctx.start_observer(ObserverOptions::default());
    ctx.connectivity().set_online(true);

    wait_for(|| ctx.metadata().unwrap().pending_changes == 0).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.call_count(), 1);
    assert_eq!(ctx.sync_log().list().unwrap().len(), 1);

    observer.shutdown();
  }

  #[tokio::test]
  async fn test_reconnect_without_pending_changes_does_not_sync() {
    let transport = Arc::new(MockTransport::responding(200, json!({})));
    let ctx = context(transport.clone(), false);

    let observer = ctx.start_observer(ObserverOptions::default());
    ctx.connectivity().set_online(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.call_count(), 0);
    assert!(ctx.metadata().unwrap().last_sync_time.is_none());
    observer.shutdown();
  }

  #[tokio::test]
  async fn test_going_offline_only_flips_flag() {
    let transport = Arc::new(MockTransport::responding(200, json!({})));
    let ctx = context(transport.clone(), true);
    let observer = ctx.start_observer(ObserverOptions::default());

    ctx.connectivity().set_online(false);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!ctx.connectivity().is_online());
    assert_eq!(transport.call_count(), 0);
    observer.shutdown();
  }

  #[tokio::test]
  async fn test_auto_sync_interval_drains_queue_while_online() {
    let transport = Arc::new(MockTransport::unreachable());
    let ctx = context(transport.clone(), true);

    // Queued because the live attempt fails
    ctx
      .queue_operation(&MutationRequest::create_patient(json!({"first_name": "Ama"})))
      .await
      .unwrap();
    transport.set_handler(|_| Ok(crate::net::HttpResponse::new(201, "{}")));

    let observer = ctx.start_observer(ObserverOptions {
      auto_sync_interval: Some(Duration::from_millis(20)),
      health_check: None,
    });

    wait_for(|| ctx.metadata().unwrap().pending_changes == 0).await;
    observer.shutdown();
  }

  #[tokio::test]
  async fn test_health_check_publishes_connectivity() {
    let transport = Arc::new(MockTransport::unreachable());
    let ctx = context(transport.clone(), true);

    let observer = ctx.start_observer(ObserverOptions {
      auto_sync_interval: None,
      health_check: Some(("/api/".to_string(), Duration::from_millis(10))),
    });

    wait_for(|| !ctx.connectivity().is_online()).await;

    transport.set_handler(|_| Ok(crate::net::HttpResponse::new(404, "")));
    wait_for(|| ctx.connectivity().is_online()).await;
    observer.shutdown();
  }

  #[tokio::test]
  async fn test_discard_pending_resets_count() {
    let ctx = context(Arc::new(MockTransport::unreachable()), false);
    let MutationOutcome::Queued { id, .. } = ctx
      .queue_operation(&MutationRequest::update_profile(json!({"phone": "555-0100"})))
      .await
      .unwrap()
    else {
      panic!("expected the mutation to be queued");
    };

    let queued = ctx.pending_request(id).unwrap().unwrap();
    assert_eq!(queued.url, "/api/me/");

    assert_eq!(ctx.discard_pending().unwrap(), 1);
    assert_eq!(ctx.metadata().unwrap().pending_changes, 0);
    assert!(ctx.pending_request(id).unwrap().is_none());
  }

  #[test]
  fn test_init_keeps_claim_of_running_sync() {
    let db = Database::open_in_memory().unwrap();
    let requests = RequestStore::new(db.clone());
    MetadataStore::new(db.clone(), requests)
      .claim("dashboard", chrono::Utc::now())
      .unwrap();

    let ctx = SyncContext::init(db, Arc::new(MockTransport::unreachable()), true).unwrap();
    assert!(ctx.metadata().unwrap().sync_in_progress);
  }

  #[tokio::test]
  async fn test_claim_abandoned_by_crash_does_not_block_sync() {
    let db = Database::open_in_memory().unwrap();
    let requests = RequestStore::new(db.clone());
    let crashed_at =
      chrono::Utc::now() - chrono::Duration::seconds(crate::sync::metadata::SYNC_LEASE_SECS + 60);
    MetadataStore::new(db.clone(), requests)
      .claim("crashed", crashed_at)
      .unwrap();

    let ctx = SyncContext::init(db, Arc::new(MockTransport::unreachable()), true).unwrap();
    assert!(!ctx.metadata().unwrap().sync_in_progress);

    let outcome = ctx.sync_now().await;
    assert_eq!(outcome.message, "No changes to sync");
    assert!(ctx.metadata().unwrap().last_sync_time.is_some());
  }
}
