//! Online/offline tracking and the observer task that syncs on reconnect.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::engine::SyncEngine;
use crate::net::{HttpRequest, Transport};

/// A change in the runtime online flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  WentOnline,
  WentOffline,
}

/// Runtime online flag. Not persisted; every process starts from its own view.
#[derive(Clone)]
pub struct Connectivity {
  tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
  pub fn new(online: bool) -> Self {
    let (tx, _rx) = watch::channel(online);
    Self { tx: Arc::new(tx) }
  }

  pub fn is_online(&self) -> bool {
    *self.tx.borrow()
  }

  /// Publish the current state. Returns the transition if the flag changed.
  pub fn set_online(&self, online: bool) -> Option<Transition> {
    let changed = self.tx.send_if_modified(|current| {
      if *current == online {
        false
      } else {
        *current = online;
        true
      }
    });

    match (changed, online) {
      (false, _) => None,
      (true, true) => Some(Transition::WentOnline),
      (true, false) => Some(Transition::WentOffline),
    }
  }

  /// Receiver for UI consumers that want to react to changes.
  pub fn subscribe(&self) -> watch::Receiver<bool> {
    self.tx.subscribe()
  }
}

/// Timing knobs for the observer tasks.
#[derive(Debug, Clone, Default)]
pub struct ObserverOptions {
  /// Periodically sync while online and changes are pending
  pub auto_sync_interval: Option<Duration>,
  /// Periodically request this URL to detect connectivity changes
  pub health_check: Option<(String, Duration)>,
}

/// Reacts to connectivity transitions by triggering the sync engine.
pub struct ConnectivityObserver;

impl ConnectivityObserver {
  /// Start the observer (and the health check, if configured).
  pub fn spawn(
    connectivity: Connectivity,
    engine: SyncEngine,
    transport: Arc<dyn Transport>,
    options: ObserverOptions,
  ) -> ObserverHandle {
    let mut tasks = Vec::new();

    // Subscribe before any task runs so a transition published right after
    // `spawn` returns is still seen as a change.
    let rx = connectivity.subscribe();

    if let Some((url, every)) = options.health_check {
      let connectivity = connectivity.clone();
      tasks.push(tokio::spawn(health_check_loop(connectivity, transport, url, every)));
    }

    tasks.push(tokio::spawn(observe_loop(
      connectivity,
      rx,
      engine,
      options.auto_sync_interval,
    )));

    ObserverHandle { tasks }
  }
}

/// Owns the observer tasks; dropping it without `shutdown` leaves them running.
pub struct ObserverHandle {
  tasks: Vec<JoinHandle<()>>,
}

impl ObserverHandle {
  /// Stop observing. A sync already in flight is aborted with its task.
  pub fn shutdown(self) {
    for task in self.tasks {
      task.abort();
    }
  }
}

async fn observe_loop(
  connectivity: Connectivity,
  mut rx: watch::Receiver<bool>,
  engine: SyncEngine,
  auto_sync: Option<Duration>,
) {
  let mut ticker = auto_sync.map(auto_sync_ticker);

  loop {
    tokio::select! {
      changed = rx.changed() => {
        if changed.is_err() {
          break;
        }
        let online = *rx.borrow_and_update();
        if online {
          info!("Connection restored");
          sync_if_pending(&engine).await;
        } else {
          info!("Connection lost; mutations will be queued");
        }
      }
      _ = next_tick(&mut ticker) => {
        if connectivity.is_online() && !engine.is_syncing() {
          sync_if_pending(&engine).await;
        }
      }
    }
  }
}

/// First tick one period from now. Ticks missed during a long sync are
/// delayed, not replayed back to back.
fn auto_sync_ticker(every: Duration) -> Interval {
  let mut interval = tokio::time::interval_at(Instant::now() + every, every);
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
  interval
}

async fn sync_if_pending(engine: &SyncEngine) {
  match engine.pending_changes() {
    Ok(0) => debug!("Nothing pending, skipping sync"),
    Ok(pending) => {
      info!(pending, "Syncing pending changes");
      let outcome = engine.sync_now().await;
      info!(success = outcome.success, "{}", outcome.message);
    }
    Err(e) => warn!("Could not read pending changes: {}", e),
  }
}

async fn next_tick(ticker: &mut Option<Interval>) {
  match ticker {
    Some(interval) => {
      interval.tick().await;
    }
    None => std::future::pending().await,
  }
}

async fn health_check_loop(
  connectivity: Connectivity,
  transport: Arc<dyn Transport>,
  url: String,
  every: Duration,
) {
  let mut interval = tokio::time::interval(every);
  loop {
    interval.tick().await;
    // Any HTTP response, even an error status, means the network is up
    let online = transport.send(HttpRequest::get(url.clone())).await.is_ok();
    if let Some(transition) = connectivity.set_online(online) {
      debug!(?transition, "Health check detected connectivity change");
    }
  }
}
