//! Service-worker lifecycle: install, activate, fetch and background sync.

use color_eyre::{eyre::eyre, Result};
use tracing::info;

use super::layer::CacheLayer;
use super::storage::CacheStorage;
use super::types::{FetchOutcome, FetchRequest};
use crate::net::HttpRequest;
use crate::sync::{SyncEngine, SyncOutcome};

/// The only background-sync tag the worker responds to.
pub const SYNC_TAG: &str = "sync-pending-data";

pub struct ServiceWorker<S: CacheStorage> {
  cache: CacheLayer<S>,
  engine: SyncEngine,
  static_assets: Vec<String>,
}

impl<S: CacheStorage> ServiceWorker<S> {
  pub fn new(cache: CacheLayer<S>, engine: SyncEngine, static_assets: Vec<String>) -> Self {
    Self {
      cache,
      engine,
      static_assets,
    }
  }

  /// Pre-warm the current cache with the static asset list.
  ///
  /// Every asset must fetch successfully before anything is stored.
  pub async fn install(&self) -> Result<usize> {
    let mut entries = Vec::with_capacity(self.static_assets.len());

    for asset in &self.static_assets {
      let url = self.cache.resolve(asset)?;
      let response = self
        .cache
        .transport()
        .send(HttpRequest::get(url.clone()))
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

      if !response.is_success() {
        return Err(eyre!("Failed to fetch {}: HTTP {}", url, response.status));
      }
      entries.push((url, response));
    }

    let cache_name = &self.cache.settings().cache_name;
    self.cache.storage().put_all(cache_name, &entries)?;
    info!(count = entries.len(), cache = %cache_name, "Static assets cached");

    Ok(entries.len())
  }

  /// Evict every cache other than the current version. Returns the evicted names.
  pub async fn activate(&self) -> Result<Vec<String>> {
    let current = &self.cache.settings().cache_name;
    let mut evicted = Vec::new();

    for name in self.cache.storage().cache_names()? {
      if &name != current {
        let removed = self.cache.storage().delete_cache(&name)?;
        info!(cache = %name, removed, "Evicted stale cache");
        evicted.push(name);
      }
    }

    Ok(evicted)
  }

  /// Intercept a fetch. `None` means the request is not handled here.
  pub async fn fetch(&self, request: &FetchRequest) -> Result<Option<FetchOutcome>> {
    self.cache.handle(request).await
  }

  /// Handle a background-sync event. Unknown tags are ignored.
  pub async fn sync(&self, tag: &str) -> Option<SyncOutcome> {
    if tag != SYNC_TAG {
      return None;
    }
    Some(self.engine.sync_now().await)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::layer::CacheSettings;
  use crate::cache::storage::SqliteStorage;
  use crate::cache::types::CacheSource;
  use crate::db::Database;
  use crate::net::mock::MockTransport;
  use crate::net::{HttpResponse, TransportError};
  use crate::sync::SyncContext;
  use std::sync::Arc;
  use url::Url;

  const ASSETS: [&str; 3] = ["/", "/offline", "/icons/placeholder.png"];

  fn worker(transport: Arc<MockTransport>, cache_name: &str, db: Database) -> ServiceWorker<SqliteStorage> {
    let ctx = SyncContext::init(db.clone(), transport.clone(), true).unwrap();
    let settings = CacheSettings {
      origin: Url::parse("https://hmis.local").unwrap(),
      cache_name: cache_name.to_string(),
      offline_page: "/offline".to_string(),
      image_placeholder: "/icons/placeholder.png".to_string(),
    };
    let cache = CacheLayer::new(SqliteStorage::new(db), transport, settings);
    ServiceWorker::new(
      cache,
      ctx.engine().clone(),
      ASSETS.iter().map(|s| s.to_string()).collect(),
    )
  }

  #[tokio::test]
  async fn test_install_prewarms_assets() {
    let transport = Arc::new(MockTransport::new(|r| Ok(HttpResponse::new(200, r.url.clone()))));
    let worker = worker(transport.clone(), "hms-cache-v1", Database::open_in_memory().unwrap());

    assert_eq!(worker.install().await.unwrap(), 3);

    // Now fully offline: navigations get the pre-warmed offline page
    transport.set_handler(|_| Err(TransportError::Network("offline".to_string())));
    let outcome = worker
      .fetch(&FetchRequest::navigate("/patients"))
      .await
      .unwrap()
      .unwrap();
    assert_eq!(outcome.source, CacheSource::Offline);
    assert_eq!(outcome.response.text(), "https://hmis.local/offline");
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let transport = Arc::new(MockTransport::new(|r| {
      if r.url.ends_with("placeholder.png") {
        Ok(HttpResponse::new(404, ""))
      } else {
        Ok(HttpResponse::new(200, "ok"))
      }
    }));
    let db = Database::open_in_memory().unwrap();
    let worker = worker(transport, "hms-cache-v1", db.clone());

    assert!(worker.install().await.is_err());
    assert!(SqliteStorage::new(db).cache_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_activate_evicts_other_versions() {
    let db = Database::open_in_memory().unwrap();
    let storage = SqliteStorage::new(db.clone());
    storage
      .put("hms-cache-v0", "https://hmis.local/", &HttpResponse::new(200, "old"))
      .unwrap();
    storage
      .put("hms-cache-v1", "https://hmis.local/", &HttpResponse::new(200, "new"))
      .unwrap();

    let worker = worker(Arc::new(MockTransport::unreachable()), "hms-cache-v1", db);
    let evicted = worker.activate().await.unwrap();

    assert_eq!(evicted, vec!["hms-cache-v0"]);
    assert_eq!(storage.cache_names().unwrap(), vec!["hms-cache-v1"]);
  }

  #[tokio::test]
  async fn test_sync_tag_runs_engine() {
    let transport = Arc::new(MockTransport::new(|_| Ok(HttpResponse::new(200, "{}"))));
    let worker = worker(transport.clone(), "hms-cache-v1", Database::open_in_memory().unwrap());

    assert!(worker.sync("some-other-tag").await.is_none());

    let outcome = worker.sync(SYNC_TAG).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.message, "No changes to sync");
  }
}
