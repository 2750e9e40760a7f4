//! Cache layer that applies per-class strategies in front of the network.

use color_eyre::{eyre::eyre, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::storage::CacheStorage;
use super::strategy::{classify, RequestClass};
use super::types::{Destination, FetchOutcome, FetchRequest};
use crate::net::{resolve_url, HttpRequest, HttpResponse, Transport};

/// Where the cache layer finds its fallbacks and which cache it writes to.
#[derive(Debug, Clone)]
pub struct CacheSettings {
  /// Application origin used to resolve relative URLs
  pub origin: Url,
  /// Current cache version key; other caches are evicted on activate
  pub cache_name: String,
  /// Page served for failed navigations
  pub offline_page: String,
  /// Image served for failed image fetches
  pub image_placeholder: String,
}

/// Intercepts GET traffic and answers from network or cache.
///
/// This layer sits between the application and the transport, the way a
/// service worker sits between a page and the browser's network stack.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  transport: Arc<dyn Transport>,
  settings: CacheSettings,
}

impl<S: CacheStorage> CacheLayer<S> {
  pub fn new(storage: S, transport: Arc<dyn Transport>, settings: CacheSettings) -> Self {
    Self {
      storage: Arc::new(storage),
      transport,
      settings,
    }
  }

  pub fn settings(&self) -> &CacheSettings {
    &self.settings
  }

  pub(super) fn storage(&self) -> &S {
    &self.storage
  }

  pub(super) fn transport(&self) -> &dyn Transport {
    self.transport.as_ref()
  }

  pub(super) fn resolve(&self, raw: &str) -> Result<String> {
    Ok(resolve_url(&self.settings.origin, raw)?.to_string())
  }

  /// Handle a request. Returns `None` for requests the layer does not
  /// intercept (non-GET, non-http, browser extensions).
  pub async fn handle(&self, request: &FetchRequest) -> Result<Option<FetchOutcome>> {
    let url = self.resolve(&request.url)?;

    let outcome = match classify(request, &url) {
      RequestClass::Passthrough => return Ok(None),
      RequestClass::Api => self.network_first(&url).await?,
      RequestClass::Navigation => self.navigate(&url).await?,
      RequestClass::Static => self.cache_first(&url, request.destination).await?,
    };

    Ok(Some(outcome))
  }

  /// Network first for API reads.
  ///
  /// 1. Try the network; store successful responses
  /// 2. On network failure, return the cached copy
  /// 3. Otherwise return an offline JSON envelope
  async fn network_first(&self, url: &str) -> Result<FetchOutcome> {
    match self.transport.send(HttpRequest::get(url)).await {
      Ok(response) => {
        if response.is_success() {
          self.store(url, &response);
        }
        Ok(FetchOutcome::from_network(response))
      }
      Err(e) => {
        debug!("{} unreachable ({}), trying cache", url, e);
        if let Some(cached) = self.lookup(url)? {
          return Ok(FetchOutcome::from_cache(cached.response, cached.cached_at));
        }
        let envelope = json!({
          "error": "You are offline and this data is not cached.",
          "offline": true,
        });
        Ok(FetchOutcome::offline(HttpResponse::json(200, &envelope), None))
      }
    }
  }

  /// Network first for navigations, falling back to the cached offline page.
  async fn navigate(&self, url: &str) -> Result<FetchOutcome> {
    match self.transport.send(HttpRequest::get(url)).await {
      Ok(response) => Ok(FetchOutcome::from_network(response)),
      Err(e) => {
        debug!("Navigation to {} failed ({}), serving offline page", url, e);
        let offline_page = self.resolve(&self.settings.offline_page)?;
        match self.lookup(&offline_page)? {
          Some(cached) => Ok(FetchOutcome::offline(cached.response, Some(cached.cached_at))),
          None => {
            let mut response = HttpResponse::new(503, "You are offline.");
            response
              .headers
              .insert("content-type".to_string(), "text/plain".to_string());
            Ok(FetchOutcome::offline(response, None))
          }
        }
      }
    }
  }

  /// Cache first for static assets, falling back to network, then to a
  /// placeholder for images.
  async fn cache_first(&self, url: &str, destination: Destination) -> Result<FetchOutcome> {
    if let Some(cached) = self.lookup(url)? {
      return Ok(FetchOutcome::from_cache(cached.response, cached.cached_at));
    }

    match self.transport.send(HttpRequest::get(url)).await {
      Ok(response) => {
        if response.is_success() {
          self.store(url, &response);
        }
        Ok(FetchOutcome::from_network(response))
      }
      Err(e) if destination == Destination::Image => {
        let placeholder = self.resolve(&self.settings.image_placeholder)?;
        match self.lookup(&placeholder)? {
          Some(cached) => Ok(FetchOutcome::offline(cached.response, Some(cached.cached_at))),
          None => Err(eyre!("{} unavailable offline and no placeholder cached: {}", url, e)),
        }
      }
      Err(e) => Err(eyre!("{} unavailable offline: {}", url, e)),
    }
  }

  fn lookup(&self, url: &str) -> Result<Option<super::storage::CachedResponse>> {
    self.storage.match_url(&self.settings.cache_name, url)
  }

  /// Write-through is best effort; a storage failure never fails the fetch.
  fn store(&self, url: &str, response: &HttpResponse) {
    if let Err(e) = self.storage.put(&self.settings.cache_name, url, response) {
      warn!("Failed to cache {}: {}", url, e);
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      transport: Arc::clone(&self.transport),
      settings: self.settings.clone(),
    }
  }
}
