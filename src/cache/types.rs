//! Request descriptors and fetch results for the cache layer.

use chrono::{DateTime, Utc};

use crate::net::HttpResponse;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// A top-level page navigation
  Navigate,
  #[default]
  Other,
}

/// What the response will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  Document,
  Image,
  #[default]
  Other,
}

/// A request intercepted by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub method: String,
  /// Absolute, or relative to the application origin
  pub url: String,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl FetchRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.into(),
      mode: RequestMode::Other,
      destination: Destination::Other,
    }
  }

  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      mode: RequestMode::Navigate,
      destination: Destination::Document,
      ..Self::get(url)
    }
  }

  pub fn image(url: impl Into<String>) -> Self {
    Self {
      destination: Destination::Image,
      ..Self::get(url)
    }
  }
}

/// Result of a handled fetch, including where the response came from.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
  /// The response to hand back
  pub response: HttpResponse,
  /// Where the response came from
  pub source: CacheSource,
  /// When the response was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl FetchOutcome {
  /// Fresh response from the network.
  pub fn from_network(response: HttpResponse) -> Self {
    Self {
      response,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Response served from the cache for the requested URL.
  pub fn from_cache(response: HttpResponse, cached_at: DateTime<Utc>) -> Self {
    Self {
      response,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Offline substitute: a fallback page, a placeholder, or a synthetic envelope.
  pub fn offline(response: HttpResponse, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      response,
      source: CacheSource::Offline,
      cached_at,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cached copy of the requested URL
  Cache,
  /// Network unavailable, serving a substitute
  Offline,
}
