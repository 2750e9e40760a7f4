//! Maps requests to caching strategies.

use super::types::{FetchRequest, RequestMode};

/// Which strategy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// Not intercepted: goes straight to the network
  Passthrough,
  /// `/api/*`: network first, cached copy, then an offline envelope
  Api,
  /// Page navigation: network first, then the offline page
  Navigation,
  /// Everything else: cache first, then network, then a placeholder for images
  Static,
}

/// Classify a request by its absolute URL.
pub fn classify(request: &FetchRequest, absolute_url: &str) -> RequestClass {
  if !request.method.eq_ignore_ascii_case("GET")
    || absolute_url.starts_with("chrome-extension")
    || absolute_url.contains("extension")
    || !absolute_url.starts_with("http")
  {
    return RequestClass::Passthrough;
  }

  if absolute_url.contains("/api/") {
    return RequestClass::Api;
  }

  if request.mode == RequestMode::Navigate {
    return RequestClass::Navigation;
  }

  RequestClass::Static
}
