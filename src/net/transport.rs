//! Transport abstraction over the upstream REST API.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use super::types::{resolve_url, HttpRequest, HttpResponse};

/// Error type for transport operations.
///
/// HTTP error statuses are *not* transport errors; they come back as an
/// [`HttpResponse`] so callers can tell a 409 from a dropped connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
  /// The request never produced a response (DNS, refused, timeout, reset).
  #[error("network error: {0}")]
  Network(String),

  /// The request could not be built.
  #[error("invalid request: {0}")]
  InvalidRequest(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Something that can execute an HTTP request.
pub trait Transport: Send + Sync {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>>;
}

/// Transport backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestTransport {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl ReqwestTransport {
  /// Create a transport for the given API base.
  ///
  /// When a token is supplied it is sent as a bearer token on every request
  /// that does not carry its own `Authorization` header.
  pub fn new(base_url: Url, timeout: Duration, token: Option<String>) -> TransportResult<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TransportError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  async fn execute(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
    let url = resolve_url(&self.base_url, &request.url)
      .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
      .map_err(|e| TransportError::InvalidRequest(format!("bad method {}: {}", request.method, e)))?;

    let mut builder = self.client.request(method, url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(token) = &self.token {
      if request.header("authorization").is_none() {
        builder = builder.bearer_auth(token);
      }
    }
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?
      .to_vec();

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}

impl Transport for ReqwestTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>> {
    self.execute(request).boxed()
  }
}
