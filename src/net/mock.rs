//! Scripted transport for tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

use super::transport::{TransportError, TransportResult};
use super::{HttpRequest, HttpResponse, Transport};

type Handler = Box<dyn Fn(&HttpRequest) -> TransportResult<HttpResponse> + Send + Sync>;

/// Transport whose responses come from a swappable closure. Every request is recorded.
pub struct MockTransport {
  handler: Mutex<Handler>,
  calls: Mutex<Vec<HttpRequest>>,
  delay: Mutex<Option<Duration>>,
}

impl MockTransport {
  pub fn new(
    handler: impl Fn(&HttpRequest) -> TransportResult<HttpResponse> + Send + Sync + 'static,
  ) -> Self {
    Self {
      handler: Mutex::new(Box::new(handler)),
      calls: Mutex::new(Vec::new()),
      delay: Mutex::new(None),
    }
  }

  /// Every request fails with a network error.
  pub fn unreachable() -> Self {
    Self::new(|_| Err(TransportError::Network("connection refused".to_string())))
  }

  /// Every request succeeds with the given status and JSON body.
  pub fn responding(status: u16, body: Value) -> Self {
    Self::new(move |_| Ok(HttpResponse::json(status, &body)))
  }

  pub fn set_handler(
    &self,
    handler: impl Fn(&HttpRequest) -> TransportResult<HttpResponse> + Send + Sync + 'static,
  ) {
    *self.handler.lock().unwrap() = Box::new(handler);
  }

  /// Hold every response for `delay` before returning it.
  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = Some(delay);
  }

  pub fn calls(&self) -> Vec<HttpRequest> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Transport for MockTransport {
  fn send(&self, request: HttpRequest) -> BoxFuture<'_, TransportResult<HttpResponse>> {
    async move {
      self.calls.lock().unwrap().push(request.clone());
      let delay = *self.delay.lock().unwrap();
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      let handler = self.handler.lock().unwrap();
      handler(&request)
    }
    .boxed()
  }
}
