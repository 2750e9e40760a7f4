//! Sends mutations live when possible and queues them otherwise.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use super::connectivity::Connectivity;
use crate::api::MutationRequest;
use crate::net::Transport;
use crate::queue::{NewQueuedRequest, RequestStore};

/// Errors that are surfaced to the user instead of being queued.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
  /// The API rejected our credentials; replaying later would fail the same way.
  #[error("authentication failed (HTTP {status}); sign in again")]
  Unauthorized { status: u16 },
}

/// What happened to a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
  /// Executed against the API; `data` is the parsed response body.
  Sent { status: u16, data: Value },
  /// Persisted for replay on the next sync.
  Queued { id: i64, message: String },
}

#[derive(Clone)]
pub struct RequestQueuer {
  requests: RequestStore,
  transport: Arc<dyn Transport>,
  connectivity: Connectivity,
}

impl RequestQueuer {
  pub fn new(
    requests: RequestStore,
    transport: Arc<dyn Transport>,
    connectivity: Connectivity,
  ) -> Self {
    Self {
      requests,
      transport,
      connectivity,
    }
  }

  /// Try the mutation live if online; queue it on network failure, on a
  /// non-2xx status other than 401, or when offline.
  ///
  /// A queued write is replayed as-is later; nothing checks whether a newer
  /// write to the same entity is already queued.
  pub async fn queue_operation(&self, mutation: &MutationRequest) -> Result<MutationOutcome> {
    let request = mutation.to_http();

    if self.connectivity.is_online() {
      match self.transport.send(request.clone()).await {
        Ok(response) if response.is_success() => {
          let data = response.parse_json()?;
          return Ok(MutationOutcome::Sent {
            status: response.status,
            data,
          });
        }
        Ok(response) if response.status == 401 => {
          return Err(
            MutationError::Unauthorized {
              status: response.status,
            }
            .into(),
          );
        }
        Ok(response) => {
          warn!(
            status = response.status,
            "{} {} failed, queueing for later", request.method, request.url
          );
        }
        Err(e) => {
          warn!("{} {} failed, queueing for later: {}", request.method, request.url, e);
        }
      }
    }

    let id = self.requests.enqueue(&NewQueuedRequest {
      request,
      entity_type: mutation.entity_type.clone(),
      entity_id: mutation.entity_id.clone(),
    })?;
    info!(id, "{} {} queued for sync", mutation.method, mutation.url);

    Ok(MutationOutcome::Queued {
      id,
      message: "Operation queued for sync when online".to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::Database;
  use crate::net::mock::MockTransport;
  use serde_json::json;

  fn queuer(transport: MockTransport, online: bool) -> (RequestQueuer, RequestStore, Arc<MockTransport>) {
    let requests = RequestStore::new(Database::open_in_memory().unwrap());
    let transport = Arc::new(transport);
    let queuer = RequestQueuer::new(requests.clone(), transport.clone(), Connectivity::new(online));
    (queuer, requests, transport)
  }

  #[tokio::test]
  async fn test_online_success_returns_parsed_body() {
    let (queuer, requests, _) = queuer(
      MockTransport::responding(200, json!({"id": 7, "first_name": "Jane"})),
      true,
    );

    let outcome = queuer
      .queue_operation(&MutationRequest::update_patient(7, json!({"first_name": "Jane"})))
      .await
      .unwrap();

    assert!(matches!(outcome, MutationOutcome::Sent { .. }));
    match outcome {
      MutationOutcome::Sent { status, data } => {
        assert_eq!(status, 200);
        assert_eq!(data["first_name"], "Jane");
      }
      other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(requests.count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_offline_queues_without_network() {
    let (queuer, requests, transport) = queuer(MockTransport::responding(200, json!({})), false);

    for id in 1..=3 {
      let outcome = queuer
        .queue_operation(&MutationRequest::update_queue_entry(id, json!({"status": "done"})))
        .await
        .unwrap();
      assert!(matches!(outcome, MutationOutcome::Queued { .. }));
    }

    assert_eq!(transport.call_count(), 0);
    assert_eq!(requests.count().unwrap(), 3);
  }

  #[tokio::test]
  async fn test_network_failure_queues_request() {
    let (queuer, requests, transport) = queuer(MockTransport::unreachable(), true);

    let outcome = queuer
      .queue_operation(&MutationRequest::create_visit(json!({"patient": 7})))
      .await
      .unwrap();

    assert!(matches!(outcome, MutationOutcome::Queued { .. }));
    assert_eq!(transport.call_count(), 1);

    let queued = &requests.list().unwrap()[0];
    assert_eq!(queued.method, "POST");
    assert_eq!(queued.body.as_deref(), Some(r#"{"patient":7}"#));
    assert_eq!(queued.entity_type.as_deref(), Some("visits"));
    assert_eq!(
      queued.headers.get("Content-Type").map(String::as_str),
      Some("application/json")
    );
  }

  #[tokio::test]
  async fn test_server_error_queues_request() {
    let (queuer, requests, _) = queuer(MockTransport::responding(503, json!({})), true);

    let outcome = queuer
      .queue_operation(&MutationRequest::delete_visit(4))
      .await
      .unwrap();

    assert!(matches!(outcome, MutationOutcome::Queued { .. }));
    assert_eq!(requests.count().unwrap(), 1);
  }

  #[tokio::test]
  async fn test_unauthorized_is_surfaced_not_queued() {
    let (queuer, requests, _) = queuer(MockTransport::responding(401, json!({})), true);

    let err = queuer
      .queue_operation(&MutationRequest::update_profile(json!({"phone": "555"})))
      .await
      .unwrap_err();

    assert!(matches!(
      err.downcast_ref::<MutationError>(),
      Some(MutationError::Unauthorized { status: 401 })
    ));
    assert_eq!(requests.count().unwrap(), 0);
  }
}
