//! Mutation descriptors for the upstream HMIS REST API.
//!
//! The data layer does not interpret the API; it only needs to know which
//! URL, method and body make up a write and which entity it touches.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::net::HttpRequest;

/// Entity categories used to tag queued requests.
pub mod entity {
  pub const PATIENTS: &str = "patients";
  pub const VISITS: &str = "visits";
  pub const QUEUE: &str = "queue";
  pub const USERS: &str = "users";
}

/// A write the UI wants to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
  pub url: String,
  pub method: String,
  pub headers: BTreeMap<String, String>,
  pub body: Option<Value>,
  pub entity_type: Option<String>,
  pub entity_id: Option<String>,
}

impl MutationRequest {
  pub fn new(method: &str, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method: method.to_uppercase(),
      headers: BTreeMap::new(),
      body: None,
      entity_type: None,
      entity_id: None,
    }
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  pub fn for_entity(mut self, entity_type: &str, entity_id: impl ToString) -> Self {
    self.entity_type = Some(entity_type.to_string());
    self.entity_id = Some(entity_id.to_string());
    self
  }

  /// Register a new patient: `POST /api/patients/`.
  pub fn create_patient(body: Value) -> Self {
    Self::new("POST", "/api/patients/")
      .with_body(body)
      .for_entity(entity::PATIENTS, "new")
  }

  /// Partially update a patient: `PATCH /api/patients/{id}/`.
  pub fn update_patient(id: u64, body: Value) -> Self {
    Self::new("PATCH", format!("/api/patients/{}/", id))
      .with_body(body)
      .for_entity(entity::PATIENTS, id)
  }

  /// Open a visit: `POST /api/visits/`.
  pub fn create_visit(body: Value) -> Self {
    Self::new("POST", "/api/visits/")
      .with_body(body)
      .for_entity(entity::VISITS, "new")
  }

  pub fn update_visit(id: u64, body: Value) -> Self {
    Self::new("PATCH", format!("/api/visits/{}/", id))
      .with_body(body)
      .for_entity(entity::VISITS, id)
  }

  pub fn delete_visit(id: u64) -> Self {
    Self::new("DELETE", format!("/api/visits/{}/", id)).for_entity(entity::VISITS, id)
  }

  /// Put a visit into a department queue: `POST /api/visits/{visit}/queue/`.
  pub fn enqueue_visit(visit_id: u64, body: Value) -> Self {
    Self::new("POST", format!("/api/visits/{}/queue/", visit_id))
      .with_body(body)
      .for_entity(entity::QUEUE, format!("visit-{}", visit_id))
  }

  pub fn update_queue_entry(id: u64, body: Value) -> Self {
    Self::new("PATCH", format!("/api/queue/{}/", id))
      .with_body(body)
      .for_entity(entity::QUEUE, id)
  }

  pub fn delete_queue_entry(id: u64) -> Self {
    Self::new("DELETE", format!("/api/queue/{}/", id)).for_entity(entity::QUEUE, id)
  }

  /// Update the signed-in user's profile: `PUT /api/me/`.
  pub fn update_profile(body: Value) -> Self {
    Self::new("PUT", "/api/me/")
      .with_body(body)
      .for_entity(entity::USERS, "me")
  }

  /// The HTTP request to send or queue. JSON content type is added unless the
  /// caller already set one.
  pub fn to_http(&self) -> HttpRequest {
    let mut headers = self.headers.clone();
    if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
      headers.insert("Content-Type".to_string(), "application/json".to_string());
    }

    HttpRequest {
      method: self.method.clone(),
      url: self.url.clone(),
      headers,
      body: self.body.as_ref().map(Value::to_string),
    }
  }
}
