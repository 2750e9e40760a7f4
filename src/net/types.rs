use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// A request as it travels to the transport (or into the offline queue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  pub method: String,
  pub url: String,
  pub headers: BTreeMap<String, String>,
  pub body: Option<String>,
}

impl HttpRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.into(),
      headers: BTreeMap::new(),
      body: None,
    }
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: BTreeMap::new(),
      body: body.into(),
    }
  }

  /// Build a JSON response with the matching content type.
  pub fn json(status: u16, value: &Value) -> Self {
    let mut response = Self::new(status, value.to_string());
    response
      .headers
      .insert("content-type".to_string(), "application/json".to_string());
    response
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  /// Parse the body as JSON. An empty body parses as `null` (e.g. 204 No Content).
  pub fn parse_json(&self) -> Result<Value> {
    if self.body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }
    serde_json::from_slice(&self.body).map_err(|e| eyre!("Failed to parse response body: {}", e))
  }
}

/// Resolve a possibly relative URL (e.g. `/api/patients/7/`) against the API base.
pub fn resolve_url(base: &Url, raw: &str) -> Result<Url> {
  match Url::parse(raw) {
    Ok(url) => Ok(url),
    Err(url::ParseError::RelativeUrlWithoutBase) => base
      .join(raw)
      .map_err(|e| eyre!("Invalid URL '{}': {}", raw, e)),
    Err(e) => Err(eyre!("Invalid URL '{}': {}", raw, e)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_header_lookup_ignores_case() {
    let mut request = HttpRequest::get("/api/patients/");
    request
      .headers
      .insert("Authorization".to_string(), "Bearer abc".to_string());

    assert_eq!(request.header("authorization"), Some("Bearer abc"));
    assert_eq!(request.header("content-type"), None);
  }

  #[test]
  fn test_empty_body_parses_as_null() {
    let response = HttpResponse::new(204, Vec::new());
    assert_eq!(response.parse_json().unwrap(), Value::Null);
  }

  #[test]
  fn test_json_response_sets_content_type() {
    let response = HttpResponse::json(200, &json!({"id": 7}));
    assert_eq!(
      response.headers.get("content-type").map(String::as_str),
      Some("application/json")
    );
    assert_eq!(response.parse_json().unwrap()["id"], 7);
  }

  #[test]
  fn test_resolve_relative_and_absolute_urls() {
    let base = Url::parse("https://hmis.example.org").unwrap();

    assert_eq!(
      resolve_url(&base, "/api/patients/7/").unwrap().as_str(),
      "https://hmis.example.org/api/patients/7/"
    );
    assert_eq!(
      resolve_url(&base, "http://other.local/x").unwrap().as_str(),
      "http://other.local/x"
    );
  }
}
