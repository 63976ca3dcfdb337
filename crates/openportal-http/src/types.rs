use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  #[default]
  Get,
  Post,
  Put,
  Patch,
  Delete,
  Head,
  Options,
}

impl FromStr for Method {
  type Err = HttpError;

  fn from_str(method: &str) -> Result<Self, Self::Err> {
    match method.to_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      "HEAD" => Ok(Method::Head),
      "OPTIONS" => Ok(Method::Options),
      _ => Err(HttpError::InvalidMethod(method.to_string())),
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
      Method::Head => "HEAD",
      Method::Options => "OPTIONS",
    };
    f.write_str(name)
  }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
  pub method: Method,
  /// Absolute or base-relative URL.
  pub url: String,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  /// Query parameters appended to the URL.
  #[serde(default)]
  pub query: Vec<(String, String)>,
  /// JSON body, sent with `content-type: application/json`.
  #[serde(default)]
  pub body: Option<serde_json::Value>,
}

impl HttpRequest {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: HashMap::new(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn post(url: impl Into<String>) -> Self {
    Self::new(Method::Post, url)
  }

  pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(key.into(), value.into());
    self
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: serde_json::Value) -> Self {
    self.body = Some(body);
    self
  }
}

/// A received response. The body is already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
  pub status: u16,
  #[serde(default)]
  pub headers: HashMap<String, String>,
  /// JSON value for JSON responses, a string for everything else.
  pub body: serde_json::Value,
}

impl HttpResponse {
  pub fn new(status: u16, body: serde_json::Value) -> Self {
    Self {
      status,
      headers: HashMap::new(),
      body,
    }
  }

  /// Build a response from a raw text body, decoded according to the
  /// `content-type` header in any casing.
  pub fn from_text(status: u16, headers: HashMap<String, String>, text: String) -> Self {
    let mut response = Self {
      status,
      headers,
      body: serde_json::Value::Null,
    };
    response.body = parse_body(response.content_type(), text);
    response
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn content_type(&self) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
      .map(|(_, v)| v.as_str())
  }

  /// The response as a JSON value: `{ status, headers, body }`.
  pub fn to_value(&self) -> serde_json::Value {
    serde_json::json!({
      "status": self.status,
      "headers": self.headers,
      "body": self.body,
    })
  }
}

/// Decode a response body by sniffing its content type.
///
/// JSON content types are parsed (falling back to text when the payload is
/// not valid JSON); everything else is kept as text. An empty body is `null`.
pub fn parse_body(content_type: Option<&str>, text: String) -> serde_json::Value {
  if text.is_empty() {
    return serde_json::Value::Null;
  }

  let is_json = content_type
    .map(|ct| ct.to_ascii_lowercase().contains("json"))
    .unwrap_or(false);

  if is_json {
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
  } else {
    serde_json::Value::String(text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_method() {
    assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
    assert_eq!("PATCH".parse::<Method>().unwrap(), Method::Patch);
    assert!(matches!("BREW".parse::<Method>(), Err(HttpError::InvalidMethod(_))));
  }

  #[test]
  fn test_parse_json_body() {
    let body = parse_body(Some("application/json; charset=utf-8"), r#"{"id":1}"#.to_string());
    assert_eq!(body, json!({ "id": 1 }));
  }

  #[test]
  fn test_parse_text_body() {
    let body = parse_body(Some("text/plain"), r#"{"id":1}"#.to_string());
    assert_eq!(body, json!(r#"{"id":1}"#));
  }

  #[test]
  fn test_invalid_json_falls_back_to_text() {
    let body = parse_body(Some("application/problem+json"), "oops".to_string());
    assert_eq!(body, json!("oops"));
  }

  #[test]
  fn test_empty_body_is_null() {
    assert_eq!(parse_body(Some("application/json"), String::new()), json!(null));
  }

  #[test]
  fn test_content_type_lookup_is_case_insensitive() {
    let mut response = HttpResponse::new(200, json!(null));
    response
      .headers
      .insert("Content-Type".to_string(), "text/html".to_string());
    assert_eq!(response.content_type(), Some("text/html"));
    assert!(response.is_success());
  }

  #[test]
  fn test_from_text_decodes_by_mixed_case_content_type() {
    let headers = HashMap::from([(
      "Content-Type".to_string(),
      "Application/JSON".to_string(),
    )]);
    let response = HttpResponse::from_text(201, headers, r#"{"id":1}"#.to_string());
    assert_eq!(response.body, json!({ "id": 1 }));
    assert_eq!(response.status, 201);

    let response = HttpResponse::from_text(200, HashMap::new(), r#"{"id":1}"#.to_string());
    assert_eq!(response.body, json!(r#"{"id":1}"#));
  }
}
