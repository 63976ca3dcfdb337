use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use crate::error::HttpError;
use crate::types::{HttpRequest, HttpResponse, Method};

/// Performs HTTP exchanges on behalf of handlers.
///
/// Dropping the returned future aborts the request, which is how callers
/// implement cancellation.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Join `url` onto `base` unless it is already absolute, then append `query`.
pub fn resolve_url(base: &str, url: &str, query: &[(String, String)]) -> Result<Url, HttpError> {
  let invalid = |e: url::ParseError| HttpError::InvalidUrl {
    url: url.to_string(),
    message: e.to_string(),
  };

  let mut resolved = match Url::parse(url) {
    Ok(absolute) => absolute,
    Err(url::ParseError::RelativeUrlWithoutBase) => {
      let base = Url::parse(base).map_err(invalid)?;
      base.join(url).map_err(invalid)?
    }
    Err(e) => return Err(invalid(e)),
  };

  if !query.is_empty() {
    let mut pairs = resolved.query_pairs_mut();
    for (key, value) in query {
      pairs.append_pair(key, value);
    }
  }

  Ok(resolved)
}

/// [`HttpClient`] backed by `reqwest`.
pub struct ReqwestClient {
  client: reqwest::Client,
  base_url: String,
  default_headers: HashMap<String, String>,
}

impl ReqwestClient {
  /// Create a client resolving relative URLs against `base_url`.
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into(),
      default_headers: HashMap::new(),
    }
  }

  /// Headers added to every request. Request headers win on conflict.
  pub fn with_default_headers(mut self, headers: HashMap<String, String>) -> Self {
    self.default_headers = headers;
    self
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
    Method::Head => reqwest::Method::HEAD,
    Method::Options => reqwest::Method::OPTIONS,
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  #[instrument(name = "http_send", skip(self, request), fields(method = %request.method, url = %request.url))]
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let url = resolve_url(&self.base_url, &request.url, &request.query)?;

    let mut builder = self
      .client
      .request(to_reqwest_method(request.method), url.clone());

    for (key, value) in &self.default_headers {
      if !request.headers.contains_key(key) {
        builder = builder.header(key, value);
      }
    }
    for (key, value) in &request.headers {
      builder = builder.header(key, value);
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await?;

    let status = response.status().as_u16();
    let headers: HashMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(k, v)| {
        v.to_str()
          .ok()
          .map(|val| (k.as_str().to_string(), val.to_string()))
      })
      .collect();

    let text = response.text().await?;

    debug!(url = %url, status, "http response received");

    Ok(HttpResponse::from_text(status, headers, text))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_relative_url_joined_onto_base() {
    let url = resolve_url("https://admin.example.com/", "/api/users", &[]).unwrap();
    assert_eq!(url.as_str(), "https://admin.example.com/api/users");
  }

  #[test]
  fn test_absolute_url_kept() {
    let url = resolve_url("https://admin.example.com", "https://other.example.com/x", &[]).unwrap();
    assert_eq!(url.as_str(), "https://other.example.com/x");
  }

  #[test]
  fn test_query_is_encoded_and_appended() {
    let query = vec![
      ("q".to_string(), "a b".to_string()),
      ("page".to_string(), "2".to_string()),
    ];
    let url = resolve_url("https://admin.example.com", "/api/users?sort=name", &query).unwrap();
    assert_eq!(
      url.as_str(),
      "https://admin.example.com/api/users?sort=name&q=a+b&page=2"
    );
  }

  #[test]
  fn test_invalid_base_is_error() {
    let result = resolve_url("not a url", "/api", &[]);
    assert!(matches!(result, Err(HttpError::InvalidUrl { .. })));
  }
}
