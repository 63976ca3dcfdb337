//! Scripted [`HttpClient`] for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::HttpClient;
use crate::error::HttpError;
use crate::types::{HttpRequest, HttpResponse};

/// A canned reply for a URL.
#[derive(Debug, Clone)]
pub struct MockResponse {
  pub result: Result<HttpResponse, HttpError>,
  /// Simulated latency before the reply is produced.
  pub delay: Option<Duration>,
}

impl MockResponse {
  pub fn ok(status: u16, body: serde_json::Value) -> Self {
    let mut response = HttpResponse::new(status, body);
    response
      .headers
      .insert("content-type".to_string(), "application/json".to_string());
    Self {
      result: Ok(response),
      delay: None,
    }
  }

  pub fn error(error: HttpError) -> Self {
    Self {
      result: Err(error),
      delay: None,
    }
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }
}

/// Replies from per-URL queues and records every request it receives.
///
/// Queued replies are consumed in order; the last reply for a URL is
/// repeated once its queue runs dry. Unknown URLs get a 404.
#[derive(Default)]
pub struct MockHttpClient {
  routes: Mutex<HashMap<String, VecDeque<MockResponse>>>,
  requests: Mutex<Vec<HttpRequest>>,
}

impl MockHttpClient {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a reply for requests to `url` (matched without query string).
  pub fn respond(&self, url: impl Into<String>, response: MockResponse) {
    let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
    routes.entry(url.into()).or_default().push_back(response);
  }

  /// Every request received so far, in order.
  pub fn requests(&self) -> Vec<HttpRequest> {
    self
      .requests
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn request_count(&self) -> usize {
    self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  fn next_response(&self, url: &str) -> MockResponse {
    let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
    match routes.get_mut(url) {
      Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
      Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
      None => not_found(),
    }
  }
}

fn not_found() -> MockResponse {
  MockResponse::ok(404, serde_json::json!({ "message": "not found" }))
}

#[async_trait]
impl HttpClient for MockHttpClient {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
    let url = request
      .url
      .split('?')
      .next()
      .unwrap_or_default()
      .to_string();
    self
      .requests
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push(request);

    let response = self.next_response(&url);
    if let Some(delay) = response.delay {
      tokio::time::sleep(delay).await;
    }
    response.result
  }
}
