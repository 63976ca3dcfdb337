//! Action configuration types.
//!
//! An action is a declarative description of one thing to do in response to
//! a widget event:
//!
//! ```json
//! {
//!   "id": "save",
//!   "type": "apiCall",
//!   "params": { "url": "/api/users/{{ routeParams.id }}", "method": "PUT", "body": "{{ state.form }}" },
//!   "when": "{{ state.form.dirty }}",
//!   "retry": { "attempts": 3, "delay": 500, "backoff": "exponential" },
//!   "timeout": 10000,
//!   "onSuccess": [{ "id": "ok", "type": "showToast", "params": { "message": "Saved" } }],
//!   "onError": [{ "id": "err", "type": "showToast", "params": { "message": "{{ result.error.message }}", "variant": "error" } }]
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Declarative description of one action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
  /// Identifier, unique within the containing config.
  #[serde(default)]
  pub id: String,

  /// Handler type, e.g. "navigate", "apiCall", "sequence".
  #[serde(rename = "type")]
  pub action_type: String,

  /// Handler parameters. String leaves may contain `{{ path }}` placeholders.
  #[serde(default)]
  pub params: serde_json::Map<String, serde_json::Value>,

  /// Optional boolean expression gating execution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub when: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryConfig>,

  /// Per-attempt timeout in milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout: Option<u64>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub on_success: Vec<ActionConfig>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub on_error: Vec<ActionConfig>,
}

impl ActionConfig {
  /// Create an action config with no params, guard, retry or chains.
  pub fn new(id: impl Into<String>, action_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      action_type: action_type.into(),
      params: serde_json::Map::new(),
      when: None,
      retry: None,
      timeout: None,
      on_success: Vec::new(),
      on_error: Vec::new(),
    }
  }

  /// Builder-style helper to set a single param.
  pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.params.insert(key.into(), value);
    self
  }

  pub fn with_when(mut self, when: impl Into<String>) -> Self {
    self.when = Some(when.into());
    self
  }

  pub fn with_retry(mut self, retry: RetryConfig) -> Self {
    self.retry = Some(retry);
    self
  }

  pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
    self.timeout = Some(timeout_ms);
    self
  }

  pub fn with_on_success(mut self, chain: Vec<ActionConfig>) -> Self {
    self.on_success = chain;
    self
  }

  pub fn with_on_error(mut self, chain: Vec<ActionConfig>) -> Self {
    self.on_error = chain;
    self
  }

  /// The configured timeout as a [`Duration`].
  pub fn timeout_duration(&self) -> Option<Duration> {
    self.timeout.map(Duration::from_millis)
  }
}

/// Retry policy for a failing action.
///
/// On a composite the policy retries the composite as a unit: every
/// attempt starts again from its first child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
  /// Total number of attempts, including the first one.
  pub attempts: u32,
  /// Delay between attempts in milliseconds.
  #[serde(default)]
  pub delay: u64,
  #[serde(default)]
  pub backoff: Backoff,
}

impl RetryConfig {
  /// Delay to wait before retry number `retry` (1-based), capped at `max`.
  ///
  /// Fixed backoff always waits `delay`; exponential backoff doubles the
  /// delay for every retry after the first.
  pub fn delay_for(&self, retry: u32, max: Duration) -> Duration {
    let base = Duration::from_millis(self.delay);
    let delay = match self.backoff {
      Backoff::Fixed => base,
      Backoff::Exponential => {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        base.saturating_mul(factor)
      }
    };
    delay.min(max)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
  #[default]
  Fixed,
  Exponential,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_full_action() {
    let config: ActionConfig = serde_json::from_value(json!({
      "id": "save",
      "type": "apiCall",
      "params": { "url": "/api/users", "method": "POST" },
      "when": "{{ state.dirty }}",
      "retry": { "attempts": 3, "delay": 100, "backoff": "exponential" },
      "timeout": 5000,
      "onSuccess": [{ "id": "toast", "type": "showToast", "params": { "message": "ok" } }],
      "onError": [{ "type": "showToast", "params": { "message": "failed" } }]
    }))
    .unwrap();

    assert_eq!(config.action_type, "apiCall");
    assert_eq!(config.params["method"], "POST");
    assert_eq!(config.when.as_deref(), Some("{{ state.dirty }}"));
    assert_eq!(
      config.retry,
      Some(RetryConfig {
        attempts: 3,
        delay: 100,
        backoff: Backoff::Exponential
      })
    );
    assert_eq!(config.timeout_duration(), Some(Duration::from_millis(5000)));
    assert_eq!(config.on_success.len(), 1);
    assert_eq!(config.on_error[0].id, "");
  }

  #[test]
  fn test_minimal_action_defaults() {
    let config: ActionConfig = serde_json::from_value(json!({ "type": "goBack" })).unwrap();

    assert!(config.params.is_empty());
    assert!(config.when.is_none());
    assert!(config.retry.is_none());
    assert!(config.on_success.is_empty());
  }

  #[test]
  fn test_serialize_skips_empty_fields() {
    let config = ActionConfig::new("a", "goBack");
    let value = serde_json::to_value(&config).unwrap();

    assert_eq!(value, json!({ "id": "a", "type": "goBack", "params": {} }));
  }

  #[test]
  fn test_retry_fixed_delay() {
    let retry = RetryConfig {
      attempts: 3,
      delay: 10,
      backoff: Backoff::Fixed,
    };
    let max = Duration::from_secs(30);

    assert_eq!(retry.delay_for(1, max), Duration::from_millis(10));
    assert_eq!(retry.delay_for(2, max), Duration::from_millis(10));
  }

  #[test]
  fn test_retry_exponential_delay_is_capped() {
    let retry = RetryConfig {
      attempts: 10,
      delay: 1000,
      backoff: Backoff::Exponential,
    };
    let max = Duration::from_secs(30);

    assert_eq!(retry.delay_for(1, max), Duration::from_millis(1000));
    assert_eq!(retry.delay_for(2, max), Duration::from_millis(2000));
    assert_eq!(retry.delay_for(3, max), Duration::from_millis(4000));
    assert_eq!(retry.delay_for(6, max), Duration::from_secs(30));
    assert_eq!(retry.delay_for(40, max), Duration::from_secs(30));
  }
}
