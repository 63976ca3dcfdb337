use std::fmt;

use serde::{Deserialize, Serialize};

/// Failure category carried by a failed [`crate::ActionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
  /// No handler is registered for the action type.
  UnknownActionType,
  /// Bad params or a backend 400.
  ValidationError,
  /// Backend 401/403.
  PermissionError,
  /// Connectivity failure or a non-2xx response.
  NetworkError,
  /// The action's own timeout elapsed.
  TimeoutError,
  /// A datasource transform path did not match the response.
  TransformError,
  /// Execution was aborted through its cancellation token.
  Cancelled,
  /// Backend 5xx from the action gateway.
  ServerError,
  /// Handler panicked or failed in an unexpected way.
  UnknownError,
}

impl ErrorKind {
  /// Whether a `retry` policy may re-attempt an action failing with this kind.
  pub fn is_retryable(self) -> bool {
    matches!(
      self,
      ErrorKind::NetworkError
        | ErrorKind::TimeoutError
        | ErrorKind::ServerError
        | ErrorKind::UnknownError
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ErrorKind::UnknownActionType => "UNKNOWN_ACTION_TYPE",
      ErrorKind::ValidationError => "VALIDATION_ERROR",
      ErrorKind::PermissionError => "PERMISSION_ERROR",
      ErrorKind::NetworkError => "NETWORK_ERROR",
      ErrorKind::TimeoutError => "TIMEOUT_ERROR",
      ErrorKind::TransformError => "TRANSFORM_ERROR",
      ErrorKind::Cancelled => "CANCELLED",
      ErrorKind::ServerError => "SERVER_ERROR",
      ErrorKind::UnknownError => "UNKNOWN_ERROR",
    }
  }

  /// Map a backend error code onto a kind. Unrecognised codes are server errors.
  pub fn from_code(code: &str) -> Self {
    match code {
      "VALIDATION_ERROR" => ErrorKind::ValidationError,
      "PERMISSION_ERROR" | "FORBIDDEN" | "UNAUTHORIZED" => ErrorKind::PermissionError,
      "NETWORK_ERROR" | "NOT_FOUND" => ErrorKind::NetworkError,
      "TIMEOUT_ERROR" => ErrorKind::TimeoutError,
      _ => ErrorKind::ServerError,
    }
  }
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error half of an [`crate::ActionResult`].
///
/// Action failures are data, not Rust errors: they travel inside the result
/// so chains can template against them (`{{ result.error.message }}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ActionError {
  pub kind: ErrorKind,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cause: Option<serde_json::Value>,
}

impl ActionError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      cause: None,
    }
  }

  pub fn with_cause(mut self, cause: serde_json::Value) -> Self {
    self.cause = Some(cause);
    self
  }

  pub fn unknown_type(action_type: &str) -> Self {
    Self::new(
      ErrorKind::UnknownActionType,
      format!("no handler registered for action type '{}'", action_type),
    )
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::ValidationError, message)
  }

  pub fn network(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::NetworkError, message)
  }

  pub fn timeout(timeout_ms: u128) -> Self {
    Self::new(
      ErrorKind::TimeoutError,
      format!("action timed out after {}ms", timeout_ms),
    )
  }

  pub fn cancelled() -> Self {
    Self::new(ErrorKind::Cancelled, "action was cancelled")
  }

  pub fn is_cancelled(&self) -> bool {
    self.kind == ErrorKind::Cancelled
  }
}

impl From<openportal_http::HttpError> for ActionError {
  fn from(error: openportal_http::HttpError) -> Self {
    use openportal_http::HttpError;
    match error {
      HttpError::InvalidUrl { .. } | HttpError::InvalidMethod(_) => {
        ActionError::validation(error.to_string())
      }
      HttpError::Transport(_) => ActionError::network(error.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_kind_serializes_screaming_snake() {
    let value = serde_json::to_value(ErrorKind::UnknownActionType).unwrap();
    assert_eq!(value, json!("UNKNOWN_ACTION_TYPE"));
    assert_eq!(ErrorKind::TimeoutError.to_string(), "TIMEOUT_ERROR");
  }

  #[test]
  fn test_retryable_kinds() {
    assert!(ErrorKind::NetworkError.is_retryable());
    assert!(ErrorKind::TimeoutError.is_retryable());
    assert!(!ErrorKind::ValidationError.is_retryable());
    assert!(!ErrorKind::PermissionError.is_retryable());
    assert!(!ErrorKind::Cancelled.is_retryable());
    assert!(!ErrorKind::UnknownActionType.is_retryable());
  }

  #[test]
  fn test_from_code() {
    assert_eq!(ErrorKind::from_code("VALIDATION_ERROR"), ErrorKind::ValidationError);
    assert_eq!(ErrorKind::from_code("FORBIDDEN"), ErrorKind::PermissionError);
    assert_eq!(ErrorKind::from_code("OUT_OF_STOCK"), ErrorKind::ServerError);
  }

  #[test]
  fn test_error_value_shape() {
    let error = ActionError::network("boom").with_cause(json!({ "status": 404 }));
    let value = serde_json::to_value(&error).unwrap();
    assert_eq!(
      value,
      json!({ "kind": "NETWORK_ERROR", "message": "boom", "cause": { "status": 404 } })
    );
  }
}
