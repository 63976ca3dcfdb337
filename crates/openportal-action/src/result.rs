//! Outcome of one action invocation.

use serde::{Deserialize, Serialize};

use crate::error::ActionError;

fn is_false(value: &bool) -> bool {
  !*value
}

/// Result of executing one action.
///
/// Created once per invocation and never mutated by the caller. Chains see
/// it as `result` in their template context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
  pub success: bool,
  #[serde(default)]
  pub data: serde_json::Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<ActionError>,
  pub duration_ms: u64,
  /// The `when` guard was false and nothing ran.
  #[serde(default, skip_serializing_if = "is_false")]
  pub skipped: bool,
  /// The action failed but its `onError` chain succeeded.
  #[serde(default, skip_serializing_if = "is_false")]
  pub recovered: bool,
}

impl ActionResult {
  pub fn success(data: serde_json::Value, duration_ms: u64) -> Self {
    Self {
      success: true,
      data,
      error: None,
      duration_ms,
      skipped: false,
      recovered: false,
    }
  }

  pub fn failure(error: ActionError, duration_ms: u64) -> Self {
    Self {
      success: false,
      data: serde_json::Value::Null,
      error: Some(error),
      duration_ms,
      skipped: false,
      recovered: false,
    }
  }

  pub fn skipped() -> Self {
    Self {
      skipped: true,
      ..Self::success(serde_json::Value::Null, 0)
    }
  }

  pub fn from_outcome(outcome: Result<serde_json::Value, ActionError>, duration_ms: u64) -> Self {
    match outcome {
      Ok(data) => Self::success(data, duration_ms),
      Err(error) => Self::failure(error, duration_ms),
    }
  }

  pub fn is_cancelled(&self) -> bool {
    self.error.as_ref().is_some_and(ActionError::is_cancelled)
  }

  /// Failed and not contained by an `onError` chain.
  pub fn is_uncontained_failure(&self) -> bool {
    !self.success && !self.recovered
  }

  pub fn to_value(&self) -> serde_json::Value {
    serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
  }
}
