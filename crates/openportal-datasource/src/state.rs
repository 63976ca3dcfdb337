use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatasourceError;

/// Lifecycle of one datasource instance: `idle -> loading -> ready | error`,
/// with `ready` and `error` returning to `loading` on refetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceStatus {
  #[default]
  Idle,
  Loading,
  Ready,
  Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateError {
  pub kind: String,
  pub message: String,
}

impl From<&DatasourceError> for StateError {
  fn from(error: &DatasourceError) -> Self {
    Self {
      kind: error.kind().to_string(),
      message: error.to_string(),
    }
  }
}

/// Reactive state of one datasource instance.
///
/// `loading` is true exactly while a fetch is in flight. `data` survives a
/// failed refresh, so `error` and `data` may both be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceState {
  pub status: DatasourceStatus,
  pub data: Option<serde_json::Value>,
  pub loading: bool,
  pub error: Option<StateError>,
  pub is_stale: bool,
  pub last_fetched_at: Option<DateTime<Utc>>,
}

impl DatasourceState {
  pub fn is_ready(&self) -> bool {
    self.status == DatasourceStatus::Ready
  }
}
