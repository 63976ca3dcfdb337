use thiserror::Error;

/// Errors produced while fetching a datasource.
///
/// `Clone` so one in-flight fetch can hand its outcome to every caller
/// that coalesced onto it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasourceError {
  #[error("no datasource handler registered for type '{type_name}'")]
  UnknownType { type_name: String },

  #[error("invalid datasource config: {message}")]
  InvalidConfig { message: String },

  #[error("network error: {message}")]
  Network { message: String },

  #[error("request failed with status {status}")]
  Status { status: u16, body: serde_json::Value },

  #[error("transform path '{path}' not found in response")]
  Transform { path: String },

  #[error("websocket topic '{topic}' is disconnected")]
  Disconnected { topic: String },

  #[error("fetch was cancelled")]
  Cancelled,
}

impl DatasourceError {
  /// The error kind reported in datasource state.
  pub fn kind(&self) -> &'static str {
    match self {
      DatasourceError::UnknownType { .. } | DatasourceError::InvalidConfig { .. } => {
        "VALIDATION_ERROR"
      }
      DatasourceError::Network { .. }
      | DatasourceError::Status { .. }
      | DatasourceError::Disconnected { .. } => "NETWORK_ERROR",
      DatasourceError::Transform { .. } => "TRANSFORM_ERROR",
      DatasourceError::Cancelled => "CANCELLED",
    }
  }
}

impl From<openportal_http::HttpError> for DatasourceError {
  fn from(error: openportal_http::HttpError) -> Self {
    use openportal_http::HttpError;
    match error {
      HttpError::InvalidUrl { .. } | HttpError::InvalidMethod(_) => DatasourceError::InvalidConfig {
        message: error.to_string(),
      },
      HttpError::Transport(message) => DatasourceError::Network { message },
    }
  }
}
