use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// Failed to read a configuration file.
  #[error("failed to read config file: {0}")]
  Io(#[from] std::io::Error),

  /// Configuration JSON did not match the expected shape.
  #[error("invalid config: {0}")]
  Parse(#[from] serde_json::Error),

  /// Configuration parsed but holds an unusable value.
  #[error("invalid config field '{field}': {message}")]
  Invalid { field: String, message: String },
}
