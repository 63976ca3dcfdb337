//! Engine-wide settings.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings shared by the action executor and the datasource manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
  /// Base URL that relative request URLs are joined onto.
  pub api_base_url: String,
  /// Path of the backend named-action gateway.
  pub action_gateway_path: String,
  /// Datasource cache capacity.
  pub cache_max_entries: usize,
  /// TTL used when a datasource has no `cacheTtlMs`.
  pub default_cache_ttl_ms: u64,
  /// Upper bound for exponential retry backoff.
  pub max_retry_delay_ms: u64,
  /// Headers added to every outgoing request.
  pub default_headers: HashMap<String, String>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      api_base_url: "http://localhost:8080".to_string(),
      action_gateway_path: "/api/actions".to_string(),
      cache_max_entries: 100,
      default_cache_ttl_ms: 300_000,
      max_retry_delay_ms: 30_000,
      default_headers: HashMap::new(),
    }
  }
}

impl EngineConfig {
  /// Parse and validate an engine config from JSON text.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let config: EngineConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Read an engine config from a JSON file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_json(&content)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.cache_max_entries == 0 {
      return Err(ConfigError::Invalid {
        field: "cacheMaxEntries".to_string(),
        message: "must be greater than 0".to_string(),
      });
    }
    if self.api_base_url.trim().is_empty() {
      return Err(ConfigError::Invalid {
        field: "apiBaseUrl".to_string(),
        message: "must not be empty".to_string(),
      });
    }
    Ok(())
  }

  pub fn default_cache_ttl(&self) -> Duration {
    Duration::from_millis(self.default_cache_ttl_ms)
  }

  pub fn max_retry_delay(&self) -> Duration {
    Duration::from_millis(self.max_retry_delay_ms)
  }

  /// URL of the gateway endpoint for a named backend action.
  pub fn action_gateway_url(&self, action_id: &str) -> String {
    format!(
      "{}/{}/{}",
      self.api_base_url.trim_end_matches('/'),
      self.action_gateway_path.trim_matches('/'),
      action_id
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_partial_config_uses_defaults() {
    let config = EngineConfig::from_json(r#"{ "apiBaseUrl": "https://admin.example.com" }"#).unwrap();

    assert_eq!(config.api_base_url, "https://admin.example.com");
    assert_eq!(config.cache_max_entries, 100);
    assert_eq!(config.max_retry_delay(), Duration::from_secs(30));
  }

  #[test]
  fn test_zero_cache_capacity_rejected() {
    let result = EngineConfig::from_json(r#"{ "cacheMaxEntries": 0 }"#);
    assert!(matches!(result, Err(ConfigError::Invalid { .. })));
  }

  #[test]
  fn test_gateway_url() {
    let config = EngineConfig {
      api_base_url: "https://admin.example.com/".to_string(),
      ..EngineConfig::default()
    };
    assert_eq!(
      config.action_gateway_url("approve-order"),
      "https://admin.example.com/api/actions/approve-order"
    );
  }

  #[test]
  fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "defaultCacheTtlMs": 50, "defaultHeaders": {{ "x-app": "portal" }} }}"#).unwrap();

    let config = EngineConfig::load(file.path()).unwrap();
    assert_eq!(config.default_cache_ttl(), Duration::from_millis(50));
    assert_eq!(config.default_headers["x-app"], "portal");
  }
}
