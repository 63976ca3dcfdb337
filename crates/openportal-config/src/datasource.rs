//! Datasource configuration types.
//!
//! A datasource is a named source of data bound into one or more widgets.
//! The `type` selects the handler and `config` carries handler-specific
//! settings:
//!
//! ```json
//! { "id": "users", "type": "http", "config": { "url": "/api/users", "method": "GET" },
//!   "fetchPolicy": "cache-and-network", "cacheTtlMs": 60000, "transform": "data.items" }
//! { "id": "ticker", "type": "websocket", "config": { "topic": "prices" } }
//! { "id": "countries", "type": "static", "config": ["NL", "DE", "FR"] }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Declarative description of a datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceConfig {
  /// Identifier, unique per page.
  pub id: String,

  /// Handler type and its handler-specific config.
  #[serde(flatten)]
  pub source: DatasourceSource,

  #[serde(default)]
  pub fetch_policy: FetchPolicy,

  /// Cache TTL override in milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cache_ttl_ms: Option<u64>,

  /// Dot-path extracting a sub-tree of the response, e.g. "data.items".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transform: Option<String>,

  /// Query parameters. Values may contain `{{ path }}` placeholders and are
  /// part of the cache key.
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub params: serde_json::Map<String, serde_json::Value>,

  /// Optional polling interval in milliseconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub refetch_interval_ms: Option<u64>,
}

impl DatasourceConfig {
  pub fn new(id: impl Into<String>, source: DatasourceSource) -> Self {
    Self {
      id: id.into(),
      source,
      fetch_policy: FetchPolicy::default(),
      cache_ttl_ms: None,
      transform: None,
      params: serde_json::Map::new(),
      refetch_interval_ms: None,
    }
  }

  pub fn with_fetch_policy(mut self, policy: FetchPolicy) -> Self {
    self.fetch_policy = policy;
    self
  }

  pub fn with_cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
    self.cache_ttl_ms = Some(ttl_ms);
    self
  }

  pub fn with_transform(mut self, path: impl Into<String>) -> Self {
    self.transform = Some(path.into());
    self
  }

  pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.params.insert(key.into(), value);
    self
  }

  pub fn with_refetch_interval_ms(mut self, interval_ms: u64) -> Self {
    self.refetch_interval_ms = Some(interval_ms);
    self
  }

  /// The handler type name used for registry lookup.
  pub fn source_type(&self) -> &'static str {
    self.source.type_name()
  }

  pub fn cache_ttl(&self) -> Option<Duration> {
    self.cache_ttl_ms.map(Duration::from_millis)
  }

  pub fn refetch_interval(&self) -> Option<Duration> {
    self
      .refetch_interval_ms
      .filter(|ms| *ms > 0)
      .map(Duration::from_millis)
  }
}

/// The datasource handler type together with its handler-specific config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum DatasourceSource {
  Http(HttpSourceConfig),
  #[serde(rename = "websocket")]
  WebSocket(WebSocketSourceConfig),
  /// A literal value returned as-is.
  Static(serde_json::Value),
}

impl DatasourceSource {
  pub fn type_name(&self) -> &'static str {
    match self {
      DatasourceSource::Http(_) => "http",
      DatasourceSource::WebSocket(_) => "websocket",
      DatasourceSource::Static(_) => "static",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSourceConfig {
  pub url: String,
  #[serde(default = "default_method")]
  pub method: String,
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub headers: HashMap<String, String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<serde_json::Value>,
}

fn default_method() -> String {
  "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketSourceConfig {
  pub topic: String,
}

/// Cache/network interaction strategy for a datasource read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
  /// Serve a fresh cached value if present, otherwise fetch and cache.
  #[default]
  CacheFirst,
  /// Always fetch, update the cache, never read it.
  NetworkOnly,
  /// Serve the cached value immediately and revalidate in the background.
  CacheAndNetwork,
  /// Always fetch, never touch the cache.
  NoCache,
}

impl FetchPolicy {
  pub fn reads_cache(self) -> bool {
    matches!(self, FetchPolicy::CacheFirst | FetchPolicy::CacheAndNetwork)
  }

  pub fn writes_cache(self) -> bool {
    !matches!(self, FetchPolicy::NoCache)
  }
}
