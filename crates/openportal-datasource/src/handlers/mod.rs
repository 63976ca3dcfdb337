//! Datasource handlers, selected by the datasource `type`.

mod http;
mod static_source;
mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use openportal_config::DatasourceSource;
use openportal_http::HttpClient;
use openportal_registry::{HandlerMetadata, Registry, RegistryError};
use tokio_util::sync::CancellationToken;

use crate::error::DatasourceError;
use crate::subscription::Subscription;
use crate::websocket::{ConnectionState, WebSocketTransport};

pub use http::HttpDatasource;
pub use static_source::StaticDatasource;
pub use websocket::WebSocketDatasource;

/// Live update pushed by a watching handler.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
  Message(serde_json::Value),
  Connection(ConnectionState),
}

pub type WatchCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Fetches data for one datasource type.
#[async_trait]
pub trait DatasourceHandler: Send + Sync {
  /// One read. `params` are the resolved datasource params.
  async fn fetch(
    &self,
    source: &DatasourceSource,
    params: &serde_json::Value,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, DatasourceError>;

  /// Subscribe to live updates. Sources without push support return `None`.
  fn watch(&self, _source: &DatasourceSource, _on_event: WatchCallback) -> Option<Subscription> {
    None
  }
}

pub type DatasourceRegistry = Registry<dyn DatasourceHandler>;

fn mismatch(expected: &str, source: &DatasourceSource) -> DatasourceError {
  DatasourceError::InvalidConfig {
    message: format!(
      "{} handler cannot serve a '{}' datasource",
      expected,
      source.type_name()
    ),
  }
}

/// A registry with the `http`, `websocket` and `static` handlers.
pub fn builtin_registry(
  client: Arc<dyn HttpClient>,
  transport: Arc<dyn WebSocketTransport>,
) -> Result<DatasourceRegistry, RegistryError> {
  let registry = DatasourceRegistry::new();
  registry.register(
    "http",
    Arc::new(HttpDatasource::new(client)),
    Some(HandlerMetadata::new("Fetch over HTTP").with_category("network")),
  )?;
  registry.register(
    "websocket",
    Arc::new(WebSocketDatasource::new(transport)),
    Some(HandlerMetadata::new("Live topic over a websocket transport").with_category("network")),
  )?;
  registry.register(
    "static",
    Arc::new(StaticDatasource),
    Some(HandlerMetadata::new("Literal value from configuration").with_category("local")),
  )?;
  Ok(registry)
}
