use std::sync::Arc;

use async_trait::async_trait;
use openportal_config::DatasourceSource;
use tokio_util::sync::CancellationToken;

use super::{DatasourceHandler, WatchCallback, WatchEvent, mismatch};
use crate::error::DatasourceError;
use crate::subscription::Subscription;
use crate::websocket::{ConnectionState, WebSocketTransport};

/// Serves a websocket topic: `fetch` returns the latest message, `watch`
/// streams new messages and connection changes.
pub struct WebSocketDatasource {
  transport: Arc<dyn WebSocketTransport>,
}

impl WebSocketDatasource {
  pub fn new(transport: Arc<dyn WebSocketTransport>) -> Self {
    Self { transport }
  }
}

#[async_trait]
impl DatasourceHandler for WebSocketDatasource {
  async fn fetch(
    &self,
    source: &DatasourceSource,
    _params: &serde_json::Value,
    _cancel: CancellationToken,
  ) -> Result<serde_json::Value, DatasourceError> {
    let DatasourceSource::WebSocket(config) = source else {
      return Err(mismatch("websocket", source));
    };

    if self.transport.connection_state() == ConnectionState::Failed {
      return Err(DatasourceError::Disconnected {
        topic: config.topic.clone(),
      });
    }
    Ok(
      self
        .transport
        .last_message(&config.topic)
        .unwrap_or(serde_json::Value::Null),
    )
  }

  fn watch(&self, source: &DatasourceSource, on_event: WatchCallback) -> Option<Subscription> {
    let DatasourceSource::WebSocket(config) = source else {
      return None;
    };

    let on_message = on_event.clone();
    let messages = self.transport.subscribe(
      &config.topic,
      Arc::new(move |payload: serde_json::Value| on_message(WatchEvent::Message(payload))),
    );
    let connection = self.transport.on_connection_state(Arc::new(move |state: ConnectionState| {
      on_event(WatchEvent::Connection(state))
    }));

    Some(Subscription::new(move || drop((messages, connection))))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::websocket::InMemoryTransport;
  use openportal_config::WebSocketSourceConfig;
  use serde_json::json;

  fn source() -> DatasourceSource {
    DatasourceSource::WebSocket(WebSocketSourceConfig {
      topic: "prices".to_string(),
    })
  }

  #[tokio::test]
  async fn test_fetch_returns_latest_message() {
    let transport = Arc::new(InMemoryTransport::default());
    transport.connect();
    let handler = WebSocketDatasource::new(transport.clone());

    let empty = handler
      .fetch(&source(), &json!({}), CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(empty, json!(null));

    transport.deliver("prices", json!({ "btc": 1 }));
    let latest = handler
      .fetch(&source(), &json!({}), CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(latest, json!({ "btc": 1 }));
  }

  #[test]
  fn test_watch_forwards_events_until_dropped() {
    let transport = Arc::new(InMemoryTransport::default());
    let handler = WebSocketDatasource::new(transport.clone());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let watch = handler
      .watch(
        &source(),
        Arc::new(move |event: WatchEvent| sink.lock().unwrap().push(event)),
      )
      .unwrap();

    transport.connect();
    transport.deliver("prices", json!(1));
    drop(watch);
    transport.deliver("prices", json!(2));

    assert_eq!(
      *events.lock().unwrap(),
      vec![
        WatchEvent::Connection(ConnectionState::Connected),
        WatchEvent::Message(json!(1)),
      ]
    );
  }
}
