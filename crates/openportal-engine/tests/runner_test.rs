use std::sync::Arc;
use std::time::Duration;

use openportal_action::Host;
use openportal_config::{ActionConfig, EngineConfig};
use openportal_datasource::websocket::InMemoryTransport;
use openportal_engine::{ActionRunner, PageInputs, PageSession, Services};
use openportal_http::{MockHttpClient, MockResponse};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn session() -> Arc<PageSession> {
  let http = Arc::new(MockHttpClient::new());
  http.respond(
    "/slow",
    MockResponse::ok(200, json!({ "ok": true })).with_delay(Duration::from_secs(1)),
  );
  let services = Services::new(http, Arc::new(InMemoryTransport::default()), Host::recording());
  match PageSession::new(&EngineConfig::default(), PageInputs::default(), services) {
    Ok(session) => Arc::new(session),
    Err(e) => panic!("session failed to build: {e}"),
  }
}

fn slow_call() -> ActionConfig {
  ActionConfig::new("slow", "apiCall").with_param("url", json!("/slow"))
}

fn set_flag() -> ActionConfig {
  ActionConfig::new("fast", "setState")
    .with_param("path", json!("flag"))
    .with_param("value", json!(true))
}

#[tokio::test(start_paused = true)]
async fn test_events_run_concurrently() {
  let session = session();
  let (tx, mut outcomes) = mpsc::unbounded_channel();
  let runner = ActionRunner::new(session.clone()).with_outcomes(tx);
  let sender = runner.sender();
  let cancel = CancellationToken::new();
  let handle = tokio::spawn(runner.start(cancel.clone()));

  sender.send(slow_call()).await.unwrap();
  sender.send(set_flag()).await.unwrap();

  let first = outcomes.recv().await.unwrap();
  assert_eq!(first.action_id, "fast");
  assert!(first.result.success);

  let second = outcomes.recv().await.unwrap();
  assert_eq!(second.action_id, "slow");
  assert!(second.result.success);

  drop(sender);
  handle.await.unwrap();
  assert_eq!(session.state().get("flag"), Some(json!(true)));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_loop_and_cancels_executions() {
  let (tx, mut outcomes) = mpsc::unbounded_channel();
  let runner = ActionRunner::new(session()).with_outcomes(tx);
  let sender = runner.sender();
  let cancel = CancellationToken::new();
  let handle = tokio::spawn(runner.start(cancel.clone()));

  sender.send(slow_call()).await.unwrap();
  tokio::time::sleep(Duration::from_millis(10)).await;
  cancel.cancel();
  handle.await.unwrap();

  let outcome = outcomes.recv().await.unwrap();
  assert_eq!(outcome.action_id, "slow");
  assert!(outcome.result.is_cancelled());
}

#[tokio::test]
async fn test_queued_events_drain_when_senders_close() {
  let session = session();
  let (tx, mut outcomes) = mpsc::unbounded_channel();
  let runner = ActionRunner::new(session.clone()).with_outcomes(tx);

  runner.run(set_flag()).await.unwrap();
  runner.start(CancellationToken::new()).await;

  let outcome = outcomes.recv().await.unwrap();
  assert!(outcome.result.success);
  assert_eq!(session.state().get("flag"), Some(json!(true)));
}
