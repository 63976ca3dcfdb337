#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use openportal_action::handlers::builtin_registry;
use openportal_action::{
  ActionContext, ActionError, ActionExecutor, ActionHandler, ActionRegistry, FixedDialogs, Host,
  RecordingRouter, RecordingToaster, StateStore,
};
use openportal_config::EngineConfig;
use openportal_http::MockHttpClient;
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Records every call and returns a fixed outcome.
pub struct Spy {
  outcome: Result<Value, ActionError>,
  calls: Mutex<Vec<Instant>>,
}

impl Spy {
  pub fn ok(data: Value) -> Arc<Self> {
    Arc::new(Self {
      outcome: Ok(data),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn failing(error: ActionError) -> Arc<Self> {
    Arc::new(Self {
      outcome: Err(error),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }

  pub fn call_times(&self) -> Vec<Instant> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl ActionHandler for Spy {
  async fn handle(
    &self,
    _params: Value,
    _ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    self.calls.lock().unwrap().push(Instant::now());
    self.outcome.clone()
  }
}

/// Sleeps for its configured delay unless cancelled first. Keeps the
/// tokens it was handed so tests can check they were cancelled.
pub struct Slow {
  delay: Duration,
  started: AtomicUsize,
  tokens: Mutex<Vec<CancellationToken>>,
}

impl Slow {
  pub fn new(delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      delay,
      started: AtomicUsize::new(0),
      tokens: Mutex::new(Vec::new()),
    })
  }

  pub fn started(&self) -> usize {
    self.started.load(Ordering::SeqCst)
  }

  pub fn tokens(&self) -> Vec<CancellationToken> {
    self.tokens.lock().unwrap().clone()
  }
}

#[async_trait]
impl ActionHandler for Slow {
  async fn handle(
    &self,
    _params: Value,
    _ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    self.started.fetch_add(1, Ordering::SeqCst);
    self.tokens.lock().unwrap().push(cancel.clone());
    tokio::select! {
      _ = tokio::time::sleep(self.delay) => Ok(json!("done")),
      _ = cancel.cancelled() => Err(ActionError::cancelled()),
    }
  }
}

pub struct Panics;

#[async_trait]
impl ActionHandler for Panics {
  async fn handle(
    &self,
    _params: Value,
    _ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    panic!("handler exploded");
  }
}

/// Everything a test needs to drive the executor and inspect side effects.
pub struct Harness {
  pub http: Arc<MockHttpClient>,
  pub router: Arc<RecordingRouter>,
  pub toaster: Arc<RecordingToaster>,
  pub registry: Arc<ActionRegistry>,
  pub ctx: ActionContext,
}

impl Harness {
  pub fn new(initial_state: Value) -> Self {
    let http = Arc::new(MockHttpClient::new());
    let router = Arc::new(RecordingRouter::new("/"));
    let toaster = Arc::new(RecordingToaster::default());
    let host = Host::new(router.clone(), toaster.clone(), Arc::new(FixedDialogs::new(true)));

    let registry = builtin_registry(http.clone(), &EngineConfig::default()).unwrap();

    Self {
      http,
      router,
      toaster,
      registry: Arc::new(registry),
      ctx: ActionContext::new(StateStore::new(initial_state), host),
    }
  }

  pub fn register(&self, type_name: &str, handler: Arc<dyn ActionHandler>) {
    self.registry.register(type_name, handler, None).unwrap();
  }

  pub fn executor(&self) -> ActionExecutor {
    ActionExecutor::new(self.registry.clone())
  }
}
