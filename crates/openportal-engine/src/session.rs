//! One page's worth of engine state.

use std::sync::{Arc, Mutex};

use openportal_action::handlers::builtin_registry as builtin_actions;
use openportal_action::{
  ActionContext, ActionExecutor, ActionResult, ExecutionNotifier, Host, NoopNotifier, StateStore,
};
use openportal_config::{ActionConfig, DatasourceConfig, EngineConfig};
use openportal_datasource::websocket::WebSocketTransport;
use openportal_datasource::{
  DatasourceError, DatasourceHandle, DatasourceManager, builtin_registry as builtin_datasources,
};
use openportal_http::HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::error::SessionError;

/// Page inputs: initial state plus the route, user and tenant the page was
/// opened with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInputs {
  pub state: Value,
  pub route_params: Value,
  pub query_params: Value,
  pub user: Value,
  pub tenant: Value,
}

/// Collaborators a session talks to.
#[derive(Clone)]
pub struct Services {
  pub http: Arc<dyn HttpClient>,
  pub transport: Arc<dyn WebSocketTransport>,
  pub host: Host,
  pub notifier: Arc<dyn ExecutionNotifier>,
}

impl Services {
  pub fn new(http: Arc<dyn HttpClient>, transport: Arc<dyn WebSocketTransport>, host: Host) -> Self {
    Self {
      http,
      transport,
      host,
      notifier: Arc::new(NoopNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }
}

/// A page session: one state store, one action executor and one datasource
/// manager sharing the same inputs.
pub struct PageSession {
  context: ActionContext,
  executor: ActionExecutor,
  datasources: DatasourceManager,
  cancel: Mutex<CancellationToken>,
}

impl PageSession {
  pub fn new(config: &EngineConfig, inputs: PageInputs, services: Services) -> Result<Self, SessionError> {
    config.validate()?;

    let actions = builtin_actions(services.http.clone(), config)?;
    let executor = ActionExecutor::new(Arc::new(actions))
      .with_notifier(services.notifier)
      .with_max_retry_delay(config.max_retry_delay());

    let datasources = builtin_datasources(services.http, services.transport)?;
    let datasources = DatasourceManager::new(Arc::new(datasources), config);

    let mut context = ActionContext::new(StateStore::new(inputs.state), services.host);
    if !inputs.route_params.is_null() {
      context = context.with_route_params(inputs.route_params);
    }
    if !inputs.query_params.is_null() {
      context = context.with_query_params(inputs.query_params);
    }
    let context = context.with_user(inputs.user).with_tenant(inputs.tenant);

    Ok(Self {
      context,
      executor,
      datasources,
      cancel: Mutex::new(CancellationToken::new()),
    })
  }

  pub fn state(&self) -> &StateStore {
    &self.context.state
  }

  pub fn context(&self) -> &ActionContext {
    &self.context
  }

  pub fn executor(&self) -> &ActionExecutor {
    &self.executor
  }

  pub fn datasources(&self) -> &DatasourceManager {
    &self.datasources
  }

  fn execution_token(&self) -> CancellationToken {
    self.cancel.lock().unwrap_or_else(|e| e.into_inner()).child_token()
  }

  /// Execute `config` for one triggering event.
  pub async fn trigger(&self, config: &ActionConfig) -> ActionResult {
    let cancel = self.execution_token();
    self.executor.execute(config, &self.context, &cancel).await
  }

  /// Like [`PageSession::trigger`], additionally aborting when `cancel`
  /// fires.
  pub async fn trigger_with(&self, config: &ActionConfig, cancel: CancellationToken) -> ActionResult {
    let token = self.execution_token();
    let mut execution = self.executor.execute(config, &self.context, &token);

    tokio::select! {
      result = &mut execution => result,
      _ = cancel.cancelled() => {
        token.cancel();
        execution.await
      }
    }
  }

  /// Attach a datasource with its params resolved against the current page
  /// context.
  pub fn attach_datasource(&self, config: DatasourceConfig) -> Result<DatasourceHandle, DatasourceError> {
    self
      .datasources
      .attach(config, &self.context.template_context())
  }

  /// Cancel every in-flight execution. Later triggers run normally.
  #[instrument(name = "page_session_cancel_all", skip(self))]
  pub fn cancel_all(&self) {
    let previous = {
      let mut cancel = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
      std::mem::replace(&mut *cancel, CancellationToken::new())
    };
    previous.cancel();
    info!("page_session_cancelled");
  }

  /// Cancel executions and tear down every datasource.
  pub fn close(&self) {
    self.cancel_all();
    self.datasources.teardown_all();
  }
}

impl Drop for PageSession {
  fn drop(&mut self) {
    self.close();
  }
}
