//! Action executor implementation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use openportal_config::ActionConfig;
use openportal_registry::Registry;
use openportal_template::{evaluate_when, resolve_map};
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::context::ActionContext;
use crate::error::{ActionError, ErrorKind};
use crate::events::{ActionEvent, ExecutionNotifier, NoopNotifier};
use crate::handlers::ActionHandler;
use crate::result::ActionResult;

/// Registry of action handlers keyed by type name.
pub type ActionRegistry = Registry<dyn ActionHandler>;

/// Types executed by the executor itself rather than a registered handler.
pub const COMPOSITE_TYPES: [&str; 3] = ["sequence", "parallel", "conditional"];

const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// What an action type resolves to.
enum Target {
  Composite(Composite),
  Handler(Arc<dyn ActionHandler>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Composite {
  Sequence,
  Parallel,
  Conditional,
}

impl Composite {
  fn from_type(action_type: &str) -> Option<Self> {
    match action_type {
      "sequence" => Some(Composite::Sequence),
      "parallel" => Some(Composite::Parallel),
      "conditional" => Some(Composite::Conditional),
      _ => None,
    }
  }
}

/// The action executor.
///
/// Holds no per-execution state: any number of executions, from unrelated
/// events, may run through one executor concurrently.
pub struct ActionExecutor {
  registry: Arc<ActionRegistry>,
  notifier: Arc<dyn ExecutionNotifier>,
  max_retry_delay: Duration,
}

impl ActionExecutor {
  pub fn new(registry: Arc<ActionRegistry>) -> Self {
    Self {
      registry,
      notifier: Arc::new(NoopNotifier),
      max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Cap for exponential retry backoff.
  pub fn with_max_retry_delay(mut self, max: Duration) -> Self {
    self.max_retry_delay = max;
    self
  }

  pub fn registry(&self) -> &Arc<ActionRegistry> {
    &self.registry
  }

  /// Execute one action and its success/error chain.
  ///
  /// Never fails: every failure, including panics inside handlers, is
  /// reported through the returned [`ActionResult`]. Composite children
  /// re-enter through this method, which is why it returns a boxed future.
  pub fn execute<'a>(
    &'a self,
    config: &'a ActionConfig,
    ctx: &'a ActionContext,
    cancel: &'a CancellationToken,
  ) -> BoxFuture<'a, ActionResult> {
    Box::pin(self.execute_action(config, ctx, cancel))
  }

  #[instrument(
    name = "action_execute",
    skip(self, config, ctx, cancel),
    fields(
      action_id = %config.id,
      action_type = %config.action_type,
    )
  )]
  async fn execute_action(
    &self,
    config: &ActionConfig,
    ctx: &ActionContext,
    cancel: &CancellationToken,
  ) -> ActionResult {
    let execution_id = uuid::Uuid::new_v4().to_string();
    let started = Instant::now();

    if cancel.is_cancelled() {
      return ActionResult::failure(ActionError::cancelled(), 0);
    }

    // Gate on `when`
    if let Some(expression) = config.when.as_deref() {
      match evaluate_when(expression, &ctx.template_context()) {
        Ok(true) => {}
        Ok(false) => {
          debug!(execution_id = %execution_id, when = %expression, "action_skipped");
          self.notifier.notify(ActionEvent::Skipped {
            execution_id,
            action_id: config.id.clone(),
          });
          return ActionResult::skipped();
        }
        Err(e) => {
          let result = ActionResult::failure(ActionError::validation(e.to_string()), 0);
          return self
            .finish(config, ctx, cancel, &execution_id, result)
            .await;
        }
      }
    }

    info!(execution_id = %execution_id, "action_started");
    self.notifier.notify(ActionEvent::Started {
      execution_id: execution_id.clone(),
      action_id: config.id.clone(),
      action_type: config.action_type.clone(),
    });

    let outcome = self.run_with_retry(config, ctx, cancel, &execution_id).await;
    let result = ActionResult::from_outcome(outcome, elapsed_ms(started));

    self
      .finish(config, ctx, cancel, &execution_id, result)
      .await
  }

  /// Resolve the target and run attempts until success, a non-retryable
  /// failure, cancellation or the attempt budget is exhausted.
  ///
  /// Retrying a composite re-runs its whole subtree, including children
  /// that already succeeded and their side effects.
  async fn run_with_retry(
    &self,
    config: &ActionConfig,
    ctx: &ActionContext,
    cancel: &CancellationToken,
    execution_id: &str,
  ) -> Result<Value, ActionError> {
    let (target, params) = match Composite::from_type(&config.action_type) {
      // Nested action lists resolve lazily, each child against the state
      // current at its own execution time.
      Some(composite) => (
        Target::Composite(composite),
        Value::Object(config.params.clone()),
      ),
      None => {
        let handler = self
          .registry
          .get(&config.action_type)
          .map_err(|_| ActionError::unknown_type(&config.action_type))?;
        let params = resolve_map(&config.params, &ctx.template_context());
        (Target::Handler(handler), Value::Object(params))
      }
    };

    let attempts = config.retry.map(|r| r.attempts.max(1)).unwrap_or(1);
    let mut attempt = 1;

    loop {
      let outcome = self
        .run_attempt(&target, params.clone(), config, ctx, cancel)
        .await;

      let error = match outcome {
        Ok(data) => return Ok(data),
        Err(error) => error,
      };

      let retry = match config.retry {
        Some(retry) if attempt < attempts && error.kind.is_retryable() => retry,
        _ => return Err(error),
      };

      let delay = retry.delay_for(attempt, self.max_retry_delay);
      warn!(
        execution_id = %execution_id,
        attempt,
        attempts,
        delay_ms = delay.as_millis() as u64,
        error = %error,
        "action_retrying"
      );
      self.notifier.notify(ActionEvent::Retrying {
        execution_id: execution_id.to_string(),
        action_id: config.id.clone(),
        attempt,
        delay_ms: delay.as_millis() as u64,
        kind: error.kind,
      });

      tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel.cancelled() => return Err(ActionError::cancelled()),
      }
      attempt += 1;
    }
  }

  /// One attempt: the target raced against the action's timeout and the
  /// caller's cancellation, with panics converted into `UNKNOWN_ERROR`.
  async fn run_attempt(
    &self,
    target: &Target,
    params: Value,
    config: &ActionConfig,
    ctx: &ActionContext,
    cancel: &CancellationToken,
  ) -> Result<Value, ActionError> {
    // Per-attempt token so a timeout cancels only this attempt
    let attempt_token = cancel.child_token();

    let call: BoxFuture<'_, Result<Value, ActionError>> = match target {
      Target::Handler(handler) => handler.handle(params, ctx, attempt_token.clone()),
      Target::Composite(composite) => {
        Box::pin(self.run_composite(*composite, params, ctx, attempt_token.clone()))
      }
    };
    let guarded = AssertUnwindSafe(call)
      .catch_unwind()
      .map(|outcome| outcome.unwrap_or_else(|panic| Err(panic_error(panic))));

    let timed = async {
      match config.timeout_duration() {
        Some(timeout) => match tokio::time::timeout(timeout, guarded).await {
          Ok(outcome) => outcome,
          Err(_) => {
            attempt_token.cancel();
            Err(ActionError::timeout(timeout.as_millis()))
          }
        },
        None => guarded.await,
      }
    };

    tokio::select! {
      biased;
      _ = cancel.cancelled() => {
        attempt_token.cancel();
        Err(ActionError::cancelled())
      }
      outcome = timed => outcome,
    }
  }

  /// Log the outcome and run the success/error chain. The chain never
  /// changes the reported outcome, only `recovered`.
  async fn finish(
    &self,
    config: &ActionConfig,
    ctx: &ActionContext,
    cancel: &CancellationToken,
    execution_id: &str,
    mut result: ActionResult,
  ) -> ActionResult {
    match &result.error {
      None => {
        info!(execution_id = %execution_id, duration_ms = result.duration_ms, "action_completed");
        self.notifier.notify(ActionEvent::Completed {
          execution_id: execution_id.to_string(),
          action_id: config.id.clone(),
          duration_ms: result.duration_ms,
        });
      }
      Some(error) => {
        warn!(
          execution_id = %execution_id,
          kind = %error.kind,
          error = %error.message,
          duration_ms = result.duration_ms,
          "action_failed"
        );
        self.notifier.notify(ActionEvent::Failed {
          execution_id: execution_id.to_string(),
          action_id: config.id.clone(),
          kind: error.kind,
          message: error.message.clone(),
        });
      }
    }

    // Cancellation is not a failure from the user's point of view
    if result.is_cancelled() || cancel.is_cancelled() {
      return result;
    }

    let chain = if result.success {
      &config.on_success
    } else {
      &config.on_error
    };
    if chain.is_empty() {
      return result;
    }

    let chain_ctx = ctx.with_result(result.to_value());
    let chain_outcome = self.run_sequence(chain, &chain_ctx, cancel).await;

    match chain_outcome {
      Ok(_) if !result.success => {
        debug!(execution_id = %execution_id, "action_recovered");
        result.recovered = true;
      }
      Ok(_) => {}
      Err(error) => {
        warn!(execution_id = %execution_id, error = %error, "action chain failed");
      }
    }

    result
  }
}

fn elapsed_ms(started: Instant) -> u64 {
  started.elapsed().as_millis() as u64
}

fn panic_error(panic: Box<dyn Any + Send>) -> ActionError {
  let message = panic
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| panic.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "handler panicked".to_string());

  ActionError::new(ErrorKind::UnknownError, "action handler panicked")
    .with_cause(json!({ "panic": message }))
}
