//! Composite actions: `sequence`, `parallel` and `conditional`.
//!
//! Children are plain [`ActionConfig`]s run through
//! [`ActionExecutor::execute`] with the parent's context and token, so
//! cancellation and state flow through the whole tree.

use futures::future::join_all;
use openportal_config::ActionConfig;
use openportal_template::evaluate_when;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::ActionContext;
use crate::error::{ActionError, ErrorKind};
use crate::executor::{ActionExecutor, Composite};
use crate::handlers::parse_params;
use crate::result::ActionResult;

#[derive(Debug, Deserialize)]
struct ActionListParams {
  #[serde(default)]
  actions: Vec<ActionConfig>,
}

#[derive(Debug, Deserialize)]
struct ConditionalParams {
  when: Value,
  #[serde(default)]
  then: Vec<ActionConfig>,
  #[serde(default, rename = "else")]
  otherwise: Vec<ActionConfig>,
}

impl ActionExecutor {
  pub(crate) async fn run_composite(
    &self,
    composite: Composite,
    params: Value,
    ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    match composite {
      Composite::Sequence => {
        let params: ActionListParams = parse_params("sequence", params)?;
        self.run_sequence(&params.actions, ctx, &cancel).await
      }
      Composite::Parallel => {
        let params: ActionListParams = parse_params("parallel", params)?;
        self.run_parallel(&params.actions, ctx, &cancel).await
      }
      Composite::Conditional => {
        let params: ConditionalParams = parse_params("conditional", params)?;
        self.run_conditional(params, ctx, &cancel).await
      }
    }
  }

  /// Run children in order, stopping at the first failure that was not
  /// recovered by the child's own `onError` chain.
  pub(crate) async fn run_sequence(
    &self,
    actions: &[ActionConfig],
    ctx: &ActionContext,
    cancel: &CancellationToken,
  ) -> Result<Value, ActionError> {
    let mut results = Vec::with_capacity(actions.len());

    for action in actions {
      let result = self.execute(action, ctx, cancel).await;

      if result.is_uncontained_failure() {
        debug!(action_id = %action.id, "sequence aborted");
        return Err(
          result
            .error
            .unwrap_or_else(|| ActionError::new(ErrorKind::UnknownError, "action failed")),
        );
      }
      results.push(result.to_value());
    }

    Ok(Value::Array(results))
  }

  /// Start every child at once and wait for all of them.
  ///
  /// Children share state without ordering guarantees: siblings writing
  /// different keys both land, siblings writing the same key race and the
  /// last writer wins.
  async fn run_parallel(
    &self,
    actions: &[ActionConfig],
    ctx: &ActionContext,
    cancel: &CancellationToken,
  ) -> Result<Value, ActionError> {
    let results: Vec<ActionResult> = join_all(
      actions
        .iter()
        .map(|action| self.execute(action, ctx, cancel)),
    )
    .await;

    let failed: Vec<&ActionResult> = results
      .iter()
      .filter(|r| r.is_uncontained_failure())
      .collect();

    let values: Vec<Value> = results.iter().map(ActionResult::to_value).collect();

    let Some(first) = failed.first() else {
      return Ok(Value::Array(values));
    };

    let kind = first
      .error
      .as_ref()
      .map(|e| e.kind)
      .unwrap_or(ErrorKind::UnknownError);
    let errors: Vec<Value> = failed
      .iter()
      .filter_map(|r| r.error.as_ref())
      .map(|e| serde_json::to_value(e).unwrap_or(Value::Null))
      .collect();

    Err(
      ActionError::new(
        kind,
        format!("{} of {} parallel actions failed", failed.len(), results.len()),
      )
      .with_cause(json!({ "errors": errors, "results": values })),
    )
  }

  /// Evaluate `when` and run exactly one branch as a sequence.
  async fn run_conditional(
    &self,
    params: ConditionalParams,
    ctx: &ActionContext,
    cancel: &CancellationToken,
  ) -> Result<Value, ActionError> {
    let condition = match &params.when {
      Value::String(expression) => evaluate_when(expression, &ctx.template_context())
        .map_err(|e| ActionError::validation(e.to_string()))?,
      Value::Bool(flag) => *flag,
      other => openportal_template::is_truthy(other),
    };

    let (branch, actions) = if condition {
      ("then", &params.then)
    } else {
      ("else", &params.otherwise)
    };

    if actions.is_empty() {
      return Ok(json!({ "branch": Value::Null, "results": [] }));
    }

    debug!(branch, "conditional branch selected");
    let results = self.run_sequence(actions, ctx, cancel).await?;
    Ok(json!({ "branch": branch, "results": results }))
  }
}
