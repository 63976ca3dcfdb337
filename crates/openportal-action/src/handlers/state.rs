use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{ActionHandler, parse_params};
use crate::context::ActionContext;
use crate::error::ActionError;

fn default_merge() -> bool {
  true
}

#[derive(Debug, Deserialize)]
struct SetStateParams {
  path: String,
  #[serde(default)]
  value: Value,
  #[serde(default = "default_merge")]
  merge: bool,
}

/// `setState`: shallow-merge (default) or replace the value at `path`.
pub struct SetStateHandler;

#[async_trait]
impl ActionHandler for SetStateHandler {
  async fn handle(
    &self,
    params: Value,
    ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let params: SetStateParams = parse_params("setState", params)?;

    ctx
      .state
      .set(&params.path, params.value, params.merge)
      .map_err(|e| ActionError::validation(e.to_string()))?;

    let value = ctx.state.get(&params.path).unwrap_or(Value::Null);
    Ok(json!({ "path": params.path, "value": value }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::Host;
  use crate::state::StateStore;
  use crate::ErrorKind;

  #[tokio::test]
  async fn test_set_state_defaults_to_merge() {
    let ctx = ActionContext::new(
      StateStore::new(json!({ "form": { "name": "a", "email": "e" } })),
      Host::recording(),
    );

    let data = SetStateHandler
      .handle(
        json!({ "path": "form", "value": { "name": "b" } }),
        &ctx,
        CancellationToken::new(),
      )
      .await
      .unwrap();

    assert_eq!(data["value"], json!({ "name": "b", "email": "e" }));
  }

  #[tokio::test]
  async fn test_set_state_replace() {
    let ctx = ActionContext::new(
      StateStore::new(json!({ "form": { "name": "a", "email": "e" } })),
      Host::recording(),
    );

    SetStateHandler
      .handle(
        json!({ "path": "form", "value": { "name": "b" }, "merge": false }),
        &ctx,
        CancellationToken::new(),
      )
      .await
      .unwrap();

    assert_eq!(ctx.state.get("form"), Some(json!({ "name": "b" })));
  }

  #[tokio::test]
  async fn test_write_through_scalar_is_validation_error() {
    let ctx = ActionContext::new(StateStore::new(json!({ "count": 1 })), Host::recording());

    let error = SetStateHandler
      .handle(
        json!({ "path": "count.inner", "value": 2 }),
        &ctx,
        CancellationToken::new(),
      )
      .await
      .unwrap_err();

    assert_eq!(error.kind, ErrorKind::ValidationError);
  }
}
