use async_trait::async_trait;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{ActionHandler, parse_params};
use crate::context::ActionContext;
use crate::error::ActionError;
use crate::host::{DialogRequest, Toast};

/// `showToast`: hands the toast to the host and always succeeds.
pub struct ShowToastHandler;

#[async_trait]
impl ActionHandler for ShowToastHandler {
  async fn handle(
    &self,
    params: Value,
    ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let toast: Toast = parse_params("showToast", params)?;
    ctx.host.toaster.show(toast);
    Ok(Value::Null)
  }
}

/// `showDialog`: waits for the user's answer, reported as `data.confirmed`.
pub struct ShowDialogHandler;

#[async_trait]
impl ActionHandler for ShowDialogHandler {
  async fn handle(
    &self,
    params: Value,
    ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let request: DialogRequest = parse_params("showDialog", params)?;

    tokio::select! {
      confirmed = ctx.host.dialogs.confirm(request) => Ok(json!({ "confirmed": confirmed })),
      _ = cancel.cancelled() => Err(ActionError::cancelled()),
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::host::{FixedDialogs, Host, RecordingRouter, RecordingToaster, ToastVariant};
  use crate::state::StateStore;

  #[tokio::test]
  async fn test_show_toast() {
    let toaster = Arc::new(RecordingToaster::default());
    let host = Host::new(
      Arc::new(RecordingRouter::new("/")),
      toaster.clone(),
      Arc::new(FixedDialogs::new(true)),
    );
    let ctx = ActionContext::new(StateStore::default(), host);

    ShowToastHandler
      .handle(
        json!({ "message": "Saved", "variant": "success", "durationMs": 3000 }),
        &ctx,
        CancellationToken::new(),
      )
      .await
      .unwrap();

    let toasts = toaster.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Saved");
    assert_eq!(toasts[0].variant, ToastVariant::Success);
    assert_eq!(toasts[0].duration_ms, Some(3000));
  }

  #[tokio::test]
  async fn test_show_dialog_reports_answer() {
    let dialogs = Arc::new(FixedDialogs::new(true));
    let host = Host::new(
      Arc::new(RecordingRouter::new("/")),
      Arc::new(RecordingToaster::default()),
      dialogs.clone(),
    );
    let ctx = ActionContext::new(StateStore::default(), host);

    let data = ShowDialogHandler
      .handle(
        json!({ "title": "Delete", "message": "Delete user?", "variant": "warning" }),
        &ctx,
        CancellationToken::new(),
      )
      .await
      .unwrap();

    assert_eq!(data, json!({ "confirmed": true }));
    assert_eq!(dialogs.shown()[0].message, "Delete user?");
  }
}
