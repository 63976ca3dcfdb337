//! Built-in action handlers.
//!
//! | type            | handler                   |
//! |-----------------|---------------------------|
//! | `navigate`      | [`NavigateHandler`]       |
//! | `goBack`        | [`GoBackHandler`]         |
//! | `setState`      | [`SetStateHandler`]       |
//! | `apiCall`       | [`ApiCallHandler`]        |
//! | `executeAction` | [`ExecuteActionHandler`]  |
//! | `showToast`     | [`ShowToastHandler`]      |
//! | `showDialog`    | [`ShowDialogHandler`]     |

mod api;
mod feedback;
mod navigate;
mod state;

use std::sync::Arc;

use async_trait::async_trait;
use openportal_config::EngineConfig;
use openportal_http::HttpClient;
use openportal_registry::{HandlerMetadata, RegistryError};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::context::ActionContext;
use crate::error::ActionError;
use crate::executor::{ActionRegistry, COMPOSITE_TYPES};

pub use api::{ApiCallHandler, ExecuteActionHandler};
pub use feedback::{ShowDialogHandler, ShowToastHandler};
pub use navigate::{GoBackHandler, NavigateHandler, is_external_url};
pub use state::SetStateHandler;

/// Implementation of one action type.
///
/// `params` arrive already template-resolved. Handlers should observe
/// `cancel` at their own suspension points; the executor additionally
/// drops the handler future when the token fires.
#[async_trait]
pub trait ActionHandler: Send + Sync {
  async fn handle(
    &self,
    params: serde_json::Value,
    ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<serde_json::Value, ActionError>;
}

/// Deserialize resolved params into a handler's typed params.
pub(crate) fn parse_params<T: DeserializeOwned>(
  action_type: &str,
  params: serde_json::Value,
) -> Result<T, ActionError> {
  serde_json::from_value(params)
    .map_err(|e| ActionError::validation(format!("invalid params for '{}': {}", action_type, e)))
}

/// A registry holding every built-in handler, with the composite types reserved.
pub fn builtin_registry(
  client: Arc<dyn HttpClient>,
  config: &EngineConfig,
) -> Result<ActionRegistry, RegistryError> {
  let registry = ActionRegistry::with_reserved(COMPOSITE_TYPES);

  registry.register(
    "navigate",
    Arc::new(NavigateHandler),
    Some(HandlerMetadata::new("Navigate to an internal route or external URL").with_category("navigation")),
  )?;
  registry.register(
    "goBack",
    Arc::new(GoBackHandler),
    Some(HandlerMetadata::new("Go back in history or to a fallback route").with_category("navigation")),
  )?;
  registry.register(
    "setState",
    Arc::new(SetStateHandler),
    Some(HandlerMetadata::new("Write a value into page state").with_category("state")),
  )?;
  registry.register(
    "apiCall",
    Arc::new(ApiCallHandler::new(client.clone())),
    Some(HandlerMetadata::new("Perform an HTTP request").with_category("data")),
  )?;
  registry.register(
    "executeAction",
    Arc::new(ExecuteActionHandler::new(client, config.clone())),
    Some(HandlerMetadata::new("Invoke a named backend action").with_category("data")),
  )?;
  registry.register(
    "showToast",
    Arc::new(ShowToastHandler),
    Some(HandlerMetadata::new("Show a toast notification").with_category("feedback")),
  )?;
  registry.register(
    "showDialog",
    Arc::new(ShowDialogHandler),
    Some(HandlerMetadata::new("Ask the user for confirmation").with_category("feedback")),
  )?;

  Ok(registry)
}

#[cfg(test)]
mod tests {
  use super::*;
  use openportal_http::MockHttpClient;

  #[test]
  fn test_builtin_registry_lists_all_types() {
    let registry = builtin_registry(Arc::new(MockHttpClient::new()), &EngineConfig::default()).unwrap();
    let types: Vec<String> = registry.list_types().into_iter().collect();

    assert_eq!(
      types,
      vec![
        "apiCall",
        "conditional",
        "executeAction",
        "goBack",
        "navigate",
        "parallel",
        "sequence",
        "setState",
        "showDialog",
        "showToast",
      ]
    );
    assert_eq!(
      registry.metadata("apiCall").and_then(|m| m.category),
      Some("data".to_string())
    );
  }

  #[test]
  fn test_composite_types_cannot_be_registered() {
    let registry = builtin_registry(Arc::new(MockHttpClient::new()), &EngineConfig::default()).unwrap();
    let result = registry.register("sequence", Arc::new(NavigateHandler), None);
    assert!(matches!(result, Err(RegistryError::Reserved { .. })));
  }
}
