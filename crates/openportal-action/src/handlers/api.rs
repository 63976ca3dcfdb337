use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use openportal_config::EngineConfig;
use openportal_http::{HttpClient, HttpRequest, HttpResponse, Method};
use openportal_template::stringify;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ActionHandler, parse_params};
use crate::context::ActionContext;
use crate::error::{ActionError, ErrorKind};

/// Send `request`, giving up as soon as `cancel` fires.
async fn send_cancellable(
  client: &dyn HttpClient,
  request: HttpRequest,
  cancel: &CancellationToken,
) -> Result<HttpResponse, ActionError> {
  tokio::select! {
    response = client.send(request) => response.map_err(ActionError::from),
    _ = cancel.cancelled() => Err(ActionError::cancelled()),
  }
}

#[derive(Debug, Deserialize)]
struct ApiCallParams {
  url: String,
  #[serde(default)]
  method: Option<String>,
  #[serde(default)]
  headers: Option<HashMap<String, Value>>,
  #[serde(default)]
  body: Option<Value>,
  #[serde(default)]
  query: Option<serde_json::Map<String, Value>>,
}

/// `apiCall`: one HTTP request; any non-2xx status is a `NETWORK_ERROR`.
pub struct ApiCallHandler {
  client: Arc<dyn HttpClient>,
}

impl ApiCallHandler {
  pub fn new(client: Arc<dyn HttpClient>) -> Self {
    Self { client }
  }
}

#[async_trait]
impl ActionHandler for ApiCallHandler {
  async fn handle(
    &self,
    params: Value,
    _ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let params: ApiCallParams = parse_params("apiCall", params)?;

    let method: Method = match params.method.as_deref() {
      Some(method) => method.parse()?,
      None => Method::Get,
    };

    let mut request = HttpRequest::new(method, params.url);
    for (key, value) in params.headers.unwrap_or_default() {
      if !value.is_null() {
        request = request.with_header(key, stringify(&value));
      }
    }
    for (key, value) in params.query.unwrap_or_default() {
      if !value.is_null() {
        request = request.with_query(key, stringify(&value));
      }
    }
    if let Some(body) = params.body.filter(|b| !b.is_null()) {
      request = request.with_body(body);
    }

    let url = request.url.clone();
    let response = send_cancellable(self.client.as_ref(), request, &cancel).await?;

    if !response.is_success() {
      warn!(url = %url, status = response.status, "api call returned error status");
      return Err(
        ActionError::network(format!("request failed with status {}", response.status))
          .with_cause(json!({ "status": response.status, "body": response.body })),
      );
    }

    debug!(url = %url, status = response.status, "api call succeeded");
    Ok(response.to_value())
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteActionParams {
  action_id: String,
  #[serde(default)]
  context: Value,
}

/// Response envelope of the action gateway.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
  success: Option<bool>,
  #[serde(default)]
  data: Value,
  #[serde(default)]
  error: Option<EnvelopeError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeError {
  #[serde(default)]
  code: Option<String>,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  field_errors: Option<Value>,
}

/// `executeAction`: POST to the backend's named-action gateway.
pub struct ExecuteActionHandler {
  client: Arc<dyn HttpClient>,
  config: EngineConfig,
}

impl ExecuteActionHandler {
  pub fn new(client: Arc<dyn HttpClient>, config: EngineConfig) -> Self {
    Self { client, config }
  }
}

fn envelope_of(body: &Value) -> Envelope {
  serde_json::from_value(body.clone()).unwrap_or_default()
}

/// Map a non-2xx gateway response onto a typed action error.
fn status_error(action_id: &str, response: &HttpResponse) -> ActionError {
  let envelope = envelope_of(&response.body);
  let error = envelope.error.unwrap_or_default();

  let kind = match response.status {
    400 => ErrorKind::ValidationError,
    401 | 403 => ErrorKind::PermissionError,
    500..=599 => ErrorKind::ServerError,
    _ => ErrorKind::NetworkError,
  };
  let message = error.message.unwrap_or_else(|| {
    format!(
      "action '{}' failed with status {}",
      action_id, response.status
    )
  });

  let mut cause = json!({ "status": response.status, "body": response.body });
  if let Some(field_errors) = error.field_errors {
    cause["fieldErrors"] = field_errors;
  }
  ActionError::new(kind, message).with_cause(cause)
}

#[async_trait]
impl ActionHandler for ExecuteActionHandler {
  async fn handle(
    &self,
    params: Value,
    _ctx: &ActionContext,
    cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let params: ExecuteActionParams = parse_params("executeAction", params)?;
    if params.action_id.is_empty() {
      return Err(ActionError::validation("executeAction requires an 'actionId'"));
    }

    let url = self.config.action_gateway_url(&params.action_id);
    let request = HttpRequest::post(url).with_body(json!({ "context": params.context }));
    let response = send_cancellable(self.client.as_ref(), request, &cancel).await?;

    if !response.is_success() {
      return Err(status_error(&params.action_id, &response));
    }

    let envelope = envelope_of(&response.body);
    match envelope.success {
      Some(false) => {
        let error = envelope.error.unwrap_or_default();
        let kind = error
          .code
          .as_deref()
          .map(ErrorKind::from_code)
          .unwrap_or(ErrorKind::ServerError);
        let message = error
          .message
          .unwrap_or_else(|| format!("action '{}' failed", params.action_id));
        let mut cause = json!({ "status": response.status, "code": error.code });
        if let Some(field_errors) = error.field_errors {
          cause["fieldErrors"] = field_errors;
        }
        Err(ActionError::new(kind, message).with_cause(cause))
      }
      Some(true) => Ok(envelope.data),
      // Not an envelope; pass the body through.
      None => Ok(response.body),
    }
  }
}
