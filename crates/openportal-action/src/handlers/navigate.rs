use async_trait::async_trait;
use openportal_template::stringify;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ActionHandler, parse_params};
use crate::context::ActionContext;
use crate::error::ActionError;

const EXTERNAL_SCHEMES: [&str; 4] = ["http", "https", "mailto", "tel"];

/// Whether `target` is an absolute URL that must leave the application.
pub fn is_external_url(target: &str) -> bool {
  url::Url::parse(target)
    .map(|url| EXTERNAL_SCHEMES.contains(&url.scheme()))
    .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct NavigateParams {
  to: String,
  #[serde(default)]
  query: Option<serde_json::Map<String, Value>>,
  #[serde(default)]
  replace: bool,
}

/// Append `query` to `target` as an url-encoded query string.
fn with_query(target: &str, query: &serde_json::Map<String, Value>) -> String {
  let encoded: String = query
    .iter()
    .filter(|(_, value)| !value.is_null())
    .fold(
      url::form_urlencoded::Serializer::new(String::new()),
      |mut serializer, (key, value)| {
        serializer.append_pair(key, &stringify(value));
        serializer
      },
    )
    .finish();

  if encoded.is_empty() {
    return target.to_string();
  }
  let separator = if target.contains('?') { '&' } else { '?' };
  format!("{}{}{}", target, separator, encoded)
}

/// `navigate`: router push/replace for internal paths, external open otherwise.
pub struct NavigateHandler;

#[async_trait]
impl ActionHandler for NavigateHandler {
  async fn handle(
    &self,
    params: Value,
    ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let params: NavigateParams = parse_params("navigate", params)?;
    if params.to.is_empty() {
      return Err(ActionError::validation("navigate requires a non-empty 'to'"));
    }

    let target = with_query(&params.to, &params.query.unwrap_or_default());
    let router = &ctx.host.router;
    let external = is_external_url(&target);

    if external {
      router.open_external(&target);
    } else if params.replace {
      router.replace(&target);
    } else {
      router.push(&target);
    }

    debug!(to = %target, external, replace = params.replace, "navigated");
    Ok(json!({ "to": target, "external": external }))
  }
}

#[derive(Debug, Default, Deserialize)]
struct GoBackParams {
  #[serde(default)]
  fallback: Option<String>,
}

/// `goBack`: history back, else the fallback route, else nothing.
pub struct GoBackHandler;

#[async_trait]
impl ActionHandler for GoBackHandler {
  async fn handle(
    &self,
    params: Value,
    ctx: &ActionContext,
    _cancel: CancellationToken,
  ) -> Result<Value, ActionError> {
    let params: GoBackParams = if params.is_null() {
      GoBackParams::default()
    } else {
      parse_params("goBack", params)?
    };
    let router = &ctx.host.router;

    if router.history_len() > 1 {
      router.back();
      return Ok(json!({ "method": "back" }));
    }

    match params.fallback.filter(|f| !f.is_empty()) {
      Some(fallback) => {
        router.push(&fallback);
        Ok(json!({ "method": "fallback", "to": fallback }))
      }
      None => Ok(json!({ "method": "none" })),
    }
  }
}
