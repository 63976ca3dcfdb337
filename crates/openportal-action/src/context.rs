use serde_json::{Value, json};

use crate::host::Host;
use crate::state::StateStore;

/// Environment visible to an executing action.
///
/// Cheap to clone: the state store and host capabilities are shared
/// handles, so every action of one execution tree (and every tree of the
/// same page session) reads and writes the same state.
#[derive(Clone)]
pub struct ActionContext {
  pub state: StateStore,
  pub route_params: Value,
  pub query_params: Value,
  pub user: Value,
  pub tenant: Value,
  pub host: Host,
  result: Option<Value>,
}

impl ActionContext {
  pub fn new(state: StateStore, host: Host) -> Self {
    Self {
      state,
      route_params: empty_object(),
      query_params: empty_object(),
      user: Value::Null,
      tenant: Value::Null,
      host,
      result: None,
    }
  }

  pub fn with_route_params(mut self, params: Value) -> Self {
    self.route_params = params;
    self
  }

  pub fn with_query_params(mut self, params: Value) -> Self {
    self.query_params = params;
    self
  }

  pub fn with_user(mut self, user: Value) -> Self {
    self.user = user;
    self
  }

  pub fn with_tenant(mut self, tenant: Value) -> Self {
    self.tenant = tenant;
    self
  }

  /// A context for a success/error chain, exposing `result` to templates.
  pub fn with_result(&self, result: Value) -> Self {
    Self {
      result: Some(result),
      ..self.clone()
    }
  }

  pub fn result(&self) -> Option<&Value> {
    self.result.as_ref()
  }

  /// Snapshot used to resolve placeholders and `when` expressions.
  pub fn template_context(&self) -> Value {
    let mut context = json!({
      "state": self.state.snapshot(),
      "routeParams": self.route_params,
      "queryParams": self.query_params,
      "user": self.user,
      "tenant": self.tenant,
    });
    if let (Some(result), Value::Object(map)) = (&self.result, &mut context) {
      map.insert("result".to_string(), result.clone());
    }
    context
  }
}

fn empty_object() -> Value {
  Value::Object(serde_json::Map::new())
}
