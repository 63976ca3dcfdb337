//! Page-local state shared by every action of a session.

use std::sync::{Arc, RwLock};

use openportal_template::{TemplateError, lookup_path, set_path};
use serde_json::Value;

/// Shared, lockable page state.
///
/// Cloning yields another handle to the same state. Each [`StateStore::set`]
/// holds the write lock for the whole read-merge-write, so concurrent writers
/// never observe or produce partial updates.
#[derive(Debug, Clone)]
pub struct StateStore {
  inner: Arc<RwLock<Value>>,
}

impl StateStore {
  /// Create a store. Non-object initial values are replaced by `{}`.
  pub fn new(initial: Value) -> Self {
    let initial = if initial.is_object() {
      initial
    } else {
      Value::Object(serde_json::Map::new())
    };
    Self {
      inner: Arc::new(RwLock::new(initial)),
    }
  }

  /// A copy of the value at `path`, if present.
  pub fn get(&self, path: &str) -> Option<Value> {
    let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
    lookup_path(&state, path).cloned()
  }

  /// A copy of the whole state.
  pub fn snapshot(&self) -> Value {
    self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
  }

  /// Write `value` at `path`.
  ///
  /// With `merge` and both the current and new values being objects, the new
  /// keys are merged shallowly into the existing object. Otherwise exactly
  /// the addressed value is replaced; siblings are untouched.
  pub fn set(&self, path: &str, value: Value, merge: bool) -> Result<(), TemplateError> {
    let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());

    let value = match (merge, lookup_path(&state, path), value) {
      (true, Some(Value::Object(existing)), Value::Object(incoming)) => {
        let mut merged = existing.clone();
        merged.extend(incoming);
        Value::Object(merged)
      }
      (_, _, value) => value,
    };

    set_path(&mut state, path, value)
  }

  /// Replace the entire state.
  pub fn replace_all(&self, value: Value) {
    *self.inner.write().unwrap_or_else(|e| e.into_inner()) = value;
  }
}

impl Default for StateStore {
  fn default() -> Self {
    Self::new(Value::Object(serde_json::Map::new()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_set_creates_intermediate_objects() {
    let store = StateStore::default();
    store.set("form.user.name", json!("Ada"), true).unwrap();
    assert_eq!(store.snapshot(), json!({ "form": { "user": { "name": "Ada" } } }));
  }

  #[test]
  fn test_merge_is_shallow() {
    let store = StateStore::new(json!({
      "filters": { "status": "open", "range": { "from": 1, "to": 9 } }
    }));
    store
      .set("filters", json!({ "range": { "from": 5 }, "q": "x" }), true)
      .unwrap();

    assert_eq!(
      store.get("filters").unwrap(),
      json!({ "status": "open", "range": { "from": 5 }, "q": "x" })
    );
  }

  #[test]
  fn test_replace_touches_only_addressed_value() {
    let store = StateStore::new(json!({
      "filters": { "status": "open", "page": 2 },
      "selected": [1, 2]
    }));
    store.set("filters.status", json!("closed"), false).unwrap();
    store.set("selected", json!({ "all": true }), false).unwrap();

    assert_eq!(
      store.snapshot(),
      json!({ "filters": { "status": "closed", "page": 2 }, "selected": { "all": true } })
    );
  }

  #[test]
  fn test_replace_object_without_merge() {
    let store = StateStore::new(json!({ "filters": { "status": "open", "page": 2 } }));
    store.set("filters", json!({ "page": 1 }), false).unwrap();
    assert_eq!(store.get("filters").unwrap(), json!({ "page": 1 }));
  }

  #[test]
  fn test_merge_with_non_object_replaces() {
    let store = StateStore::new(json!({ "count": 1 }));
    store.set("count", json!(5), true).unwrap();
    assert_eq!(store.get("count"), Some(json!(5)));
  }

  #[test]
  fn test_empty_path_is_error() {
    let store = StateStore::default();
    assert_eq!(store.set("", json!(1), true), Err(TemplateError::EmptyPath));
  }

  #[test]
  fn test_clones_share_state() {
    let store = StateStore::default();
    let other = store.clone();
    other.set("flag", json!(true), true).unwrap();
    assert_eq!(store.get("flag"), Some(json!(true)));
  }
}
