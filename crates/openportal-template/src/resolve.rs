//! Placeholder resolution.

use serde_json::Value;

use crate::path::lookup_path;

/// A `{{ path }}` occurrence inside a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
  /// Byte offset of the opening `{{`.
  pub start: usize,
  /// Byte offset just past the closing `}}`.
  pub end: usize,
  /// The trimmed dot-path between the braces.
  pub path: String,
}

/// Find every well-formed placeholder in `template`, in order.
///
/// An opening `{{` without a matching `}}` is treated as literal text.
pub fn find_placeholders(template: &str) -> Vec<Placeholder> {
  let mut placeholders = Vec::new();
  let mut offset = 0;

  while let Some(open) = template[offset..].find("{{") {
    let start = offset + open;
    let inner_start = start + 2;
    let Some(close) = template[inner_start..].find("}}") else {
      break;
    };
    let end = inner_start + close + 2;
    placeholders.push(Placeholder {
      start,
      end,
      path: template[inner_start..inner_start + close].trim().to_string(),
    });
    offset = end;
  }

  placeholders
}

pub fn has_placeholders(template: &str) -> bool {
  !find_placeholders(template).is_empty()
}

/// Resolve every string leaf of `template` against `context`.
///
/// Objects and arrays are walked recursively; non-string leaves pass through
/// unchanged.
pub fn resolve(template: &Value, context: &Value) -> Value {
  match template {
    Value::String(s) => resolve_str(s, context),
    Value::Array(items) => Value::Array(items.iter().map(|item| resolve(item, context)).collect()),
    Value::Object(map) => Value::Object(resolve_map(map, context)),
    other => other.clone(),
  }
}

/// Resolve every value of a params map.
pub fn resolve_map(
  map: &serde_json::Map<String, Value>,
  context: &Value,
) -> serde_json::Map<String, Value> {
  map
    .iter()
    .map(|(key, value)| (key.clone(), resolve(value, context)))
    .collect()
}

/// Resolve a single template string.
///
/// A string that is exactly one placeholder yields the typed value at its
/// path (`null` when missing). Otherwise each placeholder is replaced by the
/// [`stringify`]d value and the result is a string.
pub fn resolve_str(template: &str, context: &Value) -> Value {
  let placeholders = find_placeholders(template);

  match placeholders.as_slice() {
    [] => Value::String(template.to_string()),
    [only] if only.start == 0 && only.end == template.len() => {
      lookup_path(context, &only.path).cloned().unwrap_or(Value::Null)
    }
    _ => {
      let mut rendered = String::with_capacity(template.len());
      let mut cursor = 0;
      for placeholder in &placeholders {
        rendered.push_str(&template[cursor..placeholder.start]);
        if let Some(value) = lookup_path(context, &placeholder.path) {
          rendered.push_str(&stringify(value));
        } else {
          tracing::trace!(path = %placeholder.path, "template path not found");
        }
        cursor = placeholder.end;
      }
      rendered.push_str(&template[cursor..]);
      Value::String(rendered)
    }
  }
}

/// String form of a value for embedding in text.
///
/// Strings are inserted raw, `null` becomes empty, everything else uses its
/// compact JSON text.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
