//! `when` condition evaluation.
//!
//! Conditions use a small JavaScript-flavoured syntax:
//!
//! ```text
//! {{ state.flag }}
//! {{ user.role }} === 'admin' && !{{ state.locked }}
//! state.count >= 3 || (routeParams.mode !== "view")
//! ```
//!
//! The expression is translated to a minijinja expression (`===` becomes
//! `==`, `&&` becomes `and`, `{{ items.0 }}` becomes `items[0]`, ...) and
//! evaluated with chainable undefined values, so paths that do not exist are
//! simply falsy. Truthiness follows minijinja: `null`, `false`, `0`, `""` and
//! empty collections are false.

use minijinja::{Environment, UndefinedBehavior, Value as JinjaValue};
use serde_json::Value;

use crate::error::TemplateError;
use crate::resolve::find_placeholders;

/// Words passed through untranslated when they appear as bare identifiers.
const KEYWORDS: &[&str] = &["and", "or", "not", "true", "false", "none", "in", "is", "True", "False", "None"];

/// Evaluate a `when` expression against `context`.
///
/// A blank expression is treated as always true.
pub fn evaluate_when(expression: &str, context: &Value) -> Result<bool, TemplateError> {
  if expression.trim().is_empty() {
    return Ok(true);
  }

  let translated = translate_expression(expression);

  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Chainable);

  let compiled = env
    .compile_expression(&translated)
    .map_err(|e| invalid(expression, e))?;
  let result = compiled
    .eval(JinjaValue::from_serialize(context))
    .map_err(|e| invalid(expression, e))?;

  Ok(result.is_true())
}

/// Truthiness of a JSON value, consistent with [`evaluate_when`].
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

fn invalid(expression: &str, error: minijinja::Error) -> TemplateError {
  TemplateError::InvalidExpression {
    expression: expression.to_string(),
    message: error.to_string(),
  }
}

/// Translate the condition syntax into a minijinja expression.
pub fn translate_expression(expression: &str) -> String {
  let mut out = String::with_capacity(expression.len() + 16);
  let bytes = expression.as_bytes();
  let placeholders = find_placeholders(expression);
  let mut next_placeholder = placeholders.iter().peekable();
  let mut i = 0;

  while i < bytes.len() {
    if let Some(placeholder) = next_placeholder.peek()
      && placeholder.start == i
    {
      out.push_str(&path_expression(&placeholder.path));
      i = placeholder.end;
      next_placeholder.next();
      continue;
    }

    let rest = &expression[i..];
    let c = bytes[i];

    if c == b'\'' || c == b'"' {
      let len = quoted_len(rest, c);
      out.push_str(&rest[..len]);
      i += len;
    } else if rest.starts_with("===") || rest.starts_with("!==") {
      out.push_str(if c == b'=' { "==" } else { "!=" });
      i += 3;
    } else if rest.starts_with("&&") {
      out.push_str(" and ");
      i += 2;
    } else if rest.starts_with("||") {
      out.push_str(" or ");
      i += 2;
    } else if c == b'!' && !rest.starts_with("!=") {
      out.push_str(" not ");
      i += 1;
    } else if c.is_ascii_alphabetic() || c == b'_' {
      let len = path_len(rest);
      let word = &rest[..len];
      out.push_str(&bare_word(word));
      i += len;
    } else if c.is_ascii_digit() {
      let len = rest
        .bytes()
        .take_while(|b| b.is_ascii_digit() || *b == b'.')
        .count();
      out.push_str(&rest[..len]);
      i += len;
    } else {
      let ch_len = rest.chars().next().map_or(1, char::len_utf8);
      out.push_str(&rest[..ch_len]);
      i += ch_len;
    }
  }

  out
}

/// Length of a quoted string literal starting at `rest[0]`, including quotes.
fn quoted_len(rest: &str, quote: u8) -> usize {
  let bytes = rest.as_bytes();
  let mut i = 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 2,
      b if b == quote => return i + 1,
      _ => i += 1,
    }
  }
  bytes.len()
}

/// Length of a bare dot-path such as `state.items.0.name`.
fn path_len(rest: &str) -> usize {
  rest
    .bytes()
    .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.'))
    .count()
}

fn bare_word(word: &str) -> String {
  match word.trim_end_matches('.') {
    "null" | "undefined" => "none".to_string(),
    w if KEYWORDS.contains(&w) => w.to_string(),
    w => path_expression(w),
  }
}

/// Render a dot-path as a minijinja attribute/subscript chain.
fn path_expression(path: &str) -> String {
  let mut segments = path.split('.').map(str::trim).filter(|s| !s.is_empty());
  let Some(first) = segments.next() else {
    return "none".to_string();
  };

  let mut expr = if is_identifier(first) {
    first.to_string()
  } else {
    return "none".to_string();
  };

  for segment in segments {
    if segment.bytes().all(|b| b.is_ascii_digit()) {
      expr.push_str(&format!("[{}]", segment));
    } else if is_identifier(segment) {
      expr.push('.');
      expr.push_str(segment);
    } else {
      expr.push_str(&format!("[{:?}]", segment));
    }
  }

  expr
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn context() -> Value {
    json!({
      "state": { "flag": true, "count": 3, "empty": "", "items": [{ "name": "first" }], "tags": [] },
      "user": { "role": "admin", "name": "Ada" },
      "routeParams": { "mode": "edit" }
    })
  }

  #[test]
  fn test_truthy_placeholder() {
    assert!(evaluate_when("{{ state.flag }}", &context()).unwrap());
    assert!(!evaluate_when("{{ state.empty }}", &context()).unwrap());
    assert!(!evaluate_when("{{ state.tags }}", &context()).unwrap());
  }

  #[test]
  fn test_missing_path_is_falsy() {
    assert!(!evaluate_when("{{ state.missing.deep }}", &context()).unwrap());
    assert!(evaluate_when("!{{ state.missing }}", &context()).unwrap());
  }

  #[test]
  fn test_strict_equality_operators() {
    assert!(evaluate_when("{{ user.role }} === 'admin'", &context()).unwrap());
    assert!(!evaluate_when("{{ user.role }} !== \"admin\"", &context()).unwrap());
    assert!(evaluate_when("{{ state.count }} === 3", &context()).unwrap());
    assert!(!evaluate_when("{{ state.count }} === '3'", &context()).unwrap());
  }

  #[test]
  fn test_logical_operators_and_grouping() {
    let ctx = context();
    assert!(evaluate_when("{{ state.flag }} && {{ user.role }} === 'admin'", &ctx).unwrap());
    assert!(evaluate_when("{{ state.empty }} || {{ state.count }} > 2", &ctx).unwrap());
    assert!(!evaluate_when("!({{ state.flag }} && true)", &ctx).unwrap());
  }

  #[test]
  fn test_bare_paths_and_indices() {
    let ctx = context();
    assert!(evaluate_when("state.items.0.name === 'first'", &ctx).unwrap());
    assert!(evaluate_when("routeParams.mode != 'view'", &ctx).unwrap());
    assert!(evaluate_when("state.count >= 3", &ctx).unwrap());
  }

  #[test]
  fn test_null_literal() {
    let ctx = json!({ "state": { "selection": null } });
    assert!(evaluate_when("{{ state.selection }} === null", &ctx).unwrap());
  }

  #[test]
  fn test_operators_inside_strings_untouched() {
    assert_eq!(
      translate_expression("{{ a.b }} === 'x && y'"),
      "a.b == 'x && y'"
    );
  }

  #[test]
  fn test_translation_of_indices() {
    assert_eq!(translate_expression("{{ items.0.name }}"), "items[0].name");
    assert_eq!(translate_expression("!{{ flag }}"), " not flag");
  }

  #[test]
  fn test_blank_expression_is_true() {
    assert!(evaluate_when("   ", &json!({})).unwrap());
  }

  #[test]
  fn test_malformed_expression_errors() {
    let result = evaluate_when("{{ state.count }} ===", &context());
    assert!(matches!(result, Err(TemplateError::InvalidExpression { .. })));
  }

  #[test]
  fn test_is_truthy() {
    assert!(!is_truthy(&json!(null)));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!("")));
    assert!(!is_truthy(&json!([])));
    assert!(is_truthy(&json!("no")));
    assert!(is_truthy(&json!({ "a": 1 })));
  }
}
