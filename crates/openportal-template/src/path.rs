//! Dot-path addressing into JSON values.
//!
//! `items.0.name` walks into the `items` key, then array index `0`, then the
//! `name` key. Numeric segments index arrays; on objects they are plain keys.

use serde_json::Value;

use crate::error::TemplateError;

/// One segment of a parsed dot-path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
  Key(String),
  Index(usize),
}

impl PathSegment {
  fn as_key(&self) -> String {
    match self {
      PathSegment::Key(key) => key.clone(),
      PathSegment::Index(idx) => idx.to_string(),
    }
  }
}

/// Split a dot-path into segments. Empty segments are dropped, so a blank
/// path addresses the root.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
  path
    .split('.')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| match s.parse::<usize>() {
      Ok(idx) => PathSegment::Index(idx),
      Err(_) => PathSegment::Key(s.to_string()),
    })
    .collect()
}

/// Look up the value at `path`, returning `None` when any segment is missing.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
  parse_path(path)
    .iter()
    .try_fold(root, |current, segment| match (current, segment) {
      (Value::Object(map), segment) => map.get(&segment.as_key()),
      (Value::Array(items), PathSegment::Index(idx)) => items.get(*idx),
      _ => None,
    })
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Array indices may address existing elements or append at `len`; writing
/// through a scalar is an error.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), TemplateError> {
  let segments = parse_path(path);
  let Some((last, parents)) = segments.split_last() else {
    return Err(TemplateError::EmptyPath);
  };

  let mut current = root;
  for segment in parents {
    current = child_mut(current, segment, path)?;
  }

  match (current, last) {
    (Value::Array(items), PathSegment::Index(idx)) if *idx < items.len() => {
      items[*idx] = value;
    }
    (Value::Array(items), PathSegment::Index(idx)) if *idx == items.len() => {
      items.push(value);
    }
    (current @ Value::Null, segment) => {
      let mut map = serde_json::Map::new();
      map.insert(segment.as_key(), value);
      *current = Value::Object(map);
    }
    (Value::Object(map), segment) => {
      map.insert(segment.as_key(), value);
    }
    (_, segment) => {
      return Err(TemplateError::NotAContainer {
        path: path.to_string(),
        segment: segment.as_key(),
      });
    }
  }

  Ok(())
}

/// Descend one segment for writing, materializing missing containers.
fn child_mut<'a>(
  current: &'a mut Value,
  segment: &PathSegment,
  path: &str,
) -> Result<&'a mut Value, TemplateError> {
  if current.is_null() {
    *current = Value::Object(serde_json::Map::new());
  }

  match (current, segment) {
    (Value::Array(items), PathSegment::Index(idx)) => {
      if *idx == items.len() {
        items.push(Value::Object(serde_json::Map::new()));
      }
      items.get_mut(*idx).ok_or_else(|| TemplateError::NotAContainer {
        path: path.to_string(),
        segment: idx.to_string(),
      })
    }
    (Value::Object(map), segment) => Ok(
      map
        .entry(segment.as_key())
        .or_insert_with(|| Value::Object(serde_json::Map::new())),
    ),
    (_, segment) => Err(TemplateError::NotAContainer {
      path: path.to_string(),
      segment: segment.as_key(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_parse_path_segments() {
    assert_eq!(
      parse_path("items.0.name"),
      vec![
        PathSegment::Key("items".to_string()),
        PathSegment::Index(0),
        PathSegment::Key("name".to_string()),
      ]
    );
    assert!(parse_path("").is_empty());
  }

  #[test]
  fn test_lookup_nested_and_indexed() {
    let root = json!({ "a": { "b": 5 }, "items": [{ "name": "first" }, { "name": "second" }] });

    assert_eq!(lookup_path(&root, "a.b"), Some(&json!(5)));
    assert_eq!(lookup_path(&root, "items.1.name"), Some(&json!("second")));
    assert_eq!(lookup_path(&root, ""), Some(&root));
  }

  #[test]
  fn test_lookup_missing_is_none() {
    let root = json!({ "a": { "b": 5 }, "items": [] });

    assert_eq!(lookup_path(&root, "a.c"), None);
    assert_eq!(lookup_path(&root, "a.b.c"), None);
    assert_eq!(lookup_path(&root, "items.3"), None);
    assert_eq!(lookup_path(&root, "missing.deeply.nested"), None);
  }

  #[test]
  fn test_lookup_numeric_key_on_object() {
    let root = json!({ "codes": { "404": "not found" } });
    assert_eq!(lookup_path(&root, "codes.404"), Some(&json!("not found")));
  }

  #[test]
  fn test_set_creates_intermediate_objects() {
    let mut root = json!({});
    set_path(&mut root, "form.user.name", json!("ada")).unwrap();
    assert_eq!(root, json!({ "form": { "user": { "name": "ada" } } }));
  }

  #[test]
  fn test_set_leaves_siblings_untouched() {
    let mut root = json!({ "form": { "name": "ada", "age": 36 } });
    set_path(&mut root, "form.name", json!("grace")).unwrap();
    assert_eq!(root, json!({ "form": { "name": "grace", "age": 36 } }));
  }

  #[test]
  fn test_set_array_index_and_append() {
    let mut root = json!({ "rows": [1, 2] });
    set_path(&mut root, "rows.0", json!(10)).unwrap();
    set_path(&mut root, "rows.2", json!(3)).unwrap();
    assert_eq!(root, json!({ "rows": [10, 2, 3] }));
  }

  #[test]
  fn test_set_through_scalar_fails() {
    let mut root = json!({ "count": 1 });
    let result = set_path(&mut root, "count.value", json!(2));
    assert!(matches!(result, Err(TemplateError::NotAContainer { .. })));
  }

  #[test]
  fn test_set_empty_path_fails() {
    let mut root = json!({});
    assert_eq!(set_path(&mut root, "", json!(1)), Err(TemplateError::EmptyPath));
  }
}
