//! Small helpers over `serde_json` values used across node implementations.

use serde_json::Value;

use crate::output::DataMap;

/// Render a value as a display string: strings pass through unquoted,
/// everything else is JSON-encoded.
pub fn to_display_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Shallow-merge `src` into `dst`, overwriting existing keys.
pub fn merge(dst: &mut DataMap, src: &DataMap) {
  for (key, value) in src {
    dst.insert(key.clone(), value.clone());
  }
}

/// Read the first present key from `keys`, rendered as a string.
pub fn first_string(inputs: &DataMap, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .find_map(|key| inputs.get(*key))
    .map(to_display_string)
}

/// Coerce a value that may be a list of strings or a single string into a
/// vector. Non-string list items are skipped.
pub fn string_list(value: &Value) -> Vec<String> {
  match value {
    Value::String(s) => vec![s.clone()],
    Value::Array(items) => items
      .iter()
      .filter_map(|v| v.as_str().map(str::to_string))
      .collect(),
    _ => Vec::new(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_to_display_string() {
    assert_eq!(to_display_string(&json!("plain")), "plain");
    assert_eq!(to_display_string(&json!(42)), "42");
    assert_eq!(to_display_string(&json!({"a": 1})), r#"{"a":1}"#);
  }

  #[test]
  fn test_first_string_fallback_order() {
    let mut inputs = DataMap::new();
    inputs.insert("text".to_string(), json!("fallback"));
    assert_eq!(
      first_string(&inputs, &["prompt", "text", "data"]),
      Some("fallback".to_string())
    );
    assert_eq!(first_string(&inputs, &["prompt"]), None);
  }

  #[test]
  fn test_string_list() {
    assert_eq!(string_list(&json!("one")), vec!["one"]);
    assert_eq!(string_list(&json!(["a", 1, "b"])), vec!["a", "b"]);
    assert!(string_list(&json!(7)).is_empty());
  }
}
