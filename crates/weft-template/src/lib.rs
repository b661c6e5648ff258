//! Template rendering.
//!
//! Node configuration fields (template text, command lines, URLs, headers,
//! mail fields) are minijinja templates rendered against the node's gathered
//! inputs. Each render gets a fresh environment with a `getVar(key)` function
//! wired to the run's variable store.
//!
//! # Context shaping
//!
//! When a node's sole meaningful input is a `data` map, its fields are
//! promoted to the top level so users write `{{ field }}` instead of
//! `{{ data.field }}`. Nodes that take a `values` override (http_request,
//! email) overlay it on top of `data`, values winning.

use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::value::Value as TemplateValue;
use minijinja::{Environment, ErrorKind};
use serde_json::Value;
use thiserror::Error;
use weft_runtime::{DataMap, VariableStore};

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("template error: {0}")]
  Render(String),
}

/// Render a template against a JSON context.
pub fn render(
  template: &str,
  context: &Value,
  variables: &Arc<dyn VariableStore>,
) -> Result<String, TemplateError> {
  let mut env = Environment::new();
  let vars = variables.clone();
  env.add_function(
    "getVar",
    move |key: String| -> Result<String, minijinja::Error> {
      vars
        .get(&key)
        .map_err(|e| minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string()))
    },
  );

  env
    .render_str(template, TemplateValue::from_serialize(context))
    .map_err(|e| TemplateError::Render(e.to_string()))
}

/// Render a map of templates, keeping key order stable for error reporting.
pub fn render_map(
  templates: &BTreeMap<String, String>,
  context: &Value,
  variables: &Arc<dyn VariableStore>,
) -> Result<BTreeMap<String, String>, TemplateError> {
  let mut rendered = BTreeMap::new();
  for (key, template) in templates {
    let value = render(template, context, variables)
      .map_err(|TemplateError::Render(e)| TemplateError::Render(format!("{key}: {e}")))?;
    rendered.insert(key.clone(), value);
  }
  Ok(rendered)
}

/// Promote the fields of a sole `data` map input to the top-level context.
pub fn flatten_context(inputs: &DataMap) -> Value {
  if let Some(Value::Object(data)) = inputs.get("data") {
    return Value::Object(data.clone());
  }
  Value::Object(inputs.clone())
}

/// Context for nodes with a `values` override: `data` fields overlaid by
/// `values` fields, values winning.
pub fn overlay_context(inputs: &DataMap) -> Value {
  let mut context = match inputs.get("data") {
    Some(Value::Object(data)) => data.clone(),
    _ => inputs.clone(),
  };
  if let Some(Value::Object(values)) = inputs.get("values") {
    for (key, value) in values {
      context.insert(key.clone(), value.clone());
    }
  }
  Value::Object(context)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashMap;
  use weft_runtime::HostError;

  struct Vars(HashMap<String, String>);

  impl VariableStore for Vars {
    fn get(&self, key: &str) -> Result<String, HostError> {
      self
        .0
        .get(key)
        .cloned()
        .ok_or_else(|| HostError::not_found(format!("variable '{key}'")))
    }

    fn list(&self) -> HashMap<String, String> {
      self.0.clone()
    }
  }

  fn vars(pairs: &[(&str, &str)]) -> Arc<dyn VariableStore> {
    Arc::new(Vars(
      pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
    ))
  }

  #[test]
  fn test_render_simple_field() {
    let out = render("Hello {{ name }}", &json!({"name": "world"}), &vars(&[])).unwrap();
    assert_eq!(out, "Hello world");
  }

  #[test]
  fn test_render_is_idempotent() {
    let ctx = json!({"x": "y"});
    let first = render("{{ x }}", &ctx, &vars(&[])).unwrap();
    let second = render("{{ x }}", &ctx, &vars(&[])).unwrap();
    assert_eq!(first, "y");
    assert_eq!(first, second);
  }

  #[test]
  fn test_get_var_function() {
    let out = render(
      "token={{ getVar(\"api_key\") }}",
      &json!({}),
      &vars(&[("api_key", "s3cret")]),
    )
    .unwrap();
    assert_eq!(out, "token=s3cret");
  }

  #[test]
  fn test_get_var_miss_is_render_error() {
    let err = render("{{ getVar(\"nope\") }}", &json!({}), &vars(&[])).unwrap_err();
    assert!(err.to_string().contains("nope"));
  }

  #[test]
  fn test_flatten_promotes_sole_data_map() {
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), json!({"name": "ada"}));
    let ctx = flatten_context(&inputs);
    assert_eq!(
      render("{{ name }}", &ctx, &vars(&[])).unwrap(),
      "ada"
    );
  }

  #[test]
  fn test_flatten_keeps_non_map_inputs() {
    let mut inputs = DataMap::new();
    inputs.insert("text".to_string(), json!("raw"));
    let ctx = flatten_context(&inputs);
    assert_eq!(render("{{ text }}", &ctx, &vars(&[])).unwrap(), "raw");
  }

  #[test]
  fn test_overlay_values_win() {
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), json!({"a": "from-data", "b": "kept"}));
    inputs.insert("values".to_string(), json!({"a": "from-values"}));
    let ctx = overlay_context(&inputs);
    assert_eq!(
      render("{{ a }}/{{ b }}", &ctx, &vars(&[])).unwrap(),
      "from-values/kept"
    );
  }
}
