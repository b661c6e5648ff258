//! The `conditional` node: routes to the `true` or `false` port.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, port,
};
use weft_script::{Sandbox, is_truthy};

#[derive(Debug, Deserialize)]
pub struct ConditionalNode {
  expression: String,
}

impl ConditionalNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::CONDITIONAL, data)
  }
}

#[async_trait]
impl WorkflowNode for ConditionalNode {
  fn type_name(&self) -> &'static str {
    node_type::CONDITIONAL
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.expression.is_empty() {
      return Err(NodeError::config("conditional requires an expression"));
    }
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let sandbox = Sandbox::new(registry.services().variables.clone())
      .with_bodies(registry.bodies_snapshot());
    let expression = self.expression.clone();
    let bindings = inputs.clone();

    let result = tokio::task::spawn_blocking(move || sandbox.eval_expression(&expression, &bindings))
      .await
      .map_err(|e| NodeError::runtime(format!("script task failed: {e}")))?
      .map_err(|e| NodeError::runtime(e.to_string()))?;

    let truthy = is_truthy(&result);
    let mut data = inputs;
    data.insert("result".to_string(), Value::Bool(truthy));

    let active = if truthy { port::TRUE } else { port::FALSE };
    Ok(NodeOutput::selection(data, [active]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  fn node(expression: &str) -> ConditionalNode {
    let mut data = DataMap::new();
    data.insert("expression".to_string(), json!(expression));
    ConditionalNode::from_data(&data).unwrap()
  }

  async fn run(expression: &str, input: Value) -> NodeOutput {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), input);
    node(expression)
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn test_routes_true() {
    let output = run("data.n > 10", json!({"n": 42})).await;
    assert!(output.activates(port::TRUE));
    assert!(!output.activates(port::FALSE));
    assert_eq!(output.data().unwrap().get("result"), Some(&json!(true)));
  }

  #[tokio::test]
  async fn test_routes_false() {
    let output = run("data.n > 10", json!({"n": 5})).await;
    assert!(output.activates(port::FALSE));
    assert!(!output.activates(port::TRUE));
  }

  #[tokio::test]
  async fn test_non_boolean_truthy_routes_true() {
    let output = run("data.name", json!({"name": "ada"})).await;
    assert!(output.activates(port::TRUE));
    assert_eq!(output.data().unwrap().get("result"), Some(&json!(true)));
  }

  #[tokio::test]
  async fn test_inputs_pass_through() {
    let output = run("true", json!({"keep": 1})).await;
    assert_eq!(output.data().unwrap().get("data"), Some(&json!({"keep": 1})));
  }
}
