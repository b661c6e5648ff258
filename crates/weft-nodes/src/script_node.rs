//! The `script` node: runs a user JavaScript body.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, port,
};
use weft_script::{Sandbox, is_truthy};

fn default_input_count() -> u32 {
  1
}

#[derive(Debug, Deserialize)]
pub struct ScriptNode {
  code: String,
  /// Number of input ports (`data` when 1, `data1..dataN` when more).
  #[serde(default = "default_input_count")]
  input_count: u32,
}

impl ScriptNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::SCRIPT, data)
  }
}

#[async_trait]
impl WorkflowNode for ScriptNode {
  fn type_name(&self) -> &'static str {
    node_type::SCRIPT
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.code.is_empty() {
      return Err(NodeError::config("script requires code"));
    }
    if !(1..=10).contains(&self.input_count) {
      return Err(NodeError::config("script input_count must be between 1 and 10"));
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
    let code = self.code.clone();
    let bindings = inputs.clone();

    // Thrown JS exceptions are fatal here; the `always` port is the
    // failure-observation path, not `false`.
    let result = tokio::task::spawn_blocking(move || sandbox.eval_function_body(&code, &bindings))
      .await
      .map_err(|e| NodeError::runtime(format!("script task failed: {e}")))?
      .map_err(|e| NodeError::runtime(e.to_string()))?;

    let truthy = is_truthy(&result);
    let mut data = inputs;
    data.insert("result".to_string(), result);

    let branch = if truthy { port::TRUE } else { port::FALSE };
    Ok(NodeOutput::selection(data, [port::ALWAYS, branch]))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{Value, json};
  use weft_runtime::Services;

  fn node(code: &str) -> ScriptNode {
    let mut data = DataMap::new();
    data.insert("code".to_string(), json!(code));
    ScriptNode::from_data(&data).unwrap()
  }

  async fn run(code: &str, input: Value) -> Result<NodeOutput, NodeError> {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), input);
    node(code).run(&registry, inputs, &CancellationToken::new()).await
  }

  #[tokio::test]
  async fn test_return_value_lands_on_result() {
    let output = run("return { y: data.item * 2 };", json!({"item": 3}))
      .await
      .unwrap();
    assert_eq!(output.data().unwrap().get("result"), Some(&json!({"y": 6})));
    assert!(output.activates(port::ALWAYS));
    assert!(output.activates(port::TRUE));
  }

  #[tokio::test]
  async fn test_falsy_result_routes_false() {
    let output = run("return 0;", json!({})).await.unwrap();
    assert!(output.activates(port::ALWAYS));
    assert!(output.activates(port::FALSE));
    assert!(!output.activates(port::TRUE));
  }

  #[tokio::test]
  async fn test_throw_is_fatal() {
    let err = run("throw new Error(\"bad input\");", json!({})).await.unwrap_err();
    assert!(!err.is_config());
    assert!(err.to_string().contains("bad input"));
  }

  #[tokio::test]
  async fn test_input_count_bounds() {
    let mut data = DataMap::new();
    data.insert("code".to_string(), json!("return 1;"));
    data.insert("input_count".to_string(), json!(11));
    let node = ScriptNode::from_data(&data).unwrap();
    let registry = Registry::new(Services::default(), DataMap::new());
    assert!(node.validate(&registry).await.unwrap_err().is_config());
  }

  #[tokio::test]
  async fn test_multiple_inputs_bound_by_port_name() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("data1".to_string(), json!(2));
    inputs.insert("data2".to_string(), json!(3));

    let mut data = DataMap::new();
    data.insert("code".to_string(), json!("return data1 + data2;"));
    data.insert("input_count".to_string(), json!(2));

    let output = ScriptNode::from_data(&data)
      .unwrap()
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(output.data().unwrap().get("result"), Some(&json!(5)));
  }
}
