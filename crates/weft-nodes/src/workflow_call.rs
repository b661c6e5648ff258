//! The `workflow_call` node: runs another workflow synchronously and
//! returns its outputs.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  DataMap, MAX_SUBFLOW_DEPTH, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config,
  port, value,
};

#[derive(Debug, Deserialize)]
pub struct WorkflowCallNode {
  workflow_id: String,
  /// Static inputs; the dynamic `inputs` port wins on key collisions.
  #[serde(default)]
  inputs: DataMap,
}

impl WorkflowCallNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::WORKFLOW_CALL, data)
  }
}

#[async_trait]
impl WorkflowNode for WorkflowCallNode {
  fn type_name(&self) -> &'static str {
    node_type::WORKFLOW_CALL
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.workflow_id.is_empty() {
      return Err(NodeError::config("workflow_call requires a workflow_id"));
    }
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    if registry.workflow_id() == Some(self.workflow_id.as_str()) {
      return Err(NodeError::config(format!(
        "workflow '{}' cannot call itself",
        self.workflow_id
      )));
    }
    let depth = registry.depth() + 1;
    if depth > MAX_SUBFLOW_DEPTH {
      return Err(NodeError::config(format!(
        "workflow call depth exceeds {MAX_SUBFLOW_DEPTH}"
      )));
    }

    let mut child_inputs = self.inputs.clone();
    if let Some(Value::Object(dynamic)) = inputs.get("inputs") {
      value::merge(&mut child_inputs, dynamic);
    }

    let stored = registry
      .services()
      .workflows
      .get(&self.workflow_id)
      .await
      .map_err(|_| NodeError::config(format!("unknown workflow '{}'", self.workflow_id)))?;

    let entry_nodes: Vec<String> = stored
      .graph
      .nodes
      .iter()
      .filter(|n| n.node_type == node_type::INPUT)
      .map(|n| n.id.clone())
      .collect();

    let runner = registry
      .subflow_runner()
      .ok_or_else(|| NodeError::runtime("no subflow runner installed"))?;

    let outputs = runner
      .run_subflow(
        &stored.graph,
        child_inputs,
        &entry_nodes,
        Some(&stored.id),
        depth,
        cancel,
      )
      .await?;

    let mut data = DataMap::new();
    data.insert(port::OUTPUT.to_string(), Value::Object(outputs));
    Ok(NodeOutput::plain(data))
  }
}
