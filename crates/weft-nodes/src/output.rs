//! The `output` node: publishes gathered data as run outputs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{DataMap, NodeError, NodeOutput, Registry, WorkflowNode};

/// Copies every gathered key into the registry outputs (last writer wins
/// across the run) and re-emits its inputs unchanged.
pub struct OutputNode;

impl OutputNode {
  pub fn from_data(_data: &DataMap) -> Result<Self, NodeError> {
    Ok(Self)
  }
}

#[async_trait]
impl WorkflowNode for OutputNode {
  fn type_name(&self) -> &'static str {
    node_type::OUTPUT
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    registry.merge_outputs(&inputs);
    Ok(NodeOutput::plain(inputs))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  #[tokio::test]
  async fn test_output_merges_into_registry() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let node = OutputNode::from_data(&DataMap::new()).unwrap();

    let mut inputs = DataMap::new();
    inputs.insert("text".to_string(), json!("done"));
    node
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap();

    assert!(registry.outputs_written());
    assert_eq!(registry.outputs_snapshot().get("text"), Some(&json!("done")));
  }
}
