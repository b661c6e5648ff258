//! The `loop` node: fans out one branch per item of an iterable expression.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config};
use weft_script::Sandbox;

#[derive(Debug, Deserialize)]
pub struct LoopNode {
  expression: String,
}

impl LoopNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::LOOP, data)
  }
}

/// Shape one fan-out item: maps get `index` merged in; everything else is
/// wrapped as `{item, index}`. The payload rides the `output` port so
/// downstream edges deliver it like any other node result.
fn shape_item(element: Value, index: usize) -> DataMap {
  let payload = match element {
    Value::Object(mut map) => {
      map.insert("index".to_string(), index.into());
      map
    }
    other => {
      let mut map = DataMap::new();
      map.insert("item".to_string(), other);
      map.insert("index".to_string(), index.into());
      map
    }
  };
  let mut item = DataMap::new();
  item.insert("output".to_string(), Value::Object(payload));
  item
}

#[async_trait]
impl WorkflowNode for LoopNode {
  fn type_name(&self) -> &'static str {
    node_type::LOOP
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.expression.is_empty() {
      return Err(NodeError::config("loop requires an expression"));
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

    match result {
      Value::Null => Ok(NodeOutput::StopBranch),
      Value::Array(items) => {
        if items.is_empty() {
          return Ok(NodeOutput::StopBranch);
        }
        let items = items
          .into_iter()
          .enumerate()
          .map(|(i, element)| shape_item(element, i))
          .collect();
        Ok(NodeOutput::fan_out(items))
      }
      scalar => Ok(NodeOutput::fan_out(vec![shape_item(scalar, 0)])),
    }
  }
}
