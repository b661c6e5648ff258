//! The `log` node: emits one structured record and passes inputs through.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Level {
  #[default]
  Info,
  Warn,
  Error,
  Debug,
}

#[derive(Debug, Deserialize)]
pub struct LogNode {
  #[serde(default)]
  level: Level,
  #[serde(default)]
  message: String,
}

impl LogNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::LOG, data)
  }
}

#[async_trait]
impl WorkflowNode for LogNode {
  fn type_name(&self) -> &'static str {
    node_type::LOG
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let context = weft_template::flatten_context(&inputs);
    let message = weft_template::render(&self.message, &context, &registry.services().variables)
      .map_err(|e| NodeError::runtime(format!("message template: {e}")))?;

    let data = inputs.get("data").cloned().unwrap_or(Value::Null);
    match self.level {
      Level::Info => tracing::info!(target: "weft_workflow", data = %data, "{message}"),
      Level::Warn => tracing::warn!(target: "weft_workflow", data = %data, "{message}"),
      Level::Error => tracing::error!(target: "weft_workflow", data = %data, "{message}"),
      Level::Debug => tracing::debug!(target: "weft_workflow", data = %data, "{message}"),
    }

    Ok(NodeOutput::plain(inputs))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  #[tokio::test]
  async fn test_passes_inputs_through() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut data = DataMap::new();
    data.insert("level".to_string(), json!("warn"));
    data.insert("message".to_string(), json!("processed {{ n }}"));
    let node = LogNode::from_data(&data).unwrap();

    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), json!({"n": 3}));
    let output = node
      .run(&registry, inputs.clone(), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(output.data().unwrap(), &inputs);
  }

  #[test]
  fn test_unknown_level_is_config_error() {
    let mut data = DataMap::new();
    data.insert("level".to_string(), json!("verbose"));
    assert!(LogNode::from_data(&data).is_err());
  }
}
