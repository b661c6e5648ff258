//! Resource-config nodes: `skill_config`, `mcp_config`, `memory_config`.
//!
//! These publish configuration onto their output port for an `agent_call`
//! downstream; they have no behavior of their own.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config};

/// `skill_config`: publishes a list of skill names.
#[derive(Debug, Deserialize)]
pub struct SkillConfigNode {
  #[serde(default)]
  skills: Vec<String>,
}

impl SkillConfigNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::SKILL_CONFIG, data)
  }
}

#[async_trait]
impl WorkflowNode for SkillConfigNode {
  fn type_name(&self) -> &'static str {
    node_type::SKILL_CONFIG
  }

  async fn run(
    &self,
    _registry: &Registry,
    _inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let mut data = DataMap::new();
    data.insert("skills".to_string(), self.skills.clone().into());
    Ok(NodeOutput::plain(data))
  }
}

/// `mcp_config`: publishes a list of MCP server URLs.
#[derive(Debug, Deserialize)]
pub struct McpConfigNode {
  #[serde(default)]
  mcp_urls: Vec<String>,
}

impl McpConfigNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::MCP_CONFIG, data)
  }
}

#[async_trait]
impl WorkflowNode for McpConfigNode {
  fn type_name(&self) -> &'static str {
    node_type::MCP_CONFIG
  }

  async fn run(
    &self,
    _registry: &Registry,
    _inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let mut data = DataMap::new();
    data.insert("mcp_urls".to_string(), self.mcp_urls.clone().into());
    Ok(NodeOutput::plain(data))
  }
}

/// `memory_config`: relabels its `data` input as `memory` for an agent's
/// memory port.
pub struct MemoryConfigNode;

impl MemoryConfigNode {
  pub fn from_data(_data: &DataMap) -> Result<Self, NodeError> {
    Ok(Self)
  }
}

#[async_trait]
impl WorkflowNode for MemoryConfigNode {
  fn type_name(&self) -> &'static str {
    node_type::MEMORY_CONFIG
  }

  async fn run(
    &self,
    _registry: &Registry,
    inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let memory = inputs
      .get("data")
      .cloned()
      .unwrap_or_else(|| Value::Object(inputs.clone()));
    let mut data = DataMap::new();
    data.insert("memory".to_string(), memory);
    Ok(NodeOutput::plain(data))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  #[tokio::test]
  async fn test_skill_config_publishes_names() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut data = DataMap::new();
    data.insert("skills".to_string(), json!(["summarize", "search"]));
    let output = SkillConfigNode::from_data(&data)
      .unwrap()
      .run(&registry, DataMap::new(), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(
      output.data().unwrap().get("skills"),
      Some(&json!(["summarize", "search"]))
    );
  }

  #[tokio::test]
  async fn test_memory_config_relabels_data() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), json!({"turns": 3}));
    let output = MemoryConfigNode::from_data(&DataMap::new())
      .unwrap()
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(output.data().unwrap().get("memory"), Some(&json!({"turns": 3})));
  }

  #[tokio::test]
  async fn test_memory_config_falls_back_to_whole_inputs() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("notes".to_string(), json!("a"));
    let output = MemoryConfigNode::from_data(&DataMap::new())
      .unwrap()
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(
      output.data().unwrap().get("memory"),
      Some(&json!({"notes": "a"}))
    );
  }
}
