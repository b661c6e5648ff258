//! The `template` node: renders a template against its `data` input.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config};

#[derive(Debug, Deserialize)]
pub struct TemplateNode {
  template: String,
}

impl TemplateNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::TEMPLATE, data)
  }
}

#[async_trait]
impl WorkflowNode for TemplateNode {
  fn type_name(&self) -> &'static str {
    node_type::TEMPLATE
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.template.is_empty() {
      return Err(NodeError::config("template requires template text"));
    }
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let context = weft_template::flatten_context(&inputs);
    let text = weft_template::render(&self.template, &context, &registry.services().variables)
      .map_err(|e| NodeError::runtime(e.to_string()))?;

    let mut data = DataMap::new();
    data.insert("text".to_string(), text.into());
    Ok(NodeOutput::plain(data))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  fn node(template: &str) -> TemplateNode {
    let mut data = DataMap::new();
    data.insert("template".to_string(), json!(template));
    TemplateNode::from_data(&data).unwrap()
  }

  #[tokio::test]
  async fn test_fields_of_data_are_top_level() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut inputs = DataMap::new();
    inputs.insert("data".to_string(), json!({"name": "world"}));

    let output = node("Hello {{ name }}")
      .run(&registry, inputs, &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(output.data().unwrap().get("text"), Some(&json!("Hello world")));
  }

  #[tokio::test]
  async fn test_empty_template_fails_validate() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let err = node("").validate(&registry).await.unwrap_err();
    assert!(err.is_config());
  }

  #[tokio::test]
  async fn test_render_error_is_runtime() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let err = node("{{ missing.deep }}")
      .run(&registry, DataMap::new(), &CancellationToken::new())
      .await
      .unwrap_err();
    assert!(!err.is_config());
  }
}
