//! The `llm_call` node: one chat completion, no tools.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  ChatMessage, DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, value,
};

#[derive(Debug, Deserialize)]
pub struct LlmCallNode {
  provider: String,
  #[serde(default)]
  model: Option<String>,
  #[serde(default)]
  system_prompt: Option<String>,
}

impl LlmCallNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::LLM_CALL, data)
  }
}

#[async_trait]
impl WorkflowNode for LlmCallNode {
  fn type_name(&self) -> &'static str {
    node_type::LLM_CALL
  }

  async fn validate(&self, registry: &Registry) -> Result<(), NodeError> {
    if self.provider.is_empty() {
      return Err(NodeError::config("llm_call requires a provider"));
    }
    registry
      .services()
      .providers
      .get(&self.provider)
      .map_err(|_| NodeError::config(format!("unknown provider '{}'", self.provider)))?;
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let handle = registry
      .services()
      .providers
      .get(&self.provider)
      .map_err(|_| NodeError::config(format!("unknown provider '{}'", self.provider)))?;

    let mut prompt = value::first_string(&inputs, &["prompt", "text", "data"])
      .ok_or_else(|| NodeError::runtime("llm_call requires a prompt input"))?;
    if let Some(context) = inputs.get("context") {
      prompt.push_str("\n\nContext:\n");
      prompt.push_str(&value::to_display_string(context));
    }

    let mut messages = Vec::new();
    if let Some(system) = &self.system_prompt {
      if !system.is_empty() {
        messages.push(ChatMessage::system(system.clone()));
      }
    }
    messages.push(ChatMessage::user(prompt));

    let model = self
      .model
      .clone()
      .unwrap_or_else(|| handle.default_model.clone());

    let response = tokio::select! {
      result = handle.chat.chat(&model, &messages, &[]) => {
        result.map_err(|e| NodeError::runtime(format!("chat failed: {e}")))?
      }
      _ = cancel.cancelled() => return Err(NodeError::runtime("cancelled")),
    };

    let mut data = DataMap::new();
    data.insert("response".to_string(), response.content.clone().into());
    data.insert("text".to_string(), response.content.into());
    Ok(NodeOutput::plain(data))
  }
}
