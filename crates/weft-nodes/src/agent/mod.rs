//! The `agent_call` node: a bounded LLM ↔ tool-call loop.
//!
//! Tools come from three places: MCP servers (connected per invocation and
//! closed on return), skills resolved through the host (whose system-prompt
//! fragments accumulate onto the agent's), and inline tool definitions on
//! the node itself. The model sees schemas only; handlers never cross the
//! provider boundary.

mod tools;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use weft_config::node_type;
use weft_runtime::{
  ChatMessage, DataMap, McpClient, NodeError, NodeOutput, Registry, SkillTool, ToolSpec,
  WorkflowNode, parse_node_config, value,
};

use tools::{HandlerTable, McpOwners, dispatch_tool};

const DEFAULT_MAX_ITERATIONS: u32 = 10;

fn default_max_iterations() -> u32 {
  DEFAULT_MAX_ITERATIONS
}

#[derive(Debug, Deserialize)]
pub struct AgentCallNode {
  provider: String,
  #[serde(default)]
  model: Option<String>,
  #[serde(default)]
  system_prompt: Option<String>,
  /// Iteration bound; 0 means unlimited.
  #[serde(default = "default_max_iterations")]
  max_iterations: u32,
  #[serde(default)]
  mcp_urls: Vec<String>,
  #[serde(default)]
  skills: Vec<String>,
  /// Inline tool definitions with handlers.
  #[serde(default)]
  tools: Vec<SkillTool>,
}

impl AgentCallNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::AGENT_CALL, data)
  }
}

#[async_trait]
impl WorkflowNode for AgentCallNode {
  fn type_name(&self) -> &'static str {
    node_type::AGENT_CALL
  }

  async fn validate(&self, registry: &Registry) -> Result<(), NodeError> {
    if self.provider.is_empty() {
      return Err(NodeError::config("agent_call requires a provider"));
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
    // MCP clients live for this invocation only.
    let mut clients: Vec<Box<dyn McpClient>> = Vec::new();
    let outcome = self.run_loop(registry, &inputs, cancel, &mut clients).await;
    for client in &clients {
      client.close().await;
    }
    outcome
  }
}

impl AgentCallNode {
  async fn run_loop(
    &self,
    registry: &Registry,
    inputs: &DataMap,
    cancel: &CancellationToken,
    clients: &mut Vec<Box<dyn McpClient>>,
  ) -> Result<NodeOutput, NodeError> {
    let services = registry.services();
    let handle = services
      .providers
      .get(&self.provider)
      .map_err(|_| NodeError::config(format!("unknown provider '{}'", self.provider)))?;

    let mut system_prompt = self.system_prompt.clone().unwrap_or_default();
    let mut specs: Vec<ToolSpec> = Vec::new();
    let mut owners = McpOwners::default();
    let mut handlers = HandlerTable::default();

    // MCP servers: static URLs merged with the `mcp` input port.
    let mut mcp_urls = self.mcp_urls.clone();
    if let Some(value) = inputs.get("mcp") {
      mcp_urls.extend(value::string_list(value));
    }
    for url in &mcp_urls {
      let client = services
        .mcp
        .connect(url)
        .await
        .map_err(|e| NodeError::runtime(format!("mcp connect {url}: {e}")))?;
      let index = clients.len();
      clients.push(client);
      let listed = clients[index]
        .list_tools()
        .await
        .map_err(|e| NodeError::runtime(format!("mcp list_tools {url}: {e}")))?;
      for tool in listed {
        owners.add(&tool.name, index);
        specs.push(ToolSpec {
          name: tool.name,
          description: tool.description,
          input_schema: tool.input_schema,
        });
      }
    }

    // Skills: static list merged with the `skills` input port.
    let mut skill_names = self.skills.clone();
    if let Some(value) = inputs.get("skills") {
      skill_names.extend(value::string_list(value));
    }
    for name in &skill_names {
      let skill = services
        .skills
        .get(name)
        .map_err(|e| NodeError::runtime(format!("skill '{name}': {e}")))?;
      if !skill.system_prompt.is_empty() {
        if !system_prompt.is_empty() {
          system_prompt.push_str("\n\n");
        }
        system_prompt.push_str(&skill.system_prompt);
      }
      for tool in &skill.tools {
        handlers.insert(&tool.name, &tool.handler, tool.handler_type);
        specs.push(spec_of(tool));
      }
    }

    for tool in &self.tools {
      handlers.insert(&tool.name, &tool.handler, tool.handler_type);
      specs.push(spec_of(tool));
    }

    // Seed the conversation.
    let mut prompt = value::first_string(inputs, &["prompt", "text", "data"])
      .ok_or_else(|| NodeError::runtime("agent_call requires a prompt input"))?;
    if let Some(context) = inputs.get("context") {
      prompt.push_str("\n\nContext:\n");
      prompt.push_str(&value::to_display_string(context));
    }
    if let Some(memory) = inputs.get("memory") {
      prompt.push_str("\n\nMemory:\n");
      prompt.push_str(&value::to_display_string(memory));
    }

    let mut messages = Vec::new();
    if !system_prompt.is_empty() {
      messages.push(ChatMessage::system(system_prompt));
    }
    messages.push(ChatMessage::user(prompt));

    let model = self
      .model
      .clone()
      .unwrap_or_else(|| handle.default_model.clone());

    let mut iteration = 0u32;
    let mut last_content = String::new();

    loop {
      if cancel.is_cancelled() {
        return Err(NodeError::runtime("cancelled"));
      }

      let response = handle
        .chat
        .chat(&model, &messages, &specs)
        .await
        .map_err(|e| NodeError::runtime(format!("chat failed: {e}")))?;

      if response.tool_calls.is_empty() || response.finished {
        return Ok(result_data(response.content));
      }

      debug!(
        iteration,
        tool_calls = response.tool_calls.len(),
        "agent iteration requested tools"
      );

      last_content = response.content.clone();
      let calls = response.tool_calls.clone();
      messages.push(ChatMessage::assistant(response.content, response.tool_calls));

      for call in &calls {
        let result = dispatch_tool(call, &owners, clients, &handlers, registry, cancel).await;
        messages.push(ChatMessage::tool_result(call.id.clone(), result));
      }

      iteration += 1;
      if self.max_iterations > 0 && iteration >= self.max_iterations {
        warn!(max_iterations = self.max_iterations, "agent iteration budget exhausted");
        return Ok(result_data(last_content));
      }
    }
  }
}

fn spec_of(tool: &SkillTool) -> ToolSpec {
  ToolSpec {
    name: tool.name.clone(),
    description: tool.description.clone(),
    input_schema: tool.input_schema.clone(),
  }
}

fn result_data(content: String) -> NodeOutput {
  let mut data = DataMap::new();
  data.insert("response".to_string(), content.clone().into());
  data.insert("text".to_string(), content.into());
  NodeOutput::plain(data)
}
