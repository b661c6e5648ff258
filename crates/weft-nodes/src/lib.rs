//! Weft Nodes
//!
//! The built-in node implementations. Each node deserializes its
//! configuration from the definition's `data` map and implements the
//! [`WorkflowNode`](weft_runtime::WorkflowNode) contract.
//!
//! [`builtin_factories`] returns the factory table covering the full
//! executable catalog. The annotation-only types (`group`, `sticky_note`)
//! have no factory on purpose: reachability pruning keeps them away from
//! execution.

mod agent;
mod conditional;
mod config_nodes;
mod email;
mod exec_node;
mod http;
mod llm;
mod log_node;
mod loop_node;
mod output;
mod script_node;
mod template_node;
mod trigger;
mod workflow_call;

pub use agent::AgentCallNode;
pub use conditional::ConditionalNode;
pub use config_nodes::{McpConfigNode, MemoryConfigNode, SkillConfigNode};
pub use email::EmailNode;
pub use exec_node::ExecNode;
pub use http::HttpRequestNode;
pub use llm::LlmCallNode;
pub use log_node::LogNode;
pub use loop_node::LoopNode;
pub use output::OutputNode;
pub use script_node::ScriptNode;
pub use template_node::TemplateNode;
pub use trigger::{CronTriggerNode, HttpTriggerNode, InputNode};
pub use workflow_call::WorkflowCallNode;

use weft_config::node_type;
use weft_runtime::NodeFactories;

/// The factory table for every executable built-in node type.
pub fn builtin_factories() -> NodeFactories {
  let mut factories = NodeFactories::new();

  factories.register(node_type::INPUT, |data| {
    InputNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::HTTP_TRIGGER, |data| {
    HttpTriggerNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::CRON_TRIGGER, |data| {
    CronTriggerNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::OUTPUT, |data| {
    OutputNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::LLM_CALL, |data| {
    LlmCallNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::AGENT_CALL, |data| {
    AgentCallNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::TEMPLATE, |data| {
    TemplateNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::WORKFLOW_CALL, |data| {
    WorkflowCallNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::HTTP_REQUEST, |data| {
    HttpRequestNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::EMAIL, |data| {
    EmailNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::CONDITIONAL, |data| {
    ConditionalNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::LOOP, |data| {
    LoopNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::SCRIPT, |data| {
    ScriptNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::EXEC, |data| {
    ExecNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::LOG, |data| {
    LogNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::SKILL_CONFIG, |data| {
    SkillConfigNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::MCP_CONFIG, |data| {
    McpConfigNode::from_data(data).map(|n| Box::new(n) as _)
  });
  factories.register(node_type::MEMORY_CONFIG, |data| {
    MemoryConfigNode::from_data(data).map(|n| Box::new(n) as _)
  });

  factories
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_catalog_is_complete() {
    let factories = builtin_factories();
    for name in [
      node_type::INPUT,
      node_type::OUTPUT,
      node_type::LLM_CALL,
      node_type::AGENT_CALL,
      node_type::TEMPLATE,
      node_type::WORKFLOW_CALL,
      node_type::HTTP_TRIGGER,
      node_type::CRON_TRIGGER,
      node_type::HTTP_REQUEST,
      node_type::EMAIL,
      node_type::CONDITIONAL,
      node_type::LOOP,
      node_type::SCRIPT,
      node_type::EXEC,
      node_type::LOG,
      node_type::SKILL_CONFIG,
      node_type::MCP_CONFIG,
      node_type::MEMORY_CONFIG,
    ] {
      assert!(factories.contains(name), "missing factory for {name}");
    }
  }

  #[test]
  fn test_annotation_types_have_no_factory() {
    let factories = builtin_factories();
    assert!(!factories.contains(node_type::GROUP));
    assert!(!factories.contains(node_type::STICKY_NOTE));
  }
}
