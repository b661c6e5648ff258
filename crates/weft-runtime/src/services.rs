//! Host-provided service interfaces.
//!
//! The execution core never talks to persistence, credential storage, or
//! provider wire protocols directly. The host hands the engine a [`Services`]
//! value whose trait objects answer every external question: which provider
//! backs a key, what a skill contains, what a variable resolves to, which
//! workflow a `workflow_call` targets, and how to reach an MCP server.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use weft_config::WorkflowDef;

use crate::chat::{ChatMessage, ChatResponse, ToolSpec};
use crate::error::HostError;
use crate::output::DataMap;
use crate::skill::Skill;

/// A chat transport for one provider, with its default model.
#[derive(Clone)]
pub struct ProviderHandle {
  pub chat: Arc<dyn ChatProvider>,
  pub default_model: String,
}

/// A provider's chat endpoint. Tools are advertised schema-only.
#[async_trait]
pub trait ChatProvider: Send + Sync {
  async fn chat(
    &self,
    model: &str,
    messages: &[ChatMessage],
    tools: &[ToolSpec],
  ) -> Result<ChatResponse, HostError>;
}

pub trait ProviderLookup: Send + Sync {
  fn get(&self, key: &str) -> Result<ProviderHandle, HostError>;
}

pub trait SkillLookup: Send + Sync {
  /// Resolve a skill by name or id.
  fn get(&self, name_or_id: &str) -> Result<Skill, HostError>;
}

pub trait VariableStore: Send + Sync {
  fn get(&self, key: &str) -> Result<String, HostError>;
  fn list(&self) -> HashMap<String, String>;
}

/// A stored node configuration (e.g. SMTP parameters for the email node).
/// The `data` payload is an opaque JSON string decoded by the consumer.
#[derive(Debug, Clone)]
pub struct StoredNodeConfig {
  pub id: String,
  pub config_type: String,
  pub data: String,
}

pub trait NodeConfigLookup: Send + Sync {
  fn get(&self, id: &str) -> Result<StoredNodeConfig, HostError>;
}

/// A stored workflow with its draft graph and optional active version.
#[derive(Debug, Clone)]
pub struct StoredWorkflow {
  pub id: String,
  pub name: String,
  pub graph: WorkflowDef,
  pub active_version: Option<String>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
  async fn get(&self, id: &str) -> Result<StoredWorkflow, HostError>;
  async fn get_version(&self, id: &str, version: &str) -> Result<WorkflowDef, HostError>;
}

/// A tool advertised by an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
  pub name: String,
  pub description: String,
  pub input_schema: Value,
}

#[async_trait]
pub trait McpClient: Send + Sync {
  async fn list_tools(&self) -> Result<Vec<McpToolInfo>, HostError>;
  async fn call_tool(&self, name: &str, arguments: &DataMap) -> Result<String, HostError>;
  async fn close(&self);
}

#[async_trait]
pub trait McpConnector: Send + Sync {
  async fn connect(&self, url: &str) -> Result<Box<dyn McpClient>, HostError>;
}

/// The bundle of host lookups shared by every node in a run.
#[derive(Clone)]
pub struct Services {
  pub providers: Arc<dyn ProviderLookup>,
  pub skills: Arc<dyn SkillLookup>,
  pub variables: Arc<dyn VariableStore>,
  pub node_configs: Arc<dyn NodeConfigLookup>,
  pub workflows: Arc<dyn WorkflowStore>,
  pub mcp: Arc<dyn McpConnector>,
}

impl Default for Services {
  fn default() -> Self {
    let null = Arc::new(NullHost);
    Self {
      providers: null.clone(),
      skills: null.clone(),
      variables: null.clone(),
      node_configs: null.clone(),
      workflows: null.clone(),
      mcp: null,
    }
  }
}

/// A host that provides nothing: every lookup misses and the variable map is
/// empty. Lets pure-data workflows run without any wiring.
pub struct NullHost;

impl ProviderLookup for NullHost {
  fn get(&self, key: &str) -> Result<ProviderHandle, HostError> {
    Err(HostError::not_found(format!("provider '{key}'")))
  }
}

impl SkillLookup for NullHost {
  fn get(&self, name_or_id: &str) -> Result<Skill, HostError> {
    Err(HostError::not_found(format!("skill '{name_or_id}'")))
  }
}

impl VariableStore for NullHost {
  fn get(&self, key: &str) -> Result<String, HostError> {
    Err(HostError::not_found(format!("variable '{key}'")))
  }

  fn list(&self) -> HashMap<String, String> {
    HashMap::new()
  }
}

impl NodeConfigLookup for NullHost {
  fn get(&self, id: &str) -> Result<StoredNodeConfig, HostError> {
    Err(HostError::not_found(format!("node config '{id}'")))
  }
}

#[async_trait]
impl WorkflowStore for NullHost {
  async fn get(&self, id: &str) -> Result<StoredWorkflow, HostError> {
    Err(HostError::not_found(format!("workflow '{id}'")))
  }

  async fn get_version(&self, id: &str, version: &str) -> Result<WorkflowDef, HostError> {
    Err(HostError::not_found(format!("workflow '{id}' version '{version}'")))
  }
}

#[async_trait]
impl McpConnector for NullHost {
  async fn connect(&self, url: &str) -> Result<Box<dyn McpClient>, HostError> {
    Err(HostError::other(format!("no MCP connector configured (url: {url})")))
  }
}
