//! Chat message and tool types shared by the LLM-facing nodes.
//!
//! The actual provider transports (OpenAI, Anthropic, local runtimes, ...)
//! live in the host; the core only speaks these shapes through the
//! [`ChatProvider`](crate::ChatProvider) trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::output::DataMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
  Tool,
}

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: Role,
  pub content: String,
  /// Tool invocations requested by an assistant message.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub tool_calls: Vec<ToolCall>,
  /// For `Role::Tool` messages: the call this result answers.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_call_id: Option<String>,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self::plain(Role::System, content)
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self::plain(Role::User, content)
  }

  pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
    Self {
      role: Role::Assistant,
      content: content.into(),
      tool_calls,
      tool_call_id: None,
    }
  }

  pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
    Self {
      role: Role::Tool,
      content: content.into(),
      tool_calls: Vec::new(),
      tool_call_id: Some(call_id.into()),
    }
  }

  fn plain(role: Role, content: impl Into<String>) -> Self {
    Self {
      role,
      content: content.into(),
      tool_calls: Vec::new(),
      tool_call_id: None,
    }
  }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub arguments: DataMap,
}

/// A tool schema advertised to the model. Handlers are never part of this
/// shape; they stay on the core side of the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub input_schema: Value,
}

/// One provider response turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
  pub content: String,
  #[serde(default)]
  pub tool_calls: Vec<ToolCall>,
  /// Whether the provider considers the exchange finished.
  #[serde(default)]
  pub finished: bool,
}
