//! Skill types: reusable prompt fragments plus tool definitions with inline
//! handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A skill resolved through the host's skill lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
  pub name: String,
  /// Fragment appended to the agent's running system prompt.
  #[serde(default)]
  pub system_prompt: String,
  #[serde(default)]
  pub tools: Vec<SkillTool>,
}

/// A tool carried by a skill, with its inline handler body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTool {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub input_schema: Value,
  /// Handler source: a JavaScript body or a shell command line.
  pub handler: String,
  #[serde(default)]
  pub handler_type: HandlerKind,
}

/// How a skill/inline tool handler executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
  #[default]
  Js,
  Bash,
}
