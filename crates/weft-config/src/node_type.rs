//! The node type catalog.
//!
//! Type tags are stable wire names: they appear verbatim in authored workflow
//! JSON and in the factory table. `GROUP` and `STICKY_NOTE` are annotation-only
//! types with no factory entry; reachability pruning excludes them from
//! execution.

pub const INPUT: &str = "input";
pub const OUTPUT: &str = "output";
pub const LLM_CALL: &str = "llm_call";
pub const AGENT_CALL: &str = "agent_call";
pub const TEMPLATE: &str = "template";
pub const WORKFLOW_CALL: &str = "workflow_call";
pub const HTTP_TRIGGER: &str = "http_trigger";
pub const CRON_TRIGGER: &str = "cron_trigger";
pub const HTTP_REQUEST: &str = "http_request";
pub const EMAIL: &str = "email";
pub const CONDITIONAL: &str = "conditional";
pub const LOOP: &str = "loop";
pub const SCRIPT: &str = "script";
pub const EXEC: &str = "exec";
pub const LOG: &str = "log";
pub const SKILL_CONFIG: &str = "skill_config";
pub const MCP_CONFIG: &str = "mcp_config";
pub const MEMORY_CONFIG: &str = "memory_config";
pub const GROUP: &str = "group";
pub const STICKY_NOTE: &str = "sticky_note";

/// Types that seed reachability when no explicit entry nodes are given.
pub const TRIGGER_TYPES: &[&str] = &[INPUT, HTTP_TRIGGER, CRON_TRIGGER];

/// Annotation-only types: no factory, never executed.
pub const ANNOTATION_TYPES: &[&str] = &[GROUP, STICKY_NOTE];

/// Whether the given type tag is a trigger (an implicit entry point).
pub fn is_trigger(node_type: &str) -> bool {
  TRIGGER_TYPES.contains(&node_type)
}

/// Whether the given type tag is annotation-only.
pub fn is_annotation(node_type: &str) -> bool {
  ANNOTATION_TYPES.contains(&node_type)
}
