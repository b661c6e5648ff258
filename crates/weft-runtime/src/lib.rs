//! Weft Runtime
//!
//! The runtime abstraction every node implementation builds against:
//!
//! - [`WorkflowNode`]: the `validate`/`run` contract.
//! - [`NodeOutput`]: the routing result a node returns (plain data, port
//!   selection, fan-out items, or the stop-branch sentinel).
//! - [`Registry`]: per-run shared state threaded through every node — host
//!   lookups, the original trigger inputs, and thread-safe output/error
//!   aggregation.
//! - Host interface traits ([`ChatProvider`], [`SkillLookup`],
//!   [`VariableStore`], [`NodeConfigLookup`], [`WorkflowStore`],
//!   [`McpConnector`]): everything the core consumes from its host.
//! - [`NodeFactories`]: the type-tag → constructor table.
//! - [`Body`]: a lazy, memoizing handle over a one-shot byte stream (the
//!   HTTP request body), referenced from data maps as `{"$body": "<id>"}`.

mod body;
mod chat;
mod error;
mod node;
mod output;
mod registry;
mod services;
mod skill;
pub mod value;

pub use body::{Body, BODY_KEY, as_body_ref, body_ref};
pub use chat::{ChatMessage, ChatResponse, Role, ToolCall, ToolSpec};
pub use error::{HostError, NodeError};
pub use node::{NodeFactories, NodeFactory, WorkflowNode, parse_node_config};
pub use output::{DataMap, NodeOutput, port};
pub use registry::{MAX_SUBFLOW_DEPTH, Registry, SubflowRunner};
pub use services::{
  ChatProvider, McpClient, McpConnector, McpToolInfo, NodeConfigLookup, NullHost, ProviderHandle,
  ProviderLookup, Services, SkillLookup, StoredNodeConfig, StoredWorkflow, VariableStore,
  WorkflowStore,
};
pub use skill::{HandlerKind, Skill, SkillTool};
