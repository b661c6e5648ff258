//! Engine error types.

use thiserror::Error;
use weft_runtime::NodeError;

/// The user-visible error category of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Static misconfiguration found at parse or validate. Not retried.
  Config,
  /// A node's `run` failed.
  Runtime,
  /// The run context was cancelled.
  Cancelled,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("configuration error: {message}")]
  Config { message: String },

  #[error("node '{node_id}' ({node_type}) failed: {source}")]
  Node {
    node_id: String,
    node_type: String,
    #[source]
    source: NodeError,
  },

  #[error("execution cancelled")]
  Cancelled,
}

impl EngineError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config {
      message: message.into(),
    }
  }

  pub fn node(node_id: &str, node_type: &str, source: NodeError) -> Self {
    Self::Node {
      node_id: node_id.to_string(),
      node_type: node_type.to_string(),
      source,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Config { .. } => ErrorKind::Config,
      Self::Node { source, .. } => {
        if source.is_config() {
          ErrorKind::Config
        } else {
          ErrorKind::Runtime
        }
      }
      Self::Cancelled => ErrorKind::Cancelled,
    }
  }
}
