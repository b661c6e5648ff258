//! Runtime error types.

use thiserror::Error;

/// Error returned by a node's `validate` or `run`.
///
/// The variant is the user-visible category: `Config` for static
/// misconfiguration (fatal at parse/validate, not retried), `Runtime` for
/// failures while executing. The engine wraps `run` failures with the node
/// id and type before surfacing them.
#[derive(Debug, Error)]
pub enum NodeError {
  #[error("configuration error: {0}")]
  Config(String),

  #[error("{0}")]
  Runtime(String),
}

impl NodeError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config(message.into())
  }

  pub fn runtime(message: impl Into<String>) -> Self {
    Self::Runtime(message.into())
  }

  pub fn is_config(&self) -> bool {
    matches!(self, Self::Config(_))
  }
}

/// Error returned by host-provided lookups and transports.
#[derive(Debug, Error)]
pub enum HostError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("{0}")]
  Other(String),
}

impl HostError {
  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound(what.into())
  }

  pub fn other(message: impl Into<String>) -> Self {
    Self::Other(message.into())
  }
}
