use serde::{Deserialize, Serialize};

/// Default source port when an edge does not name one.
pub(crate) const DEFAULT_SOURCE_HANDLE: &str = "output";
/// Default target port when an edge does not name one.
pub(crate) const DEFAULT_TARGET_HANDLE: &str = "input";

/// A directed, port-labeled connection between two nodes.
///
/// Port names referenced by an edge need not exist as declared handles on the
/// node: an unknown port simply never delivers data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub source: String,
  pub target: String,
  /// Output port on the source node.
  #[serde(default = "default_source_handle")]
  pub source_handle: String,
  /// Input port on the target node.
  #[serde(default = "default_target_handle")]
  pub target_handle: String,
}

impl Edge {
  /// Create an edge using the default `output` → `input` ports.
  pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_handle: DEFAULT_SOURCE_HANDLE.to_string(),
      target_handle: DEFAULT_TARGET_HANDLE.to_string(),
    }
  }

  /// Create an edge with explicit port handles.
  pub fn with_handles(
    source: impl Into<String>,
    source_handle: impl Into<String>,
    target: impl Into<String>,
    target_handle: impl Into<String>,
  ) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      source_handle: source_handle.into(),
      target_handle: target_handle.into(),
    }
  }
}

fn default_source_handle() -> String {
  DEFAULT_SOURCE_HANDLE.to_string()
}

fn default_target_handle() -> String {
  DEFAULT_TARGET_HANDLE.to_string()
}
