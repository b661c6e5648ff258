//! Node routing results.
//!
//! A node's `run` returns a [`NodeOutput`] that tells the engine how to
//! propagate data: broadcast to every outbound edge, fire only a subset of
//! named output ports, spawn one downstream branch per item, or stop the
//! current branch without error.

use std::collections::HashSet;

use serde_json::Value;

/// The value currency of the engine: a JSON object keyed by port or field
/// name.
pub type DataMap = serde_json::Map<String, Value>;

/// Well-known port names.
pub mod port {
  /// Default output port.
  pub const OUTPUT: &str = "output";
  /// Default input port.
  pub const INPUT: &str = "input";
  /// Fired by conditional-style nodes on a truthy result.
  pub const TRUE: &str = "true";
  /// Fired by conditional-style nodes on a falsy result.
  pub const FALSE: &str = "false";
  /// Fired unconditionally by script/exec/http/email nodes.
  pub const ALWAYS: &str = "always";
  /// Fired by http/email nodes on a successful outcome.
  pub const SUCCESS: &str = "success";
  /// Fired by http/email nodes on a failed outcome.
  pub const ERROR: &str = "error";
}

/// What a node produced, and how the engine should route it.
#[derive(Debug, Clone)]
pub enum NodeOutput {
  /// Data for each output port; every outbound edge may deliver.
  Plain { data: DataMap },
  /// Only the named output ports fire downstream this run.
  Selection { data: DataMap, ports: HashSet<String> },
  /// Spawn one downstream branch per item. An empty list stops the branch.
  FanOut { items: Vec<DataMap> },
  /// Gracefully terminate this branch; no result is stored.
  StopBranch,
}

impl NodeOutput {
  pub fn plain(data: DataMap) -> Self {
    Self::Plain { data }
  }

  /// A selection over the given ports.
  pub fn selection<I, S>(data: DataMap, ports: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::Selection {
      data,
      ports: ports.into_iter().map(Into::into).collect(),
    }
  }

  pub fn fan_out(items: Vec<DataMap>) -> Self {
    Self::FanOut { items }
  }

  /// The data map carried by this output, if any.
  pub fn data(&self) -> Option<&DataMap> {
    match self {
      Self::Plain { data } | Self::Selection { data, .. } => Some(data),
      Self::FanOut { .. } | Self::StopBranch => None,
    }
  }

  /// Whether the named output port delivers data downstream.
  pub fn activates(&self, port: &str) -> bool {
    match self {
      Self::Plain { .. } => true,
      Self::Selection { ports, .. } => ports.contains(port),
      Self::FanOut { .. } | Self::StopBranch => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn data(key: &str, value: Value) -> DataMap {
    let mut map = DataMap::new();
    map.insert(key.to_string(), value);
    map
  }

  #[test]
  fn test_plain_activates_every_port() {
    let out = NodeOutput::plain(data("x", json!(1)));
    assert!(out.activates("output"));
    assert!(out.activates("anything"));
  }

  #[test]
  fn test_selection_activates_only_named_ports() {
    let out = NodeOutput::selection(data("x", json!(1)), ["true", "always"]);
    assert!(out.activates("true"));
    assert!(out.activates("always"));
    assert!(!out.activates("false"));
  }

  #[test]
  fn test_fan_out_carries_no_port_data() {
    let out = NodeOutput::fan_out(vec![data("item", json!(1))]);
    assert!(out.data().is_none());
    assert!(!out.activates("output"));
  }
}
