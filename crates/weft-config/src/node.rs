use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single node in a workflow definition.
///
/// The `data` map is opaque at this layer: each node implementation
/// deserializes its own configuration out of it. Layout attributes
/// (`position`) are kept for round-tripping but ignored by execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  /// Globally unique node ID within the workflow.
  pub id: String,
  /// Type tag, drawn from the registered node catalog.
  #[serde(rename = "type")]
  pub node_type: String,
  /// Node configuration, interpreted by the node implementation.
  #[serde(default)]
  pub data: Map<String, Value>,
  /// Editor layout position. Not used by execution.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub position: Option<Position>,
}

impl NodeDef {
  /// Create a node with the given ID, type tag, and configuration data.
  pub fn new(id: impl Into<String>, node_type: impl Into<String>, data: Map<String, Value>) -> Self {
    Self {
      id: id.into(),
      node_type: node_type.into(),
      data,
      position: None,
    }
  }
}

/// Editor canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}
