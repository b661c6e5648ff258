use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::error::DefinitionError;
use crate::node::NodeDef;
use crate::node_type;

/// A complete workflow definition: nodes plus port-labeled edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  #[serde(default)]
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
}

impl WorkflowDef {
  /// Get a node by ID.
  pub fn node(&self, id: &str) -> Option<&NodeDef> {
    self.nodes.iter().find(|n| n.id == id)
  }

  /// IDs of all nodes whose type is a trigger (`input`, `http_trigger`,
  /// `cron_trigger`). These seed reachability when the caller does not name
  /// explicit entry nodes.
  pub fn trigger_nodes(&self) -> Vec<&NodeDef> {
    self
      .nodes
      .iter()
      .filter(|n| node_type::is_trigger(&n.node_type))
      .collect()
  }

  /// Check structural invariants: unique node IDs and edges that reference
  /// existing nodes.
  pub fn check(&self) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for node in &self.nodes {
      if !seen.insert(node.id.as_str()) {
        return Err(DefinitionError::DuplicateNodeId(node.id.clone()));
      }
    }

    for edge in &self.edges {
      if !seen.contains(edge.source.as_str()) || !seen.contains(edge.target.as_str()) {
        return Err(DefinitionError::UnknownEdgeEndpoint {
          source_node: edge.source.clone(),
          target: edge.target.clone(),
        });
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::Map;

  fn node(id: &str, node_type: &str) -> NodeDef {
    NodeDef::new(id, node_type, Map::new())
  }

  #[test]
  fn test_check_accepts_valid_graph() {
    let def = WorkflowDef {
      nodes: vec![node("a", "input"), node("b", "output")],
      edges: vec![Edge::new("a", "b")],
    };
    assert!(def.check().is_ok());
  }

  #[test]
  fn test_check_rejects_duplicate_ids() {
    let def = WorkflowDef {
      nodes: vec![node("a", "input"), node("a", "output")],
      edges: vec![],
    };
    assert!(matches!(
      def.check(),
      Err(DefinitionError::DuplicateNodeId(id)) if id == "a"
    ));
  }

  #[test]
  fn test_check_rejects_dangling_edge() {
    let def = WorkflowDef {
      nodes: vec![node("a", "input")],
      edges: vec![Edge::new("a", "missing")],
    };
    assert!(def.check().is_err());
  }

  #[test]
  fn test_edge_defaults_from_json() {
    let edge: Edge = serde_json::from_str(r#"{"source": "a", "target": "b"}"#).unwrap();
    assert_eq!(edge.source_handle, "output");
    assert_eq!(edge.target_handle, "input");
  }

  #[test]
  fn test_trigger_nodes() {
    let def = WorkflowDef {
      nodes: vec![
        node("in", "input"),
        node("hook", "http_trigger"),
        node("note", "sticky_note"),
        node("out", "output"),
      ],
      edges: vec![],
    };
    let triggers: Vec<&str> = def.trigger_nodes().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(triggers, vec!["in", "hook"]);
  }
}
