//! Graph parsing: reachability pruning, port wiring, topological order.

use std::collections::{HashMap, HashSet, VecDeque};

use weft_config::{WorkflowDef, node_type};
use weft_runtime::{NodeFactories, WorkflowNode};

use crate::error::EngineError;

/// One wired edge between reachable nodes, with its port labels.
#[derive(Debug, Clone)]
pub struct Wire {
  pub source: String,
  pub source_port: String,
  pub target: String,
  pub target_port: String,
}

/// A workflow pruned to the reachable subgraph, with constructed nodes,
/// per-port connection tables, and a topological execution order.
pub struct ParsedGraph {
  nodes: HashMap<String, Box<dyn WorkflowNode>>,
  /// Wires into each node, in edge-list order (later wires overwrite
  /// earlier ones when they hit the same target port).
  inbound: HashMap<String, Vec<Wire>>,
  /// Wires out of each node, in edge-list order.
  outbound: HashMap<String, Vec<Wire>>,
  order: Vec<String>,
}

impl std::fmt::Debug for ParsedGraph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ParsedGraph")
      .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
      .field("inbound", &self.inbound)
      .field("outbound", &self.outbound)
      .field("order", &self.order)
      .finish()
  }
}

impl ParsedGraph {
  /// Parse the definition for the given entry nodes. With no entries, every
  /// trigger-typed node (`input`, `http_trigger`, `cron_trigger`) seeds
  /// reachability.
  pub fn parse(
    def: &WorkflowDef,
    entry_nodes: &[String],
    factories: &NodeFactories,
  ) -> Result<Self, EngineError> {
    def.check().map_err(|e| EngineError::config(e.to_string()))?;

    let reachable = reachable_nodes(def, entry_nodes);

    let mut nodes = HashMap::new();
    for node_def in &def.nodes {
      if !reachable.contains(node_def.id.as_str()) {
        continue;
      }
      let node = factories
        .build(&node_def.node_type, &node_def.data)
        .map_err(|e| EngineError::config(format!("node '{}': {e}", node_def.id)))?;
      nodes.insert(node_def.id.clone(), node);
    }

    let mut inbound: HashMap<String, Vec<Wire>> = HashMap::new();
    let mut outbound: HashMap<String, Vec<Wire>> = HashMap::new();
    for edge in &def.edges {
      if !reachable.contains(edge.source.as_str()) || !reachable.contains(edge.target.as_str()) {
        continue;
      }
      let wire = Wire {
        source: edge.source.clone(),
        source_port: edge.source_handle.clone(),
        target: edge.target.clone(),
        target_port: edge.target_handle.clone(),
      };
      outbound.entry(edge.source.clone()).or_default().push(wire.clone());
      inbound.entry(edge.target.clone()).or_default().push(wire);
    }

    let order = topo_order(def, &nodes, &outbound)?;

    Ok(Self {
      nodes,
      inbound,
      outbound,
      order,
    })
  }

  pub fn node(&self, id: &str) -> Option<&dyn WorkflowNode> {
    self.nodes.get(id).map(Box::as_ref)
  }

  pub fn node_type(&self, id: &str) -> &str {
    self.nodes.get(id).map(|n| n.type_name()).unwrap_or("unknown")
  }

  /// Node IDs in execution order.
  pub fn order(&self) -> &[String] {
    &self.order
  }

  pub fn inbound(&self, id: &str) -> &[Wire] {
    self.inbound.get(id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn outbound(&self, id: &str) -> &[Wire] {
    self.outbound.get(id).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Every node reachable by following wires forward from `from`,
  /// excluding `from` itself.
  pub fn downstream_closure(&self, from: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(id) = queue.pop_front() {
      for wire in self.outbound(&id) {
        if seen.insert(wire.target.clone()) {
          queue.push_back(wire.target.clone());
        }
      }
    }
    seen.remove(from);
    seen
  }

  /// Reachable nodes with no outbound wires, in execution order.
  pub fn terminal_nodes(&self) -> Vec<&str> {
    self
      .order
      .iter()
      .filter(|id| self.outbound(id).is_empty())
      .map(String::as_str)
      .collect()
  }
}

/// Compute the reachable node set: forward BFS from the entry nodes, then
/// one expansion pass that pulls in the source of any edge whose target is
/// already reachable (this is how upstream resource-config nodes feeding an
/// agent stay alive). Annotation-only nodes are always excluded.
pub fn reachable_nodes(def: &WorkflowDef, entry_nodes: &[String]) -> HashSet<String> {
  let ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();

  let seeds: Vec<String> = if entry_nodes.is_empty() {
    def.trigger_nodes().iter().map(|n| n.id.clone()).collect()
  } else {
    entry_nodes
      .iter()
      .filter(|id| ids.contains(id.as_str()))
      .cloned()
      .collect()
  };

  let mut reachable: HashSet<String> = HashSet::new();
  let mut queue: VecDeque<String> = VecDeque::new();
  for seed in seeds {
    if reachable.insert(seed.clone()) {
      queue.push_back(seed);
    }
  }

  while let Some(id) = queue.pop_front() {
    for edge in &def.edges {
      if edge.source == id && reachable.insert(edge.target.clone()) {
        queue.push_back(edge.target.clone());
      }
    }
  }

  // Inbound expansion: sources pointing at a reachable target join the set.
  let targets: Vec<String> = def
    .edges
    .iter()
    .filter(|e| reachable.contains(e.target.as_str()))
    .map(|e| e.source.clone())
    .collect();
  reachable.extend(targets);

  reachable.retain(|id| {
    def
      .node(id)
      .map(|n| !node_type::is_annotation(&n.node_type))
      .unwrap_or(false)
  });

  reachable
}

/// Kahn's algorithm over the reachable subgraph. Seeded and expanded in
/// definition order so execution order is deterministic.
fn topo_order(
  def: &WorkflowDef,
  nodes: &HashMap<String, Box<dyn WorkflowNode>>,
  outbound: &HashMap<String, Vec<Wire>>,
) -> Result<Vec<String>, EngineError> {
  let mut indegree: HashMap<&str, usize> = nodes.keys().map(|id| (id.as_str(), 0)).collect();
  for wires in outbound.values() {
    for wire in wires {
      if let Some(count) = indegree.get_mut(wire.target.as_str()) {
        *count += 1;
      }
    }
  }

  let mut queue: VecDeque<&str> = def
    .nodes
    .iter()
    .filter(|n| indegree.get(n.id.as_str()) == Some(&0))
    .map(|n| n.id.as_str())
    .collect();

  let mut order = Vec::with_capacity(nodes.len());
  while let Some(id) = queue.pop_front() {
    order.push(id.to_string());
    if let Some(wires) = outbound.get(id) {
      for wire in wires {
        if let Some(count) = indegree.get_mut(wire.target.as_str()) {
          *count -= 1;
          if *count == 0 {
            queue.push_back(wire.target.as_str());
          }
        }
      }
    }
  }

  if order.len() < nodes.len() {
    return Err(EngineError::config("graph contains a cycle"));
  }

  Ok(order)
}
