//! The execution engine.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use weft_config::{WorkflowDef, node_type};
use weft_runtime::{
  DataMap, NodeError, NodeFactories, NodeOutput, Registry, Services, SubflowRunner, value,
};

use crate::error::{EngineError, ErrorKind};
use crate::graph::ParsedGraph;

/// Early-output channel: receives the registry outputs when the first
/// `output` node runs, or the final outputs when the run completes without
/// one. Exactly one value per run, success or failure.
pub type EarlyOutput = oneshot::Sender<DataMap>;

/// A stored node result: its data map plus the active ports of a selection.
#[derive(Debug, Clone)]
struct Stored {
  data: DataMap,
  selection: Option<HashSet<String>>,
}

type Store = HashMap<String, Stored>;

/// Fires the early-output channel at most once; the `oneshot` sender is
/// consumed on first use.
#[derive(Clone)]
struct EarlySignal {
  sender: Arc<Mutex<Option<EarlyOutput>>>,
}

impl EarlySignal {
  fn new(sender: Option<EarlyOutput>) -> Self {
    Self {
      sender: Arc::new(Mutex::new(sender)),
    }
  }

  fn fire(&self, outputs: DataMap) {
    if let Some(sender) = self.sender.lock().expect("early output lock poisoned").take() {
      let _ = sender.send(outputs);
    }
  }
}

/// The workflow execution engine.
///
/// Cheap to clone: it holds the factory table and the host services, both
/// behind `Arc`s. All per-run state lives in the run itself.
#[derive(Clone)]
pub struct Engine {
  factories: Arc<NodeFactories>,
  services: Services,
}

impl Engine {
  pub fn new(factories: Arc<NodeFactories>, services: Services) -> Self {
    Self { factories, services }
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  /// Execute a workflow definition.
  ///
  /// With an empty `entry_nodes`, every trigger-typed node seeds
  /// reachability; otherwise only the named nodes do (typically the one
  /// trigger that fired).
  pub async fn run(
    &self,
    def: &WorkflowDef,
    inputs: DataMap,
    entry_nodes: &[String],
    early_output: Option<EarlyOutput>,
    cancel: &CancellationToken,
  ) -> Result<DataMap, EngineError> {
    self
      .run_scoped(def, inputs, entry_nodes, early_output, cancel, None, 0)
      .await
  }

  #[allow(clippy::too_many_arguments)]
  async fn run_scoped(
    &self,
    def: &WorkflowDef,
    inputs: DataMap,
    entry_nodes: &[String],
    early_output: Option<EarlyOutput>,
    cancel: &CancellationToken,
    workflow_id: Option<String>,
    depth: u32,
  ) -> Result<DataMap, EngineError> {
    let run_id = uuid::Uuid::new_v4().to_string();
    info!(
      run_id = %run_id,
      workflow_id = workflow_id.as_deref().unwrap_or(""),
      depth,
      "workflow_started"
    );

    let registry = Arc::new(
      Registry::new(self.services.clone(), inputs)
        .with_workflow_id(workflow_id)
        .with_depth(depth),
    );
    registry.set_subflow_runner(Arc::new(self.clone()));

    let signal = EarlySignal::new(early_output);
    let result = self.execute(def, entry_nodes, &registry, &signal, cancel).await;

    match &result {
      Ok(outputs) => {
        signal.fire(outputs.clone());
        info!(run_id = %run_id, outputs = outputs.len(), "workflow_completed");
      }
      Err(e) => {
        // Callers blocking on the early-output channel are never left
        // hanging: they get the outputs accumulated so far.
        signal.fire(registry.outputs_snapshot());
        error!(run_id = %run_id, error = %e, "workflow_failed");
      }
    }

    result
  }

  async fn execute(
    &self,
    def: &WorkflowDef,
    entry_nodes: &[String],
    registry: &Arc<Registry>,
    signal: &EarlySignal,
    cancel: &CancellationToken,
  ) -> Result<DataMap, EngineError> {
    let pg = Arc::new(ParsedGraph::parse(def, entry_nodes, &self.factories)?);

    for id in pg.order() {
      let node = pg.node(id).unwrap();
      node.validate(registry).await.map_err(|e| {
        EngineError::config(format!("node '{id}' ({}): {e}", pg.node_type(id)))
      })?;
    }

    let mut store: Store = HashMap::new();
    // Nodes downstream of a fan-out source run in the branches, not here.
    let mut claimed: HashSet<String> = HashSet::new();

    for id in pg.order() {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      if claimed.contains(id.as_str()) {
        continue;
      }

      let Some(inputs) = gather_inputs(&pg, id, &store, None) else {
        debug!(node_id = %id, "node skipped: no inbound data delivered");
        continue;
      };
      let node = pg.node(id).unwrap();
      debug!(node_id = %id, node_type = pg.node_type(id), "node_started");

      let output = node
        .run(registry, inputs, cancel)
        .await
        .map_err(|e| EngineError::node(id, pg.node_type(id), e))?;

      match output {
        NodeOutput::StopBranch => continue,
        NodeOutput::FanOut { items } => {
          let scope = pg.downstream_closure(id);
          claimed.extend(scope.iter().cloned());
          debug!(node_id = %id, items = items.len(), downstream = scope.len(), "fan_out");
          if items.is_empty() {
            continue;
          }

          let base = Arc::new(store.clone());
          let scope = Arc::new(scope);
          let mut handles = Vec::with_capacity(items.len());
          for item in items {
            handles.push(tokio::spawn(run_branch(
              pg.clone(),
              registry.clone(),
              base.clone(),
              id.clone(),
              item,
              scope.clone(),
              signal.clone(),
              cancel.clone(),
            )));
          }

          // Branches run to completion; the first error surfaces and the
          // rest are recorded as non-fatal run errors.
          let mut first_error = None;
          for joined in futures::future::join_all(handles).await {
            let branch_result = joined.map_err(|e| {
              EngineError::config(format!("branch task join error: {e}"))
            })?;
            if let Err(e) = branch_result {
              if first_error.is_none() {
                first_error = Some(e);
              } else {
                registry.record_error(e.to_string());
              }
            }
          }
          if let Some(e) = first_error {
            return Err(e);
          }
        }
        output => {
          store_result(&mut store, id, output);
          if pg.node_type(id) == node_type::OUTPUT {
            signal.fire(registry.outputs_snapshot());
          }
        }
      }
    }

    // An output node's writes win; otherwise terminal node data merges into
    // the result.
    let outputs = if registry.outputs_written() {
      registry.outputs_snapshot()
    } else {
      let mut merged = DataMap::new();
      for id in pg.terminal_nodes() {
        if let Some(stored) = store.get(id) {
          value::merge(&mut merged, &stored.data);
        }
      }
      merged
    };

    Ok(outputs)
  }
}

#[async_trait]
impl SubflowRunner for Engine {
  async fn run_subflow(
    &self,
    graph: &WorkflowDef,
    inputs: DataMap,
    entry_nodes: &[String],
    workflow_id: Option<&str>,
    depth: u32,
    cancel: &CancellationToken,
  ) -> Result<DataMap, NodeError> {
    self
      .run_scoped(
        graph,
        inputs,
        entry_nodes,
        None,
        cancel,
        workflow_id.map(str::to_string),
        depth,
      )
      .await
      .map_err(|e| match e.kind() {
        ErrorKind::Config => NodeError::config(e.to_string()),
        _ => NodeError::runtime(e.to_string()),
      })
  }
}

fn store_result(store: &mut Store, id: &str, output: NodeOutput) {
  match output {
    NodeOutput::Plain { data } => {
      store.insert(id.to_string(), Stored { data, selection: None });
    }
    NodeOutput::Selection { data, ports } => {
      store.insert(
        id.to_string(),
        Stored {
          data,
          selection: Some(ports),
        },
      );
    }
    NodeOutput::FanOut { .. } | NodeOutput::StopBranch => {}
  }
}

/// Gather a node's inputs from its inbound wires.
///
/// For each wire: a missing source result skips the wire; a selection whose
/// active set excludes the source port skips it; data keyed by the source
/// port is delivered under the target port; otherwise the whole source map
/// merges in. Later wires overwrite earlier ones.
///
/// Returns `None` when the node has inbound wires but none delivered — the
/// node sits on a branch that never fired and must not execute.
fn gather_inputs(
  pg: &ParsedGraph,
  target: &str,
  base: &Store,
  local: Option<&Store>,
) -> Option<DataMap> {
  let wires = pg.inbound(target);
  let mut gathered = DataMap::new();
  let mut delivered = 0usize;

  for wire in wires {
    let stored = local
      .and_then(|layer| layer.get(&wire.source))
      .or_else(|| base.get(&wire.source));
    let Some(stored) = stored else { continue };

    if let Some(ports) = &stored.selection {
      if !ports.contains(&wire.source_port) {
        continue;
      }
    }
    delivered += 1;

    if let Some(value) = stored.data.get(&wire.source_port) {
      gathered.insert(wire.target_port.clone(), value.clone());
    } else {
      for (key, value) in &stored.data {
        gathered.insert(key.clone(), value.clone());
      }
    }
  }

  if !wires.is_empty() && delivered == 0 {
    return None;
  }
  Some(gathered)
}

/// Execute the downstream slice of the graph for one fan-out item.
///
/// The branch reads upstream results from the shared `base` snapshot but
/// writes only to its own local map: branches never observe each other.
/// Boxed for recursion (a `loop` node inside a branch fans out again).
#[allow(clippy::too_many_arguments)]
fn run_branch(
  pg: Arc<ParsedGraph>,
  registry: Arc<Registry>,
  base: Arc<Store>,
  source: String,
  item: DataMap,
  scope: Arc<HashSet<String>>,
  signal: EarlySignal,
  cancel: CancellationToken,
) -> BoxFuture<'static, Result<(), EngineError>> {
  Box::pin(async move {
    let mut local: Store = HashMap::new();
    local.insert(
      source.clone(),
      Stored {
        data: item,
        selection: None,
      },
    );
    let mut claimed: HashSet<String> = HashSet::new();

    let order: Vec<String> = pg
      .order()
      .iter()
      .filter(|id| scope.contains(id.as_str()))
      .cloned()
      .collect();

    for id in order {
      if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
      }
      if claimed.contains(&id) {
        continue;
      }

      let Some(inputs) = gather_inputs(&pg, &id, &base, Some(&local)) else {
        continue;
      };
      let node = pg.node(&id).unwrap();

      let output = node
        .run(&registry, inputs, &cancel)
        .await
        .map_err(|e| EngineError::node(&id, pg.node_type(&id), e))?;

      match output {
        NodeOutput::StopBranch => continue,
        NodeOutput::FanOut { items } => {
          let nested_scope: HashSet<String> = pg
            .downstream_closure(&id)
            .intersection(&scope)
            .cloned()
            .collect();
          claimed.extend(nested_scope.iter().cloned());
          if items.is_empty() {
            continue;
          }

          // Nested branches see this branch's results as part of their base.
          let mut nested_base = (*base).clone();
          for (key, stored) in &local {
            nested_base.insert(key.clone(), stored.clone());
          }
          let nested_base = Arc::new(nested_base);
          let nested_scope = Arc::new(nested_scope);

          let mut handles = Vec::with_capacity(items.len());
          for nested_item in items {
            handles.push(tokio::spawn(run_branch(
              pg.clone(),
              registry.clone(),
              nested_base.clone(),
              id.clone(),
              nested_item,
              nested_scope.clone(),
              signal.clone(),
              cancel.clone(),
            )));
          }

          let mut first_error = None;
          for joined in futures::future::join_all(handles).await {
            let branch_result = joined.map_err(|e| {
              EngineError::config(format!("branch task join error: {e}"))
            })?;
            if let Err(e) = branch_result {
              if first_error.is_none() {
                first_error = Some(e);
              } else {
                registry.record_error(e.to_string());
              }
            }
          }
          if let Some(e) = first_error {
            return Err(e);
          }
        }
        output => {
          store_result(&mut local, &id, output);
          if pg.node_type(&id) == node_type::OUTPUT {
            signal.fire(registry.outputs_snapshot());
          }
        }
      }
    }

    Ok(())
  })
}
