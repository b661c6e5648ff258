//! Per-run shared state.
//!
//! One [`Registry`] is created at the start of `Engine::run` and dropped when
//! the run returns. Nodes never touch its internal maps: accessors copy out
//! under the lock, and writers merge under the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use weft_config::WorkflowDef;

use crate::body::{Body, body_ref};
use crate::error::NodeError;
use crate::output::DataMap;
use crate::services::Services;
use crate::value;

/// Maximum nested `workflow_call` depth before a run is rejected.
pub const MAX_SUBFLOW_DEPTH: u32 = 16;

/// Runs a child workflow on behalf of a `workflow_call` node. Implemented by
/// the engine; stored in the registry so the nodes crate does not depend on
/// the engine crate.
#[async_trait]
pub trait SubflowRunner: Send + Sync {
  async fn run_subflow(
    &self,
    graph: &WorkflowDef,
    inputs: DataMap,
    entry_nodes: &[String],
    workflow_id: Option<&str>,
    depth: u32,
    cancel: &CancellationToken,
  ) -> Result<DataMap, NodeError>;
}

/// Per-run shared state: host lookups, trigger inputs, and thread-safe
/// output/error aggregation.
pub struct Registry {
  services: Services,
  run_inputs: DataMap,
  workflow_id: Option<String>,
  depth: u32,
  outputs: Mutex<DataMap>,
  output_written: AtomicBool,
  errors: Mutex<Vec<String>>,
  bodies: Mutex<HashMap<String, Body>>,
  subflow: OnceLock<Arc<dyn SubflowRunner>>,
}

impl Registry {
  pub fn new(services: Services, run_inputs: DataMap) -> Self {
    Self {
      services,
      run_inputs,
      workflow_id: None,
      depth: 0,
      outputs: Mutex::new(DataMap::new()),
      output_written: AtomicBool::new(false),
      errors: Mutex::new(Vec::new()),
      bodies: Mutex::new(HashMap::new()),
      subflow: OnceLock::new(),
    }
  }

  /// Attach the id of the workflow this run executes (used by
  /// `workflow_call` self-reference checks).
  pub fn with_workflow_id(mut self, workflow_id: Option<String>) -> Self {
    self.workflow_id = workflow_id;
    self
  }

  /// Set the subflow nesting depth of this run.
  pub fn with_depth(mut self, depth: u32) -> Self {
    self.depth = depth;
    self
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  /// The original trigger inputs, merged verbatim by input/trigger nodes.
  pub fn run_inputs(&self) -> &DataMap {
    &self.run_inputs
  }

  pub fn workflow_id(&self) -> Option<&str> {
    self.workflow_id.as_deref()
  }

  pub fn depth(&self) -> u32 {
    self.depth
  }

  /// Merge data into the run outputs (last writer wins) and mark that an
  /// `output` node fired.
  pub fn merge_outputs(&self, data: &DataMap) {
    let mut outputs = self.outputs.lock().expect("outputs lock poisoned");
    value::merge(&mut outputs, data);
    self.output_written.store(true, Ordering::Release);
  }

  /// Whether any `output` node wrote during this run.
  pub fn outputs_written(&self) -> bool {
    self.output_written.load(Ordering::Acquire)
  }

  /// An independent copy of the accumulated outputs.
  pub fn outputs_snapshot(&self) -> DataMap {
    self.outputs.lock().expect("outputs lock poisoned").clone()
  }

  /// Record a non-fatal error.
  pub fn record_error(&self, message: impl Into<String>) {
    self
      .errors
      .lock()
      .expect("errors lock poisoned")
      .push(message.into());
  }

  pub fn errors_snapshot(&self) -> Vec<String> {
    self.errors.lock().expect("errors lock poisoned").clone()
  }

  /// Register a byte stream and return the `{"$body": id}` reference value
  /// to place in a data map.
  pub fn register_body(&self, body: Body) -> Value {
    let id = uuid::Uuid::new_v4().to_string();
    self
      .bodies
      .lock()
      .expect("bodies lock poisoned")
      .insert(id.clone(), body);
    body_ref(&id)
  }

  /// Look up a registered body by id.
  pub fn body(&self, id: &str) -> Option<Body> {
    self.bodies.lock().expect("bodies lock poisoned").get(id).cloned()
  }

  /// Handles for all registered bodies (cheap clones).
  pub fn bodies_snapshot(&self) -> HashMap<String, Body> {
    self.bodies.lock().expect("bodies lock poisoned").clone()
  }

  /// Install the subflow runner. Later calls are ignored.
  pub fn set_subflow_runner(&self, runner: Arc<dyn SubflowRunner>) {
    let _ = self.subflow.set(runner);
  }

  pub fn subflow_runner(&self) -> Option<Arc<dyn SubflowRunner>> {
    self.subflow.get().cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_outputs_snapshot_is_independent() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut data = DataMap::new();
    data.insert("nested".to_string(), json!({"a": 1}));
    registry.merge_outputs(&data);

    let mut snapshot = registry.outputs_snapshot();
    snapshot.insert("nested".to_string(), json!({"a": 2}));

    assert_eq!(registry.outputs_snapshot().get("nested"), Some(&json!({"a": 1})));
  }

  #[test]
  fn test_output_written_flag() {
    let registry = Registry::new(Services::default(), DataMap::new());
    assert!(!registry.outputs_written());
    registry.merge_outputs(&DataMap::new());
    assert!(registry.outputs_written());
  }

  #[test]
  fn test_last_writer_wins() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut first = DataMap::new();
    first.insert("k".to_string(), json!("one"));
    let mut second = DataMap::new();
    second.insert("k".to_string(), json!("two"));

    registry.merge_outputs(&first);
    registry.merge_outputs(&second);

    assert_eq!(registry.outputs_snapshot().get("k"), Some(&json!("two")));
  }

  #[test]
  fn test_register_and_resolve_body() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let reference = registry.register_body(Body::from_bytes(b"payload".to_vec()));
    let id = crate::body::as_body_ref(&reference).unwrap();
    let body = registry.body(id).unwrap();
    assert_eq!(&**body.bytes().unwrap(), b"payload");
  }
}
