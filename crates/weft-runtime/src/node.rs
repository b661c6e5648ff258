//! The node contract and the factory table.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::NodeError;
use crate::output::{DataMap, NodeOutput};
use crate::registry::Registry;

/// The contract every executable node implements.
///
/// `validate` runs once per reachable node before execution starts and should
/// catch static misconfiguration. `run` receives the gathered inputs for this
/// invocation and returns a routing result; long-running work must observe
/// `cancel` cooperatively.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
  /// The node's type tag, as registered in the factory table.
  fn type_name(&self) -> &'static str;

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError>;
}

/// Constructs a node value from its definition `data` map.
pub type NodeFactory =
  Box<dyn Fn(&DataMap) -> Result<Box<dyn WorkflowNode>, NodeError> + Send + Sync>;

/// The type-tag → factory table, populated at startup.
#[derive(Default)]
pub struct NodeFactories {
  factories: HashMap<String, NodeFactory>,
}

impl NodeFactories {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a factory for a type tag. Later registrations replace earlier
  /// ones.
  pub fn register(
    &mut self,
    type_name: impl Into<String>,
    factory: impl Fn(&DataMap) -> Result<Box<dyn WorkflowNode>, NodeError> + Send + Sync + 'static,
  ) {
    self.factories.insert(type_name.into(), Box::new(factory));
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.factories.contains_key(type_name)
  }

  /// Registered type tags, sorted.
  pub fn type_names(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  /// Construct a node of the given type from its data map.
  pub fn build(&self, type_name: &str, data: &DataMap) -> Result<Box<dyn WorkflowNode>, NodeError> {
    let factory = self
      .factories
      .get(type_name)
      .ok_or_else(|| NodeError::config(format!("unknown node type '{type_name}'")))?;
    factory(data)
  }
}

/// Deserialize a node's configuration out of its definition `data` map.
pub fn parse_node_config<T: DeserializeOwned>(
  type_name: &str,
  data: &DataMap,
) -> Result<T, NodeError> {
  serde_json::from_value(Value::Object(data.clone()))
    .map_err(|e| NodeError::config(format!("invalid {type_name} configuration: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  struct EchoNode;

  #[async_trait]
  impl WorkflowNode for EchoNode {
    fn type_name(&self) -> &'static str {
      "echo"
    }

    async fn run(
      &self,
      _registry: &Registry,
      inputs: DataMap,
      _cancel: &CancellationToken,
    ) -> Result<NodeOutput, NodeError> {
      Ok(NodeOutput::plain(inputs))
    }
  }

  #[test]
  fn test_unknown_type_is_config_error() {
    let factories = NodeFactories::new();
    let err = match factories.build("nope", &DataMap::new()) {
      Err(e) => e,
      Ok(_) => panic!("expected build to fail"),
    };
    assert!(err.is_config());
    assert!(err.to_string().contains("nope"));
  }

  #[test]
  fn test_registered_factory_builds() {
    let mut factories = NodeFactories::new();
    factories.register("echo", |_| Ok(Box::new(EchoNode)));
    let node = factories.build("echo", &DataMap::new()).unwrap();
    assert_eq!(node.type_name(), "echo");
  }

  #[test]
  fn test_parse_node_config_reports_type() {
    #[derive(Debug, Deserialize)]
    struct Config {
      #[allow(dead_code)]
      required: String,
    }

    let err = parse_node_config::<Config>("llm_call", &DataMap::new()).unwrap_err();
    assert!(err.to_string().contains("llm_call"));
  }
}
