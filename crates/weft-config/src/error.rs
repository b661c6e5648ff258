use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefinitionError {
  #[error("duplicate node id: {0}")]
  DuplicateNodeId(String),

  #[error("edge references unknown node: source={source_node}, target={target}")]
  UnknownEdgeEndpoint { source_node: String, target: String },
}
