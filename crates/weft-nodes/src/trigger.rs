//! Entry-point nodes: `input`, `http_trigger`, `cron_trigger`.
//!
//! All three emit the run's trigger inputs on their `data` output port;
//! `cron_trigger` additionally folds its configured payload underneath them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, value,
};

fn on_data_port(payload: DataMap) -> NodeOutput {
  let mut data = DataMap::new();
  data.insert("data".to_string(), Value::Object(payload));
  NodeOutput::plain(data)
}

/// `input`: emits the original trigger inputs unchanged.
pub struct InputNode;

impl InputNode {
  pub fn from_data(_data: &DataMap) -> Result<Self, NodeError> {
    Ok(Self)
  }
}

#[async_trait]
impl WorkflowNode for InputNode {
  fn type_name(&self) -> &'static str {
    node_type::INPUT
  }

  async fn run(
    &self,
    registry: &Registry,
    _inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    Ok(on_data_port(registry.run_inputs().clone()))
  }
}

/// `http_trigger`: emits the HTTP request envelope the host placed in the
/// run inputs. The authoring fields are metadata for the API layer, not
/// runtime configuration.
#[derive(Debug, Deserialize)]
pub struct HttpTriggerNode {
  #[serde(default)]
  pub trigger_id: String,
  #[serde(default)]
  pub alias: String,
  #[serde(default)]
  pub public: bool,
}

impl HttpTriggerNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::HTTP_TRIGGER, data)
  }
}

#[async_trait]
impl WorkflowNode for HttpTriggerNode {
  fn type_name(&self) -> &'static str {
    node_type::HTTP_TRIGGER
  }

  async fn run(
    &self,
    registry: &Registry,
    _inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    Ok(on_data_port(registry.run_inputs().clone()))
  }
}

/// `cron_trigger`: emits its configured payload shallow-merged with the run
/// inputs (run inputs win). The scheduler puts `trigger_type`, `trigger_id`,
/// `triggered_at`, `schedule`, and `timezone` into the run inputs.
pub struct CronTriggerNode {
  pub trigger_id: String,
  payload: DataMap,
}

#[derive(Debug, Deserialize)]
struct CronTriggerConfig {
  #[serde(default)]
  trigger_id: String,
  /// A map, or a JSON-encoded string of one.
  #[serde(default)]
  payload: Option<Value>,
}

impl CronTriggerNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    let config: CronTriggerConfig = parse_node_config(node_type::CRON_TRIGGER, data)?;
    let payload = match config.payload {
      None | Some(Value::Null) => DataMap::new(),
      Some(Value::Object(map)) => map,
      Some(Value::String(text)) => match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
          return Err(NodeError::config("cron_trigger payload must be a JSON object"));
        }
        Err(e) => {
          return Err(NodeError::config(format!("cron_trigger payload is not valid JSON: {e}")));
        }
      },
      Some(_) => {
        return Err(NodeError::config("cron_trigger payload must be a JSON object"));
      }
    };
    Ok(Self {
      trigger_id: config.trigger_id,
      payload,
    })
  }
}

#[async_trait]
impl WorkflowNode for CronTriggerNode {
  fn type_name(&self) -> &'static str {
    node_type::CRON_TRIGGER
  }

  async fn run(
    &self,
    registry: &Registry,
    _inputs: DataMap,
    _cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let mut payload = self.payload.clone();
    value::merge(&mut payload, registry.run_inputs());
    Ok(on_data_port(payload))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  fn registry(inputs: &[(&str, Value)]) -> Registry {
    Registry::new(
      Services::default(),
      inputs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
    )
  }

  #[tokio::test]
  async fn test_input_emits_run_inputs_on_data_port() {
    let registry = registry(&[("name", json!("world"))]);
    let node = InputNode::from_data(&DataMap::new()).unwrap();
    let output = node
      .run(&registry, DataMap::new(), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(
      output.data().unwrap().get("data"),
      Some(&json!({"name": "world"}))
    );
  }

  #[tokio::test]
  async fn test_cron_trigger_run_inputs_win_over_payload() {
    let registry = registry(&[("trigger_type", json!("cron")), ("env", json!("prod"))]);
    let mut data = DataMap::new();
    data.insert("payload".to_string(), json!({"env": "staging", "extra": true}));
    let node = CronTriggerNode::from_data(&data).unwrap();

    let output = node
      .run(&registry, DataMap::new(), &CancellationToken::new())
      .await
      .unwrap();
    let out = output.data().unwrap().get("data").unwrap();
    assert_eq!(out.get("env"), Some(&json!("prod")));
    assert_eq!(out.get("extra"), Some(&json!(true)));
    assert_eq!(out.get("trigger_type"), Some(&json!("cron")));
  }

  #[test]
  fn test_cron_trigger_payload_as_json_string() {
    let mut data = DataMap::new();
    data.insert("payload".to_string(), json!("{\"a\": 1}"));
    let node = CronTriggerNode::from_data(&data).unwrap();
    assert_eq!(node.payload.get("a"), Some(&json!(1)));
  }

  #[test]
  fn test_cron_trigger_rejects_bad_payload() {
    let mut data = DataMap::new();
    data.insert("payload".to_string(), json!("not json"));
    assert!(CronTriggerNode::from_data(&data).is_err());

    let mut data = DataMap::new();
    data.insert("payload".to_string(), json!([1, 2]));
    assert!(CronTriggerNode::from_data(&data).is_err());
  }
}
