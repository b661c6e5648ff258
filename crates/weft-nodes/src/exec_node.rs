//! The `exec` node: sandboxed shell execution.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, port,
};
use weft_sandbox::{ExecRequest, SandboxError, run_in_sandbox};

const DEFAULT_SANDBOX_ROOT: &str = "/tmp/weft-sandbox";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 600;

fn default_timeout() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

fn default_sandbox_root() -> String {
  DEFAULT_SANDBOX_ROOT.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExecNode {
  /// Shell command line, templated over the inputs.
  command: String,
  /// Working directory relative to the sandbox root, also templated.
  #[serde(default)]
  working_dir: String,
  /// Deadline in seconds; capped at 600.
  #[serde(default = "default_timeout")]
  timeout: u64,
  #[serde(default = "default_sandbox_root")]
  sandbox_root: String,
  /// Extra environment variables.
  #[serde(default)]
  env: BTreeMap<String, String>,
  #[serde(default)]
  pub input_count: Option<u32>,
}

impl ExecNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::EXEC, data)
  }

  fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout.min(MAX_TIMEOUT_SECS))
  }
}

#[async_trait]
impl WorkflowNode for ExecNode {
  fn type_name(&self) -> &'static str {
    node_type::EXEC
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.command.is_empty() {
      return Err(NodeError::config("exec requires a command"));
    }
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let variables = &registry.services().variables;
    let context = weft_template::flatten_context(&inputs);

    let command = weft_template::render(&self.command, &context, variables)
      .map_err(|e| NodeError::runtime(format!("command template: {e}")))?;
    let working_dir = weft_template::render(&self.working_dir, &context, variables)
      .map_err(|e| NodeError::runtime(format!("working_dir template: {e}")))?;

    let mut env: Vec<(String, String)> = self
      .env
      .iter()
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect();
    if let Some(Value::Object(extra)) = inputs.get("env") {
      for (key, value) in extra {
        let value = match value {
          Value::String(s) => s.clone(),
          other => other.to_string(),
        };
        env.push((key.clone(), value));
      }
    }

    let request = ExecRequest {
      command,
      working_dir,
      sandbox_root: PathBuf::from(&self.sandbox_root),
      timeout: self.timeout(),
      env,
    };

    let result = match run_in_sandbox(request, cancel).await {
      Ok(result) => result,
      Err(e @ SandboxError::Escape { .. }) => return Err(NodeError::config(e.to_string())),
      Err(e) => return Err(NodeError::runtime(e.to_string())),
    };

    let branch = if result.exit_code == 0 { port::TRUE } else { port::FALSE };

    let mut data = inputs;
    data.insert("stdout".to_string(), result.stdout.clone().into());
    data.insert("stderr".to_string(), result.stderr.into());
    data.insert("exit_code".to_string(), result.exit_code.into());
    data.insert("result".to_string(), result.stdout.into());

    Ok(NodeOutput::selection(data, [port::ALWAYS, branch]))
  }
}
