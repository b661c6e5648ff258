//! The `bash -c` helper behind shell tool handlers.
//!
//! Unlike the exec sandbox, shell tools inherit the parent environment and
//! see their arguments as `ARG_<KEY>` variables plus every run variable as
//! `VAR_<KEY>` (keys uppercased, `.` and `-` normalized to `_`).

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_runtime::DataMap;

use crate::error::SandboxError;

const BASH_PATH: &str = "bash";

/// Default deadline for a shell tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// One shell tool invocation.
pub struct ShellTool {
  /// The handler body, run as `bash -c <body>`.
  pub body: String,
  /// Tool-call arguments, exported as `ARG_*`.
  pub arguments: DataMap,
  /// Run variables, exported as `VAR_*`.
  pub variables: HashMap<String, String>,
  pub timeout: Duration,
}

impl ShellTool {
  pub fn new(body: impl Into<String>) -> Self {
    Self {
      body: body.into(),
      arguments: DataMap::new(),
      variables: HashMap::new(),
      timeout: DEFAULT_TOOL_TIMEOUT,
    }
  }
}

/// Run a shell tool and return its trimmed stdout.
///
/// Non-zero exit or a blown deadline is an error whose message carries the
/// trimmed stderr.
pub async fn run_shell_tool(
  tool: ShellTool,
  cancel: &CancellationToken,
) -> Result<String, SandboxError> {
  debug!(timeout_secs = tool.timeout.as_secs(), "shell tool starting");

  let mut command = Command::new(BASH_PATH);
  command
    .arg("-c")
    .arg(&tool.body)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  for (key, value) in &tool.arguments {
    command.env(format!("ARG_{}", env_key(key)), env_value(value));
  }
  for (key, value) in &tool.variables {
    command.env(format!("VAR_{}", env_key(key)), value);
  }

  let child = command.spawn()?;

  let output = tokio::select! {
    result = tokio::time::timeout(tool.timeout, child.wait_with_output()) => match result {
      Ok(output) => output?,
      Err(_) => {
        return Err(SandboxError::Timeout {
          seconds: tool.timeout.as_secs(),
          stderr: String::new(),
        });
      }
    },
    _ = cancel.cancelled() => return Err(SandboxError::Cancelled),
  };

  let stdout = String::from_utf8_lossy(&output.stdout);
  let stderr = String::from_utf8_lossy(&output.stderr);

  if !output.status.success() {
    return Err(SandboxError::NonZeroExit {
      code: output.status.code().unwrap_or(-1),
      stderr: stderr.trim().to_string(),
    });
  }

  Ok(stdout.trim().to_string())
}

/// Normalize an argument/variable key into an environment variable suffix.
fn env_key(key: &str) -> String {
  key
    .chars()
    .map(|c| match c {
      '.' | '-' => '_',
      other => other.to_ascii_uppercase(),
    })
    .collect()
}

fn env_value(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_env_key_normalization() {
    assert_eq!(env_key("user.name"), "USER_NAME");
    assert_eq!(env_key("api-key"), "API_KEY");
    assert_eq!(env_key("plain"), "PLAIN");
  }

  #[tokio::test]
  async fn test_stdout_is_trimmed() {
    let result = run_shell_tool(ShellTool::new("echo '  padded  '"), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(result, "padded");
  }

  #[tokio::test]
  async fn test_arguments_exported() {
    let mut tool = ShellTool::new("echo \"$ARG_USER_NAME/$ARG_COUNT\"");
    tool.arguments.insert("user.name".to_string(), json!("ada"));
    tool.arguments.insert("count".to_string(), json!(3));
    let result = run_shell_tool(tool, &CancellationToken::new()).await.unwrap();
    assert_eq!(result, "ada/3");
  }

  #[tokio::test]
  async fn test_variables_exported() {
    let mut tool = ShellTool::new("echo \"$VAR_REGION\"");
    tool
      .variables
      .insert("region".to_string(), "eu-west-1".to_string());
    let result = run_shell_tool(tool, &CancellationToken::new()).await.unwrap();
    assert_eq!(result, "eu-west-1");
  }

  #[tokio::test]
  async fn test_nonzero_exit_carries_stderr() {
    let err = run_shell_tool(
      ShellTool::new("echo 'broken pipe' >&2; exit 2"),
      &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    match err {
      SandboxError::NonZeroExit { code, stderr } => {
        assert_eq!(code, 2);
        assert_eq!(stderr, "broken pipe");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn test_deadline() {
    let mut tool = ShellTool::new("sleep 5");
    tool.timeout = Duration::from_millis(200);
    let err = run_shell_tool(tool, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SandboxError::Timeout { .. }));
  }
}
