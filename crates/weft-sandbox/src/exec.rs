//! The strict sandbox behind the `exec` node.
//!
//! The working directory is confined below the sandbox root by lexical
//! normalization before anything touches the filesystem, so `../escape`
//! never creates or enters a directory outside the root. The child process
//! gets a fresh minimal environment; nothing is inherited.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::SandboxError;

const SH_PATH: &str = "/bin/sh";
const MINIMAL_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// A fully rendered exec invocation.
pub struct ExecRequest {
  /// Shell command line, already template-rendered.
  pub command: String,
  /// Working directory relative to the sandbox root ("" for the root).
  pub working_dir: String,
  pub sandbox_root: PathBuf,
  pub timeout: Duration,
  /// Extra environment variables layered over the minimal set.
  pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ExecResult {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
}

/// Run a command under `/bin/sh -c` inside the sandbox.
pub async fn run_in_sandbox(
  request: ExecRequest,
  cancel: &CancellationToken,
) -> Result<ExecResult, SandboxError> {
  let work_dir = resolve_under_root(&request.sandbox_root, &request.working_dir)?;

  tokio::fs::create_dir_all(&work_dir).await?;

  debug!(
    command = %request.command,
    work_dir = %work_dir.display(),
    timeout_secs = request.timeout.as_secs(),
    "exec sandbox command starting"
  );

  let root = request.sandbox_root.as_os_str();
  let mut command = Command::new(SH_PATH);
  command
    .arg("-c")
    .arg(&request.command)
    .current_dir(&work_dir)
    .env_clear()
    .env("HOME", root)
    .env("PATH", MINIMAL_PATH)
    .env("TMPDIR", root)
    .env("SANDBOX_ROOT", root)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  for (key, value) in &request.env {
    command.env(key, value);
  }

  let child = command.spawn()?;

  let output = tokio::select! {
    result = tokio::time::timeout(request.timeout, child.wait_with_output()) => match result {
      Ok(output) => output?,
      Err(_) => {
        return Err(SandboxError::Timeout {
          seconds: request.timeout.as_secs(),
          stderr: String::new(),
        });
      }
    },
    _ = cancel.cancelled() => return Err(SandboxError::Cancelled),
  };

  Ok(ExecResult {
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    exit_code: output.status.code().unwrap_or(-1),
  })
}

/// Join `relative` under `root`, rejecting any path that would escape.
///
/// Purely lexical: `..` components pop, and popping past the root is an
/// escape. Absolute paths are treated as relative to the root.
pub fn resolve_under_root(root: &Path, relative: &str) -> Result<PathBuf, SandboxError> {
  let mut resolved = root.to_path_buf();
  let mut depth: usize = 0;

  for component in Path::new(relative).components() {
    match component {
      Component::Normal(part) => {
        resolved.push(part);
        depth += 1;
      }
      Component::ParentDir => {
        if depth == 0 {
          return Err(SandboxError::Escape {
            path: relative.to_string(),
          });
        }
        resolved.pop();
        depth -= 1;
      }
      Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
    }
  }

  Ok(resolved)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(command: &str, root: &Path) -> ExecRequest {
    ExecRequest {
      command: command.to_string(),
      working_dir: String::new(),
      sandbox_root: root.to_path_buf(),
      timeout: Duration::from_secs(10),
      env: Vec::new(),
    }
  }

  #[test]
  fn test_resolve_plain_subdir() {
    let resolved = resolve_under_root(Path::new("/srv/box"), "jobs/a").unwrap();
    assert_eq!(resolved, PathBuf::from("/srv/box/jobs/a"));
  }

  #[test]
  fn test_resolve_rejects_escape() {
    let err = resolve_under_root(Path::new("/srv/box"), "../escape").unwrap_err();
    assert!(matches!(err, SandboxError::Escape { .. }));
  }

  #[test]
  fn test_resolve_rejects_nested_escape() {
    let err = resolve_under_root(Path::new("/srv/box"), "a/../../escape").unwrap_err();
    assert!(matches!(err, SandboxError::Escape { .. }));
  }

  #[test]
  fn test_resolve_absolute_is_rerooted() {
    let resolved = resolve_under_root(Path::new("/srv/box"), "/etc").unwrap();
    assert_eq!(resolved, PathBuf::from("/srv/box/etc"));
  }

  #[tokio::test]
  async fn test_echo_captures_stdout_and_exit() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_in_sandbox(request("echo hi", dir.path()), &CancellationToken::new())
      .await
      .unwrap();
    assert_eq!(result.stdout, "hi\n");
    assert_eq!(result.exit_code, 0);
  }

  #[tokio::test]
  async fn test_nonzero_exit_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_in_sandbox(
      request("echo oops >&2; exit 3", dir.path()),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr, "oops\n");
  }

  #[tokio::test]
  async fn test_minimal_environment() {
    let dir = tempfile::tempdir().unwrap();
    // HOME and TMPDIR are remapped to the sandbox root; PATH is the fixed
    // minimal list, not whatever the test process inherited.
    let result = run_in_sandbox(
      request("echo \"$HOME:$TMPDIR:$SANDBOX_ROOT\"", dir.path()),
      &CancellationToken::new(),
    )
    .await
    .unwrap();
    let root = dir.path().display();
    assert_eq!(result.stdout.trim(), format!("{root}:{root}:{root}"));
  }

  #[tokio::test]
  async fn test_extra_env_layered_over_minimal() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request("echo \"$EXTRA\"", dir.path());
    req.env = vec![("EXTRA".to_string(), "value".to_string())];
    let result = run_in_sandbox(req, &CancellationToken::new()).await.unwrap();
    assert_eq!(result.stdout.trim(), "value");
  }

  #[tokio::test]
  async fn test_timeout_kills_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request("sleep 5", dir.path());
    req.timeout = Duration::from_millis(200);
    let err = run_in_sandbox(req, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, SandboxError::Timeout { .. }));
  }

  #[tokio::test]
  async fn test_working_dir_created_under_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request("pwd", dir.path());
    req.working_dir = "jobs/run1".to_string();
    let result = run_in_sandbox(req, &CancellationToken::new()).await.unwrap();
    assert!(result.stdout.trim().ends_with("jobs/run1"));
  }
}
