use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
  /// The working directory resolves outside the sandbox root. Static
  /// misconfiguration: callers surface this as a configuration error.
  #[error("sandbox escape: working directory '{path}' resolves outside the sandbox root")]
  Escape { path: String },

  #[error("command timed out after {seconds}s: {stderr}")]
  Timeout { seconds: u64, stderr: String },

  #[error("command failed with exit code {code}: {stderr}")]
  NonZeroExit { code: i32, stderr: String },

  #[error("command cancelled")]
  Cancelled,

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}
