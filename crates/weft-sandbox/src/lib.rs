//! Weft Sandbox
//!
//! Two flavors of subprocess execution:
//!
//! - [`exec`]: the strict sandbox behind the `exec` node. Commands run under
//!   `/bin/sh -c` in a working directory confined below a sandbox root, with
//!   a fresh minimal environment and a bounded deadline.
//! - [`shell`]: the looser helper behind `bash` skill-tool handlers. Commands
//!   run under `bash -c` with the parent environment inherited, tool
//!   arguments overlaid as `ARG_*` variables and run variables as `VAR_*`.

mod error;
pub mod exec;
pub mod shell;

pub use error::SandboxError;
pub use exec::{ExecRequest, ExecResult, run_in_sandbox};
pub use shell::{ShellTool, run_shell_tool};
