//! Weft Script
//!
//! A single-threaded JavaScript interpreter instantiated per node invocation.
//! Used by the `conditional`, `loop`, and `script` nodes and by JS tool
//! handlers inside `agent_call`.
//!
//! Each evaluation gets a fresh QuickJS runtime with the helper set
//! pre-registered (`toString`, `jsonParse`, `btoa`, `atob`, `JSON_stringify`,
//! `getVar`, `httpGet`/`httpPost`/`httpPut`/`httpDelete`, `log.*`) and the
//! node's port values bound as top-level variables. Byte-stream inputs are
//! wrapped into lazy body objects. The interpreter exposes no filesystem,
//! socket, or process primitives beyond these helpers.
//!
//! Evaluation is blocking; async callers run it inside
//! `tokio::task::spawn_blocking`.

mod convert;
mod error;
mod http;
mod sandbox;

pub use convert::{js_to_json, json_to_js};
pub use error::ScriptError;
pub use sandbox::{Sandbox, is_truthy};
