//! Tool dispatch for the agent loop.
//!
//! A tool call is routed by name: MCP owner first, then the local handler
//! table (JS via the script sandbox, bash via the shell helper). Failures
//! become `Error: ...` result strings handed back to the model, never
//! engine-level errors.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_runtime::{HandlerKind, McpClient, Registry, ToolCall, value};
use weft_sandbox::{ShellTool, run_shell_tool};
use weft_script::Sandbox;

/// Local handlers keyed by tool name.
#[derive(Default)]
pub(crate) struct HandlerTable {
  handlers: HashMap<String, (String, HandlerKind)>,
}

impl HandlerTable {
  pub(crate) fn insert(&mut self, name: &str, handler: &str, kind: HandlerKind) {
    self
      .handlers
      .insert(name.to_string(), (handler.to_string(), kind));
  }

  fn get(&self, name: &str) -> Option<&(String, HandlerKind)> {
    self.handlers.get(name)
  }
}

/// MCP tool ownership: every client (in connection order) that advertises a
/// given tool name.
#[derive(Default)]
pub(crate) struct McpOwners {
  owners: HashMap<String, Vec<usize>>,
}

impl McpOwners {
  pub(crate) fn add(&mut self, name: &str, client_index: usize) {
    self.owners.entry(name.to_string()).or_default().push(client_index);
  }

  fn get(&self, name: &str) -> Option<&[usize]> {
    self.owners.get(name).map(Vec::as_slice)
  }
}

/// Execute one tool call and return the tool-result string.
pub(crate) async fn dispatch_tool(
  call: &ToolCall,
  owners: &McpOwners,
  clients: &[Box<dyn McpClient>],
  handlers: &HandlerTable,
  registry: &Registry,
  cancel: &CancellationToken,
) -> String {
  debug!(tool = %call.name, "dispatching tool call");

  // MCP: the first owning client that successfully returns wins.
  if let Some(indices) = owners.get(&call.name) {
    let mut last_error = String::new();
    for &index in indices {
      match clients[index].call_tool(&call.name, &call.arguments).await {
        Ok(result) => return result,
        Err(e) => last_error = e.to_string(),
      }
    }
    return format!("Error: {last_error}");
  }

  if let Some((handler, kind)) = handlers.get(&call.name) {
    return match kind {
      HandlerKind::Js => run_js_handler(handler, call, registry).await,
      HandlerKind::Bash => run_bash_handler(handler, call, registry, cancel).await,
    };
  }

  format!("Error: no handler for tool \"{}\"", call.name)
}

/// Run a JS handler body with the tool arguments bound as top-level
/// variables (plus an `args` object).
async fn run_js_handler(handler: &str, call: &ToolCall, registry: &Registry) -> String {
  let sandbox =
    Sandbox::new(registry.services().variables.clone()).with_bodies(registry.bodies_snapshot());
  let body = handler.to_string();
  let mut bindings = call.arguments.clone();
  bindings.insert(
    "args".to_string(),
    serde_json::Value::Object(call.arguments.clone()),
  );

  let result =
    tokio::task::spawn_blocking(move || sandbox.eval_function_body(&body, &bindings)).await;

  match result {
    Ok(Ok(value)) => value::to_display_string(&value),
    Ok(Err(e)) => format!("Error: {e}"),
    Err(e) => format!("Error: handler task failed: {e}"),
  }
}

async fn run_bash_handler(
  handler: &str,
  call: &ToolCall,
  registry: &Registry,
  cancel: &CancellationToken,
) -> String {
  let mut tool = ShellTool::new(handler);
  tool.arguments = call.arguments.clone();
  tool.variables = registry.services().variables.list();

  match run_shell_tool(tool, cancel).await {
    Ok(stdout) => stdout,
    Err(e) => format!("Error: {e}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::{DataMap, Services};

  fn call(name: &str, arguments: DataMap) -> ToolCall {
    ToolCall {
      id: "call-1".to_string(),
      name: name.to_string(),
      arguments,
    }
  }

  #[tokio::test]
  async fn test_unknown_tool_synthesizes_error_result() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let result = dispatch_tool(
      &call("ghost", DataMap::new()),
      &McpOwners::default(),
      &[],
      &HandlerTable::default(),
      &registry,
      &CancellationToken::new(),
    )
    .await;
    assert_eq!(result, "Error: no handler for tool \"ghost\"");
  }

  #[tokio::test]
  async fn test_js_handler_sees_arguments() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut handlers = HandlerTable::default();
    handlers.insert("add", "return String(a + b);", HandlerKind::Js);

    let mut arguments = DataMap::new();
    arguments.insert("a".to_string(), json!(2));
    arguments.insert("b".to_string(), json!(3));

    let result = dispatch_tool(
      &call("add", arguments),
      &McpOwners::default(),
      &[],
      &handlers,
      &registry,
      &CancellationToken::new(),
    )
    .await;
    assert_eq!(result, "5");
  }

  #[tokio::test]
  async fn test_js_handler_exception_becomes_error_string() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut handlers = HandlerTable::default();
    handlers.insert("boom", "throw new Error(\"nope\");", HandlerKind::Js);

    let result = dispatch_tool(
      &call("boom", DataMap::new()),
      &McpOwners::default(),
      &[],
      &handlers,
      &registry,
      &CancellationToken::new(),
    )
    .await;
    assert!(result.starts_with("Error: "));
    assert!(result.contains("nope"));
  }

  #[tokio::test]
  async fn test_bash_handler_gets_arg_env() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let mut handlers = HandlerTable::default();
    handlers.insert("greet", "echo \"hi $ARG_WHO\"", HandlerKind::Bash);

    let mut arguments = DataMap::new();
    arguments.insert("who".to_string(), json!("weft"));

    let result = dispatch_tool(
      &call("greet", arguments),
      &McpOwners::default(),
      &[],
      &handlers,
      &registry,
      &CancellationToken::new(),
    )
    .await;
    assert_eq!(result, "hi weft");
  }
}
