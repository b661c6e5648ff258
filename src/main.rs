use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use weft_config::WorkflowDef;
use weft_engine::Engine;
use weft_nodes::builtin_factories;
use weft_runtime::{DataMap, HostError, Services, VariableStore};

/// weft - a workflow automation engine
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow, reading the trigger payload from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// Entry node IDs; all trigger nodes when omitted
    #[arg(long = "entry")]
    entries: Vec<String>,
  },

  /// Parse and validate a workflow without executing it
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },
}

/// Variables sourced from `WEFT_VAR_<KEY>` process environment variables.
struct EnvVariables;

impl VariableStore for EnvVariables {
  fn get(&self, key: &str) -> Result<String, HostError> {
    std::env::var(format!("WEFT_VAR_{}", key.to_ascii_uppercase()))
      .map_err(|_| HostError::not_found(format!("variable '{key}'")))
  }

  fn list(&self) -> HashMap<String, String> {
    std::env::vars()
      .filter_map(|(key, value)| {
        key
          .strip_prefix("WEFT_VAR_")
          .map(|name| (name.to_ascii_lowercase(), value))
      })
      .collect()
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run {
      workflow_file,
      entries,
    } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(workflow_file, entries))
    }
    Commands::Validate { workflow_file } => validate_workflow(workflow_file),
  }
}

async fn run_workflow(workflow_file: PathBuf, entries: Vec<String>) -> Result<()> {
  let def = load_workflow(&workflow_file)?;
  eprintln!("Loaded workflow with {} nodes", def.nodes.len());

  let payload = read_payload_from_stdin()?;

  let services = Services {
    variables: Arc::new(EnvVariables),
    ..Services::default()
  };
  let engine = Engine::new(Arc::new(builtin_factories()), services);

  let cancel = CancellationToken::new();
  let outputs = engine
    .run(&def, payload, &entries, None, &cancel)
    .await
    .context("workflow execution failed")?;

  println!("{}", serde_json::to_string_pretty(&outputs)?);
  Ok(())
}

fn validate_workflow(workflow_file: PathBuf) -> Result<()> {
  let def = load_workflow(&workflow_file)?;

  // Same parse path as execution: structure checks, reachability pruning,
  // node construction, and cycle detection.
  let factories = builtin_factories();
  let parsed = weft_engine::ParsedGraph::parse(&def, &[], &factories)
    .context("workflow failed validation")?;

  eprintln!(
    "OK: {} nodes ({} reachable), {} edges",
    def.nodes.len(),
    parsed.order().len(),
    def.edges.len()
  );
  Ok(())
}

fn load_workflow(path: &PathBuf) -> Result<WorkflowDef> {
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read workflow file: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", path.display()))
}

fn read_payload_from_stdin() -> Result<DataMap> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(DataMap::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    return Ok(DataMap::new());
  }

  let value: serde_json::Value =
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")?;
  match value {
    serde_json::Value::Object(map) => Ok(map),
    _ => anyhow::bail!("payload must be a JSON object"),
  }
}
