//! Weft Engine
//!
//! Takes a workflow definition, prunes it to the subgraph reachable from the
//! entry nodes, validates every reachable node, orders them topologically,
//! and executes them in order. Three routing modes move data between nodes:
//! plain broadcast, port selection, and fan-out (one concurrent branch per
//! item). The first `output` node to run signals the optional early-output
//! channel; the channel always receives exactly one value per run.

mod engine;
mod error;
mod graph;

pub use engine::{Engine, EarlyOutput};
pub use error::{EngineError, ErrorKind};
pub use graph::{ParsedGraph, Wire, reachable_nodes};
