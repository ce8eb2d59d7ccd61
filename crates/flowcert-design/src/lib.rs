//! Conversational-flow design document model and guard-expression language.
//!
//! A design is a graph of typed nodes and labeled edges plus entries, shared
//! property bags, and profile variables. Produces a typed model: [`Design`],
//! [`Node`], [`Edge`], [`Entry`], [`Profile`].
//!
//! # Example
//! ```
//! let json = r#"{
//!     "schema": "flowcert.design/v1",
//!     "bot": {"id": "support", "channels": ["whatsapp"]},
//!     "version": {"id": "v1", "status": "development"},
//!     "entries": [{"kind": "global_start", "target": "hello"}],
//!     "graph": {"nodes": [{"id": "hello", "kind": "message", "final": true,
//!                          "props": {"text": "Hi!"}}]}
//! }"#;
//! let design = flowcert_design::parse_design(json).unwrap();
//! assert_eq!(design.graph.nodes.len(), 1);
//! ```

pub mod guard;
pub mod model;

use std::path::Path;

pub use guard::{evaluate_guard, json_resolver, lookup_path, parse_guard, Clause, GuardExpr, Operator};
pub use model::*;

/// Decode a design document from JSON text.
pub fn parse_design(source: &str) -> flowcert_types::Result<Design> {
    let design: Design = serde_json::from_str(source)?;
    tracing::debug!(
        bot = %design.bot.id,
        version = %design.version.id,
        nodes = design.graph.nodes.len(),
        edges = design.graph.edges.len(),
        "Design decoded"
    );
    Ok(design)
}

/// Read and decode a design document from a JSON file at `path`.
pub fn load_design(path: &Path) -> flowcert_types::Result<Design> {
    let data = std::fs::read_to_string(path)?;
    parse_design(&data)
}
