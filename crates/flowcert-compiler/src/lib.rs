//! Compiles conversational-flow designs into channel-specific runtime plans
//! and certifies them.
//!
//! This crate implements the compile path: kind registry and factories,
//! canonical component specs, template scanning, the adapter boundary,
//! topology rules, the cross-cutting validation pipeline, and the plan with
//! its content checksum.
//!
//! # Example
//! ```
//! use flowcert_compiler::{compile, default_registry, StaticAdapter};
//!
//! let design = flowcert_design::parse_design(r#"{
//!     "schema": "flowcert.design/v1",
//!     "bot": {"id": "support", "channels": ["whatsapp"]},
//!     "version": {"id": "v1", "status": "development"},
//!     "entries": [{"kind": "global_start", "target": "hello"}],
//!     "graph": {"nodes": [{"id": "hello", "kind": "message", "final": true,
//!                          "props": {"text": "Hi!"}}]}
//! }"#).unwrap();
//! let compilation = compile(&design, &default_registry(), &StaticAdapter::whatsapp()).unwrap();
//! assert!(compilation.is_valid());
//! assert_eq!(compilation.plan.routes.len(), 1);
//! ```

pub mod adapter;
pub mod compiler;
pub mod component;
pub mod graph;
pub mod options;
mod props;
pub mod runtime;
pub mod spec;
pub mod template;
pub mod topology;
pub mod validation;

pub use adapter::{Adapter, Capabilities, StaticAdapter};
pub use compiler::{compile, design_checksum, Compilation, Compiler, Constraints, Route, RuntimePlan};
pub use component::{
    default_registry, BehaviorTag, Component, Factory, FlowComponent, InteractiveElement, KindConfig,
    KindFactory, OutputPolicy, Registry, SpecContext,
};
pub use graph::FlowGraph;
pub use options::CompileOptions;
pub use runtime::RuntimeContext;
pub use spec::{Behavior, Button, ButtonKind, ComponentSpec, Persistence, PersistScope, Sanitize, TextValue};
pub use template::{ExprKind, TemplateExpr};
pub use topology::{builtin_rules, validate_topology, TopologyRule};
pub use validation::{DesignPass, Pipeline, SpecPass};
