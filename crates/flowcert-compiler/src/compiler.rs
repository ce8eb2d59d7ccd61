//! Compile orchestration: props → component → spec → adapter → route, then
//! topology, design passes and spec passes, then the plan.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use flowcert_design::Design;
use flowcert_types::{count_by_severity, has_errors, FlowError, Issue, Result, Severity};

use crate::adapter::Adapter;
use crate::component::{Registry, SpecContext};
use crate::graph::FlowGraph;
use crate::options::CompileOptions;
use crate::runtime::RuntimeContext;
use crate::spec::ComponentSpec;
use crate::topology::validate_topology;
use crate::validation::{DesignContext, Pipeline};

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// One compiled node: its id and the adapted spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub node: String,
    pub view: ComponentSpec,
}

/// Channel limits the plan was certified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub max_text_len: Option<usize>,
    pub max_buttons: Option<usize>,
}

/// The executable plan. Produced once per compile and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimePlan {
    pub schema: String,
    pub plan_id: Uuid,
    pub design_checksum: String,
    pub adapter: String,
    pub routes: Vec<Route>,
    pub constraints: Constraints,
    pub compiled_at: DateTime<Utc>,
}

impl RuntimePlan {
    pub fn route(&self, node: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.node == node)
    }
}

/// Result of a compile that did not hit a structural failure.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub plan: RuntimePlan,
    pub checksum: String,
    pub issues: Vec<Issue>,
}

impl Compilation {
    /// Valid means zero error-severity issues.
    pub fn is_valid(&self) -> bool {
        !has_errors(&self.issues)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.is_error())
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// SHA-256 (lower hex) over a canonical JSON rendering of the design.
///
/// Object keys are sorted, nodes are ordered by id and edges by
/// `(from, to, label, priority, guard)`, so reordering nodes or edges leaves
/// the checksum unchanged while any content change alters it.
pub fn design_checksum(design: &Design) -> Result<String> {
    let mut canonical = design.clone();
    canonical.graph.nodes.sort_by(|a, b| a.id.cmp(&b.id));
    canonical.graph.edges.sort_by(|a, b| {
        (&a.from, &a.to, &a.label, a.priority, &a.guard).cmp(&(&b.from, &b.to, &b.label, b.priority, &b.guard))
    });

    let value = serde_json::to_value(&canonical)?;
    let mut out = String::new();
    write_canonical(&value, &mut out)?;

    let mut hasher = Sha256::new();
    hasher.update(out.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out)?;
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&serde_json::to_string(scalar)?),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

pub struct Compiler<'a> {
    registry: &'a Registry,
    adapter: &'a dyn Adapter,
    options: CompileOptions,
    pipeline: Pipeline,
}

impl<'a> Compiler<'a> {
    /// A compiler with default options and the standard pass pipeline.
    pub fn new(registry: &'a Registry, adapter: &'a dyn Adapter) -> Self {
        Self {
            registry,
            adapter,
            options: CompileOptions::default(),
            pipeline: Pipeline::standard(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile and certify `design`.
    ///
    /// Fails only on structural impossibilities: an unregistered kind, a
    /// factory that rejects its props, a spec that cannot be produced, or an
    /// adapter failure. Validation findings never fail the call.
    pub fn compile(&self, design: &Design) -> Result<Compilation> {
        tracing::info!(
            bot = %design.bot.id,
            version = %design.version.id,
            adapter = self.adapter.name(),
            nodes = design.graph.nodes.len(),
            edges = design.graph.edges.len(),
            "Compiling design"
        );

        let runtime = RuntimeContext::from_profile(design.profile.as_ref());
        let mut canonical: Vec<ComponentSpec> = Vec::with_capacity(design.graph.nodes.len());
        let mut routes: Vec<Route> = Vec::with_capacity(design.graph.nodes.len());

        for node in &design.graph.nodes {
            let spec = self.build_spec(design, node, &runtime).inspect_err(|e| {
                tracing::warn!(node = %node.id, kind = %node.kind, error = %e, "Compile aborted");
            })?;
            let view = self.adapter.transform(spec.clone()).map_err(|e| match e {
                FlowError::Adapter { .. } => e,
                other => FlowError::Adapter {
                    adapter: self.adapter.name().to_string(),
                    node: node.id.clone(),
                    message: other.to_string(),
                },
            });
            let view = view.inspect_err(|e| {
                tracing::warn!(node = %node.id, error = %e, "Compile aborted");
            })?;
            tracing::debug!(node = %node.id, kind = %view.kind, "Route compiled");
            canonical.push(spec);
            routes.push(Route {
                node: node.id.clone(),
                view,
            });
        }

        let graph = FlowGraph::new(design);
        let capabilities = self.adapter.capabilities();
        let mut issues = validate_topology(&graph, &self.options);
        issues.extend(self.pipeline.run_design(&DesignContext {
            design,
            graph: &graph,
            registry: self.registry,
            capabilities,
            options: &self.options,
        }));
        issues.extend(self.pipeline.run_specs(&canonical, capabilities, &self.options));

        let checksum = design_checksum(design)?;
        let plan = RuntimePlan {
            schema: self.options.schema.clone(),
            plan_id: Uuid::new_v5(&Uuid::NAMESPACE_OID, checksum.as_bytes()),
            design_checksum: checksum.clone(),
            adapter: self.adapter.name().to_string(),
            routes,
            constraints: Constraints {
                max_text_len: capabilities.max_text_len,
                max_buttons: capabilities.max_buttons,
            },
            compiled_at: Utc::now(),
        };

        tracing::info!(
            plan_id = %plan.plan_id,
            checksum = %checksum,
            routes = plan.routes.len(),
            errors = count_by_severity(&issues, Severity::Error),
            warnings = count_by_severity(&issues, Severity::Warn),
            infos = count_by_severity(&issues, Severity::Info),
            "Design compiled"
        );

        Ok(Compilation {
            plan,
            checksum,
            issues,
        })
    }

    fn build_spec(
        &self,
        design: &Design,
        node: &flowcert_design::Node,
        runtime: &RuntimeContext,
    ) -> Result<ComponentSpec> {
        let props = design.resolved_props(node);
        let component = self.registry.create(&node.kind, &props).map_err(|e| match e {
            FlowError::Factory { kind, node: n, message } if n.is_empty() => FlowError::Factory {
                kind,
                node: node.id.clone(),
                message,
            },
            other => other,
        })?;
        component
            .spec(&SpecContext { node_id: &node.id }, runtime)
            .map_err(|e| match e {
                FlowError::Spec { .. } => e,
                other => FlowError::Spec {
                    node: node.id.clone(),
                    message: other.to_string(),
                },
            })
    }
}

/// Compile with default options and the standard pipeline.
pub fn compile(design: &Design, registry: &Registry, adapter: &dyn Adapter) -> Result<Compilation> {
    Compiler::new(registry, adapter).compile(design)
}
