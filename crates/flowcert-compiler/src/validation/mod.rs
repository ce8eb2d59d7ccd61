//! Cross-cutting validation pipeline.
//!
//! Two pass families: [`SpecPass`] runs once per compiled spec against the
//! adapter capabilities; [`DesignPass`] runs once over the raw design. Every
//! pass runs and every issue is kept, in pass order.

pub mod behaviors;
pub mod capabilities;
pub mod filters;
pub mod length;
pub mod outputs;
pub mod shape;
pub mod template_length;
pub mod variables;

use flowcert_design::Design;
use flowcert_types::Issue;

use crate::adapter::Capabilities;
use crate::component::Registry;
use crate::graph::FlowGraph;
use crate::options::CompileOptions;
use crate::spec::ComponentSpec;

// ---------------------------------------------------------------------------
// Pass traits
// ---------------------------------------------------------------------------

/// Inputs shared by every per-spec pass call.
pub struct SpecPassContext<'a> {
    pub capabilities: &'a Capabilities,
    pub options: &'a CompileOptions,
    /// Issue path of the spec, e.g. `plan.routes[3]`.
    pub path: &'a str,
}

pub trait SpecPass: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, spec: &ComponentSpec, ctx: &SpecPassContext<'_>) -> Vec<Issue>;
}

pub struct DesignContext<'a> {
    pub design: &'a Design,
    pub graph: &'a FlowGraph<'a>,
    pub registry: &'a Registry,
    pub capabilities: &'a Capabilities,
    pub options: &'a CompileOptions,
}

pub trait DesignPass: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue>;
}

pub(crate) fn node_path(id: &str) -> String {
    format!("graph.nodes.{id}")
}

/// Join a spec path and a field suffix.
pub(crate) fn field_path(base: &str, field: &str) -> String {
    format!("{base}.{field}")
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Pipeline {
    design_passes: Vec<Box<dyn DesignPass>>,
    spec_passes: Vec<Box<dyn SpecPass>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in pass.
    pub fn standard() -> Self {
        Self::new()
            .with_design_pass(shape::ShapePass)
            .with_design_pass(outputs::OutputMappingPass)
            .with_design_pass(behaviors::BehaviorLegalityPass)
            .with_design_pass(template_length::TemplateLengthPass)
            .with_design_pass(variables::VariableNamePass)
            .with_spec_pass(filters::FilterAllowListPass)
            .with_spec_pass(length::StaticLengthPass)
            .with_spec_pass(capabilities::CapabilityPass)
    }

    pub fn with_design_pass(mut self, pass: impl DesignPass + 'static) -> Self {
        self.design_passes.push(Box::new(pass));
        self
    }

    pub fn with_spec_pass(mut self, pass: impl SpecPass + 'static) -> Self {
        self.spec_passes.push(Box::new(pass));
        self
    }

    pub fn design_pass_names(&self) -> Vec<&str> {
        self.design_passes.iter().map(|p| p.name()).collect()
    }

    pub fn spec_pass_names(&self) -> Vec<&str> {
        self.spec_passes.iter().map(|p| p.name()).collect()
    }

    pub fn run_design(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for pass in &self.design_passes {
            let found = pass.apply(ctx);
            if !found.is_empty() {
                tracing::debug!(pass = pass.name(), issues = found.len(), "Design pass reported");
            }
            issues.extend(found);
        }
        issues
    }

    /// Run every spec pass over every spec; spec `i` is addressed as
    /// `{base_path}.routes[i]`.
    pub fn run_specs(
        &self,
        specs: &[ComponentSpec],
        capabilities: &Capabilities,
        options: &CompileOptions,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            let path = format!("{}.routes[{i}]", options.base_path);
            let ctx = SpecPassContext {
                capabilities,
                options,
                path: &path,
            };
            for pass in &self.spec_passes {
                issues.extend(pass.apply(spec, &ctx));
            }
        }
        issues
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("design_passes", &self.design_pass_names())
            .field("spec_passes", &self.spec_pass_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::TextValue;

    struct Always(&'static str);
    impl SpecPass for Always {
        fn name(&self) -> &str {
            self.0
        }
        fn apply(&self, _spec: &ComponentSpec, ctx: &SpecPassContext<'_>) -> Vec<Issue> {
            vec![Issue::info(self.0, ctx.path, "seen")]
        }
    }

    #[test]
    fn standard_pipeline_order() {
        let p = Pipeline::standard();
        assert_eq!(
            p.design_pass_names(),
            vec!["shape", "output_mapping", "behavior_legality", "template_length", "variable_names"]
        );
        assert_eq!(p.spec_pass_names(), vec!["filter_allow_list", "static_length", "capabilities"]);
    }

    #[test]
    fn spec_passes_never_short_circuit() {
        let p = Pipeline::new().with_spec_pass(Always("first")).with_spec_pass(Always("second"));
        let mut spec = ComponentSpec::new("message");
        spec.text = Some(TextValue::literal("hi"));
        let options = CompileOptions::default();
        let issues = p.run_specs(&[spec.clone(), spec], &Capabilities::default(), &options);
        let seen: Vec<_> = issues.iter().map(|i| (i.code.as_str(), i.path.as_str())).collect();
        assert_eq!(
            seen,
            vec![
                ("first", "plan.routes[0]"),
                ("second", "plan.routes[0]"),
                ("first", "plan.routes[1]"),
                ("second", "plan.routes[1]"),
            ]
        );
    }
}
