//! Output-mapping validation.
//!
//! An output nothing can emit, or an element nothing routes, dead-ends the
//! execution engine, so both are errors.

use std::collections::HashSet;

use flowcert_design::Node;
use flowcert_types::Issue;

use super::{node_path, DesignContext, DesignPass};
use crate::component::{parse_behavior, InteractiveElement, OutputPolicy, STANDARD_OUTPUTS};

pub struct OutputMappingPass;

fn output_path(node: &Node, j: usize) -> String {
    format!("{}.outputs[{j}]", node_path(&node.id))
}

impl OutputMappingPass {
    fn check_interactive(
        node: &Node,
        element: &str,
        elements: &[InteractiveElement],
        issues: &mut Vec<Issue>,
    ) {
        let kind = &node.kind;
        for (j, output) in node.outputs.iter().enumerate() {
            let mapped = STANDARD_OUTPUTS.contains(&output.as_str()) || elements.iter().any(|e| e.matches(output));
            if !mapped {
                issues.push(Issue::error(
                    format!("output.{kind}.unmapped_output"),
                    output_path(node, j),
                    format!(
                        "Output '{output}' of '{}' matches no {element} and is not a standard output ({})",
                        node.id,
                        STANDARD_OUTPUTS.join(", ")
                    ),
                ));
            }
        }
        for el in elements {
            if !node.outputs.iter().any(|o| el.matches(o)) {
                issues.push(Issue::error(
                    format!("output.{kind}.missing_{element}_output"),
                    format!("{}.outputs", node_path(&node.id)),
                    format!(
                        "The {element} '{}' of '{}' has no matching output",
                        el.display_name(),
                        node.id
                    ),
                ));
            }
        }
    }

    fn check_fixed(node: &Node, required: &[&str], optional: &[&str], issues: &mut Vec<Issue>) {
        if node.is_final && node.outputs.is_empty() {
            return;
        }
        let kind = &node.kind;
        for req in required {
            if !node.outputs.iter().any(|o| o == req) {
                issues.push(Issue::error(
                    format!("output.{kind}.missing_fixed_output"),
                    format!("{}.outputs", node_path(&node.id)),
                    format!("Node '{}' must expose output '{req}'", node.id),
                ));
            }
        }
        for (j, output) in node.outputs.iter().enumerate() {
            let known = required.contains(&output.as_str()) || optional.contains(&output.as_str());
            if !known {
                let mut allowed: Vec<&str> = required.iter().chain(optional).copied().collect();
                allowed.sort_unstable();
                issues.push(Issue::error(
                    format!("output.{kind}.unexpected_output"),
                    output_path(node, j),
                    format!(
                        "Kind '{kind}' cannot emit '{output}'; its outputs are {}",
                        allowed.join(", ")
                    ),
                ));
            }
        }
    }
}

impl DesignPass for OutputMappingPass {
    fn name(&self) -> &str {
        "output_mapping"
    }

    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for node in ctx.graph.nodes() {
            let Some(policy) = ctx.registry.output_policy(&node.kind) else {
                continue;
            };
            let props = ctx.design.resolved_props(node);

            let mut seen = HashSet::new();
            for (j, output) in node.outputs.iter().enumerate() {
                if !seen.insert(output.as_str()) {
                    issues.push(Issue::error(
                        format!("output.{}.duplicate_output", node.kind),
                        output_path(node, j),
                        format!("Output '{output}' is declared more than once"),
                    ));
                }
            }

            match policy {
                OutputPolicy::Interactive { element, extract } => {
                    Self::check_interactive(node, element, &extract(&props), &mut issues)
                }
                OutputPolicy::Fixed { required, optional } => {
                    Self::check_fixed(node, required, optional, &mut issues)
                }
            }

            // A configured behavior whose output is never declared cannot fire
            if let Ok(Some(behavior)) = parse_behavior(&props) {
                let behavior_outputs = [
                    behavior.timeout.as_ref().map(|b| b.output.as_str()),
                    behavior.validation.as_ref().map(|b| b.output.as_str()),
                    behavior.fallback.as_ref().map(|b| b.output.as_str()),
                ];
                for output in behavior_outputs.into_iter().flatten() {
                    if !node.outputs.iter().any(|o| o == output) {
                        issues.push(Issue::warn(
                            format!("output.{}.behavior_output_missing", node.kind),
                            format!("{}.outputs", node_path(&node.id)),
                            format!(
                                "Node '{}' routes a behavior to '{output}' but does not declare it",
                                node.id
                            ),
                        ));
                    }
                }
            }
        }

        for (i, edge) in ctx.graph.edges() {
            let Some(from) = ctx.graph.node(&edge.from) else {
                continue;
            };
            if edge.label.trim().is_empty() {
                continue;
            }
            if !from.outputs.iter().any(|o| *o == edge.label) {
                issues.push(Issue::error(
                    "output.edge.unknown_label",
                    format!("graph.edges[{i}]"),
                    format!(
                        "Edge {} -> {} reacts to '{}', which '{}' does not declare as an output",
                        edge.from, edge.to, edge.label, edge.from
                    ),
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Capabilities;
    use crate::component::default_registry;
    use crate::graph::FlowGraph;
    use crate::options::CompileOptions;
    use flowcert_design::{parse_design, Design};
    use serde_json::{json, Value};

    fn design(nodes: Value, edges: Value) -> Design {
        let doc = json!({
            "bot": {"id": "b", "channels": ["web"]},
            "version": {"id": "v1"},
            "entries": [{"kind": "global_start", "target": "menu"}],
            "graph": {"nodes": nodes, "edges": edges}
        });
        parse_design(&doc.to_string()).unwrap()
    }

    fn run(d: &Design) -> Vec<Issue> {
        let g = FlowGraph::new(d);
        let registry = default_registry();
        let caps = Capabilities::default();
        let options = CompileOptions::default();
        OutputMappingPass.apply(&DesignContext {
            design: d,
            graph: &g,
            registry: &registry,
            capabilities: &caps,
            options: &options,
        })
    }

    fn menu(outputs: Value) -> Value {
        json!({
            "id": "menu", "kind": "buttons", "outputs": outputs,
            "props": {"text": "Pick", "buttons": [
                {"id": "sales", "label": "Sales"},
                {"id": "support", "label": "Support"},
                {"label": "Site", "type": "url", "url": "https://x"}
            ]}
        })
    }

    fn codes(issues: &[Issue]) -> Vec<&str> {
        issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn missing_button_output_is_error_and_fix_removes_it() {
        let d = design(json!([menu(json!(["sales"]))]), json!([]));
        let issues = run(&d);
        assert_eq!(codes(&issues), vec!["output.buttons.missing_button_output"]);
        assert!(issues[0].message.contains("support"));

        let d = design(json!([menu(json!(["sales", "support"]))]), json!([]));
        assert!(run(&d).is_empty());
    }

    #[test]
    fn unmapped_output_is_error_but_standard_outputs_pass() {
        let d = design(json!([menu(json!(["sales", "support", "timeout", "billing"]))]), json!([]));
        let issues = run(&d);
        assert_eq!(codes(&issues), vec!["output.buttons.unmapped_output"]);
        assert_eq!(issues[0].path, "graph.nodes.menu.outputs[3]");
    }

    #[test]
    fn url_buttons_need_no_output() {
        let d = design(json!([menu(json!(["Sales", "support"]))]), json!([]));
        assert!(run(&d).is_empty());
    }

    #[test]
    fn list_items_and_confirm_choices() {
        let d = design(
            json!([
                {"id": "menu", "kind": "list", "outputs": ["p1"],
                 "props": {"text": "t", "sections": [{"items": [{"id": "p1", "title": "A"}, {"id": "p2", "title": "B"}]}]}},
                {"id": "ok", "kind": "confirm", "outputs": ["yes", "no", "cancelled"], "props": {"text": "Sure?"}}
            ]),
            json!([]),
        );
        assert_eq!(codes(&run(&d)), vec!["output.list.missing_item_output"]);
    }

    #[test]
    fn fixed_kinds_expose_exactly_their_outputs() {
        let d = design(
            json!([
                {"id": "menu", "kind": "message", "outputs": ["next", "later"], "props": {"text": "t"}},
                {"id": "m2", "kind": "media", "outputs": [], "props": {"url": "u"}},
                {"id": "end", "kind": "message", "final": true, "props": {"text": "bye"}},
                {"id": "ask", "kind": "input", "outputs": ["next", "invalid"], "props": {"text": "?"}}
            ]),
            json!([]),
        );
        let issues = run(&d);
        assert_eq!(
            codes(&issues),
            vec!["output.message.unexpected_output", "output.media.missing_fixed_output"]
        );
    }

    #[test]
    fn behavior_output_must_be_declared() {
        let d = design(
            json!([{"id": "menu", "kind": "input", "outputs": ["next"],
                    "props": {"text": "?", "timeout": 30}}]),
            json!([]),
        );
        let issues = run(&d);
        assert_eq!(codes(&issues), vec!["output.input.behavior_output_missing"]);
        assert_eq!(issues[0].severity, flowcert_types::Severity::Warn);
    }

    #[test]
    fn edge_label_must_be_declared_output() {
        let d = design(
            json!([
                menu(json!(["sales", "support"])),
                {"id": "end", "kind": "message", "final": true, "props": {"text": "bye"}}
            ]),
            json!([
                {"from": "menu", "to": "end", "label": "sales"},
                {"from": "menu", "to": "end", "label": "refunds"}
            ]),
        );
        let issues = run(&d);
        assert_eq!(codes(&issues), vec!["output.edge.unknown_label"]);
        assert_eq!(issues[0].path, "graph.edges[1]");
    }

    #[test]
    fn duplicate_outputs_are_errors() {
        let d = design(json!([menu(json!(["sales", "support", "sales"]))]), json!([]));
        assert_eq!(codes(&run(&d)), vec!["output.buttons.duplicate_output"]);
    }
}
