use flowcert_types::Issue;

use super::{node_path, DesignContext, DesignPass};
use crate::component::present_behaviors;

/// Each behavior key must be in the allow-list its kind was registered with.
pub struct BehaviorLegalityPass;

impl DesignPass for BehaviorLegalityPass {
    fn name(&self) -> &str {
        "behavior_legality"
    }

    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for node in ctx.graph.nodes() {
            let Some(allowed) = ctx.registry.allowed_behaviors(&node.kind) else {
                continue;
            };
            let props = ctx.design.resolved_props(node);
            for tag in present_behaviors(&props) {
                if allowed.contains(&tag) {
                    continue;
                }
                let allowed_keys: Vec<&str> = allowed.iter().map(|t| t.key()).collect();
                issues.push(Issue::error(
                    format!("behavior.{}.not_allowed", tag.key()),
                    format!("{}.props.{}", node_path(&node.id), tag.key()),
                    format!(
                        "Behavior '{}' is not allowed on kind '{}'; allowed: {}",
                        tag.key(),
                        node.kind,
                        if allowed_keys.is_empty() {
                            "none".to_string()
                        } else {
                            allowed_keys.join(", ")
                        }
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
    use flowcert_design::parse_design;
    use serde_json::json;

    fn run(nodes: serde_json::Value, props: serde_json::Value) -> Vec<Issue> {
        let doc = json!({
            "bot": {"id": "b", "channels": ["web"]},
            "version": {"id": "v1"},
            "graph": {"nodes": nodes},
            "props": props
        });
        let d = parse_design(&doc.to_string()).unwrap();
        let g = FlowGraph::new(&d);
        let registry = default_registry();
        let caps = Capabilities::default();
        let options = CompileOptions::default();
        BehaviorLegalityPass.apply(&DesignContext {
            design: &d,
            graph: &g,
            registry: &registry,
            capabilities: &caps,
            options: &options,
        })
    }

    #[test]
    fn delay_kind_only_allows_delay() {
        let issues = run(
            json!([{"id": "wait", "kind": "delay", "props": {"delay": 2, "timeout": 10}}]),
            json!({}),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, "behavior.timeout.not_allowed");
        assert_eq!(issues[0].path, "graph.nodes.wait.props.timeout");
        assert!(issues[0].message.contains("kind 'delay'"));
        assert!(issues[0].message.contains("allowed: delay"));
    }

    #[test]
    fn input_allows_its_full_set() {
        let issues = run(
            json!([{"id": "ask", "kind": "input", "props": {
                "text": "?", "timeout": 10, "validation": "email", "retry": 2,
                "fallback": "Sorry", "delay": 1, "persist": "email"
            }}]),
            json!({}),
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn behaviors_from_shared_props_are_checked() {
        let issues = run(
            json!([{"id": "hello", "kind": "text", "props_ref": "shared", "props": {"text": "hi"}}]),
            json!({"shared": {"persist": "x", "experiment": {"name": "e", "variants": [{"name": "a"}]}}}),
        );
        let codes: Vec<_> = issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["behavior.experiment.not_allowed", "behavior.persist.not_allowed"]);
    }

    #[test]
    fn switched_off_fallback_is_not_flagged() {
        let issues = run(
            json!([{"id": "wait", "kind": "delay", "props": {"delay": 2, "fallback": false}}]),
            json!({}),
        );
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        assert!(run(json!([{"id": "x", "kind": "mystery", "props": {"timeout": 1}}]), json!({})).is_empty());
    }
}
