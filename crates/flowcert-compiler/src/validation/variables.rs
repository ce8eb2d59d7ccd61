use std::sync::LazyLock;

use flowcert_types::Issue;
use regex::Regex;

use super::{node_path, DesignContext, DesignPass};
use crate::component::parse_persistence;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern must compile"));

/// `true` when `name` starts with a letter or underscore and continues with
/// alphanumerics or underscores only.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Validates profile variable names, persistence keys and edge `set` keys.
pub struct VariableNamePass;

fn invalid(path: String, what: &str, name: &str) -> Issue {
    Issue::error(
        "variable.name.invalid",
        path,
        format!("{what} '{name}' must start with a letter or underscore and contain only letters, digits and underscores"),
    )
}

impl DesignPass for VariableNamePass {
    fn name(&self) -> &str {
        "variable_names"
    }

    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let design = ctx.design;
        let mut issues = Vec::new();

        if let Some(profile) = &design.profile {
            for name in profile.context.keys() {
                if !is_valid_identifier(name) {
                    issues.push(invalid(format!("profile.context.{name}"), "Context variable", name));
                }
            }
            for name in profile.variables.keys() {
                if !is_valid_identifier(name) {
                    issues.push(invalid(format!("profile.variables.{name}"), "Profile variable", name));
                }
            }
        }

        for node in ctx.graph.nodes() {
            let props = ctx.design.resolved_props(node);
            let Ok(Some(persistence)) = parse_persistence(&props) else {
                continue;
            };
            let path = format!("{}.props.persist", node_path(&node.id));
            if !is_valid_identifier(&persistence.key) {
                issues.push(invalid(path, "Persistence key", &persistence.key));
                continue;
            }
            let declared = design.profile.as_ref().is_some_and(|p| {
                p.context.contains_key(&persistence.key) || p.variables.contains_key(&persistence.key)
            });
            if !declared {
                issues.push(Issue::info(
                    "variable.persist.undeclared",
                    path,
                    format!("Persistence key '{}' is not declared in the profile", persistence.key),
                ));
            }
        }

        for (i, edge) in ctx.graph.edges() {
            let Some(metadata) = &edge.metadata else {
                continue;
            };
            for name in metadata.set.keys() {
                if !is_valid_identifier(name) {
                    issues.push(invalid(format!("graph.edges[{i}].metadata.set.{name}"), "Variable", name));
                }
            }
        }

        issues
    }
}
