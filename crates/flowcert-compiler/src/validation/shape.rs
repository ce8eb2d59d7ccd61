//! Document shape: the vocabulary and presence checks that do not depend on
//! graph structure.

use std::collections::HashMap;
use std::sync::LazyLock;

use flowcert_design::{parse_guard, EntryKind, VersionStatus};
use flowcert_types::Issue;
use regex::Regex;

use super::{node_path, DesignContext, DesignPass};

static KIND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_.-]*$").expect("node kind pattern must compile"));

fn is_valid_kind(kind: &str) -> bool {
    KIND_PATTERN.is_match(kind)
}

pub struct ShapePass;

impl DesignPass for ShapePass {
    fn name(&self) -> &str {
        "shape"
    }

    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let design = ctx.design;
        let mut issues = Vec::new();

        if design.schema.trim().is_empty() {
            issues.push(Issue::error("design.schema.missing", "schema", "Design has no schema identifier"));
        }
        if design.bot.id.trim().is_empty() {
            issues.push(Issue::error("design.bot.id_missing", "bot.id", "Bot has no id"));
        }
        if design.version.status == VersionStatus::Unknown {
            issues.push(Issue::error(
                "design.version.status_unknown",
                "version.status",
                "Version status must be 'development' or 'production'",
            ));
        }

        // --- Entries ---
        if design.entries.is_empty() {
            issues.push(Issue::error("design.entries.empty", "entries", "Design declares no entries"));
        }
        for (i, entry) in design.entries.iter().enumerate() {
            if entry.kind == EntryKind::Unknown {
                issues.push(Issue::error(
                    "design.entry.kind_unknown",
                    format!("entries[{i}].kind"),
                    "Entry kind must be global_start, channel_start or forced",
                ));
            }
        }

        // --- Nodes ---
        let mut first_index: HashMap<&str, usize> = HashMap::new();
        for (i, node) in design.graph.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                issues.push(Issue::error(
                    "design.node.id_missing",
                    format!("graph.nodes[{i}]"),
                    "Node has no id",
                ));
                continue;
            }
            if let Some(first) = first_index.get(node.id.as_str()) {
                issues.push(Issue::error(
                    "design.node.duplicate_id",
                    format!("graph.nodes[{i}]"),
                    format!("Node id '{}' is already used by graph.nodes[{first}]", node.id),
                ));
            } else {
                first_index.insert(node.id.as_str(), i);
            }

            let path = node_path(&node.id);
            if !is_valid_kind(&node.kind) {
                issues.push(Issue::error(
                    "design.node.kind_invalid",
                    format!("{path}.kind"),
                    format!("Node kind '{}' is not a valid identifier", node.kind),
                ));
            } else if !ctx.registry.has(&node.kind) {
                issues.push(Issue::error(
                    "design.node.kind_unknown",
                    format!("{path}.kind"),
                    format!(
                        "Node kind '{}' is not registered; known kinds: {}",
                        node.kind,
                        ctx.registry.kinds().join(", ")
                    ),
                ));
            }
            if let Some(name) = &node.props_ref {
                if !design.props.contains_key(name) {
                    issues.push(Issue::error(
                        "design.props_ref.unknown",
                        format!("{path}.props_ref"),
                        format!("Node references unknown shared props '{name}'"),
                    ));
                }
            }
        }

        // --- Edges ---
        for (i, edge) in ctx.graph.edges() {
            if edge.label.trim().is_empty() {
                issues.push(Issue::error(
                    "design.edge.label_missing",
                    format!("graph.edges[{i}].label"),
                    format!("Edge {} -> {} has no label", edge.from, edge.to),
                ));
            }
            if let Some(guard) = edge.guard.as_deref().filter(|g| !g.trim().is_empty()) {
                if let Err(e) = parse_guard(guard) {
                    issues.push(Issue::error(
                        "design.edge.guard_invalid",
                        format!("graph.edges[{i}].guard"),
                        format!("Guard '{guard}' does not parse: {e}"),
                    ));
                }
            }
        }

        issues
    }
}
