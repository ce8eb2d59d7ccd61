//! Topology validation: structural rules over the node/edge graph.
//!
//! Every rule runs; issues are concatenated in rule order. Call
//! [`validate_topology`] to run the built-in set.

use std::collections::{HashMap, HashSet};

use flowcert_design::{Edge, EntryKind};
use flowcert_types::Issue;

use crate::graph::FlowGraph;
use crate::options::CompileOptions;

// ---------------------------------------------------------------------------
// Rule trait
// ---------------------------------------------------------------------------

pub struct TopologyContext<'a> {
    pub graph: &'a FlowGraph<'a>,
    pub options: &'a CompileOptions,
}

pub trait TopologyRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn node_path(id: &str) -> String {
    format!("graph.nodes.{id}")
}

/// Path of an edge borrowed from the graph index.
fn edge_path(graph: &FlowGraph<'_>, edge: &Edge) -> String {
    match graph.edges().find(|(_, e)| std::ptr::eq(*e, edge)) {
        Some((i, _)) => format!("graph.edges[{i}]"),
        None => format!("graph.edges[{}->{}]", edge.from, edge.to),
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct GlobalStartRule;
impl TopologyRule for GlobalStartRule {
    fn name(&self) -> &str {
        "global_start"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let entries = &ctx.graph.design().entries;
        let globals: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind == EntryKind::GlobalStart)
            .map(|(i, _)| i)
            .collect();

        let mut issues = Vec::new();
        match globals.len() {
            0 => issues.push(Issue::error(
                "topology.start.global_missing",
                "entries",
                "Design has no global_start entry; expected exactly one",
            )),
            1 => {}
            n => issues.push(Issue::error(
                "topology.start.global_multiple",
                "entries",
                format!(
                    "Design has {n} global_start entries (at {}); expected exactly one",
                    globals.iter().map(|i| format!("entries[{i}]")).collect::<Vec<_>>().join(", ")
                ),
            )),
        }

        for &i in &globals {
            if entries[i].channel_id.is_some() {
                issues.push(Issue::error(
                    "topology.start.global_channel",
                    format!("entries[{i}]"),
                    "global_start entry must not carry a channel_id",
                ));
            }
        }
        issues
    }
}

struct ChannelStartRule;
impl TopologyRule for ChannelStartRule {
    fn name(&self) -> &str {
        "channel_start"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let design = ctx.graph.design();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut issues = Vec::new();

        for (i, entry) in design.entries.iter().enumerate() {
            if entry.kind != EntryKind::ChannelStart {
                continue;
            }
            let path = format!("entries[{i}]");
            let channel = match entry.channel_id.as_deref().map(str::trim) {
                Some(c) if !c.is_empty() => c,
                _ => {
                    issues.push(Issue::error(
                        "topology.start.channel_missing_id",
                        path,
                        "channel_start entry must carry a channel_id",
                    ));
                    continue;
                }
            };

            if let Some(first) = seen.get(channel) {
                issues.push(Issue::error(
                    "topology.start.channel_duplicate",
                    path,
                    format!("Channel '{channel}' already has a channel_start at entries[{first}]"),
                ));
                continue;
            }
            seen.insert(channel, i);

            if !design.bot.channels.iter().any(|c| c.trim() == channel) {
                issues.push(Issue::warn(
                    "topology.start.channel_undeclared",
                    path,
                    format!("channel_start targets channel '{channel}' which the bot does not declare"),
                ));
            }
        }
        issues
    }
}

struct FinalNodeRule;
impl TopologyRule for FinalNodeRule {
    fn name(&self) -> &str {
        "final_node"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        ctx.graph
            .nodes()
            .filter(|n| n.is_final)
            .filter_map(|n| {
                let out = ctx.graph.outgoing(&n.id);
                (!out.is_empty()).then(|| {
                    Issue::error(
                        "topology.final.has_outgoing",
                        node_path(&n.id),
                        format!(
                            "Final node '{}' has {} outgoing edge(s) (to {})",
                            n.id,
                            out.len(),
                            out.iter().map(|e| e.to.as_str()).collect::<Vec<_>>().join(", ")
                        ),
                    )
                })
            })
            .collect()
    }
}

struct EdgePriorityRule;
impl TopologyRule for EdgePriorityRule {
    fn name(&self) -> &str {
        "edge_priority"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let mut seen: HashMap<(&str, i64), usize> = HashMap::new();
        let mut issues = Vec::new();
        for (i, edge) in ctx.graph.edges() {
            if edge.priority == 0 {
                continue;
            }
            match seen.get(&(edge.from.as_str(), edge.priority)) {
                Some(first) => issues.push(Issue::error(
                    "topology.edge.priority_duplicate",
                    format!("graph.edges[{i}]"),
                    format!(
                        "Edge {} -> {} reuses priority {} of graph.edges[{first}]",
                        edge.from, edge.to, edge.priority
                    ),
                )),
                None => {
                    seen.insert((edge.from.as_str(), edge.priority), i);
                }
            }
        }
        issues
    }
}

struct ReferenceRule;
impl TopologyRule for ReferenceRule {
    fn name(&self) -> &str {
        "references"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let graph = ctx.graph;
        let mut issues = Vec::new();
        for (i, edge) in graph.edges() {
            if !graph.has_node(&edge.from) {
                issues.push(Issue::error(
                    "topology.edge.from_missing",
                    format!("graph.edges[{i}]"),
                    format!("Edge source '{}' does not exist", edge.from),
                ));
            }
            if !graph.has_node(&edge.to) {
                issues.push(Issue::error(
                    "topology.edge.to_missing",
                    format!("graph.edges[{i}]"),
                    format!("Edge target '{}' does not exist", edge.to),
                ));
            }
        }
        for (i, entry) in graph.design().entries.iter().enumerate() {
            if !graph.has_node(&entry.target) {
                issues.push(Issue::error(
                    "topology.entry.target_missing",
                    format!("entries[{i}]"),
                    format!("{} entry targets unknown node '{}'", entry.kind.as_str(), entry.target),
                ));
            }
        }
        issues
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

struct CycleRule;
impl CycleRule {
    /// A back-edge is admissible when it is a self-loop on a safe label or
    /// carries a guard.
    fn is_exempt(edge: &Edge, options: &CompileOptions) -> bool {
        edge.has_guard() || (edge.from == edge.to && options.is_safe_loop_label(&edge.label))
    }
}

impl TopologyRule for CycleRule {
    fn name(&self) -> &str {
        "cycles"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let graph = ctx.graph;
        let mut state: HashMap<&str, Visit> = HashMap::new();
        let mut issues = Vec::new();

        for root in graph.nodes() {
            if state.contains_key(root.id.as_str()) {
                continue;
            }
            // Iterative DFS; each frame is (node, next outgoing edge index).
            let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
            state.insert(root.id.as_str(), Visit::OnStack);

            while let Some(top) = stack.last_mut() {
                let (node, idx) = *top;
                top.1 += 1;

                let out = graph.outgoing(node);
                let Some(&edge) = out.get(idx) else {
                    state.insert(node, Visit::Done);
                    stack.pop();
                    continue;
                };
                let Some(target) = graph.node(&edge.to) else {
                    continue;
                };
                let target = target.id.as_str();

                match state.get(target) {
                    Some(Visit::OnStack) => {
                        if Self::is_exempt(edge, ctx.options) {
                            continue;
                        }
                        let start = stack.iter().position(|(n, _)| *n == target).unwrap_or(0);
                        let mut cycle: Vec<&str> = stack[start..].iter().map(|(n, _)| *n).collect();
                        cycle.push(target);
                        issues.push(Issue::warn(
                            "topology.cycle.unguarded",
                            edge_path(graph, edge),
                            format!(
                                "Cycle {} closes on edge labeled '{}' without a guard",
                                cycle.join(" -> "),
                                edge.label
                            ),
                        ));
                    }
                    Some(Visit::Done) => {}
                    None => {
                        state.insert(target, Visit::OnStack);
                        stack.push((target, 0));
                    }
                }
            }
        }
        issues
    }
}

struct ChannelsRule;
impl TopologyRule for ChannelsRule {
    fn name(&self) -> &str {
        "channels"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let channels = &ctx.graph.design().bot.channels;
        if channels.is_empty() {
            return vec![Issue::error(
                "topology.channels.empty",
                "bot.channels",
                "Bot must declare at least one channel",
            )];
        }
        channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.trim().is_empty())
            .map(|(i, _)| {
                Issue::error(
                    "topology.channels.blank",
                    format!("bot.channels[{i}]"),
                    "Channel identifier must not be empty",
                )
            })
            .collect()
    }
}

struct ReachabilityRule;
impl TopologyRule for ReachabilityRule {
    fn name(&self) -> &str {
        "reachability"
    }

    fn apply(&self, ctx: &TopologyContext<'_>) -> Vec<Issue> {
        let graph = ctx.graph;
        let roots = graph.entry_roots();
        if roots.is_empty() {
            return vec![]; // GlobalStartRule / ReferenceRule report this
        }
        let reached = graph.reachable_from(&roots);
        let mut reported = HashSet::new();
        graph
            .nodes()
            .filter(|n| !reached.contains(n.id.as_str()) && reported.insert(n.id.as_str()))
            .map(|n| {
                Issue::warn(
                    "topology.node.unreachable",
                    node_path(&n.id),
                    format!("Node '{}' is not reachable from any entry", n.id),
                )
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn builtin_rules() -> Vec<Box<dyn TopologyRule>> {
    vec![
        Box::new(GlobalStartRule),
        Box::new(ChannelStartRule),
        Box::new(FinalNodeRule),
        Box::new(EdgePriorityRule),
        Box::new(ReferenceRule),
        Box::new(CycleRule),
        Box::new(ChannelsRule),
        Box::new(ReachabilityRule),
    ]
}

/// Run every topology rule and concatenate the findings.
pub fn validate_topology(graph: &FlowGraph<'_>, options: &CompileOptions) -> Vec<Issue> {
    let ctx = TopologyContext { graph, options };
    let mut issues = Vec::new();
    for rule in builtin_rules() {
        let found = rule.apply(&ctx);
        if !found.is_empty() {
            tracing::debug!(rule = rule.name(), issues = found.len(), "Topology rule reported");
        }
        issues.extend(found);
    }
    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
