//! Best-effort length estimation for templated text.
//!
//! The literal part is measured exactly; each output expression adds a guess
//! keyed on its variable names. Nothing is rendered.

use flowcert_types::Issue;
use serde_json::Value;

use super::{node_path, DesignContext, DesignPass};
use crate::template::{self, ExprKind, TemplateExpr};

/// Expected rendered width per variable-name keyword.
const ESTIMATES: &[(&str, usize)] = &[
    ("first_name", 15),
    ("last_name", 20),
    ("full_name", 40),
    ("name", 30),
    ("email", 40),
    ("phone", 15),
    ("cpf", 14),
    ("cnpj", 18),
    ("document", 20),
    ("address", 80),
    ("street", 50),
    ("city", 30),
    ("zip", 9),
    ("cep", 9),
    ("date", 10),
    ("time", 8),
    ("url", 60),
    ("link", 60),
    ("price", 12),
    ("amount", 12),
    ("total", 12),
    ("value", 12),
    ("protocol", 12),
    ("code", 10),
    ("id", 12),
    ("description", 120),
    ("message", 160),
    ("text", 160),
    ("body", 160),
];

pub const DEFAULT_ESTIMATE: usize = 20;

/// Estimated width of one variable, from the last segment of its path.
pub fn estimate_variable(path: &str) -> usize {
    let segment = path.rsplit('.').next().unwrap_or(path).to_lowercase();
    if let Some((_, n)) = ESTIMATES.iter().find(|(key, _)| *key == segment) {
        return *n;
    }
    let words: Vec<&str> = segment.split('_').collect();
    ESTIMATES
        .iter()
        .find(|(key, _)| words.contains(key))
        .map(|(_, n)| *n)
        .unwrap_or(DEFAULT_ESTIMATE)
}

fn estimate_expr(expr: &TemplateExpr) -> usize {
    if expr.kind != ExprKind::Output {
        return 0;
    }
    if expr.variables.is_empty() {
        return DEFAULT_ESTIMATE;
    }
    expr.variables.iter().map(|v| estimate_variable(v)).sum()
}

/// `(literal, estimated_total)` for a templated text, `None` when the text
/// has no output expressions or does not scan.
pub fn estimate_text(text: &str) -> Option<(usize, usize)> {
    if !template::contains_template(text) {
        return None;
    }
    let exprs = template::scan(text).ok()?;
    if !exprs.iter().any(|e| e.kind == ExprKind::Output) {
        return None;
    }
    let literal = template::literal_len(text, &exprs);
    let expansion: usize = exprs.iter().map(estimate_expr).sum();
    Some((literal, literal + expansion))
}

pub struct TemplateLengthPass;

impl DesignPass for TemplateLengthPass {
    fn name(&self) -> &str {
        "template_length"
    }

    fn apply(&self, ctx: &DesignContext<'_>) -> Vec<Issue> {
        let Some(max) = ctx.capabilities.max_text_len else {
            return vec![];
        };
        let near = (max as f64 * ctx.options.near_limit_ratio).floor() as usize;
        let mut issues = Vec::new();

        for node in ctx.graph.nodes() {
            let props = ctx.design.resolved_props(node);
            let Some(Value::String(text)) = props.get("text") else {
                continue;
            };
            let Some((literal, estimated)) = estimate_text(text) else {
                continue;
            };
            let path = format!("{}.props.text", node_path(&node.id));

            if literal > max {
                issues.push(Issue::error(
                    "template.length.static_exceeded",
                    path,
                    format!("Literal text alone is {literal} characters; the channel limit is {max}"),
                ));
            } else if estimated > max {
                issues.push(Issue::warn(
                    "template.length.estimated_exceeded",
                    path,
                    format!("Estimated rendered length {estimated} exceeds the channel limit of {max}"),
                ));
            } else if estimated > near {
                issues.push(Issue::info(
                    "template.length.near_limit",
                    path,
                    format!("Estimated rendered length {estimated} is close to the channel limit of {max}"),
                ));
            }
        }
        issues
    }
}
