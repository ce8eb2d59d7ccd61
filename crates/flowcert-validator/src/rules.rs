//! Declarative comparisons for the `rules` mode.

use serde_json::{Map, Value};

use flowcert_design::lookup_path;

use crate::config::{Logic, Rule, RuleOp, RuleSet};
use crate::normalize::Normalize;

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of a scalar value; `None` for null, arrays and objects.
pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn equals(actual: &Value, expected: &Value, normalize: &Normalize) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (as_text(actual), as_text(expected)) {
            (Some(a), Some(b)) => normalize.apply(&a) == normalize.apply(&b),
            _ => actual == expected,
        },
    }
}

fn compare(actual: &Value, expected: &Value, normalize: &Normalize) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&b);
    }
    let a = normalize.apply(&as_text(actual)?);
    let b = normalize.apply(&as_text(expected)?);
    Some(a.cmp(&b))
}

fn text_test(actual: &Value, expected: &Value, normalize: &Normalize, test: fn(&str, &str) -> bool) -> bool {
    match (as_text(actual), as_text(expected)) {
        (Some(a), Some(b)) => test(&normalize.apply(&a), &normalize.apply(&b)),
        _ => false,
    }
}

/// Evaluate one comparison against the variable bag.
pub fn evaluate_rule(rule: &Rule, vars: &Map<String, Value>, normalize: &Normalize) -> bool {
    let actual = lookup_path(vars, &rule.field);
    match rule.op {
        RuleOp::Exists => actual.is_some_and(|v| !v.is_null()),
        RuleOp::Empty => is_empty(actual),
        op => {
            let (Some(actual), Some(expected)) = (actual, rule.value.as_ref()) else {
                return false;
            };
            match op {
                RuleOp::Eq => equals(actual, expected, normalize),
                RuleOp::NotEq => !equals(actual, expected, normalize),
                RuleOp::Gt => compare(actual, expected, normalize).is_some_and(|o| o.is_gt()),
                RuleOp::Gte => compare(actual, expected, normalize).is_some_and(|o| o.is_ge()),
                RuleOp::Lt => compare(actual, expected, normalize).is_some_and(|o| o.is_lt()),
                RuleOp::Lte => compare(actual, expected, normalize).is_some_and(|o| o.is_le()),
                RuleOp::In | RuleOp::NotIn => {
                    let found = match expected {
                        Value::Array(options) => options.iter().any(|o| equals(actual, o, normalize)),
                        other => equals(actual, other, normalize),
                    };
                    found == (op == RuleOp::In)
                }
                RuleOp::Contains => match actual {
                    Value::Array(items) => items.iter().any(|i| equals(i, expected, normalize)),
                    _ => text_test(actual, expected, normalize, |a, b| a.contains(b)),
                },
                RuleOp::StartsWith => text_test(actual, expected, normalize, |a, b| a.starts_with(b)),
                RuleOp::EndsWith => text_test(actual, expected, normalize, |a, b| a.ends_with(b)),
                RuleOp::Exists | RuleOp::Empty => false,
            }
        }
    }
}

/// Combine a rule set with its single AND/OR level. An empty set passes.
pub fn evaluate_rules(set: &RuleSet, vars: &Map<String, Value>, normalize: &Normalize) -> bool {
    if set.conditions.is_empty() {
        return true;
    }
    match set.logic {
        Logic::And => set.conditions.iter().all(|r| evaluate_rule(r, vars, normalize)),
        Logic::Or => set.conditions.iter().any(|r| evaluate_rule(r, vars, normalize)),
    }
}
