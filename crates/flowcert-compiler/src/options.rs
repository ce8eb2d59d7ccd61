use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PLAN_SCHEMA: &str = "flowcert.plan/v1";

const DEFAULT_FILTERS: &[&str] = &[
    "capitalize", "currency", "date", "default", "escape", "first", "float", "int", "join", "last",
    "length", "lower", "replace", "round", "title", "trim", "upper",
];

const DEFAULT_SAFE_LOOP_LABELS: &[&str] = &["timeout", "retry", "fallback", "validation", "error"];

/// Compile-time settings. Every field has a default, so a partial JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// `schema` written into the plan.
    pub schema: String,
    /// Prefix for per-spec issue paths (`{base_path}.routes[i]`).
    pub base_path: String,
    /// Template filters a text field may use.
    pub allowed_filters: BTreeSet<String>,
    /// Self-loop labels exempt from the unguarded-cycle warning.
    pub safe_loop_labels: BTreeSet<String>,
    /// Estimated length above this share of the limit is reported as info.
    pub near_limit_ratio: f64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            schema: DEFAULT_PLAN_SCHEMA.to_string(),
            base_path: "plan".to_string(),
            allowed_filters: DEFAULT_FILTERS.iter().map(|s| s.to_string()).collect(),
            safe_loop_labels: DEFAULT_SAFE_LOOP_LABELS.iter().map(|s| s.to_string()).collect(),
            near_limit_ratio: 0.8,
        }
    }
}

impl CompileOptions {
    pub fn from_json(source: &str) -> flowcert_types::Result<Self> {
        let options: Self = serde_json::from_str(source)?;
        if !(0.0..=1.0).contains(&options.near_limit_ratio) {
            return Err(flowcert_types::FlowError::Other(format!(
                "near_limit_ratio must be within 0..=1, got {}",
                options.near_limit_ratio
            )));
        }
        Ok(options)
    }

    pub fn with_filter(mut self, name: impl Into<String>) -> Self {
        self.allowed_filters.insert(name.into());
        self
    }

    pub fn is_filter_allowed(&self, name: &str) -> bool {
        self.allowed_filters.contains(name)
    }

    pub fn is_safe_loop_label(&self, label: &str) -> bool {
        self.safe_loop_labels.contains(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = CompileOptions::default();
        assert_eq!(o.schema, "flowcert.plan/v1");
        assert!(o.is_filter_allowed("upper"));
        assert!(!o.is_filter_allowed("safe"));
        assert!(o.is_safe_loop_label("timeout"));
        assert!(!o.is_safe_loop_label("next"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let o = CompileOptions::from_json(r#"{"base_path": "bot"}"#).unwrap();
        assert_eq!(o.base_path, "bot");
        assert_eq!(o.near_limit_ratio, 0.8);
        assert!(o.is_safe_loop_label("retry"));
    }

    #[test]
    fn ratio_out_of_range_is_rejected() {
        assert!(CompileOptions::from_json(r#"{"near_limit_ratio": 1.5}"#).is_err());
    }

    #[test]
    fn with_filter_extends_allow_list() {
        let o = CompileOptions::default().with_filter("slugify");
        assert!(o.is_filter_allowed("slugify"));
    }
}
