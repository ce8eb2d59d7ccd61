//! Validator engine configuration, decoded from JSON.
//!
//! ```json
//! {
//!   "enabled": true,
//!   "normalize": {"trim": true, "lowercase": true},
//!   "routes": [{"go": "yes", "modes": {"tags": [{"field": "answer", "match": ["sim"], "strategy": "contains"}]}}],
//!   "default_output": "no",
//!   "timeout_seconds": 10,
//!   "timeout_output": "timeout"
//! }
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowcert_types::{FlowError, Result};

use crate::normalize::Normalize;

fn default_true() -> bool {
    true
}

fn default_field() -> String {
    "value".to_string()
}

fn default_output() -> String {
    "default".to_string()
}

fn default_timeout_output() -> String {
    "timeout".to_string()
}

fn default_threshold() -> f64 {
    0.8
}

fn default_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub normalize: Normalize,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default = "default_output")]
    pub default_output: String,
    /// Upper bound on a whole evaluation call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(default = "default_timeout_output")]
    pub timeout_output: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            normalize: Normalize::default(),
            routes: Vec::new(),
            default_output: default_output(),
            timeout_seconds: None,
            timeout_output: default_timeout_output(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Output emitted when every mode of this route passes.
    pub go: String,
    #[serde(default)]
    pub modes: ModesConfig,
}

/// Modes of one route. All present modes must pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModesConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex: Vec<RegexMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleSet>,
    /// Guard expression over the variable bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookMode>,
}

impl ModesConfig {
    pub fn is_empty(&self) -> bool {
        self.regex.is_empty()
            && self.tags.is_empty()
            && self.rules.is_none()
            && self.expr.is_none()
            && self.hook.is_none()
    }
}

// ---------------------------------------------------------------------------
// Regex
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexMode {
    #[serde(default = "default_field")]
    pub field: String,
    pub pattern: String,
    /// Any of `i` (case-insensitive), `m` (multiline), `s` (dot matches newline).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flags: String,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStrategy {
    #[default]
    Exact,
    Contains,
    StartsWith,
    EndsWith,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMode {
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(rename = "match")]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub strategy: TagStrategy,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Minimum similarity for `fuzzy`, from 0 (anything) to 1 (exact).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Logic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleOp {
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not_in")]
    NotIn,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
}

/// One level of AND/OR over comparisons. Groups do not nest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub field: String,
    #[serde(rename = "op", alias = "operator")]
    pub op: RuleOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

// ---------------------------------------------------------------------------
// Hook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookMode {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Per-call bound; the engine default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Responses are cached per URL for this long when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        reject_nested_rules(&value)?;
        let config: EngineConfig =
            serde_json::from_value(value).map_err(|e| FlowError::InvalidConfig(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Whole-call bound from `timeout_seconds`, rejecting values that are
    /// not positive or do not fit a `Duration`.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(secs) = self.timeout_seconds else {
            return Ok(None);
        };
        let invalid = || {
            FlowError::InvalidConfig(format!(
                "timeout_seconds must be a positive, representable number of seconds, got {secs}"
            ))
        };
        if secs.is_nan() || secs <= 0.0 {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(secs).map(Some).map_err(|_| invalid())
    }

    pub(crate) fn check(&self) -> Result<()> {
        for (i, route) in self.routes.iter().enumerate() {
            if route.go.trim().is_empty() {
                return Err(FlowError::InvalidConfig(format!("routes[{i}].go is empty")));
            }
            for (j, tag) in route.modes.tags.iter().enumerate() {
                if !(0.0..=1.0).contains(&tag.threshold) {
                    return Err(FlowError::InvalidConfig(format!(
                        "routes[{i}].modes.tags[{j}].threshold must be within 0..=1, got {}",
                        tag.threshold
                    )));
                }
            }
            if let Some(hook) = &route.modes.hook {
                if hook.url.trim().is_empty() {
                    return Err(FlowError::InvalidConfig(format!("routes[{i}].modes.hook.url is empty")));
                }
            }
        }
        self.timeout()?;
        Ok(())
    }
}

/// Rejects rule groups nested inside `conditions`, naming their location.
fn reject_nested_rules(value: &Value) -> Result<()> {
    let Some(routes) = value.get("routes").and_then(Value::as_array) else {
        return Ok(());
    };
    for (i, route) in routes.iter().enumerate() {
        let Some(conditions) = route.pointer("/modes/rules/conditions").and_then(Value::as_array) else {
            continue;
        };
        for (j, condition) in conditions.iter().enumerate() {
            let nested = condition
                .as_object()
                .is_some_and(|c| c.contains_key("conditions") || c.contains_key("logic"));
            if nested {
                return Err(FlowError::InvalidConfig(format!(
                    "routes[{i}].modes.rules.conditions[{j}]: nested rule groups are not supported"
                )));
            }
        }
    }
    Ok(())
}
