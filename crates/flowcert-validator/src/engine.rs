//! The classifier: ordered routes, first full match wins.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use flowcert_design::{evaluate_guard, json_resolver, lookup_path, parse_guard, GuardExpr};
use flowcert_types::{FlowError, Result};

use crate::config::{EngineConfig, HookMode, RouteConfig, RuleSet, TagMode};
use crate::hook::{HookClient, HookTransport};
use crate::rules::{as_text, evaluate_rules};
use crate::supervise::{compile_pattern, supervised_match, DEFAULT_REGEX_TIMEOUT};
use crate::tags;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Terminal state of one evaluation call. Errors surface as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Decision {
    /// Route `route` passed every mode.
    Matched {
        route: usize,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// No route matched; the default output applies.
    Exhausted { output: String },
    /// The whole call exceeded `timeout_seconds`.
    TimedOut { output: String },
    /// The engine is switched off.
    Disabled { output: String },
}

impl Decision {
    pub fn output(&self) -> &str {
        match self {
            Decision::Matched { output, .. }
            | Decision::Exhausted { output }
            | Decision::TimedOut { output }
            | Decision::Disabled { output } => output,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Decision::Matched { .. })
    }
}

// ---------------------------------------------------------------------------
// Compiled routes
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CompiledRegex {
    field: String,
    regex: Arc<Regex>,
}

#[derive(Debug)]
struct CompiledRoute {
    output: String,
    regex: Vec<CompiledRegex>,
    tags: Vec<TagMode>,
    rules: Option<RuleSet>,
    expr: Option<GuardExpr>,
    hook: Option<HookMode>,
}

impl CompiledRoute {
    fn compile(index: usize, route: &RouteConfig) -> Result<Self> {
        let regex = route
            .modes
            .regex
            .iter()
            .map(|m| {
                Ok(CompiledRegex {
                    field: m.field.clone(),
                    regex: Arc::new(compile_pattern(&m.pattern, &m.flags)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let expr = route
            .modes
            .expr
            .as_deref()
            .map(|e| {
                parse_guard(e).map_err(|err| FlowError::Guard(format!("routes[{index}].modes.expr: {err}")))
            })
            .transpose()?;
        Ok(Self {
            output: route.go.clone(),
            regex,
            tags: route.modes.tags.clone(),
            rules: route.modes.rules.clone(),
            expr,
            hook: route.modes.hook.clone(),
        })
    }
}

/// Text of the field at `path`, or `None` when absent or not a scalar.
fn field_text(vars: &Map<String, Value>, path: &str) -> Option<String> {
    lookup_path(vars, path).and_then(as_text)
}

// ---------------------------------------------------------------------------
// ValidatorEngine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ValidatorEngine {
    config: EngineConfig,
    routes: Vec<CompiledRoute>,
    timeout: Option<Duration>,
    regex_timeout: Duration,
    hooks: HookClient,
}

impl ValidatorEngine {
    /// Validate the config and compile its patterns and expressions.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.check()?;
        let timeout = config.timeout()?;
        let routes = config
            .routes
            .iter()
            .enumerate()
            .map(|(i, r)| CompiledRoute::compile(i, r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            routes,
            timeout,
            regex_timeout: DEFAULT_REGEX_TIMEOUT,
            hooks: HookClient::default(),
        })
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Self::new(EngineConfig::from_json(source)?)
    }

    pub fn with_regex_timeout(mut self, timeout: Duration) -> Self {
        self.regex_timeout = timeout;
        self
    }

    /// Default bound for hooks that do not set `timeout_ms`.
    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hooks = self.hooks.with_default_timeout(timeout);
        self
    }

    pub fn with_transport(mut self, transport: impl HookTransport + 'static) -> Self {
        let timeout = self.hooks.default_timeout();
        self.hooks = HookClient::new(transport).with_default_timeout(timeout);
        self
    }

    /// Share a hook client (and its cache) across engines.
    pub fn with_hook_client(mut self, client: HookClient) -> Self {
        self.hooks = client;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn regex_timeout(&self) -> Duration {
        self.regex_timeout
    }

    pub fn hook_client(&self) -> &HookClient {
        &self.hooks
    }

    /// Classify `vars` into an output.
    ///
    /// Regex timeouts and hook failures are returned as errors, never as a
    /// non-match.
    pub async fn evaluate(&self, vars: &Map<String, Value>) -> Result<Decision> {
        if !self.config.enabled {
            return Ok(Decision::Disabled {
                output: self.config.default_output.clone(),
            });
        }
        let Some(limit) = self.timeout else {
            return self.evaluate_routes(vars).await;
        };
        match tokio::time::timeout(limit, self.evaluate_routes(vars)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "Validation timed out");
                Ok(Decision::TimedOut {
                    output: self.config.timeout_output.clone(),
                })
            }
        }
    }

    /// Classify a single captured `value`, exposed to modes as field `value`.
    pub async fn evaluate_value(&self, value: &str) -> Result<Decision> {
        let mut vars = Map::new();
        vars.insert("value".into(), Value::String(value.to_string()));
        self.evaluate(&vars).await
    }

    async fn evaluate_routes(&self, vars: &Map<String, Value>) -> Result<Decision> {
        for (i, route) in self.routes.iter().enumerate() {
            if let Some((output, message)) = self.evaluate_route(route, vars).await? {
                tracing::debug!(route = i, output = %output, "Route matched");
                return Ok(Decision::Matched {
                    route: i,
                    output,
                    message,
                });
            }
            tracing::debug!(route = i, output = %route.output, "Route did not match");
        }
        Ok(Decision::Exhausted {
            output: self.config.default_output.clone(),
        })
    }

    /// `Some((output, message))` when every mode passes. Modes run cheapest
    /// first and the first failure ends the route.
    async fn evaluate_route(
        &self,
        route: &CompiledRoute,
        vars: &Map<String, Value>,
    ) -> Result<Option<(String, Option<String>)>> {
        let normalize = &self.config.normalize;

        for tag in &route.tags {
            let Some(subject) = field_text(vars, &tag.field) else {
                return Ok(None);
            };
            if !tags::matches(tag, &subject, normalize) {
                return Ok(None);
            }
        }

        if let Some(rules) = &route.rules {
            if !evaluate_rules(rules, vars, normalize) {
                return Ok(None);
            }
        }

        if let Some(expr) = &route.expr {
            let resolve = json_resolver(vars);
            if !evaluate_guard(expr, &resolve) {
                return Ok(None);
            }
        }

        for re in &route.regex {
            let Some(subject) = field_text(vars, &re.field) else {
                return Ok(None);
            };
            let subject = normalize.apply(&subject);
            if !supervised_match(&re.regex, subject, self.regex_timeout).await? {
                return Ok(None);
            }
        }

        let mut output = route.output.clone();
        let mut message = None;
        if let Some(hook) = &route.hook {
            let response = self.hooks.call(hook, vars).await?;
            if !response.valid {
                return Ok(None);
            }
            if let Some(route) = response.route.filter(|r| !r.trim().is_empty()) {
                output = route;
            }
            message = response.message;
        }
        Ok(Some((output, message)))
    }
}
