//! Behavior and persistence parsing, shared by every factory.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use flowcert_design::Props;

use crate::props::{self, at, DecodeResult};
use crate::spec::{
    Behavior, DelayBehavior, ExperimentBehavior, ExperimentVariant, FallbackBehavior,
    PersistScope, Persistence, RetryBehavior, Sanitize, TimeoutBehavior, ValidationBehavior,
};

/// A behavior key a node may carry in its props.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    Timeout,
    Validation,
    Retry,
    Fallback,
    Delay,
    Experiment,
    Persistence,
}

/// Prop key for each behavior tag.
pub const BEHAVIOR_KEYS: &[(&str, BehaviorTag)] = &[
    ("timeout", BehaviorTag::Timeout),
    ("validation", BehaviorTag::Validation),
    ("retry", BehaviorTag::Retry),
    ("fallback", BehaviorTag::Fallback),
    ("delay", BehaviorTag::Delay),
    ("experiment", BehaviorTag::Experiment),
    ("persist", BehaviorTag::Persistence),
];

impl BehaviorTag {
    pub fn key(&self) -> &'static str {
        BEHAVIOR_KEYS
            .iter()
            .find(|(_, tag)| tag == self)
            .map(|(key, _)| *key)
            .unwrap_or("unknown")
    }
}

/// Value of a behavior key when it switches the behavior on. `null`, and
/// `false` for `fallback`, leave it off.
fn behavior_value<'a>(props: &'a Props, tag: BehaviorTag) -> Option<&'a Value> {
    props.get(tag.key()).filter(|v| match (tag, v) {
        (_, Value::Null) => false,
        (BehaviorTag::Fallback, Value::Bool(false)) => false,
        _ => true,
    })
}

/// Behavior tags present in a property bag, in declaration order.
pub fn present_behaviors(props: &Props) -> Vec<BehaviorTag> {
    BEHAVIOR_KEYS
        .iter()
        .map(|(_, tag)| *tag)
        .filter(|tag| behavior_value(props, *tag).is_some())
        .collect()
}

/// Parse all behavior sub-configs. Returns `None` when no behavior key is present.
pub fn parse_behavior(props: &Props) -> DecodeResult<Option<Behavior>> {
    let value = |tag| behavior_value(props, tag);
    let behavior = Behavior {
        timeout: at(parse_timeout(value(BehaviorTag::Timeout)), "timeout")?,
        validation: at(parse_validation(value(BehaviorTag::Validation)), "validation")?,
        retry: at(parse_retry(value(BehaviorTag::Retry)), "retry")?,
        fallback: at(parse_fallback(value(BehaviorTag::Fallback)), "fallback")?,
        delay: at(parse_delay(value(BehaviorTag::Delay)), "delay")?,
        experiment: at(parse_experiment(value(BehaviorTag::Experiment)), "experiment")?,
    };
    Ok((!behavior.is_empty()).then_some(behavior))
}

fn parse_timeout(value: Option<&Value>) -> DecodeResult<Option<TimeoutBehavior>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let seconds = n.as_u64().ok_or("seconds must be a non-negative integer")?;
            Ok(Some(TimeoutBehavior {
                seconds,
                output: "timeout".into(),
            }))
        }
        Some(Value::Object(map)) => {
            let seconds = props::get_u64(map, "seconds")?.ok_or("missing required 'seconds'")?;
            let output = props::get_str(map, "output")?.unwrap_or_else(|| "timeout".into());
            Ok(Some(TimeoutBehavior { seconds, output }))
        }
        Some(other) => Err(format!(
            "must be seconds or an object, found {}",
            props::type_name(other)
        )),
    }
}

fn parse_validation(value: Option<&Value>) -> DecodeResult<Option<ValidationBehavior>> {
    let (kind, pattern, message, output) = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(kind)) => (kind.clone(), None, None, None),
        Some(Value::Object(map)) => (
            props::get_str_any(map, &["type", "kind"])?.ok_or("missing required 'type'")?,
            props::get_str(map, "pattern")?,
            props::get_str(map, "message")?,
            props::get_str(map, "output")?,
        ),
        Some(other) => {
            return Err(format!(
                "must be a validator name or an object, found {}",
                props::type_name(other)
            ))
        }
    };

    if kind == "regex" {
        let p = pattern.as_deref().ok_or("regex validation requires 'pattern'")?;
        regex::Regex::new(p).map_err(|e| format!("invalid pattern: {e}"))?;
    }

    Ok(Some(ValidationBehavior {
        kind,
        pattern,
        message,
        output: output.unwrap_or_else(|| "invalid".into()),
    }))
}

fn parse_retry(value: Option<&Value>) -> DecodeResult<Option<RetryBehavior>> {
    let (max_attempts, message) = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => (n.as_u64(), None),
        Some(Value::Object(map)) => (
            props::get_u64(map, "max_attempts")?,
            props::get_str(map, "message")?,
        ),
        Some(other) => {
            return Err(format!(
                "must be a count or an object, found {}",
                props::type_name(other)
            ))
        }
    };
    let max_attempts = match max_attempts {
        Some(n) if n >= 1 => u32::try_from(n).map_err(|_| "max_attempts is too large")?,
        _ => return Err("max_attempts must be at least 1".into()),
    };
    Ok(Some(RetryBehavior {
        max_attempts,
        message,
    }))
}

fn parse_fallback(value: Option<&Value>) -> DecodeResult<Option<FallbackBehavior>> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(FallbackBehavior {
            message: None,
            output: "fallback".into(),
        })),
        Some(Value::String(message)) => Ok(Some(FallbackBehavior {
            message: Some(message.clone()),
            output: "fallback".into(),
        })),
        Some(Value::Object(map)) => Ok(Some(FallbackBehavior {
            message: props::get_str(map, "message")?,
            output: props::get_str(map, "output")?.unwrap_or_else(|| "fallback".into()),
        })),
        Some(other) => Err(format!(
            "must be a message or an object, found {}",
            props::type_name(other)
        )),
    }
}

fn parse_delay(value: Option<&Value>) -> DecodeResult<Option<DelayBehavior>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(secs) if secs >= 0.0 => Ok(Some(DelayBehavior {
                millis: (secs * 1000.0).round() as u64,
            })),
            _ => Err("seconds must be non-negative".into()),
        },
        Some(Value::Object(map)) => {
            let millis = match props::get_u64(map, "ms")? {
                Some(ms) => ms,
                None => props::get_millis_from_seconds(map, "seconds")?
                    .ok_or("missing 'seconds' or 'ms'")?,
            };
            Ok(Some(DelayBehavior { millis }))
        }
        Some(other) => Err(format!(
            "must be seconds or an object, found {}",
            props::type_name(other)
        )),
    }
}

fn parse_experiment(value: Option<&Value>) -> DecodeResult<Option<ExperimentBehavior>> {
    let map = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(format!("must be an object, found {}", props::type_name(other))),
    };
    let name = props::require_str(map, "name")?;
    let raw_variants = props::get_array(map, "variants")?.ok_or("missing required 'variants'")?;
    if raw_variants.is_empty() {
        return Err("'variants' must not be empty".into());
    }

    let mut variants = Vec::with_capacity(raw_variants.len());
    for (i, v) in props::object_items(raw_variants, "variants")?.into_iter().enumerate() {
        let name = at(props::require_str(v, "name"), format!("variants[{i}]"))?;
        let weight = at(props::get_u64(v, "weight"), format!("variants[{i}]"))?.unwrap_or(1);
        variants.push(ExperimentVariant {
            name,
            weight: u32::try_from(weight).map_err(|_| format!("variants[{i}]: weight is too large"))?,
        });
    }
    if variants.iter().all(|v| v.weight == 0) {
        return Err("at least one variant needs a positive weight".into());
    }

    Ok(Some(ExperimentBehavior { name, variants }))
}

/// Parse the `persist` key. A bare string is shorthand for a context-scoped key.
pub fn parse_persistence(props: &Props) -> DecodeResult<Option<Persistence>> {
    let persistence = match props.get("persist") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(key)) => Persistence {
            scope: PersistScope::Context,
            key: key.clone(),
            sanitize: Sanitize::None,
            required: false,
            declared: false,
        },
        Some(Value::Object(map)) => {
            let scope = match map.get("scope") {
                None | Some(Value::Null) => PersistScope::Context,
                Some(v) => serde_json::from_value(v.clone())
                    .map_err(|_| format!("persist: unknown scope {v}"))?,
            };
            let sanitize = match map.get("sanitize") {
                None | Some(Value::Null) => Sanitize::None,
                Some(v) => serde_json::from_value(v.clone())
                    .map_err(|_| format!("persist: unknown sanitize rule {v}"))?,
            };
            Persistence {
                scope,
                key: at(props::require_str(map, "key"), "persist")?,
                sanitize,
                required: at(props::get_bool(map, "required"), "persist")?.unwrap_or(false),
                declared: false,
            }
        }
        Some(other) => {
            return Err(format!(
                "persist: must be a key or an object, found {}",
                props::type_name(other)
            ))
        }
    };

    if persistence.key.trim().is_empty() {
        return Err("persist: key must not be empty".into());
    }
    Ok(Some(persistence))
}
