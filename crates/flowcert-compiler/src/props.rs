//! Typed extraction helpers over untyped property bags.
//!
//! Absent keys yield `None`; present keys of the wrong shape are decode
//! errors, reported as plain messages that the factory wraps.

use flowcert_design::Props;
use serde_json::Value;

pub(crate) type DecodeResult<T> = std::result::Result<T, String>;

pub(crate) fn get_str(props: &Props, key: &str) -> DecodeResult<Option<String>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("'{key}' must be a string, found {}", type_name(other))),
    }
}

pub(crate) fn require_str(props: &Props, key: &str) -> DecodeResult<String> {
    get_str(props, key)?.ok_or_else(|| format!("missing required '{key}'"))
}

/// First present string among `keys`, e.g. `label` falling back to `text`.
pub(crate) fn get_str_any(props: &Props, keys: &[&str]) -> DecodeResult<Option<String>> {
    for key in keys {
        if let Some(s) = get_str(props, key)? {
            return Ok(Some(s));
        }
    }
    Ok(None)
}

pub(crate) fn get_bool(props: &Props, key: &str) -> DecodeResult<Option<bool>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(format!("'{key}' must be a boolean, found {}", type_name(other))),
    }
}

pub(crate) fn get_u64(props: &Props, key: &str) -> DecodeResult<Option<u64>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("'{key}' must be a non-negative integer")),
        Some(other) => Err(format!("'{key}' must be a number, found {}", type_name(other))),
    }
}

/// Seconds as a non-negative number; fractional values are kept in millis.
pub(crate) fn get_millis_from_seconds(props: &Props, key: &str) -> DecodeResult<Option<u64>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(secs) if secs >= 0.0 => Ok(Some((secs * 1000.0).round() as u64)),
            _ => Err(format!("'{key}' must be a non-negative number of seconds")),
        },
        Some(other) => Err(format!("'{key}' must be a number, found {}", type_name(other))),
    }
}

pub(crate) fn get_array<'a>(props: &'a Props, key: &str) -> DecodeResult<Option<&'a Vec<Value>>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(format!("'{key}' must be an array, found {}", type_name(other))),
    }
}

pub(crate) fn get_object<'a>(props: &'a Props, key: &str) -> DecodeResult<Option<&'a Props>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(format!("'{key}' must be an object, found {}", type_name(other))),
    }
}

/// Items of an array of objects, each paired with its index for messages.
pub(crate) fn object_items<'a>(items: &'a [Value], key: &str) -> DecodeResult<Vec<&'a Props>> {
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_object()
                .ok_or_else(|| format!("'{key}[{i}]' must be an object, found {}", type_name(v)))
        })
        .collect()
}

/// Prefix a nested decode error with its location.
pub(crate) fn at<T>(result: DecodeResult<T>, location: impl std::fmt::Display) -> DecodeResult<T> {
    result.map_err(|e| format!("{location}: {e}"))
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> Props {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn string_extraction() {
        let p = props(json!({"text": "hi", "n": 3}));
        assert_eq!(get_str(&p, "text").unwrap().as_deref(), Some("hi"));
        assert_eq!(get_str(&p, "missing").unwrap(), None);
        assert!(get_str(&p, "n").unwrap_err().contains("must be a string"));
        assert!(require_str(&p, "missing").unwrap_err().contains("missing required"));
    }

    #[test]
    fn fallback_keys() {
        let p = props(json!({"text": "Yes"}));
        assert_eq!(get_str_any(&p, &["label", "text"]).unwrap().as_deref(), Some("Yes"));
    }

    #[test]
    fn numeric_extraction() {
        let p = props(json!({"a": 5, "b": -1, "c": 1.5, "s": "5"}));
        assert_eq!(get_u64(&p, "a").unwrap(), Some(5));
        assert!(get_u64(&p, "b").is_err());
        assert!(get_u64(&p, "s").is_err());
        assert_eq!(get_millis_from_seconds(&p, "c").unwrap(), Some(1500));
        assert!(get_millis_from_seconds(&p, "b").is_err());
    }

    #[test]
    fn null_is_absent() {
        let p = props(json!({"text": null, "flag": null}));
        assert_eq!(get_str(&p, "text").unwrap(), None);
        assert_eq!(get_bool(&p, "flag").unwrap(), None);
    }

    #[test]
    fn object_items_reject_scalars() {
        let items = vec![json!({"id": "a"}), json!(3)];
        let err = object_items(&items, "buttons").unwrap_err();
        assert_eq!(err, "'buttons[1]' must be an object, found number");
    }

    #[test]
    fn at_prefixes_location() {
        let r: DecodeResult<()> = Err("boom".into());
        assert_eq!(at(r, "cards[2]").unwrap_err(), "cards[2]: boom");
    }
}
