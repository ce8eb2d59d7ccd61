//! Guard expression language: parser and evaluator.
//!
//! Grammar:
//! ```text
//! GuardExpr    ::= Conjunction ( '||' Conjunction )*
//! Conjunction  ::= Clause ( '&&' Clause )*
//! Clause       ::= Key Operator Literal | '!'? Key
//! Key          ::= identifier ( '.' identifier )*
//! Operator     ::= '==' | '=' | '!=' | '>' | '>=' | '<' | '<='
//! Literal      ::= QuotedString | BareWord | Number | Boolean
//! ```

use flowcert_types::FlowError;

/// A parsed guard: a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardExpr {
    pub any_of: Vec<Vec<Clause>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare {
        key: String,
        operator: Operator,
        value: String,
    },
    /// Bare key: true when the resolved value is truthy. `negated` for `!key`.
    Truthy { key: String, negated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parse a guard string into a [`GuardExpr`].
///
/// An empty or whitespace-only input produces an expression with no
/// alternatives, which [`evaluate_guard`] treats as always true.
pub fn parse_guard(input: &str) -> Result<GuardExpr, FlowError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(GuardExpr { any_of: Vec::new() });
    }

    let mut any_of = Vec::new();
    for disjunct in split_outside_quotes(trimmed, "||") {
        let mut clauses = Vec::new();
        for part in split_outside_quotes(disjunct, "&&") {
            clauses.push(parse_clause(part.trim())?);
        }
        any_of.push(clauses);
    }

    Ok(GuardExpr { any_of })
}

/// Split on `sep`, ignoring occurrences inside quoted literals.
fn split_outside_quotes<'a>(input: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if input[i..].starts_with(sep) => {
                parts.push(&input[start..i]);
                start = i + sep.len();
                for _ in 1..sep.chars().count() {
                    chars.next();
                }
            }
            None => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_clause(input: &str) -> Result<Clause, FlowError> {
    if input.is_empty() {
        return Err(make_error("empty clause"));
    }

    let Some((key_end, operator, op_len)) = find_operator(input) else {
        let (negated, key) = match input.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, input),
        };
        validate_key(key)?;
        return Ok(Clause::Truthy {
            key: key.to_string(),
            negated,
        });
    };

    let key = input[..key_end].trim();
    if key.is_empty() {
        return Err(make_error("missing key before operator"));
    }
    validate_key(key)?;

    let raw_value = input[key_end + op_len..].trim();
    if raw_value.is_empty() {
        return Err(make_error(&format!("missing value after operator in '{input}'")));
    }

    Ok(Clause::Compare {
        key: key.to_string(),
        operator,
        value: strip_quotes(raw_value),
    })
}

fn validate_key(key: &str) -> Result<(), FlowError> {
    if key.is_empty() {
        return Err(make_error("missing key"));
    }
    for seg in key.split('.') {
        if seg.is_empty() || !seg.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(make_error(&format!("invalid key segment: '{seg}'")));
        }
    }
    Ok(())
}

fn find_operator(input: &str) -> Option<(usize, Operator, usize)> {
    // Scan for the first operator, skipping quoted regions.
    let bytes = input.as_bytes();
    let next = |i: usize| bytes.get(i + 1).copied();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            b'!' if next(i) == Some(b'=') => return Some((i, Operator::NotEq, 2)),
            b'=' if next(i) == Some(b'=') => return Some((i, Operator::Eq, 2)),
            b'=' => return Some((i, Operator::Eq, 1)),
            b'>' if next(i) == Some(b'=') => return Some((i, Operator::Gte, 2)),
            b'>' => return Some((i, Operator::Gt, 1)),
            b'<' if next(i) == Some(b'=') => return Some((i, Operator::Lte, 2)),
            b'<' => return Some((i, Operator::Lt, 1)),
            _ => i += 1,
        }
    }
    None
}

fn strip_quotes(s: &str) -> String {
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
        {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn make_error(msg: &str) -> FlowError {
    FlowError::Guard(format!("parse error: {msg}"))
}

/// Evaluate a guard against values provided by a resolver function.
///
/// The `resolve` function maps a dotted key to its string value. Keys not
/// found should resolve to an empty string. Ordering operators compare
/// numerically when both sides parse as numbers, lexically otherwise.
pub fn evaluate_guard(expr: &GuardExpr, resolve: &dyn Fn(&str) -> String) -> bool {
    if expr.any_of.is_empty() {
        return true;
    }

    expr.any_of
        .iter()
        .any(|clauses| clauses.iter().all(|clause| evaluate_clause(clause, resolve)))
}

fn evaluate_clause(clause: &Clause, resolve: &dyn Fn(&str) -> String) -> bool {
    match clause {
        Clause::Truthy { key, negated } => is_truthy(&resolve(key)) != *negated,
        Clause::Compare {
            key,
            operator,
            value,
        } => {
            let actual = resolve(key);
            let ordering = match (actual.trim().parse::<f64>(), value.trim().parse::<f64>()) {
                (Ok(a), Ok(b)) => a.partial_cmp(&b),
                _ => Some(actual.as_str().cmp(value.as_str())),
            };
            let Some(ordering) = ordering else {
                return false;
            };
            match operator {
                Operator::Eq => ordering.is_eq(),
                Operator::NotEq => ordering.is_ne(),
                Operator::Gt => ordering.is_gt(),
                Operator::Gte => ordering.is_ge(),
                Operator::Lt => ordering.is_lt(),
                Operator::Lte => ordering.is_le(),
            }
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "false" | "0" | "null")
}

/// Build a resolver over a JSON variable bag. Dotted keys walk nested
/// objects; strings resolve unquoted, other scalars through their JSON form.
pub fn json_resolver(vars: &serde_json::Map<String, serde_json::Value>) -> impl Fn(&str) -> String + '_ {
    move |key: &str| match lookup_path(vars, key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Look up a dotted path (`user.address.city`) in a JSON object.
pub fn lookup_path<'a>(
    vars: &'a serde_json::Map<String, serde_json::Value>,
    path: &str,
) -> Option<&'a serde_json::Value> {
    let mut segments = path.split('.');
    let mut current = vars.get(segments.next()?)?;
    for seg in segments {
        current = match current {
            serde_json::Value::Object(map) => map.get(seg)?,
            serde_json::Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn simple_resolve(answer: &str) -> impl Fn(&str) -> String + '_ {
        move |key: &str| match key {
            "answer" => answer.to_string(),
            "user.age" => "42".to_string(),
            "state.retries" => "3".to_string(),
            "flags.vip" => "true".to_string(),
            _ => String::new(),
        }
    }

    #[test]
    fn simple_equality() {
        let expr = parse_guard("answer == yes").unwrap();
        assert_eq!(expr.any_of.len(), 1);
        assert_eq!(
            expr.any_of[0][0],
            Clause::Compare {
                key: "answer".into(),
                operator: Operator::Eq,
                value: "yes".into()
            }
        );
        assert!(evaluate_guard(&expr, &simple_resolve("yes")));
        assert!(!evaluate_guard(&expr, &simple_resolve("no")));
    }

    #[test]
    fn single_equals_is_equality() {
        let expr = parse_guard("answer=yes").unwrap();
        assert!(evaluate_guard(&expr, &simple_resolve("yes")));
    }

    #[test]
    fn numeric_ordering() {
        let expr = parse_guard("user.age >= 18").unwrap();
        assert!(evaluate_guard(&expr, &simple_resolve("")));

        let expr = parse_guard("state.retries < 3").unwrap();
        assert!(!evaluate_guard(&expr, &simple_resolve("")));

        // "42" > "100" lexically, but numerically it is not
        let expr = parse_guard("user.age > 100").unwrap();
        assert!(!evaluate_guard(&expr, &simple_resolve("")));
    }

    #[test]
    fn conjunction_and_disjunction() {
        let expr = parse_guard("answer == yes && user.age > 18 || flags.vip").unwrap();
        assert_eq!(expr.any_of.len(), 2);
        assert!(evaluate_guard(&expr, &simple_resolve("no"))); // vip branch
        let expr = parse_guard("answer == yes && state.retries < 2").unwrap();
        assert!(!evaluate_guard(&expr, &simple_resolve("yes")));
    }

    #[test]
    fn truthy_and_negated_keys() {
        let expr = parse_guard("flags.vip").unwrap();
        assert!(evaluate_guard(&expr, &simple_resolve("")));
        let expr = parse_guard("!flags.vip").unwrap();
        assert!(!evaluate_guard(&expr, &simple_resolve("")));
        let expr = parse_guard("!missing.key").unwrap();
        assert!(evaluate_guard(&expr, &simple_resolve("")));
    }

    #[test]
    fn empty_guard_always_true() {
        let expr = parse_guard("   ").unwrap();
        assert!(expr.any_of.is_empty());
        assert!(evaluate_guard(&expr, &simple_resolve("anything")));
    }

    #[test]
    fn quoted_values_keep_operators() {
        let expr = parse_guard(r#"answer == "a>=b""#).unwrap();
        assert!(evaluate_guard(&expr, &simple_resolve("a>=b")));
    }

    #[test]
    fn quoted_values_keep_logical_operators() {
        let expr = parse_guard(r#"answer == "a||b" && flags.vip == 'x&&y' || answer == "c""#).unwrap();
        assert_eq!(expr.any_of.len(), 2);
        assert_eq!(expr.any_of[0].len(), 2);
        assert_eq!(
            expr.any_of[0][0],
            Clause::Compare {
                key: "answer".into(),
                operator: Operator::Eq,
                value: "a||b".into(),
            }
        );
        assert!(evaluate_guard(&parse_guard(r#"answer == "a||b""#).unwrap(), &simple_resolve("a||b")));
        assert!(evaluate_guard(&expr, &simple_resolve("c")));
    }

    #[test]
    fn parse_errors() {
        assert!(parse_guard("answer ==").is_err());
        assert!(parse_guard("== yes").is_err());
        assert!(parse_guard("answer == yes && ").is_err());
        assert!(parse_guard("bad key == 1").is_err());
        assert!(parse_guard("a..b").is_err());
    }

    #[test]
    fn json_resolver_walks_nested_objects() {
        let vars = json!({
            "user": {"name": "Ana", "tags": ["a", "b"], "age": 30},
            "ok": true
        });
        let map = vars.as_object().unwrap();
        let resolve = json_resolver(map);
        assert_eq!(resolve("user.name"), "Ana");
        assert_eq!(resolve("user.age"), "30");
        assert_eq!(resolve("user.tags.1"), "b");
        assert_eq!(resolve("ok"), "true");
        assert_eq!(resolve("user.missing"), "");

        let expr = parse_guard("user.age > 18 && ok").unwrap();
        assert!(evaluate_guard(&expr, &resolve));
    }
}
