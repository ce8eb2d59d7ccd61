//! Template expression scanner.
//!
//! Detects `{{ output }}`, `{% statement %}` and `{# comment #}` blocks in
//! text fields and records the variables and filters each one uses. Nothing
//! is evaluated or rendered here.

use std::collections::HashSet;

use flowcert_types::FlowError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Output,
    Statement,
    Comment,
}

/// One template block found in a text value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExpr {
    pub kind: ExprKind,
    /// Source text including delimiters.
    pub raw: String,
    /// Trimmed content between the delimiters.
    pub body: String,
    /// Byte offset of the opening delimiter in the scanned text.
    pub offset: usize,
    /// Dotted variable paths referenced by the block, in order of appearance.
    pub variables: Vec<String>,
    /// Filter names applied with `|`, in order of appearance.
    pub filters: Vec<String>,
}

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "elif", "endif", "for", "endfor", "set",
    "endset", "true", "false", "none", "null", "True", "False", "None", "with", "endwith",
    "macro", "endmacro", "raw", "endraw",
];

/// `true` when the text contains template syntax worth scanning.
///
/// `{#` only counts when a `#}` closes it, so literal text such as
/// `Pedido {#42` stays plain.
pub fn contains_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || has_comment(text)
}

fn has_comment(text: &str) -> bool {
    text.find("{#").is_some_and(|start| text[start + 2..].contains("#}"))
}

/// Scan `text` for template blocks.
///
/// Fails on an unterminated `{{` or `{%` block or an empty `{{ }}` output.
/// An unclosed `{#` is literal text.
pub fn scan(text: &str) -> Result<Vec<TemplateExpr>, FlowError> {
    let mut exprs = Vec::new();
    let mut bound: HashSet<String> = HashSet::new();
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        let rest = &text[start..];
        let (kind, close) = if rest.starts_with("{{") {
            (ExprKind::Output, "}}")
        } else if rest.starts_with("{%") {
            (ExprKind::Statement, "%}")
        } else if rest.starts_with("{#") {
            (ExprKind::Comment, "#}")
        } else {
            pos = start + 1;
            continue;
        };

        let inner_start = start + 2;
        let Some(close_rel) = text[inner_start..].find(close) else {
            if kind == ExprKind::Comment {
                pos = inner_start;
                continue;
            }
            return Err(FlowError::TemplateScan {
                offset: start,
                message: format!("unterminated block, expected '{close}'"),
            });
        };
        let end = inner_start + close_rel + close.len();
        let body = text[inner_start..inner_start + close_rel]
            .trim()
            .trim_matches('-')
            .trim()
            .to_string();

        if kind == ExprKind::Output && body.is_empty() {
            return Err(FlowError::TemplateScan {
                offset: start,
                message: "empty output expression".into(),
            });
        }

        let (variables, filters) = match kind {
            ExprKind::Comment => (Vec::new(), Vec::new()),
            _ => analyze_body(&body, kind, &mut bound),
        };

        exprs.push(TemplateExpr {
            kind,
            raw: text[start..end].to_string(),
            body,
            offset: start,
            variables,
            filters,
        });
        pos = end;
    }

    Ok(exprs)
}

/// Number of characters outside template blocks.
pub fn literal_len(text: &str, exprs: &[TemplateExpr]) -> usize {
    let template_chars: usize = exprs.iter().map(|e| e.raw.chars().count()).sum();
    text.chars().count().saturating_sub(template_chars)
}

fn analyze_body(body: &str, kind: ExprKind, bound: &mut HashSet<String>) -> (Vec<String>, Vec<String>) {
    let segments = split_pipes(body);
    let mut filters = Vec::new();
    let mut tokens = Vec::new();

    for (i, seg) in segments.iter().enumerate() {
        let mut seg_tokens = identifiers(seg);
        if i > 0 {
            // The leading identifier of a piped segment is the filter name.
            if let Some(first) = seg_tokens.first() {
                if !first.path.contains('.') {
                    filters.push(first.path.clone());
                    seg_tokens.remove(0);
                }
            }
        }
        tokens.extend(seg_tokens);
    }

    if kind == ExprKind::Statement {
        bind_names(&tokens, bound);
    }

    let mut variables: Vec<String> = Vec::new();
    for token in tokens {
        if token.is_call || KEYWORDS.contains(&token.path.as_str()) {
            continue;
        }
        let root = token.path.split('.').next().unwrap_or_default();
        if bound.contains(root) || variables.contains(&token.path) {
            continue;
        }
        variables.push(token.path);
    }

    (variables, filters)
}

/// `for a, b in ...` and `set x = ...` introduce names local to the template.
fn bind_names(tokens: &[Token], bound: &mut HashSet<String>) {
    let Some(first) = tokens.first() else { return };
    match first.path.as_str() {
        "for" => {
            for token in tokens[1..].iter().take_while(|t| t.path != "in") {
                bound.insert(token.path.clone());
            }
        }
        "set" => {
            if let Some(name) = tokens.get(1) {
                bound.insert(name.path.clone());
            }
        }
        _ => {}
    }
}

fn split_pipes(body: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                '|' if chars.peek() == Some(&'|') => {
                    chars.next();
                    current.push_str("||");
                }
                '|' => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    segments.push(current);
    segments
}

struct Token {
    path: String,
    is_call: bool,
}

fn identifiers(segment: &str) -> Vec<Token> {
    let chars: Vec<char> = segment.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            let path: String = chars[start..i].iter().collect::<String>().trim_end_matches('.').to_string();
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let is_call = chars.get(j) == Some(&'(');
            tokens.push(Token { path, is_call });
            continue;
        }
        i += 1;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_expressions() {
        assert!(!contains_template("Hello there {not a template}"));
        assert!(scan("Hello there {x}").unwrap().is_empty());
    }

    #[test]
    fn output_expression_records_variable_and_filters() {
        let exprs = scan("Hi {{ user.name | upper | default('friend') }}!").unwrap();
        assert_eq!(exprs.len(), 1);
        let e = &exprs[0];
        assert_eq!(e.kind, ExprKind::Output);
        assert_eq!(e.body, "user.name | upper | default('friend')");
        assert_eq!(e.variables, vec!["user.name"]);
        assert_eq!(e.filters, vec!["upper", "default"]);
        assert_eq!(e.offset, 3);
    }

    #[test]
    fn statements_bind_loop_names() {
        let text = "{% for item in cart.items %}{{ item.title }} x{{ item.qty }}{% endfor %}";
        let exprs = scan(text).unwrap();
        assert_eq!(exprs.len(), 4);
        assert_eq!(exprs[0].kind, ExprKind::Statement);
        assert_eq!(exprs[0].variables, vec!["cart.items"]);
        assert!(exprs[1].variables.is_empty());
        assert!(exprs[2].variables.is_empty());
    }

    #[test]
    fn set_statement_binds_name() {
        let exprs = scan("{% set total = order.total | round %}{{ total }}").unwrap();
        assert_eq!(exprs[0].variables, vec!["order.total"]);
        assert_eq!(exprs[0].filters, vec!["round"]);
        assert!(exprs[1].variables.is_empty());
    }

    #[test]
    fn conditionals_skip_keywords_and_literals() {
        let exprs = scan("{% if user.age > 18 and not user.blocked %}ok{% endif %}").unwrap();
        assert_eq!(exprs[0].variables, vec!["user.age", "user.blocked"]);
        assert!(exprs[1].variables.is_empty());
    }

    #[test]
    fn function_calls_are_not_variables() {
        let exprs = scan("{{ now() | date('%d/%m') }}").unwrap();
        assert!(exprs[0].variables.is_empty());
        assert_eq!(exprs[0].filters, vec!["date"]);
    }

    #[test]
    fn comments_are_recorded_without_variables() {
        let exprs = scan("a{# note about user.name #}b").unwrap();
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].kind, ExprKind::Comment);
        assert!(exprs[0].variables.is_empty());
        assert_eq!(literal_len("a{# note about user.name #}b", &exprs), 2);
    }

    #[test]
    fn logical_or_is_not_a_filter() {
        let exprs = scan("{{ a || b }}").unwrap();
        assert!(exprs[0].filters.is_empty());
        assert_eq!(exprs[0].variables, vec!["a", "b"]);
    }

    #[test]
    fn unterminated_block_is_error() {
        let err = scan("Hello {{ user.name").unwrap_err();
        match err {
            FlowError::TemplateScan { offset, .. } => assert_eq!(offset, 6),
            other => panic!("unexpected error: {other}"),
        }
        assert!(scan("{% if x").is_err());
    }

    #[test]
    fn unclosed_hash_brace_is_literal() {
        assert!(!contains_template("Pedido {#42}"));
        assert!(scan("Pedido {#42}").unwrap().is_empty());

        let exprs = scan("Pedido {#42} para {{ user.name }}").unwrap();
        assert_eq!(exprs.len(), 1);
        assert_eq!(exprs[0].kind, ExprKind::Output);
        assert_eq!(exprs[0].variables, vec!["user.name"]);
    }

    #[test]
    fn empty_output_is_error() {
        assert!(scan("{{   }}").is_err());
        // Empty statements are tolerated
        assert!(scan("{% %}").is_ok());
    }

    #[test]
    fn literal_len_excludes_blocks() {
        let text = "Olá {{ name }}, até logo";
        let exprs = scan(text).unwrap();
        assert_eq!(literal_len(text, &exprs), text.chars().count() - "{{ name }}".len());
    }

    #[test]
    fn whitespace_control_markers_are_trimmed() {
        let exprs = scan("{{- user.name -}}").unwrap();
        assert_eq!(exprs[0].body, "user.name");
    }
}
