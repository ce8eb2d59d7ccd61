//! Canonical, adapter-agnostic view of a compiled node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::template::{self, TemplateExpr};

/// A text field as written in the design, plus detected template metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextValue {
    pub raw: String,
    #[serde(default)]
    pub template: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<TemplateExpr>,
}

impl TextValue {
    /// Untemplated text. No scanning is performed.
    pub fn literal(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            template: false,
            expressions: Vec::new(),
        }
    }

    /// Scan `raw` and tag it as templated when it contains template blocks.
    pub fn scanned(raw: impl Into<String>) -> flowcert_types::Result<Self> {
        let raw = raw.into();
        if !template::contains_template(&raw) {
            return Ok(Self::literal(raw));
        }
        let expressions = template::scan(&raw)?;
        Ok(Self {
            template: !expressions.is_empty(),
            raw,
            expressions,
        })
    }

    pub fn char_len(&self) -> usize {
        self.raw.chars().count()
    }

    /// Characters outside template blocks.
    pub fn literal_len(&self) -> usize {
        template::literal_len(&self.raw, &self.expressions)
    }

    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.expressions
            .iter()
            .flat_map(|e| e.filters.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Reply,
    Url,
    Call,
}

impl ButtonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonKind::Reply => "reply",
            ButtonKind::Url => "url",
            ButtonKind::Call => "call",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub label: TextValue,
    /// Reply payload, URL, or phone number depending on `kind`.
    pub payload: String,
    pub kind: ButtonKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: String,
    pub title: TextValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<TextValue>,
    pub items: Vec<ListItem>,
}

/// List-picker content: an opener button and grouped items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListView {
    pub button_label: TextValue,
    pub sections: Vec<ListSection>,
}

impl ListView {
    pub fn item_count(&self) -> usize {
        self.sections.iter().map(|s| s.items.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub title: TextValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

/// Reference to a pre-approved structured template (HSM).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub params: Vec<TextValue>,
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Optional execution-time policies. Every sub-config is independent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<DelayBehavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment: Option<ExperimentBehavior>,
}

impl Behavior {
    pub fn is_empty(&self) -> bool {
        self.timeout.is_none()
            && self.validation.is_none()
            && self.retry.is_none()
            && self.fallback.is_none()
            && self.delay.is_none()
            && self.experiment.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutBehavior {
    pub seconds: u64,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationBehavior {
    /// `regex`, `email`, `phone`, `number`, `date`, or a custom validator name.
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBehavior {
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackBehavior {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayBehavior {
    pub millis: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentBehavior {
    pub name: String,
    pub variants: Vec<ExperimentVariant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentVariant {
    pub name: String,
    pub weight: u32,
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistScope {
    Context,
    /// Long-lived per-user state. `profile` is accepted as an alias.
    #[serde(alias = "profile")]
    State,
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sanitize {
    #[default]
    None,
    Trim,
    Lowercase,
    Digits,
    Email,
}

/// Where and under which key a captured value is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persistence {
    pub scope: PersistScope,
    pub key: String,
    #[serde(default)]
    pub sanitize: Sanitize,
    #[serde(default)]
    pub required: bool,
    /// Whether the key is declared in the design profile.
    #[serde(default)]
    pub declared: bool,
}

// ---------------------------------------------------------------------------
// ComponentSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<TextValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cards: Vec<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<Persistence>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// Every text value carried by the spec, labeled by field.
    pub fn text_fields(&self) -> Vec<(String, &TextValue)> {
        let mut fields = Vec::new();
        if let Some(t) = &self.text {
            fields.push(("text".to_string(), t));
        }
        if let Some(t) = &self.header {
            fields.push(("header".to_string(), t));
        }
        if let Some(t) = &self.footer {
            fields.push(("footer".to_string(), t));
        }
        for (i, b) in self.buttons.iter().enumerate() {
            fields.push((format!("buttons[{i}].label"), &b.label));
        }
        if let Some(list) = &self.list {
            fields.push(("list.button_label".to_string(), &list.button_label));
            for (s, section) in list.sections.iter().enumerate() {
                if let Some(t) = &section.title {
                    fields.push((format!("list.sections[{s}].title"), t));
                }
                for (i, item) in section.items.iter().enumerate() {
                    fields.push((format!("list.sections[{s}].items[{i}].title"), &item.title));
                    if let Some(d) = &item.description {
                        fields.push((format!("list.sections[{s}].items[{i}].description"), d));
                    }
                }
            }
        }
        for (c, card) in self.cards.iter().enumerate() {
            fields.push((format!("cards[{c}].title"), &card.title));
            if let Some(d) = &card.description {
                fields.push((format!("cards[{c}].description"), d));
            }
            for (i, b) in card.buttons.iter().enumerate() {
                fields.push((format!("cards[{c}].buttons[{i}].label"), &b.label));
            }
        }
        if let Some(tpl) = &self.template {
            for (i, p) in tpl.params.iter().enumerate() {
                fields.push((format!("template.params[{i}]"), p));
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_text_is_not_templated() {
        let t = TextValue::scanned("Just words").unwrap();
        assert!(!t.template);
        assert!(t.expressions.is_empty());
        assert_eq!(t.char_len(), 10);
        assert_eq!(t.literal_len(), 10);
    }

    #[test]
    fn scanned_text_keeps_raw() {
        let raw = "Oi {{ user.name | title }}, tudo bem?";
        let t = TextValue::scanned(raw).unwrap();
        assert!(t.template);
        assert_eq!(t.raw, raw);
        assert_eq!(t.filters().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn scanned_text_propagates_scan_errors() {
        assert!(TextValue::scanned("{{ oops").is_err());
    }

    #[test]
    fn behavior_emptiness() {
        assert!(Behavior::default().is_empty());
        let b = Behavior {
            delay: Some(DelayBehavior { millis: 500 }),
            ..Default::default()
        };
        assert!(!b.is_empty());
    }

    #[test]
    fn persist_scope_accepts_profile_alias() {
        let s: PersistScope = serde_json::from_str("\"profile\"").unwrap();
        assert_eq!(s, PersistScope::State);
    }

    #[test]
    fn text_fields_cover_buttons_and_template_params() {
        let mut spec = ComponentSpec::new("buttons");
        spec.text = Some(TextValue::literal("Pick one"));
        spec.buttons.push(Button {
            label: TextValue::literal("A"),
            payload: "a".into(),
            kind: ButtonKind::Reply,
        });
        spec.template = Some(TemplateRef {
            name: "order_update".into(),
            language: None,
            params: vec![TextValue::literal("p0")],
        });
        let names: Vec<_> = spec.text_fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["text", "buttons[0].label", "template.params[0]"]);
    }
}
