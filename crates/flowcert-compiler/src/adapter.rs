//! Channel adapter boundary.
//!
//! An adapter exposes its channel's [`Capabilities`] and a content-neutral
//! transform: it may tag metadata and drop unsupported sub-elements, but
//! never alters or truncates text.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use flowcert_types::Result;

use crate::spec::{ButtonKind, ComponentSpec};

/// Declared limits and features of a target channel. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub max_text_len: Option<usize>,
    #[serde(default)]
    pub max_buttons: Option<usize>,
    #[serde(default)]
    pub max_list_items: Option<usize>,
    #[serde(default)]
    pub max_list_sections: Option<usize>,
    #[serde(default)]
    pub max_button_len: Option<usize>,
    #[serde(default)]
    pub max_description_len: Option<usize>,
    #[serde(default)]
    pub max_header_len: Option<usize>,
    #[serde(default)]
    pub max_footer_len: Option<usize>,
    #[serde(default)]
    pub supports_hsm: bool,
    #[serde(default)]
    pub supports_rich_text: bool,
    #[serde(default)]
    pub supports_carousel: bool,
    #[serde(default)]
    pub supports_list_picker: bool,
    #[serde(default = "default_button_kinds")]
    pub button_kinds: BTreeSet<ButtonKind>,
}

fn default_button_kinds() -> BTreeSet<ButtonKind> {
    BTreeSet::from([ButtonKind::Reply])
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_text_len: None,
            max_buttons: None,
            max_list_items: None,
            max_list_sections: None,
            max_button_len: None,
            max_description_len: None,
            max_header_len: None,
            max_footer_len: None,
            supports_hsm: false,
            supports_rich_text: false,
            supports_carousel: false,
            supports_list_picker: false,
            button_kinds: default_button_kinds(),
        }
    }
}

impl Capabilities {
    pub fn supports_button(&self, kind: ButtonKind) -> bool {
        self.button_kinds.contains(&kind)
    }
}

pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> &Capabilities;

    /// Adapt a canonical spec to the channel.
    fn transform(&self, spec: ComponentSpec) -> Result<ComponentSpec>;
}

// ---------------------------------------------------------------------------
// StaticAdapter
// ---------------------------------------------------------------------------

/// Adapter driven entirely by a fixed capability table.
#[derive(Debug, Clone)]
pub struct StaticAdapter {
    name: String,
    capabilities: Capabilities,
}

impl StaticAdapter {
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }

    /// WhatsApp Business limits.
    pub fn whatsapp() -> Self {
        Self::new(
            "whatsapp",
            Capabilities {
                max_text_len: Some(4096),
                max_buttons: Some(3),
                max_list_items: Some(10),
                max_list_sections: Some(10),
                max_button_len: Some(20),
                max_description_len: Some(72),
                max_header_len: Some(60),
                max_footer_len: Some(60),
                supports_hsm: true,
                supports_rich_text: false,
                supports_carousel: false,
                supports_list_picker: true,
                button_kinds: BTreeSet::from([ButtonKind::Reply, ButtonKind::Url, ButtonKind::Call]),
            },
        )
    }

    /// Embedded web chat widget.
    pub fn webchat() -> Self {
        Self::new(
            "webchat",
            Capabilities {
                max_text_len: Some(10_000),
                max_buttons: Some(10),
                max_list_items: Some(50),
                max_list_sections: Some(10),
                max_button_len: Some(64),
                max_description_len: Some(256),
                max_header_len: Some(256),
                max_footer_len: Some(256),
                supports_hsm: false,
                supports_rich_text: true,
                supports_carousel: true,
                supports_list_picker: true,
                button_kinds: BTreeSet::from([ButtonKind::Reply, ButtonKind::Url]),
            },
        )
    }
}

impl Adapter for StaticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn transform(&self, mut spec: ComponentSpec) -> Result<ComponentSpec> {
        spec.meta.insert("channel".into(), json!(self.name));

        let caps = &self.capabilities;
        let mut dropped: Vec<&'static str> = Vec::new();
        spec.buttons.retain(|b| {
            let keep = caps.supports_button(b.kind);
            if !keep {
                dropped.push(b.kind.as_str());
            }
            keep
        });
        for card in &mut spec.cards {
            card.buttons.retain(|b| {
                let keep = caps.supports_button(b.kind);
                if !keep {
                    dropped.push(b.kind.as_str());
                }
                keep
            });
        }
        if !dropped.is_empty() {
            tracing::debug!(adapter = %self.name, dropped = dropped.len(), "Dropped unsupported buttons");
            spec.meta.insert("dropped_buttons".into(), json!(dropped));
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Button, TextValue};

    fn button(label: &str, kind: ButtonKind) -> Button {
        Button {
            label: TextValue::literal(label),
            payload: label.to_lowercase(),
            kind,
        }
    }

    #[test]
    fn transform_tags_channel_and_keeps_text() {
        let mut spec = ComponentSpec::new("message");
        spec.text = Some(TextValue::literal("x".repeat(5000)));
        let out = StaticAdapter::whatsapp().transform(spec.clone()).unwrap();
        assert_eq!(out.meta["channel"], "whatsapp");
        assert_eq!(out.text, spec.text);
    }

    #[test]
    fn transform_drops_unsupported_buttons() {
        let mut spec = ComponentSpec::new("buttons");
        spec.buttons = vec![
            button("Yes", ButtonKind::Reply),
            button("Call", ButtonKind::Call),
            button("Site", ButtonKind::Url),
        ];
        let out = StaticAdapter::webchat().transform(spec).unwrap();
        assert_eq!(out.buttons.len(), 2);
        assert_eq!(out.meta["dropped_buttons"], json!(["call"]));
    }

    #[test]
    fn default_capabilities_are_unlimited_reply_only() {
        let caps = Capabilities::default();
        assert!(caps.max_text_len.is_none());
        assert!(caps.supports_button(ButtonKind::Reply));
        assert!(!caps.supports_button(ButtonKind::Url));
    }

    #[test]
    fn capabilities_deserialize_with_defaults() {
        let caps: Capabilities = serde_json::from_str(r#"{"max_text_len": 160, "supports_hsm": true}"#).unwrap();
        assert_eq!(caps.max_text_len, Some(160));
        assert!(caps.supports_hsm);
        assert_eq!(caps.button_kinds.len(), 1);
    }
}
