//! Built-in component kinds: typed config decode, spec rendering, element
//! extraction, and the registrations that tie them together.

use flowcert_design::Props;
use flowcert_types::{FlowError, Result};
use serde_json::{json, Value};

use super::behavior::{parse_behavior, parse_persistence, BehaviorTag};
use super::{Component, Factory, FlowComponent, InteractiveElement, OutputPolicy, Registry};
use crate::props::{self, at, DecodeResult};
use crate::spec::{
    Button, ButtonKind, Card, ComponentSpec, ListItem, ListSection, ListView, TemplateRef, TextValue,
};

const MEDIA_TYPES: &[&str] = &["image", "video", "audio", "document", "sticker"];
const INPUT_TYPES: &[&str] = &["text", "number", "email", "phone", "date", "url"];

// ---------------------------------------------------------------------------
// Typed configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonConfig {
    pub label: String,
    /// Reply payload, URL, or phone number depending on `kind`.
    pub payload: String,
    pub kind: ButtonKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemConfig {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionConfig {
    pub title: Option<String>,
    pub items: Vec<ItemConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardConfig {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub buttons: Vec<ButtonConfig>,
}

/// Props of one node decoded into a per-kind record.
#[derive(Debug, Clone, PartialEq)]
pub enum KindConfig {
    Message {
        text: String,
    },
    Text {
        text: String,
    },
    Media {
        url: String,
        media_type: String,
        caption: Option<String>,
    },
    Buttons {
        text: String,
        header: Option<String>,
        footer: Option<String>,
        buttons: Vec<ButtonConfig>,
    },
    List {
        text: String,
        header: Option<String>,
        footer: Option<String>,
        button_label: String,
        sections: Vec<SectionConfig>,
    },
    Carousel {
        text: Option<String>,
        cards: Vec<CardConfig>,
    },
    Confirm {
        text: String,
        yes_label: String,
        no_label: String,
    },
    Input {
        text: String,
        input_type: String,
    },
    /// The pause itself lives in the `delay` behavior.
    Delay,
    Hsm {
        name: String,
        language: Option<String>,
        params: Vec<String>,
    },
}

fn scan_opt(value: &Option<String>) -> Result<Option<TextValue>> {
    value.as_deref().map(TextValue::scanned).transpose()
}

fn render_buttons(buttons: &[ButtonConfig]) -> Result<Vec<Button>> {
    buttons
        .iter()
        .map(|b| {
            Ok(Button {
                label: TextValue::scanned(b.label.as_str())?,
                payload: b.payload.clone(),
                kind: b.kind,
            })
        })
        .collect()
}

impl KindConfig {
    /// Fill the content fields of `spec`, scanning every text-bearing field.
    pub(crate) fn render(&self, spec: &mut ComponentSpec) -> Result<()> {
        match self {
            KindConfig::Message { text } | KindConfig::Text { text } => {
                spec.text = Some(TextValue::scanned(text.as_str())?);
            }
            KindConfig::Media {
                url,
                media_type,
                caption,
            } => {
                spec.media_url = Some(url.clone());
                spec.text = scan_opt(caption)?;
                spec.meta.insert("media_type".into(), json!(media_type));
            }
            KindConfig::Buttons {
                text,
                header,
                footer,
                buttons,
            } => {
                spec.text = Some(TextValue::scanned(text.as_str())?);
                spec.header = scan_opt(header)?;
                spec.footer = scan_opt(footer)?;
                spec.buttons = render_buttons(buttons)?;
            }
            KindConfig::List {
                text,
                header,
                footer,
                button_label,
                sections,
            } => {
                spec.text = Some(TextValue::scanned(text.as_str())?);
                spec.header = scan_opt(header)?;
                spec.footer = scan_opt(footer)?;
                let mut rendered = Vec::with_capacity(sections.len());
                for section in sections {
                    let mut items = Vec::with_capacity(section.items.len());
                    for item in &section.items {
                        items.push(ListItem {
                            id: item.id.clone(),
                            title: TextValue::scanned(item.title.as_str())?,
                            description: scan_opt(&item.description)?,
                        });
                    }
                    rendered.push(ListSection {
                        title: scan_opt(&section.title)?,
                        items,
                    });
                }
                spec.list = Some(ListView {
                    button_label: TextValue::scanned(button_label.as_str())?,
                    sections: rendered,
                });
            }
            KindConfig::Carousel { text, cards } => {
                spec.text = scan_opt(text)?;
                for card in cards {
                    spec.cards.push(Card {
                        title: TextValue::scanned(card.title.as_str())?,
                        description: scan_opt(&card.description)?,
                        image_url: card.image_url.clone(),
                        buttons: render_buttons(&card.buttons)?,
                    });
                }
            }
            KindConfig::Confirm {
                text,
                yes_label,
                no_label,
            } => {
                spec.text = Some(TextValue::scanned(text.as_str())?);
                spec.buttons = vec![
                    Button {
                        label: TextValue::scanned(yes_label.as_str())?,
                        payload: "yes".into(),
                        kind: ButtonKind::Reply,
                    },
                    Button {
                        label: TextValue::scanned(no_label.as_str())?,
                        payload: "no".into(),
                        kind: ButtonKind::Reply,
                    },
                ];
            }
            KindConfig::Input { text, input_type } => {
                spec.text = Some(TextValue::scanned(text.as_str())?);
                spec.meta.insert("input_type".into(), json!(input_type));
            }
            KindConfig::Delay => {}
            KindConfig::Hsm {
                name,
                language,
                params,
            } => {
                let params = params
                    .iter()
                    .map(|p| TextValue::scanned(p.as_str()))
                    .collect::<Result<Vec<_>>>()?;
                spec.template = Some(TemplateRef {
                    name: name.clone(),
                    language: language.clone(),
                    params,
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn decode_message(p: &Props) -> DecodeResult<KindConfig> {
    Ok(KindConfig::Message {
        text: props::require_str(p, "text")?,
    })
}

fn decode_text(p: &Props) -> DecodeResult<KindConfig> {
    Ok(KindConfig::Text {
        text: props::require_str(p, "text")?,
    })
}

fn decode_media(p: &Props) -> DecodeResult<KindConfig> {
    let url = props::require_str(p, "url")?;
    let media_type = props::get_str(p, "media_type")?.unwrap_or_else(|| "image".into());
    if !MEDIA_TYPES.contains(&media_type.as_str()) {
        return Err(format!(
            "unknown media_type '{media_type}', expected one of {}",
            MEDIA_TYPES.join(", ")
        ));
    }
    Ok(KindConfig::Media {
        url,
        media_type,
        caption: props::get_str(p, "caption")?,
    })
}

fn decode_button(b: &Props) -> DecodeResult<ButtonConfig> {
    let label = props::get_str_any(b, &["label", "text", "title"])?.ok_or("missing required 'label'")?;
    let kind = props::get_str_any(b, &["type", "kind"])?.unwrap_or_else(|| "reply".into());
    let (kind, payload) = match kind.as_str() {
        "reply" => {
            let payload = props::get_str_any(b, &["payload", "id"])?.unwrap_or_else(|| label.clone());
            (ButtonKind::Reply, payload)
        }
        "url" => (ButtonKind::Url, props::require_str(b, "url")?),
        "call" | "phone" => (ButtonKind::Call, props::require_str(b, "phone")?),
        other => return Err(format!("unknown button type '{other}'")),
    };
    Ok(ButtonConfig {
        label,
        payload,
        kind,
    })
}

fn decode_buttons_list(items: &[Value], key: &str) -> DecodeResult<Vec<ButtonConfig>> {
    props::object_items(items, key)?
        .into_iter()
        .enumerate()
        .map(|(i, b)| at(decode_button(b), format!("{key}[{i}]")))
        .collect()
}

fn decode_buttons(p: &Props) -> DecodeResult<KindConfig> {
    let raw = props::get_array(p, "buttons")?.ok_or("missing required 'buttons'")?;
    if raw.is_empty() {
        return Err("'buttons' must not be empty".into());
    }
    Ok(KindConfig::Buttons {
        text: props::require_str(p, "text")?,
        header: props::get_str(p, "header")?,
        footer: props::get_str(p, "footer")?,
        buttons: decode_buttons_list(raw, "buttons")?,
    })
}

fn decode_list(p: &Props) -> DecodeResult<KindConfig> {
    let raw = props::get_array(p, "sections")?.ok_or("missing required 'sections'")?;
    if raw.is_empty() {
        return Err("'sections' must not be empty".into());
    }

    let mut sections = Vec::with_capacity(raw.len());
    for (s, section) in props::object_items(raw, "sections")?.into_iter().enumerate() {
        let location = format!("sections[{s}]");
        let raw_items = at(props::get_array(section, "items"), &location)?
            .ok_or_else(|| format!("{location}: missing required 'items'"))?;
        let mut items = Vec::with_capacity(raw_items.len());
        for (i, item) in at(props::object_items(raw_items, "items"), &location)?
            .into_iter()
            .enumerate()
        {
            let item_location = format!("{location}.items[{i}]");
            items.push(ItemConfig {
                id: at(props::require_str(item, "id"), &item_location)?,
                title: at(props::get_str_any(item, &["title", "label"]), &item_location)?
                    .ok_or_else(|| format!("{item_location}: missing required 'title'"))?,
                description: at(props::get_str(item, "description"), &item_location)?,
            });
        }
        sections.push(SectionConfig {
            title: at(props::get_str(section, "title"), &location)?,
            items,
        });
    }

    Ok(KindConfig::List {
        text: props::require_str(p, "text")?,
        header: props::get_str(p, "header")?,
        footer: props::get_str(p, "footer")?,
        button_label: props::get_str(p, "button_label")?.unwrap_or_else(|| "Options".into()),
        sections,
    })
}

fn decode_carousel(p: &Props) -> DecodeResult<KindConfig> {
    let raw = props::get_array(p, "cards")?.ok_or("missing required 'cards'")?;
    if raw.is_empty() {
        return Err("'cards' must not be empty".into());
    }

    let mut cards = Vec::with_capacity(raw.len());
    for (c, card) in props::object_items(raw, "cards")?.into_iter().enumerate() {
        let location = format!("cards[{c}]");
        let buttons = match at(props::get_array(card, "buttons"), &location)? {
            Some(items) => at(decode_buttons_list(items, "buttons"), &location)?,
            None => Vec::new(),
        };
        cards.push(CardConfig {
            title: at(props::require_str(card, "title"), &location)?,
            description: at(props::get_str(card, "description"), &location)?,
            image_url: at(props::get_str_any(card, &["image_url", "image"]), &location)?,
            buttons,
        });
    }

    Ok(KindConfig::Carousel {
        text: props::get_str(p, "text")?,
        cards,
    })
}

fn decode_confirm(p: &Props) -> DecodeResult<KindConfig> {
    Ok(KindConfig::Confirm {
        text: props::require_str(p, "text")?,
        yes_label: props::get_str(p, "yes_label")?.unwrap_or_else(|| "Yes".into()),
        no_label: props::get_str(p, "no_label")?.unwrap_or_else(|| "No".into()),
    })
}

fn decode_input(p: &Props) -> DecodeResult<KindConfig> {
    let input_type = props::get_str(p, "input_type")?.unwrap_or_else(|| "text".into());
    if !INPUT_TYPES.contains(&input_type.as_str()) {
        return Err(format!(
            "unknown input_type '{input_type}', expected one of {}",
            INPUT_TYPES.join(", ")
        ));
    }
    Ok(KindConfig::Input {
        text: props::require_str(p, "text")?,
        input_type,
    })
}

fn decode_delay(p: &Props) -> DecodeResult<KindConfig> {
    match p.get("delay") {
        None | Some(Value::Null) => Err("missing required 'delay'".into()),
        Some(_) => Ok(KindConfig::Delay),
    }
}

fn decode_hsm(p: &Props) -> DecodeResult<KindConfig> {
    let template = props::get_object(p, "template")?.ok_or("missing required 'template'")?;
    let name = at(props::require_str(template, "name"), "template")?;
    let params = match at(props::get_array(template, "params"), "template")? {
        Some(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(format!(
                    "template.params[{i}] must be a string, found {}",
                    props::type_name(other)
                )),
            })
            .collect::<DecodeResult<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(KindConfig::Hsm {
        name,
        language: at(props::get_str(template, "language"), "template")?,
        params,
    })
}

// ---------------------------------------------------------------------------
// Element extraction (raw props, before any adapter filtering)
// ---------------------------------------------------------------------------

fn reply_elements(buttons: &[Value]) -> Vec<InteractiveElement> {
    buttons
        .iter()
        .filter_map(Value::as_object)
        .filter(|b| {
            let kind = b
                .get("type")
                .or_else(|| b.get("kind"))
                .and_then(Value::as_str)
                .unwrap_or("reply");
            !matches!(kind, "url" | "call" | "phone")
        })
        .map(|b| InteractiveElement {
            id: str_field(b, "id"),
            payload: str_field(b, "payload"),
            label: str_field(b, "label")
                .or_else(|| str_field(b, "text"))
                .or_else(|| str_field(b, "title")),
        })
        .collect()
}

fn str_field(p: &Props, key: &str) -> Option<String> {
    p.get(key).and_then(Value::as_str).map(String::from)
}

fn array_field<'a>(p: &'a Props, key: &str) -> &'a [Value] {
    p.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Reply buttons of a `buttons` node. URL and call buttons never route.
pub fn extract_buttons(p: &Props) -> Vec<InteractiveElement> {
    reply_elements(array_field(p, "buttons"))
}

pub fn extract_list_items(p: &Props) -> Vec<InteractiveElement> {
    array_field(p, "sections")
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|s| array_field(s, "items").iter().filter_map(Value::as_object))
        .map(|item| InteractiveElement {
            id: str_field(item, "id"),
            payload: None,
            label: str_field(item, "title").or_else(|| str_field(item, "label")),
        })
        .collect()
}

pub fn extract_card_buttons(p: &Props) -> Vec<InteractiveElement> {
    array_field(p, "cards")
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|card| reply_elements(array_field(card, "buttons")))
        .collect()
}

pub fn extract_confirm_choices(p: &Props) -> Vec<InteractiveElement> {
    vec![
        InteractiveElement {
            id: Some("yes".into()),
            payload: None,
            label: str_field(p, "yes_label"),
        },
        InteractiveElement {
            id: Some("no".into()),
            payload: None,
            label: str_field(p, "no_label"),
        },
    ]
}

// ---------------------------------------------------------------------------
// Registrations
// ---------------------------------------------------------------------------

const MESSAGE_BEHAVIORS: &[BehaviorTag] = &[BehaviorTag::Delay, BehaviorTag::Experiment];
const PLAIN_BEHAVIORS: &[BehaviorTag] = &[BehaviorTag::Delay];
const INTERACTIVE_BEHAVIORS: &[BehaviorTag] = &[
    BehaviorTag::Timeout,
    BehaviorTag::Retry,
    BehaviorTag::Fallback,
    BehaviorTag::Delay,
    BehaviorTag::Persistence,
];
const INPUT_BEHAVIORS: &[BehaviorTag] = &[
    BehaviorTag::Timeout,
    BehaviorTag::Validation,
    BehaviorTag::Retry,
    BehaviorTag::Fallback,
    BehaviorTag::Delay,
    BehaviorTag::Persistence,
];
const HSM_BEHAVIORS: &[BehaviorTag] = &[BehaviorTag::Timeout, BehaviorTag::Delay];

const NEXT_ONLY: OutputPolicy = OutputPolicy::Fixed {
    required: &["next"],
    optional: &[],
};

type Decoder = fn(&Props) -> DecodeResult<KindConfig>;

/// Factory for a built-in kind.
pub struct KindFactory {
    kind: &'static str,
    allowed: &'static [BehaviorTag],
    outputs: OutputPolicy,
    decode: Decoder,
}

impl KindFactory {
    const fn new(
        kind: &'static str,
        allowed: &'static [BehaviorTag],
        outputs: OutputPolicy,
        decode: Decoder,
    ) -> Self {
        Self {
            kind,
            allowed,
            outputs,
            decode,
        }
    }
}

impl Factory for KindFactory {
    fn kind(&self) -> &str {
        self.kind
    }

    fn allowed_behaviors(&self) -> &[BehaviorTag] {
        self.allowed
    }

    fn output_policy(&self) -> OutputPolicy {
        self.outputs
    }

    fn create(&self, p: &Props) -> Result<Box<dyn Component>> {
        // The compiler fills in the node id.
        let fail = |message: String| FlowError::Factory {
            kind: self.kind.to_string(),
            node: String::new(),
            message,
        };

        let config = (self.decode)(p).map_err(fail)?;
        let behavior = parse_behavior(p).map_err(fail)?;
        let persistence = parse_persistence(p).map_err(fail)?;

        let mut component = FlowComponent::new(self.kind, config)
            .with_behavior(behavior)
            .with_persistence(persistence);
        if let Some(meta) = props::get_object(p, "meta").map_err(fail)? {
            for (key, value) in meta {
                component = component.with_meta(key.clone(), value.clone());
            }
        }
        Ok(Box::new(component))
    }
}

/// Registry with every built-in kind.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(KindFactory::new("message", MESSAGE_BEHAVIORS, NEXT_ONLY, decode_message));
    registry.register(KindFactory::new("text", PLAIN_BEHAVIORS, NEXT_ONLY, decode_text));
    registry.register(KindFactory::new("media", PLAIN_BEHAVIORS, NEXT_ONLY, decode_media));
    registry.register(KindFactory::new("delay", PLAIN_BEHAVIORS, NEXT_ONLY, decode_delay));
    registry.register(KindFactory::new(
        "buttons",
        INTERACTIVE_BEHAVIORS,
        OutputPolicy::Interactive {
            element: "button",
            extract: extract_buttons,
        },
        decode_buttons,
    ));
    registry.register(KindFactory::new(
        "list",
        INTERACTIVE_BEHAVIORS,
        OutputPolicy::Interactive {
            element: "item",
            extract: extract_list_items,
        },
        decode_list,
    ));
    registry.register(KindFactory::new(
        "carousel",
        INTERACTIVE_BEHAVIORS,
        OutputPolicy::Interactive {
            element: "button",
            extract: extract_card_buttons,
        },
        decode_carousel,
    ));
    registry.register(KindFactory::new(
        "confirm",
        INTERACTIVE_BEHAVIORS,
        OutputPolicy::Interactive {
            element: "choice",
            extract: extract_confirm_choices,
        },
        decode_confirm,
    ));
    registry.register(KindFactory::new(
        "input",
        INPUT_BEHAVIORS,
        OutputPolicy::Fixed {
            required: &["next"],
            optional: &["timeout", "invalid", "fallback"],
        },
        decode_input,
    ));
    registry.register(KindFactory::new(
        "hsm",
        HSM_BEHAVIORS,
        OutputPolicy::Fixed {
            required: &["next"],
            optional: &["timeout"],
        },
        decode_hsm,
    ));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::SpecContext;
    use crate::runtime::RuntimeContext;

    fn props(v: Value) -> Props {
        v.as_object().cloned().unwrap()
    }

    fn spec_for(kind: &str, v: Value) -> ComponentSpec {
        let registry = default_registry();
        let component = registry.create(kind, &props(v)).unwrap();
        component
            .spec(&SpecContext { node_id: "n" }, &RuntimeContext::default())
            .unwrap()
    }

    fn factory_error(kind: &str, v: Value) -> String {
        match default_registry().create(kind, &props(v)).unwrap_err() {
            FlowError::Factory { kind: k, message, .. } => {
                assert_eq!(k, kind);
                message
            }
            other => panic!("expected factory error, got {other}"),
        }
    }

    #[test]
    fn message_spec_has_text_only() {
        let spec = spec_for("message", json!({"text": "Hello"}));
        assert_eq!(spec.kind, "message");
        assert_eq!(spec.text.unwrap().raw, "Hello");
        assert!(spec.behavior.is_none());
        assert!(spec.buttons.is_empty());
    }

    #[test]
    fn buttons_decode_all_button_kinds() {
        let spec = spec_for(
            "buttons",
            json!({
                "text": "Pick",
                "footer": "Powered by us",
                "buttons": [
                    {"id": "b1", "label": "Plans"},
                    {"text": "Docs", "type": "url", "url": "https://example.com"},
                    {"label": "Call us", "kind": "call", "phone": "+5511999999999"}
                ]
            }),
        );
        assert_eq!(spec.buttons.len(), 3);
        assert_eq!(spec.buttons[0].payload, "b1");
        assert_eq!(spec.buttons[1].kind, ButtonKind::Url);
        assert_eq!(spec.buttons[2].kind, ButtonKind::Call);
        assert_eq!(spec.footer.unwrap().raw, "Powered by us");
    }

    #[test]
    fn list_decodes_sections_and_items() {
        let spec = spec_for(
            "list",
            json!({
                "text": "Choose a plan",
                "button_label": "Plans",
                "sections": [
                    {"title": "Basic", "items": [{"id": "p1", "title": "Starter"}]},
                    {"items": [{"id": "p2", "title": "Pro", "description": "All features"}]}
                ]
            }),
        );
        let list = spec.list.unwrap();
        assert_eq!(list.item_count(), 2);
        assert_eq!(list.button_label.raw, "Plans");
        assert_eq!(list.sections[1].items[0].description.as_ref().unwrap().raw, "All features");
    }

    #[test]
    fn carousel_cards() {
        let spec = spec_for(
            "carousel",
            json!({"cards": [{"title": "Shoe", "image": "https://img/1.png",
                              "buttons": [{"label": "Buy", "payload": "buy_1"}]}]}),
        );
        assert_eq!(spec.cards.len(), 1);
        assert_eq!(spec.cards[0].image_url.as_deref(), Some("https://img/1.png"));
        assert_eq!(spec.cards[0].buttons[0].payload, "buy_1");
        assert!(spec.text.is_none());
    }

    #[test]
    fn confirm_renders_yes_and_no() {
        let spec = spec_for("confirm", json!({"text": "Sure?", "yes_label": "Sim"}));
        let payloads: Vec<_> = spec.buttons.iter().map(|b| b.payload.as_str()).collect();
        assert_eq!(payloads, vec!["yes", "no"]);
        assert_eq!(spec.buttons[0].label.raw, "Sim");
        assert_eq!(spec.buttons[1].label.raw, "No");
    }

    #[test]
    fn input_carries_behavior_and_persistence() {
        let spec = spec_for(
            "input",
            json!({"text": "Your email?", "input_type": "email",
                   "validation": "email", "timeout": 120, "persist": "email"}),
        );
        assert_eq!(spec.meta["input_type"], "email");
        let behavior = spec.behavior.unwrap();
        assert_eq!(behavior.validation.unwrap().kind, "email");
        assert_eq!(behavior.timeout.unwrap().seconds, 120);
        assert_eq!(spec.persistence.unwrap().key, "email");
    }

    #[test]
    fn hsm_scans_params() {
        let spec = spec_for(
            "hsm",
            json!({"template": {"name": "order_update", "language": "pt_BR",
                                "params": ["{{ order.id }}", 42]}}),
        );
        let tpl = spec.template.unwrap();
        assert_eq!(tpl.name, "order_update");
        assert!(tpl.params[0].template);
        assert_eq!(tpl.params[1].raw, "42");
    }

    #[test]
    fn media_and_delay() {
        let spec = spec_for("media", json!({"url": "https://x/y.mp4", "media_type": "video", "caption": "Watch"}));
        assert_eq!(spec.media_url.as_deref(), Some("https://x/y.mp4"));
        assert_eq!(spec.meta["media_type"], "video");
        assert_eq!(spec.text.unwrap().raw, "Watch");

        let spec = spec_for("delay", json!({"delay": 2}));
        assert_eq!(spec.behavior.unwrap().delay.unwrap().millis, 2000);
        assert!(spec.text.is_none());
    }

    #[test]
    fn meta_bag_is_copied() {
        let spec = spec_for("text", json!({"text": "x", "meta": {"tracking": "abc"}}));
        assert_eq!(spec.meta["tracking"], "abc");
    }

    #[test]
    fn factory_errors_name_the_problem() {
        assert!(factory_error("message", json!({})).contains("missing required 'text'"));
        assert!(factory_error("buttons", json!({"text": "x", "buttons": []})).contains("must not be empty"));
        assert!(factory_error("buttons", json!({"text": "x", "buttons": [{"type": "url", "label": "L"}]}))
            .starts_with("buttons[0]: missing required 'url'"));
        assert!(factory_error("list", json!({"text": "x", "sections": [{"items": [{"title": "t"}]}]}))
            .contains("sections[0].items[0]"));
        assert!(factory_error("media", json!({"url": "u", "media_type": "hologram"})).contains("hologram"));
        assert!(factory_error("delay", json!({})).contains("'delay'"));
        assert!(factory_error("text", json!({"text": "x", "timeout": "soon"})).starts_with("timeout:"));
        assert!(factory_error("hsm", json!({"template": {"name": "t", "params": [{}]}})).contains("params[0]"));
    }

    #[test]
    fn extractors_read_raw_props() {
        let p = props(json!({"buttons": [
            {"id": "a", "label": "A"},
            {"label": "Site", "type": "url", "url": "https://x"},
            {"text": "B", "payload": "pay_b"}
        ]}));
        let els = extract_buttons(&p);
        assert_eq!(els.len(), 2);
        assert!(els[1].matches("pay_b"));

        let p = props(json!({"sections": [{"items": [{"id": "i1", "title": "One"}]}, {"items": [{"id": "i2"}]}]}));
        let ids: Vec<_> = extract_list_items(&p).into_iter().filter_map(|e| e.id).collect();
        assert_eq!(ids, vec!["i1", "i2"]);

        let choices = extract_confirm_choices(&Props::new());
        assert!(choices[0].matches("yes") && choices[1].matches("no"));
    }

    #[test]
    fn interactive_policies() {
        let registry = default_registry();
        for kind in ["buttons", "list", "carousel", "confirm"] {
            assert!(matches!(registry.output_policy(kind), Some(OutputPolicy::Interactive { .. })));
        }
        for kind in ["message", "text", "media", "delay", "input", "hsm"] {
            assert!(matches!(registry.output_policy(kind), Some(OutputPolicy::Fixed { .. })));
        }
    }
}
