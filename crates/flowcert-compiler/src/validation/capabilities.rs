//! Channel-capability compliance per component kind.
//!
//! Content is preserved as written, so over-limit content is a warning. Only
//! features the channel cannot express at all are errors.

use std::sync::LazyLock;

use flowcert_types::Issue;
use regex::Regex;

use super::{field_path, SpecPass, SpecPassContext};
use crate::spec::{Button, ComponentSpec, TextValue};

pub struct CapabilityPass;

/// Markdown-style emphasis, links, and code fences.
static RICH_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*[^*\n]+\*\*|__[^_\n]+__|~~[^~\n]+~~|\[[^\]\n]+\]\([^)\s]+\)|```")
        .expect("rich markup pattern must compile")
});

fn has_rich_markup(text: &str) -> bool {
    RICH_MARKUP.is_match(text)
}

/// Static length of a text value; templated text counts only its literal part.
fn measured_len(text: &TextValue) -> usize {
    if text.template {
        text.literal_len()
    } else {
        text.char_len()
    }
}

fn check_len(
    issues: &mut Vec<Issue>,
    text: &TextValue,
    limit: Option<usize>,
    code: String,
    path: String,
    what: &str,
) {
    let Some(max) = limit else { return };
    let len = measured_len(text);
    if len > max {
        issues.push(Issue::warn(
            code,
            path,
            format!("{what} is {len} characters; the channel limit is {max}"),
        ));
    }
}

impl CapabilityPass {
    fn check_buttons(
        &self,
        buttons: &[Button],
        prefix: &str,
        kind: &str,
        ctx: &SpecPassContext<'_>,
        issues: &mut Vec<Issue>,
    ) {
        let caps = ctx.capabilities;
        if let Some(max) = caps.max_buttons {
            if buttons.len() > max {
                issues.push(Issue::warn(
                    format!("adapter.{kind}.too_many_buttons"),
                    field_path(ctx.path, prefix),
                    format!("{} buttons; the channel shows at most {max}", buttons.len()),
                ));
            }
        }
        for (i, button) in buttons.iter().enumerate() {
            let path = field_path(ctx.path, &format!("{prefix}[{i}]"));
            if !caps.supports_button(button.kind) {
                issues.push(Issue::warn(
                    format!("adapter.{kind}.button_kind_unsupported"),
                    path.clone(),
                    format!(
                        "Button kind '{}' is not supported by the channel and will be dropped",
                        button.kind.as_str()
                    ),
                ));
            }
            check_len(
                issues,
                &button.label,
                caps.max_button_len,
                format!("adapter.{kind}.button_label_too_long"),
                format!("{path}.label"),
                "Button label",
            );
        }
    }
}

impl SpecPass for CapabilityPass {
    fn name(&self) -> &str {
        "capabilities"
    }

    fn apply(&self, spec: &ComponentSpec, ctx: &SpecPassContext<'_>) -> Vec<Issue> {
        let caps = ctx.capabilities;
        let kind = spec.kind.as_str();
        let mut issues = Vec::new();

        if let Some(header) = &spec.header {
            check_len(
                &mut issues,
                header,
                caps.max_header_len,
                format!("adapter.{kind}.header_too_long"),
                field_path(ctx.path, "header"),
                "Header",
            );
        }
        if let Some(footer) = &spec.footer {
            check_len(
                &mut issues,
                footer,
                caps.max_footer_len,
                format!("adapter.{kind}.footer_too_long"),
                field_path(ctx.path, "footer"),
                "Footer",
            );
        }

        if !spec.buttons.is_empty() {
            self.check_buttons(&spec.buttons, "buttons", kind, ctx, &mut issues);
        }

        if let Some(list) = &spec.list {
            if !caps.supports_list_picker {
                issues.push(Issue::error(
                    format!("adapter.{kind}.list_unsupported"),
                    field_path(ctx.path, "list"),
                    "The channel has no list picker",
                ));
            }
            if let Some(max) = caps.max_list_sections {
                if list.sections.len() > max {
                    issues.push(Issue::warn(
                        format!("adapter.{kind}.too_many_sections"),
                        field_path(ctx.path, "list.sections"),
                        format!("{} sections; the channel allows at most {max}", list.sections.len()),
                    ));
                }
            }
            if let Some(max) = caps.max_list_items {
                let count = list.item_count();
                if count > max {
                    issues.push(Issue::warn(
                        format!("adapter.{kind}.too_many_items"),
                        field_path(ctx.path, "list.sections"),
                        format!("{count} items; the channel allows at most {max}"),
                    ));
                }
            }
            check_len(
                &mut issues,
                &list.button_label,
                caps.max_button_len,
                format!("adapter.{kind}.button_label_too_long"),
                field_path(ctx.path, "list.button_label"),
                "List button label",
            );
            for (s, section) in list.sections.iter().enumerate() {
                for (i, item) in section.items.iter().enumerate() {
                    if let Some(desc) = &item.description {
                        check_len(
                            &mut issues,
                            desc,
                            caps.max_description_len,
                            format!("adapter.{kind}.description_too_long"),
                            field_path(ctx.path, &format!("list.sections[{s}].items[{i}].description")),
                            "Item description",
                        );
                    }
                }
            }
        }

        if !spec.cards.is_empty() {
            if !caps.supports_carousel {
                issues.push(Issue::error(
                    format!("adapter.{kind}.carousel_unsupported"),
                    field_path(ctx.path, "cards"),
                    "The channel cannot display carousels",
                ));
            }
            for (c, card) in spec.cards.iter().enumerate() {
                if let Some(desc) = &card.description {
                    check_len(
                        &mut issues,
                        desc,
                        caps.max_description_len,
                        format!("adapter.{kind}.description_too_long"),
                        field_path(ctx.path, &format!("cards[{c}].description")),
                        "Card description",
                    );
                }
                self.check_buttons(&card.buttons, &format!("cards[{c}].buttons"), kind, ctx, &mut issues);
            }
        }

        if spec.template.is_some() && !caps.supports_hsm {
            issues.push(Issue::error(
                format!("adapter.{kind}.hsm_unsupported"),
                field_path(ctx.path, "template"),
                "The channel does not support structured templates (HSM)",
            ));
        }

        if !caps.supports_rich_text {
            if let Some(text) = &spec.text {
                if has_rich_markup(&text.raw) {
                    issues.push(Issue::warn(
                        format!("adapter.{kind}.rich_text_unsupported"),
                        field_path(ctx.path, "text"),
                        "Text uses rich formatting the channel will show verbatim",
                    ));
                }
            }
        }

        issues
    }
}
