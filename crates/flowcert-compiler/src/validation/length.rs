use flowcert_types::Issue;

use super::{field_path, SpecPass, SpecPassContext};
use crate::spec::ComponentSpec;

/// Checks the principal text against `max_text_len`. Templated text can only
/// be measured at runtime, so it is reported as deferred.
pub struct StaticLengthPass;

impl SpecPass for StaticLengthPass {
    fn name(&self) -> &str {
        "static_length"
    }

    fn apply(&self, spec: &ComponentSpec, ctx: &SpecPassContext<'_>) -> Vec<Issue> {
        let (Some(text), Some(max)) = (&spec.text, ctx.capabilities.max_text_len) else {
            return vec![];
        };
        let path = field_path(ctx.path, "text");

        if text.template {
            return vec![Issue::info(
                "text.length.deferred",
                path,
                format!("Templated text checked against the {max}-character limit at runtime"),
            )];
        }

        let len = text.char_len();
        if len > max {
            vec![Issue::warn(
                "text.length.exceeded",
                path,
                format!("Text is {len} characters; the channel limit is {max}"),
            )]
        } else {
            vec![]
        }
    }
}
