use flowcert_types::Issue;

use super::{field_path, SpecPass, SpecPassContext};
use crate::spec::ComponentSpec;

/// Rejects template filters outside the configured allow-list.
pub struct FilterAllowListPass;

impl SpecPass for FilterAllowListPass {
    fn name(&self) -> &str {
        "filter_allow_list"
    }

    fn apply(&self, spec: &ComponentSpec, ctx: &SpecPassContext<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        for (field, text) in spec.text_fields() {
            for filter in text.filters() {
                if !ctx.options.is_filter_allowed(filter) {
                    issues.push(Issue::error(
                        "template.filter.disallowed",
                        field_path(ctx.path, &field),
                        format!("Template filter '{filter}' is not allowed"),
                    ));
                }
            }
        }
        issues
    }
}
