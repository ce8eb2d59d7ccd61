//! Component trait, factory trait, output policies, and the kind registry.

pub mod base;
pub mod behavior;
pub mod kinds;

use std::collections::HashMap;

use flowcert_design::Props;
use flowcert_types::{FlowError, Result};

use crate::runtime::RuntimeContext;
use crate::spec::ComponentSpec;

pub use base::FlowComponent;
pub use behavior::{parse_behavior, parse_persistence, present_behaviors, BehaviorTag};
pub use kinds::{default_registry, KindConfig, KindFactory};

/// Outputs every interactive kind may expose without a matching element.
pub const STANDARD_OUTPUTS: &[&str] = &["timeout", "invalid", "fallback", "cancelled"];

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Per-call context for spec production.
#[derive(Debug, Clone, Copy)]
pub struct SpecContext<'a> {
    pub node_id: &'a str,
}

pub trait Component: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> &str;

    /// Produce the canonical spec. Text fields are template-scanned here and
    /// nowhere else.
    fn spec(&self, ctx: &SpecContext<'_>, runtime: &RuntimeContext) -> Result<ComponentSpec>;
}

// ---------------------------------------------------------------------------
// Output policy
// ---------------------------------------------------------------------------

/// An interactive element (button, list item, choice) found in raw props.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractiveElement {
    pub id: Option<String>,
    pub payload: Option<String>,
    pub label: Option<String>,
}

impl InteractiveElement {
    /// Non-blank identifiers an output name may match.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        [&self.id, &self.payload, &self.label]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn matches(&self, output: &str) -> bool {
        self.identifiers().any(|i| i == output)
    }

    /// Best name for diagnostics.
    pub fn display_name(&self) -> &str {
        self.identifiers().next().unwrap_or("<unnamed>")
    }
}

pub type ElementExtractor = fn(&Props) -> Vec<InteractiveElement>;

/// How a kind's declared outputs are checked.
#[derive(Debug, Clone, Copy)]
pub enum OutputPolicy {
    /// A fixed output set: every `required` output must be present and nothing
    /// outside `required` and `optional` may appear.
    Fixed {
        required: &'static [&'static str],
        optional: &'static [&'static str],
    },
    /// Outputs map one-to-one onto interactive elements extracted from the raw
    /// props, plus [`STANDARD_OUTPUTS`]. `element` names the element in issue
    /// codes (`button`, `item`, `choice`).
    Interactive {
        element: &'static str,
        extract: ElementExtractor,
    },
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Constructs components of one kind. Every factory declares its allowed
/// behaviors and output policy alongside construction.
pub trait Factory: Send + Sync {
    fn kind(&self) -> &str;
    fn allowed_behaviors(&self) -> &[BehaviorTag];
    fn output_policy(&self) -> OutputPolicy;
    fn create(&self, props: &Props) -> Result<Box<dyn Component>>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, Box<dyn Factory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for the same kind.
    pub fn register(&mut self, factory: impl Factory + 'static) {
        let kind = factory.kind().to_string();
        self.factories.insert(kind, Box::new(factory));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn Factory> {
        self.factories.get(kind).map(|f| f.as_ref())
    }

    pub fn has(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Instantiate a component, failing with [`FlowError::UnknownKind`] when no
    /// factory is registered for `kind`.
    pub fn create(&self, kind: &str, props: &Props) -> Result<Box<dyn Component>> {
        let factory = self.get(kind).ok_or_else(|| FlowError::UnknownKind {
            kind: kind.to_string(),
        })?;
        factory.create(props)
    }

    pub fn allowed_behaviors(&self, kind: &str) -> Option<&[BehaviorTag]> {
        self.get(kind).map(|f| f.allowed_behaviors())
    }

    pub fn output_policy(&self, kind: &str) -> Option<OutputPolicy> {
        self.get(kind).map(|f| f.output_policy())
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("kinds", &self.kinds()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kind_is_error() {
        let registry = Registry::new();
        let err = registry.create("mystery", &Props::new()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownKind { ref kind } if kind == "mystery"));
        assert!(err.is_structural());
    }

    #[test]
    fn default_registry_knows_builtin_kinds() {
        let registry = default_registry();
        assert_eq!(
            registry.kinds(),
            vec!["buttons", "carousel", "confirm", "delay", "hsm", "input", "list", "media", "message", "text"]
        );
        assert_eq!(registry.allowed_behaviors("delay"), Some(&[BehaviorTag::Delay][..]));
        assert!(registry.allowed_behaviors("nope").is_none());
    }

    #[test]
    fn registered_factory_creates_components() {
        let registry = default_registry();
        let props = json!({"text": "Hello"}).as_object().cloned().unwrap();
        let component = registry.create("message", &props).unwrap();
        assert_eq!(component.kind(), "message");
    }

    #[test]
    fn element_identifiers_skip_blanks() {
        let el = InteractiveElement {
            id: Some(" ".into()),
            payload: Some("pay".into()),
            label: Some("Pay now".into()),
        };
        assert_eq!(el.identifiers().collect::<Vec<_>>(), vec!["pay", "Pay now"]);
        assert!(el.matches("Pay now"));
        assert!(!el.matches(" "));
        assert_eq!(el.display_name(), "pay");
    }
}
