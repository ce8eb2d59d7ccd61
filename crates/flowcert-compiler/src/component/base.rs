use std::collections::BTreeMap;

use serde_json::Value;

use flowcert_types::Result;

use super::kinds::KindConfig;
use super::{Component, SpecContext};
use crate::runtime::RuntimeContext;
use crate::spec::{Behavior, ComponentSpec, Persistence};

/// The component every built-in factory produces: a typed kind config plus
/// the optional concerns layered on top.
///
/// Builders are copy-on-write. Each `with_*` call returns a new value and
/// leaves the receiver untouched, so a partially configured component can be
/// reused as a template.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowComponent {
    kind: String,
    config: KindConfig,
    behavior: Option<Behavior>,
    persistence: Option<Persistence>,
    meta: BTreeMap<String, Value>,
}

impl FlowComponent {
    pub fn new(kind: impl Into<String>, config: KindConfig) -> Self {
        Self {
            kind: kind.into(),
            config,
            behavior: None,
            persistence: None,
            meta: BTreeMap::new(),
        }
    }

    pub fn with_behavior(&self, behavior: Option<Behavior>) -> Self {
        let mut next = self.clone();
        next.behavior = behavior.filter(|b| !b.is_empty());
        next
    }

    pub fn with_persistence(&self, persistence: Option<Persistence>) -> Self {
        let mut next = self.clone();
        next.persistence = persistence;
        next
    }

    pub fn with_meta(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.meta.insert(key.into(), value);
        next
    }

    pub fn config(&self) -> &KindConfig {
        &self.config
    }

    pub fn behavior(&self) -> Option<&Behavior> {
        self.behavior.as_ref()
    }

    pub fn persistence(&self) -> Option<&Persistence> {
        self.persistence.as_ref()
    }

    pub fn meta(&self) -> &BTreeMap<String, Value> {
        &self.meta
    }
}

impl Component for FlowComponent {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn spec(&self, ctx: &SpecContext<'_>, runtime: &RuntimeContext) -> Result<ComponentSpec> {
        let mut spec = ComponentSpec::new(&self.kind);
        spec.meta = self.meta.clone();
        self.config.render(&mut spec)?;
        spec.behavior = self.behavior.clone();
        spec.persistence = self.persistence.clone().map(|mut p| {
            p.declared = runtime.contains(&p.key);
            p
        });
        tracing::trace!(node = %ctx.node_id, kind = %self.kind, "Spec produced");
        Ok(spec)
    }
}
