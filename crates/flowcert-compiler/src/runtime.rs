use std::collections::BTreeMap;

use flowcert_design::Profile;
use serde::Serialize;
use serde_json::Value;

/// Resolved profile values handed to components while producing specs.
///
/// Context variables land in `persistent` or `temporary` by their `persist`
/// flag, taking the supplied `profile.variables` value over the declared
/// default. Undeclared variables are always temporary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuntimeContext {
    pub temporary: BTreeMap<String, Value>,
    pub persistent: BTreeMap<String, Value>,
}

impl RuntimeContext {
    pub fn from_profile(profile: Option<&Profile>) -> Self {
        let mut ctx = Self::default();
        let Some(profile) = profile else {
            return ctx;
        };

        for (name, value) in &profile.variables {
            ctx.temporary.insert(name.clone(), value.clone());
        }
        for (name, var) in &profile.context {
            let value = profile
                .variables
                .get(name)
                .or(var.default.as_ref())
                .cloned()
                .unwrap_or(Value::Null);
            if var.persist {
                ctx.temporary.remove(name);
                ctx.persistent.insert(name.clone(), value);
            } else {
                ctx.temporary.insert(name.clone(), value);
            }
        }
        ctx
    }

    pub fn contains(&self, key: &str) -> bool {
        self.persistent.contains_key(key) || self.temporary.contains_key(key)
    }

    /// Persistent values shadow temporary ones.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.persistent.get(key).or_else(|| self.temporary.get(key))
    }

    pub fn is_persistent(&self, key: &str) -> bool {
        self.persistent.contains_key(key)
    }
}
