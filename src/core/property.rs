//! Configured properties merged into events on the consumer thread
//!
//! Property values may reference lookups (`${ctx:key}`, `${env:VAR}`,
//! `${key}`). Resolving them can be costly, so it is deferred from the
//! producer to the consumer. Keys already present in an event's context
//! map are left untouched.

use super::log_context::ContextMap;
use serde::{Deserialize, Serialize};

/// A named value added to every event's context map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value_needs_lookup(&self) -> bool {
        self.value.contains("${")
    }

    /// Value with lookups resolved against `context`
    pub fn evaluate(&self, context: &ContextMap) -> String {
        if self.value_needs_lookup() {
            substitute(&self.value, context)
        } else {
            self.value.clone()
        }
    }
}

/// Replace `${...}` lookups in `template`
///
/// Unresolvable lookups and unterminated `${` are left as written.
pub fn substitute(template: &str, context: &ContextMap) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match resolve(key, context) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(key: &str, context: &ContextMap) -> Option<String> {
    match key.split_once(':') {
        Some(("ctx", name)) => context.get(name).map(str::to_string),
        Some(("env", name)) => std::env::var(name).ok(),
        Some(_) => None,
        None => context
            .get(key)
            .map(str::to_string)
            .or_else(|| std::env::var(key).ok()),
    }
}

/// Add `properties` missing from `context`
///
/// Returns without touching `context` when every property is already set,
/// so events whose snapshot is shared with the producer are not copied.
pub fn merge_properties(properties: &[Property], context: &mut ContextMap) {
    for property in properties {
        if context.contains_key(&property.name) {
            continue;
        }
        let value = property.evaluate(context);
        context.insert(property.name.clone(), value);
    }
}
