//! Named-slot text templates.
//!
//! Placeholders are written `{{name}}`. Rendering is strict in both
//! directions: a placeholder without a value and a value without a
//! placeholder are both errors.

use std::collections::BTreeMap;

use crate::error::{ResolveError, Result};

/// Values for the slots of a [`Template`].
#[derive(Debug, Default, Clone)]
pub struct Slots {
    values: BTreeMap<&'static str, String>,
}

impl Slots {
    /// Empty slot set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a slot, replacing any previous value.
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.values.insert(name, value.into());
        self
    }
}

/// A static template with `{{name}}` placeholders.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    name: &'static str,
    text: &'static str,
}

impl Template {
    /// Template called `name` (used in errors) with body `text`.
    pub const fn new(name: &'static str, text: &'static str) -> Self {
        Self { name, text }
    }

    /// Name reported in slot errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Substitute every placeholder with its slot value.
    pub fn render(&self, slots: &Slots) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() * 2);
        let mut used = Vec::new();
        let mut rest = self.text;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| self.slot_error(after))?;
            let key = after[..end].trim();
            let value = slots.values.get(key).ok_or_else(|| self.slot_error(key))?;
            out.push_str(value);
            used.push(key);
            rest = &after[end + 2..];
        }
        out.push_str(rest);

        if let Some(unused) = slots.values.keys().find(|k| !used.contains(*k)) {
            return Err(self.slot_error(unused));
        }
        Ok(out)
    }

    fn slot_error(&self, slot: &str) -> ResolveError {
        ResolveError::TemplateSlot {
            template: self.name,
            slot: slot.to_string(),
        }
    }
}
