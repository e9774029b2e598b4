//! Per-concept binding table.

use crate::defining::Definition;
use crate::types::Value;
use std::collections::BTreeMap;

/// Identifier → value bindings owned by one concept, plus the reserved
/// definition slot.
///
/// The definition slot is kept apart from the bindings so that no user
/// identifier can ever collide with it.
#[derive(Clone, Debug, Default)]
pub struct Context {
    bindings: BTreeMap<String, Value>,
    definition: Option<Definition>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identifier`, replacing any previous value.
    pub fn bind(&mut self, identifier: impl Into<String>, value: Value) -> Option<Value> {
        self.bindings.insert(identifier.into(), value)
    }

    pub fn unbind(&mut self, identifier: &str) -> Option<Value> {
        self.bindings.remove(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.bindings.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.bindings.contains_key(identifier)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty() && self.definition.is_none()
    }

    pub fn definition(&self) -> Option<&Definition> {
        self.definition.as_ref()
    }

    pub fn set_definition(&mut self, definition: Definition) -> Option<Definition> {
        self.definition.replace(definition)
    }

    pub fn take_definition(&mut self) -> Option<Definition> {
        self.definition.take()
    }
}
