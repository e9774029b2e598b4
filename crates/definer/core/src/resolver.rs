//! Shadowing-aware binding lookup.

use crate::error::GraphResult;
use crate::graph::ConceptGraph;
use crate::types::{ConceptId, Value};
use serde::Serialize;
use std::fmt;

/// A binding found by [`ConceptGraph::lookup`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Binding {
    /// Concepts walked from the lookup origin down to the binding concept, inclusive.
    pub path: Vec<ConceptId>,
    pub identifier: String,
    pub value: Value,
}

impl Binding {
    /// The concept whose context holds the binding.
    pub fn owner(&self) -> Option<ConceptId> {
        self.path.last().copied()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path: Vec<String> = self.path.iter().map(ToString::to_string).collect();
        write!(f, "{} = {} (via {})", self.identifier, self.value, path.join(" > "))
    }
}

impl ConceptGraph {
    /// Every binding of `identifier` visible from `origin`.
    ///
    /// A binding in a concept's own context shadows everything below it.
    /// Otherwise the children are searched in order and their results
    /// concatenated. Zero results means unbound; more than one means ambiguous.
    pub fn lookup(&self, origin: ConceptId, identifier: &str) -> GraphResult<Vec<Binding>> {
        let mut found = Vec::new();
        let mut path = Vec::new();
        self.lookup_into(origin, identifier, &mut path, &mut found)?;
        Ok(found)
    }

    fn lookup_into(
        &self,
        id: ConceptId,
        identifier: &str,
        path: &mut Vec<ConceptId>,
        found: &mut Vec<Binding>,
    ) -> GraphResult<()> {
        let node = self.node(id)?;
        path.push(id);
        if let Some(value) = node.context().get(identifier) {
            found.push(Binding {
                path: path.clone(),
                identifier: identifier.to_string(),
                value: value.clone(),
            });
        } else {
            for child in node.children() {
                self.lookup_into(*child, identifier, path, found)?;
            }
        }
        path.pop();
        Ok(())
    }
}
