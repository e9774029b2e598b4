use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena handle for a concept.
///
/// Handles are assigned sequentially by a [`ConceptGraph`](crate::ConceptGraph)
/// and never reused, so a handle to a released concept stays dangling rather
/// than silently pointing at a newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(u64);

impl ConceptId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier of a concept.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identifier {
    /// Process-assigned, equal to the concept's arena handle.
    Assigned { id: u64 },
    /// Caller-supplied name plus a uniqueness tag (commands use this).
    Tagged { name: String, tag: u64 },
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned { id } => write!(f, "{}", id),
            Self::Tagged { name, tag } => write!(f, "{}/{}", name, tag),
        }
    }
}

/// What kind of node a concept is. Shows up in the by-type identity representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptKind {
    Root,
    Statement,
    Symbol,
    Command,
    Script,
    Lifted,
}

impl fmt::Display for ConceptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "Root"),
            Self::Statement => write!(f, "Statement"),
            Self::Symbol => write!(f, "Symbol"),
            Self::Command => write!(f, "Command"),
            Self::Script => write!(f, "Script"),
            Self::Lifted => write!(f, "Lifted"),
        }
    }
}

/// The value side of a binding: literal text or a concept handle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Literal(String),
    Concept(ConceptId),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{:?}", text),
            Self::Concept(id) => write!(f, "concept {}", id),
        }
    }
}

/// Non-owning association between two concepts.
///
/// Associations are directed (`from` is a `kind` of `to`) but stored on both
/// endpoints so either side can enumerate them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    /// `from` is an alternative representation of `to`.
    Representation,
    /// `from` is a piece of `to`.
    Piece,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_display() {
        assert_eq!(Identifier::Assigned { id: 4 }.to_string(), "4");
        let tagged = Identifier::Tagged {
            name: "bind".into(),
            tag: 12,
        };
        assert_eq!(tagged.to_string(), "bind/12");
    }

    #[test]
    fn concept_id_display() {
        assert_eq!(ConceptId::new(3).to_string(), "#3");
    }

    #[test]
    fn value_serializes_with_kind() {
        let json = serde_json::to_string(&Value::Literal("5".into())).unwrap();
        assert!(json.contains("\"literal\""));
    }
}
