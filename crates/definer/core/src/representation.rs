//! Ranked textual projections of a concept.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How meaningful a representation is. Higher is more meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationLevel {
    /// System identity (`#|id=..|#`), always present, never preferred.
    Identity,
    /// Derived by the system, e.g. `#|Symbol:x|#`.
    SystemInformation,
    /// Taken verbatim from user input.
    InputMorphism,
    /// Explicitly supplied by the user (`:name`, `:alias`).
    UserSupplied,
}

impl RepresentationLevel {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Identity => 0,
            Self::SystemInformation => 10,
            Self::InputMorphism => 50,
            Self::UserSupplied => 100,
        }
    }
}

/// An immutable textual projection of a concept.
///
/// Two representations compare equal when their rendered text is equal;
/// the level only orders preference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Representation {
    raw: String,
    level: RepresentationLevel,
}

impl Representation {
    pub fn new(raw: impl Into<String>, level: RepresentationLevel) -> Self {
        Self {
            raw: raw.into(),
            level,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn level(&self) -> RepresentationLevel {
        self.level
    }

    pub fn is_identity(&self) -> bool {
        self.level == RepresentationLevel::Identity
    }

    /// Text a user can type back to refer to this representation.
    ///
    /// Text containing whitespace is wrapped in `[[...]]` so it reads as a
    /// single token.
    pub fn human_friendly(&self) -> String {
        if self.raw.chars().any(char::is_whitespace) {
            format!("[[{}]]", self.raw)
        } else {
            self.raw.clone()
        }
    }
}

impl PartialEq for Representation {
    fn eq(&self, other: &Self) -> bool {
        self.human_friendly() == other.human_friendly()
    }
}

impl Eq for Representation {}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.human_friendly())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_word_renders_verbatim() {
        let rep = Representation::new("cat", RepresentationLevel::InputMorphism);
        assert_eq!(rep.human_friendly(), "cat");
    }

    #[test]
    fn whitespace_is_wrapped() {
        let rep = Representation::new("big cat", RepresentationLevel::UserSupplied);
        assert_eq!(rep.human_friendly(), "[[big cat]]");
        assert_eq!(rep.to_string(), "[[big cat]]");
    }

    #[test]
    fn equality_ignores_level() {
        let a = Representation::new("x", RepresentationLevel::InputMorphism);
        let b = Representation::new("x", RepresentationLevel::UserSupplied);
        assert_eq!(a, b);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(RepresentationLevel::UserSupplied > RepresentationLevel::InputMorphism);
        assert!(RepresentationLevel::SystemInformation > RepresentationLevel::Identity);
        assert_eq!(RepresentationLevel::InputMorphism.rank(), 50);
    }
}
