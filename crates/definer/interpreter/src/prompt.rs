//! User-facing messages queued by commands.

use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Output of a command that ran.
    Info,
    /// A definition diagnostic.
    Diagnostic,
    /// A reference matched nothing.
    NotFound,
    /// A reference matched more than one concept.
    Ambiguous,
    /// A matched substructure cannot become a concept.
    NotLiftable,
    /// The command was given the wrong arguments.
    Usage,
    UnknownCommand,
    Error,
}

impl PromptKind {
    /// True for prompts reporting a command that did not take effect.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Info | Self::Diagnostic)
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Diagnostic => "diagnostic",
            Self::NotFound => "not found",
            Self::Ambiguous => "ambiguous",
            Self::NotLiftable => "not liftable",
            Self::Usage => "usage",
            Self::UnknownCommand => "unknown command",
            Self::Error => "error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub kind: PromptKind,
    pub message: String,
}

impl Prompt {
    pub fn new(kind: PromptKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(PromptKind::Info, message)
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(PromptKind::Usage, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(PromptKind::Error, message)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            PromptKind::Info => write!(f, "{}", self.message),
            kind => write!(f, "{}: {}", kind, self.message),
        }
    }
}
