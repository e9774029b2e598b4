//! Session error types

use definer_core::{BuildError, GraphError, LiftError};
use definer_grammar::GrammarError;
use thiserror::Error;

/// Errors that abort a whole input line.
///
/// Command-level trouble (unresolved references, unliftable matches) is
/// reported through prompts instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Lift error: {0}")]
    Lift(#[from] LiftError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
