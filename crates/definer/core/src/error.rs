use crate::types::ConceptId;

/// Errors from concept graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("concept not found: {0}")]
    ConceptNotFound(ConceptId),
    #[error("concept {child} cannot be owned by {parent}: ownership would form a cycle")]
    OwnershipCycle { parent: ConceptId, child: ConceptId },
    #[error("concept {0} is listed more than once as a child")]
    DuplicateChild(ConceptId),
    #[error("concept {0} is still attached to a parent and cannot be released")]
    StillAttached(ConceptId),
    #[error("child index {index} out of bounds for concept {concept} ({len} children)")]
    IndexOutOfBounds {
        concept: ConceptId,
        index: usize,
        len: usize,
    },
}

/// Errors from promoting a substructure match into a concept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiftError {
    #[error("match is not liftable: it spans several concepts with partial ranges")]
    NotLiftable,
    #[error("match is empty")]
    EmptyMatch,
    #[error("match lists {concepts} concepts but {ranges} ranges")]
    MalformedMatch { concepts: usize, ranges: usize },
    #[error("matched concepts share no common ancestor")]
    NoCommonAncestor,
    #[error("matched concept {ancestor} contains matched concept {descendant}")]
    NestedConcepts {
        ancestor: ConceptId,
        descendant: ConceptId,
    },
    #[error("range {start}..{end} is invalid for concept {concept} ({len} children)")]
    InvalidRange {
        concept: ConceptId,
        start: usize,
        end: usize,
        len: usize,
    },
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Errors from turning parsed input into concepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("{0}")]
    Grammar(#[from] definer_grammar::GrammarError),
    #[error("unsupported context switch '{tag}' (accepted: {accepted})")]
    UnsupportedContext { tag: String, accepted: String },
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
/// Result type alias for lifting.
pub type LiftResult<T> = Result<T, LiftError>;
/// Result type alias for concept building.
pub type BuildResult<T> = Result<T, BuildError>;
