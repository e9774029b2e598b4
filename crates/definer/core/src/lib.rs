//! # definer-core
//!
//! The concept graph at the heart of definer.
//!
//! Every piece of user input becomes a *concept*: a node in an owned
//! hierarchy carrying a context of bindings, an optional definition and a
//! ranked list of representations. On top of the graph this crate provides:
//!
//! - [`ConceptBuilder`]: grammar trees into concepts
//! - binding lookup with shadowing ([`ConceptGraph::lookup`])
//! - well-definedness checking ([`DefinitionEngine`]) with pluggable
//!   [`GroupPolicy`] rules and script scope analysis
//! - representation expansion and (sub)structure matching
//! - lifting of matched substructures into new concepts
//!
//! ```
//! use definer_core::{AnalyzerRegistry, ConceptBuilder, ConceptGraph, ConceptKind, NewConcept};
//!
//! let mut graph = ConceptGraph::new();
//! let root = graph.create(NewConcept::new(ConceptKind::Root)).unwrap();
//! let analyzers = AnalyzerRegistry::default();
//! let built = ConceptBuilder::new(&mut graph, &analyzers)
//!     .parse(root, "the cat sat")
//!     .unwrap();
//! assert_eq!(graph.children(built[0]).unwrap().len(), 3);
//! ```

#![deny(unsafe_code)]

pub mod builder;
pub mod context;
pub mod defining;
pub mod error;
pub mod graph;
pub mod lifting;
pub mod matching;
pub mod representation;
pub mod resolver;
pub mod script;
pub mod types;

pub use builder::ConceptBuilder;
pub use context::Context;
pub use defining::{
    ConjunctiveGroupPolicy, Definition, DefinitionEngine, GroupDefinition, GroupPolicy,
    GroupPolicyKind, NotWellDefined, OpaqueGroupPolicy, ScriptDefinition,
};
pub use error::{BuildError, BuildResult, GraphError, GraphResult, LiftError, LiftResult};
pub use graph::{Association, ConceptGraph, ConceptNode, NewConcept};
pub use lifting::{is_liftable, lift};
pub use matching::{
    expand, flatten, flatten_bounded, matches, resolve_reference, resolve_substructure_reference,
    substructure_matches, Expansion, Flattened, MatchRange, SubstructureMatch,
};
pub use representation::{Representation, RepresentationLevel};
pub use resolver::Binding;
pub use script::{
    AnalyzerRegistry, PythonScopeAnalyzer, ScopeAnalyzer, ScriptError, DEFAULT_CONTEXT_TAG,
};
pub use types::{AssociationKind, ConceptId, ConceptKind, Identifier, Value};
