//! Definitions and the well-definedness check.
//!
//! A concept is well-defined when its definition's free identifiers each
//! resolve to exactly one binding visible from the owning concept.

use crate::error::GraphResult;
use crate::graph::ConceptGraph;
use crate::resolver::Binding;
use crate::script::{ScopeAnalyzer, ScriptError};
use crate::types::ConceptId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// A definition written in an embedded scripting language.
///
/// The free identifiers are computed once, when the definition is built.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScriptDefinition {
    concept: ConceptId,
    language: String,
    source: String,
    free_identifiers: Result<Vec<String>, ScriptError>,
}

impl ScriptDefinition {
    pub fn new(concept: ConceptId, analyzer: &dyn ScopeAnalyzer, source: impl Into<String>) -> Self {
        let source = source.into();
        let free_identifiers = analyzer.free_identifiers(&source);
        Self {
            concept,
            language: analyzer.language().to_string(),
            source,
            free_identifiers,
        }
    }

    pub fn concept(&self) -> ConceptId {
        self.concept
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn free_identifiers(&self) -> Result<&[String], &ScriptError> {
        self.free_identifiers.as_deref()
    }
}

/// The combined definitions of a concept's children.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupDefinition {
    pub concept: ConceptId,
    pub inner: Vec<Definition>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    /// A leaf with nothing bound: never well-defined.
    Undefined { concept: ConceptId },
    Script(ScriptDefinition),
    Group(GroupDefinition),
}

impl Definition {
    /// The concept the definition belongs to. Lookups start here.
    pub fn concept(&self) -> ConceptId {
        match self {
            Self::Undefined { concept } => *concept,
            Self::Script(script) => script.concept,
            Self::Group(group) => group.concept,
        }
    }

    /// The same definition, owned by another concept.
    pub fn with_owner(self, concept: ConceptId) -> Self {
        match self {
            Self::Undefined { .. } => Self::Undefined { concept },
            Self::Script(script) => Self::Script(ScriptDefinition { concept, ..script }),
            Self::Group(group) => Self::Group(GroupDefinition {
                concept,
                inner: group.inner,
            }),
        }
    }
}

/// Why a definition is not well-defined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotWellDefined {
    ConceptUndefined {
        concept: ConceptId,
    },
    MissingBinding {
        concept: ConceptId,
        name: String,
    },
    AmbiguousBinding {
        concept: ConceptId,
        name: String,
        bindings: Vec<Binding>,
    },
    SyntaxError {
        concept: ConceptId,
        error: ScriptError,
    },
}

impl NotWellDefined {
    pub fn concept(&self) -> ConceptId {
        match self {
            Self::ConceptUndefined { concept }
            | Self::MissingBinding { concept, .. }
            | Self::AmbiguousBinding { concept, .. }
            | Self::SyntaxError { concept, .. } => *concept,
        }
    }

    /// User-facing text, with concepts rendered through their representations.
    pub fn describe(&self, graph: &ConceptGraph) -> String {
        match self {
            Self::ConceptUndefined { concept } => {
                format!("Concept-Undefined: {} has no definition", graph.describe(*concept))
            }
            Self::MissingBinding { concept, name } => format!(
                "Missing-Binding: '{}' is not bound anywhere visible from {}",
                name,
                graph.describe(*concept)
            ),
            Self::AmbiguousBinding {
                concept,
                name,
                bindings,
            } => {
                let owners: Vec<String> = bindings
                    .iter()
                    .filter_map(Binding::owner)
                    .map(|o| graph.describe(o))
                    .collect();
                format!(
                    "Ambiguous-Binding: '{}' has {} bindings visible from {} (in {})",
                    name,
                    bindings.len(),
                    graph.describe(*concept),
                    owners.join(", ")
                )
            }
            Self::SyntaxError { concept, error } => {
                format!("Syntax-Error in {}: {}", graph.describe(*concept), error)
            }
        }
    }
}

impl fmt::Display for NotWellDefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConceptUndefined { concept } => {
                write!(f, "NotWellDefined[Concept-Undefined: {}]", concept)
            }
            Self::MissingBinding { name, .. } => {
                write!(f, "NotWellDefined[Missing-Binding: '{}']", name)
            }
            Self::AmbiguousBinding { name, bindings, .. } => write!(
                f,
                "NotWellDefined[Ambiguous-Binding: '{}' x{}]",
                name,
                bindings.len()
            ),
            Self::SyntaxError { error, .. } => write!(f, "NotWellDefined[Syntax-Error: {}]", error),
        }
    }
}

/// Decides whether a group of child definitions is well-defined.
pub trait GroupPolicy: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn check_group(
        &self,
        group: &GroupDefinition,
        engine: &DefinitionEngine<'_>,
    ) -> GraphResult<Vec<NotWellDefined>>;
}

/// A group is never well-defined; it reports its owner as undefined.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueGroupPolicy;

impl GroupPolicy for OpaqueGroupPolicy {
    fn name(&self) -> &'static str {
        "opaque"
    }

    fn check_group(
        &self,
        group: &GroupDefinition,
        _engine: &DefinitionEngine<'_>,
    ) -> GraphResult<Vec<NotWellDefined>> {
        Ok(vec![NotWellDefined::ConceptUndefined {
            concept: group.concept,
        }])
    }
}

/// A group is well-defined when every inner definition is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjunctiveGroupPolicy;

impl GroupPolicy for ConjunctiveGroupPolicy {
    fn name(&self) -> &'static str {
        "conjunctive"
    }

    fn check_group(
        &self,
        group: &GroupDefinition,
        engine: &DefinitionEngine<'_>,
    ) -> GraphResult<Vec<NotWellDefined>> {
        let mut out = Vec::new();
        for inner in &group.inner {
            out.extend(engine.not_well_defined(inner)?);
        }
        Ok(out)
    }
}

/// Configurable choice of [`GroupPolicy`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPolicyKind {
    #[default]
    Opaque,
    Conjunctive,
}

impl GroupPolicyKind {
    pub fn policy(&self) -> &'static dyn GroupPolicy {
        match self {
            Self::Opaque => &OpaqueGroupPolicy,
            Self::Conjunctive => &ConjunctiveGroupPolicy,
        }
    }
}

/// Computes definitions and their diagnostics over a graph.
#[derive(Debug)]
pub struct DefinitionEngine<'g> {
    graph: &'g ConceptGraph,
    policy: &'g dyn GroupPolicy,
}

impl<'g> DefinitionEngine<'g> {
    pub fn new(graph: &'g ConceptGraph) -> Self {
        Self {
            graph,
            policy: &OpaqueGroupPolicy,
        }
    }

    pub fn with_policy(graph: &'g ConceptGraph, policy: &'g dyn GroupPolicy) -> Self {
        Self { graph, policy }
    }

    pub fn graph(&self) -> &ConceptGraph {
        self.graph
    }

    /// The definition bound to a concept; otherwise `Undefined` for a leaf
    /// or the group of its children's possible definitions.
    pub fn possible_definition(&self, id: ConceptId) -> GraphResult<Definition> {
        let node = self.graph.node(id)?;
        if let Some(definition) = node.context().definition() {
            return Ok(definition.clone());
        }
        if node.is_leaf() {
            return Ok(Definition::Undefined { concept: id });
        }
        let inner = node
            .children()
            .iter()
            .map(|c| self.possible_definition(*c))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Definition::Group(GroupDefinition { concept: id, inner }))
    }

    pub fn not_well_defined(&self, definition: &Definition) -> GraphResult<Vec<NotWellDefined>> {
        match definition {
            Definition::Undefined { concept } => {
                Ok(vec![NotWellDefined::ConceptUndefined { concept: *concept }])
            }
            Definition::Script(script) => self.check_script(script),
            Definition::Group(group) => self.policy.check_group(group, self),
        }
    }

    fn check_script(&self, script: &ScriptDefinition) -> GraphResult<Vec<NotWellDefined>> {
        let concept = script.concept();
        let names = match script.free_identifiers() {
            Ok(names) => names,
            Err(error) => {
                return Ok(vec![NotWellDefined::SyntaxError {
                    concept,
                    error: error.clone(),
                }])
            }
        };

        let mut out = Vec::new();
        for name in names {
            let bindings = self.graph.lookup(concept, name)?;
            match bindings.len() {
                0 => out.push(NotWellDefined::MissingBinding {
                    concept,
                    name: name.clone(),
                }),
                1 => {}
                _ => out.push(NotWellDefined::AmbiguousBinding {
                    concept,
                    name: name.clone(),
                    bindings,
                }),
            }
        }
        Ok(out)
    }

    pub fn is_well_defined(&self, definition: &Definition) -> GraphResult<bool> {
        Ok(self.not_well_defined(definition)?.is_empty())
    }

    /// Diagnostics for a concept's possible definition.
    pub fn check(&self, id: ConceptId) -> GraphResult<Vec<NotWellDefined>> {
        let definition = self.possible_definition(id)?;
        let diagnostics = self.not_well_defined(&definition)?;
        debug!(
            concept = %id,
            policy = self.policy.name(),
            diagnostics = diagnostics.len(),
            "checked definition"
        );
        Ok(diagnostics)
    }
}
