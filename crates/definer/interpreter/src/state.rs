//! Per-session interpreter state.

use crate::error::SessionResult;
use crate::prompt::Prompt;
use definer_core::{ConceptGraph, ConceptId, ConceptKind, GroupPolicyKind, NewConcept};
use serde::{Deserialize, Serialize};

/// Tunables a session is created with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub group_policy: GroupPolicyKind,
    /// Cap on alternatives produced when flattening expansions for display.
    pub max_flattened_alternatives: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            group_policy: GroupPolicyKind::default(),
            max_flattened_alternatives: 256,
        }
    }
}

/// Everything a command handler may read or change.
///
/// Each session owns its graph outright; nothing is shared between sessions.
#[derive(Debug)]
pub struct SessionState {
    pub graph: ConceptGraph,
    /// New input is built under this concept and commands act on it.
    pub current: ConceptId,
    /// Roots searched when resolving references.
    pub top_level: Vec<ConceptId>,
    pub prompts: Vec<Prompt>,
    pub settings: SessionSettings,
}

impl SessionState {
    /// A fresh state holding a single empty root concept, which is current.
    pub fn new(settings: SessionSettings) -> SessionResult<Self> {
        let mut graph = ConceptGraph::new();
        let root = graph.create(NewConcept::new(ConceptKind::Root))?;
        Ok(Self {
            graph,
            current: root,
            top_level: vec![root],
            prompts: Vec::new(),
            settings,
        })
    }

    pub fn prompt(&mut self, prompt: Prompt) {
        self.prompts.push(prompt);
    }

    /// Readable form of the current concept.
    pub fn current_label(&self) -> String {
        self.graph.describe(self.current)
    }
}
