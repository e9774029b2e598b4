//! The concept graph: an arena of concepts joined by single-owner
//! parent/children edges and non-owning associations.

use crate::context::Context;
use crate::defining::Definition;
use crate::error::{GraphError, GraphResult};
use crate::representation::{Representation, RepresentationLevel};
use crate::types::{AssociationKind, ConceptId, ConceptKind, Identifier, Value};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// One end of a non-owning association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Association {
    pub kind: AssociationKind,
    pub other: ConceptId,
}

/// A node in the concept graph.
#[derive(Clone, Debug)]
pub struct ConceptNode {
    id: ConceptId,
    kind: ConceptKind,
    identifier: Identifier,
    parent: Option<ConceptId>,
    children: Vec<ConceptId>,
    context: Context,
    /// Most preferred first. Always ends with the two identity representations.
    representations: Vec<Representation>,
    /// Associations where this concept is the source.
    associations: Vec<Association>,
    /// Associations where this concept is the target.
    associated_by: Vec<Association>,
}

impl ConceptNode {
    pub fn id(&self) -> ConceptId {
        self.id
    }

    pub fn kind(&self) -> ConceptKind {
        self.kind
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn parent(&self) -> Option<ConceptId> {
        self.parent
    }

    pub fn children(&self) -> &[ConceptId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    /// The first representation. Never absent: identity representations
    /// are appended on creation.
    pub fn preferred_representation(&self) -> &Representation {
        &self.representations[0]
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn associated_by(&self) -> &[Association] {
        &self.associated_by
    }
}

/// Parameters for [`ConceptGraph::create`].
#[derive(Clone, Debug)]
pub struct NewConcept {
    kind: ConceptKind,
    parent: Option<ConceptId>,
    children: Vec<ConceptId>,
    context: Context,
    representations: Vec<Representation>,
    identifier: Option<Identifier>,
}

impl NewConcept {
    pub fn new(kind: ConceptKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            context: Context::new(),
            representations: Vec::new(),
            identifier: None,
        }
    }

    pub fn parent(mut self, parent: ConceptId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn children(mut self, children: Vec<ConceptId>) -> Self {
        self.children = children;
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn representation(mut self, representation: Representation) -> Self {
        self.representations.push(representation);
        self
    }

    pub fn identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }
}

/// Arena owning every concept of one session.
#[derive(Debug, Default)]
pub struct ConceptGraph {
    nodes: Vec<Option<ConceptNode>>,
    live: usize,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live concepts.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// The handle the next created concept will receive.
    pub fn next_id(&self) -> ConceptId {
        ConceptId::new(self.nodes.len() as u64)
    }

    pub fn contains(&self, id: ConceptId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: ConceptId) -> Option<&ConceptNode> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node(&self, id: ConceptId) -> GraphResult<&ConceptNode> {
        self.get(id).ok_or(GraphError::ConceptNotFound(id))
    }

    fn node_mut(&mut self, id: ConceptId) -> GraphResult<&mut ConceptNode> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(GraphError::ConceptNotFound(id))
    }

    /// Handles of every live concept, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ConceptId> + '_ {
        self.nodes.iter().flatten().map(|n| n.id)
    }

    /// Create a concept.
    ///
    /// The new concept registers itself with `parent` (appended last),
    /// takes ownership of `children` (detaching them from their previous
    /// owners) and gets the two identity representations appended.
    pub fn create(&mut self, spec: NewConcept) -> GraphResult<ConceptId> {
        if let Some(parent) = spec.parent {
            self.node(parent)?;
        }
        let mut seen = HashSet::new();
        for &child in &spec.children {
            self.node(child)?;
            if !seen.insert(child) {
                return Err(GraphError::DuplicateChild(child));
            }
            if let Some(parent) = spec.parent {
                if child == parent || self.is_ancestor_of(child, parent) {
                    return Err(GraphError::OwnershipCycle { parent, child });
                }
            }
        }

        let id = self.next_id();
        let identifier = spec
            .identifier
            .unwrap_or(Identifier::Assigned { id: id.raw() });
        let mut representations = spec.representations;
        representations.push(Representation::new(
            format!("#|id={}|#", identifier),
            RepresentationLevel::Identity,
        ));
        representations.push(Representation::new(
            format!("#|{} id={}|#", spec.kind, identifier),
            RepresentationLevel::Identity,
        ));

        self.nodes.push(Some(ConceptNode {
            id,
            kind: spec.kind,
            identifier,
            parent: None,
            children: Vec::with_capacity(spec.children.len()),
            context: spec.context,
            representations,
            associations: Vec::new(),
            associated_by: Vec::new(),
        }));
        self.live += 1;

        for child in spec.children {
            self.attach(id, child, None)?;
        }
        if let Some(parent) = spec.parent {
            self.attach(parent, id, None)?;
        }

        debug!(concept = %id, kind = %spec.kind, "created concept");
        Ok(id)
    }

    /// Move `child` under `parent` at `index`, detaching it from its current owner.
    pub fn insert_child_at(
        &mut self,
        parent: ConceptId,
        child: ConceptId,
        index: usize,
    ) -> GraphResult<()> {
        let current_len = self.node(parent)?.children.len();
        let child_parent = self.node(child)?.parent;
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(GraphError::OwnershipCycle { parent, child });
        }
        let len = if child_parent == Some(parent) {
            current_len - 1
        } else {
            current_len
        };
        if index > len {
            return Err(GraphError::IndexOutOfBounds {
                concept: parent,
                index,
                len,
            });
        }
        self.attach(parent, child, Some(index))
    }

    fn attach(
        &mut self,
        parent: ConceptId,
        child: ConceptId,
        index: Option<usize>,
    ) -> GraphResult<()> {
        self.unlink(child)?;
        let parent_node = self.node_mut(parent)?;
        match index {
            Some(i) => parent_node.children.insert(i, child),
            None => parent_node.children.push(child),
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach a concept from its parent. Idempotent.
    pub fn unlink(&mut self, id: ConceptId) -> GraphResult<()> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        if let Ok(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        debug!(concept = %id, parent = %parent, "unlinked concept");
        Ok(())
    }

    /// Free a detached concept together with its whole owned subtree.
    ///
    /// Association back-references held by surviving concepts are removed.
    /// Returns the number of concepts freed.
    pub fn release(&mut self, id: ConceptId) -> GraphResult<usize> {
        if self.node(id)?.parent.is_some() {
            return Err(GraphError::StillAttached(id));
        }

        let doomed = self.descendants(id)?;
        let doomed_set: HashSet<ConceptId> = doomed.iter().copied().collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for d in &doomed {
            if let Some(node) = self.nodes.get_mut(d.index()).and_then(Option::take) {
                removed.push(node);
            }
        }
        self.live -= removed.len();

        for node in &removed {
            for assoc in &node.associations {
                if doomed_set.contains(&assoc.other) {
                    continue;
                }
                if let Ok(other) = self.node_mut(assoc.other) {
                    other.associated_by.retain(|a| a.other != node.id);
                }
            }
            for assoc in &node.associated_by {
                if doomed_set.contains(&assoc.other) {
                    continue;
                }
                if let Ok(other) = self.node_mut(assoc.other) {
                    other.associations.retain(|a| a.other != node.id);
                }
            }
        }

        debug!(concept = %id, freed = removed.len(), "released concept subtree");
        Ok(removed.len())
    }

    // ── Context ──────────────────────────────────────────────────────

    pub fn context(&self, id: ConceptId) -> GraphResult<&Context> {
        Ok(&self.node(id)?.context)
    }

    /// Bind `identifier` in the concept's own context. Last bind wins.
    pub fn bind(
        &mut self,
        id: ConceptId,
        identifier: impl Into<String>,
        value: Value,
    ) -> GraphResult<Option<Value>> {
        let identifier = identifier.into();
        debug!(concept = %id, identifier = %identifier, value = %value, "bind");
        Ok(self.node_mut(id)?.context.bind(identifier, value))
    }

    pub fn bind_definition(
        &mut self,
        id: ConceptId,
        definition: Definition,
    ) -> GraphResult<Option<Definition>> {
        Ok(self.node_mut(id)?.context.set_definition(definition))
    }

    pub fn take_definition(&mut self, id: ConceptId) -> GraphResult<Option<Definition>> {
        Ok(self.node_mut(id)?.context.take_definition())
    }

    // ── Representations ──────────────────────────────────────────────

    pub fn representations(&self, id: ConceptId) -> GraphResult<&[Representation]> {
        Ok(&self.node(id)?.representations)
    }

    pub fn preferred_representation(&self, id: ConceptId) -> GraphResult<&Representation> {
        Ok(self.node(id)?.preferred_representation())
    }

    /// Prepend a representation, making it the preferred one.
    ///
    /// An equal representation already present is moved to the front.
    pub fn add_representation(
        &mut self,
        id: ConceptId,
        representation: Representation,
    ) -> GraphResult<()> {
        let node = self.node_mut(id)?;
        node.representations.retain(|r| *r != representation);
        node.representations.insert(0, representation);
        Ok(())
    }

    /// Preferred rendering of a concept, tolerant of released handles.
    pub fn label(&self, id: ConceptId) -> String {
        match self.get(id) {
            Some(node) => node.preferred_representation().human_friendly(),
            None => format!("<released {}>", id),
        }
    }

    /// Readable summary: the preferred representation, or the bracketed
    /// summaries of the children when only identity representations exist.
    pub fn describe(&self, id: ConceptId) -> String {
        let Some(node) = self.get(id) else {
            return self.label(id);
        };
        let preferred = node.preferred_representation();
        if !preferred.is_identity() || node.children.is_empty() {
            return preferred.human_friendly();
        }
        let parts: Vec<String> = node.children.iter().map(|c| self.describe(*c)).collect();
        format!("[{}]", parts.join(" "))
    }

    // ── Structure ────────────────────────────────────────────────────

    pub fn parent(&self, id: ConceptId) -> GraphResult<Option<ConceptId>> {
        Ok(self.node(id)?.parent)
    }

    pub fn children(&self, id: ConceptId) -> GraphResult<&[ConceptId]> {
        Ok(&self.node(id)?.children)
    }

    /// Strict ancestors, outermost first.
    pub fn ancestors(&self, id: ConceptId) -> GraphResult<Vec<ConceptId>> {
        let mut chain = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.node(p)?.parent;
        }
        chain.reverse();
        Ok(chain)
    }

    /// The concept and everything it owns, in pre-order.
    pub fn descendants(&self, id: ConceptId) -> GraphResult<Vec<ConceptId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.node(current)?;
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    /// True when `ancestor` strictly owns `descendant`, directly or transitively.
    pub fn is_ancestor_of(&self, ancestor: ConceptId, descendant: ConceptId) -> bool {
        let mut current = self.get(descendant).and_then(|n| n.parent);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.get(p).and_then(|n| n.parent);
        }
        false
    }

    // ── Associations ─────────────────────────────────────────────────

    /// Record that `from` is a `kind` of `to`. Idempotent.
    pub fn associate(
        &mut self,
        from: ConceptId,
        to: ConceptId,
        kind: AssociationKind,
    ) -> GraphResult<()> {
        self.node(to)?;
        let outgoing = Association { kind, other: to };
        let from_node = self.node_mut(from)?;
        if from_node.associations.contains(&outgoing) {
            return Ok(());
        }
        from_node.associations.push(outgoing);
        self.node_mut(to)?
            .associated_by
            .push(Association { kind, other: from });
        Ok(())
    }

    /// Remove an association. Returns whether it existed.
    pub fn dissociate(
        &mut self,
        from: ConceptId,
        to: ConceptId,
        kind: AssociationKind,
    ) -> GraphResult<bool> {
        self.node(to)?;
        let from_node = self.node_mut(from)?;
        let before = from_node.associations.len();
        from_node
            .associations
            .retain(|a| !(a.kind == kind && a.other == to));
        let existed = from_node.associations.len() != before;
        self.node_mut(to)?
            .associated_by
            .retain(|a| !(a.kind == kind && a.other == from));
        Ok(existed)
    }

    /// Targets of `id`'s outgoing associations of `kind`.
    pub fn associations(&self, id: ConceptId, kind: AssociationKind) -> GraphResult<Vec<ConceptId>> {
        Ok(self
            .node(id)?
            .associations
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.other)
            .collect())
    }

    /// Sources of associations of `kind` that point at `id`.
    pub fn associated_by(&self, id: ConceptId, kind: AssociationKind) -> GraphResult<Vec<ConceptId>> {
        Ok(self
            .node(id)?
            .associated_by
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.other)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(graph: &mut ConceptGraph, parent: ConceptId, text: &str) -> ConceptId {
        graph
            .create(
                NewConcept::new(ConceptKind::Symbol)
                    .parent(parent)
                    .representation(Representation::new(text, RepresentationLevel::InputMorphism)),
            )
            .unwrap()
    }

    fn root(graph: &mut ConceptGraph) -> ConceptId {
        graph.create(NewConcept::new(ConceptKind::Root)).unwrap()
    }

    #[test]
    fn create_registers_with_parent() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        let b = word(&mut g, r, "b");
        assert_eq!(g.children(r).unwrap(), &[a, b]);
        assert_eq!(g.parent(a).unwrap(), Some(r));
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn identity_representations_are_last() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        let reps = g.representations(a).unwrap();
        assert_eq!(reps.len(), 3);
        assert_eq!(reps[0].raw(), "a");
        assert_eq!(reps[1].raw(), format!("#|id={}|#", a.raw()));
        assert_eq!(reps[2].raw(), format!("#|Symbol id={}|#", a.raw()));
        assert!(reps[1].is_identity() && reps[2].is_identity());
    }

    #[test]
    fn tagged_identifier_in_identity_representation() {
        let mut g = ConceptGraph::new();
        let tag = g.next_id().raw();
        let c = g
            .create(NewConcept::new(ConceptKind::Command).identifier(Identifier::Tagged {
                name: "bind".into(),
                tag,
            }))
            .unwrap();
        assert_eq!(
            g.preferred_representation(c).unwrap().raw(),
            format!("#|id=bind/{}|#", tag)
        );
    }

    #[test]
    fn create_reparents_children() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        let b = word(&mut g, r, "b");
        let c = word(&mut g, r, "c");
        let group = g
            .create(NewConcept::new(ConceptKind::Lifted).children(vec![a, b]))
            .unwrap();
        assert_eq!(g.children(r).unwrap(), &[c]);
        assert_eq!(g.children(group).unwrap(), &[a, b]);
        assert_eq!(g.parent(a).unwrap(), Some(group));
    }

    #[test]
    fn create_rejects_cycles_and_duplicates() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        let err = g
            .create(NewConcept::new(ConceptKind::Lifted).parent(a).children(vec![r]))
            .unwrap_err();
        assert!(matches!(err, GraphError::OwnershipCycle { .. }));
        let err = g
            .create(NewConcept::new(ConceptKind::Lifted).children(vec![a, a]))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateChild(a));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn unlink_is_idempotent() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        g.unlink(a).unwrap();
        g.unlink(a).unwrap();
        assert!(g.children(r).unwrap().is_empty());
        assert_eq!(g.parent(a).unwrap(), None);
    }

    #[test]
    fn release_requires_detached() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        assert_eq!(g.release(a), Err(GraphError::StillAttached(a)));
        g.unlink(a).unwrap();
        assert_eq!(g.release(a), Ok(1));
        assert!(!g.contains(a));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn release_frees_subtree_and_scrubs_associations() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let keep = word(&mut g, r, "keep");
        let doomed = g.create(NewConcept::new(ConceptKind::Statement)).unwrap();
        let inner = word(&mut g, doomed, "inner");
        g.associate(inner, keep, AssociationKind::Representation).unwrap();
        g.associate(keep, doomed, AssociationKind::Piece).unwrap();

        assert_eq!(g.release(doomed).unwrap(), 2);
        assert!(!g.contains(inner));
        assert!(g.node(keep).unwrap().associations().is_empty());
        assert!(g.node(keep).unwrap().associated_by().is_empty());
    }

    #[test]
    fn handles_are_not_reused() {
        let mut g = ConceptGraph::new();
        let a = root(&mut g);
        g.release(a).unwrap();
        let b = root(&mut g);
        assert_ne!(a, b);
        assert!(g.node(a).is_err());
    }

    #[test]
    fn insert_child_at_moves_within_parent() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        let b = word(&mut g, r, "b");
        let c = word(&mut g, r, "c");
        g.insert_child_at(r, c, 0).unwrap();
        assert_eq!(g.children(r).unwrap(), &[c, a, b]);
        assert!(matches!(
            g.insert_child_at(r, a, 3),
            Err(GraphError::IndexOutOfBounds { .. })
        ));
        assert_eq!(g.children(r).unwrap(), &[c, a, b]);
    }

    #[test]
    fn add_representation_prepends() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let a = word(&mut g, r, "a");
        g.add_representation(a, Representation::new("alpha", RepresentationLevel::UserSupplied))
            .unwrap();
        assert_eq!(g.label(a), "alpha");
        g.add_representation(a, Representation::new("a", RepresentationLevel::UserSupplied))
            .unwrap();
        assert_eq!(g.label(a), "a");
        assert_eq!(g.representations(a).unwrap().len(), 4);
    }

    #[test]
    fn ancestors_and_descendants() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        let s = g
            .create(NewConcept::new(ConceptKind::Statement).parent(r))
            .unwrap();
        let a = word(&mut g, s, "a");
        let b = word(&mut g, s, "b");
        assert_eq!(g.ancestors(a).unwrap(), vec![r, s]);
        assert_eq!(g.descendants(r).unwrap(), vec![r, s, a, b]);
        assert!(g.is_ancestor_of(r, b));
        assert!(!g.is_ancestor_of(a, b));
        assert_eq!(g.describe(s), "[a b]");
    }

    #[test]
    fn bind_last_wins() {
        let mut g = ConceptGraph::new();
        let r = root(&mut g);
        g.bind(r, "x", Value::Literal("1".into())).unwrap();
        g.bind(r, "x", Value::Literal("2".into())).unwrap();
        assert_eq!(
            g.context(r).unwrap().get("x"),
            Some(&Value::Literal("2".into()))
        );
    }
}
