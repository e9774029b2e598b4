//! Representation matching: re-identifying concepts from free-form input.
//!
//! A concept expands into a [`Expansion`] tree: a choice between each of its
//! representations and, for non-leaves, the positional sequence of its
//! children's expansions. Matching compares such a tree against other
//! concepts, either whole or against a contiguous run of their children.

use crate::error::GraphResult;
use crate::graph::ConceptGraph;
use crate::types::ConceptId;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::trace;

/// Structural description of a concept used as a matcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum Expansion {
    /// Matches a concept with a representation rendering to exactly this text.
    Leaf(String),
    /// Matches when any alternative matches.
    Choice(Vec<Expansion>),
    /// Matches a concept with exactly this many children, position by position.
    Sequence(Vec<Expansion>),
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(text) => write!(f, "{}", text),
            Self::Choice(alternatives) => {
                write!(f, "(")?;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", alt)?;
                }
                write!(f, ")")
            }
            Self::Sequence(items) => {
                write!(f, "<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ">")
            }
        }
    }
}

/// Which part of a concept a substructure match covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRange {
    Whole,
    /// Children `start..end` of the concept.
    Partial { start: usize, end: usize },
}

impl MatchRange {
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}

/// A fragment of the graph matched by an expansion.
///
/// `concepts` and `ranges` are parallel: each concept is covered either
/// whole or over a child range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubstructureMatch {
    pub concepts: Vec<ConceptId>,
    pub ranges: Vec<MatchRange>,
}

impl SubstructureMatch {
    pub fn whole(concept: ConceptId) -> Self {
        Self {
            concepts: vec![concept],
            ranges: vec![MatchRange::Whole],
        }
    }

    pub fn partial(concept: ConceptId, start: usize, end: usize) -> Self {
        Self {
            concepts: vec![concept],
            ranges: vec![MatchRange::Partial { start, end }],
        }
    }

    /// The match is exactly one concept, taken whole.
    pub fn single_whole(&self) -> Option<ConceptId> {
        match (self.concepts.as_slice(), self.ranges.as_slice()) {
            ([concept], [MatchRange::Whole]) => Some(*concept),
            _ => None,
        }
    }

    pub fn partial_count(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_partial()).count()
    }

    /// Readable form, e.g. `[[the cat]] + [sat on](0..1)`.
    pub fn describe(&self, graph: &ConceptGraph) -> String {
        self.concepts
            .iter()
            .zip(&self.ranges)
            .map(|(c, r)| match r {
                MatchRange::Whole => graph.describe(*c),
                MatchRange::Partial { start, end } => {
                    format!("{}({}..{})", graph.describe(*c), start, end)
                }
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Expand a concept into its matcher.
pub fn expand(graph: &ConceptGraph, id: ConceptId) -> GraphResult<Expansion> {
    let node = graph.node(id)?;
    let mut alternatives: Vec<Expansion> = node
        .representations()
        .iter()
        .map(|r| Expansion::Leaf(r.human_friendly()))
        .collect();
    if !node.is_leaf() {
        let children = node
            .children()
            .iter()
            .map(|c| expand(graph, *c))
            .collect::<GraphResult<Vec<_>>>()?;
        alternatives.push(Expansion::Sequence(children));
    }
    Ok(Expansion::Choice(alternatives))
}

/// Result of [`flatten_bounded`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Flattened {
    pub alternatives: Vec<Vec<String>>,
    /// More alternatives existed than the limit allowed.
    pub truncated: bool,
}

/// Every concrete token sequence an expansion can stand for.
pub fn flatten(expr: &Expansion) -> Vec<Vec<String>> {
    flatten_bounded(expr, usize::MAX).alternatives
}

/// Like [`flatten`], but produces at most `limit` alternatives.
pub fn flatten_bounded(expr: &Expansion, limit: usize) -> Flattened {
    let mut truncated = false;
    let alternatives = flatten_limited(expr, limit, &mut truncated);
    Flattened {
        alternatives,
        truncated,
    }
}

fn flatten_limited(expr: &Expansion, limit: usize, truncated: &mut bool) -> Vec<Vec<String>> {
    if limit == 0 {
        *truncated = true;
        return Vec::new();
    }
    match expr {
        Expansion::Leaf(text) => vec![vec![text.clone()]],
        Expansion::Choice(alternatives) => {
            let mut out = Vec::new();
            for alt in alternatives {
                if out.len() >= limit {
                    *truncated = true;
                    break;
                }
                let remaining = limit - out.len();
                out.extend(flatten_limited(alt, remaining, truncated));
            }
            out
        }
        Expansion::Sequence(items) => {
            let mut acc: Vec<Vec<String>> = vec![Vec::new()];
            for item in items {
                let options = flatten_limited(item, limit, truncated);
                let mut next = Vec::new();
                'product: for prefix in &acc {
                    for option in &options {
                        if next.len() >= limit {
                            *truncated = true;
                            break 'product;
                        }
                        let mut combined = prefix.clone();
                        combined.extend(option.iter().cloned());
                        next.push(combined);
                    }
                }
                acc = next;
            }
            acc
        }
    }
}

/// Structural equality between an expansion and a concept.
pub fn matches(graph: &ConceptGraph, expr: &Expansion, id: ConceptId) -> bool {
    let Some(node) = graph.get(id) else {
        return false;
    };
    match expr {
        Expansion::Leaf(text) => node
            .representations()
            .iter()
            .any(|r| r.human_friendly() == *text),
        Expansion::Choice(alternatives) => alternatives.iter().any(|alt| matches(graph, alt, id)),
        Expansion::Sequence(items) => {
            items.len() == node.children().len()
                && items
                    .iter()
                    .zip(node.children())
                    .all(|(item, child)| matches(graph, item, *child))
        }
    }
}

/// Whole and partial matches of `expr` anywhere in the subtree rooted at `id`.
pub fn substructure_matches(
    graph: &ConceptGraph,
    expr: &Expansion,
    id: ConceptId,
) -> GraphResult<Vec<SubstructureMatch>> {
    let mut out = Vec::new();
    collect_substructure_matches(graph, expr, id, &HashSet::new(), &mut out)?;
    Ok(out)
}

fn collect_substructure_matches(
    graph: &ConceptGraph,
    expr: &Expansion,
    id: ConceptId,
    exclude: &HashSet<ConceptId>,
    out: &mut Vec<SubstructureMatch>,
) -> GraphResult<()> {
    let sequences = sequence_alternatives(expr);
    for concept in reachable(graph, &[id], exclude)? {
        if matches(graph, expr, concept) {
            push_unique(out, SubstructureMatch::whole(concept));
        }
        let children = graph.children(concept)?;
        for sequence in &sequences {
            window_matches(graph, sequence, concept, children, out);
            spanning_matches(graph, sequence, children, out)?;
        }
    }
    Ok(())
}

/// The positional sequences an expansion can stand for at its top level.
fn sequence_alternatives(expr: &Expansion) -> Vec<&[Expansion]> {
    match expr {
        Expansion::Leaf(_) => Vec::new(),
        Expansion::Sequence(items) => vec![items.as_slice()],
        Expansion::Choice(alternatives) => alternatives
            .iter()
            .flat_map(sequence_alternatives)
            .collect(),
    }
}

/// A proper contiguous window of `concept`'s children.
fn window_matches(
    graph: &ConceptGraph,
    sequence: &[Expansion],
    concept: ConceptId,
    children: &[ConceptId],
    out: &mut Vec<SubstructureMatch>,
) {
    let k = sequence.len();
    let n = children.len();
    if k == 0 || k >= n {
        return;
    }
    for start in 0..=n - k {
        let window = &children[start..start + k];
        if sequence
            .iter()
            .zip(window)
            .all(|(item, child)| matches(graph, item, *child))
        {
            push_unique(out, SubstructureMatch::partial(concept, start, start + k));
        }
    }
}

/// A window over the grandchildren of adjacent siblings.
///
/// Leaf siblings take part as themselves. Each sibling touched by the
/// window appears once in the match, whole when all of it is covered.
fn spanning_matches(
    graph: &ConceptGraph,
    sequence: &[Expansion],
    siblings: &[ConceptId],
    out: &mut Vec<SubstructureMatch>,
) -> GraphResult<()> {
    struct Entry {
        sibling: usize,
        grandchild: Option<usize>,
        concept: ConceptId,
    }

    let k = sequence.len();
    let mut entries = Vec::new();
    let mut widths = Vec::with_capacity(siblings.len());
    for (s, sibling) in siblings.iter().enumerate() {
        let grandchildren = graph.children(*sibling)?;
        widths.push(grandchildren.len());
        if grandchildren.is_empty() {
            entries.push(Entry {
                sibling: s,
                grandchild: None,
                concept: *sibling,
            });
        } else {
            entries.extend(grandchildren.iter().enumerate().map(|(g, gc)| Entry {
                sibling: s,
                grandchild: Some(g),
                concept: *gc,
            }));
        }
    }

    if k == 0 || entries.len() < k {
        return Ok(());
    }
    for start in 0..=entries.len() - k {
        let window = &entries[start..start + k];
        let first = window[0].sibling;
        let last = window[k - 1].sibling;
        if first == last || window.iter().all(|e| e.grandchild.is_none()) {
            continue;
        }
        if !sequence
            .iter()
            .zip(window)
            .all(|(item, entry)| matches(graph, item, entry.concept))
        {
            continue;
        }

        let mut found = SubstructureMatch {
            concepts: Vec::new(),
            ranges: Vec::new(),
        };
        for s in first..=last {
            let covered: Vec<usize> = window
                .iter()
                .filter(|e| e.sibling == s)
                .filter_map(|e| e.grandchild)
                .collect();
            let range = match (covered.iter().min(), covered.iter().max()) {
                (Some(&lo), Some(&hi)) if lo > 0 || hi + 1 < widths[s] => MatchRange::Partial {
                    start: lo,
                    end: hi + 1,
                },
                _ => MatchRange::Whole,
            };
            found.concepts.push(siblings[s]);
            found.ranges.push(range);
        }
        push_unique(out, found);
    }
    Ok(())
}

fn push_unique(out: &mut Vec<SubstructureMatch>, found: SubstructureMatch) {
    if !out.contains(&found) {
        out.push(found);
    }
}

/// Every concept reachable from `roots` in pre-order, skipping the
/// subtrees of excluded concepts and visiting each concept once.
fn reachable(
    graph: &ConceptGraph,
    roots: &[ConceptId],
    exclude: &HashSet<ConceptId>,
) -> GraphResult<Vec<ConceptId>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for root in roots {
        let mut stack = vec![*root];
        while let Some(current) = stack.pop() {
            if exclude.contains(&current) || !seen.insert(current) {
                continue;
            }
            out.push(current);
            stack.extend(graph.children(current)?.iter().rev().copied());
        }
    }
    Ok(out)
}

/// Concepts under `roots` that match `expr` whole.
pub fn resolve_reference(
    graph: &ConceptGraph,
    roots: &[ConceptId],
    expr: &Expansion,
    exclude: &[ConceptId],
) -> GraphResult<Vec<ConceptId>> {
    let exclude: HashSet<ConceptId> = exclude.iter().copied().collect();
    let found: Vec<ConceptId> = reachable(graph, roots, &exclude)?
        .into_iter()
        .filter(|c| matches(graph, expr, *c))
        .collect();
    trace!(reference = %expr, matches = found.len(), "resolved reference");
    Ok(found)
}

/// Whole and partial matches of `expr` under `roots`.
pub fn resolve_substructure_reference(
    graph: &ConceptGraph,
    roots: &[ConceptId],
    expr: &Expansion,
    exclude: &[ConceptId],
) -> GraphResult<Vec<SubstructureMatch>> {
    let exclude: HashSet<ConceptId> = exclude.iter().copied().collect();
    let mut out = Vec::new();
    let mut visited_roots = HashSet::new();
    for root in roots {
        if visited_roots.insert(*root) {
            collect_substructure_matches(graph, expr, *root, &exclude, &mut out)?;
        }
    }
    trace!(reference = %expr, matches = out.len(), "resolved substructure reference");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NewConcept;
    use crate::representation::{Representation, RepresentationLevel};
    use crate::types::ConceptKind;

    fn word(g: &mut ConceptGraph, parent: ConceptId, text: &str) -> ConceptId {
        g.create(
            NewConcept::new(ConceptKind::Symbol)
                .parent(parent)
                .representation(Representation::new(text, RepresentationLevel::InputMorphism)),
        )
        .unwrap()
    }

    fn statement(g: &mut ConceptGraph, parent: ConceptId, words: &[&str]) -> ConceptId {
        let s = g
            .create(NewConcept::new(ConceptKind::Statement).parent(parent))
            .unwrap();
        for w in words {
            word(g, s, w);
        }
        s
    }

    fn leaf(text: &str) -> Expansion {
        Expansion::Leaf(text.into())
    }

    fn seq(words: &[&str]) -> Expansion {
        Expansion::Sequence(words.iter().map(|w| leaf(w)).collect())
    }

    #[test]
    fn concept_matches_own_expansion() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = statement(&mut g, root, &["the", "cat"]);
        let expr = expand(&g, s).unwrap();
        assert!(matches(&g, &expr, s));
        assert!(matches(&g, &seq(&["the", "cat"]), s));
        assert!(!matches(&g, &seq(&["the"]), s));
        assert!(!matches(&g, &seq(&["cat", "the"]), s));
    }

    #[test]
    fn flatten_products_and_choices() {
        let expr = Expansion::Sequence(vec![
            Expansion::Choice(vec![leaf("a"), leaf("b")]),
            leaf("c"),
        ]);
        assert_eq!(
            flatten(&expr),
            vec![vec!["a".to_string(), "c".into()], vec!["b".into(), "c".into()]]
        );
    }

    #[test]
    fn flatten_contains_preferred_text() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = statement(&mut g, root, &["big", "cat"]);
        let flat = flatten(&expand(&g, s).unwrap());
        assert!(flat.contains(&vec![g.label(s)]));
        assert!(flat.contains(&vec!["big".to_string(), "cat".into()]));
    }

    #[test]
    fn flatten_bounded_truncates() {
        let expr = Expansion::Sequence(vec![
            Expansion::Choice(vec![leaf("a"), leaf("b"), leaf("c")]),
            Expansion::Choice(vec![leaf("x"), leaf("y"), leaf("z")]),
        ]);
        let bounded = flatten_bounded(&expr, 4);
        assert_eq!(bounded.alternatives.len(), 4);
        assert!(bounded.truncated);
        let exact = flatten_bounded(&expr, 9);
        assert_eq!(exact.alternatives.len(), 9);
        assert!(!exact.truncated);
    }

    #[test]
    fn window_match_inside_statement() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = statement(&mut g, root, &["the", "big", "cat", "sat"]);
        let found = substructure_matches(&g, &seq(&["big", "cat"]), root).unwrap();
        assert_eq!(found, vec![SubstructureMatch::partial(s, 1, 3)]);
    }

    #[test]
    fn whole_match_of_single_word() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = statement(&mut g, root, &["the", "cat"]);
        let cat = g.children(s).unwrap()[1];
        let found = substructure_matches(&g, &leaf("cat"), root).unwrap();
        assert_eq!(found, vec![SubstructureMatch::whole(cat)]);
        assert_eq!(found[0].single_whole(), Some(cat));
    }

    #[test]
    fn spanning_match_across_siblings() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let outer = g
            .create(NewConcept::new(ConceptKind::Statement).parent(root))
            .unwrap();
        let left = statement(&mut g, outer, &["a", "b"]);
        let right = statement(&mut g, outer, &["c", "d"]);

        let found = substructure_matches(&g, &seq(&["b", "c"]), root).unwrap();
        assert_eq!(
            found,
            vec![SubstructureMatch {
                concepts: vec![left, right],
                ranges: vec![
                    MatchRange::Partial { start: 1, end: 2 },
                    MatchRange::Partial { start: 0, end: 1 }
                ],
            }]
        );

        let found = substructure_matches(&g, &seq(&["a", "b", "c", "d"]), root).unwrap();
        assert_eq!(
            found,
            vec![SubstructureMatch {
                concepts: vec![left, right],
                ranges: vec![MatchRange::Whole, MatchRange::Whole],
            }]
        );
    }

    #[test]
    fn spanning_match_with_leaf_sibling() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let outer = g
            .create(NewConcept::new(ConceptKind::Statement).parent(root))
            .unwrap();
        let x = word(&mut g, outer, "x");
        let inner = statement(&mut g, outer, &["y", "z"]);
        let found = substructure_matches(&g, &seq(&["x", "y"]), root).unwrap();
        assert_eq!(
            found,
            vec![SubstructureMatch {
                concepts: vec![x, inner],
                ranges: vec![MatchRange::Whole, MatchRange::Partial { start: 0, end: 1 }],
            }]
        );
        assert_eq!(found[0].partial_count(), 1);
    }

    #[test]
    fn resolve_reference_excludes_reference_subtree() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let first = statement(&mut g, root, &["cat"]);
        let reference = statement(&mut g, root, &["cat"]);
        let expr = leaf("cat");
        let found = resolve_reference(&g, &[root], &expr, &[reference]).unwrap();
        assert_eq!(found, vec![g.children(first).unwrap()[0]]);
    }

    #[test]
    fn display_expansion() {
        let expr = Expansion::Choice(vec![leaf("a"), seq(&["b", "c"])]);
        assert_eq!(expr.to_string(), "(a | <b c>)");
    }
}
