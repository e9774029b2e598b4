//! Promotion of a matched substructure into a concept of its own.

use crate::error::{GraphError, LiftError, LiftResult};
use crate::graph::{ConceptGraph, NewConcept};
use crate::matching::{MatchRange, SubstructureMatch};
use crate::types::{AssociationKind, ConceptId, ConceptKind};
use std::collections::HashSet;
use tracing::info;

/// A match can be lifted when it has no partial ranges, or addresses a
/// single concept.
pub fn is_liftable(found: &SubstructureMatch) -> bool {
    found.partial_count() == 0 || found.concepts.len() == 1
}

/// Turn a match into one concept and return it.
///
/// - A single concept matched whole is returned unchanged.
/// - A single child range becomes a new concept owned by that concept,
///   taking the place of the range.
/// - Several concepts matched whole move under a new concept owned by
///   their lowest common ancestor, inserted where the first of them was.
///
/// Nothing is mutated when the lift is refused.
pub fn lift(graph: &mut ConceptGraph, found: &SubstructureMatch) -> LiftResult<ConceptId> {
    if found.concepts.is_empty() {
        return Err(LiftError::EmptyMatch);
    }
    if found.concepts.len() != found.ranges.len() {
        return Err(LiftError::MalformedMatch {
            concepts: found.concepts.len(),
            ranges: found.ranges.len(),
        });
    }
    if !is_liftable(found) {
        return Err(LiftError::NotLiftable);
    }
    for concept in &found.concepts {
        graph.node(*concept)?;
    }

    match (found.concepts.as_slice(), found.ranges.as_slice()) {
        ([concept], [MatchRange::Partial { start, end }]) => {
            lift_range(graph, *concept, *start, *end)
        }
        ([concept], [MatchRange::Whole]) => Ok(*concept),
        (concepts, _) => lift_whole(graph, concepts),
    }
}

fn lift_range(
    graph: &mut ConceptGraph,
    concept: ConceptId,
    start: usize,
    end: usize,
) -> LiftResult<ConceptId> {
    let children = graph.children(concept)?;
    if start >= end || end > children.len() {
        return Err(LiftError::InvalidRange {
            concept,
            start,
            end,
            len: children.len(),
        });
    }
    let range = children[start..end].to_vec();

    let lifted = graph.create(NewConcept::new(ConceptKind::Lifted).children(range))?;
    graph.insert_child_at(concept, lifted, start)?;
    info!(concept = %lifted, owner = %concept, start, end, "lifted child range");
    Ok(lifted)
}

fn lift_whole(graph: &mut ConceptGraph, concepts: &[ConceptId]) -> LiftResult<ConceptId> {
    let mut seen = HashSet::new();
    for concept in concepts {
        if !seen.insert(*concept) {
            return Err(GraphError::DuplicateChild(*concept).into());
        }
    }
    for &a in concepts {
        for &b in concepts {
            if a != b && graph.is_ancestor_of(a, b) {
                return Err(LiftError::NestedConcepts {
                    ancestor: a,
                    descendant: b,
                });
            }
        }
    }

    let chains = concepts
        .iter()
        .map(|c| graph.ancestors(*c))
        .collect::<Result<Vec<_>, _>>()?;
    let common = common_prefix_len(&chains);
    if common == 0 {
        return Err(LiftError::NoCommonAncestor);
    }
    let ancestor = chains[0][common - 1];

    // The ancestor's child that holds each matched concept (or is it).
    let ancestor_children = graph.children(ancestor)?;
    let position = concepts
        .iter()
        .zip(&chains)
        .filter_map(|(concept, chain)| {
            let branch = chain.get(common).copied().unwrap_or(*concept);
            ancestor_children.iter().position(|c| *c == branch)
        })
        .min()
        .ok_or(LiftError::NoCommonAncestor)?;

    let previous_owners: Vec<(ConceptId, ConceptId)> = concepts
        .iter()
        .zip(&chains)
        .filter_map(|(concept, chain)| chain.last().map(|owner| (*concept, *owner)))
        .collect();

    let lifted = graph.create(NewConcept::new(ConceptKind::Lifted).children(concepts.to_vec()))?;
    graph.insert_child_at(ancestor, lifted, position)?;
    for (concept, owner) in previous_owners {
        if owner != ancestor {
            graph.associate(concept, owner, AssociationKind::Piece)?;
        }
    }

    info!(
        concept = %lifted,
        owner = %ancestor,
        members = concepts.len(),
        "lifted concepts"
    );
    Ok(lifted)
}

fn common_prefix_len(chains: &[Vec<ConceptId>]) -> usize {
    let Some(first) = chains.first() else {
        return 0;
    };
    let mut len = first.len();
    for chain in &chains[1..] {
        len = len.min(
            first
                .iter()
                .zip(chain)
                .take_while(|(a, b)| a == b)
                .count(),
        );
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::{Representation, RepresentationLevel};

    fn word(g: &mut ConceptGraph, parent: ConceptId, text: &str) -> ConceptId {
        g.create(
            NewConcept::new(ConceptKind::Symbol)
                .parent(parent)
                .representation(Representation::new(text, RepresentationLevel::InputMorphism)),
        )
        .unwrap()
    }

    fn node(g: &mut ConceptGraph, parent: ConceptId) -> ConceptId {
        g.create(NewConcept::new(ConceptKind::Statement).parent(parent))
            .unwrap()
    }

    #[test]
    fn liftability() {
        let a = ConceptId::new(1);
        let b = ConceptId::new(2);
        assert!(is_liftable(&SubstructureMatch::whole(a)));
        assert!(is_liftable(&SubstructureMatch::partial(a, 0, 1)));
        assert!(is_liftable(&SubstructureMatch {
            concepts: vec![a, b],
            ranges: vec![MatchRange::Whole, MatchRange::Whole],
        }));
        assert!(!is_liftable(&SubstructureMatch {
            concepts: vec![a, b],
            ranges: vec![MatchRange::Whole, MatchRange::Partial { start: 0, end: 1 }],
        }));
    }

    #[test]
    fn range_lift_replaces_children_in_place() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = node(&mut g, root);
        let the = word(&mut g, s, "the");
        let big = word(&mut g, s, "big");
        let cat = word(&mut g, s, "cat");
        let sat = word(&mut g, s, "sat");

        let lifted = lift(&mut g, &SubstructureMatch::partial(s, 1, 3)).unwrap();
        assert_eq!(g.children(s).unwrap(), &[the, lifted, sat]);
        assert_eq!(g.children(lifted).unwrap(), &[big, cat]);
        assert_eq!(g.node(lifted).unwrap().kind(), ConceptKind::Lifted);
    }

    #[test]
    fn whole_lift_under_common_ancestor() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let keep = node(&mut g, root);
        let left = node(&mut g, root);
        let a = word(&mut g, left, "a");
        let right = node(&mut g, root);
        let b = word(&mut g, right, "b");

        let found = SubstructureMatch {
            concepts: vec![a, b],
            ranges: vec![MatchRange::Whole, MatchRange::Whole],
        };
        let lifted = lift(&mut g, &found).unwrap();
        assert_eq!(g.children(lifted).unwrap(), &[a, b]);
        assert_eq!(g.children(root).unwrap(), &[keep, lifted, left, right]);
        assert!(g.children(left).unwrap().is_empty());
        assert!(g.children(right).unwrap().is_empty());
        assert_eq!(g.associations(a, AssociationKind::Piece).unwrap(), vec![left]);
    }

    #[test]
    fn whole_lift_of_direct_children_takes_first_position() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let x = word(&mut g, root, "x");
        let a = word(&mut g, root, "a");
        let y = word(&mut g, root, "y");
        let b = word(&mut g, root, "b");

        let found = SubstructureMatch {
            concepts: vec![a, b],
            ranges: vec![MatchRange::Whole, MatchRange::Whole],
        };
        let lifted = lift(&mut g, &found).unwrap();
        assert_eq!(g.children(root).unwrap(), &[x, lifted, y]);
        assert_eq!(g.children(lifted).unwrap(), &[a, b]);
        assert!(g.associations(a, AssociationKind::Piece).unwrap().is_empty());
    }

    #[test]
    fn refused_lifts_leave_graph_untouched() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let s = node(&mut g, root);
        let a = word(&mut g, s, "a");
        let other_root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let b = word(&mut g, other_root, "b");
        let before = g.len();

        let partial_pair = SubstructureMatch {
            concepts: vec![s, other_root],
            ranges: vec![
                MatchRange::Partial { start: 0, end: 1 },
                MatchRange::Partial { start: 0, end: 1 },
            ],
        };
        assert_eq!(lift(&mut g, &partial_pair), Err(LiftError::NotLiftable));

        let disjoint = SubstructureMatch {
            concepts: vec![a, b],
            ranges: vec![MatchRange::Whole, MatchRange::Whole],
        };
        assert_eq!(lift(&mut g, &disjoint), Err(LiftError::NoCommonAncestor));

        let nested = SubstructureMatch {
            concepts: vec![s, a],
            ranges: vec![MatchRange::Whole, MatchRange::Whole],
        };
        assert!(matches!(
            lift(&mut g, &nested),
            Err(LiftError::NestedConcepts { .. })
        ));

        assert_eq!(
            lift(&mut g, &SubstructureMatch::partial(s, 0, 5)),
            Err(LiftError::InvalidRange {
                concept: s,
                start: 0,
                end: 5,
                len: 1
            })
        );
        assert_eq!(
            lift(
                &mut g,
                &SubstructureMatch {
                    concepts: vec![],
                    ranges: vec![]
                }
            ),
            Err(LiftError::EmptyMatch)
        );

        assert_eq!(g.len(), before);
        assert_eq!(g.children(s).unwrap(), &[a]);
        assert_eq!(g.children(root).unwrap(), &[s]);
    }

    #[test]
    fn single_whole_is_returned_as_is() {
        let mut g = ConceptGraph::new();
        let root = g.create(NewConcept::new(ConceptKind::Root)).unwrap();
        let a = word(&mut g, root, "a");
        assert_eq!(lift(&mut g, &SubstructureMatch::whole(a)), Ok(a));
        assert_eq!(g.len(), 2);
    }
}
