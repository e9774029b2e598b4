//! Property tests over randomly shaped concept graphs.

use definer_core::{
    expand, flatten, lift, resolve_reference, substructure_matches, AnalyzerRegistry,
    AssociationKind, ConceptBuilder, ConceptGraph, ConceptId, ConceptKind, MatchRange,
    NewConcept, PythonScopeAnalyzer, ScopeAnalyzer, SubstructureMatch, Value,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arb_words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1..8)
}

fn new_root(graph: &mut ConceptGraph) -> ConceptId {
    graph.create(NewConcept::new(ConceptKind::Root)).unwrap()
}

fn build_statement(graph: &mut ConceptGraph, root: ConceptId, words: &[String]) -> ConceptId {
    let analyzers = AnalyzerRegistry::default();
    let built = ConceptBuilder::new(graph, &analyzers)
        .parse(root, &words.join(" "))
        .unwrap();
    built[0]
}

/// Leaf labels under `id`, left to right.
fn leaf_words(graph: &ConceptGraph, id: ConceptId) -> Vec<String> {
    graph
        .descendants(id)
        .unwrap()
        .into_iter()
        .filter(|d| graph.node(*d).unwrap().is_leaf())
        .map(|d| graph.label(d))
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A concept always matches its own expansion and is found by reference.
    #[test]
    fn concept_matches_own_expansion(words in arb_words()) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let statement = build_statement(&mut graph, root, &words);

        let expr = expand(&graph, statement).unwrap();
        prop_assert!(definer_core::matches(&graph, &expr, statement));
        let found = resolve_reference(&graph, &[root], &expr, &[]).unwrap();
        prop_assert!(found.contains(&statement));
    }

    /// Flattening a statement's expansion yields the words it was typed as.
    #[test]
    fn flatten_contains_typed_words(words in arb_words()) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let statement = build_statement(&mut graph, root, &words);

        let alternatives = flatten(&expand(&graph, statement).unwrap());
        prop_assert!(alternatives.contains(&words));
    }

    /// Every reported match addresses live concepts with in-bounds ranges.
    #[test]
    fn substructure_matches_are_sound(
        words in arb_words(),
        start in 0usize..8,
        len in 1usize..4,
    ) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let statement = build_statement(&mut graph, root, &words);
        let start = start % words.len();
        let end = (start + len).min(words.len());
        let query_root = new_root(&mut graph);
        let query = build_statement(&mut graph, query_root, &words[start..end]);
        let expr = expand(&graph, query).unwrap();

        let found = substructure_matches(&graph, &expr, statement).unwrap();
        if end - start < words.len() {
            prop_assert!(found.iter().any(|m| m.ranges.iter().any(|r| r.is_partial())));
        }
        for m in &found {
            prop_assert_eq!(m.concepts.len(), m.ranges.len());
            for (concept, range) in m.concepts.iter().zip(&m.ranges) {
                let node = graph.node(*concept).unwrap();
                if let MatchRange::Partial { start, end } = range {
                    prop_assert!(start < end);
                    prop_assert!(*end <= node.children().len());
                }
            }
        }
    }

    /// Lifting a child range keeps the statement's words in order.
    #[test]
    fn lift_preserves_content(words in arb_words(), a in 0usize..8, b in 0usize..8) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let statement = build_statement(&mut graph, root, &words);
        let (a, b) = (a % words.len(), b % words.len());
        let (start, end) = (a.min(b), a.max(b) + 1);
        let before = leaf_words(&graph, statement);

        let lifted = lift(&mut graph, &SubstructureMatch::partial(statement, start, end)).unwrap();
        prop_assert_eq!(graph.parent(lifted).unwrap(), Some(statement));
        prop_assert_eq!(graph.children(lifted).unwrap().len(), end - start);
        prop_assert_eq!(leaf_words(&graph, statement), before);
    }

    /// Lookup from the top of a chain returns exactly the shallowest binding.
    #[test]
    fn shallowest_binding_shadows_deeper(
        depth in 1usize..8,
        bound in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let mut chain = vec![root];
        for _ in 0..depth {
            let parent = *chain.last().unwrap();
            chain.push(
                graph
                    .create(NewConcept::new(ConceptKind::Statement).parent(parent))
                    .unwrap(),
            );
        }
        for (level, concept) in chain.iter().enumerate() {
            if bound[level % bound.len()] {
                graph.bind(*concept, "x", Value::Literal(level.to_string())).unwrap();
            }
        }

        let found = graph.lookup(root, "x").unwrap();
        let shallowest = chain
            .iter()
            .enumerate()
            .find(|(level, _)| bound[level % bound.len()]);
        match shallowest {
            Some((level, concept)) => {
                prop_assert_eq!(found.len(), 1);
                prop_assert_eq!(found[0].owner(), Some(*concept));
                prop_assert_eq!(&found[0].value, &Value::Literal(level.to_string()));
            }
            None => prop_assert!(found.is_empty()),
        }
    }

    /// Releasing a subtree leaves no association pointing into it.
    #[test]
    fn release_leaves_no_dangling_associations(
        words in arb_words(),
        links in prop::collection::vec((0usize..16, 0usize..16), 0..12),
    ) {
        let mut graph = ConceptGraph::new();
        let root = new_root(&mut graph);
        let keep = build_statement(&mut graph, root, &words);
        let doomed = build_statement(&mut graph, root, &words);
        let ids: Vec<ConceptId> = graph.ids().collect();
        for (from, to) in links {
            let (from, to) = (ids[from % ids.len()], ids[to % ids.len()]);
            if from != to {
                graph.associate(from, to, AssociationKind::Piece).unwrap();
            }
        }

        let freed = graph.descendants(doomed).unwrap();
        graph.unlink(doomed).unwrap();
        prop_assert_eq!(graph.release(doomed).unwrap(), freed.len());

        for id in graph.ids() {
            let node = graph.node(id).unwrap();
            for assoc in node.associations().iter().chain(node.associated_by()) {
                prop_assert!(graph.contains(assoc.other));
            }
        }
        prop_assert!(graph.contains(keep));
    }
}

// ---------------------------------------------------------------------------
// Scope analyzer robustness
// ---------------------------------------------------------------------------

fn arb_python_like() -> impl Strategy<Value = String> {
    "[a-z_0-9()\\[\\]{}:;=+*/%<>!~&|^@,. \n\t\"'#-]{0,300}"
}

fn arb_deeply_nested() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec![
            ("(", ")"),
            ("[", "]"),
            ("{", "}"),
            ("f(", ")"),
            ("not ", ""),
            ("-", ""),
            ("lambda: ", ""),
        ]),
        0usize..3000,
        any::<bool>(),
    )
        .prop_map(|((open, close), depth, balanced)| {
            let closing = if balanced { close.repeat(depth) } else { String::new() };
            format!("{}x{}", open.repeat(depth), closing)
        })
}

proptest! {
    #[test]
    fn analyzer_never_panics_on_arbitrary_text(source in ".{0,200}") {
        let _ = PythonScopeAnalyzer::new().free_identifiers(&source);
    }

    #[test]
    fn analyzer_never_panics_on_python_like_text(source in arb_python_like()) {
        let _ = PythonScopeAnalyzer::new().free_identifiers(&source);
    }

    #[test]
    fn analyzer_rejects_or_accepts_deep_nesting(source in arb_deeply_nested()) {
        let _ = PythonScopeAnalyzer::new().free_identifiers(&source);
    }
}
