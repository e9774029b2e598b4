//! End-to-end command scenarios against a live session.

use definer_core::{
    AnalyzerRegistry, AssociationKind, BuildError, ConceptGraph, ConceptId, ConceptKind,
    GroupPolicyKind,
};
use definer_grammar::GrammarError;
use definer_interpreter::{
    CommandOutcome, PromptKind, Session, SessionError, SessionSettings,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn session() -> Session {
    Session::new(AnalyzerRegistry::default(), SessionSettings::default()).unwrap()
}

fn run(session: &mut Session, line: &str) -> Vec<CommandOutcome> {
    session.interpret(line).unwrap()
}

/// Prompt kinds queued since the last call.
fn prompt_kinds(session: &mut Session) -> Vec<PromptKind> {
    session.take_prompts().into_iter().map(|p| p.kind).collect()
}

type Shape = (ConceptId, Option<ConceptId>, Vec<ConceptId>, Vec<String>, usize);

/// Structure, bindings and representations of every live concept.
fn snapshot(graph: &ConceptGraph) -> Vec<Shape> {
    graph
        .ids()
        .map(|id| {
            let node = graph.node(id).unwrap();
            let bindings = node
                .context()
                .bindings()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            (
                id,
                node.parent(),
                node.children().to_vec(),
                bindings,
                node.representations().len(),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Definitions and bindings
// ---------------------------------------------------------------------------

#[test]
fn define_bind_and_check() {
    let mut s = session();
    run(&mut s, "area of rectangle");
    run(&mut s, ":enter_concept area of rectangle");
    assert_eq!(s.graph().describe(s.current()), "[area of rectangle]");
    s.take_prompts();

    run(&mut s, ":define ```python area = width * height```");
    run(&mut s, ":check");
    let prompts = s.take_prompts();
    let diagnostics: Vec<&str> = prompts
        .iter()
        .filter(|p| p.kind == PromptKind::Diagnostic)
        .map(|p| p.message.as_str())
        .collect();
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].contains("'width'"));
    assert!(diagnostics[1].contains("'height'"));

    run(&mut s, ":bind width 3");
    run(&mut s, ":bind height 4");
    s.take_prompts();
    run(&mut s, ":check");
    let prompts = s.take_prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].kind, PromptKind::Info);
    assert!(prompts[0].message.ends_with("is well-defined"));
}

#[test]
fn own_binding_shadows_descendants() {
    let mut s = session();
    run(&mut s, "area of rectangle; :enter_concept area of rectangle");
    let statement = s.current();

    run(&mut s, ":enter_concept rectangle; :bind x 2; :leave_concept");
    assert_eq!(s.current(), statement);
    let found = s.graph().lookup(statement, "x").unwrap();
    assert_eq!(found.len(), 1);
    assert_ne!(found[0].owner(), Some(statement));

    run(&mut s, ":bind x 1");
    let found = s.graph().lookup(statement, "x").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].owner(), Some(statement));
}

#[test]
fn sibling_bindings_are_ambiguous() {
    let mut s = session();
    run(&mut s, "area of rectangle; :enter_concept area of rectangle");
    run(&mut s, ":define ```python y = x```");
    run(&mut s, ":enter_concept area; :bind x 1; :leave_concept");
    run(&mut s, ":enter_concept rectangle; :bind x 2; :leave_concept");
    s.take_prompts();

    run(&mut s, ":lookup x");
    let prompts = s.take_prompts();
    assert!(prompts[0].message.contains("ambiguous: 2 bindings"));

    run(&mut s, ":check");
    let prompts = s.take_prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].kind, PromptKind::Diagnostic);
    assert!(prompts[0].message.starts_with("Ambiguous-Binding: 'x'"));
}

#[test]
fn leaf_is_never_well_defined() {
    let mut s = session();
    run(&mut s, "lonely");
    s.take_prompts();
    run(&mut s, ":check lonely");
    let prompts = s.take_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].message.starts_with("Concept-Undefined"));
}

#[test]
fn group_policy_comes_from_settings() {
    let settings = SessionSettings {
        group_policy: GroupPolicyKind::Conjunctive,
        ..SessionSettings::default()
    };
    let mut s = Session::new(AnalyzerRegistry::default(), settings).unwrap();
    run(&mut s, "a b");
    s.take_prompts();
    run(&mut s, ":check a b");
    assert_eq!(
        prompt_kinds(&mut s),
        vec![PromptKind::Diagnostic, PromptKind::Diagnostic]
    );

    let mut s = session();
    run(&mut s, "a b");
    s.take_prompts();
    run(&mut s, ":check a b");
    assert_eq!(prompt_kinds(&mut s), vec![PromptKind::Diagnostic]);
}

// ---------------------------------------------------------------------------
// Lifting
// ---------------------------------------------------------------------------

#[test]
fn enter_partial_lifts_child_range() {
    let mut s = session();
    run(&mut s, "the big cat sat");
    let statement = s.graph().children(s.current()).unwrap()[0];

    let outcomes = run(&mut s, ":enter_partial big cat");
    assert!(outcomes[0].is_completed());
    let lifted = s.current();
    assert_eq!(s.graph().node(lifted).unwrap().kind(), ConceptKind::Lifted);
    assert_eq!(s.graph().parent(lifted).unwrap(), Some(statement));
    assert_eq!(s.graph().describe(statement), "[the [big cat] sat]");
}

#[test]
fn enter_partial_lifts_whole_siblings() {
    let mut s = session();
    run(&mut s, "a b; c d");
    let root = s.current();
    let siblings = s.graph().children(root).unwrap().to_vec();

    run(&mut s, ":enter_partial a b c d");
    let lifted = s.current();
    assert_eq!(s.graph().children(root).unwrap(), &[lifted]);
    assert_eq!(s.graph().children(lifted).unwrap(), siblings.as_slice());
    for sibling in siblings {
        assert!(s
            .graph()
            .associations(sibling, AssociationKind::Piece)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn unliftable_match_is_refused() {
    let mut s = session();
    run(&mut s, "a b; c d");
    s.take_prompts();
    let before = snapshot(s.graph());
    let current = s.current();

    let outcomes = run(&mut s, ":enter_partial b c");
    assert!(matches!(
        &outcomes[0],
        CommandOutcome::Refused(p) if p.kind == PromptKind::NotLiftable
    ));
    assert_eq!(snapshot(s.graph()), before);
    assert_eq!(s.current(), current);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn ambiguous_bind_leaves_graph_unchanged() {
    let mut s = session();
    run(&mut s, "x x");
    let before = snapshot(s.graph());

    run(&mut s, ":bind x 1");
    assert_eq!(prompt_kinds(&mut s), vec![PromptKind::Ambiguous]);
    assert_eq!(snapshot(s.graph()), before);
}

#[test]
fn missing_reference_leaves_graph_unchanged() {
    let mut s = session();
    run(&mut s, "a b");
    let before = snapshot(s.graph());
    let current = s.current();

    run(&mut s, ":enter_concept nowhere");
    run(&mut s, ":alias nowhere");
    run(&mut s, ":bind only_one");
    run(&mut s, ":define plain words");
    assert_eq!(
        prompt_kinds(&mut s),
        vec![
            PromptKind::NotFound,
            PromptKind::NotFound,
            PromptKind::Usage,
            PromptKind::Usage
        ]
    );
    assert_eq!(snapshot(s.graph()), before);
    assert_eq!(s.current(), current);
}

#[test]
fn unknown_command_is_a_prompt() {
    let mut s = session();
    run(&mut s, "a b");
    let before = snapshot(s.graph());

    let outcomes = run(&mut s, ":teleport a b");
    assert_eq!(
        outcomes,
        vec![CommandOutcome::UnknownCommand {
            name: "teleport".into()
        }]
    );
    assert_eq!(prompt_kinds(&mut s), vec![PromptKind::UnknownCommand]);
    assert_eq!(snapshot(s.graph()), before);
}

#[test]
fn unknown_context_tag_rejects_line() {
    let mut s = session();
    run(&mut s, "a b");
    let before = snapshot(s.graph());

    let err = s.interpret("c d; :define ```ruby puts x```").unwrap_err();
    assert!(matches!(
        err,
        SessionError::Build(BuildError::UnsupportedContext { .. })
    ));
    assert_eq!(snapshot(s.graph()), before);
}

#[test]
fn over_nested_line_is_rejected_and_session_survives() {
    let mut s = session();
    run(&mut s, "a b");
    let before = snapshot(s.graph());

    let line = format!("{}x{}", "[ ".repeat(5000), " ]".repeat(5000));
    let err = s.interpret(&line).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Grammar(GrammarError::NestingTooDeep { .. })
    ));
    assert_eq!(snapshot(s.graph()), before);

    let script = format!("```python {}x{}```", "(".repeat(500), ")".repeat(500));
    run(&mut s, &format!(":enter_concept a b; :define {}; :check", script));
    let prompts = s.take_prompts();
    assert!(
        prompts.iter().any(|p| p.message.contains("nested")),
        "{:?}",
        prompts
    );
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

#[test]
fn name_and_alias() {
    let mut s = session();
    run(&mut s, "a b; c d");
    run(&mut s, ":enter_concept a b; :name pair; :leave_concept");
    run(&mut s, ":enter_concept pair");
    let pair = s.current();
    assert_eq!(s.graph().describe(pair), "pair");

    run(&mut s, ":leave_concept; :enter_concept c d; :alias pair");
    let other = s.current();
    assert_eq!(
        s.graph()
            .associations(other, AssociationKind::Representation)
            .unwrap(),
        vec![pair]
    );
    assert_eq!(
        s.graph()
            .associated_by(pair, AssociationKind::Representation)
            .unwrap(),
        vec![other]
    );
}

#[test]
fn alias_does_not_change_reference_resolution() {
    let mut s = session();
    run(&mut s, "a b; c d");
    run(&mut s, ":enter_concept a b; :name pair; :leave_concept");
    run(&mut s, ":enter_concept c d; :alias pair");
    let other = s.current();
    s.take_prompts();

    run(&mut s, ":leave_concept; :enter_concept pair");
    assert_ne!(s.current(), other);
    assert_eq!(s.graph().describe(s.current()), "pair");
    assert!(prompt_kinds(&mut s).iter().all(|k| !k.is_failure()));

    run(&mut s, ":show c d");
    let shown: Vec<String> = s.take_prompts().into_iter().map(|p| p.message).collect();
    assert!(
        shown.iter().any(|line| line.contains("representation of pair")),
        "{:?}",
        shown
    );
}

#[test]
fn show_renders_subtree() {
    let mut s = session();
    run(&mut s, "a b; :enter_concept a b; :bind x 1");
    s.take_prompts();
    run(&mut s, ":show");
    let lines: Vec<String> = s.take_prompts().into_iter().map(|p| p.message).collect();
    assert!(lines[0].starts_with("[a b] (Statement"));
    assert_eq!(lines[1], "  | x = 1");
    assert!(lines[2].starts_with("  a (Symbol"));
}
