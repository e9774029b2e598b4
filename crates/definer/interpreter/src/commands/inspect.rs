//! Read-only commands: well-definedness checks and concept display.

use super::{resolve_one, settle};
use crate::error::SessionResult;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::{CommandInvocation, CommandOutcome};
use crate::state::SessionState;
use definer_core::{
    AssociationKind, ConceptGraph, ConceptId, Definition, DefinitionEngine, GraphResult, Value,
};

/// The concept named by the arguments, or the current one when there are none.
fn target(
    state: &SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<Result<ConceptId, Prompt>> {
    if invocation.args.is_empty() {
        return Ok(Ok(state.current));
    }
    resolve_one(state, invocation, &invocation.args, "concept")
}

/// `:check [REF]`: report why a concept is not well-defined, if it is not.
pub fn check(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_check(state, invocation))
}

fn try_check(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let concept = match target(state, invocation)? {
        Ok(concept) => concept,
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };
    let engine = DefinitionEngine::with_policy(&state.graph, state.settings.group_policy.policy());
    let diagnostics = engine.check(concept)?;
    if diagnostics.is_empty() {
        return Ok(CommandOutcome::report(vec![format!(
            "{} is well-defined",
            state.graph.describe(concept)
        )]));
    }
    Ok(CommandOutcome::Completed {
        report: diagnostics
            .iter()
            .map(|d| Prompt::new(PromptKind::Diagnostic, d.describe(&state.graph)))
            .collect(),
    })
}

/// `:show [REF]`: the concept's subtree with bindings, definitions and
/// associations.
pub fn show(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_show(state, invocation))
}

fn try_show(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let concept = match target(state, invocation)? {
        Ok(concept) => concept,
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };
    let mut lines = Vec::new();
    render_tree(&state.graph, concept, 0, &mut lines)?;
    Ok(CommandOutcome::report(lines))
}

fn render_tree(
    graph: &ConceptGraph,
    id: ConceptId,
    depth: usize,
    lines: &mut Vec<String>,
) -> GraphResult<()> {
    let node = graph.node(id)?;
    let indent = "  ".repeat(depth);
    lines.push(format!(
        "{}{} ({} {})",
        indent,
        graph.describe(id),
        node.kind(),
        id
    ));

    for (name, value) in node.context().bindings() {
        let value = match value {
            Value::Concept(other) => graph.describe(*other),
            Value::Literal(text) => text.clone(),
        };
        lines.push(format!("{}  | {} = {}", indent, name, value));
    }
    if let Some(Definition::Script(script)) = node.context().definition() {
        lines.push(format!(
            "{}  | defined in {}: {}",
            indent,
            script.language(),
            script.source()
        ));
    }
    for other in graph.associations(id, AssociationKind::Piece)? {
        lines.push(format!("{}  | piece of {}", indent, graph.describe(other)));
    }
    for other in graph.associations(id, AssociationKind::Representation)? {
        lines.push(format!(
            "{}  | representation of {}",
            indent,
            graph.describe(other)
        ));
    }

    for child in node.children() {
        render_tree(graph, *child, depth + 1, lines)?;
    }
    Ok(())
}
