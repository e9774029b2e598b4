//! Built-in command handlers.
//!
//! Every handler checks everything it needs before it mutates the graph, so
//! a refused command leaves the session exactly as it found it.

pub mod binding;
pub mod inspect;
pub mod naming;
pub mod navigation;

use crate::error::SessionResult;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::{CommandInvocation, CommandOutcome};
use crate::state::SessionState;
use definer_core::{expand, resolve_reference, ConceptGraph, ConceptId, Expansion};

/// Turn handler errors into a refusal the user can see.
fn settle(result: SessionResult<CommandOutcome>) -> CommandOutcome {
    result.unwrap_or_else(|e| CommandOutcome::Refused(Prompt::error(e.to_string())))
}

/// The matcher for a run of argument concepts.
///
/// A single argument stands for itself; several stand for a concept whose
/// children they are.
fn reference(graph: &ConceptGraph, args: &[ConceptId]) -> SessionResult<Option<Expansion>> {
    match args {
        [] => Ok(None),
        [single] => Ok(Some(expand(graph, *single)?)),
        several => {
            let items = several
                .iter()
                .map(|a| expand(graph, *a))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Expansion::Sequence(items)))
        }
    }
}

/// Matches of `expr` among the session's concepts, excluding the command.
fn resolve(
    state: &SessionState,
    invocation: &CommandInvocation,
    expr: &Expansion,
) -> SessionResult<Vec<ConceptId>> {
    Ok(resolve_reference(
        &state.graph,
        &state.top_level,
        expr,
        &[invocation.concept],
    )?)
}

/// Exactly one match, or the prompt explaining why not.
fn resolve_one(
    state: &SessionState,
    invocation: &CommandInvocation,
    args: &[ConceptId],
    role: &str,
) -> SessionResult<Result<ConceptId, Prompt>> {
    let Some(expr) = reference(&state.graph, args)? else {
        return Ok(Err(Prompt::usage(format!(
            ":{} needs {}",
            invocation.name, role
        ))));
    };
    let found = resolve(state, invocation, &expr)?;
    Ok(match found.as_slice() {
        [only] => Ok(*only),
        [] => Err(Prompt::new(
            PromptKind::NotFound,
            format!("could not find {} {}", role, render_args(&state.graph, args)),
        )),
        many => Err(Prompt::new(
            PromptKind::Ambiguous,
            format!(
                "{} {} is ambiguous: found {} matches",
                role,
                render_args(&state.graph, args),
                many.len()
            ),
        )),
    })
}

/// The text an argument was typed as.
fn arg_text(graph: &ConceptGraph, id: ConceptId) -> String {
    match graph.get(id) {
        Some(node) if !node.preferred_representation().is_identity() => {
            node.preferred_representation().raw().to_string()
        }
        _ => graph.describe(id),
    }
}

fn render_args(graph: &ConceptGraph, args: &[ConceptId]) -> String {
    let parts: Vec<String> = args.iter().map(|a| graph.describe(*a)).collect();
    format!("'{}'", parts.join(" "))
}
