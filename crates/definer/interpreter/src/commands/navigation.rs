//! Moving the current concept around the graph.

use super::{reference, render_args, resolve_one, settle};
use crate::error::SessionResult;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::{CommandInvocation, CommandOutcome};
use crate::state::SessionState;
use definer_core::{is_liftable, lift, resolve_substructure_reference};
use tracing::info;

/// `:enter_concept REF`: make the one concept matching REF current.
pub fn enter_concept(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_enter_concept(state, invocation))
}

fn try_enter_concept(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let target = match resolve_one(state, invocation, &invocation.args, "concept to enter")? {
        Ok(target) => target,
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };
    state.current = target;
    info!(concept = %target, "entered concept");
    Ok(CommandOutcome::report(vec![format!(
        "entered {}",
        state.current_label()
    )]))
}

/// `:enter_partial REF`: like `enter_concept`, but REF may match part of a
/// concept, which is lifted into a concept of its own first.
pub fn enter_partial(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_enter_partial(state, invocation))
}

fn try_enter_partial(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let Some(expr) = reference(&state.graph, &invocation.args)? else {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            ":enter_partial needs a concept or part of one to enter",
        )));
    };
    let found = resolve_substructure_reference(
        &state.graph,
        &state.top_level,
        &expr,
        &[invocation.concept],
    )?;

    let matched = match found.as_slice() {
        [only] => only,
        [] => {
            return Ok(CommandOutcome::Refused(Prompt::new(
                PromptKind::NotFound,
                format!(
                    "could not find concept to enter {}",
                    render_args(&state.graph, &invocation.args)
                ),
            )))
        }
        many => {
            let candidates: Vec<String> =
                many.iter().map(|m| m.describe(&state.graph)).collect();
            return Ok(CommandOutcome::Refused(Prompt::new(
                PromptKind::Ambiguous,
                format!(
                    "concept to enter is ambiguous: found {} matches ({})",
                    many.len(),
                    candidates.join("; ")
                ),
            )));
        }
    };

    if let Some(whole) = matched.single_whole() {
        state.current = whole;
        info!(concept = %whole, "entered concept");
        return Ok(CommandOutcome::report(vec![format!(
            "entered {}",
            state.current_label()
        )]));
    }
    if !is_liftable(matched) {
        return Ok(CommandOutcome::Refused(Prompt::new(
            PromptKind::NotLiftable,
            format!(
                "{} cannot be treated as a unit without breaking the concept graph; \
                 enter a larger structure that contains all of it",
                matched.describe(&state.graph)
            ),
        )));
    }

    let described = matched.describe(&state.graph);
    let lifted = match lift(&mut state.graph, matched) {
        Ok(lifted) => lifted,
        Err(e) => {
            return Ok(CommandOutcome::Refused(Prompt::new(
                PromptKind::NotLiftable,
                format!("{} cannot be lifted: {}", described, e),
            )))
        }
    };
    state.current = lifted;
    info!(concept = %lifted, "entered lifted concept");
    Ok(CommandOutcome::report(vec![format!(
        "lifted {} into a new concept and entered it",
        described
    )]))
}

/// `:leave_concept`: make the parent of the current concept current.
///
/// Leaving a top-level concept is a no-op.
pub fn leave_concept(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_leave_concept(state, invocation))
}

fn try_leave_concept(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    if !invocation.args.is_empty() {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            ":leave_concept takes no arguments",
        )));
    }
    match state.graph.parent(state.current)? {
        Some(parent) => {
            state.current = parent;
            info!(concept = %parent, "left to parent concept");
            Ok(CommandOutcome::report(vec![format!(
                "left to {}",
                state.current_label()
            )]))
        }
        None => {
            info!(concept = %state.current, "already at a top-level concept");
            Ok(CommandOutcome::done())
        }
    }
}
