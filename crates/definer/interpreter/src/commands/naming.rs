//! Naming the current concept.

use super::{arg_text, resolve_one, settle};
use crate::error::SessionResult;
use crate::prompt::Prompt;
use crate::registry::{CommandInvocation, CommandOutcome};
use crate::state::SessionState;
use definer_core::{AssociationKind, Representation, RepresentationLevel};
use tracing::info;

/// `:name TEXT...`: give the current concept a user-supplied, preferred
/// representation.
pub fn name(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_name(state, invocation))
}

fn try_name(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    if invocation.args.is_empty() {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            ":name needs the text to name the current concept with",
        )));
    }
    let text = invocation
        .args
        .iter()
        .map(|a| arg_text(&state.graph, *a))
        .collect::<Vec<_>>()
        .join(" ");
    let previous = state.current_label();
    state.graph.add_representation(
        state.current,
        Representation::new(text, RepresentationLevel::UserSupplied),
    )?;
    info!(concept = %state.current, "named concept");
    Ok(CommandOutcome::report(vec![format!(
        "{} is now known as {}",
        previous,
        state.current_label()
    )]))
}

/// `:alias REF`: record the current concept as another representation of
/// the one concept matching REF.
///
/// The association is informational. References still match against each
/// concept's own representations only; `:show` lists the link.
pub fn alias(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_alias(state, invocation))
}

fn try_alias(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let target = match resolve_one(state, invocation, &invocation.args, "concept to alias")? {
        Ok(target) => target,
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };
    if target == state.current {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            "a concept cannot be an alias of itself",
        )));
    }
    state
        .graph
        .associate(state.current, target, AssociationKind::Representation)?;
    info!(concept = %state.current, target = %target, "recorded alias");
    Ok(CommandOutcome::report(vec![format!(
        "{} is a representation of {}",
        state.current_label(),
        state.graph.describe(target)
    )]))
}
