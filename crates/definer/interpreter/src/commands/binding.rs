//! Bindings and definitions on the current concept.

use super::{arg_text, reference, resolve, settle};
use crate::error::SessionResult;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::{CommandInvocation, CommandOutcome};
use crate::state::SessionState;
use definer_core::{ConceptId, ConceptKind, Definition, Value};
use tracing::info;

/// `:bind SYMBOL VALUE`: bind in the current concept's context.
///
/// Each argument is first resolved as a reference. A symbol matching one
/// concept is bound under that concept's preferred text, otherwise under
/// its own text. A value matching one concept binds that concept,
/// otherwise the literal text. Matching several concepts refuses the bind.
pub fn bind(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_bind(state, invocation))
}

fn try_bind(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let [symbol, value] = invocation.args.as_slice() else {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            ":bind must be given exactly two arguments: a symbol and a value",
        )));
    };

    let identifier = match resolve_arg(state, invocation, *symbol, "first")? {
        Ok(Some(found)) => state.graph.label(found),
        Ok(None) => arg_text(&state.graph, *symbol),
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };
    let value = match resolve_arg(state, invocation, *value, "second")? {
        Ok(Some(found)) => Value::Concept(found),
        Ok(None) => Value::Literal(arg_text(&state.graph, *value)),
        Err(prompt) => return Ok(CommandOutcome::Refused(prompt)),
    };

    let rendered = match &value {
        Value::Concept(id) => state.graph.describe(*id),
        Value::Literal(text) => text.clone(),
    };
    state.graph.bind(state.current, identifier.clone(), value)?;
    info!(concept = %state.current, identifier = %identifier, "created binding");
    Ok(CommandOutcome::report(vec![format!(
        "bound '{}' => {} in {}",
        identifier,
        rendered,
        state.current_label()
    )]))
}

/// The single concept an argument refers to, `None` when it refers to
/// nothing, or a prompt when it is ambiguous.
fn resolve_arg(
    state: &SessionState,
    invocation: &CommandInvocation,
    arg: ConceptId,
    position: &str,
) -> SessionResult<Result<Option<ConceptId>, Prompt>> {
    let Some(expr) = reference(&state.graph, &[arg])? else {
        return Ok(Ok(None));
    };
    let found = resolve(state, invocation, &expr)?;
    Ok(match found.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(Prompt::new(
            PromptKind::Ambiguous,
            format!(
                "ambiguous concept reference as {} argument of :bind, matched '{}' with {} matches",
                position,
                state.graph.describe(arg),
                many.len()
            ),
        )),
    })
}

/// `:lookup NAME`: every binding of NAME visible from the current concept.
pub fn lookup(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_lookup(state, invocation))
}

fn try_lookup(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let [name] = invocation.args.as_slice() else {
        return Ok(CommandOutcome::Refused(Prompt::usage(
            ":lookup takes exactly one identifier",
        )));
    };
    let identifier = arg_text(&state.graph, *name);
    let bindings = state.graph.lookup(state.current, &identifier)?;
    if bindings.is_empty() {
        return Ok(CommandOutcome::report(vec![format!(
            "'{}' is unbound in {}",
            identifier,
            state.current_label()
        )]));
    }

    let mut report = Vec::with_capacity(bindings.len() + 1);
    if bindings.len() > 1 {
        report.push(format!(
            "'{}' is ambiguous: {} bindings",
            identifier,
            bindings.len()
        ));
    }
    for binding in &bindings {
        let value = match &binding.value {
            Value::Concept(id) => state.graph.describe(*id),
            Value::Literal(text) => text.clone(),
        };
        let owner = binding
            .owner()
            .map(|o| state.graph.describe(o))
            .unwrap_or_default();
        report.push(format!("{} = {} (in {})", identifier, value, owner));
    }
    Ok(CommandOutcome::report(report))
}

/// `:define SCRIPT`: make a scripted snippet the current concept's definition.
pub fn define(state: &mut SessionState, invocation: &CommandInvocation) -> CommandOutcome {
    settle(try_define(state, invocation))
}

fn try_define(
    state: &mut SessionState,
    invocation: &CommandInvocation,
) -> SessionResult<CommandOutcome> {
    let usage = || {
        CommandOutcome::Refused(Prompt::usage(
            ":define takes exactly one scripted snippet, e.g. :define ```python y = x + 1```",
        ))
    };
    let [script] = invocation.args.as_slice() else {
        return Ok(usage());
    };
    if state.graph.node(*script)?.kind() != ConceptKind::Script {
        return Ok(usage());
    }
    let language = match state.graph.context(*script)?.definition() {
        Some(Definition::Script(definition)) => definition.language().to_string(),
        _ => return Ok(usage()),
    };
    let Some(definition) = state.graph.take_definition(*script)? else {
        return Ok(usage());
    };

    let definition = definition.with_owner(state.current);
    state.graph.bind_definition(state.current, definition)?;
    info!(concept = %state.current, language = %language, "bound definition");
    Ok(CommandOutcome::report(vec![format!(
        "defined {} with a {} snippet",
        state.current_label(),
        language
    )]))
}
