//! Command registry: handlers keyed by command name.

use crate::commands;
use crate::prompt::Prompt;
use crate::state::SessionState;
use definer_core::ConceptId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

/// A command concept being executed.
///
/// The command concept has already been unlinked from the graph, so it and
/// its argument concepts are invisible to reference resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub concept: ConceptId,
    pub name: String,
    /// One concept per argument, in input order.
    pub args: Vec<ConceptId>,
}

/// What a handler did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The command took effect. The report is shown to the user.
    Completed { report: Vec<Prompt> },
    /// The command was refused and the graph left as it was.
    Refused(Prompt),
    /// No handler is registered under this name.
    UnknownCommand { name: String },
}

impl CommandOutcome {
    pub fn done() -> Self {
        Self::Completed { report: Vec::new() }
    }

    /// Completed, reporting informational lines.
    pub fn report(lines: Vec<String>) -> Self {
        Self::Completed {
            report: lines.into_iter().map(Prompt::info).collect(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

pub type CommandHandler = fn(&mut SessionState, &CommandInvocation) -> CommandOutcome;

/// Handlers by command name.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, CommandHandler>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

impl CommandRegistry {
    /// An empty registry: every command is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in concept commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("enter_concept", commands::navigation::enter_concept);
        registry.register("enter_partial", commands::navigation::enter_partial);
        registry.register("leave_concept", commands::navigation::leave_concept);
        registry.register("bind", commands::binding::bind);
        registry.register("lookup", commands::binding::lookup);
        registry.register("define", commands::binding::define);
        registry.register("check", commands::inspect::check);
        registry.register("show", commands::inspect::show);
        registry.register("name", commands::naming::name);
        registry.register("alias", commands::naming::alias);
        registry
    }

    /// Register a handler, returning the one it replaces.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: CommandHandler,
    ) -> Option<CommandHandler> {
        let name = name.into();
        debug!(command = %name, "registered command handler");
        self.handlers.insert(name, handler)
    }

    pub fn get(&self, name: &str) -> Option<CommandHandler> {
        self.handlers.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn dispatch(
        &self,
        state: &mut SessionState,
        invocation: &CommandInvocation,
    ) -> CommandOutcome {
        match self.get(&invocation.name) {
            Some(handler) => {
                info!(command = %invocation.name, args = invocation.args.len(), "executing command");
                handler(state, invocation)
            }
            None => {
                info!(command = %invocation.name, "unknown command");
                CommandOutcome::UnknownCommand {
                    name: invocation.name.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionSettings;

    fn invocation(name: &str) -> CommandInvocation {
        CommandInvocation {
            concept: ConceptId::new(99),
            name: name.into(),
            args: Vec::new(),
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = CommandRegistry::with_builtins();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "alias",
                "bind",
                "check",
                "define",
                "enter_concept",
                "enter_partial",
                "leave_concept",
                "lookup",
                "name",
                "show"
            ]
        );
    }

    #[test]
    fn unknown_name_is_data() {
        let registry = CommandRegistry::new();
        let mut state = SessionState::new(SessionSettings::default()).unwrap();
        assert_eq!(
            registry.dispatch(&mut state, &invocation("frobnicate")),
            CommandOutcome::UnknownCommand {
                name: "frobnicate".into()
            }
        );
    }

    #[test]
    fn register_replaces_handler() {
        fn noop(_: &mut SessionState, _: &CommandInvocation) -> CommandOutcome {
            CommandOutcome::report(vec!["noop".into()])
        }

        let mut registry = CommandRegistry::with_builtins();
        assert!(registry.register("show", noop).is_some());
        let mut state = SessionState::new(SessionSettings::default()).unwrap();
        assert_eq!(
            registry.dispatch(&mut state, &invocation("show")),
            CommandOutcome::report(vec!["noop".into()])
        );
    }

    #[test]
    fn outcomes_serialize_with_tag() {
        let json = serde_json::to_value(CommandOutcome::UnknownCommand {
            name: "frobnicate".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "unknown_command");
        assert_eq!(json["name"], "frobnicate");

        let json = serde_json::to_value(CommandOutcome::report(vec!["ok".into()])).unwrap();
        assert_eq!(json["outcome"], "completed");
        assert_eq!(json["report"][0]["kind"], "info");
    }
}
