//! An interpreter session: one graph, one current concept, one prompt queue.

use crate::error::SessionResult;
use crate::prompt::{Prompt, PromptKind};
use crate::registry::{CommandInvocation, CommandOutcome, CommandRegistry};
use crate::state::{SessionSettings, SessionState};
use definer_core::{AnalyzerRegistry, ConceptBuilder, ConceptGraph, ConceptId};
use definer_grammar::{ParsedExpression, Parser};
use tracing::{debug, info};

pub struct Session {
    state: SessionState,
    registry: CommandRegistry,
    analyzers: AnalyzerRegistry,
}

impl Session {
    /// A session with the built-in commands.
    pub fn new(analyzers: AnalyzerRegistry, settings: SessionSettings) -> SessionResult<Self> {
        Ok(Self {
            state: SessionState::new(settings)?,
            registry: CommandRegistry::with_builtins(),
            analyzers,
        })
    }

    pub fn with_registry(mut self, registry: CommandRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.state.graph
    }

    pub fn current(&self) -> ConceptId {
        self.state.current
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.state.prompts
    }

    /// Remove and return the queued prompts.
    pub fn take_prompts(&mut self) -> Vec<Prompt> {
        std::mem::take(&mut self.state.prompts)
    }

    /// Interpret one line of input.
    ///
    /// The whole line is parsed and its context switches checked before
    /// anything is built; a line that fails either leaves the graph
    /// untouched. Expressions are then built one at a time under whatever
    /// concept is current, so a command earlier in the line affects where
    /// later input lands. Returns the outcome of each command in order.
    pub fn interpret(&mut self, raw: &str) -> SessionResult<Vec<CommandOutcome>> {
        let program = Parser::parse(raw)?;
        ConceptBuilder::new(&mut self.state.graph, &self.analyzers).validate(&program)?;
        debug!(expressions = program.expressions.len(), "parsed input line");

        let mut outcomes = Vec::new();
        for expression in &program.expressions {
            let id = ConceptBuilder::new(&mut self.state.graph, &self.analyzers)
                .build_expression(self.state.current, expression)?;
            if let ParsedExpression::Command(command) = expression {
                outcomes.push(self.execute(id, &command.name)?);
            }
        }
        Ok(outcomes)
    }

    /// Run a command concept, then discard it.
    fn execute(&mut self, concept: ConceptId, name: &str) -> SessionResult<CommandOutcome> {
        let args = self.state.graph.children(concept)?.to_vec();
        self.state.graph.unlink(concept)?;
        let invocation = CommandInvocation {
            concept,
            name: name.to_string(),
            args,
        };

        let outcome = self.registry.dispatch(&mut self.state, &invocation);
        let freed = self.state.graph.release(concept)?;
        debug!(command = %name, freed, "released command concept");

        match &outcome {
            CommandOutcome::Completed { report } => {
                self.state.prompts.extend(report.iter().cloned());
            }
            CommandOutcome::Refused(prompt) => {
                info!(command = %name, reason = %prompt, "command refused");
                self.state.prompt(prompt.clone());
            }
            CommandOutcome::UnknownCommand { name } => {
                self.state.prompt(Prompt::new(
                    PromptKind::UnknownCommand,
                    format!("':{}'", name),
                ));
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current", &self.state.current)
            .field("concepts", &self.state.graph.len())
            .field("commands", &self.registry)
            .finish()
    }
}
