//! Converts parsed input into concepts.

use crate::defining::{Definition, ScriptDefinition};
use crate::error::{BuildError, BuildResult};
use crate::graph::{ConceptGraph, NewConcept};
use crate::representation::{Representation, RepresentationLevel};
use crate::script::{AnalyzerRegistry, ScopeAnalyzer};
use crate::types::{ConceptId, ConceptKind, Identifier};
use definer_grammar::{
    ParsedCommand, ParsedContext, ParsedExpression, ParsedProgram, ParsedStatement, ParsedSymbol,
    Parser,
};
use tracing::debug;

/// Builds concepts from grammar trees into a graph.
///
/// Building is all-or-nothing: input is parsed and every context switch is
/// checked against the analyzer registry before the first concept is created.
pub struct ConceptBuilder<'a> {
    graph: &'a mut ConceptGraph,
    analyzers: &'a AnalyzerRegistry,
}

impl<'a> ConceptBuilder<'a> {
    pub fn new(graph: &'a mut ConceptGraph, analyzers: &'a AnalyzerRegistry) -> Self {
        Self { graph, analyzers }
    }

    /// Parse `raw` and build one concept per top-level expression under `parent`.
    pub fn parse(&mut self, parent: ConceptId, raw: &str) -> BuildResult<Vec<ConceptId>> {
        let program = Parser::parse(raw)?;
        self.build(parent, &program)
    }

    pub fn build(
        &mut self,
        parent: ConceptId,
        program: &ParsedProgram,
    ) -> BuildResult<Vec<ConceptId>> {
        self.graph.node(parent)?;
        self.validate(program)?;

        let mut built = Vec::with_capacity(program.expressions.len());
        for expression in &program.expressions {
            built.push(self.expression(parent, expression)?);
        }
        debug!(parent = %parent, expressions = built.len(), "built input");
        Ok(built)
    }

    /// Check every context switch in `program` against the analyzer registry.
    pub fn validate(&self, program: &ParsedProgram) -> BuildResult<()> {
        program
            .expressions
            .iter()
            .try_for_each(|e| self.check_expression(e))
    }

    /// Build a single expression under `parent`.
    pub fn build_expression(
        &mut self,
        parent: ConceptId,
        expression: &ParsedExpression,
    ) -> BuildResult<ConceptId> {
        self.graph.node(parent)?;
        self.check_expression(expression)?;
        self.expression(parent, expression)
    }

    fn expression(
        &mut self,
        parent: ConceptId,
        expression: &ParsedExpression,
    ) -> BuildResult<ConceptId> {
        match expression {
            ParsedExpression::Statement(statement) => self.statement(parent, statement),
            ParsedExpression::Command(command) => self.command(parent, command),
            ParsedExpression::Context(context) => self.script(parent, context),
        }
    }

    fn check_expression(&self, expression: &ParsedExpression) -> BuildResult<()> {
        match expression {
            ParsedExpression::Statement(statement) => self.check_statement(statement),
            ParsedExpression::Command(command) => {
                command.args.iter().try_for_each(|a| self.check_symbol(a))
            }
            ParsedExpression::Context(context) => self.analyzer(context).map(|_| ()),
        }
    }

    fn check_statement(&self, statement: &ParsedStatement) -> BuildResult<()> {
        statement
            .symbols
            .iter()
            .try_for_each(|s| self.check_symbol(s))
    }

    fn check_symbol(&self, symbol: &ParsedSymbol) -> BuildResult<()> {
        match symbol {
            ParsedSymbol::Token(_) => Ok(()),
            ParsedSymbol::Block(statement) => self.check_statement(statement),
            ParsedSymbol::Context(context) => self.analyzer(context).map(|_| ()),
        }
    }

    fn analyzer(&self, context: &ParsedContext) -> BuildResult<&'a dyn ScopeAnalyzer> {
        self.analyzers
            .resolve(context.tag.as_deref())
            .ok_or_else(|| BuildError::UnsupportedContext {
                tag: context.tag.clone().unwrap_or_default(),
                accepted: self.analyzers.accepted_tags(),
            })
    }

    fn statement(
        &mut self,
        parent: ConceptId,
        statement: &ParsedStatement,
    ) -> BuildResult<ConceptId> {
        let id = self
            .graph
            .create(NewConcept::new(ConceptKind::Statement).parent(parent))?;
        for symbol in &statement.symbols {
            self.symbol(id, symbol)?;
        }
        Ok(id)
    }

    fn symbol(&mut self, parent: ConceptId, symbol: &ParsedSymbol) -> BuildResult<ConceptId> {
        match symbol {
            ParsedSymbol::Token(text) => Ok(self.graph.create(
                NewConcept::new(ConceptKind::Symbol)
                    .parent(parent)
                    .representation(Representation::new(
                        text.clone(),
                        RepresentationLevel::InputMorphism,
                    ))
                    .representation(Representation::new(
                        format!("#|Symbol:{}|#", text),
                        RepresentationLevel::SystemInformation,
                    )),
            )?),
            ParsedSymbol::Block(statement) => self.statement(parent, statement),
            ParsedSymbol::Context(context) => self.script(parent, context),
        }
    }

    fn command(&mut self, parent: ConceptId, command: &ParsedCommand) -> BuildResult<ConceptId> {
        let tag = self.graph.next_id().raw();
        let rendered: Vec<String> = command.args.iter().map(render_symbol).collect();
        let text = if rendered.is_empty() {
            format!(":{}", command.name)
        } else {
            format!(":{} {}", command.name, rendered.join(" "))
        };
        let id = self.graph.create(
            NewConcept::new(ConceptKind::Command)
                .parent(parent)
                .identifier(Identifier::Tagged {
                    name: command.name.clone(),
                    tag,
                })
                .representation(Representation::new(text, RepresentationLevel::InputMorphism)),
        )?;
        for arg in &command.args {
            self.symbol(id, arg)?;
        }
        Ok(id)
    }

    fn script(&mut self, parent: ConceptId, context: &ParsedContext) -> BuildResult<ConceptId> {
        let analyzer = self.analyzer(context)?;
        let id = self.graph.create(
            NewConcept::new(ConceptKind::Script)
                .parent(parent)
                .representation(Representation::new(
                    context.body.clone(),
                    RepresentationLevel::InputMorphism,
                ))
                .representation(Representation::new(
                    format!("#|Script:{}|#", analyzer.language()),
                    RepresentationLevel::SystemInformation,
                )),
        )?;
        let definition = ScriptDefinition::new(id, analyzer, context.body.clone());
        self.graph
            .bind_definition(id, Definition::Script(definition))?;
        Ok(id)
    }
}

fn render_symbol(symbol: &ParsedSymbol) -> String {
    match symbol {
        ParsedSymbol::Token(text) => Representation::new(text.clone(), RepresentationLevel::InputMorphism)
            .human_friendly(),
        ParsedSymbol::Block(statement) => {
            let inner: Vec<String> = statement.symbols.iter().map(render_symbol).collect();
            format!("[{}]", inner.join(" "))
        }
        ParsedSymbol::Context(context) => format!(
            "```{} {}```",
            context.tag.as_deref().unwrap_or_default(),
            context.body
        ),
    }
}
