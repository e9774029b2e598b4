//! Parser: recursive descent parser for the concept grammar
//!
//! Consumes tokens from the lexer and produces a [`ParsedProgram`]: the
//! statement / command / context-switch tree that the concept builder
//! converts into concepts.

use serde::Serialize;

use crate::errors::{GrammarError, GrammarResult};
use crate::lexer::{Lexer, Token, TokenKind};

/// Deepest `[block]` nesting a line may use.
pub const MAX_BLOCK_DEPTH: usize = 100;

/// A parsed input line (or block of lines)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedProgram {
    pub expressions: Vec<ParsedExpression>,
}

/// One top-level expression
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedExpression {
    Statement(ParsedStatement),
    Command(ParsedCommand),
    Context(ParsedContext),
}

/// An ordered run of symbols
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedStatement {
    pub symbols: Vec<ParsedSymbol>,
}

/// A single symbol inside a statement
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParsedSymbol {
    /// A word, `[[phrase]]` or string literal
    Token(String),
    /// A bracketed sub-statement
    Block(ParsedStatement),
    /// An embedded context switch used as an argument
    Context(ParsedContext),
}

/// A `:name arg arg ...` command invocation
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<ParsedSymbol>,
}

/// A fenced embedded-scripting snippet
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParsedContext {
    /// The declared sublanguage, `None` when the fence carries no tag
    pub tag: Option<String>,
    pub body: String,
    pub line: usize,
    pub col: usize,
}

/// Parser for the concept grammar
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    /// Parse input text into a ParsedProgram
    pub fn parse(input: &str) -> GrammarResult<ParsedProgram> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Self {
            tokens,
            pos: 0,
            depth: 0,
        };
        parser.parse_program()
    }

    fn parse_program(&mut self) -> GrammarResult<ParsedProgram> {
        let mut expressions = Vec::new();

        loop {
            while self.check(TokenKind::Separator) {
                self.advance();
            }
            if self.check(TokenKind::Eof) {
                break;
            }

            expressions.push(self.parse_expression()?);

            if !self.check(TokenKind::Separator) && !self.check(TokenKind::Eof) {
                let tok = self.peek();
                return Err(GrammarError::UnexpectedToken {
                    expected: "separator or end of input".into(),
                    found: tok.text.clone(),
                    line: tok.line,
                    col: tok.col,
                });
            }
        }

        Ok(ParsedProgram { expressions })
    }

    fn parse_expression(&mut self) -> GrammarResult<ParsedExpression> {
        match self.peek_kind() {
            TokenKind::Command => {
                let name = self.advance().text.clone();
                let mut args = Vec::new();
                while self.at_symbol() {
                    args.push(self.parse_symbol()?);
                }
                Ok(ParsedExpression::Command(ParsedCommand { name, args }))
            }
            TokenKind::Context if self.next_ends_expression() => {
                let context = self.parse_context()?;
                Ok(ParsedExpression::Context(context))
            }
            _ => Ok(ParsedExpression::Statement(self.parse_statement()?)),
        }
    }

    fn parse_statement(&mut self) -> GrammarResult<ParsedStatement> {
        let mut symbols = Vec::new();
        while self.at_symbol() {
            symbols.push(self.parse_symbol()?);
        }

        if symbols.is_empty() {
            let tok = self.peek();
            if tok.kind == TokenKind::Eof {
                return Err(GrammarError::UnexpectedEof("symbol".into()));
            }
            return Err(GrammarError::UnexpectedToken {
                expected: "symbol".into(),
                found: tok.text.clone(),
                line: tok.line,
                col: tok.col,
            });
        }

        Ok(ParsedStatement { symbols })
    }

    fn parse_symbol(&mut self) -> GrammarResult<ParsedSymbol> {
        match self.peek_kind() {
            TokenKind::Word | TokenKind::Atom | TokenKind::StringLiteral => {
                Ok(ParsedSymbol::Token(self.advance().text.clone()))
            }
            TokenKind::OpenBracket => {
                let open = self.advance().clone();
                if self.depth >= MAX_BLOCK_DEPTH {
                    return Err(GrammarError::NestingTooDeep {
                        limit: MAX_BLOCK_DEPTH,
                        line: open.line,
                        col: open.col,
                    });
                }
                self.depth += 1;
                let inner = self.parse_statement();
                self.depth -= 1;
                let inner = inner?;
                if !self.check(TokenKind::CloseBracket) {
                    return Err(GrammarError::Unterminated {
                        what: "[block]",
                        line: open.line,
                        col: open.col,
                    });
                }
                self.advance();
                Ok(ParsedSymbol::Block(inner))
            }
            TokenKind::Context => Ok(ParsedSymbol::Context(self.parse_context()?)),
            _ => {
                let tok = self.peek();
                Err(GrammarError::UnexpectedToken {
                    expected: "symbol".into(),
                    found: tok.text.clone(),
                    line: tok.line,
                    col: tok.col,
                })
            }
        }
    }

    fn parse_context(&mut self) -> GrammarResult<ParsedContext> {
        let tok = self.expect(TokenKind::Context)?.clone();
        Ok(ParsedContext {
            tag: tok.tag,
            body: tok.text,
            line: tok.line,
            col: tok.col,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn at_symbol(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Word
                | TokenKind::Atom
                | TokenKind::StringLiteral
                | TokenKind::OpenBracket
                | TokenKind::Context
        )
    }

    /// A context switch stands alone when nothing else follows it in the expression.
    fn next_ends_expression(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.kind),
            None | Some(TokenKind::Separator) | Some(TokenKind::Eof)
        )
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind.clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> GrammarResult<&Token> {
        if self.check(kind.clone()) {
            Ok(self.advance())
        } else if self.check(TokenKind::Eof) {
            Err(GrammarError::UnexpectedEof(format!("{}", kind)))
        } else {
            let tok = self.peek();
            Err(GrammarError::UnexpectedToken {
                expected: format!("{}", kind),
                found: tok.text.clone(),
                line: tok.line,
                col: tok.col,
            })
        }
    }
}
