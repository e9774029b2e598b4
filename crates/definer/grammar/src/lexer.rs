//! Lexer: tokenizes one line (or block) of interactive input
//!
//! Produces the token stream the parser consumes. Handles plain words,
//! `[[atomic phrases]]`, string literals, `[` `]` blocks, `:command`
//! names at the start of an expression, and fenced context switches
//! (```` ```tag body``` ````).

use crate::errors::{GrammarError, GrammarResult};

const FENCE: &str = "```";

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token (the body for context switches)
    pub text: String,
    /// Context tag, only set for [`TokenKind::Context`]
    pub tag: Option<String>,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            tag: None,
            line,
            col,
        }
    }

    fn context(tag: Option<String>, body: String, line: usize, col: usize) -> Self {
        Self {
            kind: TokenKind::Context,
            text: body,
            tag,
            line,
            col,
        }
    }
}

/// Token types
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// A bare whitespace-delimited word
    Word,
    /// A `[[...]]` phrase kept atomic
    Atom,
    /// A `"..."` string literal
    StringLiteral,
    /// `:name` at the start of an expression
    Command,
    /// A fenced embedded-scripting snippet
    Context,

    OpenBracket,
    CloseBracket,
    /// `;` or a newline outside of brackets
    Separator,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word => write!(f, "word"),
            Self::Atom => write!(f, "[[phrase]]"),
            Self::StringLiteral => write!(f, "string literal"),
            Self::Command => write!(f, "command"),
            Self::Context => write!(f, "context block"),
            Self::OpenBracket => write!(f, "["),
            Self::CloseBracket => write!(f, "]"),
            Self::Separator => write!(f, "separator"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for the concept grammar
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    depth: usize,
    at_expression_start: bool,
}

impl Lexer {
    /// Create a new lexer from input text
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            depth: 0,
            at_expression_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> GrammarResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_blanks();

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
                break;
            }

            let token = self.next_token()?;
            self.at_expression_start = token.kind == TokenKind::Separator;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> GrammarResult<Token> {
        let ch = self.input[self.pos];
        let line = self.line;
        let col = self.col;

        match ch {
            '\n' | ';' => {
                self.advance();
                Ok(Token::new(TokenKind::Separator, ch.to_string(), line, col))
            }
            '[' if self.peek_at(1) == Some('[') => self.read_atom(),
            '[' => {
                self.advance();
                self.depth += 1;
                Ok(Token::new(TokenKind::OpenBracket, "[", line, col))
            }
            ']' => {
                self.advance();
                self.depth = self.depth.saturating_sub(1);
                Ok(Token::new(TokenKind::CloseBracket, "]", line, col))
            }
            '"' => self.read_string_literal(),
            '`' if self.starts_with(FENCE) => self.read_context(),
            ':' if self.at_expression_start
                && self
                    .peek_at(1)
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_') =>
            {
                self.read_command()
            }
            _ => self.read_word(),
        }
    }

    fn read_atom(&mut self) -> GrammarResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance();
        self.advance(); // skip [[

        let mut text = String::new();
        while self.pos < self.input.len() && !self.starts_with("]]") {
            text.push(self.input[self.pos]);
            self.advance();
        }

        if self.pos >= self.input.len() {
            return Err(GrammarError::Unterminated {
                what: "[[phrase]]",
                line,
                col,
            });
        }

        self.advance();
        self.advance(); // skip ]]
        Ok(Token::new(TokenKind::Atom, text.trim(), line, col))
    }

    fn read_string_literal(&mut self) -> GrammarResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // skip opening quote

        let mut text = String::new();
        while self.pos < self.input.len() && self.input[self.pos] != '"' {
            if self.input[self.pos] == '\\' && self.peek_at(1) == Some('"') {
                self.advance();
                text.push('"');
            } else {
                text.push(self.input[self.pos]);
            }
            self.advance();
        }

        if self.pos >= self.input.len() {
            return Err(GrammarError::Unterminated {
                what: "string literal",
                line,
                col,
            });
        }

        self.advance(); // skip closing quote
        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_command(&mut self) -> GrammarResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // skip ':'

        let mut name = String::new();
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_alphanumeric() || self.input[self.pos] == '_')
        {
            name.push(self.input[self.pos]);
            self.advance();
        }

        Ok(Token::new(TokenKind::Command, name, line, col))
    }

    fn read_context(&mut self) -> GrammarResult<Token> {
        let line = self.line;
        let col = self.col;
        for _ in 0..FENCE.len() {
            self.advance();
        }

        let mut tag = String::new();
        while self.pos < self.input.len()
            && (self.input[self.pos].is_ascii_alphanumeric()
                || self.input[self.pos] == '_'
                || self.input[self.pos] == '-')
        {
            tag.push(self.input[self.pos]);
            self.advance();
        }

        let mut raw = String::new();
        while self.pos < self.input.len() && !self.starts_with(FENCE) {
            raw.push(self.input[self.pos]);
            self.advance();
        }

        if self.pos >= self.input.len() {
            return Err(GrammarError::Unterminated {
                what: "context block",
                line,
                col,
            });
        }

        for _ in 0..FENCE.len() {
            self.advance();
        }

        let tag = if tag.is_empty() { None } else { Some(tag) };
        Ok(Token::context(tag, normalize_body(&raw), line, col))
    }

    fn read_word(&mut self) -> GrammarResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch.is_whitespace() || matches!(ch, '[' | ']' | ';' | '"') || self.starts_with(FENCE)
            {
                break;
            }
            text.push(ch);
            self.advance();
        }

        if text.is_empty() {
            return Err(GrammarError::ParseError {
                line,
                col,
                message: format!("Unexpected character: '{}'", self.input[self.pos]),
            });
        }

        Ok(Token::new(TokenKind::Word, text, line, col))
    }

    /// Skip whitespace, except newlines that separate top-level expressions.
    fn skip_blanks(&mut self) {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch == '\n' && self.depth == 0 {
                break;
            }
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            if self.input[self.pos] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

/// Strip the fence's own line break and the common indentation of the body.
fn normalize_body(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.split('\n').collect();
    if lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    } else if let Some(first) = lines.first_mut() {
        *first = first.trim_start();
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
