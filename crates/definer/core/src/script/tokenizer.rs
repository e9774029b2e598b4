//! Tokenizer for the Python subset understood by the scope analyzer.
//!
//! Produces logical-line tokens with explicit `Indent`/`Dedent` markers.
//! Newlines inside brackets and after a backslash continuation are
//! whitespace. Comments are dropped.

use super::ScriptError;

const THREE_CHAR_OPS: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const TWO_CHAR_OPS: &[&str] = &[
    "->", ":=", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "@=",
];
const ONE_CHAR_OPS: &str = "+-*/%@&|^~<>()[]{},:.;=";

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Tok {
    Name(String),
    Number,
    /// A string literal. For f-strings, the source of each replacement field.
    Str(Vec<String>),
    Op(String),
    Newline,
    Indent,
    Dedent,
    End,
}

#[derive(Clone, Debug)]
pub(crate) struct Spanned {
    pub tok: Tok,
    pub line: usize,
    pub col: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ScriptError> {
    Tokenizer::new(source).run()
}

struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Spanned>,
}

impl Tokenizer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Spanned>, ScriptError> {
        loop {
            if self.at_line_start && self.depth == 0 {
                self.indentation()?;
                self.at_line_start = false;
            }
            let Some(c) = self.peek(0) else { break };
            match c {
                ' ' | '\t' | '\r' | '\x0c' => self.advance(),
                '#' => self.skip_comment(),
                '\\' if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                '\\' if self.peek(1) == Some('\r') && self.peek(2) == Some('\n') => {
                    self.advance();
                    self.advance();
                    self.advance();
                }
                '\n' => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    if self.depth == 0 {
                        self.end_logical_line(line, col);
                        self.at_line_start = true;
                    }
                }
                '\'' | '"' => self.string(String::new())?,
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.number(),
                c if c == '_' || c.is_alphabetic() => self.name()?,
                _ => self.operator()?,
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected end of input inside brackets"));
        }
        let (line, col) = (self.line, self.col);
        self.end_logical_line(line, col);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, line, col);
        }
        self.push(Tok::End, line, col);
        Ok(self.tokens)
    }

    /// Measure leading whitespace of a physical line and emit indentation tokens.
    /// Blank and comment-only lines are skipped entirely.
    fn indentation(&mut self) -> Result<(), ScriptError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek(0) {
                match c {
                    ' ' => width += 1,
                    '\t' => width = (width / 8 + 1) * 8,
                    '\x0c' | '\r' => {}
                    _ => break,
                }
                self.advance();
            }
            match self.peek(0) {
                None => return Ok(()),
                Some('#') => {
                    self.skip_comment();
                    if self.peek(0) == Some('\n') {
                        self.advance();
                    }
                }
                Some('\n') => self.advance(),
                Some(_) => return self.adjust_indent(width),
            }
        }
    }

    fn adjust_indent(&mut self, width: usize) -> Result<(), ScriptError> {
        let (line, col) = (self.line, self.col);
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent, line, col);
        } else if width < current {
            while self.indents.last().is_some_and(|w| *w > width) {
                self.indents.pop();
                self.push(Tok::Dedent, line, col);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn end_logical_line(&mut self, line: usize, col: usize) {
        let open = self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.tok, Tok::Newline | Tok::Indent | Tok::Dedent));
        if open {
            self.push(Tok::Newline, line, col);
        }
    }

    fn name(&mut self) -> Result<(), ScriptError> {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if matches!(self.peek(0), Some('\'' | '"')) && is_string_prefix(&text) {
            return self.string(text);
        }
        self.push(Tok::Name(text), line, col);
        Ok(())
    }

    fn number(&mut self) {
        let (line, col) = (self.line, self.col);
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                let exponent = matches!(c, 'e' | 'E');
                self.advance();
                if exponent && matches!(self.peek(0), Some('+' | '-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }
        self.push(Tok::Number, line, col);
    }

    fn string(&mut self, prefix: String) -> Result<(), ScriptError> {
        let (line, col) = (self.line, self.col);
        let Some(quote) = self.peek(0) else {
            return Err(self.error("expected string literal"));
        };
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        let fence = if triple { 3 } else { 1 };
        for _ in 0..fence {
            self.advance();
        }

        let mut body = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(ScriptError::new("unterminated string literal", line, col));
            };
            if c == quote
                && (!triple || (self.peek(1) == Some(quote) && self.peek(2) == Some(quote)))
            {
                for _ in 0..fence {
                    self.advance();
                }
                break;
            }
            if c == '\n' && !triple {
                return Err(ScriptError::new("unterminated string literal", line, col));
            }
            if c == '\\' {
                body.push(c);
                self.advance();
                if let Some(escaped) = self.peek(0) {
                    body.push(escaped);
                    self.advance();
                }
                continue;
            }
            body.push(c);
            self.advance();
        }

        let fields = if prefix.to_ascii_lowercase().contains('f') {
            fstring_fields(&body)
        } else {
            Vec::new()
        };
        self.push(Tok::Str(fields), line, col);
        Ok(())
    }

    fn operator(&mut self) -> Result<(), ScriptError> {
        let (line, col) = (self.line, self.col);
        for table in [THREE_CHAR_OPS, TWO_CHAR_OPS] {
            for op in table {
                if self.starts_with(op) {
                    for _ in 0..op.chars().count() {
                        self.advance();
                    }
                    self.push(Tok::Op((*op).to_string()), line, col);
                    return Ok(());
                }
            }
        }
        let Some(c) = self.peek(0) else {
            return Err(self.error("unexpected end of input"));
        };
        if !ONE_CHAR_OPS.contains(c) {
            return Err(self.error(format!("invalid character '{}'", c)));
        }
        match c {
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => {
                if self.depth == 0 {
                    return Err(self.error(format!("unmatched '{}'", c)));
                }
                self.depth -= 1;
            }
            _ => {}
        }
        self.advance();
        self.push(Tok::Op(c.to_string()), line, col);
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek(i) == Some(c))
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek(0) {
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn push(&mut self, tok: Tok, line: usize, col: usize) {
        self.tokens.push(Spanned { tok, line, col });
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::new(message, self.line, self.col)
    }
}

fn is_string_prefix(text: &str) -> bool {
    matches!(
        text.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

/// Source text of every `{expression}` replacement field in an f-string body,
/// including fields nested inside format specs.
fn fstring_fields(body: &str) -> Vec<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => i += 2,
            '{' => {
                i += 1;
                let start = i;
                let mut depth = 0usize;
                while i < chars.len() {
                    match chars[i] {
                        '(' | '[' | '{' => depth += 1,
                        ')' | ']' => depth = depth.saturating_sub(1),
                        '}' if depth == 0 => break,
                        '}' => depth -= 1,
                        q @ ('\'' | '"') => {
                            i += 1;
                            while i < chars.len() && chars[i] != q {
                                i += 1;
                            }
                        }
                        ':' if depth == 0 => break,
                        '!' if depth == 0 && chars.get(i + 1) != Some(&'=') => break,
                        '=' if depth == 0 && matches!(chars.get(i + 1), Some('}' | '!' | ':')) => {
                            break
                        }
                        _ => {}
                    }
                    i += 1;
                }
                let expr: String = chars[start..i.min(chars.len())].iter().collect();
                if !expr.trim().is_empty() {
                    fields.push(expr.trim().to_string());
                }

                let spec_start = i;
                let mut depth = 0usize;
                while i < chars.len() {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' if depth == 0 => break,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                if spec_start < i {
                    let spec: String = chars[spec_start..i].iter().collect();
                    fields.extend(fstring_fields(&spec));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    fields
}
