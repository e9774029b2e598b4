//! Grammar error types

/// Errors that can occur while tokenizing or parsing an input line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token at line {line}, column {col}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        col: usize,
    },

    #[error("Unexpected end of input: expected {0}")]
    UnexpectedEof(String),

    #[error("Blocks nested deeper than {limit} levels at line {line}, column {col}")]
    NestingTooDeep {
        limit: usize,
        line: usize,
        col: usize,
    },

    #[error("Unterminated {what} starting at line {line}, column {col}")]
    Unterminated {
        what: &'static str,
        line: usize,
        col: usize,
    },
}

/// Result type alias for grammar operations
pub type GrammarResult<T> = Result<T, GrammarError>;
