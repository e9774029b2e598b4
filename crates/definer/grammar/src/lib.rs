//! # definer-grammar
//!
//! Tokenizer and recursive-descent parser for the interactive concept
//! language. A line of input is a sequence of expressions separated by
//! `;` or newlines, each one of:
//!
//! ```text
//! statement  := symbol+                      the cat [sat on] [[the mat]]
//! command    := ':' NAME symbol*             :enter_concept cat
//! context    := '```' TAG? BODY '```'        ```python y = x + 1```
//! symbol     := WORD | [[PHRASE]] | "STRING" | '[' statement ']' | context
//! ```
//!
//! The grammar knows nothing about concepts; `definer-core` converts the
//! resulting [`ParsedProgram`] into graph nodes.

pub mod errors;
pub mod lexer;
pub mod parser;

pub use errors::{GrammarError, GrammarResult};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{
    ParsedCommand, ParsedContext, ParsedExpression, ParsedProgram, ParsedStatement, ParsedSymbol,
    Parser, MAX_BLOCK_DEPTH,
};
