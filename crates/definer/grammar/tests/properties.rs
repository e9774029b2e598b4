//! The parser answers every input with a program or an error.

use definer_grammar::{GrammarError, Parser, MAX_BLOCK_DEPTH};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_line() -> impl Strategy<Value = String> {
    "[a-z :;\\[\\]\"`\\n]{0,300}"
}

fn arb_nesting() -> impl Strategy<Value = (usize, bool)> {
    (0usize..5000, any::<bool>())
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn parse_never_panics_on_arbitrary_text(input in ".{0,200}") {
        let _ = Parser::parse(&input);
    }

    #[test]
    fn parse_never_panics_on_grammar_like_text(input in arb_line()) {
        let _ = Parser::parse(&input);
    }

    #[test]
    fn block_nesting_is_bounded((depth, balanced) in arb_nesting()) {
        let closing = if balanced { " ]".repeat(depth) } else { String::new() };
        let input = format!("{}x{}", "[ ".repeat(depth), closing);
        let result = Parser::parse(&input);
        if depth > MAX_BLOCK_DEPTH {
            let too_deep = matches!(result, Err(GrammarError::NestingTooDeep { .. }));
            prop_assert!(too_deep);
        } else if balanced {
            prop_assert!(result.is_ok());
        } else if depth > 0 {
            prop_assert!(result.is_err());
        }
    }
}
