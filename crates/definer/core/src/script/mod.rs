//! Scope analysis for embedded scripting snippets.
//!
//! A context switch (```` ```python ...``` ````) carries source text in a
//! scripting sublanguage. The only thing the definition engine needs from
//! that text is the set of names it uses without binding them; a
//! [`ScopeAnalyzer`] extracts exactly that.

mod python;
mod tokenizer;

use serde::Serialize;
use std::fmt;

/// Tag accepted for untagged context switches.
pub const DEFAULT_CONTEXT_TAG: &str = "python";

/// Names that resolve without any binding in the concept hierarchy.
const PYTHON_BUILTINS: &[&str] = &[
    "abs", "all", "any", "ascii", "bin", "bool", "bytearray", "bytes", "callable", "chr",
    "classmethod", "complex", "delattr", "dict", "dir", "divmod", "enumerate", "eval", "exec",
    "filter", "float", "format", "frozenset", "getattr", "globals", "hasattr", "hash", "help",
    "hex", "id", "input", "int", "isinstance", "issubclass", "iter", "len", "list", "locals",
    "map", "max", "min", "next", "object", "oct", "open", "ord", "pow", "print", "property",
    "range", "repr", "reversed", "round", "set", "setattr", "slice", "sorted", "staticmethod",
    "str", "sum", "super", "tuple", "type", "vars", "zip", "__name__", "__file__", "__doc__",
    "Exception", "BaseException", "ValueError", "TypeError", "KeyError", "IndexError",
    "AttributeError", "RuntimeError", "StopIteration", "NotImplementedError", "ZeroDivisionError",
    "NotImplemented", "Ellipsis",
];

/// A snippet that could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("syntax error at line {line}, column {col}: {message}")]
pub struct ScriptError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            message: message.into(),
            line,
            col,
        }
    }
}

/// Extracts the free identifiers of a snippet in one scripting language.
pub trait ScopeAnalyzer: fmt::Debug + Send + Sync {
    /// The context tag this analyzer handles.
    fn language(&self) -> &str;

    /// Top-level free or global names, in first-reference order.
    ///
    /// Must never panic; unparseable input is an `Err`.
    fn free_identifiers(&self, source: &str) -> Result<Vec<String>, ScriptError>;
}

/// Scope analyzer for a Python subset.
#[derive(Debug, Clone, Default)]
pub struct PythonScopeAnalyzer {
    ignore_builtins: bool,
}

impl PythonScopeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave names such as `print` and `len` out of the result.
    pub fn ignoring_builtins(mut self, ignore: bool) -> Self {
        self.ignore_builtins = ignore;
        self
    }
}

impl ScopeAnalyzer for PythonScopeAnalyzer {
    fn language(&self) -> &str {
        DEFAULT_CONTEXT_TAG
    }

    fn free_identifiers(&self, source: &str) -> Result<Vec<String>, ScriptError> {
        let mut names = python::free_identifiers(source)?;
        if self.ignore_builtins {
            names.retain(|n| !PYTHON_BUILTINS.contains(&n.as_str()));
        }
        Ok(names)
    }
}

/// Maps context tags to analyzers.
///
/// An untagged (or empty-tagged) context switch uses the default analyzer.
#[derive(Debug)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn ScopeAnalyzer>>,
    default_language: Option<String>,
}

impl AnalyzerRegistry {
    /// A registry with no analyzers: every context switch is rejected.
    pub fn empty() -> Self {
        Self {
            analyzers: Vec::new(),
            default_language: None,
        }
    }

    pub fn with_python(ignore_builtins: bool) -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(
            PythonScopeAnalyzer::new().ignoring_builtins(ignore_builtins),
        ));
        registry
    }

    /// Add an analyzer. The first one registered becomes the default.
    pub fn register(&mut self, analyzer: Box<dyn ScopeAnalyzer>) {
        if self.default_language.is_none() {
            self.default_language = Some(analyzer.language().to_string());
        }
        self.analyzers.retain(|a| a.language() != analyzer.language());
        self.analyzers.push(analyzer);
    }

    /// Make `language` the analyzer used for untagged snippets.
    /// Returns false when no analyzer handles it.
    pub fn set_default(&mut self, language: &str) -> bool {
        if self.analyzers.iter().any(|a| a.language() == language) {
            self.default_language = Some(language.to_string());
            true
        } else {
            false
        }
    }

    pub fn resolve(&self, tag: Option<&str>) -> Option<&dyn ScopeAnalyzer> {
        let language = match tag {
            None | Some("") => self.default_language.as_deref()?,
            Some(tag) => tag,
        };
        self.analyzers
            .iter()
            .find(|a| a.language() == language)
            .map(|a| a.as_ref())
    }

    pub fn languages(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.language()).collect()
    }

    /// Human readable list of accepted tags for diagnostics.
    pub fn accepted_tags(&self) -> String {
        let mut tags = self.languages().join(", ");
        if self.default_language.is_some() {
            tags.push_str(" or untagged");
        }
        if tags.is_empty() {
            tags.push_str("none");
        }
        tags
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::with_python(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_reported_by_default() {
        let analyzer = PythonScopeAnalyzer::new();
        assert_eq!(
            analyzer.free_identifiers("print(len(x))").unwrap(),
            vec!["print", "len", "x"]
        );
    }

    #[test]
    fn builtins_can_be_ignored() {
        let analyzer = PythonScopeAnalyzer::new().ignoring_builtins(true);
        assert_eq!(analyzer.free_identifiers("print(len(x))").unwrap(), vec!["x"]);
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        let analyzer = PythonScopeAnalyzer::new();
        for garbage in ["(((", "def", "x = [1, 2", "\u{1F600} = 1", "lambda: :", "if:"] {
            assert!(analyzer.free_identifiers(garbage).is_err(), "{garbage}");
        }
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let analyzer = PythonScopeAnalyzer::new();
        let deep = |open: &str, close: &str, depth: usize| {
            format!("{}x{}", open.repeat(depth), close.repeat(depth))
        };

        for source in [
            deep("(", ")", 500),
            deep("[", "]", 5000),
            deep("{", "}", 500),
            deep("f(", ")", 500),
            deep("x[", "]", 500),
            format!("{}x", "not ".repeat(500)),
            format!("{}x", "-".repeat(500)),
            format!("{}x", "lambda: ".repeat(500)),
        ] {
            let err = analyzer.free_identifiers(&source).unwrap_err();
            assert!(
                err.message.contains("too many nested parentheses")
                    || err.message.contains("nested too deeply"),
                "{}",
                err
            );
        }

        assert_eq!(
            analyzer.free_identifiers(&deep("(", ")", 40)).unwrap(),
            vec!["x"]
        );
    }

    #[test]
    fn deep_indentation_is_a_syntax_error() {
        let analyzer = PythonScopeAnalyzer::new();
        let source: String = (0..150)
            .map(|level| format!("{}try:\n", " ".repeat(level)))
            .chain(std::iter::once(format!("{}pass\n", " ".repeat(150))))
            .collect();
        let err = analyzer.free_identifiers(&source).unwrap_err();
        assert!(err.message.contains("too many levels of indentation"), "{}", err);
    }

    #[test]
    fn registry_resolves_tags() {
        let registry = AnalyzerRegistry::default();
        assert!(registry.resolve(Some("python")).is_some());
        assert!(registry.resolve(Some("")).is_some());
        assert!(registry.resolve(None).is_some());
        assert!(registry.resolve(Some("ruby")).is_none());
        assert_eq!(registry.accepted_tags(), "python or untagged");
    }

    #[test]
    fn empty_registry_rejects_everything() {
        let registry = AnalyzerRegistry::empty();
        assert!(registry.resolve(None).is_none());
        assert_eq!(registry.accepted_tags(), "none");
    }

    #[test]
    fn error_display_has_position() {
        let err = ScriptError::new("invalid syntax", 2, 5);
        assert_eq!(
            err.to_string(),
            "syntax error at line 2, column 5: invalid syntax"
        );
    }
}
