//! Recursive-descent parser for a Python subset that tracks name scopes
//! while it parses.
//!
//! Only what matters for scoping is kept from each expression: which names
//! are read, which are bound, and which nested scopes (functions, lambdas,
//! classes, comprehensions) they happen in.

use super::tokenizer::{tokenize, Spanned, Tok};
use super::ScriptError;
use std::collections::HashSet;

type ParseResult<T> = Result<T, ScriptError>;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

const AUGMENTED_OPS: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "@=", "&=", "|=", "^=", ">>=", "<<=", "**=",
];

const BINARY_LEVELS: &[&[&str]] = &[
    &["|"],
    &["^"],
    &["&"],
    &["<<", ">>"],
    &["+", "-"],
    &["*", "/", "//", "%", "@"],
];

/// Deepest nesting of brackets, unary operators, lambdas and blocks accepted
/// before a snippet is rejected.
const MAX_NESTING: usize = 100;

fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Names referenced but never bound, in first-reference order.
pub(crate) fn free_identifiers(source: &str) -> ParseResult<Vec<String>> {
    let tokens = tokenize(source)?;
    let mut parser = PyParser {
        toks: tokens,
        pos: 0,
        depth: 0,
        scopes: Scopes::new(),
    };
    parser.module()?;
    Ok(parser.scopes.free_names())
}

// ── Expressions, reduced to what scoping needs ───────────────────────

#[derive(Clone, Debug)]
enum Expr {
    Name(String),
    /// Anything that only reads its operands and cannot be assigned to.
    Load(Vec<Expr>),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Starred(Box<Expr>),
    Attribute(Box<Expr>),
    Subscript(Box<Expr>, Vec<Expr>),
    Lambda(Vec<Param>, Box<Expr>),
    Comprehension(Vec<Expr>, Vec<Generator>),
    Named(String, Box<Expr>),
}

#[derive(Clone, Debug)]
struct Param {
    name: Option<String>,
    default: Option<Expr>,
    annotation: Option<Expr>,
}

#[derive(Clone, Debug)]
struct Generator {
    target: Expr,
    iter: Expr,
    conditions: Vec<Expr>,
}

fn collapse(mut items: Vec<Expr>) -> Expr {
    if items.len() == 1 {
        if let Some(only) = items.pop() {
            return only;
        }
    }
    Expr::Load(items)
}

// ── Scopes ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ScopeKind {
    Module,
    Function,
    Class,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<usize>,
    bound: HashSet<String>,
    globals: HashSet<String>,
    nonlocals: HashSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            parent,
            bound: HashSet::new(),
            globals: HashSet::new(),
            nonlocals: HashSet::new(),
        }
    }
}

#[derive(Debug)]
struct Scopes {
    scopes: Vec<Scope>,
    current: usize,
    /// Every name read, with the scope it was read in, in source order.
    references: Vec<(usize, String)>,
}

const MODULE: usize = 0;

static END: Tok = Tok::End;

impl Scopes {
    fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Module, None)],
            current: MODULE,
            references: Vec::new(),
        }
    }

    fn push(&mut self, kind: ScopeKind) {
        let idx = self.scopes.len();
        self.scopes.push(Scope::new(kind, Some(self.current)));
        self.current = idx;
    }

    fn pop(&mut self) {
        self.current = self.scopes[self.current].parent.unwrap_or(MODULE);
    }

    fn reference(&mut self, name: &str) {
        self.references.push((self.current, name.to_string()));
    }

    fn bind(&mut self, name: &str) {
        self.bind_in(self.current, name);
    }

    fn bind_in(&mut self, idx: usize, name: &str) {
        let scope = &self.scopes[idx];
        if scope.globals.contains(name) {
            self.scopes[MODULE].bound.insert(name.to_string());
        } else if !scope.nonlocals.contains(name) {
            self.scopes[idx].bound.insert(name.to_string());
        }
    }

    /// `:=` binds in the nearest scope that is not a comprehension.
    fn bind_named(&mut self, name: &str) {
        let mut idx = self.current;
        while self.scopes[idx].kind == ScopeKind::Comprehension {
            idx = self.scopes[idx].parent.unwrap_or(MODULE);
        }
        self.bind_in(idx, name);
    }

    fn declare_global(&mut self, name: &str) {
        if self.current != MODULE {
            self.scopes[self.current].globals.insert(name.to_string());
        }
    }

    fn declare_nonlocal(&mut self, name: &str) {
        if self.current != MODULE {
            self.scopes[self.current].nonlocals.insert(name.to_string());
        }
    }

    fn is_free(&self, idx: usize, name: &str) -> bool {
        let module_binds = self.scopes[MODULE].bound.contains(name);
        let scope = &self.scopes[idx];
        if scope.kind == ScopeKind::Module || scope.globals.contains(name) {
            return !module_binds;
        }
        if scope.nonlocals.contains(name) || scope.bound.contains(name) {
            return false;
        }

        let mut enclosing = scope.parent;
        while let Some(pi) = enclosing {
            let outer = &self.scopes[pi];
            match outer.kind {
                ScopeKind::Module => return !module_binds,
                // Class bodies are not visible to the scopes nested in them.
                ScopeKind::Class => {}
                ScopeKind::Function | ScopeKind::Comprehension => {
                    if outer.globals.contains(name) {
                        return !module_binds;
                    }
                    if outer.bound.contains(name) || outer.nonlocals.contains(name) {
                        return false;
                    }
                }
            }
            enclosing = outer.parent;
        }
        !module_binds
    }

    fn free_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (idx, name) in &self.references {
            if self.is_free(*idx, name) && seen.insert(name.as_str()) {
                out.push(name.clone());
            }
        }
        out
    }

    fn load(&mut self, expr: &Expr) -> Result<(), String> {
        match expr {
            Expr::Name(name) => self.reference(name),
            Expr::Load(items) | Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    self.load(item)?;
                }
            }
            Expr::Starred(inner) | Expr::Attribute(inner) => self.load(inner)?,
            Expr::Subscript(value, index) => {
                self.load(value)?;
                for item in index {
                    self.load(item)?;
                }
            }
            Expr::Lambda(params, body) => {
                self.load_param_defaults(params)?;
                self.push(ScopeKind::Function);
                for name in params.iter().filter_map(|p| p.name.as_deref()) {
                    self.bind(name);
                }
                self.load(body)?;
                self.pop();
            }
            Expr::Comprehension(elements, generators) => {
                let Some((first, rest)) = generators.split_first() else {
                    for element in elements {
                        self.load(element)?;
                    }
                    return Ok(());
                };
                // The outermost iterable is evaluated in the enclosing scope.
                self.load(&first.iter)?;
                self.push(ScopeKind::Comprehension);
                self.store(&first.target)?;
                for condition in &first.conditions {
                    self.load(condition)?;
                }
                for generator in rest {
                    self.load(&generator.iter)?;
                    self.store(&generator.target)?;
                    for condition in &generator.conditions {
                        self.load(condition)?;
                    }
                }
                for element in elements {
                    self.load(element)?;
                }
                self.pop();
            }
            Expr::Named(name, value) => {
                self.load(value)?;
                self.bind_named(name);
            }
        }
        Ok(())
    }

    fn load_param_defaults(&mut self, params: &[Param]) -> Result<(), String> {
        for param in params {
            if let Some(default) = &param.default {
                self.load(default)?;
            }
            if let Some(annotation) = &param.annotation {
                self.load(annotation)?;
            }
        }
        Ok(())
    }

    fn store(&mut self, expr: &Expr) -> Result<(), String> {
        match expr {
            Expr::Name(name) => self.bind(name),
            Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    self.store(item)?;
                }
            }
            Expr::Starred(inner) => self.store(inner)?,
            Expr::Attribute(inner) => self.load(inner)?,
            Expr::Subscript(value, index) => {
                self.load(value)?;
                for item in index {
                    self.load(item)?;
                }
            }
            _ => return Err("cannot assign to expression".into()),
        }
        Ok(())
    }

    fn augment(&mut self, expr: &Expr) -> Result<(), String> {
        match expr {
            Expr::Name(name) => {
                self.reference(name);
                self.bind(name);
                Ok(())
            }
            Expr::Attribute(_) | Expr::Subscript(..) => self.store(expr),
            _ => Err("illegal expression for augmented assignment".into()),
        }
    }

    fn delete(&mut self, expr: &Expr) -> Result<(), String> {
        match expr {
            Expr::Tuple(items) | Expr::List(items) => {
                for item in items {
                    self.delete(item)?;
                }
                Ok(())
            }
            Expr::Name(_) | Expr::Attribute(_) | Expr::Subscript(..) => self.store(expr),
            _ => Err("cannot delete expression".into()),
        }
    }
}

// ── Parser ───────────────────────────────────────────────────────────

struct PyParser {
    toks: Vec<Spanned>,
    pos: usize,
    depth: usize,
    scopes: Scopes,
}

impl PyParser {
    fn module(&mut self) -> ParseResult<()> {
        loop {
            match self.peek() {
                Tok::End => return Ok(()),
                Tok::Newline => {
                    self.advance();
                }
                _ => self.statement()?,
            }
        }
    }

    fn statement(&mut self) -> ParseResult<()> {
        if self.is_op("@") {
            return self.decorated();
        }
        if matches!(self.peek(), Tok::Indent | Tok::Dedent) {
            return Err(self.error("unexpected indent"));
        }
        match self.keyword().as_str() {
            "def" => self.funcdef(),
            "class" => self.classdef(),
            "if" => self.if_stmt(),
            "while" => self.while_stmt(),
            "for" => self.for_stmt(),
            "try" => self.try_stmt(),
            "with" => self.with_stmt(),
            "async" => {
                self.advance();
                match self.keyword().as_str() {
                    "def" => self.funcdef(),
                    "for" => self.for_stmt(),
                    "with" => self.with_stmt(),
                    _ => Err(self.unexpected()),
                }
            }
            _ => self.simple_line(),
        }
    }

    fn decorated(&mut self) -> ParseResult<()> {
        while self.eat_op("@") {
            let decorator = self.namedexpr_test()?;
            self.load(&decorator)?;
            self.expect_newline()?;
        }
        self.eat_kw("async");
        match self.keyword().as_str() {
            "def" => self.funcdef(),
            "class" => self.classdef(),
            _ => Err(self.error("expected function or class definition after decorator")),
        }
    }

    fn block(&mut self) -> ParseResult<()> {
        self.nested("too many levels of indentation", Self::indented_block)
    }

    fn indented_block(&mut self) -> ParseResult<()> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Tok::Newline) {
            return self.simple_line();
        }
        self.advance();
        if !matches!(self.peek(), Tok::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.advance();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.advance();
                    return Ok(());
                }
                Tok::End => return Ok(()),
                Tok::Newline => {
                    self.advance();
                }
                _ => self.statement()?,
            }
        }
    }

    fn simple_line(&mut self) -> ParseResult<()> {
        loop {
            self.simple_statement()?;
            if !self.eat_op(";") || matches!(self.peek(), Tok::Newline | Tok::End) {
                break;
            }
        }
        self.expect_newline()
    }

    fn simple_statement(&mut self) -> ParseResult<()> {
        match self.keyword().as_str() {
            "pass" | "break" | "continue" => {
                self.advance();
            }
            "return" => {
                self.advance();
                if !self.at_statement_end() {
                    let value = self.testlist_star_expr()?;
                    self.load(&value)?;
                }
            }
            "raise" => {
                self.advance();
                if !self.at_statement_end() {
                    let exc = self.test()?;
                    self.load(&exc)?;
                    if self.eat_kw("from") {
                        let cause = self.test()?;
                        self.load(&cause)?;
                    }
                }
            }
            "global" | "nonlocal" => {
                let global = self.keyword() == "global";
                self.advance();
                loop {
                    let name = self.expect_name()?;
                    if global {
                        self.scopes.declare_global(&name);
                    } else {
                        self.scopes.declare_nonlocal(&name);
                    }
                    if !self.eat_op(",") {
                        break;
                    }
                }
            }
            "del" => {
                self.advance();
                let targets = self.target_list()?;
                let (line, col) = self.span();
                self.scopes
                    .delete(&targets)
                    .map_err(|m| ScriptError::new(m, line, col))?;
            }
            "assert" => {
                self.advance();
                let check = self.test()?;
                self.load(&check)?;
                if self.eat_op(",") {
                    let message = self.test()?;
                    self.load(&message)?;
                }
            }
            "import" => self.import_name()?,
            "from" => self.import_from()?,
            _ => self.expr_statement()?,
        }
        Ok(())
    }

    fn import_name(&mut self) -> ParseResult<()> {
        self.advance();
        loop {
            let first = self.expect_name()?;
            while self.eat_op(".") {
                self.expect_name()?;
            }
            if self.eat_kw("as") {
                let alias = self.expect_name()?;
                self.scopes.bind(&alias);
            } else {
                self.scopes.bind(&first);
            }
            if !self.eat_op(",") {
                return Ok(());
            }
        }
    }

    fn import_from(&mut self) -> ParseResult<()> {
        self.advance();
        while self.eat_op(".") || self.eat_op("...") {}
        if !self.is_kw("import") {
            self.expect_name()?;
            while self.eat_op(".") {
                self.expect_name()?;
            }
        }
        self.expect_kw("import")?;
        if self.eat_op("*") {
            return Ok(());
        }
        let parenthesized = self.eat_op("(");
        loop {
            if parenthesized && self.is_op(")") {
                break;
            }
            let name = self.expect_name()?;
            let bound = if self.eat_kw("as") {
                self.expect_name()?
            } else {
                name
            };
            self.scopes.bind(&bound);
            if !self.eat_op(",") {
                break;
            }
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(())
    }

    fn expr_statement(&mut self) -> ParseResult<()> {
        let first = self.yield_or_testlist()?;

        if self.eat_op(":") {
            let annotation = self.test()?;
            self.load(&annotation)?;
            if self.eat_op("=") {
                let value = self.yield_or_testlist()?;
                self.load(&value)?;
            }
            return self.store(&first);
        }

        if AUGMENTED_OPS.iter().any(|op| self.is_op(op)) {
            self.advance();
            let value = self.yield_or_testlist()?;
            self.load(&value)?;
            let (line, col) = self.span();
            return self
                .scopes
                .augment(&first)
                .map_err(|m| ScriptError::new(m, line, col));
        }

        if self.is_op("=") {
            let mut chain = vec![first];
            while self.eat_op("=") {
                chain.push(self.yield_or_testlist()?);
            }
            if let Some(value) = chain.pop() {
                self.load(&value)?;
            }
            for target in &chain {
                self.store(target)?;
            }
            return Ok(());
        }

        self.load(&first)
    }

    fn funcdef(&mut self) -> ParseResult<()> {
        self.advance();
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parameters(")", true)?;
        self.expect_op(")")?;
        let (line, col) = self.span();
        self.scopes
            .load_param_defaults(&params)
            .map_err(|m| ScriptError::new(m, line, col))?;
        if self.eat_op("->") {
            let returns = self.test()?;
            self.load(&returns)?;
        }

        self.scopes.bind(&name);
        self.scopes.push(ScopeKind::Function);
        for param in params.iter().filter_map(|p| p.name.as_deref()) {
            self.scopes.bind(param);
        }
        self.block()?;
        self.scopes.pop();
        Ok(())
    }

    fn classdef(&mut self) -> ParseResult<()> {
        self.advance();
        let name = self.expect_name()?;
        if self.eat_op("(") {
            for base in self.arguments()? {
                self.load(&base)?;
            }
        }
        self.scopes.bind(&name);
        self.scopes.push(ScopeKind::Class);
        self.block()?;
        self.scopes.pop();
        Ok(())
    }

    fn if_stmt(&mut self) -> ParseResult<()> {
        self.advance();
        self.condition_and_block()?;
        while self.eat_kw("elif") {
            self.condition_and_block()?;
        }
        if self.eat_kw("else") {
            self.block()?;
        }
        Ok(())
    }

    fn while_stmt(&mut self) -> ParseResult<()> {
        self.advance();
        self.condition_and_block()?;
        if self.eat_kw("else") {
            self.block()?;
        }
        Ok(())
    }

    fn condition_and_block(&mut self) -> ParseResult<()> {
        let condition = self.namedexpr_test()?;
        self.load(&condition)?;
        self.block()
    }

    fn for_stmt(&mut self) -> ParseResult<()> {
        self.advance();
        let target = self.target_list()?;
        self.expect_kw("in")?;
        let iter = self.testlist_star_expr()?;
        self.load(&iter)?;
        self.store(&target)?;
        self.block()?;
        if self.eat_kw("else") {
            self.block()?;
        }
        Ok(())
    }

    fn try_stmt(&mut self) -> ParseResult<()> {
        self.advance();
        self.block()?;
        let mut handlers = 0;
        while self.eat_kw("except") {
            self.eat_op("*");
            if !self.is_op(":") {
                let kind = self.test()?;
                self.load(&kind)?;
                if self.eat_kw("as") {
                    let name = self.expect_name()?;
                    self.scopes.bind(&name);
                }
            }
            self.block()?;
            handlers += 1;
        }
        if self.eat_kw("else") {
            self.block()?;
        }
        let has_finally = self.eat_kw("finally");
        if has_finally {
            self.block()?;
        }
        if handlers == 0 && !has_finally {
            return Err(self.error("expected 'except' or 'finally' block"));
        }
        Ok(())
    }

    fn with_stmt(&mut self) -> ParseResult<()> {
        self.advance();
        loop {
            let manager = self.test()?;
            self.load(&manager)?;
            if self.eat_kw("as") {
                let target = self.star_target()?;
                self.store(&target)?;
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.block()
    }

    /// Parameter list up to (not including) `close`.
    fn parameters(&mut self, close: &str, annotated: bool) -> ParseResult<Vec<Param>> {
        let mut params = Vec::new();
        while !self.is_op(close) {
            if self.eat_op("/") {
                // positional-only marker
            } else if self.eat_op("*") || self.eat_op("**") {
                if matches!(self.peek(), Tok::Name(_)) {
                    let name = self.expect_name()?;
                    let annotation = self.annotation(annotated)?;
                    params.push(Param {
                        name: Some(name),
                        default: None,
                        annotation,
                    });
                }
            } else {
                let name = self.expect_name()?;
                let annotation = self.annotation(annotated)?;
                let default = if self.eat_op("=") {
                    Some(self.test()?)
                } else {
                    None
                };
                params.push(Param {
                    name: Some(name),
                    default,
                    annotation,
                });
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn annotation(&mut self, annotated: bool) -> ParseResult<Option<Expr>> {
        if annotated && self.eat_op(":") {
            Ok(Some(self.test()?))
        } else {
            Ok(None)
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn yield_or_testlist(&mut self) -> ParseResult<Expr> {
        if self.is_kw("yield") {
            self.yield_expr()
        } else {
            self.testlist_star_expr()
        }
    }

    fn yield_expr(&mut self) -> ParseResult<Expr> {
        self.advance();
        if self.eat_kw("from") {
            return Ok(Expr::Load(vec![self.test()?]));
        }
        if self.starts_expr() {
            return Ok(Expr::Load(vec![self.testlist_star_expr()?]));
        }
        Ok(Expr::Load(Vec::new()))
    }

    fn testlist_star_expr(&mut self) -> ParseResult<Expr> {
        let first = self.star_or_test()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            items.push(self.star_or_test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn star_or_test(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.or_expr()?)))
        } else {
            self.test()
        }
    }

    fn star_or_named(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.or_expr()?)))
        } else {
            self.namedexpr_test()
        }
    }

    fn namedexpr_test(&mut self) -> ParseResult<Expr> {
        if let Tok::Name(name) = self.peek() {
            if !is_keyword(name) && self.op_at(1, ":=") {
                let name = name.clone();
                self.advance();
                self.advance();
                let value = self.test()?;
                return Ok(Expr::Named(name, Box::new(value)));
            }
        }
        self.test()
    }

    fn test(&mut self) -> ParseResult<Expr> {
        self.nested("expression nested too deeply", Self::conditional)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        if self.is_kw("lambda") {
            return self.lambdef();
        }
        let body = self.or_test()?;
        if self.eat_kw("if") {
            let condition = self.or_test()?;
            self.expect_kw("else")?;
            let alternative = self.test()?;
            return Ok(Expr::Load(vec![body, condition, alternative]));
        }
        Ok(body)
    }

    fn lambdef(&mut self) -> ParseResult<Expr> {
        self.advance();
        let params = self.parameters(":", false)?;
        self.expect_op(":")?;
        let body = self.test()?;
        Ok(Expr::Lambda(params, Box::new(body)))
    }

    fn or_test(&mut self) -> ParseResult<Expr> {
        let mut items = vec![self.and_test()?];
        while self.eat_kw("or") {
            items.push(self.and_test()?);
        }
        Ok(collapse(items))
    }

    fn and_test(&mut self) -> ParseResult<Expr> {
        let mut items = vec![self.not_test()?];
        while self.eat_kw("and") {
            items.push(self.not_test()?);
        }
        Ok(collapse(items))
    }

    fn not_test(&mut self) -> ParseResult<Expr> {
        if self.eat_kw("not") {
            let operand = self.nested("expression nested too deeply", Self::not_test)?;
            return Ok(Expr::Load(vec![operand]));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut items = vec![self.or_expr()?];
        while self.eat_comparison_op() {
            items.push(self.or_expr()?);
        }
        Ok(collapse(items))
    }

    fn eat_comparison_op(&mut self) -> bool {
        if ["<", ">", "==", ">=", "<=", "!="]
            .iter()
            .any(|op| self.is_op(op))
        {
            self.advance();
            return true;
        }
        if self.eat_kw("in") {
            return true;
        }
        if self.is_kw("not") && matches!(self.peek_at(1), Tok::Name(n) if n == "in") {
            self.advance();
            self.advance();
            return true;
        }
        if self.eat_kw("is") {
            self.eat_kw("not");
            return true;
        }
        false
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        self.binary(0)
    }

    fn binary(&mut self, level: usize) -> ParseResult<Expr> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.factor();
        };
        let mut items = vec![self.binary(level + 1)?];
        while ops.iter().any(|op| self.is_op(op)) {
            self.advance();
            items.push(self.binary(level + 1)?);
        }
        Ok(collapse(items))
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        if self.is_op("-") || self.is_op("+") || self.is_op("~") {
            self.advance();
            let operand = self.nested("expression nested too deeply", Self::factor)?;
            return Ok(Expr::Load(vec![operand]));
        }
        self.power()
    }

    fn power(&mut self) -> ParseResult<Expr> {
        let base = if self.eat_kw("await") {
            Expr::Load(vec![self.primary()?])
        } else {
            self.primary()?
        };
        if self.eat_op("**") {
            return Ok(Expr::Load(vec![base, self.factor()?]));
        }
        Ok(base)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            if self.eat_op("(") {
                let mut parts = vec![expr];
                parts.extend(self.arguments()?);
                expr = Expr::Load(parts);
            } else if self.eat_op("[") {
                let index = self.subscripts()?;
                expr = Expr::Subscript(Box::new(expr), index);
            } else if self.eat_op(".") {
                if !matches!(self.peek(), Tok::Name(_)) {
                    return Err(self.unexpected());
                }
                self.advance();
                expr = Expr::Attribute(Box::new(expr));
            } else {
                return Ok(expr);
            }
        }
    }

    fn atom(&mut self) -> ParseResult<Expr> {
        self.nested("too many nested parentheses", Self::plain_atom)
    }

    fn plain_atom(&mut self) -> ParseResult<Expr> {
        let (line, col) = self.span();
        let tok = self.peek().clone();
        match tok {
            Tok::Op(op) => {
                self.advance();
                match op.as_str() {
                    "(" => self.paren_atom(),
                    "[" => self.list_atom(),
                    "{" => self.brace_atom(),
                    "..." => Ok(Expr::Load(Vec::new())),
                    _ => Err(ScriptError::new(
                        format!("invalid syntax near '{}'", op),
                        line,
                        col,
                    )),
                }
            }
            Tok::Name(name) => {
                if is_keyword(&name) && !matches!(name.as_str(), "None" | "True" | "False") {
                    return Err(self.unexpected());
                }
                self.advance();
                if is_keyword(&name) {
                    Ok(Expr::Load(Vec::new()))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Tok::Number => {
                self.advance();
                Ok(Expr::Load(Vec::new()))
            }
            Tok::Str(fields) => {
                self.advance();
                let mut parts = self.fstring_parts(&fields, line, col)?;
                while let Tok::Str(more) = self.peek().clone() {
                    self.advance();
                    parts.extend(self.fstring_parts(&more, line, col)?);
                }
                Ok(Expr::Load(parts))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse each f-string replacement field as an expression in the current scope.
    fn fstring_parts(
        &mut self,
        fields: &[String],
        line: usize,
        col: usize,
    ) -> ParseResult<Vec<Expr>> {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let tokens = tokenize(field).map_err(|e| {
                ScriptError::new(format!("in f-string field: {}", e.message), line, col)
            })?;
            let saved_toks = std::mem::replace(&mut self.toks, tokens);
            let saved_pos = std::mem::replace(&mut self.pos, 0);
            let parsed = self.testlist_star_expr();
            let complete = matches!(self.peek(), Tok::Newline | Tok::End);
            self.toks = saved_toks;
            self.pos = saved_pos;

            let expr = parsed.map_err(|e| {
                ScriptError::new(format!("in f-string field: {}", e.message), line, col)
            })?;
            if !complete {
                return Err(ScriptError::new(
                    format!("invalid f-string field '{}'", field),
                    line,
                    col,
                ));
            }
            parts.push(expr);
        }
        Ok(parts)
    }

    fn paren_atom(&mut self) -> ParseResult<Expr> {
        if self.eat_op(")") {
            return Ok(Expr::Tuple(Vec::new()));
        }
        if self.is_kw("yield") {
            let inner = self.yield_expr()?;
            self.expect_op(")")?;
            return Ok(inner);
        }
        let first = self.star_or_named()?;
        if self.at_comp_for() {
            let generators = self.comp_for()?;
            self.expect_op(")")?;
            return Ok(Expr::Comprehension(vec![first], generators));
        }
        if !self.is_op(",") {
            self.expect_op(")")?;
            return Ok(first);
        }
        let items = self.sequence_tail(first, ")")?;
        Ok(Expr::Tuple(items))
    }

    fn list_atom(&mut self) -> ParseResult<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.star_or_named()?;
        if self.at_comp_for() {
            let generators = self.comp_for()?;
            self.expect_op("]")?;
            return Ok(Expr::Comprehension(vec![first], generators));
        }
        let items = self.sequence_tail(first, "]")?;
        Ok(Expr::List(items))
    }

    fn sequence_tail(&mut self, first: Expr, close: &str) -> ParseResult<Vec<Expr>> {
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.is_op(close) {
                break;
            }
            items.push(self.star_or_named()?);
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn brace_atom(&mut self) -> ParseResult<Expr> {
        if self.eat_op("}") {
            return Ok(Expr::Load(Vec::new()));
        }
        let mut items = Vec::new();
        loop {
            if self.eat_op("**") {
                items.push(self.or_expr()?);
            } else {
                let key = self.star_or_named()?;
                if self.eat_op(":") {
                    let value = self.test()?;
                    items.push(Expr::Load(vec![key, value]));
                } else {
                    items.push(key);
                }
            }
            if items.len() == 1 && self.at_comp_for() {
                let generators = self.comp_for()?;
                self.expect_op("}")?;
                return Ok(Expr::Comprehension(items, generators));
            }
            if !self.eat_op(",") || self.is_op("}") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(Expr::Load(items))
    }

    fn at_comp_for(&self) -> bool {
        self.is_kw("for")
            || (self.is_kw("async") && matches!(self.peek_at(1), Tok::Name(n) if n == "for"))
    }

    fn comp_for(&mut self) -> ParseResult<Vec<Generator>> {
        let mut generators = Vec::new();
        while self.at_comp_for() {
            self.eat_kw("async");
            self.expect_kw("for")?;
            let target = self.target_list()?;
            self.expect_kw("in")?;
            let iter = self.or_test()?;
            let mut conditions = Vec::new();
            while self.eat_kw("if") {
                conditions.push(self.or_test()?);
            }
            generators.push(Generator {
                target,
                iter,
                conditions,
            });
        }
        Ok(generators)
    }

    fn target_list(&mut self) -> ParseResult<Expr> {
        let first = self.star_target()?;
        if !self.is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            items.push(self.star_target()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn star_target(&mut self) -> ParseResult<Expr> {
        if self.eat_op("*") {
            Ok(Expr::Starred(Box::new(self.or_expr()?)))
        } else {
            self.or_expr()
        }
    }

    /// Call arguments after the opening parenthesis, consuming the closing one.
    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.is_op(")") {
            if self.eat_op("*") || self.eat_op("**") {
                args.push(self.test()?);
            } else if matches!(self.peek(), Tok::Name(n) if !is_keyword(n)) && self.op_at(1, "=")
            {
                // keyword argument: the name is not a reference
                self.advance();
                self.advance();
                args.push(self.test()?);
            } else {
                let arg = self.namedexpr_test()?;
                if self.at_comp_for() {
                    let generators = self.comp_for()?;
                    args.push(Expr::Comprehension(vec![arg], generators));
                } else {
                    args.push(arg);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok(args)
    }

    /// Subscript items after the opening bracket, consuming the closing one.
    fn subscripts(&mut self) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if !self.is_op(":") {
                items.push(self.star_or_named()?);
            }
            if self.eat_op(":") {
                if !self.is_op(":") && !self.is_op("]") && !self.is_op(",") {
                    items.push(self.test()?);
                }
                if self.eat_op(":") && !self.is_op("]") && !self.is_op(",") {
                    items.push(self.test()?);
                }
            }
            if !self.eat_op(",") || self.is_op("]") {
                break;
            }
        }
        self.expect_op("]")?;
        Ok(items)
    }

    // ── Scope bridging ───────────────────────────────────────────────

    fn load(&mut self, expr: &Expr) -> ParseResult<()> {
        let (line, col) = self.span();
        self.scopes
            .load(expr)
            .map_err(|m| ScriptError::new(m, line, col))
    }

    fn store(&mut self, expr: &Expr) -> ParseResult<()> {
        let (line, col) = self.span();
        self.scopes
            .store(expr)
            .map_err(|m| ScriptError::new(m, line, col))
    }

    /// Run `parse` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        message: &str,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(message));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ── Token helpers ────────────────────────────────────────────────

    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.toks
            .get(self.pos + offset)
            .or_else(|| self.toks.last())
            .map(|s| &s.tok)
            .unwrap_or(&END)
    }

    fn span(&self) -> (usize, usize) {
        self.toks
            .get(self.pos)
            .or_else(|| self.toks.last())
            .map(|s| (s.line, s.col))
            .unwrap_or((1, 1))
    }

    fn advance(&mut self) {
        if self.pos < self.toks.len() {
            self.pos += 1;
        }
    }

    fn keyword(&self) -> String {
        match self.peek() {
            Tok::Name(name) if is_keyword(name) => name.clone(),
            _ => String::new(),
        }
    }

    fn is_op(&self, op: &str) -> bool {
        self.op_at(0, op)
    }

    fn op_at(&self, offset: usize, op: &str) -> bool {
        matches!(self.peek_at(offset), Tok::Op(o) if o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> ParseResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}' but found {}",
                op,
                describe(self.peek())
            )))
        }
    }

    fn is_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Name(n) if n == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.is_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> ParseResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{}' but found {}",
                kw,
                describe(self.peek())
            )))
        }
    }

    fn expect_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Tok::Name(name) if !is_keyword(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected a name but found {}", describe(other)))),
        }
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        match self.peek() {
            Tok::Newline => {
                self.advance();
                Ok(())
            }
            Tok::End => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::End) || self.is_op(";")
    }

    fn starts_expr(&self) -> bool {
        match self.peek() {
            Tok::Name(n) => {
                !is_keyword(n)
                    || matches!(
                        n.as_str(),
                        "None" | "True" | "False" | "lambda" | "not" | "await"
                    )
            }
            Tok::Number | Tok::Str(_) => true,
            Tok::Op(op) => matches!(op.as_str(), "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."),
            _ => false,
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let (line, col) = self.span();
        ScriptError::new(message, line, col)
    }

    fn unexpected(&self) -> ScriptError {
        self.error(format!("invalid syntax near {}", describe(self.peek())))
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(name) => format!("'{}'", name),
        Tok::Number => "number".into(),
        Tok::Str(_) => "string".into(),
        Tok::Op(op) => format!("'{}'", op),
        Tok::Newline => "end of line".into(),
        Tok::Indent => "indent".into(),
        Tok::Dedent => "dedent".into(),
        Tok::End => "end of input".into(),
    }
}
