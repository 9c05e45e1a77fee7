//! Guard expressions.
//!
//! [`BoolExpr`] is the closed set of guard atoms and combinators. Nodes are
//! immutable values: children are owned, compiled patterns are kept next to
//! their source text, and no node carries evaluation state. The same tree
//! can therefore be shared between many monitored paths.
//!
//! Evaluation lives in [`eval`][crate::eval], the structural equality oracle
//! in [`equality`][crate::equality].
//!
//! ```
//! use guard_automaton::expr::BoolExpr;
//!
//! let guard = BoolExpr::or(BoolExpr::label("L1"), BoolExpr::label("L2"));
//! assert_eq!(guard.to_string(), "(MATCH LABEL \"L1\" || MATCH LABEL \"L2\")");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};

use regex::Regex;

use crate::ast::StructuralPattern;
use crate::error::PatternError;
use crate::int_expr::IntExpr;
use crate::location::{LocationDescriptor, TokenId};

/// A regular expression with full-match semantics.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    source: String,
    regex: Regex,
}

impl RegexPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| PatternError::Regex {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(RegexPattern {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Does the whole `text` match?
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for RegexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RegexPattern {}

impl fmt::Display for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Which edges a structural-pattern atom looks at.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CallMatchMode {
    /// Any edge carrying a syntax tree.
    Any,
    /// Only function calls.
    Call,
    /// Only function returns, matched against the call they return from.
    Return,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BoolExpr {
    True,
    False,
    /// The successor node has no leaving edges.
    ProgramExit,
    LabelExact(String),
    LabelRegex(RegexPattern),
    AstMatch {
        pattern: StructuralPattern,
        mode: CallMatchMode,
    },
    EdgeRegex(RegexPattern),
    EdgeExact(String),
    AssertFailure,
    AssumeEdge,
    AssumeCase(bool),
    ForallSuccessors(Box<BoolExpr>),
    ExistsSuccessors(Box<BoolExpr>),
    PathRelevant,
    NonEmptyTokens,
    TokensSubset(BTreeSet<TokenId>),
    TokensIntersect(BTreeSet<TokenId>),
    Location(LocationDescriptor),
    Query {
        analysis: String,
        query: String,
    },
    QueryAll {
        query: String,
    },
    TargetState,
    Not(Box<BoolExpr>),
    And(Box<BoolExpr>, Box<BoolExpr>),
    Or(Box<BoolExpr>, Box<BoolExpr>),
    BoolEq(Box<BoolExpr>, Box<BoolExpr>),
    BoolNe(Box<BoolExpr>, Box<BoolExpr>),
    IntEq(IntExpr, IntExpr),
    IntNe(IntExpr, IntExpr),
}

impl BoolExpr {
    pub fn constant(value: bool) -> Self {
        if value {
            BoolExpr::True
        } else {
            BoolExpr::False
        }
    }

    pub fn label(label: impl Into<String>) -> Self {
        BoolExpr::LabelExact(label.into())
    }

    pub fn label_regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(BoolExpr::LabelRegex(RegexPattern::compile(pattern)?))
    }

    pub fn ast(pattern: &str) -> Result<Self, PatternError> {
        Self::ast_with_mode(pattern, CallMatchMode::Any)
    }

    pub fn call(pattern: &str) -> Result<Self, PatternError> {
        Self::ast_with_mode(pattern, CallMatchMode::Call)
    }

    pub fn function_return(pattern: &str) -> Result<Self, PatternError> {
        Self::ast_with_mode(pattern, CallMatchMode::Return)
    }

    pub fn ast_with_mode(pattern: &str, mode: CallMatchMode) -> Result<Self, PatternError> {
        Ok(BoolExpr::AstMatch {
            pattern: StructuralPattern::compile(pattern)?,
            mode,
        })
    }

    pub fn edge_regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(BoolExpr::EdgeRegex(RegexPattern::compile(pattern)?))
    }

    pub fn edge_exact(text: impl Into<String>) -> Self {
        BoolExpr::EdgeExact(text.into())
    }

    pub fn forall(operand: BoolExpr) -> Self {
        BoolExpr::ForallSuccessors(Box::new(operand))
    }

    pub fn exists(operand: BoolExpr) -> Self {
        BoolExpr::ExistsSuccessors(Box::new(operand))
    }

    pub fn tokens_subset(tokens: impl IntoIterator<Item = TokenId>) -> Self {
        BoolExpr::TokensSubset(tokens.into_iter().collect())
    }

    pub fn tokens_intersect(tokens: impl IntoIterator<Item = TokenId>) -> Self {
        BoolExpr::TokensIntersect(tokens.into_iter().collect())
    }

    pub fn query(analysis: impl Into<String>, query: impl Into<String>) -> Self {
        BoolExpr::Query {
            analysis: analysis.into(),
            query: query.into(),
        }
    }

    pub fn query_all(query: impl Into<String>) -> Self {
        BoolExpr::QueryAll { query: query.into() }
    }

    pub fn not(operand: BoolExpr) -> Self {
        BoolExpr::Not(Box::new(operand))
    }

    pub fn and(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        BoolExpr::And(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        BoolExpr::Or(Box::new(lhs), Box::new(rhs))
    }

    pub fn bool_eq(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        BoolExpr::BoolEq(Box::new(lhs), Box::new(rhs))
    }

    pub fn bool_ne(lhs: BoolExpr, rhs: BoolExpr) -> Self {
        BoolExpr::BoolNe(Box::new(lhs), Box::new(rhs))
    }

    pub fn int_eq(lhs: IntExpr, rhs: IntExpr) -> Self {
        BoolExpr::IntEq(lhs, rhs)
    }

    pub fn int_ne(lhs: IntExpr, rhs: IntExpr) -> Self {
        BoolExpr::IntNe(lhs, rhs)
    }
}

impl Not for BoolExpr {
    type Output = BoolExpr;

    fn not(self) -> Self::Output {
        BoolExpr::not(self)
    }
}

impl BitAnd for BoolExpr {
    type Output = BoolExpr;

    fn bitand(self, rhs: Self) -> Self::Output {
        BoolExpr::and(self, rhs)
    }
}

impl BitOr for BoolExpr {
    type Output = BoolExpr;

    fn bitor(self, rhs: Self) -> Self::Output {
        BoolExpr::or(self, rhs)
    }
}

/// A string literal in guard syntax, with `\\` and `"` escaped.
pub(crate) struct Quoted<'a>(pub &'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.chars() {
            match c {
                '\\' | '"' => write!(f, "\\{}", c)?,
                _ => write!(f, "{}", c)?,
            }
        }
        write!(f, "\"")
    }
}

fn fmt_tokens(f: &mut fmt::Formatter<'_>, tokens: &BTreeSet<TokenId>) -> fmt::Result {
    write!(f, "[")?;
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", t)?;
    }
    write!(f, "]")
}

impl fmt::Display for BoolExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolExpr::True => write!(f, "TRUE"),
            BoolExpr::False => write!(f, "FALSE"),
            BoolExpr::ProgramExit => write!(f, "MATCH EXIT"),
            BoolExpr::LabelExact(label) => write!(f, "MATCH LABEL {}", Quoted(label)),
            BoolExpr::LabelRegex(pattern) => write!(f, "MATCH LABEL [{}]", pattern),
            BoolExpr::AstMatch { pattern, mode } => match mode {
                CallMatchMode::Any => write!(f, "MATCH {{{}}}", pattern),
                CallMatchMode::Call => write!(f, "MATCH CALL {{{}}}", pattern),
                CallMatchMode::Return => write!(f, "MATCH RETURN {{{}}}", pattern),
            },
            BoolExpr::EdgeRegex(pattern) => write!(f, "MATCH [{}]", pattern),
            BoolExpr::EdgeExact(text) => write!(f, "MATCH {}", Quoted(text)),
            BoolExpr::AssertFailure => write!(f, "MATCH ASSERT"),
            BoolExpr::AssumeEdge => write!(f, "MATCH ASSUME EDGE"),
            BoolExpr::AssumeCase(polarity) => write!(f, "MATCH ASSUME CASE {}", polarity),
            BoolExpr::ForallSuccessors(e) => write!(f, "MATCH FORALL SUCCESSOR EDGES ({})", e),
            BoolExpr::ExistsSuccessors(e) => write!(f, "MATCH EXISTS SUCCESSOR EDGE ({})", e),
            BoolExpr::PathRelevant => write!(f, "MATCH PATH RELEVANT EDGE"),
            BoolExpr::NonEmptyTokens => write!(f, "MATCH NONEMPTY TOKENS"),
            BoolExpr::TokensSubset(tokens) => {
                write!(f, "MATCH TOKENS SUBSET ")?;
                fmt_tokens(f, tokens)
            }
            BoolExpr::TokensIntersect(tokens) => {
                write!(f, "MATCH TOKENS INTERSECT ")?;
                fmt_tokens(f, tokens)
            }
            BoolExpr::Location(descriptor) => write!(f, "MATCH {}", descriptor),
            BoolExpr::Query { analysis, query } => write!(f, "CHECK({}({}))", analysis, Quoted(query)),
            BoolExpr::QueryAll { query } => write!(f, "CHECK({})", Quoted(query)),
            BoolExpr::TargetState => write!(f, "CHECK(IS_TARGET_STATE)"),
            BoolExpr::Not(e) => write!(f, "!{}", e),
            BoolExpr::And(a, b) => write!(f, "({} && {})", a, b),
            BoolExpr::Or(a, b) => write!(f, "({} || {})", a, b),
            BoolExpr::BoolEq(a, b) => write!(f, "({} == {})", a, b),
            BoolExpr::BoolNe(a, b) => write!(f, "({} != {})", a, b),
            BoolExpr::IntEq(a, b) => write!(f, "({} == {})", a, b),
            BoolExpr::IntNe(a, b) => write!(f, "({} != {})", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_regex_is_full_match() {
        let re = RegexPattern::compile("err.*").unwrap();
        assert!(re.is_match("error"));
        assert!(!re.is_match("my_error"));
        let re = RegexPattern::compile("a|b").unwrap();
        assert!(re.is_match("a"));
        assert!(!re.is_match("ab"));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(BoolExpr::label_regex("("), Err(PatternError::Regex { .. })));
    }

    #[test]
    fn test_display_atoms() {
        let cases = [
            (BoolExpr::True, "TRUE"),
            (BoolExpr::False, "FALSE"),
            (BoolExpr::ProgramExit, "MATCH EXIT"),
            (BoolExpr::label("ERROR"), "MATCH LABEL \"ERROR\""),
            (BoolExpr::label_regex("E.*").unwrap(), "MATCH LABEL [E.*]"),
            (BoolExpr::ast("free($?)").unwrap(), "MATCH {free($?)}"),
            (BoolExpr::call("lock($1)").unwrap(), "MATCH CALL {lock($1)}"),
            (BoolExpr::function_return("$? = f()").unwrap(), "MATCH RETURN {$? = f()}"),
            (BoolExpr::edge_regex("x.*").unwrap(), "MATCH [x.*]"),
            (BoolExpr::edge_exact("x = 1;"), "MATCH \"x = 1;\""),
            (BoolExpr::AssertFailure, "MATCH ASSERT"),
            (BoolExpr::AssumeEdge, "MATCH ASSUME EDGE"),
            (BoolExpr::AssumeCase(false), "MATCH ASSUME CASE false"),
            (BoolExpr::PathRelevant, "MATCH PATH RELEVANT EDGE"),
            (BoolExpr::NonEmptyTokens, "MATCH NONEMPTY TOKENS"),
            (BoolExpr::tokens_subset([6, 5]), "MATCH TOKENS SUBSET [5, 6]"),
            (BoolExpr::tokens_intersect([1]), "MATCH TOKENS INTERSECT [1]"),
            (
                BoolExpr::Location(LocationDescriptor::line(3).in_file("a.c")),
                "MATCH LINE 3 IN \"a.c\"",
            ),
            (BoolExpr::query("Value", "x==1"), "CHECK(Value(\"x==1\"))"),
            (BoolExpr::query_all("x==1"), "CHECK(\"x==1\")"),
            (BoolExpr::TargetState, "CHECK(IS_TARGET_STATE)"),
        ];
        for (expr, expected) in cases {
            assert_eq!(expr.to_string(), expected);
        }
    }

    #[test]
    fn test_display_combinators() {
        let e = !(BoolExpr::label("A") & BoolExpr::ProgramExit) | BoolExpr::True;
        assert_eq!(e.to_string(), "(!(MATCH LABEL \"A\" && MATCH EXIT) || TRUE)");
        let e = BoolExpr::forall(BoolExpr::AssumeEdge);
        assert_eq!(e.to_string(), "MATCH FORALL SUCCESSOR EDGES (MATCH ASSUME EDGE)");
        let e = BoolExpr::exists(BoolExpr::AssumeCase(true));
        assert_eq!(e.to_string(), "MATCH EXISTS SUCCESSOR EDGE (MATCH ASSUME CASE true)");
        let e = BoolExpr::bool_ne(BoolExpr::True, BoolExpr::False);
        assert_eq!(e.to_string(), "(TRUE != FALSE)");
        let e = BoolExpr::int_eq(IntExpr::var("x"), IntExpr::constant(2));
        assert_eq!(e.to_string(), "(x == 2)");
    }

    #[test]
    fn test_display_distinguishes_nesting() {
        let pairs = [
            (
                BoolExpr::bool_eq(BoolExpr::not(BoolExpr::True), BoolExpr::False),
                BoolExpr::not(BoolExpr::bool_eq(BoolExpr::True, BoolExpr::False)),
            ),
            (
                BoolExpr::bool_ne(BoolExpr::bool_eq(BoolExpr::True, BoolExpr::False), BoolExpr::True),
                BoolExpr::bool_eq(BoolExpr::True, BoolExpr::bool_ne(BoolExpr::False, BoolExpr::True)),
            ),
            (BoolExpr::label("a\" || MATCH LABEL \"b"), BoolExpr::or(BoolExpr::label("a"), BoolExpr::label("b"))),
            (BoolExpr::query_all("x\\"), BoolExpr::query_all("x\\\\")),
        ];
        for (a, b) in pairs {
            assert_ne!(a, b);
            assert_ne!(a.to_string(), b.to_string());
        }
        assert_eq!(
            BoolExpr::bool_eq(BoolExpr::not(BoolExpr::True), BoolExpr::False).to_string(),
            "(!TRUE == FALSE)"
        );
    }

    #[test]
    fn test_display_escapes_strings() {
        assert_eq!(BoolExpr::label("say \"hi\"").to_string(), r#"MATCH LABEL "say \"hi\"""#);
        assert_eq!(BoolExpr::edge_exact(r"a\b").to_string(), r#"MATCH "a\\b""#);
        assert_eq!(BoolExpr::query("Value", "s == \"\"").to_string(), r#"CHECK(Value("s == \"\""))"#);
    }

    #[test]
    fn test_structural_identity() {
        assert_eq!(BoolExpr::label_regex("a+").unwrap(), BoolExpr::label_regex("a+").unwrap());
        assert_ne!(BoolExpr::label("a"), BoolExpr::label("b"));
        assert_eq!(BoolExpr::constant(true), BoolExpr::True);
    }

    #[test]
    fn test_expressions_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoolExpr>();
    }
}
