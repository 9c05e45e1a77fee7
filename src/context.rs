//! Evaluation context.
//!
//! An [`EvalContext`] is the read-only snapshot every guard expression is
//! evaluated against: the edge being traversed (and the graph it lives in),
//! the monitor's variables, the per-path token history, the states of
//! sibling analyses and a diagnostic sink. While one transition is being
//! tried, the context also collects the subtrees bound to `$N` jokers by
//! its structural patterns.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use num_bigint::BigInt;

use crate::ast::AstNode;
use crate::cfa::{Cfa, CfaEdge, CfaNode};
use crate::location::TokenId;
use crate::query::AbstractState;
use crate::types::EdgeId;

/// Monitor variable bindings.
pub type Variables = BTreeMap<String, BigInt>;

/// Subtrees bound to numbered jokers (`$1`, `$2`, ...) while one transition
/// is tried.
pub type TransitionVariables = BTreeMap<u32, AstNode>;

static NO_VARIABLES: Variables = BTreeMap::new();
static NO_TOKENS: BTreeSet<TokenId> = BTreeSet::new();

/// A warning attributable to one expression on one edge.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Diagnostic {
    /// Rendering of the expression (or action) that produced the warning.
    pub expression: String,
    pub edge: EdgeId,
    pub edge_description: String,
    pub message: String,
    pub source: &'static str,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on edge {} ({}): {} [{}]",
            self.expression, self.edge, self.edge_description, self.message, self.source
        )
    }
}

/// Append-only collection of diagnostics.
///
/// Expressions report into the sink through a shared reference; what they
/// report never influences evaluation results.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.borrow_mut().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    cfa: &'a Cfa,
    edge: &'a CfaEdge,
    variables: &'a Variables,
    tokens_since_last_match: &'a BTreeSet<TokenId>,
    states: &'a [&'a dyn AbstractState],
    sink: &'a Diagnostics,
    transition_variables: Option<&'a RefCell<TransitionVariables>>,
}

impl<'a> EvalContext<'a> {
    /// A context for `edge` with no variables, no token history and no
    /// sibling states.
    pub fn new(cfa: &'a Cfa, edge: EdgeId, sink: &'a Diagnostics) -> Self {
        EvalContext {
            cfa,
            edge: cfa.edge(edge),
            variables: &NO_VARIABLES,
            tokens_since_last_match: &NO_TOKENS,
            states: &[],
            sink,
            transition_variables: None,
        }
    }

    pub fn with_variables(mut self, variables: &'a Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_tokens_since_last_match(mut self, tokens: &'a BTreeSet<TokenId>) -> Self {
        self.tokens_since_last_match = tokens;
        self
    }

    pub fn with_states(mut self, states: &'a [&'a dyn AbstractState]) -> Self {
        self.states = states;
        self
    }

    /// Collect `$N` bindings into `bindings`, and substitute them in
    /// [`replace_variables`][Self::replace_variables].
    pub fn with_transition_variables(mut self, bindings: &'a RefCell<TransitionVariables>) -> Self {
        self.transition_variables = Some(bindings);
        self
    }

    /// The same context, moved to another edge of the same graph.
    pub fn for_edge(&self, edge: &'a CfaEdge) -> Self {
        EvalContext { edge, ..*self }
    }

    pub fn cfa(&self) -> &'a Cfa {
        self.cfa
    }

    pub fn edge(&self) -> &'a CfaEdge {
        self.edge
    }

    /// The node the current edge leads to.
    pub fn successor(&self) -> &'a CfaNode {
        self.cfa.node(self.edge.successor)
    }

    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    pub fn tokens_since_last_match(&self) -> &'a BTreeSet<TokenId> {
        self.tokens_since_last_match
    }

    pub fn states(&self) -> &'a [&'a dyn AbstractState] {
        self.states
    }

    pub fn sink(&self) -> &'a Diagnostics {
        self.sink
    }

    /// The subtree bound to `$n` so far, if any.
    pub fn transition_variable(&self, n: u32) -> Option<AstNode> {
        self.transition_variables?.borrow().get(&n).cloned()
    }

    /// All bindings recorded so far.
    pub fn transition_variables(&self) -> TransitionVariables {
        self.transition_variables.map(|store| store.borrow().clone()).unwrap_or_default()
    }

    /// Record the bindings of a successful structural match.
    ///
    /// Without a binding store the bindings are dropped.
    pub fn bind(&self, bindings: TransitionVariables) {
        if let Some(store) = self.transition_variables {
            store.borrow_mut().extend(bindings);
        }
    }

    /// Record a warning about `expression` on the current edge.
    pub fn report(&self, expression: impl fmt::Display, message: impl Into<String>, source: &'static str) {
        self.sink.push(Diagnostic {
            expression: expression.to_string(),
            edge: self.edge.id,
            edge_description: self.edge.description.clone(),
            message: message.into(),
            source,
        });
    }

    /// Substitute `$$name` with monitor variables and `$N` with the subtrees
    /// bound by structural patterns of the current transition.
    ///
    /// Returns `None` if some referenced variable is unbound. A `$` followed
    /// by anything else is kept as is.
    pub fn replace_variables(&self, text: &str) -> Option<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('$') {
            result.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            if let Some(after) = after.strip_prefix('$') {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                let name = &after[..end];
                if name.is_empty() {
                    return None;
                }
                let value = self.variables.get(name)?;
                result.push_str(&value.to_string());
                rest = &after[end..];
            } else {
                let end = after.find(|c: char| !c.is_ascii_digit()).unwrap_or(after.len());
                if end == 0 {
                    result.push('$');
                    rest = after;
                    continue;
                }
                let n = after[..end].parse::<u32>().ok()?;
                let value = self.transition_variable(n)?;
                result.push_str(&value.to_string());
                rest = &after[end..];
            }
        }
        result.push_str(rest);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn single_edge() -> (Cfa, EdgeId) {
        let mut cfa = Cfa::new();
        let a = cfa.add_node("main");
        let b = cfa.add_node("main");
        let e = cfa.add_statement_edge(a, b, "x = 1;").unwrap();
        (cfa, e)
    }

    #[test]
    fn test_replace_variables() {
        let (cfa, e) = single_edge();
        let sink = Diagnostics::new();
        let mut vars = Variables::new();
        vars.insert("count".to_string(), BigInt::from(3));
        vars.insert("x".to_string(), BigInt::from(-2));
        let ctx = EvalContext::new(&cfa, e, &sink).with_variables(&vars);

        assert_eq!(ctx.replace_variables("a == $$count").as_deref(), Some("a == 3"));
        assert_eq!(ctx.replace_variables("$$x<$$count;").as_deref(), Some("-2<3;"));
        assert_eq!(ctx.replace_variables("no vars").as_deref(), Some("no vars"));
        assert_eq!(ctx.replace_variables("$$missing"), None);
        assert_eq!(ctx.replace_variables("dangling $$"), None);
    }

    #[test]
    fn test_replace_transition_variables() {
        let (cfa, e) = single_edge();
        let sink = Diagnostics::new();
        let bindings = RefCell::new(TransitionVariables::new());
        let ctx = EvalContext::new(&cfa, e, &sink).with_transition_variables(&bindings);

        assert_eq!(ctx.replace_variables("valid($1)"), None);
        ctx.bind(TransitionVariables::from([(1, AstNode::ident("p")), (2, AstNode::Int(8))]));
        assert_eq!(ctx.replace_variables("valid($1) && size($1) == $2").as_deref(), Some("valid(p) && size(p) == 8"));
        assert_eq!(ctx.replace_variables("cost $ 5, $x").as_deref(), Some("cost $ 5, $x"));
        assert_eq!(ctx.replace_variables("$3"), None);

        // Without a store, bindings are not kept.
        let plain = EvalContext::new(&cfa, e, &sink);
        plain.bind(TransitionVariables::from([(1, AstNode::ident("q"))]));
        assert_eq!(plain.transition_variable(1), None);
        assert_eq!(plain.replace_variables("$1"), None);
    }

    #[test]
    fn test_report_attributes_edge() {
        let (cfa, e) = single_edge();
        let sink = Diagnostics::new();
        let ctx = EvalContext::new(&cfa, e, &sink);
        ctx.report("TRUE", "just a test", "test");

        let entries = sink.take();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].edge, e);
        assert_eq!(entries[0].edge_description, "x = 1;");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_defaults_are_empty() {
        let (cfa, e) = single_edge();
        let sink = Diagnostics::new();
        let ctx = EvalContext::new(&cfa, e, &sink);
        assert!(ctx.variables().is_empty());
        assert!(ctx.tokens_since_last_match().is_empty());
        assert!(ctx.states().is_empty());
        assert_eq!(ctx.successor().id, cfa.edge(e).successor);
    }
}
