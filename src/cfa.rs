//! Control-flow automaton model.
//!
//! A [`Cfa`] is an arena of program locations ([`CfaNode`]) connected by
//! edges ([`CfaEdge`]). Each edge represents one step of execution: a
//! statement, a branch assumption, a call or return, or a no-op. The graph
//! is built once and then only read by guard evaluation.
//!
//! ```
//! use guard_automaton::cfa::{Cfa, EdgeKind};
//!
//! let mut cfa = Cfa::new();
//! let entry = cfa.add_node("main");
//! let error = cfa.add_label_node("main", "ERROR");
//! let edge = cfa.add_blank_edge(entry, error, "goto ERROR");
//!
//! assert_eq!(cfa.successor(edge).label(), Some("ERROR"));
//! assert_eq!(cfa.edge(edge).kind, EdgeKind::Blank);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::ast::AstNode;
use crate::error::PatternError;
use crate::location::{FileLocation, TokenId};
use crate::types::{EdgeId, NodeId};

/// Syntax tree attached to an edge.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum EdgeAst {
    /// A tree in this crate's statement syntax.
    Native(AstNode),
    /// A tree produced by a front-end this crate cannot interpret.
    Foreign { language: String, text: String },
}

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum EdgeKind {
    Blank,
    Assume {
        truth: bool,
    },
    Statement,
    Declaration,
    ReturnStatement,
    FunctionCall,
    /// Return from a callee; `summary` is the call expression of the paired
    /// call-to-return summary edge.
    FunctionReturn {
        summary: Option<AstNode>,
    },
    CallToReturn,
    /// End of a block scope, dropping the given variables.
    ScopeEnd {
        variables: Vec<String>,
    },
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeKind::Blank => "BlankEdge",
            EdgeKind::Assume { .. } => "AssumeEdge",
            EdgeKind::Statement => "StatementEdge",
            EdgeKind::Declaration => "DeclarationEdge",
            EdgeKind::ReturnStatement => "ReturnStatementEdge",
            EdgeKind::FunctionCall => "FunctionCallEdge",
            EdgeKind::FunctionReturn { .. } => "FunctionReturnEdge",
            EdgeKind::CallToReturn => "CallToReturnEdge",
            EdgeKind::ScopeEnd { .. } => "ScopeEndEdge",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct CfaNode {
    pub id: NodeId,
    pub function: String,
    label: Option<String>,
    leaving: Vec<EdgeId>,
    entering: Vec<EdgeId>,
}

impl CfaNode {
    /// The label if this is a label node.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn leaving_edges(&self) -> &[EdgeId] {
        &self.leaving
    }

    pub fn entering_edges(&self) -> &[EdgeId] {
        &self.entering
    }

    pub fn num_leaving_edges(&self) -> usize {
        self.leaving.len()
    }
}

#[derive(Debug, Clone)]
pub struct CfaEdge {
    pub id: EdgeId,
    pub predecessor: NodeId,
    pub successor: NodeId,
    pub kind: EdgeKind,
    /// The source text of the statement (empty for blank edges).
    pub raw_statement: String,
    pub description: String,
    pub ast: Option<EdgeAst>,
    pub locations: Vec<FileLocation>,
}

impl CfaEdge {
    /// Edges that do not correspond to any source-level step.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            EdgeKind::Blank | EdgeKind::ScopeEnd { .. } | EdgeKind::CallToReturn
        )
    }

    /// All tokens covered by the edge's file locations.
    pub fn tokens(&self) -> BTreeSet<TokenId> {
        self.locations
            .iter()
            .flat_map(|loc| loc.tokens.iter().copied())
            .collect()
    }

    /// Tokens relevant for source mapping: empty for epsilon edges.
    pub fn relevant_tokens(&self) -> BTreeSet<TokenId> {
        if self.is_epsilon() {
            BTreeSet::new()
        } else {
            self.tokens()
        }
    }

    /// Is this a function call: a call edge, or a statement that calls?
    pub fn is_function_call(&self) -> bool {
        match self.kind {
            EdgeKind::FunctionCall => true,
            EdgeKind::Statement => matches!(&self.ast, Some(EdgeAst::Native(node)) if node.is_function_call()),
            _ => false,
        }
    }
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}: {}",
            self.id, self.predecessor, self.successor, self.description
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cfa {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
}

impl Cfa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &CfaNode {
        &self.nodes[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &CfaEdge {
        &self.edges[id.index()]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut CfaEdge {
        &mut self.edges[id.index()]
    }

    pub fn edges(&self) -> impl Iterator<Item = &CfaEdge> {
        self.edges.iter()
    }

    /// The node an edge leads to.
    pub fn successor(&self, edge: EdgeId) -> &CfaNode {
        self.node(self.edge(edge).successor)
    }

    pub fn leaving_edges(&self, node: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.node(node).leaving.iter().map(move |&e| self.edge(e))
    }

    pub fn add_node(&mut self, function: impl Into<String>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(CfaNode {
            id,
            function: function.into(),
            label: None,
            leaving: Vec::new(),
            entering: Vec::new(),
        });
        id
    }

    pub fn add_label_node(&mut self, function: impl Into<String>, label: impl Into<String>) -> NodeId {
        let id = self.add_node(function);
        self.nodes[id.index()].label = Some(label.into());
        id
    }

    /// Add an edge with the given kind and raw text; the description is the
    /// raw text and no syntax tree is attached.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind, raw: impl Into<String>) -> EdgeId {
        let raw = raw.into();
        let id = EdgeId::new(self.edges.len());
        self.edges.push(CfaEdge {
            id,
            predecessor: from,
            successor: to,
            kind,
            description: raw.clone(),
            raw_statement: raw,
            ast: None,
            locations: Vec::new(),
        });
        self.nodes[from.index()].leaving.push(id);
        self.nodes[to.index()].entering.push(id);
        id
    }

    pub fn add_blank_edge(&mut self, from: NodeId, to: NodeId, description: impl Into<String>) -> EdgeId {
        let id = self.add_edge(from, to, EdgeKind::Blank, "");
        self.edges[id.index()].description = description.into();
        id
    }

    /// Add a statement edge, parsing `code` into its syntax tree.
    pub fn add_statement_edge(&mut self, from: NodeId, to: NodeId, code: &str) -> Result<EdgeId, PatternError> {
        let ast = AstNode::parse(code)?;
        let kind = if matches!(ast, AstNode::Return(_)) {
            EdgeKind::ReturnStatement
        } else {
            EdgeKind::Statement
        };
        let id = self.add_edge(from, to, kind, code);
        self.edges[id.index()].ast = Some(EdgeAst::Native(ast));
        Ok(id)
    }

    /// Add a call edge into a callee; `code` is the call statement.
    pub fn add_call_edge(&mut self, from: NodeId, to: NodeId, code: &str) -> Result<EdgeId, PatternError> {
        let ast = AstNode::parse(code)?;
        let id = self.add_edge(from, to, EdgeKind::FunctionCall, code);
        self.edges[id.index()].ast = Some(EdgeAst::Native(ast));
        Ok(id)
    }

    /// Add a return edge from a callee; `summary` is the call statement of
    /// the matching call site.
    pub fn add_return_edge(&mut self, from: NodeId, to: NodeId, summary: &str) -> Result<EdgeId, PatternError> {
        let summary = AstNode::parse(summary)?;
        let function = self.node(from).function.clone();
        let id = self.add_edge(
            from,
            to,
            EdgeKind::FunctionReturn {
                summary: Some(summary),
            },
            "",
        );
        self.edges[id.index()].description = format!("Return edge from {}", function);
        Ok(id)
    }

    /// Add a branch edge assuming `condition` evaluates to `truth`.
    pub fn add_assume_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        condition: &str,
        truth: bool,
    ) -> Result<EdgeId, PatternError> {
        let ast = AstNode::parse(condition)?;
        let id = self.add_edge(from, to, EdgeKind::Assume { truth }, condition);
        let edge = &mut self.edges[id.index()];
        edge.ast = Some(EdgeAst::Native(ast));
        edge.description = if truth {
            format!("[{}]", condition)
        } else {
            format!("[!({})]", condition)
        };
        Ok(id)
    }

    pub fn add_scope_end_edge(&mut self, from: NodeId, to: NodeId, variables: Vec<String>) -> EdgeId {
        let count = variables.len();
        let id = self.add_edge(from, to, EdgeKind::ScopeEnd { variables }, "");
        self.edges[id.index()].description = format!("Scope End for {} variable(s)", count);
        id
    }

    pub fn add_location(&mut self, edge: EdgeId, location: FileLocation) {
        self.edges[edge.index()].locations.push(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_structure() {
        let mut cfa = Cfa::new();
        let a = cfa.add_node("main");
        let b = cfa.add_node("main");
        let c = cfa.add_label_node("main", "L");
        let e1 = cfa.add_statement_edge(a, b, "x = 1;").unwrap();
        let e2 = cfa.add_assume_edge(b, c, "x > 0", true).unwrap();
        let e3 = cfa.add_assume_edge(b, a, "x > 0", false).unwrap();

        assert_eq!(cfa.num_nodes(), 3);
        assert_eq!(cfa.num_edges(), 3);
        assert_eq!(cfa.node(b).leaving_edges(), &[e2, e3]);
        assert_eq!(cfa.node(a).entering_edges(), &[e3]);
        assert_eq!(cfa.successor(e1).id, b);
        assert_eq!(cfa.leaving_edges(b).count(), 2);
        assert_eq!(cfa.edge(e3).description, "[!(x > 0)]");
        assert_eq!(cfa.edge(e2).kind, EdgeKind::Assume { truth: true });
    }

    #[test]
    fn test_statement_kinds() {
        let mut cfa = Cfa::new();
        let a = cfa.add_node("f");
        let b = cfa.add_node("f");
        let ret = cfa.add_statement_edge(a, b, "return 0;").unwrap();
        let call = cfa.add_statement_edge(a, b, "p = malloc(8);").unwrap();
        let plain = cfa.add_statement_edge(a, b, "p = q;").unwrap();
        assert_eq!(cfa.edge(ret).kind, EdgeKind::ReturnStatement);
        assert!(cfa.edge(call).is_function_call());
        assert!(!cfa.edge(plain).is_function_call());
    }

    #[test]
    fn test_epsilon_edges_have_no_relevant_tokens() {
        let mut cfa = Cfa::new();
        let a = cfa.add_node("main");
        let b = cfa.add_node("main");
        let blank = cfa.add_blank_edge(a, b, "skip");
        let stmt = cfa.add_statement_edge(a, b, "x = 1;").unwrap();
        cfa.add_location(blank, FileLocation::new("m.c", 1, 1).with_tokens([1, 2]));
        cfa.add_location(stmt, FileLocation::new("m.c", 2, 2).with_tokens([3]));
        cfa.add_location(stmt, FileLocation::new("m.c", 2, 2).with_tokens([4]));

        assert!(cfa.edge(blank).is_epsilon());
        assert!(cfa.edge(blank).relevant_tokens().is_empty());
        assert_eq!(cfa.edge(blank).tokens().len(), 2);
        assert_eq!(cfa.edge(stmt).relevant_tokens(), BTreeSet::from([3, 4]));
    }

    #[test]
    fn test_scope_end_edge() {
        let mut cfa = Cfa::new();
        let a = cfa.add_node("main");
        let b = cfa.add_node("main");
        let e = cfa.add_scope_end_edge(a, b, vec!["i".to_string(), "j".to_string()]);
        let edge = cfa.edge(e);
        assert_eq!(edge.description, "Scope End for 2 variable(s)");
        assert!(edge.ast.is_none());
        assert!(edge.raw_statement.is_empty());
        assert!(edge.is_epsilon());
    }

    #[test]
    fn test_return_edge_description() {
        let mut cfa = Cfa::new();
        let callee_exit = cfa.add_node("alloc");
        let after = cfa.add_node("main");
        let e = cfa.add_return_edge(callee_exit, after, "p = alloc()").unwrap();
        assert_eq!(cfa.edge(e).description, "Return edge from alloc");
        assert!(matches!(cfa.edge(e).kind, EdgeKind::FunctionReturn { summary: Some(_) }));
    }
}
