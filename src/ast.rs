//! Statement syntax trees and structural patterns.
//!
//! Edges of the control-flow graph may carry the syntax tree of the
//! statement they execute. Structural-pattern atoms compare that tree with a
//! pattern written in the same C-like syntax, extended with two jokers:
//!
//! - `$?` matches any subtree;
//! - `$N` (e.g. `$1`) matches any subtree, but every occurrence of the same
//!   number must match structurally equal subtrees.
//!
//! A call whose only argument is `$?` (as in `free($?)`) matches calls with
//! any number of arguments.

use std::collections::BTreeMap;
use std::fmt;

use logos::Logos;

use crate::error::PatternError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Deref,
    AddrOf,
}

impl UnaryOp {
    fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Deref => "*",
            UnaryOp::AddrOf => "&",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding power; higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::BitOr => 3,
            BinaryOp::BitXor => 4,
            BinaryOp::BitAnd => 5,
            BinaryOp::Eq | BinaryOp::Ne => 6,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => 7,
            BinaryOp::Add | BinaryOp::Sub => 8,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 9,
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&" => BinaryOp::BitAnd,
            "^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }
}

/// Syntax tree of a statement or expression.
///
/// Trees attached to graph edges never contain [`AstNode::Joker`]; jokers
/// only occur in compiled [`StructuralPattern`]s.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum AstNode {
    Ident(String),
    Int(i64),
    Str(String),
    Unary {
        op: UnaryOp,
        operand: Box<AstNode>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },
    Call {
        function: Box<AstNode>,
        args: Vec<AstNode>,
    },
    Assign {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },
    Return(Option<Box<AstNode>>),
    /// `$?` (`None`) or `$N` (`Some(N)`).
    Joker(Option<u32>),
}

impl AstNode {
    pub fn ident(name: impl Into<String>) -> Self {
        AstNode::Ident(name.into())
    }

    pub fn call(function: impl Into<String>, args: Vec<AstNode>) -> Self {
        AstNode::Call {
            function: Box::new(AstNode::Ident(function.into())),
            args,
        }
    }

    pub fn assign(lhs: AstNode, rhs: AstNode) -> Self {
        AstNode::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Parse a statement (no jokers allowed).
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        Parser::new(text, false)?.parse_statement()
    }

    /// Is this a function call statement: `f(..)` or `x = f(..)`?
    pub fn is_function_call(&self) -> bool {
        match self {
            AstNode::Call { .. } => true,
            AstNode::Assign { rhs, .. } => matches!(**rhs, AstNode::Call { .. }),
            _ => false,
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, AstNode::Binary { .. } | AstNode::Assign { .. })
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wrap = |node: &AstNode, f: &mut fmt::Formatter<'_>| {
            if node.is_compound() {
                write!(f, "({})", node)
            } else {
                write!(f, "{}", node)
            }
        };
        match self {
            AstNode::Ident(name) => write!(f, "{}", name),
            AstNode::Int(value) => write!(f, "{}", value),
            AstNode::Str(value) => write!(f, "\"{}\"", value),
            AstNode::Unary { op, operand } => {
                write!(f, "{}", op.symbol())?;
                wrap(operand, f)
            }
            AstNode::Binary { op, lhs, rhs } => {
                wrap(lhs, f)?;
                write!(f, " {} ", op.symbol())?;
                wrap(rhs, f)
            }
            AstNode::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            AstNode::Assign { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            AstNode::Return(None) => write!(f, "return"),
            AstNode::Return(Some(value)) => write!(f, "return {}", value),
            AstNode::Joker(None) => write!(f, "$?"),
            AstNode::Joker(Some(n)) => write!(f, "${}", n),
        }
    }
}

/// A compiled structural pattern, remembering the text it was compiled from.
#[derive(Debug, Clone)]
pub struct StructuralPattern {
    source: String,
    tree: AstNode,
}

impl StructuralPattern {
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        let tree = Parser::new(source, true)?.parse_statement()?;
        Ok(StructuralPattern {
            source: source.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &AstNode {
        &self.tree
    }

    /// Match the pattern against a syntax tree.
    ///
    /// Returns the subtrees bound to numbered jokers on success.
    pub fn match_tree(&self, node: &AstNode) -> Option<BTreeMap<u32, AstNode>> {
        let mut bindings = BTreeMap::new();
        if match_node(&self.tree, node, &mut bindings) {
            Some(bindings)
        } else {
            None
        }
    }

    pub fn matches(&self, node: &AstNode) -> bool {
        self.match_tree(node).is_some()
    }
}

/// Patterns are identified by their source text.
impl PartialEq for StructuralPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for StructuralPattern {}

impl fmt::Display for StructuralPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn match_node(pattern: &AstNode, node: &AstNode, bindings: &mut BTreeMap<u32, AstNode>) -> bool {
    match (pattern, node) {
        (AstNode::Joker(None), _) => true,
        (AstNode::Joker(Some(n)), _) => match bindings.get(n) {
            Some(bound) => bound == node,
            None => {
                bindings.insert(*n, node.clone());
                true
            }
        },
        (AstNode::Ident(a), AstNode::Ident(b)) => a == b,
        (AstNode::Int(a), AstNode::Int(b)) => a == b,
        (AstNode::Str(a), AstNode::Str(b)) => a == b,
        (AstNode::Unary { op: pa, operand: pe }, AstNode::Unary { op: na, operand: ne }) => {
            pa == na && match_node(pe, ne, bindings)
        }
        (
            AstNode::Binary { op: po, lhs: pl, rhs: pr },
            AstNode::Binary { op: no, lhs: nl, rhs: nr },
        ) => po == no && match_node(pl, nl, bindings) && match_node(pr, nr, bindings),
        (
            AstNode::Call {
                function: pf,
                args: pargs,
            },
            AstNode::Call {
                function: nf,
                args: nargs,
            },
        ) => {
            if !match_node(pf, nf, bindings) {
                return false;
            }
            // `f($?)` accepts any argument list.
            if let [AstNode::Joker(None)] = pargs.as_slice() {
                return true;
            }
            pargs.len() == nargs.len()
                && pargs
                    .iter()
                    .zip(nargs.iter())
                    .all(|(p, n)| match_node(p, n, bindings))
        }
        (AstNode::Assign { lhs: pl, rhs: pr }, AstNode::Assign { lhs: nl, rhs: nr }) => {
            match_node(pl, nl, bindings) && match_node(pr, nr, bindings)
        }
        (AstNode::Return(None), AstNode::Return(None)) => true,
        (AstNode::Return(Some(p)), AstNode::Return(Some(n))) => match_node(p, n, bindings),
        _ => false,
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Nesting depth at which pattern parsing gives up.
const MAX_NESTING: usize = 256;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Token {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_string()
    })]
    Str(String),

    /// `$?`
    #[token("$?")]
    AnyJoker,

    /// `$N`
    #[regex(r"\$[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    NumberedJoker(u32),

    #[token("&&", |_| "&&")]
    #[token("||", |_| "||")]
    #[token("==", |_| "==")]
    #[token("!=", |_| "!=")]
    #[token("<=", |_| "<=")]
    #[token(">=", |_| ">=")]
    #[token("+", |_| "+")]
    #[token("-", |_| "-")]
    #[token("*", |_| "*")]
    #[token("/", |_| "/")]
    #[token("%", |_| "%")]
    #[token("<", |_| "<")]
    #[token(">", |_| ">")]
    #[token("=", |_| "=")]
    #[token("!", |_| "!")]
    #[token("~", |_| "~")]
    #[token("&", |_| "&")]
    #[token("|", |_| "|")]
    #[token("^", |_| "^")]
    #[token("(", |_| "(")]
    #[token(")", |_| ")")]
    #[token(",", |_| ",")]
    #[token(";", |_| ";")]
    Punct(StaticStr),
}

/// Alias so the `Logos` derive does not rewrite `'static` to the source lifetime.
type StaticStr = &'static str;

fn tokenize(text: &str, allow_jokers: bool) -> Result<Vec<(usize, Token)>, PatternError> {
    let error = |offset: usize, message: &str| PatternError::Syntax {
        pattern: text.to_string(),
        offset,
        message: message.to_string(),
    };

    let mut lexer = Token::lexer(text);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let start = lexer.span().start;
        let slice = lexer.slice();
        let token = token.map_err(|()| {
            if slice.starts_with('"') {
                error(start, "unterminated string literal")
            } else if slice.starts_with(|c: char| c.is_ascii_digit()) {
                error(start, "integer literal out of range")
            } else if slice.starts_with('$') {
                error(start, "expected `$?` or `$` followed by a number")
            } else {
                error(start, "unexpected character")
            }
        })?;
        if !allow_jokers && matches!(token, Token::AnyJoker | Token::NumberedJoker(_)) {
            return Err(error(start, "jokers are only allowed in patterns"));
        }
        tokens.push((start, token));
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, allow_jokers: bool) -> Result<Self, PatternError> {
        let tokens = tokenize(text, allow_jokers)?;
        Ok(Parser {
            text,
            tokens,
            pos: 0,
            depth: 0,
        })
    }

    fn error(&self, message: impl Into<String>) -> PatternError {
        PatternError::Syntax {
            pattern: self.text.to_string(),
            offset: self.tokens.get(self.pos).map_or(self.text.len(), |(offset, _)| *offset),
            message: message.into(),
        }
    }

    /// The next token, or `None` at the end of input.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.at_punct(punct) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), PatternError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", punct)))
        }
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, PatternError>) -> Result<T, PatternError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {} levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_statement(mut self) -> Result<AstNode, PatternError> {
        let node = if matches!(self.peek(), Some(Token::Ident(name)) if name == "return") {
            self.bump();
            if self.peek().is_none() || self.at_punct(";") {
                AstNode::Return(None)
            } else {
                AstNode::Return(Some(Box::new(self.parse_assign()?)))
            }
        } else {
            self.parse_assign()?
        };
        self.eat(";");
        if self.peek().is_some() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(node)
    }

    fn parse_assign(&mut self) -> Result<AstNode, PatternError> {
        self.nested(|p| {
            let lhs = p.parse_binary(1)?;
            if p.eat("=") {
                let rhs = p.parse_assign()?;
                return Ok(AstNode::assign(lhs, rhs));
            }
            Ok(lhs)
        })
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<AstNode, PatternError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Punct(p)) => match BinaryOp::from_symbol(p) {
                    Some(op) if op.precedence() >= min_precedence => op,
                    _ => break,
                },
                _ => break,
            };
            self.bump();
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = AstNode::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<AstNode, PatternError> {
        let op = match self.peek() {
            Some(Token::Punct("-")) => Some(UnaryOp::Neg),
            Some(Token::Punct("!")) => Some(UnaryOp::Not),
            Some(Token::Punct("~")) => Some(UnaryOp::BitNot),
            Some(Token::Punct("*")) => Some(UnaryOp::Deref),
            Some(Token::Punct("&")) => Some(UnaryOp::AddrOf),
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let operand = self.nested(|p| p.parse_unary())?;
                Ok(AstNode::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<AstNode, PatternError> {
        let mut node = self.parse_primary()?;
        while self.eat("(") {
            let mut args = Vec::new();
            if !self.eat(")") {
                loop {
                    args.push(self.parse_assign()?);
                    if self.eat(")") {
                        break;
                    }
                    self.expect(",")?;
                }
            }
            node = AstNode::Call {
                function: Box::new(node),
                args,
            };
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<AstNode, PatternError> {
        let node = match self.peek() {
            Some(Token::Ident(name)) => AstNode::Ident(name.clone()),
            Some(Token::Int(value)) => AstNode::Int(*value),
            Some(Token::Str(value)) => AstNode::Str(value.clone()),
            Some(Token::AnyJoker) => AstNode::Joker(None),
            Some(Token::NumberedJoker(n)) => AstNode::Joker(Some(*n)),
            Some(Token::Punct("(")) => {
                self.bump();
                let inner = self.parse_assign()?;
                self.expect(")")?;
                return Ok(inner);
            }
            _ => return Err(self.error("expected an expression")),
        };
        self.bump();
        Ok(node)
    }
}
