//! Integer sub-expressions used by guards and assignments.

use std::fmt;

use log::debug;
use num_bigint::BigInt;

use crate::context::EvalContext;
use crate::expr::Quoted;
use crate::query::QueryValue;
use crate::result::TriResult;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum IntExpr {
    Const(BigInt),
    /// A monitor variable.
    Variable(String),
    Plus(Box<IntExpr>, Box<IntExpr>),
    Minus(Box<IntExpr>, Box<IntExpr>),
    /// Integer answer of one named sibling analysis.
    Query { analysis: String, query: String },
}

impl IntExpr {
    pub fn constant(value: impl Into<BigInt>) -> Self {
        IntExpr::Const(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        IntExpr::Variable(name.into())
    }

    pub fn plus(lhs: IntExpr, rhs: IntExpr) -> Self {
        IntExpr::Plus(Box::new(lhs), Box::new(rhs))
    }

    pub fn minus(lhs: IntExpr, rhs: IntExpr) -> Self {
        IntExpr::Minus(Box::new(lhs), Box::new(rhs))
    }

    pub fn query(analysis: impl Into<String>, query: impl Into<String>) -> Self {
        IntExpr::Query {
            analysis: analysis.into(),
            query: query.into(),
        }
    }

    pub fn eval(&self, ctx: &EvalContext<'_>) -> TriResult<BigInt> {
        match self {
            IntExpr::Const(value) => TriResult::Value(value.clone()),
            IntExpr::Variable(name) => match ctx.variables().get(name) {
                Some(value) => TriResult::Value(value.clone()),
                None => TriResult::indeterminate(format!("unknown variable `{}`", name), "IntExpr::Variable"),
            },
            IntExpr::Plus(a, b) => match (a.eval(ctx), b.eval(ctx)) {
                (TriResult::Value(a), TriResult::Value(b)) => TriResult::Value(a + b),
                (TriResult::Indeterminate(i), _) | (_, TriResult::Indeterminate(i)) => TriResult::Indeterminate(i),
            },
            IntExpr::Minus(a, b) => match (a.eval(ctx), b.eval(ctx)) {
                (TriResult::Value(a), TriResult::Value(b)) => TriResult::Value(a - b),
                (TriResult::Indeterminate(i), _) | (_, TriResult::Indeterminate(i)) => TriResult::Indeterminate(i),
            },
            IntExpr::Query { analysis, query } => eval_int_query(ctx, analysis, query),
        }
    }
}

fn eval_int_query(ctx: &EvalContext<'_>, analysis: &str, query: &str) -> TriResult<BigInt> {
    const SOURCE: &str = "IntExpr::Query";

    let Some(query) = ctx.replace_variables(query) else {
        return TriResult::indeterminate(format!("failed to substitute variables in \"{}\"", query), SOURCE);
    };
    let target = ctx
        .states()
        .iter()
        .filter_map(|state| state.as_queryable())
        .find(|q| q.analysis_name() == analysis);
    let Some(target) = target else {
        return TriResult::indeterminate(format!("no state of analysis `{}` was found", analysis), SOURCE);
    };
    match target.evaluate_property(&query) {
        Ok(QueryValue::Int(value)) => TriResult::Value(value),
        Ok(QueryValue::Text(text)) => match text.trim().parse::<BigInt>() {
            Ok(value) => TriResult::Value(value),
            Err(_) => TriResult::indeterminate(format!("`{}` answered non-integer \"{}\"", analysis, text), SOURCE),
        },
        Ok(other) => TriResult::indeterminate(format!("`{}` answered non-integer {}", analysis, other), SOURCE),
        Err(e) => {
            debug!("integer query failed: {}", e);
            TriResult::indeterminate(e.to_string(), SOURCE)
        }
    }
}

impl fmt::Display for IntExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntExpr::Const(value) => write!(f, "{}", value),
            IntExpr::Variable(name) => write!(f, "{}", name),
            IntExpr::Plus(a, b) => write!(f, "({} + {})", a, b),
            IntExpr::Minus(a, b) => write!(f, "({} - {})", a, b),
            IntExpr::Query { analysis, query } => write!(f, "EVAL({}({}))", analysis, Quoted(query)),
        }
    }
}
