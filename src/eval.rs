//! Guard evaluation.
//!
//! [`BoolExpr::eval`] computes a three-valued answer for one edge. Atoms
//! read the context only; combinators short-circuit left to right and keep
//! the left operand's indeterminate reason when neither side decides the
//! result.

use std::collections::BTreeSet;

use log::{debug, trace, warn};
use num_bigint::BigInt;

use crate::ast::{AstNode, StructuralPattern};
use crate::cfa::{EdgeAst, EdgeKind};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::expr::{BoolExpr, CallMatchMode};
use crate::location::{TokenId, TokenMatch};
use crate::query::QueryValue;
use crate::result::TriResult;

/// Description of the blank edge emitted for a failing `assert`.
pub const ASSERT_FAIL_DESCRIPTION: &str = "assert fail";

type EvalResult = Result<TriResult<bool>, EvalError>;

impl BoolExpr {
    /// Evaluate the guard on the context's edge.
    ///
    /// Indeterminate answers are values, not errors; the only hard error is
    /// a structural pattern meeting a syntax tree it cannot interpret.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> EvalResult {
        let result = match self {
            BoolExpr::True => TriResult::TRUE,
            BoolExpr::False => TriResult::FALSE,
            BoolExpr::ProgramExit => TriResult::from_bool(ctx.successor().num_leaving_edges() == 0),
            BoolExpr::LabelExact(label) => TriResult::from_bool(ctx.successor().label() == Some(label.as_str())),
            BoolExpr::LabelRegex(pattern) => {
                TriResult::from_bool(ctx.successor().label().map_or(false, |l| pattern.is_match(l)))
            }
            BoolExpr::AstMatch { pattern, mode } => eval_ast_match(self, ctx, pattern, *mode)?,
            BoolExpr::EdgeRegex(pattern) => TriResult::from_bool(pattern.is_match(&ctx.edge().raw_statement)),
            BoolExpr::EdgeExact(text) => TriResult::from_bool(ctx.edge().raw_statement == *text),
            BoolExpr::AssertFailure => {
                let edge = ctx.edge();
                TriResult::from_bool(edge.kind == EdgeKind::Blank && edge.description == ASSERT_FAIL_DESCRIPTION)
            }
            BoolExpr::AssumeEdge => TriResult::from_bool(matches!(ctx.edge().kind, EdgeKind::Assume { .. })),
            BoolExpr::AssumeCase(polarity) => {
                TriResult::from_bool(matches!(ctx.edge().kind, EdgeKind::Assume { truth } if truth == *polarity))
            }
            BoolExpr::ForallSuccessors(operand) => eval_forall(ctx, operand)?,
            BoolExpr::ExistsSuccessors(operand) => eval_exists(ctx, operand)?,
            BoolExpr::PathRelevant => TriResult::from_bool(!ctx.edge().is_epsilon()),
            BoolExpr::NonEmptyTokens => TriResult::from_bool(!ctx.edge().relevant_tokens().is_empty()),
            BoolExpr::TokensSubset(tokens) => eval_tokens(ctx, TokenMatch::Subset, tokens),
            BoolExpr::TokensIntersect(tokens) => eval_tokens(ctx, TokenMatch::Intersection, tokens),
            BoolExpr::Location(descriptor) => {
                TriResult::from_bool(ctx.edge().locations.iter().any(|loc| descriptor.matches(loc)))
            }
            BoolExpr::Query { analysis, query } => eval_query(self, ctx, analysis, query),
            BoolExpr::QueryAll { query } => eval_query_all(ctx, query),
            BoolExpr::TargetState => {
                if ctx.states().is_empty() {
                    TriResult::indeterminate("no state available", "BoolExpr::TargetState")
                } else {
                    TriResult::from_bool(ctx.states().iter().any(|s| s.is_target()))
                }
            }
            BoolExpr::Not(operand) => operand.eval(ctx)?.map(|b| !b),
            BoolExpr::And(lhs, rhs) => eval_short_circuit(ctx, lhs, rhs, false)?,
            BoolExpr::Or(lhs, rhs) => eval_short_circuit(ctx, lhs, rhs, true)?,
            BoolExpr::BoolEq(lhs, rhs) => compare(lhs.eval(ctx)?, || rhs.eval(ctx), |a, b| a == b)?,
            BoolExpr::BoolNe(lhs, rhs) => compare(lhs.eval(ctx)?, || rhs.eval(ctx), |a, b| a != b)?,
            BoolExpr::IntEq(lhs, rhs) => compare_int(lhs.eval(ctx), || rhs.eval(ctx), |a, b| a == b),
            BoolExpr::IntNe(lhs, rhs) => compare_int(lhs.eval(ctx), || rhs.eval(ctx), |a, b| a != b),
        };
        debug!("eval({}) on {} => {}", self, ctx.edge().id, result);
        Ok(result)
    }
}

/// `And` absorbs on `false`, `Or` on `true`.
fn eval_short_circuit(ctx: &EvalContext<'_>, lhs: &BoolExpr, rhs: &BoolExpr, absorbing: bool) -> EvalResult {
    let left = lhs.eval(ctx)?;
    match left {
        TriResult::Value(a) if a == absorbing => Ok(left),
        TriResult::Value(_) => rhs.eval(ctx),
        TriResult::Indeterminate(_) => {
            let right = rhs.eval(ctx)?;
            if right.as_value() == Some(&absorbing) {
                Ok(right)
            } else {
                Ok(left)
            }
        }
    }
}

fn compare(
    left: TriResult<bool>,
    right: impl FnOnce() -> EvalResult,
    op: impl FnOnce(bool, bool) -> bool,
) -> EvalResult {
    let TriResult::Value(a) = left else {
        return Ok(left);
    };
    Ok(right()?.map(|b| op(a, b)))
}

fn compare_int(
    left: TriResult<BigInt>,
    right: impl FnOnce() -> TriResult<BigInt>,
    op: impl FnOnce(&BigInt, &BigInt) -> bool,
) -> TriResult<bool> {
    match left {
        TriResult::Indeterminate(i) => TriResult::Indeterminate(i),
        TriResult::Value(a) => right().map(|b| op(&a, &b)),
    }
}

fn eval_ast_match(
    expr: &BoolExpr,
    ctx: &EvalContext<'_>,
    pattern: &StructuralPattern,
    mode: CallMatchMode,
) -> EvalResult {
    let edge = ctx.edge();
    let tree = match mode {
        CallMatchMode::Any => edge.ast.as_ref(),
        CallMatchMode::Call => {
            if !edge.is_function_call() {
                return Ok(TriResult::FALSE);
            }
            edge.ast.as_ref()
        }
        CallMatchMode::Return => {
            let EdgeKind::FunctionReturn { summary } = &edge.kind else {
                return Ok(TriResult::FALSE);
            };
            return Ok(TriResult::from_bool(summary.as_ref().map_or(false, |s| match_and_bind(ctx, pattern, s))));
        }
    };
    match tree {
        None => Ok(TriResult::FALSE),
        Some(EdgeAst::Native(node)) => Ok(TriResult::from_bool(match_and_bind(ctx, pattern, node))),
        Some(EdgeAst::Foreign { language, .. }) => {
            warn!("{} cannot inspect a {} syntax tree on {}", expr, language, edge.id);
            Err(EvalError::UnrecognizedEdge {
                edge: edge.id,
                description: edge.description.clone(),
                found: language.clone(),
            })
        }
    }
}

fn match_and_bind(ctx: &EvalContext<'_>, pattern: &StructuralPattern, node: &AstNode) -> bool {
    match pattern.match_tree(node) {
        Some(bindings) => {
            trace!("{} bound {:?}", pattern, bindings);
            ctx.bind(bindings);
            true
        }
        None => false,
    }
}

fn eval_forall(ctx: &EvalContext<'_>, operand: &BoolExpr) -> EvalResult {
    let mut first_indeterminate = None;
    for edge in ctx.cfa().leaving_edges(ctx.edge().successor) {
        let result = operand.eval(&ctx.for_edge(edge))?;
        trace!("forall: {} on {} => {}", operand, edge.id, result);
        match result {
            TriResult::Value(false) => return Ok(result),
            TriResult::Value(true) => {}
            TriResult::Indeterminate(_) => {
                first_indeterminate.get_or_insert(result);
            }
        }
    }
    Ok(first_indeterminate.unwrap_or(TriResult::TRUE))
}

fn eval_exists(ctx: &EvalContext<'_>, operand: &BoolExpr) -> EvalResult {
    let mut first_indeterminate = None;
    for edge in ctx.cfa().leaving_edges(ctx.edge().successor) {
        let result = operand.eval(&ctx.for_edge(edge))?;
        trace!("exists: {} on {} => {}", operand, edge.id, result);
        match result {
            TriResult::Value(true) => return Ok(result),
            TriResult::Value(false) => {}
            TriResult::Indeterminate(_) => {
                first_indeterminate.get_or_insert(result);
            }
        }
    }
    Ok(first_indeterminate.unwrap_or(TriResult::FALSE))
}

fn eval_tokens(ctx: &EvalContext<'_>, mode: TokenMatch, target: &BTreeSet<TokenId>) -> TriResult<bool> {
    let edge_tokens = ctx.edge().relevant_tokens();
    if mode.matches(target, &edge_tokens) {
        return TriResult::TRUE;
    }
    let history = ctx.tokens_since_last_match();
    if history.is_empty() {
        return TriResult::FALSE;
    }
    let mut observed = history.clone();
    observed.extend(edge_tokens);
    trace!("tokens {}: retrying on history {:?}", mode, observed);
    TriResult::from_bool(mode.matches(target, &observed))
}

fn eval_query(expr: &BoolExpr, ctx: &EvalContext<'_>, analysis: &str, query: &str) -> TriResult<bool> {
    const SOURCE: &str = "BoolExpr::Query";

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
        Ok(QueryValue::Bool(answer)) => TriResult::from_bool(answer),
        Ok(other) => {
            let message = format!("`{}` answered non-boolean {} to \"{}\"", analysis, other, query);
            warn!("{}: {}", expr, message);
            ctx.report(expr, message, SOURCE);
            TriResult::FALSE
        }
        Err(e) => {
            warn!("{}: {}", expr, e);
            ctx.report(expr, e.to_string(), SOURCE);
            TriResult::FALSE
        }
    }
}

fn eval_query_all(ctx: &EvalContext<'_>, query: &str) -> TriResult<bool> {
    const SOURCE: &str = "BoolExpr::QueryAll";

    if ctx.states().is_empty() {
        return TriResult::indeterminate("no state available", SOURCE);
    }
    let Some(query) = ctx.replace_variables(query) else {
        return TriResult::indeterminate(format!("failed to substitute variables in \"{}\"", query), SOURCE);
    };
    let answer = ctx
        .states()
        .iter()
        .filter_map(|state| state.as_queryable())
        .any(|q| match q.evaluate_property(&query) {
            Ok(QueryValue::Bool(answer)) => answer,
            Ok(_) => false,
            Err(e) => {
                trace!("ignoring query error from `{}`: {}", q.analysis_name(), e);
                false
            }
        });
    TriResult::from_bool(answer)
}
