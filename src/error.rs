//! Error types.
//!
//! Indeterminate guard results are *not* errors: they travel as
//! [`TriResult::Indeterminate`][crate::result::TriResult]. The enums here
//! cover the conditions that must not be silently absorbed.

use thiserror::Error;

use crate::types::{EdgeId, StateId};

/// Fatal evaluation failure.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EvalError {
    /// A structural-pattern atom met a syntax tree it cannot interpret.
    #[error("unrecognized edge {edge} ({description}): attached syntax tree is {found}")]
    UnrecognizedEdge {
        edge: EdgeId,
        description: String,
        found: String,
    },
}

/// Failure to compile a regex or structural pattern.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum PatternError {
    #[error("invalid regular expression `{pattern}`: {message}")]
    Regex { pattern: String, message: String },

    #[error("invalid statement pattern `{pattern}` at offset {offset}: {message}")]
    Syntax {
        pattern: String,
        offset: usize,
        message: String,
    },
}

/// Failure to assemble an automaton.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BuildError {
    #[error("automaton `{0}` has no initial state")]
    NoInitialState(String),

    #[error("automaton `{automaton}` declares more than one initial state: `{first}` and `{second}`")]
    MultipleInitialStates {
        automaton: String,
        first: String,
        second: String,
    },

    #[error("duplicate state name `{0}`")]
    DuplicateState(String),

    #[error("transition from `{from}` targets unknown state {target}")]
    UnknownTarget { from: String, target: StateId },

    #[error("transition leaves unknown state {0}")]
    UnknownSource(StateId),
}

/// Error reported by a sibling analysis that could not answer a query.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum QueryError {
    #[error("invalid query `{query}`: {message}")]
    InvalidQuery { query: String, message: String },

    #[error("analysis `{0}` does not answer queries")]
    Unsupported(String),
}

impl QueryError {
    pub fn invalid(query: impl Into<String>, message: impl Into<String>) -> Self {
        QueryError::InvalidQuery {
            query: query.into(),
            message: message.into(),
        }
    }
}
