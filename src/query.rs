//! Cross-analysis query bridge.
//!
//! Guards can ask questions about the states of other analyses running
//! alongside the monitor. Every such state implements [`AbstractState`];
//! states that understand string queries additionally expose a
//! [`QueryableState`] view. Query strings are opaque to this crate: only the
//! receiving analysis interprets them.

use std::collections::HashMap;
use std::fmt;

use num_bigint::BigInt;

use crate::error::QueryError;

/// Answer to a query.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum QueryValue {
    Bool(bool),
    Int(BigInt),
    Text(String),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Int(i) => write!(f, "{}", i),
            QueryValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(BigInt::from(value))
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

/// A state that answers string queries.
pub trait QueryableState {
    /// Name of the analysis that produced the state.
    fn analysis_name(&self) -> &str;

    fn evaluate_property(&self, query: &str) -> Result<QueryValue, QueryError>;
}

/// A state produced by a sibling analysis.
pub trait AbstractState: fmt::Debug {
    /// The queryable view of this state, if the analysis supports queries.
    fn as_queryable(&self) -> Option<&dyn QueryableState> {
        None
    }

    /// Does this state represent a property violation?
    fn is_target(&self) -> bool {
        false
    }
}

/// A queryable state backed by a fixed property table.
///
/// Unknown queries are rejected with [`QueryError::InvalidQuery`].
#[derive(Debug, Clone, Default)]
pub struct PropertyMapState {
    name: String,
    properties: HashMap<String, QueryValue>,
    target: bool,
}

impl PropertyMapState {
    pub fn new(name: impl Into<String>) -> Self {
        PropertyMapState {
            name: name.into(),
            properties: HashMap::new(),
            target: false,
        }
    }

    pub fn with(mut self, query: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.properties.insert(query.into(), value.into());
        self
    }

    pub fn with_target(mut self, target: bool) -> Self {
        self.target = target;
        self
    }
}

impl QueryableState for PropertyMapState {
    fn analysis_name(&self) -> &str {
        &self.name
    }

    fn evaluate_property(&self, query: &str) -> Result<QueryValue, QueryError> {
        self.properties
            .get(query)
            .cloned()
            .ok_or_else(|| QueryError::invalid(query, format!("unknown property for {}", self.name)))
    }
}

impl AbstractState for PropertyMapState {
    fn as_queryable(&self) -> Option<&dyn QueryableState> {
        Some(self)
    }

    fn is_target(&self) -> bool {
        self.target
    }
}

/// State of the error-location analysis, which flags program locations
/// that are known errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorLocationState {
    Normal,
    Error,
    Top,
    Bottom,
}

impl ErrorLocationState {
    pub fn is_error(self) -> bool {
        matches!(self, ErrorLocationState::Error | ErrorLocationState::Top)
    }
}

impl fmt::Display for ErrorLocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorLocationState::Normal => "NORMAL",
            ErrorLocationState::Error => "ERROR",
            ErrorLocationState::Top => "TOP",
            ErrorLocationState::Bottom => "BOTTOM",
        };
        write!(f, "<{}>", name)
    }
}

impl AbstractState for ErrorLocationState {
    fn is_target(&self) -> bool {
        self.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_property_map_answers_known_queries() {
        let state = PropertyMapState::new("ValueAnalysis").with("x==1", true).with("x", 7i64);
        let q = state.as_queryable().unwrap();
        assert_eq!(q.analysis_name(), "ValueAnalysis");
        assert_eq!(q.evaluate_property("x==1"), Ok(QueryValue::Bool(true)));
        assert_eq!(q.evaluate_property("x"), Ok(QueryValue::Int(BigInt::from(7))));
    }

    #[test]
    fn test_property_map_rejects_unknown_queries() {
        let state = PropertyMapState::new("A");
        assert!(matches!(
            state.evaluate_property("nope"),
            Err(QueryError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_error_location_targets() {
        assert!(!ErrorLocationState::Normal.is_target());
        assert!(ErrorLocationState::Error.is_target());
        assert!(ErrorLocationState::Top.is_target());
        assert!(!ErrorLocationState::Bottom.is_target());
        assert!(ErrorLocationState::Error.as_queryable().is_none());
        assert_eq!(ErrorLocationState::Top.to_string(), "<TOP>");
    }
}
