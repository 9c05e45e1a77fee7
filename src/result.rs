//! Tri-valued evaluation results.
//!
//! Every guard evaluation produces a [`TriResult`]: either a determinate
//! value, or an [`Indeterminate`] marker explaining why no value could be
//! computed. An indeterminate result is never silently treated as `true` or
//! `false`; callers must inspect it.

use std::fmt;

/// Diagnostic carried by an indeterminate result.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Indeterminate {
    /// Human-readable cause.
    pub reason: String,
    /// The component that gave up (e.g. `"BoolExpr::Query"`).
    pub source: &'static str,
}

impl fmt::Display for Indeterminate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.reason, self.source)
    }
}

/// A value of type `T`, or an indeterminate marker.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TriResult<T> {
    Value(T),
    Indeterminate(Indeterminate),
}

impl<T> TriResult<T> {
    pub fn indeterminate(reason: impl Into<String>, source: &'static str) -> Self {
        TriResult::Indeterminate(Indeterminate {
            reason: reason.into(),
            source,
        })
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, TriResult::Indeterminate(_))
    }

    pub fn is_determinate(&self) -> bool {
        !self.is_indeterminate()
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            TriResult::Value(v) => Some(v),
            TriResult::Indeterminate(_) => None,
        }
    }

    pub fn as_indeterminate(&self) -> Option<&Indeterminate> {
        match self {
            TriResult::Value(_) => None,
            TriResult::Indeterminate(i) => Some(i),
        }
    }

    /// Extract the value.
    ///
    /// # Panics
    ///
    /// Panics if the result is indeterminate. Check with
    /// [`is_indeterminate`][Self::is_indeterminate] first.
    pub fn value(self) -> T {
        match self {
            TriResult::Value(v) => v,
            TriResult::Indeterminate(i) => {
                panic!("value extracted from an indeterminate result: {}", i)
            }
        }
    }

    pub fn into_value(self) -> Result<T, Indeterminate> {
        match self {
            TriResult::Value(v) => Ok(v),
            TriResult::Indeterminate(i) => Err(i),
        }
    }

    pub fn map<U, F>(self, f: F) -> TriResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            TriResult::Value(v) => TriResult::Value(f(v)),
            TriResult::Indeterminate(i) => TriResult::Indeterminate(i),
        }
    }
}

impl TriResult<bool> {
    pub const TRUE: TriResult<bool> = TriResult::Value(true);
    pub const FALSE: TriResult<bool> = TriResult::Value(false);

    pub fn from_bool(value: bool) -> Self {
        TriResult::Value(value)
    }

    /// Determinately `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, TriResult::Value(true))
    }

    /// Determinately `false`.
    pub fn is_false(&self) -> bool {
        matches!(self, TriResult::Value(false))
    }
}

impl<T: fmt::Display> fmt::Display for TriResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriResult::Value(v) => write!(f, "{}", v),
            TriResult::Indeterminate(i) => write!(f, "MAYBE[{}]", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn test_value_accessors() {
        let r = TriResult::from_bool(true);
        assert!(r.is_true());
        assert!(!r.is_false());
        assert!(r.is_determinate());
        assert_eq!(r.as_value(), Some(&true));
        assert_eq!(r.value(), true);
    }

    #[test]
    fn test_indeterminate_is_neither_true_nor_false() {
        let r: TriResult<bool> = TriResult::indeterminate("no state", "test");
        assert!(!r.is_true());
        assert!(!r.is_false());
        assert!(r.is_indeterminate());
        assert_eq!(r.as_value(), None);
        assert_eq!(r.as_indeterminate().map(|i| i.reason.as_str()), Some("no state"));
    }

    #[test]
    #[should_panic(expected = "value extracted from an indeterminate result")]
    fn test_value_on_indeterminate_panics() {
        let r: TriResult<bool> = TriResult::indeterminate("boom", "test");
        r.value();
    }

    #[test]
    fn test_into_value() {
        let r: TriResult<i32> = TriResult::indeterminate("x", "src");
        let err = r.into_value().unwrap_err();
        assert_eq!(err.source, "src");
        assert_eq!(TriResult::Value(5).into_value(), Ok(5));
    }

    #[test]
    fn test_map_preserves_indeterminate() {
        let r: TriResult<i32> = TriResult::indeterminate("x", "src");
        assert!(r.map(|v| v + 1).is_indeterminate());
        assert_eq!(TriResult::Value(1).map(|v| v + 1), TriResult::Value(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(TriResult::TRUE.to_string(), "true");
        let r: TriResult<bool> = TriResult::indeterminate("why", "here");
        assert_eq!(r.to_string(), "MAYBE[why (in here)]");
    }
}
