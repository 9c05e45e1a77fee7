//! Structural equality oracle for guards.
//!
//! Used to decide whether two transitions can be enabled at once.
//! [`Equality::Unequal`] is only returned for pairs that no context can make
//! true together; anything the oracle cannot prove is [`Equality::Unknown`].

use std::fmt;

use crate::expr::BoolExpr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Equality {
    Equal,
    Unequal,
    Unknown,
}

impl Equality {
    fn from_children(lhs: Equality, rhs: Equality) -> Equality {
        if lhs == Equality::Equal && rhs == Equality::Equal {
            Equality::Equal
        } else {
            Equality::Unknown
        }
    }
}

impl fmt::Display for Equality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Equality::Equal => write!(f, "EQUAL"),
            Equality::Unequal => write!(f, "UNEQUAL"),
            Equality::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl BoolExpr {
    /// Compare two guards structurally.
    pub fn equality_to(&self, other: &BoolExpr) -> Equality {
        use BoolExpr::*;

        match (self, other) {
            (True, True) | (False, False) => Equality::Equal,
            (True, False) | (False, True) => Equality::Unequal,

            (LabelExact(a), LabelExact(b)) => exclusive(a == b),
            (EdgeExact(a), EdgeExact(b)) => exclusive(a == b),
            (AssumeCase(a), AssumeCase(b)) => exclusive(a == b),

            (ProgramExit, ProgramExit)
            | (AssertFailure, AssertFailure)
            | (AssumeEdge, AssumeEdge)
            | (PathRelevant, PathRelevant)
            | (NonEmptyTokens, NonEmptyTokens)
            | (TargetState, TargetState) => Equality::Equal,

            (LabelRegex(a), LabelRegex(b)) | (EdgeRegex(a), EdgeRegex(b)) => equal_or_unknown(a == b),
            (AstMatch { pattern: pa, mode: ma }, AstMatch { pattern: pb, mode: mb }) => {
                equal_or_unknown(pa == pb && ma == mb)
            }
            (TokensSubset(a), TokensSubset(b)) | (TokensIntersect(a), TokensIntersect(b)) => {
                equal_or_unknown(a == b)
            }
            (Location(a), Location(b)) => equal_or_unknown(a == b),
            (
                Query {
                    analysis: aa,
                    query: qa,
                },
                Query {
                    analysis: ab,
                    query: qb,
                },
            ) => equal_or_unknown(aa == ab && qa == qb),
            (QueryAll { query: a }, QueryAll { query: b }) => equal_or_unknown(a == b),

            (ForallSuccessors(a), ForallSuccessors(b)) | (ExistsSuccessors(a), ExistsSuccessors(b)) => {
                equal_or_unknown(a.equality_to(b) == Equality::Equal)
            }
            // `!a` and `!b` may both hold even when `a` and `b` exclude each other.
            (Not(a), Not(b)) => equal_or_unknown(a.equality_to(b) == Equality::Equal),

            (And(la, ra), And(lb, rb))
            | (Or(la, ra), Or(lb, rb))
            | (BoolEq(la, ra), BoolEq(lb, rb))
            | (BoolNe(la, ra), BoolNe(lb, rb)) => Equality::from_children(la.equality_to(lb), ra.equality_to(rb)),

            (IntEq(la, ra), IntEq(lb, rb)) | (IntNe(la, ra), IntNe(lb, rb)) => {
                equal_or_unknown(la == lb && ra == rb)
            }

            _ => Equality::Unknown,
        }
    }
}

fn exclusive(same: bool) -> Equality {
    if same {
        Equality::Equal
    } else {
        Equality::Unequal
    }
}

fn equal_or_unknown(same: bool) -> Equality {
    if same {
        Equality::Equal
    } else {
        Equality::Unknown
    }
}
