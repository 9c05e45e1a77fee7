//! # guard-automaton: guarded specification automata over control-flow graphs
//!
//! **`guard-automaton`** evaluates the guard language of specification automata against the edges of a
//! program's control-flow automaton. It is meant to run inside a reachability analysis: every time the
//! analysis traverses an edge, the monitor checks which transition of the property automaton fires.
//!
//! ## Three-valued guards
//!
//! A guard may depend on things that are unknown at a given point: a sibling analysis that is not
//! running, a variable that was never assigned, a query nobody can answer. Instead of guessing, guard
//! evaluation returns a [`TriResult`][crate::result::TriResult]: either a determinate value, or an
//! *indeterminate* marker that carries the reason. Indeterminate guards never fire a transition and
//! are reported as diagnostics, so an undecided path is never mistaken for a safe one.
//!
//! ## Key Features
//!
//! - **Closed expression tree**: [`BoolExpr`][crate::expr::BoolExpr] has one variant per atom or combinator.
//!   Trees are immutable values and can be shared between threads.
//! - **Short-circuit combinators**: `And`/`Or` evaluate left to right and may still decide a result when one
//!   side is indeterminate.
//! - **Structural equality oracle**: [`Equality`][crate::equality::Equality] tells when two guards can
//!   never hold together, soundly.
//! - **Cross-analysis queries**: guards ask other analyses through the
//!   [`QueryableState`][crate::query::QueryableState] trait.
//! - **Per-path monitor state**: the token history and variables live in
//!   [`MonitorState`][crate::monitor::MonitorState], not in the expression tree.
//!
//! ## Basic Usage
//!
//! ```rust
//! use guard_automaton::automaton::{AutomatonBuilder, StateKind, Transition};
//! use guard_automaton::cfa::Cfa;
//! use guard_automaton::expr::BoolExpr;
//! use guard_automaton::monitor::{Monitor, Verdict};
//!
//! // 1. Build the program graph
//! let mut cfa = Cfa::new();
//! let entry = cfa.add_node("main");
//! let error = cfa.add_label_node("main", "ERROR");
//! let edge = cfa.add_blank_edge(entry, error, "goto ERROR");
//!
//! // 2. Build the property: reaching the ERROR label is a violation
//! let mut builder = AutomatonBuilder::new("ErrorLabel");
//! let init = builder.add_state("Init", StateKind::Initial);
//! let bad = builder.add_state("Bad", StateKind::Violating);
//! builder.add_transition(init, Transition::new(BoolExpr::label("ERROR"), bad));
//! let automaton = builder.build().unwrap();
//!
//! // 3. Monitor a path
//! let report = Monitor::new(&automaton, &cfa).run([edge], &[]).unwrap();
//! assert_eq!(report.verdict, Verdict::Violated);
//! ```
//!
//! ## Core Components
//!
//! - **[`expr`]**, **[`eval`]**: Guard expressions and their evaluation.
//! - **[`equality`]**: Structural equality oracle.
//! - **[`automaton`]**, **[`monitor`]**: Specification automata and per-path monitoring.
//! - **[`cfa`]**: The control-flow graph guards are evaluated on.
//! - **[`query`]**: Interfaces to sibling analyses.
//! - **[`dot`]**: Utilities for visualizing automata using Graphviz.

pub mod ast;
pub mod automaton;
pub mod cfa;
pub mod context;
pub mod dot;
pub mod equality;
pub mod error;
pub mod eval;
pub mod expr;
pub mod int_expr;
pub mod location;
pub mod monitor;
pub mod query;
pub mod result;
pub mod types;
