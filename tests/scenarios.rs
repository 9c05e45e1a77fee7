//! End-to-end tests for guard evaluation and monitoring.
//!
//! Tests cover whole automata driven along paths, the combinator tables and
//! soundness of the equality oracle.

use std::collections::BTreeSet;

use guard_automaton::automaton::{Action, AutomatonBuilder, StateKind, Transition};
use guard_automaton::cfa::Cfa;
use guard_automaton::context::{Diagnostics, EvalContext};
use guard_automaton::equality::Equality;
use guard_automaton::error::EvalError;
use guard_automaton::expr::BoolExpr;
use guard_automaton::int_expr::IntExpr;
use guard_automaton::location::FileLocation;
use guard_automaton::monitor::{Monitor, MonitorConfig, Verdict};
use guard_automaton::query::{AbstractState, ErrorLocationState, PropertyMapState};
use guard_automaton::result::TriResult;
use guard_automaton::types::EdgeId;
use num_bigint::BigInt;

fn eval(cfa: &Cfa, edge: EdgeId, expr: &BoolExpr) -> TriResult<bool> {
    let sink = Diagnostics::new();
    let ctx = EvalContext::new(cfa, edge, &sink);
    expr.eval(&ctx).unwrap()
}

/// An atom that is indeterminate without sibling states.
fn unknown() -> BoolExpr {
    BoolExpr::TargetState
}

// ─── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn error_label_reaches_violating_state() {
    let mut cfa = Cfa::new();
    let n1 = cfa.add_node("main");
    let n2 = cfa.add_node("main");
    let n3 = cfa.add_label_node("main", "ERROR");
    let e1 = cfa.add_statement_edge(n1, n2, "x = 0;").unwrap();
    let e2 = cfa.add_assume_edge(n2, n3, "x == 0", true).unwrap();

    let mut builder = AutomatonBuilder::new("ErrorLabel");
    let init = builder.add_state("Init", StateKind::Initial);
    let error = builder.add_state("Error", StateKind::Violating);
    builder.add_transition(init, Transition::new(BoolExpr::label("ERROR"), error));
    let automaton = builder.build().unwrap();

    let monitor = Monitor::new(&automaton, &cfa);
    let report = monitor.run([e1, e2], &[]).unwrap();
    assert_eq!(report.final_state.current(), error);
    assert_eq!(report.verdict, Verdict::Violated);
    assert_eq!(report.fired.len(), 1);
    assert_eq!(report.fired[0].edge, e2);
}

#[test]
fn disjunction_evaluates_right_after_false_left() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let l2 = cfa.add_label_node("main", "L2");
    let e = cfa.add_blank_edge(a, l2, "goto L2");

    let guard = BoolExpr::or(BoolExpr::label("L1"), BoolExpr::label("L2"));
    assert_eq!(eval(&cfa, e, &guard), TriResult::Value(true));
}

#[test]
fn token_subset_falls_back_on_history() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let c = cfa.add_node("main");
    let first = cfa.add_statement_edge(a, b, "y = 2;").unwrap();
    let second = cfa.add_statement_edge(b, c, "x = 1;").unwrap();
    cfa.add_location(first, FileLocation::new("t.c", 1, 1).with_tokens([6]));
    cfa.add_location(second, FileLocation::new("t.c", 2, 2).with_tokens([5]));

    let guard = BoolExpr::tokens_subset([5, 6]);

    // Direct evaluation without history.
    assert_eq!(eval(&cfa, second, &guard), TriResult::Value(false));

    // With history recorded by the monitor on the previous edge.
    let mut builder = AutomatonBuilder::new("Tokens");
    let init = builder.add_state("Init", StateKind::Initial);
    let done = builder.add_state("Done", StateKind::Accepting);
    builder.add_transition(init, Transition::new(guard.clone(), done));
    let automaton = builder.build().unwrap();

    let monitor = Monitor::new(&automaton, &cfa);
    let sink = Diagnostics::new();
    let mut state = monitor.start();
    let outcome = monitor.step(&mut state, first, &[], &sink).unwrap();
    assert_eq!(outcome.fired, None);
    assert_eq!(state.tokens_since_last_match(), &BTreeSet::from([6]));

    let outcome = monitor.step(&mut state, second, &[], &sink).unwrap();
    assert_eq!(outcome.current, done);
    assert_eq!(monitor.verdict(&state), Verdict::Held);
    assert!(state.tokens_since_last_match().is_empty());
}

#[test]
fn broadcast_query_without_states_is_indeterminate() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let e = cfa.add_statement_edge(a, b, "x = 1;").unwrap();

    let result = eval(&cfa, e, &BoolExpr::query_all("x == 1"));
    assert!(result.is_indeterminate());
    assert!(!result.is_false());
    assert_eq!(result.as_indeterminate().unwrap().reason, "no state available");
}

// ─── Combinator tables ─────────────────────────────────────────────────────────

#[test]
fn short_circuit_table() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let e = cfa.add_blank_edge(a, b, "skip");

    let t = || BoolExpr::True;
    let f = || BoolExpr::False;

    assert_eq!(eval(&cfa, e, &BoolExpr::and(f(), unknown())), TriResult::Value(false));
    assert_eq!(eval(&cfa, e, &BoolExpr::or(t(), unknown())), TriResult::Value(true));
    assert_eq!(eval(&cfa, e, &BoolExpr::and(unknown(), f())), TriResult::Value(false));
    assert_eq!(eval(&cfa, e, &BoolExpr::or(unknown(), t())), TriResult::Value(true));
    assert!(eval(&cfa, e, &BoolExpr::and(unknown(), t())).is_indeterminate());
    assert!(eval(&cfa, e, &BoolExpr::or(unknown(), f())).is_indeterminate());
    assert!(eval(&cfa, e, &BoolExpr::not(unknown())).is_indeterminate());
    assert_eq!(eval(&cfa, e, &BoolExpr::and(t(), f())), TriResult::Value(false));
    assert_eq!(eval(&cfa, e, &BoolExpr::or(f(), f())), TriResult::Value(false));
}

#[test]
fn quantifiers_over_no_successors() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let exit = cfa.add_node("main");
    let e = cfa.add_blank_edge(a, exit, "return");

    assert_eq!(eval(&cfa, e, &BoolExpr::forall(BoolExpr::False)), TriResult::Value(true));
    assert_eq!(eval(&cfa, e, &BoolExpr::exists(BoolExpr::True)), TriResult::Value(false));
    assert_eq!(eval(&cfa, e, &BoolExpr::ProgramExit), TriResult::Value(true));
}

// ─── Equality oracle ───────────────────────────────────────────────────────────

/// Whenever the oracle says `Unequal`, no edge makes both guards true.
#[test]
fn unequal_guards_never_hold_together() {
    let mut cfa = Cfa::new();
    let entry = cfa.add_node("main");
    let mid = cfa.add_node("main");
    let l1 = cfa.add_label_node("main", "L1");
    let l2 = cfa.add_label_node("main", "L2");
    let mut edges = vec![
        cfa.add_statement_edge(entry, mid, "x = 1;").unwrap(),
        cfa.add_statement_edge(entry, mid, "x = 2;").unwrap(),
        cfa.add_blank_edge(mid, l1, "goto L1"),
    ];
    edges.push(cfa.add_assume_edge(mid, l2, "x > 0", true).unwrap());
    edges.push(cfa.add_assume_edge(mid, l1, "x > 0", false).unwrap());

    let guards = vec![
        BoolExpr::True,
        BoolExpr::False,
        BoolExpr::label("L1"),
        BoolExpr::label("L2"),
        BoolExpr::edge_exact("x = 1;"),
        BoolExpr::edge_exact("x = 2;"),
        BoolExpr::AssumeCase(true),
        BoolExpr::AssumeCase(false),
        BoolExpr::not(BoolExpr::label("L1")),
        BoolExpr::not(BoolExpr::label("L2")),
        BoolExpr::and(BoolExpr::label("L1"), BoolExpr::AssumeEdge),
        BoolExpr::or(BoolExpr::label("L1"), BoolExpr::AssumeEdge),
    ];

    for a in &guards {
        for b in &guards {
            if a.equality_to(b) != Equality::Unequal {
                continue;
            }
            for &e in &edges {
                let both = eval(&cfa, e, a).is_true() && eval(&cfa, e, b).is_true();
                assert!(!both, "{} and {} both hold on {}", a, b, e);
            }
        }
    }
}

#[test]
fn negated_exclusive_labels_are_not_unequal() {
    let a = BoolExpr::not(BoolExpr::label("L1"));
    let b = BoolExpr::not(BoolExpr::label("L2"));
    assert_eq!(a.equality_to(&b), Equality::Unknown);
}

// ─── Monitoring ────────────────────────────────────────────────────────────────

#[test]
fn double_lock_is_violation() {
    let mut cfa = Cfa::new();
    let nodes: Vec<_> = (0..4).map(|_| cfa.add_node("main")).collect();
    let path = vec![
        cfa.add_statement_edge(nodes[0], nodes[1], "lock(m);").unwrap(),
        cfa.add_statement_edge(nodes[1], nodes[2], "x = x + 1;").unwrap(),
        cfa.add_statement_edge(nodes[2], nodes[3], "lock(m);").unwrap(),
    ];

    let mut builder = AutomatonBuilder::new("Locking");
    builder.add_variable("locks", 0);
    let unlocked = builder.add_state("Unlocked", StateKind::Initial);
    let locked = builder.add_state("Locked", StateKind::Intermediate);
    let error = builder.add_state("DoubleLock", StateKind::Violating);
    let lock = || BoolExpr::call("lock($?)").unwrap();
    let bump = || Action::assign("locks", IntExpr::plus(IntExpr::var("locks"), IntExpr::constant(1)));
    builder.add_transition(unlocked, Transition::new(lock(), locked).with_action(bump()));
    builder.add_transition(locked, Transition::new(BoolExpr::call("unlock($?)").unwrap(), unlocked));
    builder.add_transition(
        locked,
        Transition::new(lock(), error)
            .with_action(bump())
            .with_action(Action::log("lock taken $$locks times")),
    );
    let automaton = builder.build().unwrap();

    let report = Monitor::new(&automaton, &cfa).run(path, &[]).unwrap();
    assert_eq!(report.verdict, Verdict::Violated);
    assert_eq!(report.final_state.current(), error);
    assert_eq!(report.final_state.variables()["locks"], BigInt::from(2));
    assert_eq!(report.fired.iter().map(|f| f.to).collect::<Vec<_>>(), vec![locked, error]);
}

#[test]
fn sibling_states_drive_transitions() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let e = cfa.add_statement_edge(a, b, "x = y;").unwrap();

    let mut builder = AutomatonBuilder::new("Query");
    builder.add_variable("limit", 10);
    let init = builder.add_state("Init", StateKind::Initial);
    let over = builder.add_state("Over", StateKind::Violating);
    let target = builder.add_state("Target", StateKind::Violating);
    builder.add_transition(init, Transition::new(BoolExpr::query("Value", "x > $$limit"), over));
    builder.add_transition(init, Transition::new(BoolExpr::TargetState, target));
    let automaton = builder.build().unwrap();
    let monitor = Monitor::new(&automaton, &cfa);

    let values = PropertyMapState::new("Value").with("x > 10", false);
    let location = ErrorLocationState::Error;
    let states: Vec<&dyn AbstractState> = vec![&values, &location];
    let report = monitor.run([e], &states).unwrap();
    assert_eq!(report.final_state.current(), target);

    let values = PropertyMapState::new("Value").with("x > 10", true);
    let states: Vec<&dyn AbstractState> = vec![&values];
    let report = monitor.run([e], &states).unwrap();
    assert_eq!(report.final_state.current(), over);
}

#[test]
fn undecided_path_is_undetermined_not_held() {
    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let e = cfa.add_statement_edge(a, b, "x = 1;").unwrap();

    let mut builder = AutomatonBuilder::new("Maybe");
    let init = builder.add_state("Init", StateKind::Initial);
    let bad = builder.add_state("Bad", StateKind::Violating);
    builder.add_transition(init, Transition::new(BoolExpr::query_all("x == 1"), bad));
    let automaton = builder.build().unwrap();

    let report = Monitor::new(&automaton, &cfa).run([e], &[]).unwrap();
    assert_eq!(report.verdict, Verdict::Undetermined);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].expression, "CHECK(\"x == 1\")");
    assert_eq!(report.diagnostics[0].edge, e);

    let config = MonitorConfig {
        undetermined_after: 2,
        ..MonitorConfig::default()
    };
    let report = Monitor::with_config(&automaton, &cfa, config).run([e], &[]).unwrap();
    assert_eq!(report.verdict, Verdict::Pending);
}

#[test]
fn foreign_syntax_tree_aborts_the_run() {
    use guard_automaton::cfa::{EdgeAst, EdgeKind};

    let mut cfa = Cfa::new();
    let a = cfa.add_node("main");
    let b = cfa.add_node("main");
    let e = cfa.add_edge(a, b, EdgeKind::Statement, "x := 1");
    cfa.edge_mut(e).ast = Some(EdgeAst::Foreign {
        language: "Pascal".to_string(),
        text: "x := 1".to_string(),
    });

    let mut builder = AutomatonBuilder::new("Ast");
    let init = builder.add_state("Init", StateKind::Initial);
    builder.add_transition(init, Transition::new(BoolExpr::ast("$1 = $2").unwrap(), init));
    let automaton = builder.build().unwrap();

    let result = Monitor::new(&automaton, &cfa).run([e], &[]);
    assert!(matches!(result, Err(EvalError::UnrecognizedEdge { found, .. }) if found == "Pascal"));
}
