//! Running an automaton along program paths.
//!
//! A [`Monitor`] pairs an immutable [`Automaton`] with the [`Cfa`] its
//! guards refer to. Each monitored path carries its own [`MonitorState`],
//! advanced one edge at a time by [`Monitor::step`], or over a whole path by
//! [`Monitor::run`].
//!
//! On every edge the transitions of the current state are tried in
//! declaration order and the first guard that is determinately `true` fires.
//! Indeterminate guards are recorded as diagnostics and treated as not
//! taken. When nothing fires, the monitor stays in place.
//!
//! Each transition is tried with an empty set of transition variables.
//! Numbered jokers bound by its guard are visible to its assertions and
//! actions as `$1`, `$2`, ...

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use crate::automaton::{Action, Automaton, Transition};
use crate::cfa::Cfa;
use crate::context::{Diagnostic, Diagnostics, EvalContext, TransitionVariables, Variables};
use crate::error::EvalError;
use crate::location::TokenId;
use crate::query::AbstractState;
use crate::result::TriResult;
use crate::types::{EdgeId, StateId};

/// Configuration for [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Maximum number of diagnostics kept by [`Monitor::run`] (default: 1000).
    pub max_diagnostics: usize,
    /// Stop [`Monitor::run`] at the first violating state (default: true).
    pub stop_at_violation: bool,
    /// Number of steps with indeterminate guards since the last fired
    /// transition after which the verdict becomes
    /// [`Verdict::Undetermined`] (default: 1). Zero disables it.
    pub undetermined_after: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_diagnostics: 1000,
            stop_at_violation: true,
            undetermined_after: 1,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Verdict {
    /// A violating state was reached.
    Violated,
    /// The path ends in an accepting state.
    Held,
    /// The path is in a non-terminal state and guards could not be decided.
    Undetermined,
    /// Nothing decided yet.
    Pending,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::Violated => "VIOLATED",
            Verdict::Held => "HELD",
            Verdict::Undetermined => "UNDETERMINED",
            Verdict::Pending => "PENDING",
        };
        write!(f, "{}", name)
    }
}

/// Per-path progress of a monitor.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MonitorState {
    current: StateId,
    variables: Variables,
    tokens_since_last_match: BTreeSet<TokenId>,
    indeterminate_steps: usize,
}

impl MonitorState {
    pub fn new(automaton: &Automaton) -> Self {
        MonitorState {
            current: automaton.initial_state(),
            variables: automaton.initial_variables().clone(),
            tokens_since_last_match: BTreeSet::new(),
            indeterminate_steps: 0,
        }
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Tokens of the edges traversed since the last fired transition.
    pub fn tokens_since_last_match(&self) -> &BTreeSet<TokenId> {
        &self.tokens_since_last_match
    }

    pub fn indeterminate_steps(&self) -> usize {
        self.indeterminate_steps
    }

    pub fn verdict(&self, automaton: &Automaton, config: &MonitorConfig) -> Verdict {
        let state = automaton.state(self.current);
        if state.is_violating() {
            Verdict::Violated
        } else if state.is_accepting() {
            Verdict::Held
        } else if config.undetermined_after > 0 && self.indeterminate_steps >= config.undetermined_after {
            Verdict::Undetermined
        } else {
            Verdict::Pending
        }
    }
}

/// What happened on one edge.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StepOutcome {
    pub edge: EdgeId,
    pub previous: StateId,
    pub current: StateId,
    /// Index of the fired transition within the previous state's list.
    pub fired: Option<usize>,
    /// Rendering of the assertion that sent the monitor to the error sink.
    pub failed_assertion: Option<String>,
    /// Number of guards that evaluated to an indeterminate result.
    pub indeterminate_guards: usize,
    /// Joker bindings of the fired transition's guard.
    pub transition_variables: TransitionVariables,
}

impl StepOutcome {
    fn stay(edge: EdgeId, state: StateId) -> Self {
        StepOutcome {
            edge,
            previous: state,
            current: state,
            fired: None,
            failed_assertion: None,
            indeterminate_guards: 0,
            transition_variables: TransitionVariables::new(),
        }
    }

    pub fn changed_state(&self) -> bool {
        self.previous != self.current
    }
}

/// A fired transition, as recorded by [`Monitor::run`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FiredTransition {
    pub edge: EdgeId,
    pub from: StateId,
    pub to: StateId,
    pub transition: usize,
}

/// Result of [`Monitor::run`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub final_state: MonitorState,
    pub verdict: Verdict,
    /// Number of edges processed.
    pub steps: usize,
    pub fired: Vec<FiredTransition>,
    pub diagnostics: Vec<Diagnostic>,
    /// Diagnostics discarded beyond [`MonitorConfig::max_diagnostics`].
    pub dropped_diagnostics: usize,
}

/// Fired transition, computed before the monitor state is updated.
struct Firing {
    index: usize,
    target: StateId,
    variables: Variables,
    failed_assertion: Option<String>,
    transition_variables: TransitionVariables,
}

#[derive(Debug, Clone)]
pub struct Monitor<'a> {
    automaton: &'a Automaton,
    cfa: &'a Cfa,
    config: MonitorConfig,
}

impl<'a> Monitor<'a> {
    pub fn new(automaton: &'a Automaton, cfa: &'a Cfa) -> Self {
        Self::with_config(automaton, cfa, MonitorConfig::default())
    }

    pub fn with_config(automaton: &'a Automaton, cfa: &'a Cfa, config: MonitorConfig) -> Self {
        Monitor { automaton, cfa, config }
    }

    pub fn automaton(&self) -> &'a Automaton {
        self.automaton
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// A fresh per-path state at the automaton's initial state.
    pub fn start(&self) -> MonitorState {
        MonitorState::new(self.automaton)
    }

    pub fn verdict(&self, state: &MonitorState) -> Verdict {
        state.verdict(self.automaton, &self.config)
    }

    /// Process one traversed edge.
    ///
    /// `states` are the sibling analysis states at the edge; indeterminate
    /// guards, assertions and actions are reported to `sink`.
    pub fn step(
        &self,
        state: &mut MonitorState,
        edge: EdgeId,
        states: &[&dyn AbstractState],
        sink: &Diagnostics,
    ) -> Result<StepOutcome, EvalError> {
        let current = self.automaton.state(state.current);
        if current.is_terminal() {
            debug!("{}: terminal state {} ignores {}", self.automaton.name(), current.name(), edge);
            return Ok(StepOutcome::stay(edge, state.current));
        }

        let mut indeterminate_guards = 0;
        let firing = {
            let ctx = EvalContext::new(self.cfa, edge, sink)
                .with_variables(&state.variables)
                .with_tokens_since_last_match(&state.tokens_since_last_match)
                .with_states(states);

            let mut firing = None;
            for (index, transition) in current.transitions().iter().enumerate() {
                let bindings = RefCell::new(TransitionVariables::new());
                let ctx = ctx.with_transition_variables(&bindings);
                match transition.guard.eval(&ctx)? {
                    TriResult::Value(true) => {
                        firing = Some(self.fire(&ctx, index, transition)?);
                        break;
                    }
                    TriResult::Value(false) => {}
                    TriResult::Indeterminate(i) => {
                        warn!("{}: guard {} is indeterminate on {}: {}", self.automaton.name(), transition.guard, edge, i);
                        ctx.report(&transition.guard, i.reason, i.source);
                        indeterminate_guards += 1;
                    }
                }
            }
            firing
        };

        let previous = state.current;
        let Some(firing) = firing else {
            state
                .tokens_since_last_match
                .extend(self.cfa.edge(edge).relevant_tokens());
            if indeterminate_guards > 0 {
                state.indeterminate_steps += 1;
            }
            return Ok(StepOutcome {
                indeterminate_guards,
                ..StepOutcome::stay(edge, previous)
            });
        };

        state.current = if firing.failed_assertion.is_some() {
            self.automaton.error_state()
        } else {
            firing.target
        };
        state.variables = firing.variables;
        state.tokens_since_last_match.clear();
        state.indeterminate_steps = 0;

        let next = self.automaton.state(state.current);
        debug!(
            "{}: {} --[{}]--> {} on {}",
            self.automaton.name(),
            current.name(),
            firing.index,
            next.name(),
            edge
        );
        if next.is_violating() {
            info!("{}: entered violating state {} on {}", self.automaton.name(), next.name(), edge);
        } else if next.is_accepting() {
            info!("{}: entered accepting state {} on {}", self.automaton.name(), next.name(), edge);
        }

        Ok(StepOutcome {
            edge,
            previous,
            current: state.current,
            fired: Some(firing.index),
            failed_assertion: firing.failed_assertion,
            indeterminate_guards,
            transition_variables: firing.transition_variables,
        })
    }

    /// Check assertions and run actions of a transition whose guard held.
    fn fire(&self, ctx: &EvalContext<'_>, index: usize, transition: &Transition) -> Result<Firing, EvalError> {
        let mut failed_assertion = None;
        for assertion in &transition.assertions {
            match assertion.eval(ctx)? {
                TriResult::Value(true) => {}
                TriResult::Value(false) => {
                    warn!("{}: assertion {} failed on {}", self.automaton.name(), assertion, ctx.edge().id);
                    failed_assertion = Some(assertion.to_string());
                    break;
                }
                TriResult::Indeterminate(i) => {
                    ctx.report(assertion, i.reason, i.source);
                }
            }
        }

        let mut variables = ctx.variables().clone();
        if failed_assertion.is_none() {
            for action in &transition.actions {
                self.run_action(ctx, action, &mut variables);
            }
        }

        Ok(Firing {
            index,
            target: transition.target,
            variables,
            failed_assertion,
            transition_variables: ctx.transition_variables(),
        })
    }

    fn run_action(&self, ctx: &EvalContext<'_>, action: &Action, variables: &mut Variables) {
        match action {
            Action::Assign { variable, value } => match value.eval(ctx) {
                TriResult::Value(v) => {
                    debug!("{}: {} := {}", self.automaton.name(), variable, v);
                    variables.insert(variable.clone(), v);
                }
                TriResult::Indeterminate(i) => {
                    ctx.report(action, i.reason, i.source);
                }
            },
            Action::Log(message) => match ctx.replace_variables(message) {
                Some(text) => info!("{}: {}", self.automaton.name(), text),
                None => {
                    ctx.report(action, "failed to substitute variables", "Action::Log");
                    info!("{}: {}", self.automaton.name(), message);
                }
            },
        }
    }

    /// Process a whole path, with the same sibling states at every edge.
    pub fn run(
        &self,
        path: impl IntoIterator<Item = EdgeId>,
        states: &[&dyn AbstractState],
    ) -> Result<RunReport, EvalError> {
        let sink = Diagnostics::new();
        let mut state = self.start();
        let mut steps = 0;
        let mut fired = Vec::new();
        let mut diagnostics = Vec::new();
        let mut dropped_diagnostics = 0;

        for edge in path {
            let outcome = self.step(&mut state, edge, states, &sink)?;
            steps += 1;
            if let Some(transition) = outcome.fired {
                fired.push(FiredTransition {
                    edge,
                    from: outcome.previous,
                    to: outcome.current,
                    transition,
                });
            }
            for d in sink.take() {
                if diagnostics.len() < self.config.max_diagnostics {
                    diagnostics.push(d);
                } else {
                    dropped_diagnostics += 1;
                }
            }
            if self.config.stop_at_violation && self.automaton.state(state.current).is_violating() {
                debug!("{}: stopping at violation after {} steps", self.automaton.name(), steps);
                break;
            }
        }

        let verdict = self.verdict(&state);
        info!("{}: verdict {} after {} steps", self.automaton.name(), verdict, steps);
        Ok(RunReport {
            final_state: state,
            verdict,
            steps,
            fired,
            diagnostics,
            dropped_diagnostics,
        })
    }
}
