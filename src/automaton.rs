//! Specification automata.
//!
//! An [`Automaton`] is a finite set of named states with ordered, guarded
//! transitions. It is assembled with an [`AutomatonBuilder`] and is
//! immutable afterwards; the per-path progress lives in
//! [`MonitorState`][crate::monitor::MonitorState].
//!
//! Every automaton owns a predefined violating sink ([`ERROR_STATE_NAME`]),
//! entered when an assertion of a fired transition fails.
//!
//! ```
//! use guard_automaton::automaton::{AutomatonBuilder, StateKind, Transition};
//! use guard_automaton::expr::BoolExpr;
//!
//! let mut builder = AutomatonBuilder::new("NoError");
//! let init = builder.add_state("Init", StateKind::Initial);
//! let error = builder.add_state("Error", StateKind::Violating);
//! builder.add_transition(init, Transition::new(BoolExpr::label("ERROR"), error));
//! let automaton = builder.build().unwrap();
//!
//! assert_eq!(automaton.state(automaton.initial_state()).name(), "Init");
//! ```

use std::collections::HashSet;
use std::fmt;

use num_bigint::BigInt;

use crate::context::Variables;
use crate::error::BuildError;
use crate::expr::{BoolExpr, Quoted};
use crate::int_expr::IntExpr;
use crate::types::StateId;

/// Name of the predefined violating sink.
pub const ERROR_STATE_NAME: &str = "_predefinedState_ERROR";

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StateKind {
    Initial,
    Intermediate,
    Accepting,
    Violating,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateKind::Initial => "initial",
            StateKind::Intermediate => "intermediate",
            StateKind::Accepting => "accepting",
            StateKind::Violating => "violating",
        };
        write!(f, "{}", name)
    }
}

/// Side effect of a fired transition.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Action {
    /// Set a monitor variable.
    Assign { variable: String, value: IntExpr },
    /// Emit a message; `$$name` is replaced by the variable's value.
    Log(String),
}

impl Action {
    pub fn assign(variable: impl Into<String>, value: IntExpr) -> Self {
        Action::Assign {
            variable: variable.into(),
            value,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        Action::Log(message.into())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Assign { variable, value } => write!(f, "{} = {}", variable, value),
            Action::Log(message) => write!(f, "PRINT {}", Quoted(message)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Transition {
    pub guard: BoolExpr,
    /// Checked after the guard fires; a `false` assertion leads to the
    /// error sink.
    pub assertions: Vec<BoolExpr>,
    pub actions: Vec<Action>,
    pub target: StateId,
}

impl Transition {
    pub fn new(guard: BoolExpr, target: StateId) -> Self {
        Transition {
            guard,
            assertions: Vec::new(),
            actions: Vec::new(),
            target,
        }
    }

    pub fn with_assertion(mut self, assertion: BoolExpr) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.guard)?;
        if !self.assertions.is_empty() {
            write!(f, " ASSERT ")?;
            for (i, a) in self.assertions.iter().enumerate() {
                if i > 0 {
                    write!(f, " && ")?;
                }
                write!(f, "{}", a)?;
            }
        }
        for action in &self.actions {
            write!(f, " DO {};", action)?;
        }
        write!(f, " GOTO {}", self.target)
    }
}

#[derive(Debug, Clone)]
pub struct AutomatonState {
    id: StateId,
    name: String,
    kind: StateKind,
    transitions: Vec<Transition>,
}

impl AutomatonState {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Outgoing transitions, in declaration order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn is_violating(&self) -> bool {
        self.kind == StateKind::Violating
    }

    pub fn is_accepting(&self) -> bool {
        self.kind == StateKind::Accepting
    }

    /// Terminal states ignore every further edge.
    pub fn is_terminal(&self) -> bool {
        match self.kind {
            StateKind::Violating => true,
            StateKind::Accepting => self.transitions.is_empty(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Automaton {
    name: String,
    variables: Variables,
    states: Vec<AutomatonState>,
    initial: StateId,
    error: StateId,
}

impl Automaton {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable bindings every monitored path starts with.
    pub fn initial_variables(&self) -> &Variables {
        &self.variables
    }

    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    /// The predefined violating sink.
    pub fn error_state(&self) -> StateId {
        self.error
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, id: StateId) -> &AutomatonState {
        &self.states[id.index()]
    }

    pub fn states(&self) -> impl Iterator<Item = &AutomatonState> {
        self.states.iter()
    }

    pub fn state_by_name(&self, name: &str) -> Option<StateId> {
        self.states.iter().find(|s| s.name == name).map(|s| s.id)
    }
}

/// Incremental construction of an [`Automaton`].
///
/// States are numbered in insertion order after the predefined sink, which
/// always has id `0`.
#[derive(Debug, Clone)]
pub struct AutomatonBuilder {
    name: String,
    variables: Variables,
    states: Vec<AutomatonState>,
    transitions: Vec<(StateId, Transition)>,
}

impl AutomatonBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let error = AutomatonState {
            id: StateId::new(0),
            name: ERROR_STATE_NAME.to_string(),
            kind: StateKind::Violating,
            transitions: Vec::new(),
        };
        AutomatonBuilder {
            name: name.into(),
            variables: Variables::new(),
            states: vec![error],
            transitions: Vec::new(),
        }
    }

    pub fn error_state(&self) -> StateId {
        self.states[0].id
    }

    /// Declare a variable with its initial value.
    pub fn add_variable(&mut self, name: impl Into<String>, value: impl Into<BigInt>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn add_state(&mut self, name: impl Into<String>, kind: StateKind) -> StateId {
        let id = StateId::new(self.states.len());
        self.states.push(AutomatonState {
            id,
            name: name.into(),
            kind,
            transitions: Vec::new(),
        });
        id
    }

    /// Append a transition to `from`'s list.
    ///
    /// Both endpoints are checked by [`build`][Self::build].
    pub fn add_transition(&mut self, from: StateId, transition: Transition) {
        self.transitions.push((from, transition));
    }

    pub fn build(mut self) -> Result<Automaton, BuildError> {
        for (from, transition) in std::mem::take(&mut self.transitions) {
            let state = self
                .states
                .get_mut(from.index())
                .ok_or(BuildError::UnknownSource(from))?;
            state.transitions.push(transition);
        }

        let mut names = HashSet::new();
        let mut initial: Option<&AutomatonState> = None;
        for state in &self.states {
            if !names.insert(state.name.as_str()) {
                return Err(BuildError::DuplicateState(state.name.clone()));
            }
            if state.kind == StateKind::Initial {
                if let Some(first) = initial {
                    return Err(BuildError::MultipleInitialStates {
                        automaton: self.name.clone(),
                        first: first.name.clone(),
                        second: state.name.clone(),
                    });
                }
                initial = Some(state);
            }
            for t in &state.transitions {
                if t.target.index() >= self.states.len() {
                    return Err(BuildError::UnknownTarget {
                        from: state.name.clone(),
                        target: t.target,
                    });
                }
            }
        }
        let initial = initial
            .map(|s| s.id)
            .ok_or_else(|| BuildError::NoInitialState(self.name.clone()))?;
        let error = self.error_state();

        Ok(Automaton {
            name: self.name,
            variables: self.variables,
            states: self.states,
            initial,
            error,
        })
    }
}
