//! Automaton to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated output follows these conventions:
//! - **States** are labelled with their names; the shape depends on the kind
//!   (accepting states are double circles, violating states are octagons)
//! - **Transitions** are labelled with their guard, followed by assertions
//!   and, optionally, actions
//! - The **initial state** is marked by an arrow from an invisible point
//! - The predefined **error sink** is only drawn when some transition can
//!   reach it
//!
//! # Examples
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
//! let dot = automaton.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph \"NoError\" {"));
//! ```

use crate::automaton::{Automaton, AutomatonState, StateKind, Transition};

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
///
/// ```
/// use guard_automaton::dot::DotConfig;
///
/// let config = DotConfig {
///     show_actions: false,
///     ..DotConfig::default()
/// };
/// assert_eq!(config.accepting_shape, "doublecircle");
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for initial and intermediate states (default: "circle")
    pub state_shape: &'static str,
    /// Shape for accepting states (default: "doublecircle")
    pub accepting_shape: &'static str,
    /// Shape for violating states (default: "octagon")
    pub violating_shape: &'static str,
    /// Style for transitions (default: "solid")
    pub transition_style: &'static str,
    /// Style for transitions that carry assertions (default: "dashed")
    pub asserting_style: &'static str,
    /// Graph layout direction (default: "LR")
    pub rank_dir: &'static str,
    /// Whether to append actions to transition labels (default: true)
    pub show_actions: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            state_shape: "circle",
            accepting_shape: "doublecircle",
            violating_shape: "octagon",
            transition_style: "solid",
            asserting_style: "dashed",
            rank_dir: "LR",
            show_actions: true,
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn transition_label(transition: &Transition, config: &DotConfig) -> String {
    let mut label = transition.guard.to_string();
    for assertion in &transition.assertions {
        label.push_str("\nASSERT ");
        label.push_str(&assertion.to_string());
    }
    if config.show_actions {
        for action in &transition.actions {
            label.push_str("\nDO ");
            label.push_str(&action.to_string());
        }
    }
    escape(&label)
}

impl Automaton {
    /// Converts the automaton to DOT (Graphviz) format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the automaton to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        use std::fmt::Write as _;

        let error = self.error_state();
        let error_reachable = self
            .states()
            .flat_map(|s| s.transitions())
            .any(|t| t.target == error || !t.assertions.is_empty());
        let drawn = |s: &&AutomatonState| s.id() != error || error_reachable;

        let mut dot = String::new();
        writeln!(dot, "digraph \"{}\" {{", escape(self.name()))?;
        writeln!(dot, "rankdir={};", config.rank_dir)?;
        writeln!(dot, "__start [shape=point];")?;

        for state in self.states().filter(drawn) {
            let shape = match state.kind() {
                StateKind::Accepting => config.accepting_shape,
                StateKind::Violating => config.violating_shape,
                StateKind::Initial | StateKind::Intermediate => config.state_shape,
            };
            writeln!(dot, "{} [shape={}, label=\"{}\"];", state.id(), shape, escape(state.name()))?;
        }
        writeln!(dot, "__start -> {};", self.initial_state())?;

        for state in self.states().filter(drawn) {
            for transition in state.transitions() {
                let style = if transition.assertions.is_empty() {
                    config.transition_style
                } else {
                    config.asserting_style
                };
                writeln!(
                    dot,
                    "{} -> {} [style={}, label=\"{}\"];",
                    state.id(),
                    transition.target,
                    style,
                    transition_label(transition, config)
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    use crate::automaton::{Action, AutomatonBuilder};
    use crate::expr::BoolExpr;
    use crate::int_expr::IntExpr;

    fn sample() -> Automaton {
        let mut builder = AutomatonBuilder::new("Sample");
        let init = builder.add_state("Init", StateKind::Initial);
        let done = builder.add_state("Done", StateKind::Accepting);
        builder.add_transition(
            init,
            Transition::new(BoolExpr::edge_exact("x = 1;"), done)
                .with_action(Action::assign("n", IntExpr::constant(1))),
        );
        builder.build().unwrap()
    }

    #[test]
    fn test_to_dot_basic() {
        let dot = sample().to_dot().unwrap();
        assert!(dot.starts_with("digraph \"Sample\" {"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains("q1 [shape=circle, label=\"Init\"];"));
        assert!(dot.contains("q2 [shape=doublecircle, label=\"Done\"];"));
        assert!(dot.contains("__start -> q1;"));
        assert!(dot.contains("q1 -> q2 [style=solid, label=\"MATCH \\\"x = 1;\\\"\\nDO n = 1\"];"));
        // Nothing reaches the error sink.
        assert!(!dot.contains("q0"));
    }

    #[test]
    fn test_to_dot_with_config() {
        let config = DotConfig {
            show_actions: false,
            rank_dir: "TB",
            ..DotConfig::default()
        };
        let dot = sample().to_dot_with_config(&config).unwrap();
        assert!(dot.contains("rankdir=TB;"));
        assert!(!dot.contains("DO n = 1"));
    }

    #[test]
    fn test_to_dot_draws_error_sink_for_assertions() {
        let mut builder = AutomatonBuilder::new("A");
        let init = builder.add_state("Init", StateKind::Initial);
        builder.add_transition(init, Transition::new(BoolExpr::True, init).with_assertion(BoolExpr::AssumeEdge));
        let dot = builder.build().unwrap().to_dot().unwrap();
        assert!(dot.contains("q0 [shape=octagon"));
        assert!(dot.contains("style=dashed"));
    }
}
