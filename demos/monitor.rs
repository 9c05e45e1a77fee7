use clap::Parser;

use guard_automaton::automaton::{Action, AutomatonBuilder, StateKind, Transition};
use guard_automaton::cfa::Cfa;
use guard_automaton::expr::BoolExpr;
use guard_automaton::int_expr::IntExpr;
use guard_automaton::location::FileLocation;
use guard_automaton::monitor::{Monitor, MonitorConfig};
use guard_automaton::query::{AbstractState, PropertyMapState};
use guard_automaton::types::{EdgeId, NodeId};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of lock/unlock rounds on the path.
    #[arg(value_name = "INT", default_value = "3")]
    rounds: usize,

    /// Forget the last `unlock`, then lock again.
    #[clap(long)]
    double_lock: bool,

    /// Provide a value-analysis state to answer queries.
    #[clap(long)]
    with_values: bool,

    /// Print the automaton in DOT format.
    #[clap(long)]
    dot: bool,

    /// Enable debug logging.
    #[clap(long)]
    debug: bool,
}

/// Build a straight-line path of `lock(m); x = x + 1; unlock(m);` rounds.
fn build_path(cfa: &mut Cfa, rounds: usize, double_lock: bool) -> color_eyre::Result<Vec<EdgeId>> {
    let mut path = Vec::new();
    let mut node = cfa.add_node("main");
    let mut line = 1;
    let mut step = |cfa: &mut Cfa, node: &mut NodeId, code: &str| -> color_eyre::Result<EdgeId> {
        let next = cfa.add_node("main");
        let edge = cfa.add_statement_edge(*node, next, code)?;
        cfa.add_location(edge, FileLocation::new("demo.c", line, line).with_tokens([line]));
        line += 1;
        *node = next;
        Ok(edge)
    };
    for round in 0..rounds {
        path.push(step(cfa, &mut node, "lock(m);")?);
        path.push(step(cfa, &mut node, "x = x + 1;")?);
        if !(double_lock && round + 1 == rounds) {
            path.push(step(cfa, &mut node, "unlock(m);")?);
        }
    }
    if double_lock {
        path.push(step(cfa, &mut node, "lock(m);")?);
    }
    let exit = cfa.add_label_node("main", "EXIT");
    path.push(cfa.add_blank_edge(node, exit, "return"));
    Ok(path)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.debug {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    println!("args = {:?}", args);

    let time_total = std::time::Instant::now();

    let mut cfa = Cfa::new();
    let path = build_path(&mut cfa, args.rounds, args.double_lock)?;
    println!("cfa: {} nodes, {} edges", cfa.num_nodes(), cfa.num_edges());

    let mut builder = AutomatonBuilder::new("Locking");
    builder.add_variable("rounds", 0);
    let unlocked = builder.add_state("Unlocked", StateKind::Initial);
    let locked = builder.add_state("Locked", StateKind::Intermediate);
    let done = builder.add_state("Done", StateKind::Accepting);
    let error = builder.add_state("DoubleLock", StateKind::Violating);
    builder.add_transition(
        unlocked,
        Transition::new(BoolExpr::call("lock($?)")?, locked)
            .with_action(Action::assign("rounds", IntExpr::plus(IntExpr::var("rounds"), IntExpr::constant(1))))
            .with_action(Action::log("round $$rounds")),
    );
    builder.add_transition(unlocked, Transition::new(BoolExpr::label("EXIT"), done));
    builder.add_transition(locked, Transition::new(BoolExpr::call("unlock($?)")?, unlocked));
    builder.add_transition(locked, Transition::new(BoolExpr::call("lock($?)")?, error));
    builder.add_transition(
        locked,
        Transition::new(BoolExpr::edge_regex("x = .*")?, locked)
            .with_assertion(BoolExpr::query_all("x >= 0")),
    );
    let automaton = builder.build()?;

    if args.dot {
        println!("{}", automaton.to_dot()?);
    }

    let values = PropertyMapState::new("ValueAnalysis").with("x >= 0", true);
    let states: Vec<&dyn AbstractState> = if args.with_values { vec![&values] } else { vec![] };

    let monitor = Monitor::with_config(&automaton, &cfa, MonitorConfig::default());
    let report = monitor.run(path, &states)?;

    println!("steps: {}", report.steps);
    for fired in &report.fired {
        println!(
            "  {} on {}: {} -> {}",
            fired.transition,
            fired.edge,
            automaton.state(fired.from).name(),
            automaton.state(fired.to).name()
        );
    }
    for diagnostic in &report.diagnostics {
        println!("warning: {}", diagnostic);
    }
    if report.dropped_diagnostics > 0 {
        println!("... and {} more warnings", report.dropped_diagnostics);
    }
    println!(
        "final state: {}, verdict: {}",
        automaton.state(report.final_state.current()).name(),
        report.verdict
    );

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
