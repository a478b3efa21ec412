//! Command-line interface for the strex explicit-state checker.

mod models;

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::Diagnostic;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use strex_mc::{
    CheckConfig, CheckOutcome, Invariant, ProgressCounters, SimulateOutcome, Trace,
    TransitionRelation, Verifier,
};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("check error: {message}")]
    #[diagnostic(code(strex::check_error))]
    CheckError { message: String },

    #[error("invalid argument: {message}")]
    #[diagnostic(code(strex::invalid_argument), help("see `strex --help`"))]
    InvalidArgument { message: String },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "strex", version)]
#[command(about = "Explicit-state reachability and invariant checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Model {
    /// Two processes sharing a critical section
    AliceBob,
    /// Integer that is negated or decremented while positive
    Counter,
    /// 8/5/3 litre water jug puzzle
    Jugs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    /// Enter the critical section unconditionally
    Simple,
    /// Wait until the other process leaves the critical section
    Waiting,
}

#[derive(Args)]
struct ModelArgs {
    /// Built-in model to explore
    #[arg(value_enum)]
    model: Model,

    /// Protocol variant for alice-bob
    #[arg(long, value_enum, default_value = "waiting")]
    variant: Variant,

    /// Starting value for counter
    #[arg(long, default_value = "3", allow_negative_numbers = true)]
    start: i64,

    /// Litres the big jug must never hold, for jugs
    #[arg(long, default_value = "4")]
    target: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore every reachable configuration of a model
    Check {
        #[command(flatten)]
        model: ModelArgs,

        /// Maximum number of states to explore (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_states: usize,

        /// Maximum depth to explore (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_depth: usize,

        /// Maximum time in seconds (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_time: u64,

        /// Maximum memory usage in MB (0 = unlimited)
        #[arg(long, default_value = "0")]
        memory_limit: usize,

        /// Disable deadlock checking
        #[arg(long)]
        no_deadlock: bool,

        /// Disable parallel exploration
        #[arg(long)]
        no_parallel: bool,

        /// Number of threads for parallel exploration (0 = use all available)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Show debug logging and periodic progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Follow one random path through a model
    Simulate {
        #[command(flatten)]
        model: ModelArgs,

        /// Maximum number of steps
        #[arg(long, default_value = "20")]
        steps: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(
        &cli.command,
        Commands::Check { verbose: true, .. } | Commands::Simulate { verbose: true, .. }
    ) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Check {
            model,
            max_states,
            max_depth,
            max_time,
            memory_limit,
            no_deadlock,
            no_parallel,
            threads,
            verbose,
        } => {
            let config = CheckConfig {
                check_deadlock: !no_deadlock,
                max_states,
                max_depth,
                memory_limit_mb: memory_limit,
                max_time_secs: max_time,
                parallel: !no_parallel,
                num_threads: threads,
                progress: verbose.then(|| Arc::new(ProgressCounters::new())),
            };
            cmd_check(&model, config)
        }
        Commands::Simulate {
            model, steps, seed, ..
        } => cmd_simulate(&model, steps, seed),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn cmd_check(args: &ModelArgs, config: CheckConfig) -> CliResult<()> {
    match args.model {
        Model::AliceBob => {
            let (relation, invariants) = models::alice_bob(args.variant == Variant::Waiting);
            run_check(&relation, &invariants, config)
        }
        Model::Counter => {
            let (relation, invariants) = models::signed(args.start);
            run_check(&relation, &invariants, config)
        }
        Model::Jugs => {
            check_jug_target(args.target)?;
            let (relation, invariants) = models::jugs(args.target);
            run_check(&relation, &invariants, config)
        }
    }
}

fn cmd_simulate(args: &ModelArgs, steps: usize, seed: u64) -> CliResult<()> {
    let verifier = Verifier::default();
    match args.model {
        Model::AliceBob => {
            let (relation, invariants) = models::alice_bob(args.variant == Variant::Waiting);
            run_simulate(&verifier, &relation, &invariants, steps, seed)
        }
        Model::Counter => {
            let (relation, invariants) = models::signed(args.start);
            run_simulate(&verifier, &relation, &invariants, steps, seed)
        }
        Model::Jugs => {
            check_jug_target(args.target)?;
            let (relation, invariants) = models::jugs(args.target);
            run_simulate(&verifier, &relation, &invariants, steps, seed)
        }
    }
}

fn check_jug_target(target: u8) -> CliResult<()> {
    if target > 8 {
        return Err(CliError::InvalidArgument {
            message: format!("jug target {} exceeds the 8 litre capacity", target),
        });
    }
    Ok(())
}

/// Periodically log progress counters until `done` is set.
fn spawn_reporter(
    progress: Arc<ProgressCounters>,
    done: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !done.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(200));
            debug!(
                "progress: {} states, {} checked, depth {}, queue {}",
                progress.states.load(Ordering::Relaxed),
                progress.checked.load(Ordering::Relaxed),
                progress.depth.load(Ordering::Relaxed),
                progress.queue_len.load(Ordering::Relaxed),
            );
        }
    })
}

fn run_check<R>(
    relation: &R,
    invariants: &[Invariant<R::Config>],
    config: CheckConfig,
) -> CliResult<()>
where
    R: TransitionRelation + Sync,
    R::Config: Display,
    R::Action: Display,
{
    let done = Arc::new(AtomicBool::new(false));
    let reporter = config
        .progress
        .as_ref()
        .map(|p| spawn_reporter(Arc::clone(p), Arc::clone(&done)));

    info!("model checking...");
    let start = Instant::now();
    let result = Verifier::new(config).check_model(relation, invariants);
    let elapsed = start.elapsed();

    done.store(true, Ordering::Relaxed);
    if let Some(handle) = reporter {
        handle.join().ok();
    }

    let outcome = result.map_err(|e| CliError::CheckError {
        message: e.to_string(),
    })?;

    println!();
    match outcome {
        CheckOutcome::Ok {
            states_explored,
            max_depth,
        } => {
            println!("Result: OK");
            println!("  States explored: {}", states_explored);
            println!("  Max depth: {}", max_depth);
            println!("  Time: {:.2}s", elapsed.as_secs_f64());
        }
        CheckOutcome::InvariantViolation { invariant, trace } => {
            println!("Result: INVARIANT VIOLATION");
            println!("  Invariant: {}", invariant);
            print_trace(&trace);
            std::process::exit(1);
        }
        CheckOutcome::Deadlock { trace } => {
            println!("Result: DEADLOCK");
            print_trace(&trace);
            std::process::exit(1);
        }
        CheckOutcome::StateLimitReached {
            states_explored,
            max_depth,
        } => {
            println!("Result: STATE LIMIT REACHED");
            print_partial(states_explored, max_depth, elapsed);
            std::process::exit(2);
        }
        CheckOutcome::DepthLimitReached {
            states_explored,
            max_depth,
        } => {
            println!("Result: DEPTH LIMIT REACHED");
            print_partial(states_explored, max_depth, elapsed);
            std::process::exit(2);
        }
        CheckOutcome::TimeLimitReached {
            states_explored,
            max_depth,
        } => {
            println!("Result: TIME LIMIT REACHED");
            print_partial(states_explored, max_depth, elapsed);
            std::process::exit(2);
        }
        CheckOutcome::MemoryLimitReached {
            states_explored,
            max_depth,
            memory_mb,
        } => {
            println!("Result: MEMORY LIMIT REACHED");
            println!("  Memory usage: {} MB", memory_mb);
            print_partial(states_explored, max_depth, elapsed);
            std::process::exit(2);
        }
        CheckOutcome::Stopped {
            states_explored,
            max_depth,
        } => {
            println!("Result: STOPPED");
            print_partial(states_explored, max_depth, elapsed);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn run_simulate<R>(
    verifier: &Verifier,
    relation: &R,
    invariants: &[Invariant<R::Config>],
    steps: usize,
    seed: u64,
) -> CliResult<()>
where
    R: TransitionRelation,
    R::Config: Display,
    R::Action: Display,
{
    info!("simulating {} steps with seed {}...", steps, seed);
    let outcome = verifier
        .simulate(relation, invariants, steps, seed)
        .map_err(|e| CliError::CheckError {
            message: e.to_string(),
        })?;

    println!();
    match &outcome {
        SimulateOutcome::Ok { steps, .. } => println!("Result: OK ({} steps)", steps),
        SimulateOutcome::InvariantViolation { invariant, .. } => {
            println!("Result: INVARIANT VIOLATION");
            println!("  Invariant: {}", invariant);
        }
        SimulateOutcome::Deadlock { .. } => println!("Result: DEADLOCK"),
    }
    print_trace(outcome.trace());

    if !matches!(outcome, SimulateOutcome::Ok { .. }) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_trace<C: Display, A: Display>(trace: &Trace<C, A>) {
    println!("  Trace ({} steps):", trace.len());
    for (i, (config, action)) in trace.iter().enumerate() {
        let action_str = action
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "init".to_string());
        println!("    {}: {} -> {}", i, action_str, config);
    }
}

fn print_partial(states_explored: usize, max_depth: usize, elapsed: Duration) {
    println!("  States explored: {}", states_explored);
    println!("  Max depth: {}", max_depth);
    println!("  Time: {:.2}s", elapsed.as_secs_f64());
}
