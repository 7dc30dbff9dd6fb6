//! Uncertain-graph core decomposition CLI.
//!
//! Provides the `ucore` binary. Every subcommand reads a weighted edge list,
//! runs one operation and prints the result as JSON on stdout. Logs go to
//! stderr so the JSON stays machine-readable.

use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use ucore_core::{
    build_core_forests, build_index, update_index, CoreConfig, CoreError, EdgeChange,
    ThresholdIndex, UncertainGraph, VertexId,
};
use ucore_service::{QueryService, ServiceConfig, ServiceError, Submission, TaskStatus};
use ucore_storage::{read_edge_list, Direction, Perturber, StorageError};

/// Tolerance used when comparing an incrementally maintained index with a
/// fresh build.
const AGREEMENT_TOLERANCE: f64 = 1e-6;

/// (k, eta)-core decomposition of uncertain graphs.
#[derive(Parser)]
#[command(name = "ucore", about = "(k, eta)-core decomposition of uncertain graphs")]
struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every vertex's threshold sequence.
    Decompose {
        /// Edge-list file: one `u v weight` triple per line.
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the core forests as nested JSON.
    Tree {
        #[arg(short, long)]
        input: PathBuf,

        /// Only print the forest for this order.
        #[arg(long)]
        order: Option<usize>,
    },

    /// Change one edge probability and print the maintenance report.
    Update {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long)]
        u: usize,

        #[arg(long)]
        v: usize,

        /// New probability in [0, 1]. Zero removes the edge.
        #[arg(short, long)]
        probability: f64,
    },

    /// Find the (k, eta)-core through the query service.
    Query {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short)]
        k: usize,

        #[arg(long)]
        eta: f64,
    },

    /// Apply random edge changes, checking incremental maintenance against
    /// full rebuilds.
    Perturb {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value_t = 10)]
        rounds: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Lower probabilities instead of raising them.
        #[arg(long)]
        decrease: bool,
    },
}

/// A failed command, carrying the exit code it maps to.
enum Failure {
    /// Bad input file or unreadable path (exit 3).
    Input(String),
    /// The computation itself failed (exit 1).
    Compute(String),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Failure::Compute(_) => 1,
            Failure::Input(_) => 3,
        }
    }

    fn message(&self) -> &str {
        match self {
            Failure::Compute(m) | Failure::Input(m) => m,
        }
    }
}

impl From<StorageError> for Failure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(_) | StorageError::Parse { .. } => Failure::Input(err.to_string()),
            other => Failure::Compute(other.to_string()),
        }
    }
}

impl From<CoreError> for Failure {
    fn from(err: CoreError) -> Self {
        Failure::Compute(err.to_string())
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        Failure::Compute(err.to_string())
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match cli.command {
        Commands::Decompose { input } => run_decompose(&input),
        Commands::Tree { input, order } => run_tree(&input, order),
        Commands::Update {
            input,
            u,
            v,
            probability,
        } => run_update(&input, u, v, probability),
        Commands::Query { input, k, eta } => run_query(&input, k, eta),
        Commands::Perturb {
            input,
            rounds,
            seed,
            decrease,
        } => run_perturb(&input, rounds, seed, decrease),
    };

    let code = match outcome {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(failure) => {
            eprintln!("Error: {}", failure.message());
            failure.exit_code()
        }
    };
    process::exit(code);
}

fn load(input: &Path) -> Result<UncertainGraph, Failure> {
    read_edge_list(input).map_err(|e| {
        Failure::Input(format!("failed to read '{}': {}", input.display(), e))
    })
}

fn to_json(value: &impl Serialize) -> Result<String, Failure> {
    serde_json::to_string_pretty(value)
        .map_err(|e| Failure::Compute(format!("failed to serialize result: {e}")))
}

fn run_decompose(input: &Path) -> Result<String, Failure> {
    let graph = load(input)?;
    let index = build_index(&graph, &CoreConfig::default())?;
    to_json(&index)
}

fn run_tree(input: &Path, order: Option<usize>) -> Result<String, Failure> {
    let graph = load(input)?;
    let forests = build_core_forests(&graph)?;
    let views = forests
        .values()
        .filter(|forest| order.map_or(true, |k| forest.order() == k))
        .map(|forest| forest.view())
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(k) = order {
        if views.is_empty() {
            let max = forests.keys().next_back().copied().unwrap_or(0);
            return Err(Failure::Compute(format!(
                "no forest of order {k}; the graph's largest core order is {max}"
            )));
        }
    }
    to_json(&views)
}

fn run_update(input: &Path, u: usize, v: usize, probability: f64) -> Result<String, Failure> {
    let graph = load(input)?;
    let config = CoreConfig::default();
    let index = build_index(&graph, &config)?;
    let change = EdgeChange::new(VertexId::from(u), VertexId::from(v), probability);
    let outcome = update_index(&graph, &index, &change, &config)?;
    to_json(&outcome)
}

fn run_query(input: &Path, k: usize, eta: f64) -> Result<String, Failure> {
    let graph = load(input)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Failure::Compute(format!("failed to start runtime: {e}")))?;

    runtime.block_on(async {
        let service = QueryService::in_memory(ServiceConfig::from_env());
        let name = input.display().to_string();
        let graph_id = service.add_graph(&name, graph).await?;
        let result = match service.submit_query(graph_id, k, eta).await? {
            Submission::Cached { result } => result,
            Submission::Pending { task_id } => match service.wait(task_id).await? {
                TaskStatus::Success { result } => result,
                TaskStatus::Failed { error } => return Err(Failure::Compute(error)),
                TaskStatus::Pending => {
                    return Err(Failure::Compute(format!("task {task_id} never finished")))
                }
            },
        };
        to_json(&result)
    })
}

#[derive(Serialize)]
struct PerturbRound {
    round: usize,
    change: EdgeChange,
    incremental_ms: f64,
    rebuild_ms: f64,
    agrees: bool,
}

#[derive(Serialize)]
struct PerturbReport {
    seed: u64,
    direction: Direction,
    rounds: Vec<PerturbRound>,
    all_agree: bool,
}

fn run_perturb(input: &Path, rounds: usize, seed: u64, decrease: bool) -> Result<String, Failure> {
    let mut graph = load(input)?;
    let config = CoreConfig::default();
    let direction = if decrease {
        Direction::Decrease
    } else {
        Direction::Increase
    };
    let mut perturber = Perturber::new(seed);
    let mut index = build_index(&graph, &config)?;
    let mut report = Vec::with_capacity(rounds);

    for round in 0..rounds {
        let change = perturber.next_change(&graph, direction)?;

        let start = Instant::now();
        let outcome = update_index(&graph, &index, &change, &config)?;
        let incremental_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let rebuilt = build_index(&outcome.graph, &config)?;
        let rebuild_ms = start.elapsed().as_secs_f64() * 1000.0;

        let agrees = indexes_agree(&outcome.index, &rebuilt);
        if !agrees {
            tracing::warn!(round, ?change, "incremental index diverged from rebuild");
        }
        report.push(PerturbRound {
            round,
            change,
            incremental_ms,
            rebuild_ms,
            agrees,
        });
        graph = outcome.graph;
        index = outcome.index;
    }

    let all_agree = report.iter().all(|r| r.agrees);
    to_json(&PerturbReport {
        seed,
        direction,
        rounds: report,
        all_agree,
    })
}

fn indexes_agree(a: &ThresholdIndex, b: &ThresholdIndex) -> bool {
    a.vertex_count() == b.vertex_count()
        && a.sequences().iter().zip(b.sequences()).all(|(x, y)| {
            x.len() == y.len()
                && x
                    .iter()
                    .zip(y)
                    .all(|(p, q)| (p - q).abs() <= AGREEMENT_TOLERANCE)
        })
}
