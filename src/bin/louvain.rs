//! CLI driver for the Louvain engine (spec.md §6).
//!
//! Loads a graph, runs one phase of the engine, and reports the final
//! modularity and (optionally) the cluster assignment. The heavy lifting —
//! worklists, the engine itself — lives in the library; this binary is
//! intentionally thin, matching spec.md §1's framing of CLI parsing and
//! graph ingestion as external collaborators.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use louvain_worklist::config::{Algorithm, LouvainConfig, DEFAULT_C_THRESHOLD, DEFAULT_MIN_GRAPH_SIZE};
use louvain_worklist::{driver, io, LouvainError};

/// Chunked work-stealing worklists driving a parallel Louvain
/// community-detection engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input graph file (whitespace-separated edge list; see io.rs).
    graph: PathBuf,

    /// Community-detection algorithm. Only "Naive" is meaningful.
    #[arg(long = "algo", default_value = "naive")]
    algo: String,

    /// Run the vertex-following preprocessor before the main loop.
    #[arg(long = "enable-vf", default_value_t = false)]
    enable_vf: bool,

    /// Modularity-gain convergence threshold.
    #[arg(long = "c-threshold", default_value_t = DEFAULT_C_THRESHOLD)]
    c_threshold: f64,

    /// Worker thread count; defaults to available parallelism.
    #[arg(long = "workers")]
    workers: Option<usize>,

    /// Multi-phase driver knob: below this vertex count, contraction would
    /// stop (unused in this single-phase build; plumbed for forward
    /// compatibility, see spec.md §9).
    #[arg(long = "min-graph-size", default_value_t = DEFAULT_MIN_GRAPH_SIZE)]
    min_graph_size: usize,

    /// If given, writes `vertex community` pairs to this path; otherwise
    /// only the final modularity and community count are logged.
    #[arg(long = "output")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(LouvainError::Input(msg)) => {
            error!(%msg, "input error");
            ExitCode::from(1)
        }
        Err(LouvainError::Invariant(msg)) => {
            error!(%msg, "invariant violation");
            ExitCode::from(2)
        }
        Err(LouvainError::Capacity { requested, available }) => {
            error!(requested, available, "community table capacity exceeded");
            ExitCode::from(3)
        }
    }
}

fn run() -> Result<(), LouvainError> {
    let cli = Cli::parse();
    let algo: Algorithm = cli.algo.parse()?;

    let config = LouvainConfig {
        algo,
        enable_vf: cli.enable_vf,
        c_threshold: cli.c_threshold,
        min_graph_size: cli.min_graph_size,
        num_workers: cli.workers.unwrap_or_else(|| LouvainConfig::default().num_workers),
        ..LouvainConfig::default()
    };

    info!(graph = %cli.graph.display(), ?config.algo, config.enable_vf, config.c_threshold, "loading graph");
    let graph = io::load_graph(&cli.graph)?;
    info!(vertices = graph.node_count(), edges = graph.edge_count(), "graph loaded");

    let report = driver::run_louvain(&graph, &config)?;
    info!(
        final_q = report.final_q,
        iterations = report.iterations.len(),
        vf_followed = report.vf_followed,
        "converged"
    );

    if let Some(path) = cli.output {
        let mut out = String::new();
        for (v, c) in report.clusters.iter().enumerate() {
            match c {
                Some(c) => out.push_str(&format!("{v} {c}\n")),
                None => out.push_str(&format!("{v} -1\n")),
            }
        }
        std::fs::write(&path, out).map_err(|e| {
            LouvainError::Input(format!("writing output to {}: {e}", path.display()))
        })?;
        info!(output = %path.display(), "wrote cluster assignment");
    }

    Ok(())
}
