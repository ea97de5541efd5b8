//! samecheck - verify that every edge of one graph exists in another
//!
//! Usage:
//!   samecheck <graph> <other-graph> [--hosts N] [--partition blocked|modulo]
//!             [--strategy linear|indexed|auto] [--index-threshold N]
//!             [--collect-all LIMIT] [--deterministic] [--threads N]
//!             [--config check.json] [--report-json]
//!
//! Exit status: 0 when every edge was found, 1 on a mismatch or
//! partition incongruence, 2 when the check could not run to completion
//! (bad config, unreadable graph, interrupt).

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use samecheck::resource::ResourceManager;
use samecheck::{CheckConfig, CheckError, CheckReport, Cluster, FailurePolicy, MatchStrategy, PartitionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Linear,
    Indexed,
    Auto,
}

#[derive(Parser, Debug)]
#[command(version, about = "Check that every edge of a graph exists with the same weight in another graph")]
struct Cli {
    /// Graph whose edges must all be present (.gr or text edge list)
    graph: Option<PathBuf>,

    /// Graph searched for those edges
    other_graph: Option<PathBuf>,

    /// JSON config file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of cooperating hosts
    #[arg(long)]
    hosts: Option<u32>,

    /// Node-to-host assignment used for both graphs
    #[arg(long)]
    partition: Option<PartitionPolicy>,

    /// How each node's edges are searched in the other graph
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Degree at which the auto strategy switches to a hash index
    #[arg(long)]
    index_threshold: Option<usize>,

    /// Keep going after a failure and report up to LIMIT of them
    #[arg(long, value_name = "LIMIT")]
    collect_all: Option<usize>,

    /// Report the smallest failing edge instead of the first one found
    #[arg(long)]
    deterministic: bool,

    /// Worker threads per host (default: CPUs / hosts)
    #[arg(long)]
    threads: Option<usize>,

    /// Print the per-host report as JSON on success
    #[arg(long)]
    report_json: bool,
}

impl Cli {
    fn into_config(self) -> Result<CheckConfig> {
        let mut config = match &self.config {
            Some(path) => CheckConfig::read_from(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => CheckConfig::default(),
        };

        if let Some(graph) = self.graph {
            config.graph = graph;
        }
        if let Some(other) = self.other_graph {
            config.other_graph = other;
        }
        if let Some(hosts) = self.hosts {
            config.num_hosts = hosts;
        }
        if let Some(partition) = self.partition {
            config.partition = partition;
        }
        if let Some(threads) = self.threads {
            config.threads_per_host = Some(threads);
        }
        if let Some(limit) = self.collect_all {
            config.compare.failure_policy = FailurePolicy::CollectAll { limit };
        }
        if self.deterministic {
            config.compare.deterministic = true;
        }

        config.compare.strategy = match (self.strategy, self.index_threshold) {
            (Some(StrategyArg::Linear), _) => MatchStrategy::Linear,
            (Some(StrategyArg::Indexed), _) => MatchStrategy::Indexed,
            (Some(StrategyArg::Auto), Some(threshold)) | (None, Some(threshold)) => {
                MatchStrategy::Auto { threshold }
            }
            (Some(StrategyArg::Auto), None) => MatchStrategy::Auto {
                threshold: ResourceManager::auto_tune(config.num_hosts).index_threshold,
            },
            (None, None) => config.compare.strategy,
        };

        config.validate()?;
        Ok(config)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

/// Run the check, turning SIGINT/SIGTERM into a cluster-wide interrupt.
fn check(config: &CheckConfig) -> Result<CheckReport> {
    let cluster = Cluster::new(config.num_hosts)?;

    let handle = cluster.interrupt_handle();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ])
    .context("registering signal handlers")?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                tracing::warn!(signal = sig, "interrupt received, aborting all hosts");
                handle.interrupt();
            }
        })
        .context("starting signal thread")?;

    Ok(cluster.run_files(config)?)
}

fn report_failure(err: &CheckError) {
    match err {
        CheckError::Multiple(failures) => {
            eprintln!("{} failures:", failures.len());
            for failure in failures {
                eprintln!("  [{}] {}", failure.code(), failure);
            }
        }
        other => eprintln!("[{}] {}", other.code(), other),
    }
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let report_json = cli.report_json;
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match check(&config) {
        Ok(report) => {
            println!(
                "All edges found: {} nodes, {} edges checked on {} hosts in {} ms",
                report.total_nodes_visited(),
                report.total_edges_checked(),
                report.hosts.len(),
                report.check_ms()
            );
            if report_json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => tracing::warn!("cannot serialise report: {}", e),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => match e.downcast_ref::<CheckError>() {
            Some(err) => {
                report_failure(err);
                if err.is_check_failure() {
                    ExitCode::from(1)
                } else {
                    ExitCode::from(2)
                }
            }
            None => {
                eprintln!("Error: {e:#}");
                ExitCode::from(2)
            }
        },
    }
}
