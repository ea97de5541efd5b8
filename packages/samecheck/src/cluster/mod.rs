//! Cluster runtime: N cooperating hosts checking a graph pair.
//!
//! The orchestrator owns every host's context explicitly: network
//! endpoint, abort signal, options. Hosts run on their own OS threads and
//! talk only through [`Network`]. The job outcome is all-or-nothing: if any
//! host fails, `run_*` returns the root-cause error, never a partial pass.
//!
//! ```text
//! host i:  prepare shards ──► barrier(Loaded) ──► compare ──► gather outcomes
//!              │                   ▲                 │             ▲
//!              └── failure ──► broadcast Abort ──────┴─────────────┘
//! ```

mod host;
pub mod link;
pub mod network;

pub use link::HostLink;
pub use network::{LocalNetwork, Message, Network, Phase};

use std::thread;

use crate::abort::{AbortCause, AbortSignal};
use crate::compare::{CompareOptions, Comparator};
use crate::config::CheckConfig;
use crate::error::{CheckError, Result};
use crate::graph::{GraphShard, PartitionMap, PartitionedGraph, ShardBuilder};
use crate::loader::EdgeList;
use crate::resource::ResourceManager;
use crate::stats::{CheckReport, CheckStats, HostReport, StatsSnapshot};
use crate::types::{EdgeWeight, HostId, Weight};

use self::host::HostContext;

// ── Interrupts ─────────────────────────────────────────────────────

/// Trips every host's abort signal, e.g. from a SIGINT handler.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    signals: Vec<AbortSignal>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        for (i, signal) in self.signals.iter().enumerate() {
            signal.trip(AbortCause {
                host: HostId(i as u32),
                error: CheckError::Interrupted,
            });
        }
    }
}

// ── Cluster ────────────────────────────────────────────────────────

/// One check run over `num_hosts` in-process hosts. Single use: abort
/// signals are terminal.
pub struct Cluster {
    signals: Vec<AbortSignal>,
}

impl Cluster {
    pub fn new(num_hosts: u32) -> Result<Self> {
        if num_hosts == 0 {
            return Err(CheckError::InvalidConfig("num_hosts must be > 0".to_string()));
        }
        Ok(Self {
            signals: (0..num_hosts).map(|_| AbortSignal::new()).collect(),
        })
    }

    pub fn num_hosts(&self) -> u32 {
        self.signals.len() as u32
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            signals: self.signals.clone(),
        }
    }

    /// Every host loads both graph files, keeps its own shard of each and
    /// checks it.
    pub fn run_files(self, config: &CheckConfig) -> Result<CheckReport> {
        config.validate()?;
        if config.num_hosts != self.num_hosts() {
            return Err(CheckError::InvalidConfig(format!(
                "config asks for {} hosts, cluster has {}",
                config.num_hosts,
                self.num_hosts()
            )));
        }
        let threads = config
            .threads_per_host
            .unwrap_or_else(|| ResourceManager::auto_tune(config.num_hosts).threads_per_host);

        tracing::info!(
            graph = %config.graph.display(),
            other = %config.other_graph.display(),
            hosts = config.num_hosts,
            threads_per_host = threads,
            "starting check"
        );

        let prepares = (0..self.num_hosts())
            .map(|h| {
                let config = config.clone();
                move || load_host_shards(&config, HostId(h))
            })
            .collect();
        self.run_hosts(config.compare, threads, prepares)
    }

    /// Check prebuilt shards: `a[i]` and `b[i]` belong to host `i`.
    pub fn run_shards<W: EdgeWeight>(
        self,
        a: Vec<PartitionedGraph<W>>,
        b: Vec<PartitionedGraph<W>>,
        options: CompareOptions,
        threads_per_host: usize,
    ) -> Result<CheckReport> {
        let n = self.num_hosts() as usize;
        if a.len() != n || b.len() != n {
            return Err(CheckError::InvalidConfig(format!(
                "expected {n} shards per graph, got {} and {}",
                a.len(),
                b.len()
            )));
        }
        for (i, (sa, sb)) in a.iter().zip(&b).enumerate() {
            if sa.host_id().index() != i || sb.host_id().index() != i {
                return Err(CheckError::InvalidConfig(format!(
                    "shard at position {i} belongs to hosts {} and {}",
                    sa.host_id(),
                    sb.host_id()
                )));
            }
        }

        let prepares = a
            .into_iter()
            .zip(b)
            .map(|pair| move || Ok(pair))
            .collect();
        self.run_hosts(options, threads_per_host.max(1), prepares)
    }

    fn run_hosts<W, P>(self, options: CompareOptions, threads: usize, prepares: Vec<P>) -> Result<CheckReport>
    where
        W: EdgeWeight,
        P: FnOnce() -> Result<(PartitionedGraph<W>, PartitionedGraph<W>)> + Send,
    {
        let networks = LocalNetwork::cluster(self.num_hosts());

        let results: Vec<Result<HostReport>> = thread::scope(|s| {
            let handles: Vec<_> = networks
                .into_iter()
                .zip(self.signals.iter().cloned())
                .zip(prepares)
                .map(|((net, signal), prepare)| {
                    let host = net.host_id();
                    let ctx = HostContext {
                        link: HostLink::new(net),
                        signal,
                        options,
                        threads,
                    };
                    let spawned = thread::Builder::new()
                        .name(format!("host-{}", host.0))
                        .spawn_scoped(s, move || ctx.run(prepare));
                    (host, spawned)
                })
                .collect();

            handles
                .into_iter()
                .map(|(host, spawned)| match spawned {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(CheckError::Network(format!("host {host} panicked")))),
                    Err(e) => Err(CheckError::Network(format!("cannot start host {host}: {e}"))),
                })
                .collect()
        });

        settle(results)
    }
}

// ── Entry points ───────────────────────────────────────────────────

/// Validate `config`, then run it on a fresh in-process cluster.
pub fn run_check(config: &CheckConfig) -> Result<CheckReport> {
    config.validate()?;
    Cluster::new(config.num_hosts)?.run_files(config)
}

/// Check one pair of shards on the current rayon pool, without a network.
/// Useful when the caller already holds both shards of a single host.
pub fn check_shards<A, B>(a: &A, b: &B, options: CompareOptions) -> Result<StatsSnapshot>
where
    A: GraphShard,
    B: GraphShard<Weight = A::Weight>,
{
    let signal = AbortSignal::new();
    let stats = CheckStats::default();
    Comparator::new(a, b, options, &signal, &stats).run()?;
    Ok(stats.snapshot())
}

/// Load both graphs and cut out `host`'s shard of each. Both are cut with
/// one partition map over the larger node count, so a node has the same
/// owner in A and B whatever the host count.
fn load_host_shards(
    config: &CheckConfig,
    host: HostId,
) -> Result<(PartitionedGraph<Weight>, PartitionedGraph<Weight>)> {
    let a = EdgeList::load(&config.graph)?;
    let b = EdgeList::load(&config.other_graph)?;
    tracing::debug!(
        host = host.0,
        nodes_a = a.num_nodes(),
        edges_a = a.num_edges(),
        nodes_b = b.num_nodes(),
        edges_b = b.num_edges(),
        "graphs read"
    );

    let num_nodes = a.num_nodes().max(b.num_nodes());
    let builder = ShardBuilder::new(PartitionMap::new(config.partition, num_nodes, config.num_hosts)?);
    Ok((builder.build(&a, host)?, builder.build(&b, host)?))
}

/// Job outcome from per-host results. A failure anywhere fails the job;
/// the reported error is the smallest root cause, falling back to the
/// first echo (`Aborted`) if no host kept one.
fn settle(results: Vec<Result<HostReport>>) -> Result<CheckReport> {
    let mut hosts = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(report) => hosts.push(report),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        return Ok(CheckReport { hosts });
    }
    let root = errors
        .iter()
        .filter(|e| e.is_root_cause())
        .min_by_key(|e| e.sort_key())
        .cloned();
    Err(root.unwrap_or_else(|| errors.swap_remove(0)))
}
