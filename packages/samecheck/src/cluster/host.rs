//! Lifecycle of one host: prepare shards, synchronise, compare, settle the
//! job outcome with the other hosts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crate::abort::{AbortSignal, Escalation};
use crate::cluster::link::HostLink;
use crate::cluster::network::{Network, Phase};
use crate::compare::{merge_failures, CompareOptions, Comparator};
use crate::error::{CheckError, Result};
use crate::graph::{GraphShard, PartitionedGraph};
use crate::stats::{CheckStats, HostReport};
use crate::types::{EdgeWeight, HostId};

/// Everything a host needs besides its shards.
pub(crate) struct HostContext<N: Network> {
    pub link: HostLink<N>,
    pub signal: AbortSignal,
    pub options: CompareOptions,
    pub threads: usize,
}

/// Trips the signal and tells peers if the host thread unwinds, so nobody
/// waits forever on a barrier it will never reach.
struct PanicGuard<'a, N: Network> {
    escalation: &'a Escalation<'a, N>,
}

impl<N: Network> Drop for PanicGuard<'_, N> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.escalation
                .raise(CheckError::Network("host thread panicked".to_string()));
        }
    }
}

impl<N: Network> HostContext<N> {
    /// Run one host. `prepare` produces this host's shards of A and B.
    pub fn run<W, F>(self, prepare: F) -> Result<HostReport>
    where
        W: EdgeWeight,
        F: FnOnce() -> Result<(PartitionedGraph<W>, PartitionedGraph<W>)>,
    {
        let me = self.link.host_id();
        let escalation = Escalation::new(&self.link, &self.signal);
        let _guard = PanicGuard {
            escalation: &escalation,
        };

        // ── Load ──────────────────────────────────────────────────
        let load_start = Instant::now();
        let (a, b) = prepare().map_err(|e| escalation.raise(e))?;
        let load_ms = load_start.elapsed().as_millis() as u64;
        tracing::debug!(
            host = me.0,
            masters = a.num_masters(),
            mirrors = a.num_mirrors(),
            edges = a.num_edges(),
            load_ms,
            "shards ready"
        );

        self.link
            .barrier(Phase::Loaded, &self.signal)
            .map_err(|e| escalation.raise(e))?;
        if me == HostId(0) {
            tracing::info!("Graphs loaded: beginning checking of all edges.");
        }

        // ── Compare ───────────────────────────────────────────────
        let check_start = Instant::now();
        let stats = CheckStats::default();
        let local = self.compare(&a, &b, &stats);
        let check_ms = check_start.elapsed().as_millis() as u64;

        // ── Settle ────────────────────────────────────────────────
        // Deferred check failures are exchanged with every peer; anything
        // else ends this host now and, if it started here, the whole job.
        let mine = match local {
            Ok(()) => None,
            Err(e) if e.is_check_failure() && self.options.defers_failures() => Some(e),
            Err(e) => return Err(escalation.raise(e)),
        };

        let outcomes = self
            .link
            .gather_outcomes(mine, &self.signal)
            .map_err(|e| escalation.raise(e))?;
        if let Some(failure) = merge_failures(outcomes.into_iter().flatten(), self.options.failure_policy) {
            if me == HostId(0) {
                tracing::error!(code = failure.code(), "{}", failure);
            }
            return Err(failure);
        }

        Ok(HostReport {
            host: me,
            masters: a.num_masters(),
            mirrors: a.num_mirrors(),
            local_edges: a.num_edges(),
            stats: stats.snapshot(),
            load_ms,
            check_ms,
        })
    }

    /// Run the comparator on a dedicated pool while a watcher relays peer
    /// aborts into the signal.
    fn compare<W: EdgeWeight>(
        &self,
        a: &PartitionedGraph<W>,
        b: &PartitionedGraph<W>,
        stats: &CheckStats,
    ) -> Result<()> {
        let me = a.host_id();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(move |i| format!("host{}-worker{}", me.0, i))
            .build()
            .map_err(|e| CheckError::InvalidConfig(format!("rayon pool: {e}")))?;

        let done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| self.link.watch(&self.signal, &done));
            let result = pool.install(|| Comparator::new(a, b, self.options, &self.signal, stats).run());
            done.store(true, Ordering::Release);
            result
        })
    }
}
