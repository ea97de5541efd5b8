//! Data-parallel edge containment check over one host's shards.
//!
//! For every node mastered here in graph A, each outgoing edge
//! `(dst, weight)` must have an equal edge out of the same node in graph B.
//! The check is one-directional: edges present only in B are never
//! reported.
//!
//! Nodes are independent, so masters are spread over the current rayon
//! pool with no locking; both shards are only read. The abort signal is
//! polled before each node.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::abort::{AbortCause, AbortSignal};
use crate::error::{CheckError, Result};
use crate::graph::GraphShard;
use crate::stats::CheckStats;
use crate::translate::{IdTranslator, Resolution};
use crate::types::{GlobalId, LocalId};

/// B out-degree from which `Auto` switches to a per-node hash index.
pub const DEFAULT_INDEX_THRESHOLD: usize = 32;

// ── Options ────────────────────────────────────────────────────────

/// How B's edge list is searched for each edge of A. All strategies give
/// the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Scan B's list per edge: O(|EA| * |EB|) per node.
    Linear,
    /// Hash set of B's (dst, weight) built once per node: O(|EA| + |EB|).
    Indexed,
    /// Indexed when B's degree reaches `threshold`, linear below.
    Auto { threshold: usize },
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::Auto {
            threshold: DEFAULT_INDEX_THRESHOLD,
        }
    }
}

/// What to do on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the whole job at the first failure.
    #[default]
    FailFast,
    /// Keep checking and report up to `limit` failures at the end.
    CollectAll { limit: usize },
}

impl FailurePolicy {
    fn limit(self) -> usize {
        match self {
            FailurePolicy::FailFast => 1,
            FailurePolicy::CollectAll { limit } => limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub strategy: MatchStrategy,
    pub failure_policy: FailurePolicy,
    /// Visit every node and report the failure with the smallest
    /// (source, destination) instead of whichever a worker hit first.
    pub deterministic: bool,
}

impl CompareOptions {
    /// Whether failures are held back until every host has finished.
    pub fn defers_failures(&self) -> bool {
        self.deterministic || matches!(self.failure_policy, FailurePolicy::CollectAll { .. })
    }
}

/// Why a parallel pass stopped early.
enum Stop {
    /// The abort signal was tripped.
    Halted,
    /// Deferred failures, ready to be exchanged with peers.
    Failed(CheckError),
}

/// Combine failures into what a host (or the job) reports: sorted by
/// (source, destination), the first one under `FailFast`, up to `limit`
/// wrapped in `Multiple` under `CollectAll`. `Multiple` inputs are
/// flattened first.
pub fn merge_failures<I>(failures: I, policy: FailurePolicy) -> Option<CheckError>
where
    I: IntoIterator<Item = CheckError>,
{
    let mut all: Vec<CheckError> = failures
        .into_iter()
        .flat_map(|f| match f {
            CheckError::Multiple(inner) => inner,
            single => vec![single],
        })
        .collect();
    if all.is_empty() {
        return None;
    }
    all.sort_by_key(CheckError::sort_key);
    all.truncate(policy.limit());

    Some(match policy {
        FailurePolicy::FailFast => all.swap_remove(0),
        FailurePolicy::CollectAll { .. } => CheckError::Multiple(all),
    })
}

// ── Comparator ─────────────────────────────────────────────────────

pub struct Comparator<'a, A, B>
where
    A: GraphShard,
    B: GraphShard<Weight = A::Weight>,
{
    a: &'a A,
    b: IdTranslator<'a, B>,
    b_shard: &'a B,
    options: CompareOptions,
    signal: &'a AbortSignal,
    stats: &'a CheckStats,
}

impl<'a, A, B> Comparator<'a, A, B>
where
    A: GraphShard,
    B: GraphShard<Weight = A::Weight>,
{
    pub fn new(
        a: &'a A,
        b: &'a B,
        options: CompareOptions,
        signal: &'a AbortSignal,
        stats: &'a CheckStats,
    ) -> Self {
        Self {
            a,
            b: IdTranslator::new(b),
            b_shard: b,
            options,
            signal,
            stats,
        }
    }

    /// Check every local master of A against B on the current rayon pool.
    ///
    /// Under `FailFast` without `deterministic`, the first failure trips the
    /// abort signal so the remaining workers stop. Otherwise all failures
    /// are gathered, sorted by (source, destination) and cut to the policy
    /// limit, and the signal is left alone: deferred failures are exchanged
    /// with peers before anyone aborts. If the signal is tripped by someone
    /// else, returns what [`AbortSignal::outcome_for`] says.
    pub fn run(&self) -> Result<()> {
        let masters: Vec<LocalId> = self.a.master_nodes().collect();
        tracing::debug!(host = self.a.host_id().0, masters = masters.len(), "comparing");

        let result = if self.options.defers_failures() {
            self.run_collecting(&masters)
        } else {
            self.run_fail_fast(&masters)
        };

        match result {
            Ok(()) => Ok(()),
            Err(Stop::Failed(error)) => Err(error),
            Err(Stop::Halted) => Err(self
                .signal
                .outcome_for(self.a.host_id())
                .unwrap_or(CheckError::Interrupted)),
        }
    }

    fn run_fail_fast(&self, masters: &[LocalId]) -> std::result::Result<(), Stop> {
        masters.par_iter().try_for_each(|&node| {
            if self.signal.is_aborted() {
                return Err(Stop::Halted);
            }
            if let Some(failure) = self.check_node(node, 1).into_iter().next() {
                self.signal.trip(AbortCause {
                    host: self.a.host_id(),
                    error: failure,
                });
                return Err(Stop::Halted);
            }
            Ok(())
        })
    }

    fn run_collecting(&self, masters: &[LocalId]) -> std::result::Result<(), Stop> {
        let limit = self.options.failure_policy.limit();
        let found = AtomicUsize::new(0);

        let per_node: Vec<Vec<CheckError>> = masters
            .par_iter()
            .filter_map(|&node| {
                if self.signal.is_aborted() {
                    return Some(Err(Stop::Halted));
                }
                // Without determinism there is no point scanning past the limit.
                if !self.options.deterministic && found.load(Ordering::Relaxed) >= limit {
                    return None;
                }
                let failures = self.check_node(node, limit);
                if failures.is_empty() {
                    None
                } else {
                    found.fetch_add(failures.len(), Ordering::Relaxed);
                    Some(Ok(failures))
                }
            })
            .collect::<std::result::Result<_, Stop>>()?;

        match merge_failures(per_node.into_iter().flatten(), self.options.failure_policy) {
            Some(error) => Err(Stop::Failed(error)),
            None => Ok(()),
        }
    }

    /// Failures of one master node, at most `limit`. In deterministic mode
    /// these are the smallest by destination, otherwise the first found.
    pub fn check_node(&self, node: LocalId, limit: usize) -> Vec<CheckError> {
        let gid = self.a.global_id(node);
        self.stats.record_node();

        let other = match self.b.resolve(gid) {
            Resolution::Master(local) => local,
            Resolution::Mirror(_) | Resolution::Absent => {
                return vec![CheckError::PartitionIncongruence {
                    gid,
                    host: self.a.host_id(),
                    owner_in_other: self.b.owner(gid),
                }];
            }
        };

        let use_index = match self.options.strategy {
            MatchStrategy::Linear => false,
            MatchStrategy::Indexed => true,
            MatchStrategy::Auto { threshold } => self.b_shard.degree(other) >= threshold,
        };

        // Edge order within a node is file order, so the smallest failing
        // destination is only known once every edge has been looked at.
        let stop_early = !self.options.deterministic;
        let mut failures = Vec::new();
        let mut checked = 0usize;
        if use_index {
            self.stats.record_index_build();
            let index: HashSet<(GlobalId, A::Weight)> = self.b_shard.edges_of(other).collect();
            for (dst, weight) in self.a.edges_of(node) {
                checked += 1;
                if !index.contains(&(dst, weight)) {
                    failures.push(mismatch(gid, dst, weight));
                    if stop_early && failures.len() >= limit {
                        break;
                    }
                }
            }
        } else {
            for (dst, weight) in self.a.edges_of(node) {
                checked += 1;
                let found = self
                    .b_shard
                    .edges_of(other)
                    .any(|(dst2, weight2)| dst2 == dst && weight2 == weight);
                if !found {
                    failures.push(mismatch(gid, dst, weight));
                    if stop_early && failures.len() >= limit {
                        break;
                    }
                }
            }
        }
        self.stats.record_edges(checked);
        if !stop_early {
            failures.sort_by_key(CheckError::sort_key);
            failures.truncate(limit);
        }
        failures
    }
}

fn mismatch<W: std::fmt::Display>(src: GlobalId, dst: GlobalId, weight: W) -> CheckError {
    CheckError::EdgeMismatch {
        src,
        dst,
        weight: weight.to_string(),
    }
}
