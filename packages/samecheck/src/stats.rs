//! Check statistics
//!
//! Lock-free counters bumped by comparator workers, plus the per-host and
//! job-wide reports assembled once a host finishes.
//!
//! All counters use `Relaxed` ordering: they are read only after the
//! parallel section has joined.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::HostId;

/// Counters shared by the workers of one host.
#[derive(Debug, Default)]
pub struct CheckStats {
    nodes_visited: AtomicU64,
    edges_checked: AtomicU64,
    index_builds: AtomicU64,
}

/// Point-in-time copy of [`CheckStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub nodes_visited: u64,
    pub edges_checked: u64,
    pub index_builds: u64,
}

impl CheckStats {
    #[inline]
    pub fn record_node(&self) {
        self.nodes_visited.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_edges(&self, count: usize) {
        self.edges_checked.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_index_build(&self) {
        self.index_builds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            nodes_visited: self.nodes_visited.load(Ordering::Relaxed),
            edges_checked: self.edges_checked.load(Ordering::Relaxed),
            index_builds: self.index_builds.load(Ordering::Relaxed),
        }
    }
}

/// What one host did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostReport {
    pub host: HostId,
    pub masters: usize,
    pub mirrors: usize,
    pub local_edges: usize,
    pub stats: StatsSnapshot,
    pub load_ms: u64,
    pub check_ms: u64,
}

/// Job-wide summary of a successful check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub hosts: Vec<HostReport>,
}

impl CheckReport {
    pub fn total_nodes_visited(&self) -> u64 {
        self.hosts.iter().map(|h| h.stats.nodes_visited).sum()
    }

    pub fn total_edges_checked(&self) -> u64 {
        self.hosts.iter().map(|h| h.stats.edges_checked).sum()
    }

    /// Slowest host's check time; the job finishes when it does.
    pub fn check_ms(&self) -> u64 {
        self.hosts.iter().map(|h| h.check_ms).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_from_many_threads() {
        let stats = Arc::new(CheckStats::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_node();
                        stats.record_edges(2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.nodes_visited, 4000);
        assert_eq!(snap.edges_checked, 8000);
        assert_eq!(snap.index_builds, 0);
    }

    #[test]
    fn test_report_totals() {
        let host = |id, nodes, edges, ms| HostReport {
            host: HostId(id),
            masters: nodes as usize,
            mirrors: 0,
            local_edges: edges as usize,
            stats: StatsSnapshot {
                nodes_visited: nodes,
                edges_checked: edges,
                index_builds: 0,
            },
            load_ms: 0,
            check_ms: ms,
        };
        let report = CheckReport {
            hosts: vec![host(0, 10, 30, 5), host(1, 7, 12, 9)],
        };
        assert_eq!(report.total_nodes_visited(), 17);
        assert_eq!(report.total_edges_checked(), 42);
        assert_eq!(report.check_ms(), 9);
        assert_eq!(CheckReport { hosts: vec![] }.check_ms(), 0);
    }
}
