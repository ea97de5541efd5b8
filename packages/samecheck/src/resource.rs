//! Machine probing and default tuning for a check run.
//!
//! All in-process hosts share one machine, so the CPUs are divided between
//! them. When little memory is left, per-node hash indexes are reserved for
//! very high degrees.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::compare::DEFAULT_INDEX_THRESHOLD;

/// Below this fraction of free memory the index threshold is raised.
const LOW_HEADROOM: f64 = 0.1;

/// Index threshold used when memory is short.
const LOW_HEADROOM_INDEX_THRESHOLD: usize = 1024;

// ── Machine ────────────────────────────────────────────────────────

/// What the machine offers right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemResources {
    pub logical_cpus: usize,
    /// Bytes.
    pub memory_total: u64,
    /// Bytes the OS reports as reusable.
    pub memory_available: u64,
}

impl SystemResources {
    pub fn detect() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_memory();

        let logical_cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        let detected = Self {
            logical_cpus,
            memory_total: sys.total_memory(),
            memory_available: sys.available_memory(),
        };
        tracing::debug!(
            cpus = detected.logical_cpus,
            total_mb = detected.memory_total >> 20,
            available_mb = detected.memory_available >> 20,
            "machine probed"
        );
        detected
    }

    /// Free fraction of memory in `[0, 1]`. Unknown totals count as none free.
    pub fn headroom(&self) -> f64 {
        if self.memory_total == 0 {
            return 0.0;
        }
        (self.memory_available as f64 / self.memory_total as f64).clamp(0.0, 1.0)
    }
}

// ── Tuning ─────────────────────────────────────────────────────────

/// Defaults for settings the user left open.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningProfile {
    /// Rayon threads per in-process host: `max(1, cpus / hosts)`.
    pub threads_per_host: usize,
    /// B out-degree from which `MatchStrategy::Auto` builds an index.
    pub index_threshold: usize,
    pub headroom: f64,
}

impl TuningProfile {
    pub fn from_resources(res: &SystemResources, num_hosts: u32) -> Self {
        let hosts = usize::try_from(num_hosts).unwrap_or(usize::MAX).max(1);
        let headroom = res.headroom();
        Self {
            threads_per_host: (res.logical_cpus / hosts).max(1),
            index_threshold: if headroom < LOW_HEADROOM {
                LOW_HEADROOM_INDEX_THRESHOLD
            } else {
                DEFAULT_INDEX_THRESHOLD
            },
            headroom,
        }
    }
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            threads_per_host: 1,
            index_threshold: DEFAULT_INDEX_THRESHOLD,
            headroom: 1.0,
        }
    }
}

/// Probes the machine on every call.
pub struct ResourceManager;

impl ResourceManager {
    pub fn auto_tune(num_hosts: u32) -> TuningProfile {
        TuningProfile::from_resources(&SystemResources::detect(), num_hosts)
    }
}
