//! Identifier and edge types shared by every layer of the checker.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

// ── Identifiers ────────────────────────────────────────────────────

/// Node identifier that is stable and comparable across all hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalId(pub u64);

/// Node index inside one host's shard. Meaningless on any other host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalId(pub u32);

/// Rank of a cooperating host, `0..num_hosts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(pub u32);

impl fmt::Display for GlobalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LocalId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl HostId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Edges ──────────────────────────────────────────────────────────

/// Edge payload. Only equality matters to the check; `Display` is used in
/// diagnostics.
pub trait EdgeWeight: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> EdgeWeight for T where T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Weight type produced by the file loaders.
pub type Weight = u32;

/// Directed weighted edge in global terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge<W = Weight> {
    pub src: GlobalId,
    pub dst: GlobalId,
    pub weight: W,
}

impl<W> Edge<W> {
    pub fn new(src: u64, dst: u64, weight: W) -> Self {
        Self {
            src: GlobalId(src),
            dst: GlobalId(dst),
            weight,
        }
    }
}
