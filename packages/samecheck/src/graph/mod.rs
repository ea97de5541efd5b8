//! Partitioned graph storage and its read interface.

pub mod partition;
pub mod shard;

pub use partition::{PartitionMap, PartitionPolicy};
pub use shard::{PartitionedGraph, ShardBuilder};

use crate::types::{EdgeWeight, GlobalId, HostId, LocalId};

/// Read interface of one host's shard of a graph instance.
///
/// Implementations are immutable once built. `Sync` is required because
/// comparator workers share `&Self` across a rayon pool without locking.
pub trait GraphShard: Sync {
    type Weight: EdgeWeight;

    /// Rank of the host holding this shard.
    fn host_id(&self) -> HostId;

    /// Number of hosts the graph instance is spread over.
    fn num_hosts(&self) -> u32;

    /// Nodes this host masters. Finite and stable for the shard's lifetime.
    fn master_nodes(&self) -> impl Iterator<Item = LocalId> + '_;

    /// Outgoing edges of a local node as (destination gid, weight).
    /// Mirrors carry no edges under edge-cut partitioning.
    fn edges_of(&self, node: LocalId) -> impl Iterator<Item = (GlobalId, Self::Weight)> + '_;

    /// Number of outgoing edges of a local node.
    fn degree(&self, node: LocalId) -> usize;

    fn global_id(&self, node: LocalId) -> GlobalId;

    /// Local handle for `gid`, or None when the node is neither mastered
    /// nor mirrored here.
    fn resolve_local(&self, gid: GlobalId) -> Option<LocalId>;

    fn is_master(&self, node: LocalId) -> bool;

    /// Host that masters `gid` in this graph instance.
    fn owner_of(&self, gid: GlobalId) -> Option<HostId>;
}
