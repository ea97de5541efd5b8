//! One host's shard of an edge-cut partitioned graph.
//!
//! # Local layout
//!
//! ```text
//! local id   0 .. num_masters          masters, ascending gid
//!            num_masters .. num_local  mirrors, first-seen order
//! ```
//!
//! Outgoing edges live with their master only, stored as CSR with local
//! destination ids. Destinations not mastered here become mirrors so every
//! edge endpoint has a local handle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CheckError, Result};
use crate::graph::partition::PartitionMap;
use crate::graph::GraphShard;
use crate::loader::EdgeList;
use crate::types::{EdgeWeight, GlobalId, HostId, LocalId, Weight};

/// Immutable shard: masters, mirrors and master out-edges.
#[derive(Debug)]
pub struct PartitionedGraph<W = Weight> {
    host: HostId,
    partition: Arc<PartitionMap>,
    num_masters: u32,
    local_to_global: Vec<GlobalId>,
    global_to_local: HashMap<GlobalId, LocalId>,
    /// `offsets[m]..offsets[m + 1]` index the edges of master `m`.
    offsets: Vec<usize>,
    edge_dsts: Vec<LocalId>,
    edge_weights: Vec<W>,
}

impl<W: EdgeWeight> PartitionedGraph<W> {
    pub fn num_masters(&self) -> usize {
        self.num_masters as usize
    }

    pub fn num_mirrors(&self) -> usize {
        self.local_to_global.len() - self.num_masters as usize
    }

    pub fn num_local_nodes(&self) -> usize {
        self.local_to_global.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_dsts.len()
    }

    pub fn partition(&self) -> &PartitionMap {
        &self.partition
    }

    fn edge_range(&self, node: LocalId) -> (usize, usize) {
        if node.0 < self.num_masters {
            (self.offsets[node.index()], self.offsets[node.index() + 1])
        } else {
            (0, 0)
        }
    }
}

impl<W: EdgeWeight> GraphShard for PartitionedGraph<W> {
    type Weight = W;

    fn host_id(&self) -> HostId {
        self.host
    }

    fn num_hosts(&self) -> u32 {
        self.partition.num_hosts()
    }

    fn master_nodes(&self) -> impl Iterator<Item = LocalId> + '_ {
        (0..self.num_masters).map(LocalId)
    }

    fn edges_of(&self, node: LocalId) -> impl Iterator<Item = (GlobalId, W)> + '_ {
        let (start, end) = self.edge_range(node);
        self.edge_dsts[start..end]
            .iter()
            .zip(&self.edge_weights[start..end])
            .map(|(dst, &w)| (self.local_to_global[dst.index()], w))
    }

    fn degree(&self, node: LocalId) -> usize {
        let (start, end) = self.edge_range(node);
        end - start
    }

    fn global_id(&self, node: LocalId) -> GlobalId {
        self.local_to_global[node.index()]
    }

    fn resolve_local(&self, gid: GlobalId) -> Option<LocalId> {
        self.global_to_local.get(&gid).copied()
    }

    fn is_master(&self, node: LocalId) -> bool {
        node.0 < self.num_masters
    }

    fn owner_of(&self, gid: GlobalId) -> Option<HostId> {
        self.partition.owner(gid)
    }
}

// ── Builder ────────────────────────────────────────────────────────

/// Cuts a host's shard out of a fully loaded edge list.
pub struct ShardBuilder {
    partition: Arc<PartitionMap>,
}

impl ShardBuilder {
    pub fn new(partition: PartitionMap) -> Self {
        Self {
            partition: Arc::new(partition),
        }
    }

    pub fn partition(&self) -> &PartitionMap {
        &self.partition
    }

    /// Build the shard of `host`.
    ///
    /// Fails when the edge list has nodes the partition map does not cover
    /// or when `host` is out of range.
    pub fn build<W: EdgeWeight>(&self, graph: &EdgeList<W>, host: HostId) -> Result<PartitionedGraph<W>> {
        if host.0 >= self.partition.num_hosts() {
            return Err(CheckError::InvalidConfig(format!(
                "host {host} out of range for {} hosts",
                self.partition.num_hosts()
            )));
        }
        if graph.num_nodes() > self.partition.num_nodes() {
            return Err(CheckError::InvalidConfig(format!(
                "graph has {} nodes, partition map covers {}",
                graph.num_nodes(),
                self.partition.num_nodes()
            )));
        }

        let masters = self.partition.masters_of(host);
        let num_masters = u32::try_from(masters.len()).map_err(|_| {
            CheckError::InvalidConfig(format!("{} masters exceed local id space", masters.len()))
        })?;

        let mut local_to_global = masters.clone();
        let mut global_to_local: HashMap<GlobalId, LocalId> = masters
            .iter()
            .enumerate()
            .map(|(i, &gid)| (gid, LocalId(i as u32)))
            .collect();

        let mut offsets = Vec::with_capacity(masters.len() + 1);
        offsets.push(0usize);
        let mut edge_dsts = Vec::new();
        let mut edge_weights = Vec::new();

        for &gid in &masters {
            for (dst, weight) in graph.edges_of(gid) {
                let local = match global_to_local.get(&dst) {
                    Some(&l) => l,
                    None => {
                        let l = LocalId(local_to_global.len() as u32);
                        local_to_global.push(dst);
                        global_to_local.insert(dst, l);
                        l
                    }
                };
                edge_dsts.push(local);
                edge_weights.push(weight);
            }
            offsets.push(edge_dsts.len());
        }

        Ok(PartitionedGraph {
            host,
            partition: Arc::clone(&self.partition),
            num_masters,
            local_to_global,
            global_to_local,
            offsets,
            edge_dsts,
            edge_weights,
        })
    }
}
