//! Global/local identifier translation for a shard.

use crate::graph::GraphShard;
use crate::types::{GlobalId, HostId, LocalId};

/// Where a global id lives in a host's shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Master(LocalId),
    Mirror(LocalId),
    /// Neither mastered nor mirrored on this host.
    Absent,
}

/// Single query point used by the comparator and by diagnostics.
pub struct IdTranslator<'g, G: GraphShard> {
    shard: &'g G,
}

impl<'g, G: GraphShard> IdTranslator<'g, G> {
    pub fn new(shard: &'g G) -> Self {
        Self { shard }
    }

    pub fn resolve(&self, gid: GlobalId) -> Resolution {
        match self.shard.resolve_local(gid) {
            Some(local) if self.shard.is_master(local) => Resolution::Master(local),
            Some(local) => Resolution::Mirror(local),
            None => Resolution::Absent,
        }
    }

    pub fn global_id(&self, node: LocalId) -> GlobalId {
        self.shard.global_id(node)
    }

    /// Host that masters `gid` in the shard's graph instance.
    pub fn owner(&self, gid: GlobalId) -> Option<HostId> {
        self.shard.owner_of(gid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PartitionMap, PartitionPolicy, ShardBuilder};
    use crate::loader::EdgeList;
    use crate::types::Edge;

    #[test]
    fn test_resolution_kinds() {
        let g = EdgeList::from_edges(None, vec![Edge::new(0, 3, 1u32), Edge::new(3, 1, 1)]).unwrap();
        let map = PartitionMap::new(PartitionPolicy::Blocked, g.num_nodes(), 2).unwrap();
        let shard = ShardBuilder::new(map).build(&g, HostId(0)).unwrap();
        let tr = IdTranslator::new(&shard);

        let Resolution::Master(l0) = tr.resolve(GlobalId(0)) else {
            panic!("node 0 is mastered by host 0");
        };
        assert_eq!(tr.global_id(l0), GlobalId(0));
        assert!(matches!(tr.resolve(GlobalId(3)), Resolution::Mirror(_)));
        assert_eq!(tr.resolve(GlobalId(2)), Resolution::Absent);
        assert_eq!(tr.owner(GlobalId(3)), Some(HostId(1)));
        assert_eq!(tr.owner(GlobalId(40)), None);
    }
}
