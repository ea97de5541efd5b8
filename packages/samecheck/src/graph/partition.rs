//! Edge-cut node ownership: global id -> host.
//!
//! Every global node is mastered by exactly one host. Two graphs checked
//! against each other must agree on this map (congruent partitioning);
//! the policies here are deterministic so that the same policy over the
//! same node count always yields the same owners.

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};
use crate::types::{GlobalId, HostId};

/// How nodes are spread over hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionPolicy {
    /// Contiguous, equally sized node ranges. Congruent only when both
    /// graphs have the same node count.
    #[default]
    Blocked,
    /// `gid % num_hosts`. Congruent for any node counts.
    Modulo,
}

impl std::str::FromStr for PartitionPolicy {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blocked" => Ok(PartitionPolicy::Blocked),
            "modulo" => Ok(PartitionPolicy::Modulo),
            other => Err(CheckError::InvalidConfig(format!(
                "unknown partition policy '{other}' (expected blocked or modulo)"
            ))),
        }
    }
}

/// Resolved ownership for one graph instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionMap {
    Blocked {
        num_nodes: u64,
        num_hosts: u32,
        block: u64,
    },
    Modulo {
        num_nodes: u64,
        num_hosts: u32,
    },
    /// Owner listed per node, index = gid.
    Explicit { num_hosts: u32, owners: Vec<HostId> },
}

impl PartitionMap {
    /// Build the map a policy produces for `num_nodes` nodes.
    pub fn new(policy: PartitionPolicy, num_nodes: u64, num_hosts: u32) -> Result<Self> {
        if num_hosts == 0 {
            return Err(CheckError::InvalidConfig("num_hosts must be > 0".to_string()));
        }
        Ok(match policy {
            PartitionPolicy::Blocked => PartitionMap::Blocked {
                num_nodes,
                num_hosts,
                block: num_nodes.div_ceil(num_hosts as u64).max(1),
            },
            PartitionPolicy::Modulo => PartitionMap::Modulo { num_nodes, num_hosts },
        })
    }

    /// Caller-chosen owners. Every owner must be below `num_hosts`.
    pub fn explicit(num_hosts: u32, owners: Vec<HostId>) -> Result<Self> {
        if num_hosts == 0 {
            return Err(CheckError::InvalidConfig("num_hosts must be > 0".to_string()));
        }
        if let Some((gid, host)) = owners.iter().enumerate().find(|(_, h)| h.0 >= num_hosts) {
            return Err(CheckError::InvalidConfig(format!(
                "node {gid} assigned to host {host}, only {num_hosts} hosts"
            )));
        }
        Ok(PartitionMap::Explicit { num_hosts, owners })
    }

    pub fn num_hosts(&self) -> u32 {
        match self {
            PartitionMap::Blocked { num_hosts, .. }
            | PartitionMap::Modulo { num_hosts, .. }
            | PartitionMap::Explicit { num_hosts, .. } => *num_hosts,
        }
    }

    pub fn num_nodes(&self) -> u64 {
        match self {
            PartitionMap::Blocked { num_nodes, .. } | PartitionMap::Modulo { num_nodes, .. } => {
                *num_nodes
            }
            PartitionMap::Explicit { owners, .. } => owners.len() as u64,
        }
    }

    /// Host that masters `gid`, or None when the node is outside the graph.
    pub fn owner(&self, gid: GlobalId) -> Option<HostId> {
        if gid.0 >= self.num_nodes() {
            return None;
        }
        Some(match self {
            PartitionMap::Blocked { block, .. } => HostId((gid.0 / block) as u32),
            PartitionMap::Modulo { num_hosts, .. } => HostId((gid.0 % *num_hosts as u64) as u32),
            PartitionMap::Explicit { owners, .. } => owners[gid.0 as usize],
        })
    }

    /// Global ids mastered by `host`, ascending.
    pub fn masters_of(&self, host: HostId) -> Vec<GlobalId> {
        match self {
            PartitionMap::Blocked { num_nodes, block, .. } => {
                let start = (host.0 as u64 * block).min(*num_nodes);
                let end = (start + block).min(*num_nodes);
                (start..end).map(GlobalId).collect()
            }
            PartitionMap::Modulo { num_nodes, num_hosts } => (host.0 as u64..*num_nodes)
                .step_by(*num_hosts as usize)
                .map(GlobalId)
                .collect(),
            PartitionMap::Explicit { owners, .. } => owners
                .iter()
                .enumerate()
                .filter(|(_, h)| **h == host)
                .map(|(gid, _)| GlobalId(gid as u64))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_disjoint_cover(map: &PartitionMap) {
        let mut seen = HashSet::new();
        for h in 0..map.num_hosts() {
            for gid in map.masters_of(HostId(h)) {
                assert_eq!(map.owner(gid), Some(HostId(h)));
                assert!(seen.insert(gid), "node {gid} mastered twice");
            }
        }
        assert_eq!(seen.len() as u64, map.num_nodes(), "every node must have a master");
    }

    #[test]
    fn test_blocked_ranges() {
        let map = PartitionMap::new(PartitionPolicy::Blocked, 10, 3).unwrap();
        assert_eq!(map.masters_of(HostId(0)), (0..4).map(GlobalId).collect::<Vec<_>>());
        assert_eq!(map.masters_of(HostId(2)), (8..10).map(GlobalId).collect::<Vec<_>>());
        assert_eq!(map.owner(GlobalId(4)), Some(HostId(1)));
        assert_eq!(map.owner(GlobalId(10)), None);
        assert_disjoint_cover(&map);
    }

    #[test]
    fn test_blocked_more_hosts_than_nodes() {
        let map = PartitionMap::new(PartitionPolicy::Blocked, 2, 5).unwrap();
        assert!(map.masters_of(HostId(4)).is_empty());
        assert_disjoint_cover(&map);
    }

    #[test]
    fn test_modulo_round_robin() {
        let map = PartitionMap::new(PartitionPolicy::Modulo, 7, 3).unwrap();
        assert_eq!(
            map.masters_of(HostId(1)),
            vec![GlobalId(1), GlobalId(4)]
        );
        assert_eq!(map.owner(GlobalId(6)), Some(HostId(0)));
        assert_disjoint_cover(&map);
    }

    #[test]
    fn test_empty_graph() {
        for policy in [PartitionPolicy::Blocked, PartitionPolicy::Modulo] {
            let map = PartitionMap::new(policy, 0, 4).unwrap();
            assert!(map.masters_of(HostId(0)).is_empty());
            assert_eq!(map.owner(GlobalId(0)), None);
        }
    }

    #[test]
    fn test_explicit_validates_hosts() {
        let map = PartitionMap::explicit(2, vec![HostId(1), HostId(0), HostId(1)]).unwrap();
        assert_eq!(map.masters_of(HostId(1)), vec![GlobalId(0), GlobalId(2)]);
        assert_disjoint_cover(&map);

        let err = PartitionMap::explicit(2, vec![HostId(2)]).unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_zero_hosts_rejected() {
        let err = PartitionMap::new(PartitionPolicy::Modulo, 4, 0).unwrap_err();
        assert!(matches!(err, CheckError::InvalidConfig(_)));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("blocked".parse::<PartitionPolicy>().unwrap(), PartitionPolicy::Blocked);
        assert_eq!("modulo".parse::<PartitionPolicy>().unwrap(), PartitionPolicy::Modulo);
        assert!("hashed".parse::<PartitionPolicy>().is_err());
    }
}
