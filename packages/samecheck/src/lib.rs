//! samecheck - distributed edge-consistency check for partitioned graphs
//!
//! Two copies of a graph (A and B) are split across cooperating hosts with
//! the same edge-cut partitioning. Every host checks, in parallel, that each
//! edge `(src, dst, weight)` leaving a node it masters in A also leaves that
//! node in B. The first failure on any host aborts the whole job.
//!
//! ```text
//! loader ──► partition/shard ──► cluster host ──► comparator
//!                                     │               │
//!                                     └── abort ◄─────┘
//! ```
//!
//! The check is one-directional: edges that exist only in B are fine.

pub mod abort;
pub mod cluster;
pub mod compare;
pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod resource;
pub mod stats;
pub mod translate;
pub mod types;

// Re-export main types
pub use abort::{AbortCause, AbortSignal, JobState};
pub use cluster::{check_shards, run_check, Cluster, InterruptHandle};
pub use compare::{CompareOptions, Comparator, FailurePolicy, MatchStrategy};
pub use config::CheckConfig;
pub use error::{CheckError, Result};
pub use graph::{GraphShard, PartitionMap, PartitionPolicy, PartitionedGraph, ShardBuilder};
pub use loader::EdgeList;
pub use stats::{CheckReport, HostReport, StatsSnapshot};
pub use translate::{IdTranslator, Resolution};
pub use types::{Edge, EdgeWeight, GlobalId, HostId, LocalId, Weight};
