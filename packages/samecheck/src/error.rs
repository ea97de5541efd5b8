//! Error types for the edge-consistency check

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{GlobalId, HostId};

pub type Result<T> = std::result::Result<T, CheckError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("Failed to load graph {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Node mastered locally in the first graph is not mastered on the same
    /// host in the second graph.
    #[error(
        "Partition incongruence at node {gid}: mastered by host {host} in the first graph, \
         {}", describe_owner(.owner_in_other)
    )]
    PartitionIncongruence {
        gid: GlobalId,
        host: HostId,
        owner_in_other: Option<HostId>,
    },

    #[error("Edge {src} to {dst} with same weight not found (expected weight {weight})")]
    EdgeMismatch {
        src: GlobalId,
        dst: GlobalId,
        weight: String,
    },

    /// Several failures gathered under the collect-all policy.
    #[error("{}", summarize(.0))]
    Multiple(Vec<CheckError>),

    #[error("Check aborted by host {by_host}")]
    Aborted { by_host: HostId },

    #[error("Check interrupted by signal")]
    Interrupted,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    Network(String),
}

fn describe_owner(owner: &Option<HostId>) -> String {
    match owner {
        Some(host) => format!("but by host {host} in the second graph"),
        None => "but unknown to the second graph".to_string(),
    }
}

fn summarize(errors: &[CheckError]) -> String {
    match errors.first() {
        Some(first) => format!("{} failures, first: {}", errors.len(), first),
        None => "no failures recorded".to_string(),
    }
}

impl From<std::io::Error> for CheckError {
    fn from(e: std::io::Error) -> Self {
        CheckError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CheckError {
    fn from(e: serde_json::Error) -> Self {
        CheckError::InvalidConfig(e.to_string())
    }
}

impl CheckError {
    /// Stable error code for logs and exit-status mapping
    pub fn code(&self) -> &'static str {
        match self {
            CheckError::Load { .. } | CheckError::Io(_) | CheckError::InvalidFormat(_) => "LOAD_FAILURE",
            CheckError::PartitionIncongruence { .. } => "PARTITION_INCONGRUENCE",
            CheckError::EdgeMismatch { .. } => "EDGE_MISMATCH",
            CheckError::Multiple(_) => "MULTIPLE_FAILURES",
            CheckError::Aborted { .. } => "ABORTED",
            CheckError::Interrupted => "INTERRUPTED",
            CheckError::InvalidConfig(_) => "INVALID_CONFIG",
            CheckError::Network(_) => "NETWORK",
        }
    }

    /// True for failures that say something about the graph pair itself,
    /// as opposed to setup problems.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            CheckError::PartitionIncongruence { .. }
                | CheckError::EdgeMismatch { .. }
                | CheckError::Multiple(_)
        )
    }

    /// `Aborted` only echoes a failure seen elsewhere; everything else is a
    /// root cause.
    pub fn is_root_cause(&self) -> bool {
        !matches!(self, CheckError::Aborted { .. })
    }

    /// Ordering key used to pick a deterministic first failure.
    pub(crate) fn sort_key(&self) -> (u64, u64) {
        match self {
            CheckError::EdgeMismatch { src, dst, .. } => (src.0, dst.0),
            CheckError::PartitionIncongruence { gid, .. } => (gid.0, 0),
            CheckError::Multiple(errors) => errors.first().map_or((u64::MAX, u64::MAX), |e| e.sort_key()),
            _ => (u64::MAX, u64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_both_endpoints() {
        let err = CheckError::EdgeMismatch {
            src: GlobalId(1),
            dst: GlobalId(2),
            weight: "5".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Edge 1 to 2"), "got: {msg}");
        assert!(msg.contains("expected weight 5"), "got: {msg}");
        assert_eq!(err.code(), "EDGE_MISMATCH");
    }

    #[test]
    fn test_incongruence_message_is_distinct() {
        let err = CheckError::PartitionIncongruence {
            gid: GlobalId(7),
            host: HostId(0),
            owner_in_other: Some(HostId(1)),
        };
        let msg = err.to_string();
        assert!(msg.contains("Partition incongruence at node 7"), "got: {msg}");
        assert!(msg.contains("host 1 in the second graph"), "got: {msg}");
        assert!(!msg.contains("Edge"));
        assert_eq!(err.code(), "PARTITION_INCONGRUENCE");
    }

    #[test]
    fn test_aborted_is_not_root_cause() {
        assert!(!CheckError::Aborted { by_host: HostId(3) }.is_root_cause());
        assert!(CheckError::InvalidFormat("x".into()).is_root_cause());
        assert!(!CheckError::InvalidFormat("x".into()).is_check_failure());
    }
}
