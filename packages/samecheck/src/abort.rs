//! Failure escalation: the job-wide RUNNING -> ABORTED state machine.
//!
//! Each host owns one [`AbortSignal`], shared by every comparator worker
//! and by the network watcher. The first failure anywhere trips it:
//!
//! - a local failure trips the local signal and is broadcast to peers
//!   (see [`Escalation`]);
//! - a peer's broadcast trips the signal through the watcher;
//! - an interrupt (SIGINT/SIGTERM) trips every host's signal.
//!
//! ABORTED is terminal. Workers poll the signal between nodes, never in
//! the middle of one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::cluster::{HostLink, Message, Network};
use crate::error::CheckError;
use crate::types::HostId;

/// State of the distributed job as seen by one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Aborted,
}

/// Why the job was aborted and who noticed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortCause {
    pub host: HostId,
    pub error: CheckError,
}

#[derive(Debug, Default)]
struct SignalInner {
    aborted: AtomicBool,
    cause: OnceLock<AbortCause>,
}

/// Cloneable handle to a host's abort state.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JobState {
        if self.is_aborted() {
            JobState::Aborted
        } else {
            JobState::Running
        }
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// Move to ABORTED. Returns true only for the call that made the
    /// transition; later causes are dropped.
    pub fn trip(&self, cause: AbortCause) -> bool {
        let first = self.inner.cause.set(cause).is_ok();
        self.inner.aborted.store(true, Ordering::Release);
        first
    }

    pub fn cause(&self) -> Option<&AbortCause> {
        self.inner.cause.get()
    }

    /// Error this host should report given the recorded cause: the cause
    /// itself when raised here, `Aborted` when it came from a peer.
    pub fn outcome_for(&self, host: HostId) -> Option<CheckError> {
        self.cause().map(|cause| {
            if cause.host == host || matches!(cause.error, CheckError::Interrupted) {
                cause.error.clone()
            } else {
                CheckError::Aborted { by_host: cause.host }
            }
        })
    }
}

/// Raises a host's failure to the whole cluster.
pub struct Escalation<'a, N: Network> {
    link: &'a HostLink<N>,
    signal: &'a AbortSignal,
}

impl<'a, N: Network> Escalation<'a, N> {
    pub fn new(link: &'a HostLink<N>, signal: &'a AbortSignal) -> Self {
        Self { link, signal }
    }

    /// Trip the local signal and tell every peer. Idempotent: only the
    /// first failure is broadcast. Returns the error for propagation.
    pub fn raise(&self, error: CheckError) -> CheckError {
        let host = self.link.host_id();
        self.signal.trip(AbortCause {
            host,
            error: error.clone(),
        });
        self.broadcast_if_local();
        error
    }

    /// Broadcast the recorded cause if it originated on this host.
    pub fn broadcast_if_local(&self) {
        let host = self.link.host_id();
        let Some(cause) = self.signal.cause() else {
            return;
        };
        if cause.host != host || !self.link.mark_abort_sent() {
            return;
        }
        tracing::error!(host = host.0, code = cause.error.code(), "{}", cause.error);
        let msg = Message::Abort {
            from: host,
            cause: cause.error.clone(),
        };
        if let Err(e) = self.link.broadcast(msg) {
            tracing::warn!(host = host.0, "abort broadcast incomplete: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::LocalNetwork;
    use std::time::Duration;

    const TICK: Duration = Duration::from_millis(50);

    fn cause(host: u32) -> AbortCause {
        AbortCause {
            host: HostId(host),
            error: CheckError::InvalidFormat(format!("from {host}")),
        }
    }

    #[test]
    fn test_starts_running() {
        let signal = AbortSignal::new();
        assert_eq!(signal.state(), JobState::Running);
        assert!(signal.cause().is_none());
        assert!(signal.outcome_for(HostId(0)).is_none());
    }

    #[test]
    fn test_first_trip_wins_and_is_terminal() {
        let signal = AbortSignal::new();
        assert!(signal.trip(cause(1)));
        assert!(!signal.trip(cause(2)));
        assert_eq!(signal.state(), JobState::Aborted);
        assert_eq!(signal.cause().unwrap().host, HostId(1));
    }

    #[test]
    fn test_clones_share_state() {
        let signal = AbortSignal::new();
        let worker = signal.clone();
        worker.trip(cause(0));
        assert!(signal.is_aborted());
    }

    #[test]
    fn test_outcome_distinguishes_local_and_remote() {
        let signal = AbortSignal::new();
        signal.trip(cause(2));
        assert_eq!(signal.outcome_for(HostId(2)), Some(cause(2).error));
        assert_eq!(
            signal.outcome_for(HostId(0)),
            Some(CheckError::Aborted { by_host: HostId(2) })
        );
    }

    #[test]
    fn test_escalation_broadcasts_local_cause_once() {
        let mut nets = LocalNetwork::cluster(2);
        let peer = nets.pop().unwrap();
        let link = HostLink::new(nets.pop().unwrap());
        let signal = AbortSignal::new();
        let escalation = Escalation::new(&link, &signal);

        let err = escalation.raise(CheckError::InvalidFormat("bad".into()));
        assert_eq!(err.code(), "LOAD_FAILURE");
        escalation.raise(CheckError::Network("later".into()));

        let first = peer.recv_timeout(TICK).unwrap();
        assert!(matches!(
            first,
            Some(Message::Abort {
                from: HostId(0),
                cause: CheckError::InvalidFormat(_)
            })
        ));
        assert!(peer.recv_timeout(TICK).unwrap().is_none());
    }

    #[test]
    fn test_escalation_does_not_echo_peer_abort() {
        let mut nets = LocalNetwork::cluster(2);
        let peer = nets.pop().unwrap();
        let link = HostLink::new(nets.pop().unwrap());
        let signal = AbortSignal::new();
        signal.trip(cause(1));

        Escalation::new(&link, &signal).raise(CheckError::Aborted { by_host: HostId(1) });
        assert!(peer.recv_timeout(TICK).unwrap().is_none());
    }

    #[test]
    fn test_interrupt_reported_as_is_on_every_host() {
        let signal = AbortSignal::new();
        signal.trip(AbortCause {
            host: HostId(0),
            error: CheckError::Interrupted,
        });
        assert_eq!(signal.outcome_for(HostId(3)), Some(CheckError::Interrupted));
    }
}
