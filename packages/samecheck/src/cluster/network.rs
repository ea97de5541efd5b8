//! Host-to-host messaging.
//!
//! The check itself needs no communication under congruent partitioning;
//! the network only carries control traffic: barriers, final outcomes and
//! abort broadcasts. [`LocalNetwork`] connects in-process hosts with
//! crossbeam channels.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::error::{CheckError, Result};
use crate::types::HostId;

/// Collective phase a `Ready` message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Both graphs loaded and partitioned.
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Sender hit a fatal failure; every receiver must stop.
    Abort { from: HostId, cause: CheckError },
    /// Sender reached the barrier for `phase`.
    Ready { from: HostId, phase: Phase },
    /// Sender finished its local check. `failure` is its first (or
    /// collected) failure, if any.
    Outcome {
        from: HostId,
        failure: Option<CheckError>,
    },
}

impl Message {
    /// Host that sent the message.
    pub fn sender(&self) -> HostId {
        match self {
            Message::Abort { from, .. } | Message::Ready { from, .. } | Message::Outcome { from, .. } => {
                *from
            }
        }
    }
}

/// Point-to-point transport between cooperating hosts.
pub trait Network: Send + Sync {
    fn host_id(&self) -> HostId;

    fn num_hosts(&self) -> u32;

    fn send(&self, to: HostId, msg: Message) -> Result<()>;

    /// Next message for this host, or None after `timeout`.
    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>>;

    /// Send to every other host. Keeps going past individual failures and
    /// reports the last one.
    fn broadcast(&self, msg: Message) -> Result<()> {
        let me = self.host_id();
        let mut last_err = None;
        for h in (0..self.num_hosts()).map(HostId).filter(|h| *h != me) {
            if let Err(e) = self.send(h, msg.clone()) {
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── In-process transport ───────────────────────────────────────────

/// Endpoint of an in-process cluster.
pub struct LocalNetwork {
    host: HostId,
    peers: Vec<Sender<Message>>,
    inbox: Receiver<Message>,
}

impl LocalNetwork {
    /// Fully connected endpoints for `num_hosts` hosts, indexed by rank.
    pub fn cluster(num_hosts: u32) -> Vec<LocalNetwork> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..num_hosts).map(|_| unbounded::<Message>()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| LocalNetwork {
                host: HostId(i as u32),
                peers: senders.clone(),
                inbox,
            })
            .collect()
    }
}

impl Network for LocalNetwork {
    fn host_id(&self) -> HostId {
        self.host
    }

    fn num_hosts(&self) -> u32 {
        self.peers.len() as u32
    }

    fn send(&self, to: HostId, msg: Message) -> Result<()> {
        let peer = self
            .peers
            .get(to.index())
            .ok_or_else(|| CheckError::Network(format!("no host {to}")))?;
        peer.send(msg)
            .map_err(|_| CheckError::Network(format!("host {to} is gone")))
    }

    fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>> {
        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CheckError::Network("inbox disconnected".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(50);

    #[test]
    fn test_point_to_point() {
        let nets = LocalNetwork::cluster(3);
        nets[0]
            .send(HostId(2), Message::Ready { from: HostId(0), phase: Phase::Loaded })
            .unwrap();
        let msg = nets[2].recv_timeout(TICK).unwrap().unwrap();
        assert_eq!(msg.sender(), HostId(0));
        assert!(nets[1].recv_timeout(TICK).unwrap().is_none());
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let nets = LocalNetwork::cluster(3);
        nets[1]
            .broadcast(Message::Abort {
                from: HostId(1),
                cause: CheckError::Interrupted,
            })
            .unwrap();
        assert!(nets[0].recv_timeout(TICK).unwrap().is_some());
        assert!(nets[2].recv_timeout(TICK).unwrap().is_some());
        assert!(nets[1].recv_timeout(TICK).unwrap().is_none());
    }

    #[test]
    fn test_unknown_host() {
        let nets = LocalNetwork::cluster(1);
        let err = nets[0]
            .send(HostId(5), Message::Outcome { from: HostId(0), failure: None })
            .unwrap_err();
        assert_eq!(err.code(), "NETWORK");
    }
}
