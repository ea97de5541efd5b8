//! Per-host view of the network: collectives on top of point-to-point
//! messages.
//!
//! Messages that arrive ahead of the collective they belong to (a fast
//! peer's `Outcome` while this host still waits at the load barrier) are
//! parked in `pending` and consumed later. `Abort` is never parked: it
//! trips the abort signal as soon as it is seen.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::abort::{AbortCause, AbortSignal};
use crate::cluster::network::{Message, Network, Phase};
use crate::error::{CheckError, Result};
use crate::types::HostId;

/// How long a blocked collective waits before re-checking the signal.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct HostLink<N: Network> {
    net: N,
    pending: Mutex<VecDeque<Message>>,
    abort_sent: AtomicBool,
}

impl<N: Network> HostLink<N> {
    pub fn new(net: N) -> Self {
        Self {
            net,
            pending: Mutex::new(VecDeque::new()),
            abort_sent: AtomicBool::new(false),
        }
    }

    pub fn host_id(&self) -> HostId {
        self.net.host_id()
    }

    pub fn num_hosts(&self) -> u32 {
        self.net.num_hosts()
    }

    pub fn broadcast(&self, msg: Message) -> Result<()> {
        self.net.broadcast(msg)
    }

    /// Returns true the first time only; an abort is broadcast once.
    pub fn mark_abort_sent(&self) -> bool {
        !self.abort_sent.swap(true, Ordering::AcqRel)
    }

    /// Wait until every host reached `phase`.
    pub fn barrier(&self, phase: Phase, signal: &AbortSignal) -> Result<()> {
        self.announce(Message::Ready {
            from: self.host_id(),
            phase,
        });
        self.collect(signal, |m| matches!(m, Message::Ready { phase: p, .. } if *p == phase))?;
        Ok(())
    }

    /// All-gather of final outcomes. Returns every host's failure (own
    /// included), indexed by rank.
    pub fn gather_outcomes(
        &self,
        mine: Option<CheckError>,
        signal: &AbortSignal,
    ) -> Result<Vec<Option<CheckError>>> {
        self.announce(Message::Outcome {
            from: self.host_id(),
            failure: mine.clone(),
        });
        let received = self.collect(signal, |m| matches!(m, Message::Outcome { .. }))?;

        let mut outcomes = vec![None; self.num_hosts() as usize];
        outcomes[self.host_id().index()] = mine;
        for msg in received {
            if let Message::Outcome { from, failure } = msg {
                outcomes[from.index()] = failure;
            }
        }
        Ok(outcomes)
    }

    /// Relay peer aborts into `signal` until `done` is set or the signal
    /// trips. Runs beside the comparator.
    pub fn watch(&self, signal: &AbortSignal, done: &AtomicBool) {
        while !done.load(Ordering::Acquire) && !signal.is_aborted() {
            match self.net.recv_timeout(POLL_INTERVAL) {
                Ok(Some(Message::Abort { from, cause })) => {
                    self.on_abort(signal, from, cause);
                    return;
                }
                Ok(Some(other)) => self.park(other),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(host = self.host_id().0, "watcher stopped: {}", e);
                    return;
                }
            }
        }
    }

    /// Broadcast for a collective. A peer that is already gone has sent its
    /// `Abort` before leaving, so the collect that follows will see it.
    fn announce(&self, msg: Message) {
        if let Err(e) = self.net.broadcast(msg) {
            tracing::debug!(host = self.host_id().0, "collective broadcast incomplete: {}", e);
        }
    }

    fn on_abort(&self, signal: &AbortSignal, from: HostId, cause: CheckError) {
        tracing::debug!(host = self.host_id().0, from = from.0, "abort received");
        signal.trip(AbortCause { host: from, error: cause });
    }

    fn park(&self, msg: Message) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(msg);
    }

    fn aborted(&self, signal: &AbortSignal) -> CheckError {
        signal
            .outcome_for(self.host_id())
            .unwrap_or(CheckError::Interrupted)
    }

    /// Take one matching message from every other host.
    fn collect<F>(&self, signal: &AbortSignal, accept: F) -> Result<Vec<Message>>
    where
        F: Fn(&Message) -> bool,
    {
        let want = self.num_hosts().saturating_sub(1) as usize;
        let mut got = Vec::with_capacity(want);

        {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            let mut rest = VecDeque::with_capacity(pending.len());
            while let Some(msg) = pending.pop_front() {
                if accept(&msg) {
                    got.push(msg);
                } else {
                    rest.push_back(msg);
                }
            }
            *pending = rest;
        }

        while got.len() < want {
            if signal.is_aborted() {
                return Err(self.aborted(signal));
            }
            match self.net.recv_timeout(POLL_INTERVAL)? {
                None => {}
                Some(Message::Abort { from, cause }) => {
                    self.on_abort(signal, from, cause);
                    return Err(self.aborted(signal));
                }
                Some(msg) if accept(&msg) => got.push(msg),
                Some(msg) => self.park(msg),
            }
        }
        Ok(got)
    }
}
