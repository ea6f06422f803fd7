//! In-memory network shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use lanscout::network::socket::PortProber;
use lanscout::{ProbeOutcome, ScanError};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Start or end of one simulated connect, in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    Start(SocketAddrV4),
    End(SocketAddrV4),
}

/// Scripted network: listed addresses are open, everything else is closed
#[derive(Default)]
pub struct MockNetwork {
    open: HashSet<SocketAddrV4>,
    failing: HashMap<SocketAddrV4, String>,
    replies: HashMap<SocketAddrV4, Vec<u8>>,
    query_replies: HashMap<(SocketAddrV4, Vec<u8>), Vec<u8>>,
    latency: Duration,
    probed: Mutex<Vec<SocketAddrV4>>,
    timeline: Mutex<Vec<ConnectStep>>,
    exchanges: Mutex<Vec<(SocketAddrV4, Vec<u8>)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

fn addr(s: &str) -> SocketAddrV4 {
    s.parse().expect("test address")
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open port that never answers identification queries
    pub fn listen(mut self, at: &str) -> Self {
        self.open.insert(addr(at));
        self
    }

    /// Open port that answers every query with `reply`
    pub fn reply(mut self, at: &str, reply: &[u8]) -> Self {
        self.open.insert(addr(at));
        self.replies.insert(addr(at), reply.to_vec());
        self
    }

    /// Open port that answers only `query` with `reply`
    pub fn reply_to(mut self, at: &str, query: &str, reply: &[u8]) -> Self {
        self.open.insert(addr(at));
        self.query_replies.insert((addr(at), query.as_bytes().to_vec()), reply.to_vec());
        self
    }

    /// Address whose probe mechanism fails
    pub fn fail(mut self, at: &str, reason: &str) -> Self {
        self.failing.insert(addr(at), reason.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn probed(&self) -> Vec<SocketAddrV4> {
        self.probed.lock().unwrap().clone()
    }

    pub fn timeline(&self) -> Vec<ConnectStep> {
        self.timeline.lock().unwrap().clone()
    }

    pub fn exchanges(&self) -> Vec<(SocketAddrV4, Vec<u8>)> {
        self.exchanges.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortProber for MockNetwork {
    async fn probe(&self, addr: SocketAddrV4, _timeout: Duration) -> ProbeOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probed.lock().unwrap().push(addr);
        self.timeline.lock().unwrap().push(ConnectStep::Start(addr));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = if let Some(reason) = self.failing.get(&addr) {
            ProbeOutcome::Error(reason.clone())
        } else if self.open.contains(&addr) {
            ProbeOutcome::Open
        } else {
            ProbeOutcome::Closed
        };

        self.timeline.lock().unwrap().push(ConnectStep::End(addr));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn exchange(
        &self,
        addr: SocketAddrV4,
        payload: &[u8],
        read_limit: usize,
        _timeout: Duration,
    ) -> lanscout::Result<Vec<u8>> {
        self.exchanges.lock().unwrap().push((addr, payload.to_vec()));

        let reply = self
            .query_replies
            .get(&(addr, payload.to_vec()))
            .or_else(|| self.replies.get(&addr));

        match reply {
            Some(reply) => Ok(reply.iter().copied().take(read_limit).collect()),
            None if self.open.contains(&addr) => {
                Err(ScanError::NetworkError(format!("{}: no response", addr)))
            }
            None => Err(ScanError::NetworkError(format!("{}: connection refused", addr))),
        }
    }
}
