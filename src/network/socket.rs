//! TCP connect probing and short request/response exchanges

use crate::network::ProbeOutcome;
use crate::ScanError;
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Transport seam used by the scheduler and the identification probes
///
/// The production implementation is [`TcpConnectScanner`]; tests swap in
/// an in-memory network.
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Attempt a TCP connection, bounded by `timeout`
    async fn probe(&self, addr: SocketAddrV4, timeout: Duration) -> ProbeOutcome;

    /// Connect, send `payload` and read a single response of at most
    /// `read_limit` bytes, all within `timeout`
    async fn exchange(
        &self,
        addr: SocketAddrV4,
        payload: &[u8],
        read_limit: usize,
        timeout: Duration,
    ) -> crate::Result<Vec<u8>>;
}

/// TCP connect scanner (full three-way handshake, no raw sockets)
#[derive(Debug, Clone, Default)]
pub struct TcpConnectScanner;

impl TcpConnectScanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PortProber for TcpConnectScanner {
    async fn probe(&self, addr: SocketAddrV4, timeout: Duration) -> ProbeOutcome {
        match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                // Connection successful - close quickly
                drop(stream);
                ProbeOutcome::Open
            }
            Ok(Err(e)) => classify_connect_error(&e),
            Err(_) => ProbeOutcome::Closed,
        }
    }

    async fn exchange(
        &self,
        addr: SocketAddrV4,
        payload: &[u8],
        read_limit: usize,
        timeout: Duration,
    ) -> crate::Result<Vec<u8>> {
        let result = tokio::time::timeout(timeout, async {
            let mut stream = TcpStream::connect(addr).await?;
            let _ = stream.set_nodelay(true);
            stream.write_all(payload).await?;

            let mut buf = vec![0u8; read_limit];
            let n = stream.read(&mut buf).await?;
            buf.truncate(n);
            Ok::<_, io::Error>(buf)
        })
        .await;

        match result {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ScanError::NetworkError(format!("{}: {}", addr, e))),
            Err(_) => Err(ScanError::NetworkError(format!(
                "{}: no response within {:?}",
                addr, timeout
            ))),
        }
    }
}

/// Map a connect error onto a probe outcome
///
/// Refusals, timeouts and unreachable hosts mean nothing is listening.
/// Local problems (permissions, address binding, descriptor exhaustion)
/// are failures of the probe itself and keep their reason.
pub fn classify_connect_error(err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock => ProbeOutcome::Closed,
        io::ErrorKind::PermissionDenied
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::OutOfMemory => ProbeOutcome::Error(err.to_string()),
        _ => match err.raw_os_error() {
            Some(code) if is_resource_exhaustion(code) => ProbeOutcome::Error(err.to_string()),
            // EHOSTUNREACH, ENETUNREACH and friends
            _ => ProbeOutcome::Closed,
        },
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(code: i32) -> bool {
    code == libc::EMFILE || code == libc::ENFILE || code == libc::ENOBUFS
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_code: i32) -> bool {
    false
}

/// Probe primitive with the boolean contract: `true` iff the connection completes
///
/// Never fails; every error is treated as "closed".
pub async fn probe(host: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    TcpConnectScanner::new()
        .probe(SocketAddrV4::new(host, port), timeout)
        .await
        .is_open()
}
