//! Network layer tests against real loopback sockets

use lanscout::config::IdentifyConfig;
use lanscout::discovery::PrinterIdentifier;
use lanscout::network::locator::{AddressSource, NetworkLocator, PLACEHOLDER_ADDRESS};
use lanscout::network::socket::{self, PortProber, TcpConnectScanner};
use lanscout::ProbeOutcome;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

async fn loopback_listener() -> (TcpListener, SocketAddrV4) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = match listener.local_addr().unwrap() {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => unreachable!("bound to an IPv4 address"),
    };
    (listener, addr)
}

/// Serve one connection: read the query, answer with `reply`
fn serve_once(listener: TcpListener, reply: &'static [u8]) -> tokio::task::JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        stream.write_all(reply).await.unwrap();
        buf.truncate(n);
        buf
    })
}

#[tokio::test]
async fn test_probe_open_port() {
    let (listener, addr) = loopback_listener().await;
    let scanner = TcpConnectScanner::new();

    let outcome = scanner.probe(addr, Duration::from_secs(1)).await;
    assert_eq!(outcome, ProbeOutcome::Open);
    assert!(socket::probe(*addr.ip(), addr.port(), Duration::from_secs(1)).await);

    drop(listener);
}

#[tokio::test]
async fn test_probe_closed_port() {
    let (listener, addr) = loopback_listener().await;
    drop(listener);

    let start = Instant::now();
    let outcome = TcpConnectScanner::new().probe(addr, Duration::from_secs(1)).await;

    assert_eq!(outcome, ProbeOutcome::Closed);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!socket::probe(*addr.ip(), addr.port(), Duration::from_secs(1)).await);
}

#[tokio::test]
async fn test_exchange_reads_reply() {
    let (listener, addr) = loopback_listener().await;
    let server = serve_once(listener, b"ZT230-200dpi ZPL\r\n");

    let response = TcpConnectScanner::new()
        .exchange(addr, b"~HS\r\n", 1024, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(response, b"ZT230-200dpi ZPL\r\n");
    assert_eq!(server.await.unwrap(), b"~HS\r\n");
}

#[tokio::test]
async fn test_exchange_respects_read_limit() {
    let (listener, addr) = loopback_listener().await;
    let _server = serve_once(listener, b"0123456789");

    let response = TcpConnectScanner::new()
        .exchange(addr, b"~HS\r\n", 4, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(response.len() <= 4);
}

#[tokio::test]
async fn test_identify_against_listener() {
    let (listener, addr) = loopback_listener().await;
    let _server = serve_once(listener, b"  ZD620 ready\r\n");

    let identifier = PrinterIdentifier::new(IdentifyConfig::default());
    let model = identifier.identify(&TcpConnectScanner::new(), addr).await;

    assert_eq!(model.as_deref(), Some("ZD620 ready"));
}

#[tokio::test]
async fn test_identify_silent_printer_times_out() {
    let (listener, addr) = loopback_listener().await;
    // Accept but never answer
    let _server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let config = IdentifyConfig {
        timeout: 200,
        ..IdentifyConfig::default()
    };
    let identifier = PrinterIdentifier::new(config);

    let start = Instant::now();
    let model = identifier.identify(&TcpConnectScanner::new(), addr).await;

    assert!(model.is_none());
    // Two queries, each bounded by the identification timeout
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_identify_closed_port() {
    let (listener, addr) = loopback_listener().await;
    drop(listener);

    let identifier = PrinterIdentifier::new(IdentifyConfig::default());
    assert!(identifier.identify(&TcpConnectScanner::new(), addr).await.is_none());
}

#[test]
fn test_locator_never_fails() {
    let local = NetworkLocator::new().detect();
    assert!(!local.addr.is_unspecified());
    if local.source == AddressSource::Placeholder {
        assert_eq!(local.addr, PLACEHOLDER_ADDRESS);
    }
    assert!(local.prefix().contains(local.addr));
}

#[test]
fn test_route_lookup_rejects_loopback_source() {
    // The kernel picks 127.0.0.1 to reach loopback, which is not scannable
    let locator = NetworkLocator::new().with_route_probe("127.0.0.1:80");
    assert!(locator.route_source().is_err());
}
