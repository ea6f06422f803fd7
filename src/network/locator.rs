//! Local network detection
//!
//! Finds the single IPv4 address the scan is anchored on. Each strategy is
//! tried in order and the first hit wins; when all of them come up empty a
//! placeholder keeps the pipeline usable.

use crate::network::NetworkPrefix;
use crate::ScanError;
use pnet::ipnetwork::IpNetwork;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};

/// Address returned when no strategy produces one
pub const PLACEHOLDER_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Public address used only to ask the kernel for a route; nothing is sent
pub const ROUTE_PROBE_ADDRESS: &str = "8.8.8.8:80";

/// Which strategy produced the local address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// Source address of the default route
    Route,
    /// First non-loopback interface address
    Interface,
    /// Resolution of the local hostname
    Hostname,
    /// Hard-coded fallback
    Placeholder,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSource::Route => write!(f, "default route"),
            AddressSource::Interface => write!(f, "interface"),
            AddressSource::Hostname => write!(f, "hostname"),
            AddressSource::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// This machine's address on the network to be scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddress {
    pub addr: Ipv4Addr,
    pub source: AddressSource,
}

impl LocalAddress {
    pub fn prefix(&self) -> NetworkPrefix {
        NetworkPrefix::of(self.addr)
    }
}

/// Determines the primary outbound IPv4 address
#[derive(Debug, Clone)]
pub struct NetworkLocator {
    route_probe: String,
}

impl Default for NetworkLocator {
    fn default() -> Self {
        Self {
            route_probe: ROUTE_PROBE_ADDRESS.to_string(),
        }
    }
}

impl NetworkLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different destination for the route lookup
    pub fn with_route_probe(mut self, route_probe: impl Into<String>) -> Self {
        self.route_probe = route_probe.into();
        self
    }

    /// Run the strategy chain. Never fails.
    pub fn detect(&self) -> LocalAddress {
        let route = || match self.route_source() {
            Ok(addr) => Some(addr),
            Err(e) => {
                log::debug!("Route lookup failed: {}", e);
                None
            }
        };

        first_available(&[
            (AddressSource::Route, &route),
            (AddressSource::Interface, &first_interface_address),
            (AddressSource::Hostname, &hostname_address),
        ])
    }

    /// Source address the kernel would pick to reach the route probe
    pub fn route_source(&self) -> crate::Result<Ipv4Addr> {
        let socket =
            UdpSocket::bind("0.0.0.0:0").map_err(|e| ScanError::NetworkError(e.to_string()))?;
        socket
            .connect(self.route_probe.as_str())
            .map_err(|e| ScanError::NetworkError(e.to_string()))?;

        let local_addr = socket.local_addr().map_err(|e| ScanError::NetworkError(e.to_string()))?;

        match local_addr.ip() {
            IpAddr::V4(v4) if usable(v4) => Ok(v4),
            IpAddr::V4(v4) => Err(ScanError::NetworkError(format!(
                "Route source {} is not usable",
                v4
            ))),
            IpAddr::V6(_) => Err(ScanError::InvalidTarget("IPv6 not supported".to_string())),
        }
    }
}

/// Try each strategy in order; fall back to [`PLACEHOLDER_ADDRESS`]
pub fn first_available(
    strategies: &[(AddressSource, &dyn Fn() -> Option<Ipv4Addr>)],
) -> LocalAddress {
    for (source, strategy) in strategies {
        if let Some(addr) = strategy() {
            log::debug!("Local address {} from {}", addr, source);
            return LocalAddress { addr, source: *source };
        }
        log::debug!("No local address from {}", source);
    }

    log::warn!("Could not determine local address, using placeholder {}", PLACEHOLDER_ADDRESS);
    LocalAddress {
        addr: PLACEHOLDER_ADDRESS,
        source: AddressSource::Placeholder,
    }
}

/// First non-loopback IPv4 address among `candidates`
pub fn select_first_ipv4<I>(candidates: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    candidates.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if usable(v4) => Some(v4),
        _ => None,
    })
}

fn usable(addr: Ipv4Addr) -> bool {
    !addr.is_loopback() && !addr.is_unspecified()
}

/// First non-loopback IPv4 address of any interface that is up
pub fn first_interface_address() -> Option<Ipv4Addr> {
    let addresses = pnet::datalink::interfaces()
        .into_iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| iface.ips.into_iter())
        .filter_map(|net| match net {
            IpNetwork::V4(v4) => Some(IpAddr::V4(v4.ip())),
            IpNetwork::V6(_) => None,
        });

    select_first_ipv4(addresses)
}

/// First IPv4 address the local hostname resolves to
///
/// Loopback results are accepted here; this is the last real strategy.
pub fn hostname_address() -> Option<Ipv4Addr> {
    let name = hostname::get().ok()?.into_string().ok()?;

    let resolved = (name.as_str(), 0u16).to_socket_addrs().ok()?;
    resolved.into_iter().find_map(|addr: SocketAddr| match addr.ip() {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}
