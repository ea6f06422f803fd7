//! Network module: addressing, probe targets and the TCP probe primitive

pub mod locator;
pub mod socket;

use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// Device classes the scanner looks for
///
/// The serialized form is the `type` tag written into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Zebra-style label printers (raw socket / ZPL ports)
    #[serde(rename = "zebra")]
    Printer,
    /// Microsoft SQL Server
    #[serde(rename = "mssql")]
    Database,
    /// Generic HTTP services
    #[serde(rename = "http")]
    Http,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 3] = [
        DeviceClass::Printer,
        DeviceClass::Database,
        DeviceClass::Http,
    ];

    /// Tag used in the `type` field of a device record
    pub fn type_tag(&self) -> &'static str {
        match self {
            DeviceClass::Printer => "zebra",
            DeviceClass::Database => "mssql",
            DeviceClass::Http => "http",
        }
    }

    /// Key of this class under `devices` in the report
    pub fn report_key(&self) -> &'static str {
        match self {
            DeviceClass::Printer => "zebra_printers",
            DeviceClass::Database => "mssql_servers",
            DeviceClass::Http => "http_services",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DeviceClass::Printer => "Zebra printers",
            DeviceClass::Database => "MSSQL servers",
            DeviceClass::Http => "HTTP services",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// First three octets of an IPv4 address; the /24 that gets scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NetworkPrefix([u8; 3]);

impl NetworkPrefix {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Prefix of the /24 containing `addr`
    pub fn of(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self([a, b, c])
    }

    pub fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// Host `prefix.suffix`
    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, suffix)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let [a, b, c, _] = addr.octets();
        self.0 == [a, b, c]
    }
}

impl fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{}.{}.{}", a, b, c)
    }
}

impl FromStr for NetworkPrefix {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(ScanError::InvalidTarget(format!("Invalid network prefix: {}", s)));
        }

        let mut octets = [0u8; 3];
        for (slot, part) in octets.iter_mut().zip(parts) {
            *slot = part
                .parse()
                .map_err(|_| ScanError::InvalidTarget(format!("Invalid network prefix: {}", s)))?;
        }

        Ok(Self(octets))
    }
}

impl From<NetworkPrefix> for String {
    fn from(prefix: NetworkPrefix) -> Self {
        prefix.to_string()
    }
}

impl TryFrom<String> for NetworkPrefix {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One host:port pair to probe on behalf of a device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeTarget {
    pub host: Ipv4Addr,
    pub port: u16,
    pub class: DeviceClass,
}

impl ProbeTarget {
    pub fn new(host: Ipv4Addr, port: u16, class: DeviceClass) -> Self {
        Self { host, port, class }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.class)
    }
}

/// Result of a single connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The TCP handshake completed
    Open,
    /// Refused or timed out
    Closed,
    /// The probe mechanism itself failed (descriptor exhaustion, permissions)
    Error(String),
}

impl ProbeOutcome {
    /// Collapse to the open/closed boolean used by the aggregator
    pub fn is_open(&self) -> bool {
        matches!(self, ProbeOutcome::Open)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Open => write!(f, "open"),
            ProbeOutcome::Closed => write!(f, "closed"),
            ProbeOutcome::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}
