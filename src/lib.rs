//! lanscout - LAN device discovery for label printers, SQL Server and HTTP services
//!
//! Scans the local /24 with TCP connect probes, identifies Zebra printer
//! models and writes a JSON inventory for downstream tools.

pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;

// Re-export commonly used types
pub use config::{ConfigOverrides, ScanConfig, ScanProfile};
pub use discovery::DiscoveryRunner;
pub use error::ScanError;
pub use network::{DeviceClass, NetworkPrefix, ProbeOutcome, ProbeTarget};
pub use output::{DiscoveryReport, ReportWriter};
pub use scanner::{DeviceRecord, ScanEngine, ScanStats};

pub type Result<T> = std::result::Result<T, ScanError>;
