//! Device discovery: locate the local network, scan it, build the report

pub mod identify;

use crate::config::ScanConfig;
use crate::network::locator::{LocalAddress, NetworkLocator};
use crate::network::NetworkPrefix;
use crate::output::DiscoveryReport;
use crate::scanner::{ScanEngine, ScanStats};
use chrono::Local;
use std::net::Ipv4Addr;

pub use identify::PrinterIdentifier;

/// Runs one complete discovery pass
#[derive(Debug, Clone)]
pub struct DiscoveryRunner {
    engine: ScanEngine,
    locator: NetworkLocator,
}

impl DiscoveryRunner {
    /// Runner with real TCP probing and the default locator
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        Ok(Self::with_engine(ScanEngine::new(config)?, NetworkLocator::new()))
    }

    pub fn with_engine(engine: ScanEngine, locator: NetworkLocator) -> Self {
        Self { engine, locator }
    }

    /// Detect the local address and scan its /24
    pub async fn run(&self) -> crate::Result<(DiscoveryReport, ScanStats)> {
        let local: LocalAddress = self.locator.detect();
        log::info!("Local IP: {} (from {})", local.addr, local.source);

        self.run_from(vec![local.addr]).await
    }

    /// Scan the /24 of each given local address
    ///
    /// Addresses sharing a /24 are scanned once.
    pub async fn run_from(
        &self,
        local_ips: Vec<Ipv4Addr>,
    ) -> crate::Result<(DiscoveryReport, ScanStats)> {
        let scan_date = Local::now();

        let mut networks: Vec<NetworkPrefix> = Vec::new();
        for ip in &local_ips {
            let prefix = NetworkPrefix::of(*ip);
            if !networks.contains(&prefix) {
                networks.push(prefix);
            }
        }

        let outcome = self.engine.scan(&networks).await?;
        let report = DiscoveryReport::new(scan_date, local_ips, networks)
            .with_inventory(outcome.inventory);

        Ok((report, outcome.stats))
    }
}
