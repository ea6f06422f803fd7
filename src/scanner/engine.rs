//! Main scanning engine implementation
//!
//! One scheduler serves every device class: a class phase expands the
//! candidate hosts and the class's ports into probe targets and runs them
//! on a bounded set of tasks. Finished probes are sent to a single
//! collector that owns the inventory.

use crate::config::{ScanConfig, ScanProfile};
use crate::discovery::identify::PrinterIdentifier;
use crate::network::socket::{PortProber, TcpConnectScanner};
use crate::network::{DeviceClass, NetworkPrefix, ProbeOutcome, ProbeTarget};
use crate::scanner::{DeviceInventory, DeviceRecord, ProbeEvent, ScanOutcome, ScanStats};
use crate::ScanError;
use chrono::Local;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Main scanning engine
#[derive(Clone)]
pub struct ScanEngine {
    config: Arc<ScanConfig>,
    prober: Arc<dyn PortProber>,
    identifier: Arc<PrinterIdentifier>,
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ScanEngine {
    /// Create a scan engine that probes with real TCP connections
    pub fn new(config: ScanConfig) -> crate::Result<Self> {
        Self::with_prober(config, Arc::new(TcpConnectScanner::new()))
    }

    /// Create a scan engine on top of a custom transport
    pub fn with_prober(config: ScanConfig, prober: Arc<dyn PortProber>) -> crate::Result<Self> {
        config.validate()?;

        let identifier = Arc::new(PrinterIdentifier::new(config.identify.clone()));

        Ok(Self {
            config: Arc::new(config),
            prober,
            identifier,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Every (host, port) target of `class` in `prefix` for the active profile
    pub fn targets(&self, prefix: NetworkPrefix, class: DeviceClass) -> Vec<ProbeTarget> {
        let mut ports: Vec<u16> = Vec::new();
        for &port in self.config.ports_for(class) {
            if !ports.contains(&port) {
                ports.push(port);
            }
        }

        self.config
            .candidate_hosts(prefix)
            .into_iter()
            .flat_map(|host| ports.iter().map(move |&port| ProbeTarget::new(host, port, class)))
            .collect()
    }

    /// Scan every configured device class in each prefix
    ///
    /// Quick scans run the class phases one after another; full scans run
    /// them side by side. Either way the call returns once every probe has
    /// finished.
    pub async fn scan(&self, prefixes: &[NetworkPrefix]) -> crate::Result<ScanOutcome> {
        let start_time = Instant::now();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ProbeEvent>();

        let collector = tokio::spawn(collect_events(event_rx));

        let mut failed_tasks = 0;
        for &prefix in prefixes {
            log::info!("Scanning network {}.0/24 ({} profile)", prefix, self.config.profile);

            match self.config.profile {
                ScanProfile::Quick => {
                    for entry in &self.config.classes {
                        failed_tasks += self.run_phase(prefix, entry.class, event_tx.clone()).await;
                    }
                }
                ScanProfile::Full => {
                    let phases = self
                        .config
                        .classes
                        .iter()
                        .map(|entry| self.run_phase(prefix, entry.class, event_tx.clone()));
                    failed_tasks += join_all(phases).await.into_iter().sum::<u64>();
                }
            }
        }

        // Close the channel so the collector can finish
        drop(event_tx);

        let (inventory, mut stats) = collector
            .await
            .map_err(|e| ScanError::TaskError(format!("Result collector failed: {}", e)))?;

        stats.failed_tasks = failed_tasks;
        stats.duration = start_time.elapsed();

        log::info!(
            "Scan finished: {} probes, {} open, {} devices in {:.1}s",
            stats.probes,
            stats.open,
            inventory.len(),
            stats.duration.as_secs_f64()
        );

        Ok(ScanOutcome { inventory, stats })
    }

    /// Probe every target of one class; returns the number of failed tasks
    async fn run_phase(
        &self,
        prefix: NetworkPrefix,
        class: DeviceClass,
        event_tx: mpsc::UnboundedSender<ProbeEvent>,
    ) -> u64 {
        let targets = self.targets(prefix, class);
        let phase_start = Instant::now();

        log::info!(
            "Looking for {} (ports {:?}): {} probes",
            class.description(),
            self.config.ports_for(class),
            targets.len()
        );

        // Pool size is per phase, not global
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let timeout = self.config.timeout_duration();
        let mut tasks = JoinSet::new();

        for target in targets {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let prober = self.prober.clone();
            let identifier = self.identifier.clone();
            let sender = event_tx.clone();

            tasks.spawn(async move {
                let _permit = permit; // Keep permit alive
                let event = probe_target(prober.as_ref(), &identifier, target, timeout).await;
                let _ = sender.send(event);
            });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("Probe task failed: {}", e);
                failed += 1;
            }
        }

        log::info!(
            "Finished {} in {:.1}s",
            class.description(),
            phase_start.elapsed().as_secs_f64()
        );
        failed
    }
}

/// Probe one target and, if it is open, identify it
///
/// Identification runs inside the same task, so its latency never blocks
/// sibling probes.
pub async fn probe_target(
    prober: &dyn PortProber,
    identifier: &PrinterIdentifier,
    target: ProbeTarget,
    timeout: Duration,
) -> ProbeEvent {
    let addr = target.socket_addr();
    let outcome = prober.probe(addr, timeout).await;

    let record = match &outcome {
        ProbeOutcome::Open => {
            let discovered_at = Local::now();
            let model = if identifier.config().applies_to(target.class, target.port) {
                identifier.identify(prober, addr).await
            } else {
                None
            };
            Some(DeviceRecord::new(target, discovered_at).with_model(model))
        }
        ProbeOutcome::Closed => {
            log::trace!("{} closed", target);
            None
        }
        ProbeOutcome::Error(reason) => {
            log::warn!("Probe of {} failed: {}", target, reason);
            None
        }
    };

    ProbeEvent { target, outcome, record }
}

/// Single consumer of probe events; owns the inventory until the scan ends
async fn collect_events(
    mut event_rx: mpsc::UnboundedReceiver<ProbeEvent>,
) -> (DeviceInventory, ScanStats) {
    let mut inventory = DeviceInventory::new();
    let mut stats = ScanStats::new();

    while let Some(event) = event_rx.recv().await {
        stats.record(&event);

        if let Some(record) = event.record {
            let found = format_found(&record);
            if inventory.insert(record) {
                log::info!("{}", found);
            } else {
                stats.duplicates += 1;
            }
        }
    }

    (inventory, stats)
}

fn format_found(record: &DeviceRecord) -> String {
    match &record.model {
        Some(model) => format!("[+] Found {}: {} ({})", record.class, record.endpoint(), model),
        None => format!("[+] Found {}: {}", record.class, record.endpoint()),
    }
}
