//! Scanner module: device records, result aggregation and the scan engine

pub mod engine;

use crate::network::{DeviceClass, ProbeOutcome, ProbeTarget};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::time::Duration;

pub use engine::ScanEngine;

/// A device found listening on one of its class's ports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub host: Ipv4Addr,
    pub port: u16,
    #[serde(rename = "type")]
    pub class: DeviceClass,
    pub discovered_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DeviceRecord {
    pub fn new(target: ProbeTarget, discovered_at: DateTime<Local>) -> Self {
        Self {
            host: target.host,
            port: target.port,
            class: target.class,
            discovered_at,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Outcome of one probe task, sent from the worker to the aggregator
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    pub target: ProbeTarget,
    pub outcome: ProbeOutcome,
    pub record: Option<DeviceRecord>,
}

/// Per-class device lists in arrival order
///
/// Owned by the single consumer of the results channel. A `(host, port)`
/// pair is kept at most once per class.
#[derive(Debug, Clone, Default)]
pub struct DeviceInventory {
    devices: BTreeMap<DeviceClass, Vec<DeviceRecord>>,
    seen: HashSet<(DeviceClass, Ipv4Addr, u16)>,
}

impl DeviceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; returns `false` if the pair was already recorded
    pub fn insert(&mut self, record: DeviceRecord) -> bool {
        if !self.seen.insert((record.class, record.host, record.port)) {
            return false;
        }
        self.devices.entry(record.class).or_default().push(record);
        true
    }

    pub fn get(&self, class: DeviceClass) -> &[DeviceRecord] {
        self.devices.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn into_devices(self) -> BTreeMap<DeviceClass, Vec<DeviceRecord>> {
        self.devices
    }
}

/// Scan statistics for logging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Probes that finished
    pub probes: u64,

    /// Probes that found an open port
    pub open: u64,

    /// Refused or timed out probes
    pub closed: u64,

    /// Probes whose mechanism failed
    pub errors: u64,

    /// Open printer ports that returned a model label
    pub identified: u64,

    /// Repeated (host, port) pairs dropped by the aggregator
    pub duplicates: u64,

    /// Probe tasks that panicked
    pub failed_tasks: u64,

    /// Total scan duration
    pub duration: Duration,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one finished probe
    pub fn record(&mut self, event: &ProbeEvent) {
        self.probes += 1;
        match event.outcome {
            ProbeOutcome::Open => self.open += 1,
            ProbeOutcome::Closed => self.closed += 1,
            ProbeOutcome::Error(_) => self.errors += 1,
        }
        if event.record.as_ref().is_some_and(|r| r.model.is_some()) {
            self.identified += 1;
        }
    }

    /// Probes per second over the whole scan
    pub fn scan_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.probes as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Aggregated result of one scan
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub inventory: DeviceInventory,
    pub stats: ScanStats,
}
