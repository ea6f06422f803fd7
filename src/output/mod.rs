//! Discovery report: document model, persistence and terminal summary

use crate::network::{DeviceClass, NetworkPrefix};
use crate::scanner::{DeviceInventory, DeviceRecord};
use crate::ScanError;
use chrono::{DateTime, Local};
use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Devices grouped by class, as laid out in the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSections {
    #[serde(default)]
    pub zebra_printers: Vec<DeviceRecord>,
    #[serde(default)]
    pub mssql_servers: Vec<DeviceRecord>,
    #[serde(default)]
    pub http_services: Vec<DeviceRecord>,
}

impl DeviceSections {
    pub fn get(&self, class: DeviceClass) -> &[DeviceRecord] {
        match class {
            DeviceClass::Printer => &self.zebra_printers,
            DeviceClass::Database => &self.mssql_servers,
            DeviceClass::Http => &self.http_services,
        }
    }

    fn get_mut(&mut self, class: DeviceClass) -> &mut Vec<DeviceRecord> {
        match class {
            DeviceClass::Printer => &mut self.zebra_printers,
            DeviceClass::Database => &mut self.mssql_servers,
            DeviceClass::Http => &mut self.http_services,
        }
    }

    pub fn total(&self) -> usize {
        self.zebra_printers.len() + self.mssql_servers.len() + self.http_services.len()
    }
}

/// The persisted snapshot of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub scan_date: DateTime<Local>,
    pub local_ips: Vec<Ipv4Addr>,
    pub networks: Vec<NetworkPrefix>,
    pub devices: DeviceSections,
}

impl DiscoveryReport {
    /// Empty report for a scan started at `scan_date`
    pub fn new(
        scan_date: DateTime<Local>,
        local_ips: Vec<Ipv4Addr>,
        networks: Vec<NetworkPrefix>,
    ) -> Self {
        Self {
            scan_date,
            local_ips,
            networks,
            devices: DeviceSections::default(),
        }
    }

    /// Fill the device sections from an aggregated inventory
    pub fn with_inventory(mut self, inventory: DeviceInventory) -> Self {
        for (class, records) in inventory.into_devices() {
            self.devices.get_mut(class).extend(records);
        }
        self
    }

    pub fn devices(&self, class: DeviceClass) -> &[DeviceRecord] {
        self.devices.get(class)
    }

    pub fn total_devices(&self) -> usize {
        self.devices.total()
    }

    /// Check the report's structural guarantees
    ///
    /// Every record sits in its class's section, inside a scanned network,
    /// and no (host, port) pair repeats within a class.
    pub fn check_invariants(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();

        for class in DeviceClass::ALL {
            for record in self.devices(class) {
                if record.class != class {
                    return Err(ScanError::OutputError(format!(
                        "{} listed under {}",
                        record.endpoint(),
                        class.report_key()
                    )));
                }
                if !self.networks.iter().any(|n| n.contains(record.host)) {
                    return Err(ScanError::OutputError(format!(
                        "{} is outside the scanned networks",
                        record.endpoint()
                    )));
                }
                if !seen.insert((class, record.host, record.port)) {
                    return Err(ScanError::OutputError(format!(
                        "{} appears twice under {}",
                        record.endpoint(),
                        class.report_key()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a report written by [`ReportWriter`]
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Writes the report as a single atomic overwrite
#[derive(Debug, Clone)]
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `report` next to the target and rename it into place
    ///
    /// Parent directories are created as needed. A failure leaves any
    /// previous report untouched.
    pub fn write(&self, report: &DiscoveryReport) -> crate::Result<()> {
        let mut json = report.to_json()?;
        json.push('\n');

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&dir).map_err(|e| {
            ScanError::OutputError(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            ScanError::OutputError(format!("Failed to create file in {}: {}", dir.display(), e))
        })?;

        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ScanError::OutputError(format!("Failed to write report: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
        }

        tmp.persist(&self.path).map_err(|e| {
            ScanError::OutputError(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        log::info!("Results saved to: {}", self.path.display());
        Ok(())
    }
}

/// Human-readable summary of a report
pub fn format_summary(report: &DiscoveryReport, colored: bool) -> String {
    let paint = |text: String, color: Color| -> String {
        if colored {
            text.color(color).to_string()
        } else {
            text
        }
    };

    let mut output = String::new();
    output.push_str(&"=".repeat(60));
    output.push_str("\nSUMMARY\n");
    output.push_str(&"=".repeat(60));
    output.push('\n');

    for class in DeviceClass::ALL {
        let label = format!("{}:", class.description());
        output.push_str(&format!("  {:<16}{}\n", label, report.devices(class).len()));
    }
    output.push('\n');

    if report.total_devices() == 0 {
        output.push_str(&paint("  No devices found\n".to_string(), Color::BrightYellow));
        return output;
    }

    for class in DeviceClass::ALL {
        let color = match class {
            DeviceClass::Printer => Color::BrightGreen,
            DeviceClass::Database => Color::BrightBlue,
            DeviceClass::Http => Color::BrightCyan,
        };
        for record in report.devices(class) {
            let mut line = format!("  {:<6} {}", class.type_tag(), paint(record.endpoint(), color));
            if let Some(model) = &record.model {
                line.push_str(&format!("  {}", model));
            }
            output.push_str(&line);
            output.push('\n');
        }
    }

    output
}
