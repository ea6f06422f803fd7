//! Configuration module for the lanscout scanner

use crate::network::{DeviceClass, NetworkPrefix};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default location of the discovery report, relative to the working directory
pub const DEFAULT_REPORT_PATH: &str = "logs/discovered_devices.json";

/// Upper bound for concurrent probes per device-class phase
pub const MAX_CONCURRENCY: usize = 65535;

/// Address-range profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanProfile {
    /// Curated subset of likely static-IP ranges
    Quick,
    /// Every host in the /24
    Full,
}

impl ScanProfile {
    pub fn name(&self) -> &'static str {
        match self {
            ScanProfile::Quick => "quick",
            ScanProfile::Full => "full",
        }
    }
}

impl fmt::Display for ScanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScanProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" | "q" => Ok(ScanProfile::Quick),
            "full" | "f" => Ok(ScanProfile::Full),
            _ => Err(format!("Unknown scan profile: {}", s)),
        }
    }
}

/// Inclusive range of host suffixes within a /24
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRange {
    pub start: u8,
    pub end: u8,
}

impl HostRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Suffixes in the range, clamped to 1..=254
    pub fn suffixes(&self) -> impl Iterator<Item = u8> {
        self.start.max(1)..=self.end.min(254)
    }
}

/// Quick-profile host ranges. A heuristic for common static-IP blocks.
pub const QUICK_RANGES: [HostRange; 3] = [
    HostRange::new(1, 50),
    HostRange::new(100, 150),
    HostRange::new(200, 254),
];

/// Ports probed for one device class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPorts {
    pub class: DeviceClass,
    pub ports: Vec<u16>,
}

impl ClassPorts {
    pub fn new(class: DeviceClass, ports: Vec<u16>) -> Self {
        Self { class, ports }
    }
}

/// Printer identification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyConfig {
    /// Printer ports that get a status query once found open
    pub ports: Vec<u16>,

    /// Timeout for the whole exchange in milliseconds
    pub timeout: u64,

    /// Queries tried in order until one yields a model label
    pub queries: Vec<String>,

    /// Substrings that mark a response as coming from a known printer
    pub markers: Vec<String>,

    /// Maximum length of the model label, in characters
    pub max_label_len: usize,

    /// Maximum number of response bytes read
    pub read_limit: usize,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            ports: vec![9100],
            timeout: 2000,
            queries: vec!["~HS\r\n".to_string(), "~HI\r\n".to_string()],
            markers: vec!["ZT".to_string(), "ZD".to_string(), "GK".to_string()],
            max_label_len: 50,
            read_limit: 1024,
        }
    }
}

impl IdentifyConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn applies_to(&self, class: DeviceClass, port: u16) -> bool {
        class == DeviceClass::Printer && self.ports.contains(&port)
    }
}

/// Immutable scan settings handed to the scheduler at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Address-range profile
    pub profile: ScanProfile,

    /// Device classes to scan, in phase order, with their ports
    pub classes: Vec<ClassPorts>,

    /// Host ranges used by the quick profile
    pub quick_ranges: Vec<HostRange>,

    /// Timeout for each connection attempt in milliseconds
    pub timeout: u64,

    /// Maximum concurrent probes per device-class phase
    pub concurrency: usize,

    /// Printer identification
    pub identify: IdentifyConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl ScanConfig {
    /// Full profile: every host, all three device classes
    pub fn full() -> Self {
        Self {
            profile: ScanProfile::Full,
            classes: vec![
                ClassPorts::new(DeviceClass::Printer, vec![9100, 6101]),
                ClassPorts::new(DeviceClass::Database, vec![1433]),
                ClassPorts::new(DeviceClass::Http, vec![80, 8080, 8081, 8082, 8091, 8092]),
            ],
            quick_ranges: QUICK_RANGES.to_vec(),
            timeout: 1000,
            concurrency: 50,
            identify: IdentifyConfig::default(),
        }
    }

    /// Quick profile: curated host ranges, printers and database only
    pub fn quick() -> Self {
        let mut config = Self::full();
        config.profile = ScanProfile::Quick;
        config.classes.retain(|c| c.class != DeviceClass::Http);
        config.concurrency = 30;
        config
    }

    pub fn for_profile(profile: ScanProfile) -> Self {
        match profile {
            ScanProfile::Quick => Self::quick(),
            ScanProfile::Full => Self::full(),
        }
    }

    /// Set the ports of a class, adding the class if it is not scanned yet
    pub fn with_ports(mut self, class: DeviceClass, ports: Vec<u16>) -> Self {
        match self.classes.iter_mut().find(|c| c.class == class) {
            Some(entry) => entry.ports = ports,
            None => self.classes.push(ClassPorts::new(class, ports)),
        }
        self
    }

    /// Stop scanning a class
    pub fn without_class(mut self, class: DeviceClass) -> Self {
        self.classes.retain(|c| c.class != class);
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_identify(mut self, identify: IdentifyConfig) -> Self {
        self.identify = identify;
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Ports configured for `class`, empty if the class is not scanned
    pub fn ports_for(&self, class: DeviceClass) -> &[u16] {
        self.classes
            .iter()
            .find(|c| c.class == class)
            .map(|c| c.ports.as_slice())
            .unwrap_or(&[])
    }

    /// Candidate host suffixes for the active profile, ascending and unique
    pub fn host_suffixes(&self) -> Vec<u8> {
        let mut suffixes: Vec<u8> = match self.profile {
            ScanProfile::Full => (1..=254).collect(),
            ScanProfile::Quick => self.quick_ranges.iter().flat_map(|r| r.suffixes()).collect(),
        };
        suffixes.sort_unstable();
        suffixes.dedup();
        suffixes
    }

    /// Candidate hosts in `prefix` for the active profile
    pub fn candidate_hosts(&self, prefix: NetworkPrefix) -> Vec<Ipv4Addr> {
        self.host_suffixes().into_iter().map(|s| prefix.host(s)).collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.classes.is_empty() {
            return Err(crate::ScanError::ConfigError("No device classes to scan".to_string()));
        }

        for entry in &self.classes {
            if entry.ports.is_empty() {
                return Err(crate::ScanError::ConfigError(format!(
                    "No ports specified for {}",
                    entry.class
                )));
            }
            if entry.ports.contains(&0) {
                return Err(crate::ScanError::ConfigError(format!(
                    "Port 0 is not scannable ({})",
                    entry.class
                )));
            }
        }

        let duplicate_class = self
            .classes
            .iter()
            .enumerate()
            .any(|(i, a)| self.classes[..i].iter().any(|b| b.class == a.class));
        if duplicate_class {
            return Err(crate::ScanError::ConfigError("Device class listed twice".to_string()));
        }

        if self.timeout == 0 || self.identify.timeout == 0 {
            return Err(crate::ScanError::ConfigError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(crate::ScanError::ConfigError(format!(
                "Concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            )));
        }

        if self.identify.max_label_len == 0 || self.identify.read_limit == 0 {
            return Err(crate::ScanError::ConfigError(
                "Identification label length and read limit must be greater than 0".to_string(),
            ));
        }

        if self.profile == ScanProfile::Quick && self.host_suffixes().is_empty() {
            return Err(crate::ScanError::ConfigError(
                "Quick profile has no host ranges".to_string(),
            ));
        }

        Ok(())
    }
}

/// Optional overrides loaded from a TOML file
///
/// ```toml
/// concurrency = 64
/// printer_ports = [9100]
/// output = "/var/lib/lanscout/devices.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    pub printer_ports: Option<Vec<u16>>,
    pub database_ports: Option<Vec<u16>>,
    pub http_ports: Option<Vec<u16>>,
    pub timeout_ms: Option<u64>,
    pub identify_timeout_ms: Option<u64>,
    pub identify_ports: Option<Vec<u16>>,
    pub concurrency: Option<usize>,
    pub model_markers: Option<Vec<String>>,
    pub quick_ranges: Option<Vec<HostRange>>,
    pub output: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Load overrides from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            crate::ScanError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::ScanError::ConfigError(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply overrides to a profile's defaults
    ///
    /// A class whose port list is overridden is only touched if the
    /// profile scans it.
    pub fn apply_to_config(&self, mut config: ScanConfig) -> ScanConfig {
        let port_overrides = [
            (DeviceClass::Printer, &self.printer_ports),
            (DeviceClass::Database, &self.database_ports),
            (DeviceClass::Http, &self.http_ports),
        ];
        for (class, ports) in port_overrides {
            if let Some(ports) = ports {
                if let Some(entry) = config.classes.iter_mut().find(|c| c.class == class) {
                    entry.ports = ports.clone();
                }
            }
        }

        if let Some(timeout) = self.timeout_ms {
            config.timeout = timeout;
        }
        if let Some(timeout) = self.identify_timeout_ms {
            config.identify.timeout = timeout;
        }
        if let Some(ports) = &self.identify_ports {
            config.identify.ports = ports.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(markers) = &self.model_markers {
            config.identify.markers = markers.clone();
        }
        if let Some(ranges) = &self.quick_ranges {
            config.quick_ranges = ranges.clone();
        }

        config
    }
}
