//! Printer identification
//!
//! Runs against ports already found open. A status query is written to the
//! printer's raw socket port and the reply is searched for a known model
//! family; a match becomes the record's model label.

use crate::config::IdentifyConfig;
use crate::network::socket::PortProber;
use std::net::SocketAddrV4;

/// Queries open printer ports for a model string
#[derive(Debug, Clone)]
pub struct PrinterIdentifier {
    config: IdentifyConfig,
}

impl PrinterIdentifier {
    pub fn new(config: IdentifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    /// Try each configured query until one yields a model label
    ///
    /// Failures (no answer, reset, unrecognized reply) resolve to `None`.
    pub async fn identify(&self, prober: &dyn PortProber, addr: SocketAddrV4) -> Option<String> {
        let timeout = self.config.timeout_duration();

        for query in &self.config.queries {
            match prober
                .exchange(addr, query.as_bytes(), self.config.read_limit, timeout)
                .await
            {
                Ok(response) => {
                    let model =
                        extract_model(&response, &self.config.markers, self.config.max_label_len);
                    if let Some(model) = model {
                        return Some(model);
                    }
                    log::debug!("{} answered {:?} without a known model", addr, query.trim());
                }
                Err(e) => {
                    log::debug!("Identification of {} failed: {}", addr, e);
                }
            }
        }

        None
    }
}

/// Model label from a raw printer response
///
/// The response is decoded lossily and trimmed. It is accepted only if it
/// contains one of `markers`, and is cut to `max_len` characters.
pub fn extract_model(response: &[u8], markers: &[String], max_len: usize) -> Option<String> {
    let text = String::from_utf8_lossy(response);
    let text = text.trim();

    if text.is_empty() || !markers.iter().any(|m| !m.is_empty() && text.contains(m.as_str())) {
        return None;
    }

    Some(text.chars().take(max_len).collect())
}
