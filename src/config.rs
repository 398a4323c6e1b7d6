//! Engine configuration parameters
//!
//! All tunable timings and queue depths for a host session. Defaults match
//! the controller's documented behaviour; a JSON file can override any
//! subset of fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Firmware page size in bytes. Fixed by the bootloader.
pub const PAGE_SIZE: usize = 128;

/// Session engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // --- Timing ---
    /// How long `call` waits for the matching response
    pub call_timeout_ms: u64,
    /// Transport read poll used by the receive worker
    pub read_poll_ms: u64,
    /// Event queue poll used by the dispatch worker
    pub event_poll_ms: u64,
    /// How long to wait for the handshake reply
    pub handshake_timeout_ms: u64,

    // --- Queues ---
    /// Responses buffered between the receive worker and `call`
    pub response_queue_depth: usize,
    /// Events buffered between the receive worker and the dispatcher
    pub event_queue_depth: usize,

    // --- Firmware ---
    pub firmware: FirmwareConfig,
}

/// Firmware download timings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Pause after closing, before the device is polled for again
    pub reset_settle_ms: u64,
    /// Interval between enumeration polls while waiting for the bootloader
    pub reconnect_poll_ms: u64,
    /// Enumeration polls before the device is declared lost
    pub reconnect_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Timing
            call_timeout_ms: 20_000,
            read_poll_ms: 10,
            event_poll_ms: 100,
            handshake_timeout_ms: 500,

            // Queues
            response_queue_depth: 8,
            event_queue_depth: 64,

            firmware: FirmwareConfig::default(),
        }
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            reset_settle_ms: 500,
            reconnect_poll_ms: 100,
            reconnect_retries: 100, // ~10 s
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document. Missing fields keep defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Reject values that would stall or spin the workers.
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("call_timeout_ms", self.call_timeout_ms),
            ("read_poll_ms", self.read_poll_ms),
            ("event_poll_ms", self.event_poll_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("firmware.reconnect_poll_ms", self.firmware.reconnect_poll_ms),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be non-zero")));
            }
        }
        if self.response_queue_depth == 0 || self.event_queue_depth == 0 {
            return Err(Error::Config("queue depths must be non-zero".into()));
        }
        if self.read_poll_ms > self.call_timeout_ms {
            return Err(Error::Config(
                "read_poll_ms must not exceed call_timeout_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    pub fn event_poll(&self) -> Duration {
        Duration::from_millis(self.event_poll_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl FirmwareConfig {
    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn reconnect_poll(&self) -> Duration {
        Duration::from_millis(self.reconnect_poll_ms)
    }
}
