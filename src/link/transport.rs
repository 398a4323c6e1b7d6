//! Transport abstraction for any report-oriented byte channel.
//!
//! Concrete implementations:
//! - USB HID reports (`hid` feature)
//! - In-memory pair (simulation and tests)
//!
//! The engine is written against these traits only, so adding a byte
//! channel such as I2C or SPI requires zero changes to the protocol logic.

use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;

/// Per-transport parameters that shape fragmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParams {
    /// Bytes per report, excluding any leading pad byte.
    pub report_size: usize,
    /// Byte prepended to every written report (e.g. a HID report id).
    pub leading_pad: Option<u8>,
}

impl LinkParams {
    /// 64-byte HID reports, no pad.
    pub const HID: Self = Self {
        report_size: 64,
        leading_pad: None,
    };
}

impl Default for LinkParams {
    fn default() -> Self {
        Self::HID
    }
}

/// Report-oriented transport channel.
///
/// Methods take `&self`: the receive worker reads while the caller thread
/// writes, so implementations provide their own interior locking.
pub trait Transport: Send + Sync {
    /// Write one report.
    fn write(&self, report: &[u8]) -> Result<(), TransportError>;

    /// Read one report, waiting at most `timeout`.
    /// An empty vector means the poll timed out; it is not end-of-stream.
    fn read(&self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Release the underlying device. Further reads and writes fail.
    fn close(&self);

    fn link(&self) -> LinkParams;
}

/// Opens transports by address and lists the addresses present.
pub trait Connector: Send + Sync {
    fn connect(&self, address: &str) -> Result<Arc<dyn Transport>, TransportError>;

    /// Addresses currently present, optionally restricted to `filter`.
    fn enumerate(&self, filter: Option<&str>) -> Result<Vec<String>, TransportError>;
}
