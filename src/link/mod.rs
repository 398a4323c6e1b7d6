//! Report link: transport traits, fragmentation and session handshake.
//!
//! ```text
//! ┌────────────┐  split   ┌────────────────┐  write  ┌───────────┐
//! │ frame bytes│─────────▶│ token-prefixed │────────▶│ Transport │
//! │            │◀─────────│ reports        │◀────────│ (trait)   │
//! └────────────┘ reassemble└───────────────┘  read   └───────────┘
//! ```

pub mod fragment;
pub mod handshake;
#[cfg(feature = "hid")]
pub mod hid;
pub mod memory;
pub mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{trace, warn};

use crate::error::{Result, TransportError};

pub use fragment::{ConnectionToken, DropReason, Feed, Reassembler};
pub use transport::{Connector, LinkParams, Transport};

/// Message-level view of a transport for one session.
#[derive(Clone)]
pub struct FragmentStream {
    transport: Arc<dyn Transport>,
    token: ConnectionToken,
}

impl FragmentStream {
    pub fn new(transport: Arc<dyn Transport>, token: ConnectionToken) -> Self {
        Self { transport, token }
    }

    pub fn token(&self) -> ConnectionToken {
        self.token
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Fragment and write one encoded message.
    pub fn send(&self, encoded: &[u8]) -> Result<()> {
        let reports = fragment::split(self.token, encoded, self.transport.link())?;
        trace!("link: sending {} bytes in {} reports", encoded.len(), reports.len());
        for report in &reports {
            self.transport.write(report)?;
        }
        Ok(())
    }

    /// Read and reassemble until `running` clears.
    ///
    /// Every completed message is handed to `on_frame`. Returns `Ok(())`
    /// on cooperative shutdown and the transport error if the link fails.
    pub fn receive_loop<F>(
        &self,
        running: &AtomicBool,
        poll: Duration,
        mut on_frame: F,
    ) -> core::result::Result<(), TransportError>
    where
        F: FnMut(Vec<u8>),
    {
        let mut reassembler = Reassembler::new(self.token);
        while running.load(Ordering::Acquire) {
            let report = self.transport.read(poll)?;
            if report.is_empty() {
                continue;
            }
            match reassembler.feed(&report) {
                Feed::Pending => {}
                Feed::Complete(frame) => on_frame(frame),
                Feed::Dropped(reason) => warn!("link: dropped report ({})", reason),
            }
        }
        Ok(())
    }
}
