//! In-memory transport pair.
//!
//! Two connected endpoints backed by `crossbeam-channel`: whatever one end
//! writes, the other end reads as a single report. Used to run the engine
//! against a simulated controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::error::TransportError;

use super::transport::{LinkParams, Transport};

/// One end of an in-memory link.
pub struct MemoryTransport {
    tx: Mutex<Option<Sender<Vec<u8>>>>,
    rx: Receiver<Vec<u8>>,
    link: LinkParams,
    closed: AtomicBool,
}

/// Create a connected `(host, device)` pair.
pub fn pair(link: LinkParams) -> (MemoryTransport, MemoryTransport) {
    let (host_tx, device_rx) = crossbeam_channel::unbounded();
    let (device_tx, host_rx) = crossbeam_channel::unbounded();
    (
        MemoryTransport::new(host_tx, host_rx, link),
        MemoryTransport::new(device_tx, device_rx, link),
    )
}

impl MemoryTransport {
    fn new(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>, link: LinkParams) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
            link,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for MemoryTransport {
    fn write(&self, report: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Disconnected);
        }
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(report.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn read(&self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Disconnected);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(report) => Ok(report),
            Err(RecvTimeoutError::Timeout) => Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the sender lets the peer observe the disconnect.
        self.tx.lock().take();
    }

    fn link(&self) -> LinkParams {
        self.link
    }
}
