//! Firmware download over an open session.
//!
//! Flow: enter download mode → device resets → reconnect → N × page →
//! final sentinel → device resets into the new image
//!
//! ```text
//! DOWNLOAD p1=00 p2=00           ──▶  GOING_TO_RESET
//! close, settle, poll enumerate, reopen
//! DOWNLOAD p1=lo p2=hi [≤128 B]  ──▶  SUCCESS        (per page)
//! DOWNLOAD p1=FF p2=FF           ──▶  GOING_TO_RESET
//! ```
//!
//! The page index travels little-endian in p1/p2, so 0xFFFF is reserved
//! for the sentinel.

use std::io::Read;
use std::thread;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::PAGE_SIZE;
use crate::engine::Engine;
use crate::error::Error;
use crate::protocol::{Message, Op, Status};

const SENTINEL_INDEX: u16 = 0xFFFF;

/// Largest image whose last page index stays below the sentinel.
pub const MAX_IMAGE_SIZE: usize = SENTINEL_INDEX as usize * PAGE_SIZE;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("device did not enter download mode: {0}")]
    NotAcknowledged(Status),

    #[error("device did not re-enumerate after reset")]
    DeviceLost,

    #[error("reopen after reset failed: {0}")]
    Reopen(#[source] Error),

    #[error("page {page} rejected: {status}")]
    PageRejected { page: u16, status: Status },

    #[error("final page not acknowledged: {0}")]
    NotFinalized(Status),

    #[error("cannot read firmware image: {0}")]
    Image(#[from] std::io::Error),

    #[error("image of {0} bytes exceeds the page index range")]
    ImageTooLarge(usize),

    #[error(transparent)]
    Engine(#[from] Error),
}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Entering,
    Reconnecting,
    Transferring { page: u16, pages: u16 },
    Finalizing,
    Complete,
    Failed,
}

/// Split an image into download pages. An empty image is one empty page.
pub fn pages(image: &[u8]) -> Result<Vec<&[u8]>, FirmwareError> {
    if image.len() > MAX_IMAGE_SIZE {
        return Err(FirmwareError::ImageTooLarge(image.len()));
    }
    if image.is_empty() {
        return Ok(vec![image]);
    }
    Ok(image.chunks(PAGE_SIZE).collect())
}

fn status_of(response: &Message) -> Status {
    response.status().unwrap_or(Status::Unknown)
}

/// Drives one firmware download through an [`Engine`].
pub struct FirmwareDownloader<'a> {
    engine: &'a Engine,
    state: DownloadState,
}

impl<'a> FirmwareDownloader<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            state: DownloadState::Idle,
        }
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Read `image` to the end and download it.
    pub fn download(
        &mut self,
        mut image: impl Read,
        progress: impl FnMut(usize),
    ) -> Result<(), FirmwareError> {
        let mut bytes = Vec::new();
        image.read_to_end(&mut bytes)?;
        self.download_bytes(&bytes, progress)
    }

    /// Download an in-memory image. `progress` receives the running total
    /// of bytes acknowledged after every page.
    pub fn download_bytes(
        &mut self,
        image: &[u8],
        mut progress: impl FnMut(usize),
    ) -> Result<(), FirmwareError> {
        let result = self.run(image, &mut progress);
        self.state = match &result {
            Ok(()) => DownloadState::Complete,
            Err(e) => {
                warn!("firmware: download failed in {:?}: {}", self.state, e);
                DownloadState::Failed
            }
        };
        result
    }

    fn run(&mut self, image: &[u8], progress: &mut dyn FnMut(usize)) -> Result<(), FirmwareError> {
        let pages = pages(image)?;
        let count = pages.len() as u16;

        self.state = DownloadState::Entering;
        let ack = self.engine.call(Message::bare_command(Op::Download))?;
        if status_of(&ack) != Status::GoingToReset {
            return Err(FirmwareError::NotAcknowledged(status_of(&ack)));
        }
        info!("firmware: device resetting into bootloader");

        self.state = DownloadState::Reconnecting;
        self.reconnect()?;

        let mut sent = 0;
        for (index, page) in pages.into_iter().enumerate() {
            let index = index as u16;
            self.state = DownloadState::Transferring {
                page: index,
                pages: count,
            };
            let [lo, hi] = index.to_le_bytes();
            let response = self
                .engine
                .call(Message::command(Op::Download, lo, hi, page))?;
            let status = status_of(&response);
            if status != Status::Success {
                return Err(FirmwareError::PageRejected {
                    page: index,
                    status,
                });
            }
            sent += page.len();
            debug!("firmware: page {}/{} ok ({} bytes)", index + 1, count, sent);
            progress(sent);
        }

        self.state = DownloadState::Finalizing;
        let [lo, hi] = SENTINEL_INDEX.to_le_bytes();
        let done = self
            .engine
            .call(Message::command(Op::Download, lo, hi, Vec::new()))?;
        if status_of(&done) != Status::GoingToReset {
            return Err(FirmwareError::NotFinalized(status_of(&done)));
        }
        info!("firmware: {} bytes written, device restarting", sent);
        Ok(())
    }

    /// Close, wait for the device to come back at the same address, reopen.
    fn reconnect(&self) -> Result<(), FirmwareError> {
        let address = self
            .engine
            .last_address()
            .ok_or(FirmwareError::Engine(Error::NotConnected))?;
        let fw = &self.engine.config().firmware;

        self.engine.close();
        thread::sleep(fw.reset_settle());

        for attempt in 0..fw.reconnect_retries {
            match self.engine.ports(Some(&address)) {
                Ok(ports) if ports.iter().any(|p| *p == address) => {
                    debug!("firmware: {} back after {} polls", address, attempt);
                    return self.engine.open(&address).map_err(FirmwareError::Reopen);
                }
                Ok(_) => {}
                Err(e) => debug!("firmware: enumerate failed: {}", e),
            }
            thread::sleep(fw.reconnect_poll());
        }
        Err(FirmwareError::DeviceLost)
    }
}
