//! SMCP host driver library.
//!
//! Talks to an SMCP-IV NFC reader controller over a report-oriented
//! transport (USB HID with the `hid` feature, or an in-memory link for
//! simulation).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  commands::Reader        typed device operations         │
//! │  firmware                paged firmware download         │
//! │  ──────────────────────────────────────────────────────  │
//! │  engine::Engine          call() correlation, workers,    │
//! │                          event handlers                  │
//! │  ──────────────────────────────────────────────────────  │
//! │  protocol                frames, selectors, statuses     │
//! │  link                    handshake, fragmentation,       │
//! │                          Transport / Connector traits    │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod firmware;
pub mod link;
pub mod protocol;

pub use commands::{DeviceInfo, KeyType, Outcome, Reader, ReaderMode};
pub use config::{EngineConfig, FirmwareConfig};
pub use engine::{Engine, Handlers, discovery_channel};
pub use error::{Error, FrameError, Result, TransportError};
pub use firmware::{DownloadState, FirmwareDownloader, FirmwareError};
pub use protocol::{DiscoveryRecord, Group, Kind, Message, Op, Status};
