//! Typed command façade over an [`Engine`].
//!
//! One method per device operation. Each returns the device [`Status`];
//! operations that read data wrap it in an [`Outcome`]. Parameters the
//! device would reject are caught here and answered with `INVALID_PARAM`
//! without touching the link.
//!
//! | Method              | Op            | p1          | p2        | Payload      |
//! |---------------------|---------------|-------------|-----------|--------------|
//! | `buzzer`            | BUZZER        | 0           | tone      | ms (u16 LE)  |
//! | `led`               | LED           | blue        | red       | -            |
//! | `discovery`         | DISCOVERY     | tech mask   | start     | -            |
//! | `read` / `write`    | READ / WRITE  | block lo    | block hi  | data         |
//! | `mifare_auth`       | MFC_AUTH      | block       | key type  | key (6 B)    |
//! | `mifare_increment`  | MFC_INC       | block       | 0         | value (i32 LE) |

use std::io::Read;

use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::engine::Engine;
use crate::error::Result;
use crate::firmware::{FirmwareDownloader, FirmwareError};
use crate::protocol::{Message, NfcTech, Op, Status};

/// Buzzer tones accepted by the device (1 kHz, 2 kHz, 2.7 kHz, 4 kHz).
pub const BUZZER_TONES: core::ops::RangeInclusive<u8> = 1..=4;

/// Shortest buzzer duration the device accepts.
pub const BUZZER_MIN_MS: u16 = 100;

/// `emv` mode that starts an EMV session.
pub const EMV_START: u8 = 1;

/// `emv` mode that stops an EMV session.
pub const EMV_STOP: u8 = 2;

/// Which long-running activity the reader is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReaderMode {
    #[default]
    Idle,
    Discovering,
    Emv,
}

/// Mifare Classic key slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum KeyType {
    A = 1,
    B = 2,
}

/// Status plus data, present only on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub status: Status,
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    fn from_response(response: Message, decode: impl FnOnce(Vec<u8>) -> Option<T>) -> Self {
        let status = response.status().unwrap_or(Status::Unknown);
        let data = if status == Status::Success {
            decode(response.into_payload())
        } else {
            None
        };
        Self { status, data }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success && self.data.is_some()
    }
}

// ── Device info ───────────────────────────────────────────────

/// Firmware identity reported by `INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: heapless::String<9>,
    pub major: u8,
    pub minor: u8,
    pub build: u32,
    pub date: heapless::String<12>,
    pub time: heapless::String<9>,
}

const INFO_LEN: usize = 36;

fn ascii_field<const N: usize>(bytes: &[u8]) -> Option<heapless::String<N>> {
    let text = core::str::from_utf8(bytes).ok()?;
    let mut s = heapless::String::new();
    s.push_str(text.trim_end_matches('\0')).ok()?;
    Some(s)
}

impl DeviceInfo {
    /// Decode the 36-byte `INFO` payload.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < INFO_LEN {
            return None;
        }
        Some(Self {
            name: ascii_field(&payload[0..9])?,
            major: payload[9],
            minor: payload[10],
            build: u32::from_le_bytes([payload[11], payload[12], payload[13], payload[14]]),
            date: ascii_field(&payload[15..27])?,
            time: ascii_field(&payload[27..36])?,
        })
    }

    /// `major.minor.build`
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.build)
    }
}

// ── Reader ────────────────────────────────────────────────────

/// SMCP reader: an engine plus the reader mode needed for a clean close.
pub struct Reader {
    engine: Engine,
    mode: Mutex<ReaderMode>,
}

impl Reader {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            mode: Mutex::new(ReaderMode::Idle),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn mode(&self) -> ReaderMode {
        *self.mode.lock()
    }

    pub fn open(&self, address: &str) -> Result<()> {
        self.engine.open(address)?;
        *self.mode.lock() = ReaderMode::Idle;
        Ok(())
    }

    /// Stop discovery or EMV if active, then close the session.
    pub fn close(&self) {
        if self.engine.is_connected() {
            let stopped = match self.mode() {
                ReaderMode::Discovering => Some(self.discovery(NfcTech::ALL_MASK, false)),
                ReaderMode::Emv => Some(self.emv(EMV_STOP, 0)),
                ReaderMode::Idle => None,
            };
            match stopped {
                Some(Ok(status)) if status != Status::Success => {
                    warn!("reader: stop before close answered {}", status);
                }
                Some(Err(e)) => warn!("reader: stop before close failed: {}", e),
                _ => {}
            }
        }
        *self.mode.lock() = ReaderMode::Idle;
        self.engine.close();
    }

    fn status(&self, request: Message) -> Result<Status> {
        Ok(self.engine.call(request)?.status().unwrap_or(Status::Unknown))
    }

    fn bytes(&self, request: Message) -> Result<Outcome<Vec<u8>>> {
        Ok(Outcome::from_response(self.engine.call(request)?, Some))
    }

    // ── System group ──────────────────────────────────────────

    /// Sound the buzzer. `tone` is 1..=4, `ms` at least 100.
    pub fn buzzer(&self, tone: u8, ms: u16) -> Result<Status> {
        if !BUZZER_TONES.contains(&tone) || ms < BUZZER_MIN_MS {
            return Ok(Status::InvalidParam);
        }
        self.status(Message::command(Op::Buzzer, 0, tone, ms.to_le_bytes()))
    }

    pub fn led(&self, blue: bool, red: bool) -> Result<Status> {
        self.status(Message::command(Op::Led, blue.into(), red.into(), Vec::new()))
    }

    pub fn set_gpio(&self, pin: u8, level: bool) -> Result<Status> {
        self.status(Message::command(Op::SetGpio, pin, level.into(), Vec::new()))
    }

    pub fn device_info(&self) -> Result<Outcome<DeviceInfo>> {
        let response = self.engine.call(Message::bare_command(Op::Info))?;
        Ok(Outcome::from_response(response, |p| DeviceInfo::parse(&p)))
    }

    /// Program a new USB serial number. The device answers
    /// `GOING_TO_RESET` on success and re-enumerates under the new serial.
    pub fn set_serial(&self, serial: &str) -> Result<Status> {
        if serial.is_empty() || !serial.is_ascii() {
            return Ok(Status::InvalidParam);
        }
        let status = self.status(Message::command(Op::SetSerial, 0, 0, serial.as_bytes()))?;
        if status == Status::GoingToReset {
            info!("reader: serial set to {}, device resetting", serial);
            *self.mode.lock() = ReaderMode::Idle;
        }
        Ok(status)
    }

    /// Download a firmware image. See [`FirmwareDownloader`].
    pub fn download_firmware(
        &self,
        image: impl Read,
        progress: impl FnMut(usize),
    ) -> core::result::Result<(), FirmwareError> {
        *self.mode.lock() = ReaderMode::Idle;
        FirmwareDownloader::new(&self.engine).download(image, progress)
    }

    // ── NFC group ─────────────────────────────────────────────

    /// Re-poll an activated card to detect its removal.
    pub fn conf_reactive(&self, enable: bool) -> Result<Status> {
        self.status(Message::command(Op::ConfReactive, enable.into(), 0, Vec::new()))
    }

    /// Start or stop card discovery for the technologies in `tech_mask`.
    pub fn discovery(&self, tech_mask: u8, start: bool) -> Result<Status> {
        let status = self.status(Message::command(Op::Discovery, tech_mask, start.into(), Vec::new()))?;
        if status == Status::Success {
            *self.mode.lock() = if start {
                ReaderMode::Discovering
            } else {
                ReaderMode::Idle
            };
        }
        Ok(status)
    }

    /// Read one block (Type 1/2/3 tags).
    pub fn read(&self, block: u16) -> Result<Outcome<Vec<u8>>> {
        let [lo, hi] = block.to_le_bytes();
        self.bytes(Message::command(Op::Read, lo, hi, Vec::new()))
    }

    pub fn write(&self, block: u16, data: &[u8]) -> Result<Status> {
        let [lo, hi] = block.to_le_bytes();
        self.status(Message::command(Op::Write, lo, hi, data))
    }

    pub fn ndef_read(&self) -> Result<Outcome<Vec<u8>>> {
        self.bytes(Message::bare_command(Op::NdefRead))
    }

    pub fn ndef_write(&self, ndef: &[u8]) -> Result<Status> {
        self.status(Message::command(Op::NdefWrite, 0, 0, ndef))
    }

    /// Exchange one APDU with an ISO-DEP card.
    pub fn apdu_transceive(&self, capdu: &[u8]) -> Result<Outcome<Vec<u8>>> {
        self.bytes(Message::command(Op::ApduTransfer, 0, 0, capdu))
    }

    pub fn raw(&self, data: &[u8]) -> Result<Outcome<Vec<u8>>> {
        self.bytes(Message::command(Op::Raw, 0, 0, data))
    }

    pub fn mifare_auth(&self, block: u8, key_type: KeyType, key: &[u8; 6]) -> Result<Status> {
        self.status(Message::command(Op::MfcAuth, block, key_type as u8, key.as_slice()))
    }

    pub fn mifare_read(&self, block: u8) -> Result<Outcome<Vec<u8>>> {
        self.bytes(Message::command(Op::MfcRead, block, 0, Vec::new()))
    }

    pub fn mifare_write(&self, block: u8, data: &[u8]) -> Result<Status> {
        self.status(Message::command(Op::MfcWrite, block, 0, data))
    }

    pub fn mifare_increment(&self, block: u8, value: i32) -> Result<Status> {
        self.status(Message::command(Op::MfcIncrement, block, 0, value.to_le_bytes()))
    }

    pub fn mifare_decrement(&self, block: u8, value: i32) -> Result<Status> {
        self.status(Message::command(Op::MfcDecrement, block, 0, value.to_le_bytes()))
    }

    pub fn mifare_restore(&self, block: u8) -> Result<Status> {
        self.status(Message::command(Op::MfcRestore, block, 0, Vec::new()))
    }

    pub fn mifare_transfer(&self, block: u8) -> Result<Status> {
        self.status(Message::command(Op::MfcTransfer, block, 0, Vec::new()))
    }

    /// Start (`EMV_START`) or stop (`EMV_STOP`) an EMV session.
    pub fn emv(&self, mode: u8, param: u8) -> Result<Status> {
        let status = self.status(Message::command(Op::Emv, mode, param, Vec::new()))?;
        if status == Status::Success {
            match mode {
                EMV_START => *self.mode.lock() = ReaderMode::Emv,
                EMV_STOP => *self.mode.lock() = ReaderMode::Idle,
                _ => {}
            }
        }
        Ok(status)
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}
