//! Report fragmentation for encoded messages.
//!
//! An encoded message is spread over fixed-size transport reports:
//!
//! ```text
//! Report 1: [token:4][0xD0][len_hi][len_lo] message bytes ...
//! Report 2: [token:4][seq=0]                message bytes ...
//! Report N: [token:4][seq=N-2]              message bytes (final, short)
//! ```
//!
//! The length is that of the whole encoded message (big-endian u16). The
//! sequence number rolls over from 127 to 0. The receiver drops reports
//! whose token is not its own and reassembles until the declared length
//! is reached.

use core::fmt;

use log::debug;

use crate::error::{Error, Result};

use super::transport::LinkParams;

/// Connection token length.
pub const TOKEN_LEN: usize = 4;

/// Marker byte that opens the first report of a message.
pub const FIRST_MARKER: u8 = 0xD0;

/// Continuation sequence numbers wrap at this value.
pub const SEQ_MODULO: u8 = 128;

const FIRST_HEADER: usize = TOKEN_LEN + 3;
const CONT_HEADER: usize = TOKEN_LEN + 1;

/// Smallest report that can carry a first-report header plus one byte.
pub const MIN_REPORT_SIZE: usize = FIRST_HEADER + 1;

/// Session-scoping token issued by the device at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionToken(pub [u8; TOKEN_LEN]);

impl ConnectionToken {
    /// Token used before a session exists (handshake only).
    pub const BROADCAST: Self = Self([0xFF; TOKEN_LEN]);

    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }
}

impl fmt::Display for ConnectionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

/// Split an encoded message into transport reports.
///
/// Each returned report already carries the link's leading pad byte, if
/// any, and is at most `report_size` bytes long without it.
pub fn split(token: ConnectionToken, encoded: &[u8], link: LinkParams) -> Result<Vec<Vec<u8>>> {
    let len = u16::try_from(encoded.len()).map_err(|_| Error::MessageTooLarge(encoded.len()))?;
    if link.report_size < MIN_REPORT_SIZE {
        return Err(Error::Config(format!(
            "report size {} is below the minimum of {}",
            link.report_size, MIN_REPORT_SIZE
        )));
    }

    let mut reports = Vec::with_capacity(encoded.len() / link.report_size + 1);
    let mut seq: u8 = 0;
    let mut pos = 0;
    let mut first = true;

    loop {
        let mut report = Vec::with_capacity(link.report_size + 1);
        if let Some(pad) = link.leading_pad {
            report.push(pad);
        }
        report.extend_from_slice(token.as_bytes());

        let room = if first {
            report.push(FIRST_MARKER);
            report.extend_from_slice(&len.to_be_bytes());
            link.report_size - FIRST_HEADER
        } else {
            report.push(seq);
            seq = (seq + 1) % SEQ_MODULO;
            link.report_size - CONT_HEADER
        };
        first = false;

        let end = (pos + room).min(encoded.len());
        report.extend_from_slice(&encoded[pos..end]);
        pos = end;
        reports.push(report);

        if pos >= encoded.len() {
            break;
        }
    }

    Ok(reports)
}

/// Why a report was discarded by the [`Reassembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Too short to carry its header.
    Short,
    /// Token belongs to another session.
    TokenMismatch,
    /// First report of a message without the 0xD0 marker.
    MissingMarker,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => write!(f, "report too short"),
            Self::TokenMismatch => write!(f, "connection token mismatch"),
            Self::MissingMarker => write!(f, "first report without 0xD0 marker"),
        }
    }
}

/// Result of feeding one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// More reports are needed.
    Pending,
    /// A full encoded message, truncated to its declared length.
    Complete(Vec<u8>),
    /// The report was discarded; the buffer is unchanged.
    Dropped(DropReason),
}

/// Reassembly buffer for one session.
pub struct Reassembler {
    token: ConnectionToken,
    expected: Option<usize>,
    next_seq: u8,
    buffer: Vec<u8>,
}

impl Reassembler {
    pub fn new(token: ConnectionToken) -> Self {
        Self {
            token,
            expected: None,
            next_seq: 0,
            buffer: Vec::new(),
        }
    }

    /// Feed one transport report.
    pub fn feed(&mut self, report: &[u8]) -> Feed {
        if report.len() < CONT_HEADER {
            return Feed::Dropped(DropReason::Short);
        }
        if report[..TOKEN_LEN] != self.token.0 {
            return Feed::Dropped(DropReason::TokenMismatch);
        }

        let expected = match self.expected {
            None => {
                if report[TOKEN_LEN] != FIRST_MARKER {
                    return Feed::Dropped(DropReason::MissingMarker);
                }
                if report.len() < FIRST_HEADER {
                    return Feed::Dropped(DropReason::Short);
                }
                let declared = u16::from_be_bytes([report[TOKEN_LEN + 1], report[TOKEN_LEN + 2]]);
                let expected = declared as usize;
                self.expected = Some(expected);
                self.next_seq = 0;
                self.buffer.clear();
                self.append(&report[FIRST_HEADER..], expected);
                expected
            }
            Some(expected) => {
                let seq = report[TOKEN_LEN];
                if seq != self.next_seq {
                    debug!(
                        "reassembly: sequence gap (expected {}, got {})",
                        self.next_seq, seq
                    );
                }
                self.next_seq = seq.wrapping_add(1) % SEQ_MODULO;
                self.append(&report[CONT_HEADER..], expected);
                expected
            }
        };

        if self.buffer.len() >= expected {
            self.expected = None;
            Feed::Complete(core::mem::take(&mut self.buffer))
        } else {
            Feed::Pending
        }
    }

    fn append(&mut self, data: &[u8], expected: usize) {
        let room = expected.saturating_sub(self.buffer.len());
        self.buffer.extend_from_slice(&data[..room.min(data.len())]);
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.expected = None;
        self.next_seq = 0;
        self.buffer.clear();
    }

    /// Whether a message is partially received.
    pub fn is_active(&self) -> bool {
        self.expected.is_some()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

// ── Tests ────────────────────────────────────────────────────
