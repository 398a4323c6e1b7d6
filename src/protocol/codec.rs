//! Message frame codec.
//!
//! Wire format:
//! ```text
//! Command:
//! ┌──────┬───────┬────┬────┬────┬────────────┬─────────────┬─────┐
//! │ type │ group │ op │ p1 │ p2 │ len (4B LE)│ payload (N) │ BCC │
//! └──────┴───────┴────┴────┴────┴────────────┴─────────────┴─────┘
//! Response / Event:
//! ┌──────┬───────┬────┬────────┬────────────┬─────────────┬─────┐
//! │ type │ group │ op │ status │ len (4B LE)│ payload (N) │ BCC │
//! └──────┴───────┴────┴────────┴────────────┴─────────────┴─────┘
//! ```
//!
//! BCC is the XOR of every byte before it. Encoding is total; decoding
//! validates selectors, length and BCC and never panics on hostile input.

use crate::error::FrameError;

use super::message::{Kind, Message};
use super::selector::{Group, Op};
use super::status::Status;

/// Header size of a command frame (type, group, op, p1, p2, length).
pub const COMMAND_HEADER_SIZE: usize = 9;

/// Header size of a response or event frame (type, group, op, status, length).
pub const REPLY_HEADER_SIZE: usize = 8;

/// Trailing BCC byte.
pub const TRAILER_SIZE: usize = 1;

/// XOR-fold of `bytes`.
pub fn bcc(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Serialize `msg` into a complete frame including the BCC trailer.
pub fn encode(msg: &Message) -> Vec<u8> {
    let payload = msg.payload();
    let op = msg.op();
    let header = match msg {
        Message::Command { .. } => COMMAND_HEADER_SIZE,
        _ => REPLY_HEADER_SIZE,
    };

    let mut out = Vec::with_capacity(header + payload.len() + TRAILER_SIZE);
    out.push(msg.kind().code());
    out.push(op.group().code());
    out.push(op.code());
    match msg {
        Message::Command { p1, p2, .. } => {
            out.push(*p1);
            out.push(*p2);
        }
        Message::Response { status, .. } | Message::Event { status, .. } => {
            out.push(status.code());
        }
    }
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.push(bcc(&out));
    out
}

/// Outcome of inspecting a possibly partial frame.
enum Inspection {
    /// More bytes are needed before the frame can be judged.
    Incomplete { needed: usize },
    /// Header, length and BCC all check out.
    Complete {
        kind: Kind,
        op: Op,
        header: usize,
        len: usize,
    },
}

fn inspect(bytes: &[u8]) -> Result<Inspection, FrameError> {
    let Some(&type_byte) = bytes.first() else {
        return Ok(Inspection::Incomplete {
            needed: REPLY_HEADER_SIZE + TRAILER_SIZE,
        });
    };
    let kind = Kind::from_code(type_byte).ok_or(FrameError::UnknownType(type_byte))?;
    let header = match kind {
        Kind::Command => COMMAND_HEADER_SIZE,
        Kind::Response | Kind::Event => REPLY_HEADER_SIZE,
    };

    if bytes.len() < header + TRAILER_SIZE {
        return Ok(Inspection::Incomplete {
            needed: header + TRAILER_SIZE,
        });
    }

    let group = Group::from_code(bytes[1]).ok_or(FrameError::UnknownGroup(bytes[1]))?;
    let op = Op::from_code(group, bytes[2]).ok_or(FrameError::UnknownOp {
        group,
        code: bytes[2],
    })?;

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[header - 4..header]);
    let len = u32::from_le_bytes(len_bytes) as usize;

    let total = header.saturating_add(len).saturating_add(TRAILER_SIZE);
    if bytes.len() < total {
        return Ok(Inspection::Incomplete { needed: total });
    }
    if bytes.len() > total {
        return Err(FrameError::Overrun {
            expected: total,
            actual: bytes.len(),
        });
    }

    let computed = bcc(&bytes[..total - TRAILER_SIZE]);
    let trailer = bytes[total - TRAILER_SIZE];
    if computed != trailer {
        return Err(FrameError::Checksum { computed, trailer });
    }

    Ok(Inspection::Complete {
        kind,
        op,
        header,
        len,
    })
}

/// Non-destructive completeness check.
///
/// A frame that is simply too short yields `Ok(false)`. A frame long
/// enough to judge but structurally wrong yields the error.
pub fn is_complete(bytes: &[u8]) -> Result<bool, FrameError> {
    match inspect(bytes)? {
        Inspection::Incomplete { .. } => Ok(false),
        Inspection::Complete { .. } => Ok(true),
    }
}

/// Decode one complete frame.
pub fn decode(bytes: &[u8]) -> Result<Message, FrameError> {
    let (kind, op, header, len) = match inspect(bytes)? {
        Inspection::Incomplete { needed } => {
            return Err(FrameError::Truncated {
                needed,
                actual: bytes.len(),
            });
        }
        Inspection::Complete {
            kind,
            op,
            header,
            len,
        } => (kind, op, header, len),
    };

    let payload = bytes[header..header + len].to_vec();
    let msg = match kind {
        Kind::Command => Message::Command {
            op,
            p1: bytes[3],
            p2: bytes[4],
            payload,
        },
        Kind::Response => Message::Response {
            op,
            status: Status::from_code(bytes[3]),
            payload,
        },
        Kind::Event => Message::Event {
            op,
            status: Status::from_code(bytes[3]),
            payload,
        },
    };
    Ok(msg)
}

// ── Tests ────────────────────────────────────────────────────
