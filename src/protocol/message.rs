//! The protocol message type.

use core::fmt;

use super::selector::{Group, Op};
use super::status::Status;

/// Message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Command = 0x01,
    Response = 0x02,
    Event = 0x03,
}

impl Kind {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Command),
            0x02 => Some(Self::Response),
            0x03 => Some(Self::Event),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("CMD"),
            Self::Response => f.write_str("RSP"),
            Self::Event => f.write_str("EVT"),
        }
    }
}

/// One protocol unit.
///
/// Commands flow host to device and carry two parameter bytes; responses
/// and events flow device to host and carry a status. The wire length
/// field is always `payload.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command {
        op: Op,
        p1: u8,
        p2: u8,
        payload: Vec<u8>,
    },
    Response {
        op: Op,
        status: Status,
        payload: Vec<u8>,
    },
    Event {
        op: Op,
        status: Status,
        payload: Vec<u8>,
    },
}

impl Message {
    pub fn command(op: Op, p1: u8, p2: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self::Command {
            op,
            p1,
            p2,
            payload: payload.into(),
        }
    }

    /// Command with zero parameters and no payload.
    pub fn bare_command(op: Op) -> Self {
        Self::command(op, 0, 0, Vec::new())
    }

    pub fn response(op: Op, status: Status, payload: impl Into<Vec<u8>>) -> Self {
        Self::Response {
            op,
            status,
            payload: payload.into(),
        }
    }

    pub fn event(op: Op, status: Status, payload: impl Into<Vec<u8>>) -> Self {
        Self::Event {
            op,
            status,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Command { .. } => Kind::Command,
            Self::Response { .. } => Kind::Response,
            Self::Event { .. } => Kind::Event,
        }
    }

    pub fn op(&self) -> Op {
        match self {
            Self::Command { op, .. } | Self::Response { op, .. } | Self::Event { op, .. } => *op,
        }
    }

    pub fn group(&self) -> Group {
        self.op().group()
    }

    /// Status of a response or event; `None` for commands.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Command { .. } => None,
            Self::Response { status, .. } | Self::Event { status, .. } => Some(*status),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Self::Command { payload, .. }
            | Self::Response { payload, .. }
            | Self::Event { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        match self {
            Self::Command { payload, .. }
            | Self::Response { payload, .. }
            | Self::Event { payload, .. } => payload,
        }
    }
}

/// Human-readable trace, e.g.
/// `[CMD][SYSTEM][BUZZER][00][02]Payload(2): \n\t64 00`.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.op();
        write!(f, "[{}][{}][{}]", self.kind(), op.group(), op)?;
        match self {
            Self::Command { p1, p2, .. } => write!(f, "[{p1:02X}][{p2:02X}]")?,
            Self::Response { status, .. } | Self::Event { status, .. } => {
                write!(f, "[{status}]")?;
            }
        }

        let payload = self.payload();
        write!(f, "Payload({}): ", payload.len())?;
        for line in payload.chunks(24) {
            f.write_str("\n\t")?;
            for (i, b) in line.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{b:02X}")?;
            }
        }
        Ok(())
    }
}
