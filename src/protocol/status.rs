//! Device status codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Status byte carried by every response and event.
///
/// Callers branch on these variants, never on the raw byte. Bytes outside
/// the table decode as [`Status::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    /// Accepted, but the operation is not complete yet.
    Ok = 0x01,
    Failure = 0x11,
    /// Out of memory on the controller.
    SystemMemory = 0x12,
    UnsupportedFunction = 0x13,
    /// e.g. starting discovery while it is already running.
    RejectCommand = 0x14,
    InvalidParam = 0x15,
    TimedOut = 0x16,
    UnsupportedGroup = 0x21,
    UnsupportedCommand = 0x22,
    UnsupportedParam = 0x23,
    UnsupportedType = 0x24,
    TransferBcc = 0x31,
    TransferPacket = 0x20,
    /// The card requires authentication first.
    NotAuthenticated = 0x41,
    FromRemoteDevice = 0x42,
    NdefReadFail = 0x43,
    NdefWriteFail = 0x44,
    LostRemoteDevice = 0x51,
    /// The controller is about to reset itself.
    GoingToReset = 0x80,
    Unknown = 0xFF,
}

impl Status {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::Ok,
            0x11 => Self::Failure,
            0x12 => Self::SystemMemory,
            0x13 => Self::UnsupportedFunction,
            0x14 => Self::RejectCommand,
            0x15 => Self::InvalidParam,
            0x16 => Self::TimedOut,
            0x20 => Self::TransferPacket,
            0x21 => Self::UnsupportedGroup,
            0x22 => Self::UnsupportedCommand,
            0x23 => Self::UnsupportedParam,
            0x24 => Self::UnsupportedType,
            0x31 => Self::TransferBcc,
            0x41 => Self::NotAuthenticated,
            0x42 => Self::FromRemoteDevice,
            0x43 => Self::NdefReadFail,
            0x44 => Self::NdefWriteFail,
            0x51 => Self::LostRemoteDevice,
            0x80 => Self::GoingToReset,
            _ => Self::Unknown,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::Ok => "OK",
            Self::Failure => "FAILURE",
            Self::SystemMemory => "SYSTEM_MEMORY",
            Self::UnsupportedFunction => "UNSUPPORTED_FUNCTION",
            Self::RejectCommand => "REJECT_COMMAND",
            Self::InvalidParam => "INVALID_PARAM",
            Self::TimedOut => "TIMED_OUT",
            Self::UnsupportedGroup => "UNSUPPORTED_GROUP",
            Self::UnsupportedCommand => "UNSUPPORTED_COMMAND",
            Self::UnsupportedParam => "UNSUPPORTED_PARAM",
            Self::UnsupportedType => "UNSUPPORTED_TYPE",
            Self::TransferBcc => "TRANSFER_BCC",
            Self::TransferPacket => "TRANSFER_PACKET",
            Self::NotAuthenticated => "NOT_AUTH",
            Self::FromRemoteDevice => "FROM_REMOTE_DEVICE",
            Self::NdefReadFail => "NDEF_READ_FAIL",
            Self::NdefWriteFail => "NDEF_WRITE_FAIL",
            Self::LostRemoteDevice => "LOST_REMOTE_DEVICE",
            Self::GoingToReset => "GOING_TO_RESET",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}
