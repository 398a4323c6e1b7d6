//! Unified error types for the SMCP host driver.
//!
//! Protocol statuses (timeouts, desyncs, device-reported failures) are not
//! errors: they travel back to the caller as [`Status`] values inside a
//! normal response. The enums below cover what the engine itself cannot
//! recover from locally.
//!
//! [`Status`]: crate::protocol::Status

use thiserror::Error;

use crate::protocol::Group;
use crate::protocol::discovery::ShortDiscoveryPayload;

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

/// Structural or selector violations found while decoding a wire frame.
///
/// Inside the receive loop these are logged and the frame is dropped; they
/// never end a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown message type 0x{0:02X}")]
    UnknownType(u8),

    #[error("unknown group 0x{0:02X}")]
    UnknownGroup(u8),

    #[error("unknown op 0x{code:02X} in group {group}")]
    UnknownOp { group: Group, code: u8 },

    #[error("frame truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("frame overrun: expected {expected} bytes, have {actual}")]
    Overrun { expected: usize, actual: usize },

    #[error("BCC mismatch: computed 0x{computed:02X}, trailer 0x{trailer:02X}")]
    Checksum { computed: u8, trailer: u8 },

    /// The frame was valid but its discovery payload was cut short.
    #[error(transparent)]
    Discovery(#[from] ShortDiscoveryPayload),
}

impl FrameError {
    /// True for the type/group/op lookups that failed, false for
    /// length and checksum violations.
    pub fn is_unknown_selector(&self) -> bool {
        matches!(
            self,
            Self::UnknownType(_) | Self::UnknownGroup(_) | Self::UnknownOp { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure reported by a byte transport. Always fatal to the session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport disconnected")]
    Disconnected,

    #[error("device error: {0}")]
    Device(String),

    #[error("no device at address {0:?}")]
    NotFound(String),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Every fallible engine operation funnels into this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("handshake failed: {0}")]
    Handshake(&'static str),

    #[error("encoded message of {0} bytes exceeds the 16-bit fragment length field")]
    MessageTooLarge(usize),

    /// `call` or `close`-dependent operation on a session that is not open.
    #[error("session is not connected")]
    NotConnected,

    /// The session was torn down while a call was waiting for its response.
    #[error("session closed while waiting for a response")]
    SessionClosed,

    #[error("session is already open")]
    AlreadyOpen,

    /// A second thread entered `call` while another call was in flight.
    #[error("another call is already in flight")]
    CallInProgress,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Programmer errors: the operation was invalid for the session state.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::AlreadyOpen | Self::CallInProgress
        )
    }
}

/// Driver-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
