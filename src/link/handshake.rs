//! Session handshake.
//!
//! ```text
//! host  → [FF FF FF FF][0x86][00 08][nonce:8]
//! device→ [FF FF FF FF][0x86][len:2][nonce:8][token:4] ...
//! ```
//!
//! The token returned by the device scopes every later report to this
//! session.

use std::time::Duration;

use log::{debug, warn};

use crate::error::{Error, Result};

use super::fragment::{ConnectionToken, TOKEN_LEN};
use super::transport::Transport;

const INIT_COMMAND: u8 = 0x86;
const NONCE_LEN: usize = 8;
const NONCE_OFFSET: usize = TOKEN_LEN + 3;
const TOKEN_OFFSET: usize = NONCE_OFFSET + NONCE_LEN;

/// Shortest reply that carries a token.
pub const MIN_REPLY_LEN: usize = TOKEN_OFFSET + TOKEN_LEN;

/// Pad + broadcast token + command + length + nonce.
const INIT_REPORT_CAP: usize = 1 + TOKEN_OFFSET;

/// Build the init report for `nonce`.
pub fn init_report(
    nonce: &[u8; NONCE_LEN],
    leading_pad: Option<u8>,
) -> Result<heapless::Vec<u8, INIT_REPORT_CAP>> {
    let overflow = |()| Error::Handshake("init report overflow");
    let mut report = heapless::Vec::new();
    if let Some(pad) = leading_pad {
        report.push(pad).map_err(|_| overflow(()))?;
    }
    report
        .extend_from_slice(ConnectionToken::BROADCAST.as_bytes())
        .map_err(overflow)?;
    report
        .extend_from_slice(&[INIT_COMMAND, 0x00, NONCE_LEN as u8])
        .map_err(overflow)?;
    report.extend_from_slice(nonce).map_err(overflow)?;
    Ok(report)
}

/// Extract the connection token from the device's init reply.
pub fn parse_reply(reply: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<ConnectionToken> {
    if reply.is_empty() {
        return Err(Error::Handshake("no reply from device"));
    }
    if reply.len() < MIN_REPLY_LEN {
        return Err(Error::Handshake("init reply too short"));
    }
    if &reply[NONCE_OFFSET..TOKEN_OFFSET] != nonce {
        warn!("handshake: nonce echo mismatch");
    }

    let mut token = [0u8; TOKEN_LEN];
    token.copy_from_slice(&reply[TOKEN_OFFSET..MIN_REPLY_LEN]);
    Ok(ConnectionToken(token))
}

/// Run the handshake over a freshly opened transport.
pub fn perform(transport: &dyn Transport, timeout: Duration) -> Result<ConnectionToken> {
    let nonce: [u8; NONCE_LEN] = rand::random();
    let report = init_report(&nonce, transport.link().leading_pad)?;
    transport.write(&report)?;

    let reply = transport.read(timeout)?;
    let token = parse_reply(&reply, &nonce)?;
    debug!("handshake: token {}", token);
    Ok(token)
}
