//! Group/op selector tables.
//!
//! Every message carries two selector bytes: the feature group and the
//! operation within that group. The mapping lives in one static table so
//! encode and decode can never disagree; its consistency is checked at
//! compile time.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Feature area of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Group {
    System = 0xD9,
    Nfc = 0xE9,
}

impl Group {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0xD9 => Some(Self::System),
            0xE9 => Some(Self::Nfc),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("SYSTEM"),
            Self::Nfc => f.write_str("NFC"),
        }
    }
}

/// Operation selector. Each op belongs to exactly one [`Group`].
///
/// Variant order must match the selector table; the compile-time check below
/// enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    // ── system ────────────────────────────────────────────
    Buzzer,
    Led,
    Info,
    SetGpio,
    Error,
    SetSerial,
    Debug,
    Download,

    // ── nfc ───────────────────────────────────────────────
    Discovery,
    GetTagInfo,
    Read,
    Write,
    Removal,
    NdefRead,
    NdefWrite,
    MfcAuth,
    MfcRead,
    MfcWrite,
    MfcDecrement,
    MfcIncrement,
    MfcRestore,
    MfcTransfer,
    ApduTransfer,
    Raw,
    Emv,
    ConfReactive,
}

struct Selector {
    op: Op,
    group: Group,
    code: u8,
    name: &'static str,
}

const fn sel(op: Op, group: Group, code: u8, name: &'static str) -> Selector {
    Selector {
        op,
        group,
        code,
        name,
    }
}

const SELECTORS: [Selector; 26] = [
    sel(Op::Buzzer, Group::System, 0x21, "buzzer"),
    sel(Op::Led, Group::System, 0x22, "led"),
    sel(Op::Info, Group::System, 0x23, "info"),
    sel(Op::SetGpio, Group::System, 0x24, "set_gpio"),
    sel(Op::Error, Group::System, 0x19, "error"),
    sel(Op::SetSerial, Group::System, 0xE0, "set_serial"),
    sel(Op::Debug, Group::System, 0xF0, "debug"),
    sel(Op::Download, Group::System, 0xFE, "download"),
    sel(Op::Discovery, Group::Nfc, 0x11, "discovery"),
    sel(Op::GetTagInfo, Group::Nfc, 0x21, "get_tag_info"),
    sel(Op::Read, Group::Nfc, 0x22, "read"),
    sel(Op::Write, Group::Nfc, 0x23, "write"),
    sel(Op::Removal, Group::Nfc, 0x24, "removal"),
    sel(Op::NdefRead, Group::Nfc, 0x25, "ndef_read"),
    sel(Op::NdefWrite, Group::Nfc, 0x26, "ndef_write"),
    sel(Op::MfcAuth, Group::Nfc, 0x31, "mfc_auth"),
    sel(Op::MfcRead, Group::Nfc, 0x32, "mfc_read"),
    sel(Op::MfcWrite, Group::Nfc, 0x33, "mfc_write"),
    sel(Op::MfcDecrement, Group::Nfc, 0x34, "mfc_dec"),
    sel(Op::MfcIncrement, Group::Nfc, 0x35, "mfc_inc"),
    sel(Op::MfcRestore, Group::Nfc, 0x36, "mfc_restore"),
    sel(Op::MfcTransfer, Group::Nfc, 0x37, "mfc_transfer"),
    sel(Op::ApduTransfer, Group::Nfc, 0x41, "apdu_transfer"),
    sel(Op::Raw, Group::Nfc, 0x42, "raw"),
    sel(Op::Emv, Group::Nfc, 0x51, "emv"),
    sel(Op::ConfReactive, Group::Nfc, 0xC0, "conf_reactive"),
];

const fn table_is_consistent() -> bool {
    let mut i = 0;
    while i < SELECTORS.len() {
        if SELECTORS[i].op as usize != i {
            return false;
        }
        let mut j = i + 1;
        while j < SELECTORS.len() {
            if SELECTORS[i].group as u8 == SELECTORS[j].group as u8
                && SELECTORS[i].code == SELECTORS[j].code
            {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    table_is_consistent(),
    "selector table is misordered or has a duplicate op byte within a group"
);

impl Op {
    /// Every op, in table order.
    pub const ALL: [Op; 26] = [
        Op::Buzzer,
        Op::Led,
        Op::Info,
        Op::SetGpio,
        Op::Error,
        Op::SetSerial,
        Op::Debug,
        Op::Download,
        Op::Discovery,
        Op::GetTagInfo,
        Op::Read,
        Op::Write,
        Op::Removal,
        Op::NdefRead,
        Op::NdefWrite,
        Op::MfcAuth,
        Op::MfcRead,
        Op::MfcWrite,
        Op::MfcDecrement,
        Op::MfcIncrement,
        Op::MfcRestore,
        Op::MfcTransfer,
        Op::ApduTransfer,
        Op::Raw,
        Op::Emv,
        Op::ConfReactive,
    ];

    pub const fn group(self) -> Group {
        SELECTORS[self as usize].group
    }

    /// Op byte on the wire.
    pub const fn code(self) -> u8 {
        SELECTORS[self as usize].code
    }

    pub const fn name(self) -> &'static str {
        SELECTORS[self as usize].name
    }

    /// Resolve an op byte within `group`.
    pub fn from_code(group: Group, code: u8) -> Option<Self> {
        SELECTORS
            .iter()
            .find(|s| s.group == group && s.code == code)
            .map(|s| s.op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.name().chars() {
            write!(f, "{}", c.to_ascii_uppercase())?;
        }
        Ok(())
    }
}
