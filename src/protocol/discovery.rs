//! Card discovery event payload.
//!
//! ```text
//! ┌──────────┬──────┬──────────┬───────────┬─────────┬──────────────┐
//! │ app_type │ tech │ tag_type │ collision │ uid_len │ uid (uid_len)│
//! └──────────┴──────┴──────────┴───────────┴─────────┴──────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// NFC technology (RF protocol) of a discovered card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum NfcTech {
    /// ISO14443A (NFC-A)
    Iso14443A = 0x10,
    /// ISO14443B (NFC-B)
    Iso14443B = 0x20,
    /// ISO18092 (NFC-F)
    Iso18092 = 0x40,
    /// ISO15693 (NFC-V)
    Iso15693 = 0x80,
}

impl NfcTech {
    /// Every technology OR-ed together, the default discovery mask.
    pub const ALL_MASK: u8 = 0x10 | 0x20 | 0x40 | 0x80;

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Self::Iso14443A),
            0x20 => Some(Self::Iso14443B),
            0x40 => Some(Self::Iso18092),
            0x80 => Some(Self::Iso15693),
            _ => None,
        }
    }
}

/// NFC Forum tag type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TagType {
    /// Topaz compatible.
    Type1 = 0x01,
    /// MIFARE family (Ultralight, Ultralight C, Classic).
    Type2 = 0x02,
    /// FeliCa compatible.
    Type3 = 0x04,
    /// ISO14443-4 application cards.
    Type4 = 0x08,
    /// ICODE SLI(x), Tag-it HF-I.
    Type5 = 0x10,
}

impl TagType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Type1),
            0x02 => Some(Self::Type2),
            0x04 => Some(Self::Type3),
            0x08 => Some(Self::Type4),
            0x10 => Some(Self::Type5),
            _ => None,
        }
    }
}

/// Application-level card family reported in `app_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TagApp {
    TopazStatic = 0x10,
    TopazDynamic = 0x20,
    MifareMini = 0x11,
    Mifare1K = 0x12,
    Mifare4K = 0x13,
    MifarePlus2K = 0x14,
    MifarePlus4K = 0x15,
    MifarePlusSl2_4K = 0x16,
    MifarePlusSl2_2K = 0x17,
    MifareUltralight = 0x21,
    MifareInfineon1K = 0x22,
    MifareUltralightC = 0x23,
}

impl TagApp {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x10 => Some(Self::TopazStatic),
            0x20 => Some(Self::TopazDynamic),
            0x11 => Some(Self::MifareMini),
            0x12 => Some(Self::Mifare1K),
            0x13 => Some(Self::Mifare4K),
            0x14 => Some(Self::MifarePlus2K),
            0x15 => Some(Self::MifarePlus4K),
            0x16 => Some(Self::MifarePlusSl2_4K),
            0x17 => Some(Self::MifarePlusSl2_2K),
            0x21 => Some(Self::MifareUltralight),
            0x22 => Some(Self::MifareInfineon1K),
            0x23 => Some(Self::MifareUltralightC),
            _ => None,
        }
    }

    /// True for the MIFARE Classic family that needs `mfc_auth`.
    pub fn is_mifare_classic(self) -> bool {
        matches!(
            self,
            Self::MifareMini
                | Self::Mifare1K
                | Self::Mifare4K
                | Self::MifarePlus2K
                | Self::MifarePlus4K
                | Self::MifarePlusSl2_4K
                | Self::MifarePlusSl2_2K
        )
    }
}

/// Payload is shorter than its declared UID length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("discovery payload too short: need {needed} bytes, have {actual}")]
pub struct ShortDiscoveryPayload {
    pub needed: usize,
    pub actual: usize,
}

const FIXED_FIELDS: usize = 5;

/// A discovered card, decoded from a discovery event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub app_type: u8,
    pub tech: u8,
    pub tag_type: u8,
    pub collision: bool,
    pub uid: Vec<u8>,
}

impl DiscoveryRecord {
    pub fn parse(payload: &[u8]) -> Result<Self, ShortDiscoveryPayload> {
        if payload.len() < FIXED_FIELDS {
            return Err(ShortDiscoveryPayload {
                needed: FIXED_FIELDS,
                actual: payload.len(),
            });
        }
        let uid_len = payload[4] as usize;
        let needed = FIXED_FIELDS + uid_len;
        if payload.len() < needed {
            return Err(ShortDiscoveryPayload {
                needed,
                actual: payload.len(),
            });
        }

        Ok(Self {
            app_type: payload[0],
            tech: payload[1],
            tag_type: payload[2],
            collision: payload[3] != 0,
            uid: payload[FIXED_FIELDS..needed].to_vec(),
        })
    }

    pub fn tech(&self) -> Option<NfcTech> {
        NfcTech::from_code(self.tech)
    }

    pub fn tag_type(&self) -> Option<TagType> {
        TagType::from_code(self.tag_type)
    }

    pub fn app(&self) -> Option<TagApp> {
        TagApp::from_code(self.app_type)
    }

    /// UID as uppercase hex, e.g. `"04A1B2C3"`.
    pub fn uid_hex(&self) -> String {
        use core::fmt::Write;
        let mut s = String::with_capacity(self.uid.len() * 2);
        for b in &self.uid {
            let _ = write!(s, "{b:02X}");
        }
        s
    }
}
