//! SMCP message protocol.
//!
//! ```text
//! ┌───────────┐   encode    ┌──────────────┐
//! │  Message  │────────────▶│ frame bytes  │  type·group·op·params·len·payload·BCC
//! │ (typed)   │◀────────────│              │
//! └───────────┘   decode    └──────────────┘
//! ```

pub mod codec;
pub mod discovery;
pub mod message;
pub mod selector;
pub mod status;

pub use discovery::{DiscoveryRecord, NfcTech, TagApp, TagType};
pub use message::{Kind, Message};
pub use selector::{Group, Op};
pub use status::Status;
