//! dm_proto — Darklock Mesh protocol types and serialisation
//!
//! All on-wire objects serialise to keyed JSON structures with fixed field
//! names; binary fields (ciphertext, wrapped keys, signatures) are base64
//! strings inside the JSON.
//!
//! # Modules
//! - `id`       — address-derived identifiers for users, groups, broadcast
//! - `envelope` — routing metadata attached to every message form
//! - `content`  — the closed set of message payload variants
//! - `command`  — command and group-command bodies
//! - `message`  — instant / secure / reliable message forms
//! - `b64`      — base64 byte-string wrapper for wire fields

pub mod b64;
pub mod command;
pub mod content;
pub mod envelope;
pub mod error;
pub mod id;
pub mod message;

pub use b64::B64;
pub use command::{Command, GroupCommand};
pub use content::{Content, ContentBody, ContentType, CustomizedContent, FileContent};
pub use envelope::Envelope;
pub use error::ProtoError;
pub use id::{Address, NetworkType, ID};
pub use message::{InstantMessage, ReliableMessage, SecureMessage};
