//! The three message forms.
//!
//! - `InstantMessage`  — plaintext content, in-process only
//! - `SecureMessage`   — content encrypted, conversation key wrapped per
//!                       recipient (`key` for 1:1, `keys` for group fan-out)
//! - `ReliableMessage` — secure message plus a signature over the ciphertext
//!
//! Instant messages never hit the wire; secure/reliable forms serialise to
//! JSON with base64 binary fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::b64::B64;
use crate::content::Content;
use crate::envelope::Envelope;
use crate::id::ID;

/// Plaintext message, the input/output of the transform pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantMessage {
    pub envelope: Envelope,
    pub content: Content,
}

impl InstantMessage {
    pub fn new(content: Content, sender: ID, receiver: ID) -> Self {
        InstantMessage {
            envelope: Envelope::new(sender, receiver),
            content,
        }
    }
}

/// Content encrypted; the conversation key wrapped per recipient.
///
/// Exactly one of `key` / `keys` is present for encrypted traffic; broadcast
/// messages carry neither (the PLAIN key is implicit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecureMessage {
    pub envelope: Envelope,

    /// Ciphertext of the serialised content.
    pub data: B64,

    /// Wrapped conversation key for a single receiver.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<B64>,

    /// Wrapped conversation key per group member, keyed by textual ID.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keys: Option<BTreeMap<String, B64>>,
}

impl SecureMessage {
    /// Whether this message still carries the full group fan-out key map.
    pub fn is_group_shaped(&self) -> bool {
        self.keys.is_some()
    }

    /// The wrapped key meant for `member`, if any.
    pub fn wrapped_key_for(&self, member: &ID) -> Option<&B64> {
        if let Some(key) = &self.key {
            return Some(key);
        }
        self.keys.as_ref()?.get(&member.to_string())
    }

    /// Narrow a group-shaped message to the single wrapped key relevant to
    /// `member`, discarding every other recipient's entry. A personal-shaped
    /// message is returned unchanged.
    pub fn trim(&self, member: &ID) -> SecureMessage {
        let Some(keys) = &self.keys else {
            return self.clone();
        };
        SecureMessage {
            envelope: self.envelope.clone(),
            data: self.data.clone(),
            key: keys.get(&member.to_string()).cloned(),
            keys: None,
        }
    }
}

/// Secure message plus the sender's signature over the ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliableMessage {
    #[serde(flatten)]
    pub message: SecureMessage,

    pub signature: B64,
}
