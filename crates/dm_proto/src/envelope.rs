//! Message envelope — routing metadata attached to every message form.
//!
//! `group` and `type` are optional hints copied from the content at encrypt
//! time so intermediate relays can route group traffic without decrypting.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ID;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: ID,
    pub receiver: ID,

    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,

    /// Group hint for relays. Set only on group messages.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub group: Option<ID>,

    /// Content-type hint for relays.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<u8>,
}

impl Envelope {
    pub fn new(sender: ID, receiver: ID) -> Self {
        Envelope {
            sender,
            receiver,
            // The wire form is whole seconds; keep the in-memory form
            // identical so a round-tripped envelope compares equal.
            time: Utc::now().trunc_subsecs(0),
            group: None,
            content_type: None,
        }
    }
}
