//! Error taxonomy.
//!
//! Four classes, matched by the orchestration layer:
//! - deferred  — a collaborator lookup is pending; the message is suspended
//!               on the host's queue, never surfaced to the user
//! - rejected  — signature failed or the message is not for any local
//!               identity; dropped silently
//! - fatal     — local misconfiguration (missing private key, duplicate
//!               processor registration); never retried
//! - everything else propagates as-is
//!
//! User-visible outcomes (permission denied, unsupported type) are response
//! contents, not errors.

use thiserror::Error;

use dm_crypto::CryptoError;
use dm_proto::{ProtoError, ID};

#[derive(Debug, Error)]
pub enum CoreError {
    /// Receiver's encryption key not yet known — suspend the outbound message.
    #[error("Encryption key unavailable for {0}")]
    KeyUnavailable(ID),

    /// Sender's meta not yet known — suspend the inbound message.
    #[error("Meta unavailable for {0}")]
    MetaUnavailable(ID),

    /// Group meta not yet known — suspend and wait for a query response.
    #[error("Group info unavailable for {0}")]
    GroupUnavailable(ID),

    /// Signature check failed, or content does not decrypt for us.
    #[error("Message rejected")]
    Rejected,

    /// No local identity matches the receiver.
    #[error("No local identity matches {0}")]
    NotForMe(ID),

    /// Splitting a group message needs at least one member.
    #[error("Group {0} has no members to split for")]
    EmptyGroup(ID),

    /// Local user asserted to exist has no signing key. Configuration error.
    #[error("Private key missing for local user {0}")]
    MissingPrivateKey(ID),

    /// Two processors registered under one dispatch key. Configuration error.
    #[error("Processor already registered for '{0}'")]
    ProcessorConflict(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl CoreError {
    /// Suspend-class outcome: park the message, retry after resolution.
    pub fn is_deferred(&self) -> bool {
        matches!(
            self,
            CoreError::KeyUnavailable(_)
                | CoreError::MetaUnavailable(_)
                | CoreError::GroupUnavailable(_)
        )
    }

    /// Silent-drop-class outcome.
    pub fn is_rejected(&self) -> bool {
        matches!(self, CoreError::Rejected | CoreError::NotForMe(_))
    }
}
