//! Transport and storage collaborators.
//!
//! The gate layer (framing, heartbeats, send queues) and persistent storage
//! are external; the core reaches them through these traits. None of the
//! trait objects are owned by the pipeline — the host passes plain references
//! and manages their lifetimes (the pipeline never extends a delegate's
//! lifetime).

use dm_proto::{Content, InstantMessage, ReliableMessage, ID};

use crate::error::CoreError;

/// CDN-like attachment collaborator plus the outbound byte channel.
pub trait MessengerDelegate: Send + Sync {
    /// Upload encrypted attachment bytes; returns the download reference on
    /// success. `None` keeps the payload inline.
    fn upload_data(&self, data: &[u8], msg: &InstantMessage) -> Option<String>;

    /// Resolve an attachment reference; `None` means "not available yet" and
    /// leaves the content key on the file content for a later retry.
    fn download_data(&self, url: &str, msg: &InstantMessage) -> Option<Vec<u8>>;

    /// Hand one serialised reliable message to the wire. Delivery retry
    /// policy belongs to the transport, not to this core.
    fn send_package(&self, data: &[u8]) -> bool;
}

/// Host-owned persistence hooks: message history and the pending queues that
/// back suspend-class outcomes.
pub trait MessageStore: Send + Sync {
    fn save_message(&self, msg: &InstantMessage) -> bool;

    /// Park an outbound message pending the receiver's meta/key.
    fn suspend_instant(&self, msg: InstantMessage, reason: &CoreError);

    /// Park an inbound message pending the sender's or group's meta.
    fn suspend_reliable(&self, msg: ReliableMessage, reason: &CoreError);
}

/// Ability to push a content out to a receiver (encrypt/sign/deliver).
/// Implemented by the messenger; consumed by the dispatcher when it emits a
/// proactive group query.
pub trait OutboundChannel {
    fn send_content(&self, content: Content, receiver: &ID) -> bool;
}
