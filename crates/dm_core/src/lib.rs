//! dm_core — Darklock Mesh message transform pipeline and content dispatch
//!
//! Outbound: Content → encrypt (conversation key from the cipher key cache,
//! wrapped per recipient) → sign → bytes for the transport collaborator.
//! Inbound: bytes → verify → trim/decrypt → content dispatch, which may
//! mutate group state and produce a response content that goes back out
//! through the same pipeline.
//!
//! Everything here is synchronous call-and-return: one inbound buffer runs
//! one full verify→decrypt→dispatch→respond round-trip. "Suspending" a
//! message means handing it to the host's pending queue via `MessageStore`,
//! not parking a task. The key cache and the dispatcher's processor cache are
//! the only shared mutable structures; provided implementations serialize
//! updates with a lock, and hosts running concurrent flows are expected to
//! keep updates to one conversation or one group serialized relative to each
//! other.
//!
//! # Modules
//! - `keycache`   — per-conversation symmetric key store
//! - `pipeline`   — instant / secure / reliable transforms
//! - `dispatcher` — type- and command-directed content processing
//! - `processors` — group membership command processors
//! - `messenger`  — inbound/outbound orchestration over the above
//! - `resolver`, `transport` — collaborator traits (identity, CDN, wire)

pub mod dispatcher;
pub mod error;
pub mod keycache;
pub mod messenger;
pub mod pipeline;
pub mod processors;
pub mod resolver;
pub mod transport;

pub use dispatcher::{ContentDispatcher, ContentProcessor, ProcessorContext};
pub use error::CoreError;
pub use keycache::{CipherKeyCache, CipherKeyDelegate};
pub use messenger::Messenger;
pub use pipeline::Pipeline;
pub use resolver::{GroupInfo, IdentityResolver, LocalUser};
pub use transport::{MessageStore, MessengerDelegate, OutboundChannel};
