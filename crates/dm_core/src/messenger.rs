//! Messenger — orchestration of the transform pipeline and content dispatch.
//!
//! Outbound: save, encrypt, sign, split group traffic per member, hand each
//! serialised package to the transport. Inbound: verify, decrypt, dispatch,
//! and return the serialised response package (if the processor produced
//! one) for the host to transmit.
//!
//! Deferred outcomes never surface as errors from the public entry points:
//! an outbound message missing the receiver's key is parked on the host's
//! pending queue via `MessageStore::suspend_instant`, an inbound message
//! missing the sender's or group's meta via `suspend_reliable`. Rejected
//! outcomes are dropped silently. Only fatal misconfiguration propagates.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use dm_proto::{Content, InstantMessage, ReliableMessage, ID};

use crate::dispatcher::{ContentDispatcher, ProcessorContext};
use crate::error::CoreError;
use crate::keycache::CipherKeyDelegate;
use crate::pipeline::Pipeline;
use crate::resolver::IdentityResolver;
use crate::transport::{MessageStore, MessengerDelegate, OutboundChannel};

pub struct Messenger<'a> {
    resolver: &'a dyn IdentityResolver,
    key_cache: &'a dyn CipherKeyDelegate,
    delegate: &'a dyn MessengerDelegate,
    store: &'a dyn MessageStore,
    dispatcher: Mutex<ContentDispatcher>,
}

impl<'a> Messenger<'a> {
    /// Messenger with the standard group command processors registered.
    pub fn new(
        resolver: &'a dyn IdentityResolver,
        key_cache: &'a dyn CipherKeyDelegate,
        delegate: &'a dyn MessengerDelegate,
        store: &'a dyn MessageStore,
    ) -> Self {
        Self::with_dispatcher(resolver, key_cache, delegate, store, ContentDispatcher::standard())
    }

    /// Messenger over a caller-configured dispatcher (extra content types,
    /// application command processors).
    pub fn with_dispatcher(
        resolver: &'a dyn IdentityResolver,
        key_cache: &'a dyn CipherKeyDelegate,
        delegate: &'a dyn MessengerDelegate,
        store: &'a dyn MessageStore,
        dispatcher: ContentDispatcher,
    ) -> Self {
        Messenger {
            resolver,
            key_cache,
            delegate,
            store,
            dispatcher: Mutex::new(dispatcher),
        }
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(self.resolver, self.key_cache, self.delegate)
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    /// Wrap a content in an envelope from the first local identity and send
    /// it. Returns false when the message was suspended or the transport
    /// refused it.
    pub fn send_content(&self, content: Content, receiver: &ID) -> Result<bool, CoreError> {
        let Some(user) = self.resolver.local_users().into_iter().next() else {
            warn!("no local identity to send from");
            return Ok(false);
        };
        let msg = InstantMessage::new(content, user.id, receiver.clone());
        self.send_message(msg)
    }

    /// Full outbound path: history, encrypt, sign, split, deliver.
    pub fn send_message(&self, msg: InstantMessage) -> Result<bool, CoreError> {
        self.store.save_message(&msg);
        let pipeline = self.pipeline();

        let secure = match pipeline.encrypt_message(msg.clone()) {
            Ok(secure) => secure,
            Err(err) if err.is_deferred() => {
                info!(reason = %err, "outbound message suspended");
                self.store.suspend_instant(msg, &err);
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        let reliable = pipeline.sign_message(secure)?;

        let receiver = &reliable.message.envelope.receiver;
        if receiver.is_group() && reliable.message.is_group_shaped() {
            let members = self
                .resolver
                .group_info(receiver)
                .map(|info| info.members)
                .unwrap_or_default();
            match pipeline.split_message(&reliable, &members) {
                Ok(parts) => {
                    let mut all_sent = true;
                    for part in parts {
                        all_sent &= self.deliver(&part)?;
                    }
                    return Ok(all_sent);
                }
                Err(CoreError::EmptyGroup(group)) => {
                    // No member list to fan out over; ship the group-shaped
                    // original and let the station split it.
                    debug!(%group, "no members to split for, sending group-shaped");
                }
                Err(err) => return Err(err),
            }
        }
        self.deliver(&reliable)
    }

    fn deliver(&self, msg: &ReliableMessage) -> Result<bool, CoreError> {
        let data = self.pipeline().serialize_message(msg)?;
        Ok(self.delegate.send_package(&data))
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// One inbound package, full round-trip: verify → decrypt → dispatch.
    /// Returns the serialised response package when a processor produced a
    /// response; `None` means handled silently (or suspended / dropped).
    pub fn process_package(&self, data: &[u8]) -> Result<Option<Vec<u8>>, CoreError> {
        let reliable = self.pipeline().deserialize_message(data)?;
        match self.process_reliable(reliable)? {
            Some(response) => Ok(Some(self.pipeline().serialize_message(&response)?)),
            None => Ok(None),
        }
    }

    /// Inbound round-trip over message structs. Split out so hosts carrying
    /// their own framing can skip the byte layer.
    pub fn process_reliable(
        &self,
        reliable: ReliableMessage,
    ) -> Result<Option<ReliableMessage>, CoreError> {
        let pipeline = self.pipeline();

        let secure = match pipeline.verify_message(reliable.clone()) {
            Ok(secure) => secure,
            Err(err) if err.is_deferred() => {
                info!(reason = %err, "inbound message suspended before verify");
                self.store.suspend_reliable(reliable, &err);
                return Ok(None);
            }
            Err(err) if err.is_rejected() => return Ok(None),
            Err(err) => return Err(err),
        };

        let mut instant = match pipeline.decrypt_message(secure) {
            Ok(instant) => instant,
            Err(err) if err.is_deferred() => {
                info!(reason = %err, "inbound message suspended before decrypt");
                self.store.suspend_reliable(reliable, &err);
                return Ok(None);
            }
            Err(err) if err.is_rejected() => {
                debug!(reason = %err, "inbound message dropped");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.store.save_message(&instant);

        let sender = instant.envelope.sender.clone();
        let ctx = ProcessorContext {
            resolver: self.resolver,
            outbound: self,
        };
        // Processors annotate the live content; the message argument is a
        // snapshot of the delivered form.
        let delivered = instant.clone();
        let response = {
            let mut dispatcher = self.dispatcher.lock();
            match dispatcher.process(&mut instant.content, &sender, &delivered, &ctx) {
                Ok(response) => response,
                Err(err) if err.is_deferred() => {
                    info!(reason = %err, "inbound message suspended before dispatch");
                    self.store.suspend_reliable(reliable, &err);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        };
        let Some(response) = response else {
            return Ok(None);
        };

        // Respond as the identity the message was decrypted for, back to the
        // original sender.
        let receiver = &instant.envelope.receiver;
        let Some(user) = pipeline.select_local(receiver) else {
            return Ok(None);
        };
        let reply = InstantMessage::new(response, user.id, sender);
        let secure = match pipeline.encrypt_message(reply.clone()) {
            Ok(secure) => secure,
            Err(err) if err.is_deferred() => {
                info!(reason = %err, "response suspended");
                self.store.suspend_instant(reply, &err);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        Ok(Some(pipeline.sign_message(secure)?))
    }
}

/// Proactive sends from processors (group info queries) ride the normal
/// outbound path; failures are logged, never propagated into dispatch.
impl OutboundChannel for Messenger<'_> {
    fn send_content(&self, content: Content, receiver: &ID) -> bool {
        match Messenger::send_content(self, content, receiver) {
            Ok(sent) => sent,
            Err(err) => {
                warn!(%receiver, reason = %err, "proactive send failed");
                false
            }
        }
    }
}
