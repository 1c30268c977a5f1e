//! The message transform pipeline.
//!
//! Instant ⇄ Secure ⇄ Reliable. Each transition is a pure function of the
//! prior form plus collaborator lookups; the only state the pipeline touches
//! is the cipher key cache it is given. The pipeline holds non-owning
//! references to its collaborators.
//!
//! Conversation keys are cached under (sender, target) where target is the
//! content's group for group traffic and the envelope receiver otherwise, so
//! a split group message still reuses the group conversation key.

use tracing::{debug, warn};

use dm_crypto::{DecryptKey, EncryptKey, SymmetricKey};
use dm_proto::{
    content::ContentBody, Content, InstantMessage, ReliableMessage, SecureMessage, B64, ID,
};

use crate::error::CoreError;
use crate::keycache::CipherKeyDelegate;
use crate::resolver::{IdentityResolver, LocalUser};
use crate::transport::MessengerDelegate;

pub struct Pipeline<'a> {
    resolver: &'a dyn IdentityResolver,
    key_cache: &'a dyn CipherKeyDelegate,
    delegate: &'a dyn MessengerDelegate,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        resolver: &'a dyn IdentityResolver,
        key_cache: &'a dyn CipherKeyDelegate,
        delegate: &'a dyn MessengerDelegate,
    ) -> Self {
        Pipeline {
            resolver,
            key_cache,
            delegate,
        }
    }

    /// The conversation partner a content key is cached under.
    fn conversation_target(group: Option<&ID>, receiver: &ID) -> ID {
        group.cloned().unwrap_or_else(|| receiver.clone())
    }

    /// Conversation key for sender→target, minting and caching on a miss.
    /// Broadcast targets get the PLAIN singleton and never touch the cache.
    fn conversation_key(&self, sender: &ID, target: &ID) -> SymmetricKey {
        if target.is_broadcast() {
            return SymmetricKey::plain();
        }
        match self.key_cache.get_cipher_key(sender, target, true) {
            Some(key) => key,
            None => {
                let key = SymmetricKey::generate();
                self.key_cache.cache_cipher_key(sender, target, key.clone());
                debug!(%sender, %target, "minted fresh conversation key");
                key
            }
        }
    }

    // ── Instant → Secure ─────────────────────────────────────────────────────

    pub fn encrypt_message(&self, msg: InstantMessage) -> Result<SecureMessage, CoreError> {
        let InstantMessage {
            mut envelope,
            mut content,
        } = msg;
        let sender = envelope.sender.clone();
        let receiver = envelope.receiver.clone();
        let target = Self::conversation_target(content.group.as_ref(), &receiver);
        let key = self.conversation_key(&sender, &target);

        // Attachment payloads go to the CDN collaborator encrypted; on
        // success the raw bytes are replaced by the returned reference before
        // the content itself is encrypted.
        if let ContentBody::File(file) = &mut content.body {
            if let Some(data) = file.data.take() {
                let encrypted = key.encrypt(data.as_bytes())?;
                let probe = InstantMessage {
                    envelope: envelope.clone(),
                    content: Content {
                        sn: content.sn,
                        group: content.group.clone(),
                        body: ContentBody::File(file.clone()),
                    },
                };
                match self.delegate.upload_data(&encrypted, &probe) {
                    Some(url) => file.url = Some(url),
                    None => file.data = Some(data), // keep inline, best effort
                }
            }
        }

        // Routing hints for relays that must not decrypt.
        envelope.group = content.group.clone();
        envelope.content_type = Some(content.content_type());

        let plaintext = serde_json::to_vec(&content)?;
        let data = B64(key.encrypt(&plaintext)?);

        // PLAIN has no wrapped key on the wire.
        if key.is_plain() {
            return Ok(SecureMessage {
                envelope,
                data,
                key: None,
                keys: None,
            });
        }

        let key_bytes = key.to_bytes()?;
        if receiver.is_group() {
            // Group fan-out: wrap the conversation key once per member.
            let info = self
                .resolver
                .group_info(&receiver)
                .ok_or_else(|| CoreError::GroupUnavailable(receiver.clone()))?;
            let mut keys = std::collections::BTreeMap::new();
            for member in &info.members {
                let public = self
                    .resolver
                    .encrypt_key(member)
                    .ok_or_else(|| CoreError::KeyUnavailable(member.clone()))?;
                keys.insert(member.to_string(), B64(public.encrypt(&key_bytes)?));
            }
            Ok(SecureMessage {
                envelope,
                data,
                key: None,
                keys: Some(keys),
            })
        } else {
            let public = self
                .resolver
                .encrypt_key(&receiver)
                .ok_or_else(|| CoreError::KeyUnavailable(receiver.clone()))?;
            Ok(SecureMessage {
                envelope,
                data,
                key: Some(B64(public.encrypt(&key_bytes)?)),
                keys: None,
            })
        }
    }

    // ── Secure → Reliable ────────────────────────────────────────────────────

    /// Sign the encrypted content with the sender's private signing key.
    /// Fails only when the sender is not a local identity — a configuration
    /// error, not a retryable condition.
    pub fn sign_message(&self, msg: SecureMessage) -> Result<ReliableMessage, CoreError> {
        let sender = msg.envelope.sender.clone();
        let user = self
            .resolver
            .local_users()
            .into_iter()
            .find(|u| u.id == sender)
            .ok_or(CoreError::MissingPrivateKey(sender))?;
        let signature = B64(user.sign_key.sign(msg.data.as_bytes()));
        Ok(ReliableMessage {
            message: msg,
            signature,
        })
    }

    // ── Reliable → Secure ────────────────────────────────────────────────────

    /// Check the signature against the sender's current verification key.
    /// Unknown meta defers (suspend); a bad signature rejects (silent drop).
    pub fn verify_message(&self, msg: ReliableMessage) -> Result<SecureMessage, CoreError> {
        let sender = &msg.message.envelope.sender;
        let Some(verify_key) = self.resolver.verify_key(sender) else {
            debug!(%sender, "sender meta unknown, suspending");
            return Err(CoreError::MetaUnavailable(sender.clone()));
        };
        if !verify_key.verify(msg.message.data.as_bytes(), msg.signature.as_bytes()) {
            warn!(%sender, "signature check failed, dropping");
            return Err(CoreError::Rejected);
        }
        Ok(msg.message)
    }

    // ── Local identity selection + trim ──────────────────────────────────────

    /// Pick the local identity a message is for: any local user for
    /// broadcast, a member-matching user for group traffic, the exact match
    /// otherwise.
    pub fn select_local(&self, receiver: &ID) -> Option<LocalUser> {
        let users = self.resolver.local_users();
        if receiver.is_broadcast() {
            return users.into_iter().next();
        }
        if receiver.is_group() {
            let info = self.resolver.group_info(receiver)?;
            return users.into_iter().find(|u| info.has_member(&u.id));
        }
        users.into_iter().find(|u| &u.id == receiver)
    }

    // ── Secure → Instant ─────────────────────────────────────────────────────

    pub fn decrypt_message(&self, msg: SecureMessage) -> Result<InstantMessage, CoreError> {
        let receiver = msg.envelope.receiver.clone();
        let user = self
            .select_local(&receiver)
            .ok_or_else(|| CoreError::NotForMe(receiver.clone()))?;
        let msg = if receiver.is_group() {
            msg.trim(&user.id)
        } else {
            msg
        };

        let sender = msg.envelope.sender.clone();
        let target = Self::conversation_target(msg.envelope.group.as_ref(), &receiver);

        let key = match msg.wrapped_key_for(&user.id) {
            Some(wrapped) => {
                let key_bytes = user.decrypt_key.decrypt(wrapped.as_bytes()).map_err(|_| {
                    warn!(%sender, "wrapped key does not unwrap for us");
                    CoreError::Rejected
                })?;
                let key = SymmetricKey::from_bytes(&key_bytes)?;
                // Reuse on subsequent messages in this conversation.
                self.key_cache.cache_cipher_key(&sender, &target, key.clone());
                key
            }
            None if target.is_broadcast() => SymmetricKey::plain(),
            None => self
                .key_cache
                .get_cipher_key(&sender, &target, false)
                .ok_or(CoreError::Rejected)?,
        };

        let plaintext = key.decrypt(msg.data.as_bytes()).map_err(|_| {
            warn!(%sender, "content does not decrypt");
            CoreError::Rejected
        })?;
        let mut content: Content = serde_json::from_slice(&plaintext)?;

        // Attachment download; a missing reference keeps the key on the
        // content for a later retry instead of failing the decrypt.
        if let ContentBody::File(file) = &mut content.body {
            if let (Some(url), None) = (&file.url, &file.data) {
                let probe = InstantMessage {
                    envelope: msg.envelope.clone(),
                    content: Content {
                        sn: content.sn,
                        group: content.group.clone(),
                        body: ContentBody::File(file.clone()),
                    },
                };
                match self.delegate.download_data(url, &probe) {
                    Some(bytes) => {
                        file.data = Some(B64(key.decrypt(&bytes)?));
                        file.url = None;
                    }
                    None => file.password = Some(key.clone()),
                }
            }
        }

        // A forward wrapper carries a message for someone — possibly us.
        // If the inner message verifies and decrypts here, surface it;
        // otherwise hand the wrapper back unchanged for re-forwarding.
        if let ContentBody::Forward(inner) = &content.body {
            let inner = (**inner).clone();
            match self
                .verify_message(inner)
                .and_then(|secure| self.decrypt_message(secure))
            {
                Ok(instant) => return Ok(instant),
                Err(err) if err.is_rejected() => {
                    debug!("forwarded message is not for us, keeping wrapper");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(InstantMessage {
            envelope: msg.envelope,
            content,
        })
    }

    // ── Split ────────────────────────────────────────────────────────────────

    /// Fan a group reliable message out into one personal-shaped message per
    /// member, each re-signed. An empty member list fails; the caller sends
    /// the group-shaped original as a best effort.
    pub fn split_message(
        &self,
        msg: &ReliableMessage,
        members: &[ID],
    ) -> Result<Vec<ReliableMessage>, CoreError> {
        if members.is_empty() {
            return Err(CoreError::EmptyGroup(msg.message.envelope.receiver.clone()));
        }
        let mut parts = Vec::with_capacity(members.len());
        for member in members {
            let mut part = msg.message.trim(member);
            part.envelope.receiver = member.clone();
            parts.push(self.sign_message(part)?);
        }
        Ok(parts)
    }

    // ── Wire bytes ───────────────────────────────────────────────────────────

    pub fn serialize_message(&self, msg: &ReliableMessage) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(msg)?)
    }

    pub fn deserialize_message(&self, data: &[u8]) -> Result<ReliableMessage, CoreError> {
        Ok(serde_json::from_slice(data)?)
    }
}
