//! Identity resolution — the external meta/entity collaborator.
//!
//! Meta derivation, persistence and the entity cache live outside this core;
//! the pipeline and processors consume them through this trait. A `None` from
//! `verify_key`/`encrypt_key`/`group_info` means "not known yet" — the caller
//! suspends, the host queries the network and replays later.

use std::sync::Arc;

use dm_crypto::{DecryptKey, EncryptKey, SignKey, VerifyKey};
use dm_proto::ID;

/// Group membership state: `{owner, members, assistants}`.
#[derive(Clone, Default)]
pub struct GroupInfo {
    pub owner: Option<ID>,
    pub members: Vec<ID>,
    pub assistants: Vec<ID>,
}

impl GroupInfo {
    /// A group with no owner or no members is inconsistent and must be
    /// repaired via `reset` before other membership commands are honoured.
    pub fn is_empty(&self) -> bool {
        self.owner.is_none() || self.members.is_empty()
    }

    pub fn has_member(&self, id: &ID) -> bool {
        self.members.contains(id)
    }

    pub fn has_assistant(&self, id: &ID) -> bool {
        self.assistants.contains(id)
    }

    pub fn is_owner(&self, id: &ID) -> bool {
        self.owner.as_ref() == Some(id)
    }
}

/// A local identity with its private capabilities.
#[derive(Clone)]
pub struct LocalUser {
    pub id: ID,
    pub decrypt_key: Arc<dyn DecryptKey>,
    pub sign_key: Arc<dyn SignKey>,
}

pub trait IdentityResolver: Send + Sync {
    /// Current verification key from the identity's meta, if known.
    fn verify_key(&self, id: &ID) -> Option<Arc<dyn VerifyKey>>;

    /// Current public encryption key, if known.
    fn encrypt_key(&self, id: &ID) -> Option<Arc<dyn EncryptKey>>;

    /// Group state; `None` when the group's meta is not known yet.
    fn group_info(&self, group: &ID) -> Option<GroupInfo>;

    /// Persist an updated member set. Returns false when the write fails.
    fn save_members(&self, members: &[ID], group: &ID) -> bool;

    /// Identities this endpoint can decrypt and sign for, preferred first.
    fn local_users(&self) -> Vec<LocalUser>;
}
