#![allow(dead_code)]
//! Shared in-memory collaborators for the integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use dm_core::{CoreError, GroupInfo, IdentityResolver, LocalUser, MessageStore, MessengerDelegate, OutboundChannel};
use dm_crypto::{EncryptKey, MessageSigningKey, TransportSecretKey, VerifyKey};
use dm_proto::{Address, Content, InstantMessage, NetworkType, ReliableMessage, ID};

pub fn user(name: &str) -> ID {
    ID::new(Some(name), Address::concrete(NetworkType::Main, name))
}

pub fn group(name: &str) -> ID {
    ID::new(Some(name), Address::concrete(NetworkType::Group, name))
}

/// One identity with its full key material.
pub struct Person {
    pub id: ID,
    pub signing: Arc<MessageSigningKey>,
    pub transport: Arc<TransportSecretKey>,
}

impl Person {
    pub fn new(name: &str) -> Self {
        Person {
            id: user(name),
            signing: Arc::new(MessageSigningKey::generate()),
            transport: Arc::new(TransportSecretKey::generate()),
        }
    }

    pub fn local_user(&self) -> LocalUser {
        LocalUser {
            id: self.id.clone(),
            decrypt_key: self.transport.clone(),
            sign_key: self.signing.clone(),
        }
    }
}

/// Resolver over plain maps. `learn` registers another identity's public
/// keys; `add_local` makes an identity this endpoint can act as.
#[derive(Default)]
pub struct MemoryResolver {
    verify_keys: HashMap<ID, Arc<dyn VerifyKey>>,
    encrypt_keys: HashMap<ID, Arc<dyn EncryptKey>>,
    groups: RwLock<HashMap<ID, GroupInfo>>,
    locals: Vec<LocalUser>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn learn(&mut self, person: &Person) {
        self.verify_keys
            .insert(person.id.clone(), Arc::new(person.signing.verify_key()));
        self.encrypt_keys
            .insert(person.id.clone(), Arc::new(person.transport.public_key()));
    }

    pub fn add_local(&mut self, person: &Person) {
        self.locals.push(person.local_user());
    }

    pub fn put_group(&self, id: ID, info: GroupInfo) {
        self.groups.write().insert(id, info);
    }

    pub fn group(&self, id: &ID) -> Option<GroupInfo> {
        self.groups.read().get(id).cloned()
    }
}

impl IdentityResolver for MemoryResolver {
    fn verify_key(&self, id: &ID) -> Option<Arc<dyn VerifyKey>> {
        self.verify_keys.get(id).cloned()
    }

    fn encrypt_key(&self, id: &ID) -> Option<Arc<dyn EncryptKey>> {
        self.encrypt_keys.get(id).cloned()
    }

    fn group_info(&self, group: &ID) -> Option<GroupInfo> {
        self.groups.read().get(group).cloned()
    }

    fn save_members(&self, members: &[ID], group: &ID) -> bool {
        let mut groups = self.groups.write();
        let entry = groups.entry(group.clone()).or_default();
        entry.members = members.to_vec();
        true
    }

    fn local_users(&self) -> Vec<LocalUser> {
        self.locals.clone()
    }
}

/// Transport stub: records outbound packages, keeps uploads in a map.
/// Downloads are served only when `serve_downloads` is set, so the
/// retry-later path is testable.
#[derive(Default)]
pub struct RecordingDelegate {
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub uploads: Mutex<HashMap<String, Vec<u8>>>,
    pub serve_downloads: bool,
}

impl RecordingDelegate {
    pub fn serving() -> Self {
        RecordingDelegate {
            serve_downloads: true,
            ..Self::default()
        }
    }

    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.sent.lock().last().cloned()
    }
}

impl MessengerDelegate for RecordingDelegate {
    fn upload_data(&self, data: &[u8], _msg: &InstantMessage) -> Option<String> {
        let mut uploads = self.uploads.lock();
        let url = format!("dmf://cdn/{}", uploads.len());
        uploads.insert(url.clone(), data.to_vec());
        Some(url)
    }

    fn download_data(&self, url: &str, _msg: &InstantMessage) -> Option<Vec<u8>> {
        if self.serve_downloads {
            self.uploads.lock().get(url).cloned()
        } else {
            None
        }
    }

    fn send_package(&self, data: &[u8]) -> bool {
        self.sent.lock().push(data.to_vec());
        true
    }
}

/// Store stub recording history and both suspension queues.
#[derive(Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<InstantMessage>>,
    pub suspended_instant: Mutex<Vec<(InstantMessage, String)>>,
    pub suspended_reliable: Mutex<Vec<(ReliableMessage, String)>>,
}

impl MessageStore for MemoryStore {
    fn save_message(&self, msg: &InstantMessage) -> bool {
        self.saved.lock().push(msg.clone());
        true
    }

    fn suspend_instant(&self, msg: InstantMessage, reason: &CoreError) {
        self.suspended_instant.lock().push((msg, reason.to_string()));
    }

    fn suspend_reliable(&self, msg: ReliableMessage, reason: &CoreError) {
        self.suspended_reliable.lock().push((msg, reason.to_string()));
    }
}

/// Outbound stub for driving the dispatcher without a messenger.
#[derive(Default)]
pub struct RecordingOutbound {
    pub sent: Mutex<Vec<(Content, ID)>>,
}

impl OutboundChannel for RecordingOutbound {
    fn send_content(&self, content: Content, receiver: &ID) -> bool {
        self.sent.lock().push((content, receiver.clone()));
        true
    }
}
