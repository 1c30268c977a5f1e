//! Per-conversation cipher key cache.
//!
//! Maps a directional (sender, receiver) pair to the reusable symmetric
//! content key of that conversation. A→B and B→A are distinct entries. The
//! cache never mints keys: on a miss it returns `None` even with
//! `generate = true` — the flag tells the caller (the pipeline) that minting
//! and re-caching is expected of *it*. Broadcast receivers never reach the
//! cache; callers substitute the PLAIN singleton instead.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use dm_crypto::SymmetricKey;
use dm_proto::ID;

pub trait CipherKeyDelegate: Send + Sync {
    /// Key for the conversation from `sender` to `receiver`. `generate`
    /// signals that the caller will mint on a miss.
    fn get_cipher_key(&self, sender: &ID, receiver: &ID, generate: bool) -> Option<SymmetricKey>;

    /// Store (or overwrite — peers may rotate) the conversation key.
    fn cache_cipher_key(&self, sender: &ID, receiver: &ID, key: SymmetricKey);
}

/// In-memory implementation. Entries never expire; eviction, if any, is the
/// host's concern. Writes to one entry serialize through the lock.
#[derive(Default)]
pub struct CipherKeyCache {
    keys: RwLock<HashMap<(ID, ID), SymmetricKey>>,
}

impl CipherKeyCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CipherKeyDelegate for CipherKeyCache {
    fn get_cipher_key(&self, sender: &ID, receiver: &ID, generate: bool) -> Option<SymmetricKey> {
        let found = self
            .keys
            .read()
            .get(&(sender.clone(), receiver.clone()))
            .cloned();
        if found.is_none() && generate {
            debug!(%sender, %receiver, "cipher key miss, caller will mint");
        }
        found
    }

    fn cache_cipher_key(&self, sender: &ID, receiver: &ID, key: SymmetricKey) {
        self.keys
            .write()
            .insert((sender.clone(), receiver.clone()), key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_proto::{Address, NetworkType};

    fn id(name: &str) -> ID {
        ID::new(Some(name), Address::concrete(NetworkType::Main, name))
    }

    #[test]
    fn lookup_is_directional() {
        let cache = CipherKeyCache::new();
        let key = SymmetricKey::generate();
        cache.cache_cipher_key(&id("alice"), &id("bob"), key.clone());

        assert_eq!(cache.get_cipher_key(&id("alice"), &id("bob"), false), Some(key));
        assert_eq!(cache.get_cipher_key(&id("bob"), &id("alice"), false), None);
    }

    #[test]
    fn miss_never_mints() {
        let cache = CipherKeyCache::new();
        assert!(cache.get_cipher_key(&id("alice"), &id("bob"), true).is_none());
    }

    #[test]
    fn recaching_overwrites() {
        let cache = CipherKeyCache::new();
        let first = SymmetricKey::generate();
        let rotated = SymmetricKey::generate();
        cache.cache_cipher_key(&id("alice"), &id("bob"), first);
        cache.cache_cipher_key(&id("alice"), &id("bob"), rotated.clone());

        assert_eq!(
            cache.get_cipher_key(&id("alice"), &id("bob"), false),
            Some(rotated)
        );
    }
}
