//! Key transport to a recipient public key.
//!
//! Used to wrap the serialised conversation key once per recipient when a
//! secure message is built. Ephemeral-static ECDH:
//!
//!   epk       = ephemeral X25519 keypair, fresh per sealing
//!   shared    = DH(epk_secret, recipient_public)
//!   aead_key  = HKDF-SHA256(ikm = shared, info = "dm-seal-v1")
//!
//! Wire format: [ epk (32) | nonce (24) | ciphertext + tag ]
//!
//! References:
//!   - RFC 7748 (X25519): <https://datatracker.ietf.org/doc/html/rfc7748>
//!   - RFC 5869 (HKDF):   <https://datatracker.ietf.org/doc/html/rfc5869>

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::capability::{DecryptKey, EncryptKey};
use crate::error::CryptoError;

const SEAL_INFO: &[u8] = b"dm-seal-v1";

fn derive_aead_key(shared: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut okm = [0u8; 32];
    hk.expand(SEAL_INFO, &mut okm)
        .map_err(|_| CryptoError::InvalidKey("HKDF expand failed".into()))?;
    Ok(okm)
}

/// A recipient's published key-agreement key. Encrypt-only capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPublicKey(pub [u8; 32]);

/// The local key-agreement secret. Decrypt-only capability. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct TransportSecretKey {
    secret_bytes: [u8; 32],
}

impl TransportSecretKey {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self {
            secret_bytes: secret.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("transport secret must be 32 bytes".into()))?;
        Ok(Self { secret_bytes: arr })
    }

    pub fn public_key(&self) -> TransportPublicKey {
        let secret = StaticSecret::from(self.secret_bytes);
        TransportPublicKey(X25519Public::from(&secret).to_bytes())
    }
}

impl EncryptKey for TransportPublicKey {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let ephemeral = StaticSecret::random_from_rng(OsRng);
        let epk = X25519Public::from(&ephemeral);
        let mut shared = ephemeral
            .diffie_hellman(&X25519Public::from(self.0))
            .to_bytes();
        let mut aead_key = derive_aead_key(&shared)?;
        shared.zeroize();

        let cipher = XChaCha20Poly1305::new_from_slice(&aead_key)
            .map_err(|_| CryptoError::SealEncrypt)?;
        aead_key.zeroize();
        let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::SealEncrypt)?;

        let mut out = Vec::with_capacity(32 + 24 + ciphertext.len());
        out.extend_from_slice(epk.as_bytes());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl DecryptKey for TransportSecretKey {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < 32 + 24 {
            return Err(CryptoError::SealDecrypt);
        }
        let (epk_bytes, rest) = ciphertext.split_at(32);
        let (nonce_bytes, ct) = rest.split_at(24);

        let epk: [u8; 32] = epk_bytes
            .try_into()
            .map_err(|_| CryptoError::SealDecrypt)?;
        let secret = StaticSecret::from(self.secret_bytes);
        let mut shared = secret.diffie_hellman(&X25519Public::from(epk)).to_bytes();
        let mut aead_key = derive_aead_key(&shared)?;
        shared.zeroize();

        let cipher = XChaCha20Poly1305::new_from_slice(&aead_key)
            .map_err(|_| CryptoError::SealDecrypt)?;
        aead_key.zeroize();
        let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ct)
            .map_err(|_| CryptoError::SealDecrypt)
    }
}
