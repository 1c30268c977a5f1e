//! Message signing.
//!
//! Ed25519 detached signatures over the encrypted content bytes of a
//! reliable message. The verifying half is what an identity's meta publishes;
//! the signing half never leaves the local endpoint.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use crate::capability::{SignKey, VerifyKey};
use crate::error::CryptoError;

/// Local signing keypair. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct MessageSigningKey {
    secret_bytes: [u8; 32],
}

impl MessageSigningKey {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            secret_bytes: signing_key.to_bytes(),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("signing key must be 32 bytes".into()))?;
        Ok(Self { secret_bytes: arr })
    }

    pub fn verify_key(&self) -> MessageVerifyKey {
        let signing_key = SigningKey::from_bytes(&self.secret_bytes);
        MessageVerifyKey(signing_key.verifying_key().to_bytes())
    }
}

impl SignKey for MessageSigningKey {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret_bytes);
        signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Published verification key (from an identity's meta).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageVerifyKey(pub [u8; 32]);

impl VerifyKey for MessageVerifyKey {
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
            return false;
        };
        vk.verify(message, &Signature::from_bytes(&sig_bytes)).is_ok()
    }
}
