//! Key capability traits.
//!
//! The message layer is written against these four capabilities, never
//! against concrete algorithms. A key kind implements only the capabilities
//! it actually has: a symmetric content key is Encrypt+Decrypt, a recipient's
//! published transport key is Encrypt only, the local transport secret is
//! Decrypt only, and signing/verification keys are Sign/Verify respectively.

use crate::error::CryptoError;

/// Can turn plaintext into ciphertext.
pub trait EncryptKey: Send + Sync {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Can turn ciphertext back into plaintext.
pub trait DecryptKey: Send + Sync {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Can produce a detached signature over arbitrary bytes.
pub trait SignKey: Send + Sync {
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Can check a detached signature.
pub trait VerifyKey: Send + Sync {
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}
