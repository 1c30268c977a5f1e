//! Symmetric content keys.
//!
//! Wire form is a keyed dictionary:
//!   `{ "algorithm": "AES",   "data": <base64 key>, "iv": <base64 iv> }`
//!   `{ "algorithm": "PLAIN" }`
//!
//! AES is AES-256-CBC with PKCS#7 padding (32-byte key, 16-byte IV); the IV
//! travels inside the key dictionary, not prepended to the ciphertext, so a
//! cached conversation key reproduces the same transform on both ends.
//!
//! PLAIN is the distinguished broadcast key: identity encrypt/decrypt and
//! zero-length key data. It is a value, not a secret — anyone holds it.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::capability::{DecryptKey, EncryptKey};
use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const ALGORITHM_AES: &str = "AES";
pub const ALGORITHM_PLAIN: &str = "PLAIN";

/// A reusable conversation content key.
///
/// Equality is structural over the key material, so two keys parsed from the
/// same dictionary compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymmetricKey {
    Aes(AesKey),
    Plain,
}

/// AES-256-CBC key material. Zeroized on drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesKey {
    key: [u8; 32],
    iv: [u8; 16],
}

impl Drop for AesKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl SymmetricKey {
    /// Mint a fresh random AES key (new conversation).
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        let mut iv = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut key);
        rand::rngs::OsRng.fill_bytes(&mut iv);
        SymmetricKey::Aes(AesKey { key, iv })
    }

    /// The broadcast no-op key.
    pub fn plain() -> Self {
        SymmetricKey::Plain
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            SymmetricKey::Aes(_) => ALGORITHM_AES,
            SymmetricKey::Plain => ALGORITHM_PLAIN,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, SymmetricKey::Plain)
    }

    /// Raw key data; empty for PLAIN.
    pub fn data(&self) -> &[u8] {
        match self {
            SymmetricKey::Aes(k) => &k.key,
            SymmetricKey::Plain => &[],
        }
    }

    /// Serialise to the wire dictionary (JSON bytes). This is what gets
    /// wrapped per recipient in a secure message.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a wire dictionary back into a key.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        Ok(serde_json::from_slice(data)?)
    }
}

impl EncryptKey for SymmetricKey {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            SymmetricKey::Plain => Ok(plaintext.to_vec()),
            SymmetricKey::Aes(k) => {
                let cipher = Aes256CbcEnc::new(&k.key.into(), &k.iv.into());
                Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
            }
        }
    }
}

impl DecryptKey for SymmetricKey {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match self {
            SymmetricKey::Plain => Ok(ciphertext.to_vec()),
            SymmetricKey::Aes(k) => {
                let cipher = Aes256CbcDec::new(&k.key.into(), &k.iv.into());
                cipher
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| CryptoError::SymmetricDecrypt)
            }
        }
    }
}

// ── Wire dictionary (de)serialisation ────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct KeyDict {
    algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iv: Option<String>,
}

impl Serialize for SymmetricKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dict = match self {
            SymmetricKey::Plain => KeyDict {
                algorithm: ALGORITHM_PLAIN.into(),
                data: None,
                iv: None,
            },
            SymmetricKey::Aes(k) => KeyDict {
                algorithm: ALGORITHM_AES.into(),
                data: Some(STANDARD.encode(k.key)),
                iv: Some(STANDARD.encode(k.iv)),
            },
        };
        dict.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SymmetricKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let dict = KeyDict::deserialize(deserializer)?;
        match dict.algorithm.as_str() {
            ALGORITHM_PLAIN => Ok(SymmetricKey::Plain),
            ALGORITHM_AES => {
                let data = dict
                    .data
                    .ok_or_else(|| D::Error::custom("AES key missing 'data'"))?;
                let iv = dict
                    .iv
                    .ok_or_else(|| D::Error::custom("AES key missing 'iv'"))?;
                let key_bytes = STANDARD.decode(data).map_err(D::Error::custom)?;
                let iv_bytes = STANDARD.decode(iv).map_err(D::Error::custom)?;
                let key: [u8; 32] = key_bytes
                    .try_into()
                    .map_err(|_| D::Error::custom("AES key must be 32 bytes"))?;
                let iv: [u8; 16] = iv_bytes
                    .try_into()
                    .map_err(|_| D::Error::custom("AES IV must be 16 bytes"))?;
                Ok(SymmetricKey::Aes(AesKey { key, iv }))
            }
            other => Err(D::Error::custom(format!("unknown algorithm: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_key() -> SymmetricKey {
        serde_json::from_str(
            r#"{
                "algorithm": "AES",
                "data": "C2+xGizLL1G1+z9QLPYNdp/bPP/seDvNw45SXPAvQqk=",
                "iv": "SxPwi6u4+ZLXLdAFJezvSQ=="
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn aes_known_vector() {
        let key = fixed_key();
        let ciphertext = key.encrypt(b"moky").unwrap();
        assert_eq!(STANDARD.encode(&ciphertext), "0xtbqZN6x2aWTZn0DpCoCA==");

        let plaintext = key.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"moky");
    }

    #[test]
    fn aes_decrypt_fixed_ciphertext() {
        let key = fixed_key();
        let ciphertext = STANDARD.decode("0xtbqZN6x2aWTZn0DpCoCA==").unwrap();
        assert_eq!(key.decrypt(&ciphertext).unwrap(), b"moky");
    }

    #[test]
    fn keys_from_same_dict_compare_equal() {
        assert_eq!(fixed_key(), fixed_key());
    }

    #[test]
    fn generated_keys_roundtrip_and_differ() {
        let a = SymmetricKey::generate();
        let b = SymmetricKey::generate();
        assert_ne!(a, b);

        let ct = a.encrypt(b"hello mesh").unwrap();
        assert_ne!(ct, b"hello mesh");
        assert_eq!(a.decrypt(&ct).unwrap(), b"hello mesh");
        assert!(b.decrypt(&ct).is_err() || b.decrypt(&ct).unwrap() != b"hello mesh");
    }

    #[test]
    fn plain_is_identity_with_empty_data() {
        let key = SymmetricKey::plain();
        assert!(key.data().is_empty());
        assert_eq!(key.encrypt(b"anyone").unwrap(), b"anyone");
        assert_eq!(key.decrypt(b"anyone").unwrap(), b"anyone");
        // zero-length plaintext is a valid input
        assert_eq!(key.encrypt(b"").unwrap(), b"");
    }

    #[test]
    fn plain_serialises_without_data() {
        let json = serde_json::to_value(SymmetricKey::plain()).unwrap();
        assert_eq!(json, serde_json::json!({"algorithm": "PLAIN"}));
        let back: SymmetricKey = serde_json::from_value(json).unwrap();
        assert!(back.is_plain());
    }

    #[test]
    fn wire_roundtrip() {
        let key = SymmetricKey::generate();
        let bytes = key.to_bytes().unwrap();
        assert_eq!(SymmetricKey::from_bytes(&bytes).unwrap(), key);
    }
}
