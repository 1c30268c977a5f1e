//! dm_crypto — Darklock Mesh key capabilities
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Secret material zeroized on drop.
//! - Message-layer code never touches raw primitives; it only sees the
//!   capability traits in `capability` and the `SymmetricKey` value type.
//!
//! # Module layout
//! - `capability` — {EncryptKey, DecryptKey, SignKey, VerifyKey} traits
//! - `symmetric`  — AES-256-CBC content key + the no-op PLAIN broadcast key
//! - `seal`       — key transport to a recipient public key (x25519 + AEAD)
//! - `sign`       — Ed25519 message signing keypairs
//! - `error`      — unified error type

pub mod capability;
pub mod error;
pub mod seal;
pub mod sign;
pub mod symmetric;

pub use capability::{DecryptKey, EncryptKey, SignKey, VerifyKey};
pub use error::CryptoError;
pub use seal::{TransportPublicKey, TransportSecretKey};
pub use sign::{MessageSigningKey, MessageVerifyKey};
pub use symmetric::SymmetricKey;
