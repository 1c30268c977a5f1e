use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Symmetric decryption failed (bad padding or wrong key)")]
    SymmetricDecrypt,

    #[error("Key transport encryption failed")]
    SealEncrypt,

    #[error("Key transport decryption failed (wrong recipient key or tampering)")]
    SealDecrypt,

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
