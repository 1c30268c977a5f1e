use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid content: {0}")]
    InvalidContent(String),
}
