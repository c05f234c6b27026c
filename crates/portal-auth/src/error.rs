//! Error types for credential storage operations

/// Errors from credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;
