use super::ConnectionKey;

/// Errors that can occur during registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection already registered: {0}")]
    DuplicateKey(ConnectionKey),

    #[error("connection not found: {0}")]
    NotFound(ConnectionKey),
}
