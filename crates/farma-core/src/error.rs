use thiserror::Error;

/// Top-level error type for the FarmaChat workspace.
///
/// Subsystem crates define their own error types where they need a richer
/// boundary (see `farma_chat::ChatError`) and convert from `FarmaError` so
/// that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FarmaError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Camera permission denied or no device for the requested facing.
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Image encoding error: {0}")]
    Encode(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for FarmaError {
    fn from(err: toml::de::Error) -> Self {
        FarmaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FarmaError {
    fn from(err: toml::ser::Error) -> Self {
        FarmaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FarmaError {
    fn from(err: serde_json::Error) -> Self {
        FarmaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for FarmaChat operations.
pub type Result<T> = std::result::Result<T, FarmaError>;
