use thiserror::Error;

/// Top-level error type for Chorus.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// Error from a language-model backend.
    #[error("provider error: {0}")]
    Provider(String),

    /// Error from the messaging transport.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Persistence error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Error from a speech, image, or transcription vendor.
    #[error("media error: {0}")]
    Media(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
