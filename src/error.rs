//! Error types for voxnexus.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxnexusError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Audio codec unavailable: {message}")]
    CodecUnavailable { message: String },

    // Codec errors
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Audio encoding failed: {message}")]
    Encode { message: String },

    // Pipeline stage errors
    #[error("Speech inference failed: {message}")]
    Inference { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Audio file errors
    #[error("WAV error: {message}")]
    Wav { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl VoxnexusError {
    pub(crate) fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// True for errors raised while validating static parameters.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. }
                | Self::InvalidConfig { .. }
                | Self::Config(_)
                | Self::CodecUnavailable { .. }
        )
    }
}

/// A packet could not be turned back into samples.
///
/// Returned per call by the decoders so callers can skip, retry or back off.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed packet: {message}")]
    Malformed { message: String },

    #[error("Unexpected packet length: expected {expected} bytes, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxnexusError>;
