//! Error types for the notebridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for all notebridge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Speech recognition errors ---
    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures raised by a note backend adapter.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend does not implement this capability at all.
    #[error("Operation '{operation}' is not supported by backend '{backend}'")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The response did not match the expected schema.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Note not found: {0}")]
    NotFound(String),
}

impl BackendError {
    pub fn unsupported(backend: impl Into<String>, operation: &'static str) -> Self {
        BackendError::Unsupported {
            backend: backend.into(),
            operation,
        }
    }

    /// Whether this error reports a capability gap rather than a failure.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, BackendError::Unsupported { .. })
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Unauthorized sender: {sender_id} on {channel}")]
    Unauthorized { channel: String, sender_id: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transcription not configured")]
    NotConfigured,

    #[error("Transcription request failed: {0}")]
    Request(String),

    #[error("Transcription returned no text")]
    EmptyResult,
}
