//! Error types for goban wire decoding.

use thiserror::Error;

/// Errors raised while decoding frames and payloads.
///
/// None of these are fatal: the receive loop drops the offending frame and
/// records a diagnostic.
#[derive(Debug, Error)]
pub enum WireError {
    /// A zero-length frame.
    #[error("empty frame")]
    EmptyFrame,

    /// A frame whose leading protocol marker is not understood.
    #[error("unknown packet type: {0}")]
    UnknownPacket(String),

    /// An event frame that is not `[name, payload?, sequence?]`.
    #[error("malformed event frame: {0}")]
    MalformedEvent(String),

    /// JSON parsing failed
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required payload field is missing or has no usable value.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A payload field is present but cannot be interpreted.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// The offending field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl WireError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        WireError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
