//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding frames.
///
/// Each Pighouse crate owns its error enum; the server crate folds them
/// together in `PighouseError`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not valid JSON, has an unknown `type`, or is missing
    /// a required field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded but cannot be used, e.g. a binary frame that
    /// isn't UTF-8.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
