use thiserror::Error;

/// Errors that can occur at the `Request` encode/decode boundary.
#[derive(Debug, Error)]
pub enum WalCoreError {
    /// The caller's codec failed to turn a request into bytes.
    #[error("request encode failed: {0}")]
    Encode(String),

    /// The caller's codec failed to turn bytes back into a request.
    #[error("request decode failed: {0}")]
    Decode(String),
}
