use thiserror::Error;

/// Errors from the media cryptography and transport core.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("invalid media key: {0}")]
    InvalidKey(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("media size exceeded: {actual} bytes exceeds limit of {limit} bytes")]
    SizeExceeded { actual: u64, limit: u64 },

    #[error("decryption failed: {0}")]
    DecryptError(String),

    #[error("upload failed with status {status}: {body}")]
    UploadFailed { status: u16, body: String },

    #[error("request body too large for host")]
    BodyTooLarge,

    #[error("media retry error: {0}")]
    RetryError(String),

    #[error("invalid media URL: {0}")]
    InvalidMediaUrl(String),

    #[error("no upload hosts available")]
    NoHostsAvailable,
}
