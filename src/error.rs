use thiserror::Error;

use crate::media::error::MediaError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Element missing: {0}")]
    ElementMissing(String),

    #[error("IQ error - code: {code}, text: {text}")]
    IQ { code: u16, text: String },

    #[error(transparent)]
    Media(#[from] MediaError),
}
