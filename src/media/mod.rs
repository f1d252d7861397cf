//! Media cryptography and transport core: key derivation, streaming
//! encrypt/decrypt of WhatsApp's AES-256-CBC + HMAC-SHA256 media format,
//! multi-host upload dispatch, and the media-retry signaling sub-protocol.

pub mod decrypt;
pub mod encrypt;
pub mod error;
pub mod kdf;
pub mod retry;
pub mod stream;
pub mod types;
pub mod upload;
pub mod url;

pub use decrypt::{decrypt, DecryptOptions};
pub use encrypt::{encrypt, EncryptOptions};
pub use error::MediaError;
pub use kdf::{derive_keys, media_key_from_base64};
pub use retry::{
    decode_retry_node, decrypt_retry_data, encrypt_retry_request, MediaRetryNotification,
    MediaUpdateEvent, MessageKey, RetryCiphertext,
};
pub use stream::StreamSource;
pub use types::{
    ByteRange, DownloadableMessage, EncryptedArtifact, MediaConnInfo, MediaKeys, MediaType,
    UploadHost,
};
pub use upload::{MediaClientConfig, MediaConnProvider, UploadDispatcher, UploadOptions, UploadResult};
pub use url::{direct_path_to_url, resolve_download_url};
