use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

/// Tag identifying the kind of media an object is, used to select the
/// HKDF info string and the server URL path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    ThumbnailImage,
    ThumbnailVideo,
    ProductImage,
    NewsletterImage,
    NewsletterVideo,
    NewsletterAudio,
    NewsletterDocument,
    Ptv,
}

impl MediaType {
    /// The `<Label>` used to build the HKDF info string
    /// `"WhatsApp <Label> Keys"`.
    pub fn hkdf_label(self) -> &'static str {
        match self {
            MediaType::Image => "Image",
            MediaType::Video => "Video",
            MediaType::Audio => "Audio",
            MediaType::Document => "Document",
            MediaType::Sticker => "Image",
            MediaType::ThumbnailImage => "Image Thumbnail",
            MediaType::ThumbnailVideo => "Video Thumbnail",
            MediaType::ProductImage => "Product Image",
            MediaType::NewsletterImage => "Image",
            MediaType::NewsletterVideo => "Video",
            MediaType::NewsletterAudio => "Audio",
            MediaType::NewsletterDocument => "Document",
            MediaType::Ptv => "Video",
        }
    }

    /// The ASCII HKDF info string for this media type.
    pub fn hkdf_info(self) -> String {
        format!("WhatsApp {} Keys", self.hkdf_label())
    }

    /// The server URL path segment this media type uploads/downloads under.
    pub fn path_segment(self) -> &'static str {
        match self {
            MediaType::Image => "/mms/image",
            MediaType::Video => "/mms/video",
            MediaType::Audio => "/mms/audio",
            MediaType::Document => "/mms/document",
            MediaType::Sticker => "/mms/image",
            MediaType::ThumbnailImage => "/mms/image",
            MediaType::ThumbnailVideo => "/mms/video",
            MediaType::ProductImage => "/mms/image",
            MediaType::NewsletterImage => "/mms/image",
            MediaType::NewsletterVideo => "/mms/video",
            MediaType::NewsletterAudio => "/mms/audio",
            MediaType::NewsletterDocument => "/mms/document",
            MediaType::Ptv => "/mms/video",
        }
    }

    /// Whether this media type belongs to the newsletter surface, which
    /// rewrites `/mms/` to `/newsletter/newsletter-` on upload.
    pub fn is_newsletter(self) -> bool {
        matches!(
            self,
            MediaType::NewsletterImage
                | MediaType::NewsletterVideo
                | MediaType::NewsletterAudio
                | MediaType::NewsletterDocument
        )
    }
}

/// Keys derived from a media object's 32-byte `mediaKey` via HKDF-SHA256.
///
/// Exists only for the duration of one encrypt/decrypt operation; key
/// material is wiped on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MediaKeys {
    pub iv: [u8; 16],
    pub cipher_key: [u8; 32],
    pub mac_key: [u8; 32],
    pub ref_key: [u8; 32],
}

/// Input to a download: the caller's view of a stored media object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadableMessage {
    pub media_key: Vec<u8>,
    pub direct_path: String,
    pub url: Option<String>,
}

/// Output of upload encryption: ciphertext digests and the raw media key,
/// ready to hand to the `UploadDispatcher`.
#[derive(Debug, Clone)]
pub struct EncryptedArtifact {
    pub media_key: [u8; 32],
    pub ciphertext: Vec<u8>,
    pub file_length: u64,
    pub file_sha256: [u8; 32],
    pub file_enc_sha256: [u8; 32],
    pub mac: [u8; 10],
    pub body_path: Option<std::path::PathBuf>,
}

/// One upload host candidate, with an optional declared body size cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadHost {
    pub hostname: String,
    pub max_content_length_bytes: Option<u64>,
}

/// Refreshable record describing how to reach the media upload servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConnInfo {
    pub auth: String,
    pub hosts: Vec<UploadHost>,
    pub ttl: std::time::Duration,
}

/// An inclusive/exclusive plaintext byte range requested from a decrypt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteRange {
    pub start_byte: Option<u64>,
    pub end_byte: Option<u64>,
}
