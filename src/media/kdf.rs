use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::media::error::MediaError;
use crate::media::types::{MediaKeys, MediaType};
use crate::util::crypto::hkdf_expand;

/// Expand a 32-byte media key into `{iv, cipherKey, macKey, refKey}` via
/// HKDF-SHA256 with an empty salt and a media-type-specific info string.
pub fn derive_keys(media_key: &[u8], media_type: MediaType) -> Result<MediaKeys, MediaError> {
    if media_key.len() != 32 {
        return Err(MediaError::InvalidKey(format!(
            "media key must be 32 bytes, got {}",
            media_key.len()
        )));
    }

    let info = media_type.hkdf_info();
    let expanded = hkdf_expand(media_key, info.as_bytes(), 112)
        .map_err(|e| MediaError::InvalidKey(e.to_string()))?;

    let mut iv = [0u8; 16];
    let mut cipher_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    let mut ref_key = [0u8; 32];
    iv.copy_from_slice(&expanded[0..16]);
    cipher_key.copy_from_slice(&expanded[16..48]);
    mac_key.copy_from_slice(&expanded[48..80]);
    ref_key.copy_from_slice(&expanded[80..112]);

    tracing::debug!(?media_type, "derived media keys");

    Ok(MediaKeys {
        iv,
        cipher_key,
        mac_key,
        ref_key,
    })
}

/// Accept a media key supplied as a base64 string, stripping an optional
/// `data:...;base64,` data-URL prefix.
pub fn media_key_from_base64(s: &str) -> Result<Vec<u8>, MediaError> {
    let encoded = match s.rfind("base64,") {
        Some(idx) => &s[idx + "base64,".len()..],
        None => s,
    };

    STANDARD
        .decode(encoded)
        .map_err(|e| MediaError::InvalidKey(format!("invalid base64 media key: {}", e)))
}
