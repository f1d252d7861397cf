use crate::media::error::MediaError;
use crate::media::types::DownloadableMessage;

const TRUSTED_ORIGIN: &str = "https://mmg.whatsapp.net";

/// Derive the canonical download URL from a server-relative direct path.
pub fn direct_path_to_url(direct_path: &str) -> Result<String, MediaError> {
    if direct_path.is_empty() {
        return Err(MediaError::InvalidMediaUrl("empty direct path".to_string()));
    }
    Ok(format!("{}{}", TRUSTED_ORIGIN, direct_path))
}

/// Resolve the URL to download `msg` from: its `url` is trusted only if it
/// begins with `https://mmg.whatsapp.net/`, otherwise fall back to
/// deriving one from `direct_path`.
pub fn resolve_download_url(msg: &DownloadableMessage) -> Result<String, MediaError> {
    if let Some(url) = &msg.url {
        if url.starts_with(&format!("{}/", TRUSTED_ORIGIN)) {
            return Ok(url.clone());
        }
    }
    direct_path_to_url(&msg.direct_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_path_to_url() {
        assert_eq!(
            direct_path_to_url("/v/t.enc").unwrap(),
            "https://mmg.whatsapp.net/v/t.enc"
        );
    }

    #[test]
    fn test_direct_path_to_url_rejects_empty() {
        assert!(direct_path_to_url("").is_err());
    }

    #[test]
    fn test_resolve_download_url_prefers_trusted_url() {
        let msg = DownloadableMessage {
            media_key: vec![0u8; 32],
            direct_path: "/v/t.enc".to_string(),
            url: Some("https://mmg.whatsapp.net/v/other.enc".to_string()),
        };
        assert_eq!(
            resolve_download_url(&msg).unwrap(),
            "https://mmg.whatsapp.net/v/other.enc"
        );
    }

    #[test]
    fn test_resolve_download_url_falls_back_on_untrusted_host() {
        let msg = DownloadableMessage {
            media_key: vec![0u8; 32],
            direct_path: "/v/t.enc".to_string(),
            url: Some("https://cdn.other/x".to_string()),
        };
        assert_eq!(
            resolve_download_url(&msg).unwrap(),
            "https://mmg.whatsapp.net/v/t.enc"
        );
    }
}
