use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::media::error::MediaError;
use crate::media::types::{MediaConnInfo, MediaType, UploadHost};

/// Configuration shared by the HTTP-facing media components.
#[derive(Debug, Clone)]
pub struct MediaClientConfig {
    pub origin: String,
    pub timeout: Duration,
}

impl Default for MediaClientConfig {
    fn default() -> Self {
        Self {
            origin: "https://web.whatsapp.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Supplies and refreshes the auth token / host list used for uploads.
/// Concurrent refreshes must be serialised by the implementor (or by
/// wrapping in [`UploadDispatcher`], which does so internally).
#[async_trait]
pub trait MediaConnProvider: Send + Sync {
    async fn get(&self) -> Result<MediaConnInfo, MediaError>;
    async fn refresh(&self, force: bool) -> Result<MediaConnInfo, MediaError>;
}

/// Options accepted by [`UploadDispatcher::upload`].
pub struct UploadOptions {
    pub media_type: MediaType,
    pub file_enc_sha256: [u8; 32],
    pub newsletter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub media_url: String,
    pub direct_path: Option<String>,
    pub handle: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: Option<String>,
    direct_path: Option<String>,
    handle: Option<String>,
}

/// Tries an ordered list of upload hosts, refreshing auth and falling
/// through to the next host on failure.
pub struct UploadDispatcher {
    conn: Arc<dyn MediaConnProvider>,
    http: reqwest::Client,
    config: MediaClientConfig,
    custom_hosts: Vec<UploadHost>,
    refresh_lock: Mutex<()>,
}

impl UploadDispatcher {
    pub fn new(
        conn: Arc<dyn MediaConnProvider>,
        http: reqwest::Client,
        config: MediaClientConfig,
        custom_hosts: Vec<UploadHost>,
    ) -> Self {
        Self {
            conn,
            http,
            config,
            custom_hosts,
            refresh_lock: Mutex::new(()),
        }
    }

    async fn serialized_refresh(&self, force: bool) -> Result<MediaConnInfo, MediaError> {
        let _guard = self.refresh_lock.lock().await;
        if force {
            self.conn.refresh(true).await
        } else {
            self.conn.get().await
        }
    }

    pub async fn upload(
        &self,
        body: Vec<u8>,
        opts: UploadOptions,
    ) -> Result<UploadResult, MediaError> {
        let conn = self.serialized_refresh(false).await?;

        let mut hosts = self.custom_hosts.clone();
        hosts.extend(conn.hosts.clone());
        if hosts.is_empty() {
            return Err(MediaError::NoHostsAvailable);
        }

        let enc_hash = URL_SAFE_NO_PAD.encode(opts.file_enc_sha256);

        let mut path = opts.media_type.path_segment().to_string();
        if opts.newsletter {
            path = path.replacen("/mms/", "/newsletter/newsletter-", 1);
        }

        let mut auth = conn.auth.clone();
        let last_hostname = hosts.last().map(|h| h.hostname.clone());
        let mut last_error: Option<MediaError> = None;

        for host in &hosts {
            if let Some(max) = host.max_content_length_bytes {
                if body.len() as u64 > max {
                    tracing::info!(host = %host.hostname, "skipping host: body too large");
                    last_error = Some(MediaError::BodyTooLarge);
                    if Some(&host.hostname) == last_hostname.as_ref() {
                        break;
                    }
                    continue;
                }
            }

            let base = if host.hostname.starts_with("http://") || host.hostname.starts_with("https://") {
                format!("{}{}/{}", host.hostname, path, enc_hash)
            } else {
                format!("https://{}{}/{}", host.hostname, path, enc_hash)
            };
            let mut url = reqwest::Url::parse(&base)
                .map_err(|e| MediaError::InvalidMediaUrl(e.to_string()))?;
            url.query_pairs_mut()
                .append_pair("auth", &auth)
                .append_pair("token", &enc_hash);

            let resp = self
                .http
                .post(url)
                .header("Origin", self.config.origin.clone())
                .header("Content-Type", "application/octet-stream")
                .timeout(self.config.timeout)
                .body(body.clone())
                .send()
                .await;

            match resp {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    match serde_json::from_str::<UploadResponse>(&text) {
                        Ok(parsed) if parsed.url.is_some() || parsed.direct_path.is_some() => {
                            tracing::info!(host = %host.hostname, %status, "upload succeeded");
                            return Ok(UploadResult {
                                media_url: parsed.url.unwrap_or_default(),
                                direct_path: parsed.direct_path,
                                handle: parsed.handle,
                            });
                        }
                        _ => {
                            tracing::info!(host = %host.hostname, %status, "upload host returned no url, refreshing auth");
                            last_error = Some(MediaError::UploadFailed {
                                status: status.as_u16(),
                                body: text,
                            });
                            let refreshed = self.serialized_refresh(true).await?;
                            auth = refreshed.auth.clone();
                        }
                    }
                }
                Err(e) => {
                    tracing::info!(host = %host.hostname, error = %e, "upload request failed");
                    last_error = Some(MediaError::UploadFailed {
                        status: 0,
                        body: e.to_string(),
                    });
                }
            }

            if Some(&host.hostname) == last_hostname.as_ref() {
                break;
            }
        }

        tracing::error!("all upload hosts exhausted");
        Err(last_error.unwrap_or(MediaError::NoHostsAvailable))
    }
}
