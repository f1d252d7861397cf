use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::TryStreamExt;

use whatsmeow::media::{
    decrypt, derive_keys, direct_path_to_url, encrypt, encrypt_retry_request, resolve_download_url,
    ByteRange, DecryptOptions, DownloadableMessage, EncryptOptions, MediaClientConfig,
    MediaConnInfo, MediaConnProvider, MediaError, MediaType, MessageKey, StreamSource, UploadDispatcher,
    UploadHost, UploadOptions,
};
use whatsmeow::types::JID;

struct StaticConnProvider(MediaConnInfo);

#[async_trait]
impl MediaConnProvider for StaticConnProvider {
    async fn get(&self) -> Result<MediaConnInfo, MediaError> {
        Ok(self.0.clone())
    }

    async fn refresh(&self, _force: bool) -> Result<MediaConnInfo, MediaError> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_kdf_determinism_scenario_zero_key() {
    let key = [0u8; 32];
    let keys = derive_keys(&key, MediaType::Image).unwrap();
    assert_eq!(keys.iv.len(), 16);
    assert_eq!(hex::encode(keys.iv), "a056b2e5cd64d4545d08f2503a042e75");
}

#[tokio::test]
async fn test_round_trip_small_plaintext() {
    let http = reqwest::Client::new();
    let artifact = encrypt(
        StreamSource::Buffer(b"abc".to_vec()),
        MediaType::Image,
        EncryptOptions::default(),
        &http,
    )
    .await
    .unwrap();

    assert_eq!(artifact.ciphertext.len(), 26);
    {
        use sha2::Digest;
        assert_eq!(artifact.file_sha256.to_vec(), sha2::Sha256::digest(b"abc").to_vec());
    }

    let keys = derive_keys(&artifact.media_key, MediaType::Image).unwrap();

    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/media.enc")
        .with_status(200)
        .with_body(artifact.ciphertext.clone())
        .create_async()
        .await;

    let url = format!("{}/media.enc", server.url());
    let stream = decrypt(
        &url,
        &keys,
        DecryptOptions::default(),
        &http,
        "https://web.whatsapp.com",
    )
    .await
    .unwrap();

    let plaintext: Vec<u8> = stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .unwrap();

    assert_eq!(plaintext, b"abc");
}

#[tokio::test]
async fn test_ranged_decrypt_scenario() {
    let http = reqwest::Client::new();
    let plaintext: Vec<u8> = (0u8..100u8).collect();
    let artifact = encrypt(
        StreamSource::Buffer(plaintext.clone()),
        MediaType::Video,
        EncryptOptions::default(),
        &http,
    )
    .await
    .unwrap();
    let keys = derive_keys(&artifact.media_key, MediaType::Video).unwrap();

    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/media.enc")
        .match_header("range", "bytes=0-48")
        .with_status(206)
        .with_body(&artifact.ciphertext[0..48])
        .create_async()
        .await;

    let url = format!("{}/media.enc", server.url());
    let stream = decrypt(
        &url,
        &keys,
        DecryptOptions {
            range: ByteRange {
                start_byte: Some(20),
                end_byte: Some(40),
            },
            verify_mac: false,
        },
        &http,
        "https://web.whatsapp.com",
    )
    .await
    .unwrap();

    let out: Vec<u8> = stream
        .try_fold(Vec::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .unwrap();

    assert_eq!(out, plaintext[20..40]);
}

#[tokio::test]
async fn test_upload_fallback_scenario() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", mockito::Matcher::Regex(r"^/mms/document/.*".to_string()))
        .with_status(200)
        .with_body(r#"{"url":"https://cdn/x","direct_path":"/v/t.enc","handle":"h"}"#)
        .create_async()
        .await;

    let host2 = server.url();

    let conn = Arc::new(StaticConnProvider(MediaConnInfo {
        auth: "token".to_string(),
        hosts: vec![
            UploadHost {
                hostname: "too-small.example".to_string(),
                max_content_length_bytes: Some(10),
            },
            UploadHost {
                hostname: host2,
                max_content_length_bytes: None,
            },
        ],
        ttl: Duration::from_secs(60),
    }));

    let dispatcher = UploadDispatcher::new(
        conn,
        reqwest::Client::new(),
        MediaClientConfig::default(),
        vec![],
    );

    let result = dispatcher
        .upload(
            vec![0u8; 100],
            UploadOptions {
                media_type: MediaType::Document,
                file_enc_sha256: [9u8; 32],
                newsletter: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.media_url, "https://cdn/x");
    assert_eq!(result.direct_path.as_deref(), Some("/v/t.enc"));
    assert_eq!(result.handle.as_deref(), Some("h"));
}

#[test]
fn test_retry_encode_decode_shape_scenario() {
    let me = JID::new("1234".to_string(), "s.whatsapp.net".to_string());
    let media_key = [6u8; 32];
    let msg_key = MessageKey {
        remote_jid: "1234@s.whatsapp.net".to_string(),
        from_me: true,
        id: "3EB0C1".to_string(),
        participant: None,
    };

    let node = encrypt_retry_request(&msg_key, &media_key, &me).unwrap();
    assert_eq!(node.tag, "receipt");

    let encrypt_node = node.find_child("encrypt").unwrap();
    let enc_p = encrypt_node.get_attr("enc_p").unwrap();
    let ciphertext = STANDARD.decode(enc_p).unwrap();
    // plaintext (length-delimited protobuf over a short id) + 16-byte GCM tag
    assert!(ciphertext.len() > 16);

    let rmr = node.find_child("rmr").unwrap();
    assert_eq!(rmr.get_attr("jid"), Some(&msg_key.remote_jid));
}

#[test]
fn test_direct_path_precedence_scenario() {
    let msg = DownloadableMessage {
        media_key: vec![0u8; 32],
        direct_path: "/v/t.enc".to_string(),
        url: Some("https://cdn.other/x".to_string()),
    };

    assert_eq!(
        resolve_download_url(&msg).unwrap(),
        "https://mmg.whatsapp.net/v/t.enc"
    );
    assert_eq!(
        direct_path_to_url("/v/t.enc").unwrap(),
        "https://mmg.whatsapp.net/v/t.enc"
    );
}
