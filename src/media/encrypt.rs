use std::path::PathBuf;

use aes::Aes256;
use cbc::Encryptor;
use cipher::{generic_array::GenericArray, BlockEncryptMut, KeyIvInit};
use futures_util::StreamExt;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::media::error::MediaError;
use crate::media::kdf::derive_keys;
use crate::media::stream::StreamSource;
use crate::media::types::{EncryptedArtifact, MediaType};

const BLOCK_SIZE: usize = 16;

/// Options accepted by [`encrypt`].
#[derive(Default)]
pub struct EncryptOptions {
    pub save_original: Option<PathBuf>,
    pub max_content_length: Option<u64>,
}

/// Generate a fresh `mediaKey`, then stream `source` through AES-256-CBC +
/// HMAC-SHA256, computing plaintext and ciphertext digests concurrently.
pub async fn encrypt(
    source: StreamSource,
    media_type: MediaType,
    opts: EncryptOptions,
    http: &reqwest::Client,
) -> Result<EncryptedArtifact, MediaError> {
    let mut media_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut media_key);
    let keys = derive_keys(&media_key, media_type)?;

    let mut aes = Encryptor::<Aes256>::new(
        GenericArray::from_slice(&keys.cipher_key),
        GenericArray::from_slice(&keys.iv),
    );
    let mut hmac = Hmac::<Sha256>::new_from_slice(&keys.mac_key)
        .map_err(|e| MediaError::InvalidKey(e.to_string()))?;
    hmac.update(&keys.iv);
    let mut sha_plain = Sha256::new();
    let mut sha_enc = Sha256::new();

    let mut ciphertext = Vec::new();
    let mut total_len: u64 = 0;
    let mut residual: Vec<u8> = Vec::new();

    let mut temp_file = match &opts.save_original {
        Some(path) => Some(
            tokio::fs::File::create(path)
                .await
                .map_err(|e| MediaError::StreamError(e.to_string()))?,
        ),
        None => None,
    };

    let result: Result<(), MediaError> = async {
        let mut stream = source.open(http).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            total_len += chunk.len() as u64;
            if let Some(max) = opts.max_content_length {
                if total_len > max {
                    return Err(MediaError::SizeExceeded {
                        actual: total_len,
                        limit: max,
                    });
                }
            }

            sha_plain.update(&chunk);
            if let Some(f) = temp_file.as_mut() {
                f.write_all(&chunk)
                    .await
                    .map_err(|e| MediaError::StreamError(e.to_string()))?;
            }

            residual.extend_from_slice(&chunk);
            let full_len = (residual.len() / BLOCK_SIZE) * BLOCK_SIZE;
            if full_len > 0 {
                let mut encrypted = residual[..full_len].to_vec();
                for block in encrypted.chunks_mut(BLOCK_SIZE) {
                    aes.encrypt_block_mut(GenericArray::from_mut_slice(block));
                }
                hmac.update(&encrypted);
                sha_enc.update(&encrypted);
                ciphertext.extend_from_slice(&encrypted);
                residual.drain(..full_len);
            }
        }
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, "encrypt pipeline failed");
        if let Some(path) = &opts.save_original {
            let _ = tokio::fs::remove_file(path).await;
        }
        return Err(e);
    }

    let pad_len = BLOCK_SIZE - (residual.len() % BLOCK_SIZE);
    residual.extend(std::iter::repeat_n(pad_len as u8, pad_len));
    for block in residual.chunks_mut(BLOCK_SIZE) {
        aes.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    hmac.update(&residual);
    sha_enc.update(&residual);
    ciphertext.extend_from_slice(&residual);

    let mac_full = hmac.finalize().into_bytes();
    let mut mac = [0u8; 10];
    mac.copy_from_slice(&mac_full[..10]);
    sha_enc.update(mac);
    ciphertext.extend_from_slice(&mac);

    let file_sha256: [u8; 32] = sha_plain.finalize().into();
    let file_enc_sha256: [u8; 32] = sha_enc.finalize().into();

    Ok(EncryptedArtifact {
        media_key,
        ciphertext,
        file_length: total_len,
        file_sha256,
        file_enc_sha256,
        mac,
        body_path: opts.save_original,
    })
}
