use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use aes::Aes256;
use cbc::Decryptor;
use cipher::{
    block_padding::{Padding, Pkcs7},
    generic_array::GenericArray,
    BlockDecryptMut, KeyIvInit,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::media::error::MediaError;
use crate::media::types::{ByteRange, MediaKeys};

const BLOCK_SIZE: usize = 16;
const MAC_LEN: usize = 10;

fn floor_block(n: u64) -> u64 {
    (n / BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

/// Options accepted by [`decrypt`].
#[derive(Default, Clone, Copy)]
pub struct DecryptOptions {
    pub range: ByteRange,
    /// Verify the trailing 10-byte MAC. Only meaningful (and only applied)
    /// on a whole-object decrypt: `range.start_byte` and `range.end_byte`
    /// must both be unset.
    pub verify_mac: bool,
}

struct DecryptState {
    body: std::pin::Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    decryptor: Option<Decryptor<Aes256>>,
    cipher_key: [u8; 32],
    needs_iv: bool,
    residual: Vec<u8>,
    reserve_tail: bool,
    has_end_byte: bool,
    start_byte: u64,
    end_byte: Option<u64>,
    plain_abs: u64,
    finished: bool,
    hmac: Option<Hmac<Sha256>>,
}

/// Fetch `url` (with an optional byte range) and stream the decrypted
/// plaintext, trimmed to `[startByte, endByte)` when ranged.
pub async fn decrypt(
    url: &str,
    keys: &MediaKeys,
    opts: DecryptOptions,
    http: &reqwest::Client,
    origin: &str,
) -> Result<impl Stream<Item = Result<Bytes, MediaError>>, MediaError> {
    let start_byte = opts.range.start_byte.unwrap_or(0);
    let end_byte = opts.range.end_byte;
    let ranged = opts.range.start_byte.is_some() || end_byte.is_some();

    let mut needs_iv = false;
    let mut fetch_start: Option<u64> = None;
    let mut plain_abs_init = 0u64;

    if start_byte > 0 {
        let chunk_start = floor_block(start_byte);
        if chunk_start > 0 {
            needs_iv = true;
            fetch_start = Some(chunk_start - BLOCK_SIZE as u64);
        } else {
            fetch_start = Some(0);
        }
        plain_abs_init = chunk_start;
    } else if ranged {
        fetch_start = Some(0);
    }

    let fetch_end = end_byte.map(|e| floor_block(e) + BLOCK_SIZE as u64);

    let mut req = http.get(url).header("Origin", origin.to_string());
    if let Some(s) = fetch_start {
        let range_header = match fetch_end {
            Some(e) => format!("bytes={}-{}", s, e),
            None => format!("bytes={}-", s),
        };
        req = req.header("Range", range_header);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| MediaError::StreamError(format!("GET {}: {}", url, e)))?;
    if !resp.status().is_success() {
        return Err(MediaError::StreamError(format!(
            "unexpected status {}",
            resp.status()
        )));
    }

    let has_end_byte = end_byte.is_some();
    let verify_mac = opts.verify_mac && !ranged;

    let state = DecryptState {
        body: Box::pin(resp.bytes_stream()),
        decryptor: if needs_iv {
            None
        } else {
            Some(Decryptor::<Aes256>::new(
                GenericArray::from_slice(&keys.cipher_key),
                GenericArray::from_slice(&keys.iv),
            ))
        },
        cipher_key: keys.cipher_key,
        needs_iv,
        residual: Vec::new(),
        reserve_tail: !has_end_byte,
        has_end_byte,
        start_byte,
        end_byte,
        plain_abs: plain_abs_init,
        finished: false,
        hmac: if verify_mac {
            let mut h = Hmac::<Sha256>::new_from_slice(&keys.mac_key)
                .map_err(|e| MediaError::DecryptError(e.to_string()))?;
            h.update(&keys.iv);
            Some(h)
        } else {
            None
        },
    };

    Ok(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.residual.extend_from_slice(&chunk);

                    if state.needs_iv && state.residual.len() >= BLOCK_SIZE {
                        let iv: Vec<u8> = state.residual.drain(..BLOCK_SIZE).collect();
                        state.decryptor = Some(Decryptor::<Aes256>::new(
                            GenericArray::from_slice(&state.cipher_key),
                            GenericArray::from_slice(&iv),
                        ));
                        state.needs_iv = false;
                    }
                    if state.needs_iv {
                        continue;
                    }

                    // When the stream will need PKCS#7 unpadding at EOF, withhold
                    // one extra ciphertext block beyond the MAC tail so the true
                    // final block is never decrypted/emitted before we know it's last.
                    let reserve = if state.reserve_tail {
                        MAC_LEN + BLOCK_SIZE
                    } else {
                        0
                    };
                    if state.residual.len() <= reserve {
                        continue;
                    }
                    let available = state.residual.len() - reserve;
                    let full_len = floor_block(available as u64) as usize;
                    if full_len == 0 {
                        continue;
                    }

                    let mut block_buf: Vec<u8> = state.residual.drain(..full_len).collect();
                    if let Some(h) = state.hmac.as_mut() {
                        h.update(&block_buf);
                    }
                    for block in block_buf.chunks_mut(BLOCK_SIZE) {
                        state
                            .decryptor
                            .as_mut()
                            .expect("decryptor initialised before block processing")
                            .decrypt_block_mut(GenericArray::from_mut_slice(block));
                    }

                    let out = trim_to_range(&mut state, block_buf);
                    if out.is_empty() {
                        continue;
                    }
                    return Some((Ok(Bytes::from(out)), state));
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(MediaError::StreamError(e.to_string())), state));
                }
                None => {
                    state.finished = true;

                    if state.needs_iv {
                        return Some((
                            Err(MediaError::DecryptError(
                                "stream ended before IV block was received".into(),
                            )),
                            state,
                        ));
                    }

                    let mac_tail = if state.reserve_tail && state.residual.len() >= MAC_LEN {
                        let split_at = state.residual.len() - MAC_LEN;
                        let mac = state.residual.split_off(split_at);
                        let mut arr = [0u8; MAC_LEN];
                        arr.copy_from_slice(&mac);
                        Some(arr)
                    } else {
                        None
                    };

                    if state.residual.len() % BLOCK_SIZE != 0 {
                        return Some((
                            Err(MediaError::DecryptError(
                                "truncated ciphertext: not a multiple of the block size".into(),
                            )),
                            state,
                        ));
                    }

                    let mut final_blocks = std::mem::take(&mut state.residual);
                    if let Some(h) = state.hmac.as_mut() {
                        h.update(&final_blocks);
                    }
                    for block in final_blocks.chunks_mut(BLOCK_SIZE) {
                        if let Some(dec) = state.decryptor.as_mut() {
                            dec.decrypt_block_mut(GenericArray::from_mut_slice(block));
                        }
                    }

                    let plaintext = if state.has_end_byte || final_blocks.is_empty() {
                        final_blocks
                    } else {
                        match final_blocks.chunks(BLOCK_SIZE).last() {
                            Some(last_block) => {
                                let block: &GenericArray<u8, cipher::consts::U16> =
                                    GenericArray::from_slice(last_block);
                                let unpadded_last = match Pkcs7::unpad(block) {
                                        Ok(u) => u.to_vec(),
                                        Err(_) => {
                                            return Some((
                                                Err(MediaError::DecryptError(
                                                    "invalid PKCS#7 padding".into(),
                                                )),
                                                state,
                                            ));
                                        }
                                    };
                                let body_len = final_blocks.len() - BLOCK_SIZE;
                                let mut out = final_blocks[..body_len].to_vec();
                                out.extend_from_slice(&unpadded_last);
                                out
                            }
                            None => final_blocks,
                        }
                    };

                    if let (Some(h), Some(mac)) = (state.hmac.take(), mac_tail) {
                        let computed = h.finalize().into_bytes();
                        if computed[..MAC_LEN] != mac[..] {
                            return Some((
                                Err(MediaError::DecryptError("MAC verification failed".into())),
                                state,
                            ));
                        }
                    }

                    let out = trim_to_range(&mut state, plaintext);
                    if out.is_empty() {
                        return None;
                    }
                    return Some((Ok(Bytes::from(out)), state));
                }
            }
        }
    }))
}

/// Trim `decrypted`, the next slice of absolute plaintext starting at
/// `state.plain_abs`, to the requested `[start_byte, end_byte)` window and
/// advance `state.plain_abs`.
fn trim_to_range(state: &mut DecryptState, decrypted: Vec<u8>) -> Vec<u8> {
    let block_start = state.plain_abs;
    let block_end = block_start + decrypted.len() as u64;
    state.plain_abs = block_end;

    let lo = state.start_byte.max(block_start);
    let hi = state.end_byte.unwrap_or(u64::MAX).min(block_end);

    if lo >= hi {
        return Vec::new();
    }
    let from = (lo - block_start) as usize;
    let to = (hi - block_start) as usize;
    decrypted[from..to].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::encrypt::{encrypt, EncryptOptions};
    use crate::media::kdf::derive_keys;
    use crate::media::stream::StreamSource;
    use crate::media::types::MediaType;
    use futures_util::TryStreamExt;

    #[tokio::test]
    async fn test_whole_object_roundtrip() {
        let http = reqwest::Client::new();
        let artifact = encrypt(
            StreamSource::Buffer(b"abc".to_vec()),
            MediaType::Image,
            EncryptOptions::default(),
            &http,
        )
        .await
        .unwrap();
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
    async fn test_whole_object_verify_mac_success() {
        let http = reqwest::Client::new();
        let artifact = encrypt(
            StreamSource::Buffer(b"hello".to_vec()),
            MediaType::Document,
            EncryptOptions::default(),
            &http,
        )
        .await
        .unwrap();
        let keys = derive_keys(&artifact.media_key, MediaType::Document).unwrap();

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
            DecryptOptions {
                range: ByteRange::default(),
                verify_mac: true,
            },
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
        assert_eq!(plaintext, b"hello");
    }

    #[tokio::test]
    async fn test_ranged_decrypt_mid_block() {
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
}
