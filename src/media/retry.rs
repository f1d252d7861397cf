use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::binary::Node;
use crate::media::error::MediaError;
use crate::types::JID;
use crate::util::crypto::{hkdf_expand, random_bytes, AesGcm};

const RETRY_INFO: &[u8] = b"WhatsApp Media Retry Notification";
const GCM_NONCE_LEN: usize = 12;

fn retry_key(media_key: &[u8]) -> Result<[u8; 32], MediaError> {
    let expanded =
        hkdf_expand(media_key, RETRY_INFO, 32).map_err(|e| MediaError::RetryError(e.to_string()))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&expanded);
    Ok(key)
}

/// Minimal length-delimited protobuf encoding for a single string field
/// (field 1, wire type 2) — `ServerErrorReceipt{ stanza_id }` has no other
/// fields in this protocol.
struct ServerErrorReceipt {
    stanza_id: String,
}

impl ServerErrorReceipt {
    fn encode(&self) -> Vec<u8> {
        let bytes = self.stanza_id.as_bytes();
        let mut out = Vec::with_capacity(bytes.len() + 2);
        out.push((1 << 3) | 2);
        encode_varint(bytes.len() as u64, &mut out);
        out.extend_from_slice(bytes);
        out
    }

    fn decode(data: &[u8]) -> Result<Self, MediaError> {
        if data.is_empty() {
            return Err(MediaError::RetryError("empty ServerErrorReceipt".into()));
        }
        let tag = data[0];
        if tag != ((1 << 3) | 2) {
            return Err(MediaError::RetryError(format!(
                "unexpected ServerErrorReceipt tag: {}",
                tag
            )));
        }
        let (len, len_size) = decode_varint(&data[1..])?;
        let start = 1 + len_size;
        let end = start + len as usize;
        let field = data
            .get(start..end)
            .ok_or_else(|| MediaError::RetryError("truncated ServerErrorReceipt".into()))?;
        Ok(Self {
            stanza_id: String::from_utf8(field.to_vec())
                .map_err(|e| MediaError::RetryError(e.to_string()))?,
        })
    }
}

fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn decode_varint(data: &[u8]) -> Result<(u64, usize), MediaError> {
    let mut result = 0u64;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(MediaError::RetryError("truncated varint".into()))
}

/// Identifies a single message within a chat, as referenced by a retry
/// request/response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKey {
    pub remote_jid: String,
    pub from_me: bool,
    pub id: String,
    pub participant: Option<String>,
}

/// The ciphertext and nonce carried by a retry response's `encrypt` node.
#[derive(Debug, Clone)]
pub struct RetryCiphertext {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
}

/// A decoded retry response: either an error code or a ciphertext payload.
#[derive(Debug, Clone)]
pub enum MediaUpdateEvent {
    Error { key: MessageKey, code: u16 },
    Payload { key: MessageKey, payload: RetryCiphertext },
}

/// The plaintext `ServerErrorReceipt` recovered from a retry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRetryNotification {
    pub stanza_id: String,
}

fn status_code_for(status: &str) -> u16 {
    match status {
        "success" => 200,
        "decryption-error" => 412,
        "not-found" => 404,
        "general-error" => 418,
        _ => 418,
    }
}

/// Build the `receipt` node requesting re-upload of a vanished media item.
pub fn encrypt_retry_request(
    msg_key: &MessageKey,
    media_key: &[u8],
    me_jid: &JID,
) -> Result<Node, MediaError> {
    let key = retry_key(media_key)?;
    let iv = random_bytes(GCM_NONCE_LEN);

    let plaintext = ServerErrorReceipt {
        stanza_id: msg_key.id.clone(),
    }
    .encode();

    let aes = AesGcm::new(&key).map_err(|e| MediaError::RetryError(e.to_string()))?;
    let ciphertext = aes
        .encrypt_with_aad(&iv, &plaintext, msg_key.id.as_bytes())
        .map_err(|e| MediaError::RetryError(e.to_string()))?;

    let encrypt_node = Node::new("encrypt".to_string())
        .attr("enc_p".to_string(), STANDARD.encode(&ciphertext))
        .attr("enc_iv".to_string(), STANDARD.encode(&iv));

    let mut rmr = Node::new("rmr".to_string())
        .attr("jid".to_string(), msg_key.remote_jid.clone())
        .attr("from_me".to_string(), msg_key.from_me.to_string());
    if let Some(participant) = &msg_key.participant {
        rmr = rmr.attr("participant".to_string(), participant.clone());
    }

    Ok(Node::new("receipt".to_string())
        .attr("id".to_string(), msg_key.id.clone())
        .attr("to".to_string(), me_jid.to_non_ad())
        .attr("type".to_string(), "server-error".to_string())
        .with_children(vec![encrypt_node, rmr]))
}

/// Decode an incoming `receipt` node into a [`MediaUpdateEvent`].
pub fn decode_retry_node(node: &Node) -> Result<MediaUpdateEvent, MediaError> {
    let rmr = node
        .find_child("rmr")
        .ok_or_else(|| MediaError::RetryError("missing rmr child".into()))?;

    let remote_jid = rmr
        .get_attr("jid")
        .cloned()
        .ok_or_else(|| MediaError::RetryError("rmr missing jid".into()))?;
    let from_me = rmr.get_attr("from_me").map(|v| v == "true").unwrap_or(false);
    let participant = rmr.get_attr("participant").cloned();
    let id = node
        .get_attr("id")
        .cloned()
        .ok_or_else(|| MediaError::RetryError("receipt missing id".into()))?;

    let key = MessageKey {
        remote_jid,
        from_me,
        id,
        participant,
    };

    if let Some(error) = node.find_child("error") {
        let status = error.get_attr("code").map(String::as_str).unwrap_or("general-error");
        return Ok(MediaUpdateEvent::Error {
            key,
            code: status_code_for(status),
        });
    }

    let encrypt_node = node
        .find_child("encrypt")
        .ok_or_else(|| MediaError::RetryError("not-found: missing encrypt node".into()));
    let encrypt_node = match encrypt_node {
        Ok(n) => n,
        Err(_) => {
            return Ok(MediaUpdateEvent::Error {
                key,
                code: status_code_for("not-found"),
            })
        }
    };

    let enc_p = encrypt_node.get_attr("enc_p");
    let enc_iv = encrypt_node.get_attr("enc_iv");
    let (enc_p, enc_iv) = match (enc_p, enc_iv) {
        (Some(p), Some(iv)) => (p, iv),
        _ => {
            return Ok(MediaUpdateEvent::Error {
                key,
                code: status_code_for("not-found"),
            })
        }
    };

    let ciphertext = STANDARD
        .decode(enc_p)
        .map_err(|e| MediaError::RetryError(e.to_string()))?;
    let iv = STANDARD
        .decode(enc_iv)
        .map_err(|e| MediaError::RetryError(e.to_string()))?;

    Ok(MediaUpdateEvent::Payload {
        key,
        payload: RetryCiphertext { ciphertext, iv },
    })
}

/// Decrypt a retry response's ciphertext into the recovered
/// `ServerErrorReceipt`/[`MediaRetryNotification`].
pub fn decrypt_retry_data(
    payload: &RetryCiphertext,
    media_key: &[u8],
    msg_id: &str,
) -> Result<MediaRetryNotification, MediaError> {
    let key = retry_key(media_key)?;
    let aes = AesGcm::new(&key).map_err(|e| MediaError::RetryError(e.to_string()))?;
    let plaintext = aes
        .decrypt_with_aad(&payload.iv, &payload.ciphertext, msg_id.as_bytes())
        .map_err(|e| MediaError::RetryError(e.to_string()))?;
    let receipt = ServerErrorReceipt::decode(&plaintext)?;
    Ok(MediaRetryNotification {
        stanza_id: receipt.stanza_id,
    })
}
