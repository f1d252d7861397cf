use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use ring::digest;
use sha2::Sha256;

/// AES-256-GCM encryption utility, used by the media-retry sub-protocol.
pub struct AesGcm {
    cipher: Aes256Gcm,
}

impl AesGcm {
    /// Create a new AES-GCM cipher with the given 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::Crypto("AES key must be 32 bytes".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| Error::Crypto(format!("failed to create AES cipher: {}", e)))?;

        Ok(Self { cipher })
    }

    /// Encrypt `data` with the given 12-byte nonce and associated data.
    pub fn encrypt_with_aad(&self, nonce: &[u8], data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != 12 {
            return Err(Error::Crypto("nonce must be 12 bytes".to_string()));
        }

        let nonce = Nonce::from_slice(nonce);
        self.cipher
            .encrypt(nonce, Payload { msg: data, aad })
            .map_err(|e| Error::Crypto(format!("encryption failed: {}", e)))
    }

    /// Decrypt `data` with the given 12-byte nonce and associated data.
    pub fn decrypt_with_aad(&self, nonce: &[u8], data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != 12 {
            return Err(Error::Crypto("nonce must be 12 bytes".to_string()));
        }

        let nonce = Nonce::from_slice(nonce);
        self.cipher
            .decrypt(nonce, Payload { msg: data, aad })
            .map_err(|e| Error::Crypto(format!("decryption failed: {}", e)))
    }
}

/// HKDF-SHA256 expansion with an empty salt.
pub fn hkdf_expand(key: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(None, key);
    let mut output = vec![0u8; length];
    hk.expand(info, &mut output)
        .map_err(|e| Error::Crypto(format!("HKDF expansion failed: {}", e)))?;
    Ok(output)
}

/// SHA-256 hash.
pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, data).as_ref().to_vec()
}

/// Generate cryptographically secure random bytes.
pub fn random_bytes(length: usize) -> Vec<u8> {
    use ring::rand::{SecureRandom, SystemRandom};

    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes).expect("system RNG failure");
    bytes
}
