//! At-rest encryption for mobile-money API credentials.
//!
//! Secrets are stored as `hex(nonce):hex(tag):hex(ciphertext)` tokens
//! produced by AES-256-GCM. The key is process-wide configuration loaded
//! once at startup; the key version travels next to each stored token so a
//! future multi-key rotation scheme does not have to re-encrypt in place.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Version of the key currently held by the codec.
pub const ACTIVE_KEY_VERSION: i16 = 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The token is not three colon-separated hex segments with a 12-byte
    /// nonce and 16-byte tag.
    #[error("malformed credential token: {0}")]
    Format(String),
    /// The GCM tag did not verify; the token was tampered with or encrypted
    /// under a different key.
    #[error("credential token failed authentication")]
    Authentication,
    #[error("encryption failed")]
    Encryption,
}

/// Authenticated symmetric codec for credential secrets.
pub struct CredentialCodec {
    cipher: Aes256Gcm,
    key_version: i16,
}

impl CredentialCodec {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
            key_version: ACTIVE_KEY_VERSION,
        }
    }

    /// Parses a 64-character hex string into codec key material.
    pub fn from_hex_key(hex_key: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be valid hex"))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be 32 bytes (64 hex characters)"))?;
        Ok(Self::new(key))
    }

    /// Derives key material from an arbitrary passphrase via SHA-256.
    /// Used for development profiles where key material is not raw hex.
    pub fn from_passphrase(passphrase: &str) -> Self {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(passphrase.as_bytes());
        Self::new(digest.into())
    }

    pub fn key_version(&self) -> i16 {
        self.key_version
    }

    /// Encrypts a UTF-8 secret into an opaque token. A fresh random nonce is
    /// drawn per call, so the same plaintext yields different tokens.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut combined = self
            .cipher
            .encrypt(nonce, Payload::from(plaintext.as_bytes()))
            .map_err(|_| CodecError::Encryption)?;

        // aes-gcm appends the tag to the ciphertext; the token format keeps
        // them as separate segments.
        let tag = combined.split_off(combined.len() - TAG_LEN);
        let ciphertext = combined;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(tag),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypts a token produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, token: &str) -> Result<String, CodecError> {
        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() != 3 {
            return Err(CodecError::Format(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }

        let nonce_bytes = hex::decode(parts[0])
            .map_err(|_| CodecError::Format("nonce segment is not hex".to_string()))?;
        let tag = hex::decode(parts[1])
            .map_err(|_| CodecError::Format("tag segment is not hex".to_string()))?;
        let ciphertext = hex::decode(parts[2])
            .map_err(|_| CodecError::Format("ciphertext segment is not hex".to_string()))?;

        if nonce_bytes.len() != NONCE_LEN {
            return Err(CodecError::Format(format!(
                "nonce must be {} bytes, found {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }
        if tag.len() != TAG_LEN {
            return Err(CodecError::Format(format!(
                "tag must be {} bytes, found {}",
                TAG_LEN,
                tag.len()
            )));
        }

        let mut combined = ciphertext;
        combined.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), Payload::from(combined.as_slice()))
            .map_err(|_| CodecError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::Authentication)
    }
}
