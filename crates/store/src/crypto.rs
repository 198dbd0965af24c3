//! Encryption of channel delivery URLs at rest.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext and
//! the whole blob base64 encoded for the TEXT column. The key is supplied
//! as base64 in configuration.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};

use crate::error::StoreError;

const NONCE_LEN: usize = 12;

/// An encrypted delivery URL as stored in the channels table. Its `Debug`
/// output shows only the ciphertext, never a plaintext URL.
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct CipherUrl(String);

impl CipherUrl {
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_stored(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for CipherUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherUrl(..)")
    }
}

/// Cipher for the channel URL column. Constructed once at startup from the
/// configured key and threaded through the gateway.
#[derive(Clone)]
pub struct UrlCipher {
    key: Key<Aes256Gcm>,
}

impl UrlCipher {
    /// Build from a base64 encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self, StoreError> {
        let bytes = B64
            .decode(encoded)
            .map_err(|err| StoreError::InvalidKey(err.to_string()))?;
        if bytes.len() != 32 {
            return Err(StoreError::InvalidKey(format!(
                "expected 32 key bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(&bytes),
        })
    }

    pub fn encrypt(&self, url: &str) -> Result<CipherUrl, StoreError> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, url.as_bytes())
            .map_err(|err| StoreError::Crypto(err.to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(CipherUrl(B64.encode(blob)))
    }

    pub fn decrypt(&self, stored: &CipherUrl) -> Result<String, StoreError> {
        let blob = B64
            .decode(&stored.0)
            .map_err(|err| StoreError::Crypto(err.to_string()))?;
        if blob.len() < NONCE_LEN {
            return Err(StoreError::Crypto("ciphertext too short".into()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|err| StoreError::Crypto(err.to_string()))?;

        String::from_utf8(plaintext).map_err(|err| StoreError::Crypto(err.to_string()))
    }
}

impl std::fmt::Debug for UrlCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UrlCipher(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> UrlCipher {
        UrlCipher::from_base64_key(&B64.encode([7u8; 32])).unwrap()
    }

    #[test]
    fn roundtrip() {
        let cipher = test_cipher();
        let stored = cipher.encrypt("ntfy://ntfy.sh/my-topic").unwrap();
        assert_eq!(cipher.decrypt(&stored).unwrap(), "ntfy://ntfy.sh/my-topic");
    }

    #[test]
    fn nonces_differ_per_encryption() {
        let cipher = test_cipher();
        let a = cipher.encrypt("mailto://user@example.com").unwrap();
        let b = cipher.encrypt("mailto://user@example.com").unwrap();
        assert_ne!(a.as_stored(), b.as_stored());
    }

    #[test]
    fn rejects_short_key() {
        let err = UrlCipher::from_base64_key(&B64.encode([1u8; 16])).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[test]
    fn debug_never_shows_plaintext() {
        let cipher = test_cipher();
        let stored = cipher.encrypt("gotify://gotify.example.com/s3cret").unwrap();
        assert_eq!(format!("{stored:?}"), "CipherUrl(..)");
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = test_cipher();
        let stored = cipher.encrypt("ntfy://ntfy.sh/topic").unwrap();
        let mut blob = B64.decode(stored.as_stored()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        let tampered = CipherUrl::from_stored(B64.encode(blob));
        assert!(cipher.decrypt(&tampered).is_err());
    }
}
