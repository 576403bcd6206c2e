use std::fmt;

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE},
};

use crate::StoreError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM over token columns. Sealed values are base64 of
/// `nonce || ciphertext`, with a fresh nonce per write.
#[derive(Clone)]
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Accepts standard or url-safe base64 of a 32 byte key.
    pub fn from_base64(encoded: &str) -> Result<Self, StoreError> {
        let encoded = encoded.trim();
        let raw = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .map_err(|err| StoreError::TokenKey(err.to_string()))?;
        let key: [u8; KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            StoreError::TokenKey(format!("expected {KEY_LEN} bytes, got {}", raw.len()))
        })?;
        Ok(Self::new(&key))
    }

    /// A new random key, base64 encoded.
    pub fn generate_key() -> String {
        STANDARD.encode(Aes256Gcm::generate_key(OsRng))
    }

    pub(crate) fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| StoreError::TokenCipher("encryption failed"))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub(crate) fn open(&self, sealed: &str) -> Result<String, StoreError> {
        let raw = STANDARD
            .decode(sealed)
            .map_err(|_| StoreError::TokenCipher("sealed value is not base64"))?;
        if raw.len() < NONCE_LEN {
            return Err(StoreError::TokenCipher("sealed value is missing its nonce"));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::TokenCipher("decryption failed; wrong key or corrupt value"))?;
        String::from_utf8(plaintext).map_err(|_| StoreError::TokenCipher("plaintext is not utf-8"))
    }
}

impl fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::TokenCipher;
    use crate::StoreError;

    #[test]
    fn sealed_values_use_fresh_nonces() {
        let cipher = TokenCipher::from_base64(&TokenCipher::generate_key()).expect("key");

        let first = cipher.seal("refresh-token").expect("seal");
        let second = cipher.seal("refresh-token").expect("seal");

        assert_ne!(first, second);
        assert!(!first.contains("refresh-token"));
        assert_eq!(cipher.open(&first).expect("open"), "refresh-token");
    }

    #[test]
    fn wrong_key_cannot_open() {
        let cipher = TokenCipher::from_base64(&TokenCipher::generate_key()).expect("key");
        let other = TokenCipher::from_base64(&TokenCipher::generate_key()).expect("key");
        let sealed = cipher.seal("access-token").expect("seal");

        assert!(matches!(other.open(&sealed), Err(StoreError::TokenCipher(_))));
        assert!(matches!(cipher.open("c2hvcnQ="), Err(StoreError::TokenCipher(_))));
    }

    #[test]
    fn keys_must_decode_to_32_bytes() {
        assert!(matches!(
            TokenCipher::from_base64("c2hvcnQ="),
            Err(StoreError::TokenKey(_))
        ));
        assert!(matches!(
            TokenCipher::from_base64("not base64!"),
            Err(StoreError::TokenKey(_))
        ));
        let url_safe = "_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-_-8=";
        assert!(TokenCipher::from_base64(url_safe).is_ok());
    }
}
