//! Payload checksums and the password-based encryption plugin.
//!
//! Encrypted payloads are laid out as salt (16) | nonce (12) |
//! ciphertext+tag (len + 16): exactly [`ENCRYPTION_OVERHEAD`] bytes of
//! framing around the plaintext. Keys come from PBKDF2-HMAC-SHA256 and
//! the AEAD is ChaCha20-Poly1305.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::ENCRYPTION_OVERHEAD;
use crate::errors::{DecodeError, EncodeError};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KDF_ITERATIONS: u32 = 100_000;

/// SHA-256 of `data` as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key);
    key
}

/// Encrypt `data` under `password` with a fresh salt and nonce.
pub fn encrypt(data: &[u8], password: &str) -> Result<Vec<u8>, EncodeError> {
    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut salt[..]);
    rng.fill(&mut nonce[..]);

    let key = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), data)
        .map_err(|e| EncodeError::EncryptionFailed {
            reason: e.to_string(),
        })?;

    let mut out = Vec::with_capacity(data.len() + ENCRYPTION_OVERHEAD);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    debug_assert_eq!(out.len(), data.len() + ENCRYPTION_OVERHEAD);
    Ok(out)
}

/// Decrypt a [`encrypt`]-formatted buffer. A wrong password, a
/// truncated buffer or a forged tag all report the same failure; the
/// caller decides whether to ask for another password.
pub fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>, DecodeError> {
    if data.len() < ENCRYPTION_OVERHEAD {
        return Err(DecodeError::DecryptionFailed);
    }

    let (salt, rest) = data.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(password, salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DecodeError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn encrypt_roundtrip() {
        let plaintext = b"the quick brown fox";
        let sealed = encrypt(plaintext, "hunter2").unwrap();
        assert_eq!(sealed.len(), plaintext.len() + ENCRYPTION_OVERHEAD);
        assert_eq!(decrypt(&sealed, "hunter2").unwrap(), plaintext);
    }

    #[test]
    fn wrong_password_fails() {
        let sealed = encrypt(b"secret", "hunter2").unwrap();
        assert!(matches!(
            decrypt(&sealed, "wrong"),
            Err(DecodeError::DecryptionFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = encrypt(b"secret", "hunter2").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(decrypt(&sealed, "hunter2").is_err());
    }

    #[test]
    fn short_buffer_fails() {
        assert!(decrypt(&[0u8; 20], "hunter2").is_err());
    }

    #[test]
    fn fresh_salt_per_call() {
        let a = encrypt(b"same input", "pw").unwrap();
        let b = encrypt(b"same input", "pw").unwrap();
        assert_ne!(a, b);
    }
}
