//! Per-chunk AES-256-GCM encryption/decryption
//!
//! Chunk record (JSON, inside the container's `chunks` array):
//! ```text
//! { "seq": N, "iv_b64": base64url(12-byte random nonce), "ct_b64": base64url(ciphertext || 16-byte tag) }
//! ```
//!
//! All chunks of a container share the same AAD (the canonical payload
//! metadata), so the metadata is authenticated once per chunk.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use eitxt_core::{EitxtError, EitxtResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding;
use crate::kdf::Key;
use crate::{NONCE_SIZE, TAG_SIZE};

/// One encrypted chunk. `seq` is the chunk's 0-based position in the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub seq: u64,
    #[serde(rename = "iv_b64", with = "encoding::fixed")]
    pub nonce: [u8; NONCE_SIZE],
    #[serde(rename = "ct_b64", with = "encoding::bytes")]
    pub ciphertext: Vec<u8>,
}

/// Encrypt a single chunk with AES-256-GCM under a fresh random nonce.
///
/// The returned ciphertext carries the 16-byte tag at its end.
pub fn encrypt_chunk(key: &Key, seq: u64, aad: &[u8], plaintext: &[u8]) -> EitxtResult<ChunkRecord> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("chunk {seq} encryption failed: {e}"))?;

    Ok(ChunkRecord {
        seq,
        nonce,
        ciphertext,
    })
}

/// Decrypt and authenticate a single chunk.
///
/// Wrong key, tampered ciphertext, tampered AAD and truncated records all
/// fail with the same [`EitxtError::Integrity`].
pub fn decrypt_chunk(key: &Key, aad: &[u8], record: &ChunkRecord) -> EitxtResult<Zeroizing<Vec<u8>>> {
    if record.ciphertext.len() < TAG_SIZE {
        return Err(EitxtError::Integrity);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(
            Nonce::from_slice(&record.nonce),
            Payload {
                msg: &record.ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| EitxtError::Integrity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eitxt_core::ErrorKind;

    fn key(byte: u8) -> Key {
        Key::from_bytes([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key(42);
        let plaintext = b"hello, encrypted world!";

        let record = encrypt_chunk(&key, 0, b"aad", plaintext).unwrap();
        let decrypted = decrypt_chunk(&key, b"aad", &record).unwrap();

        assert_eq!(decrypted.as_slice(), plaintext);
        assert_eq!(record.seq, 0);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = key(1);

        let record = encrypt_chunk(&key, 3, b"", b"").unwrap();
        assert_eq!(record.ciphertext.len(), TAG_SIZE);
        let decrypted = decrypt_chunk(&key, b"", &record).unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_encrypted_size() {
        let record = encrypt_chunk(&key(0), 0, b"aad", &[0u8; 1000]).unwrap();

        // plaintext (1000) + tag (16); the nonce travels separately
        assert_eq!(record.ciphertext.len(), 1000 + TAG_SIZE);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let record = encrypt_chunk(&key(1), 0, b"aad", b"secret data").unwrap();
        let err = decrypt_chunk(&key(2), b"aad", &record).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_decrypt_wrong_aad() {
        let key = key(7);
        let record = encrypt_chunk(&key, 0, b"{\"size\":1}", b"secret data").unwrap();
        let err = decrypt_chunk(&key, b"{\"size\":2}", &record).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Integrity, "AAD mismatch must fail");
    }

    #[test]
    fn test_every_bit_flip_is_detected() {
        let key = key(9);
        let record = encrypt_chunk(&key, 0, b"aad", b"abc").unwrap();

        for byte in 0..record.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = record.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert!(decrypt_chunk(&key, b"aad", &tampered).is_err());
            }
        }
        for byte in 0..NONCE_SIZE {
            let mut tampered = record.clone();
            tampered.nonce[byte] ^= 0x01;
            assert!(decrypt_chunk(&key, b"aad", &tampered).is_err());
        }
    }

    #[test]
    fn test_truncated_record() {
        let key = key(3);
        let mut record = encrypt_chunk(&key, 0, b"aad", b"secret").unwrap();
        record.ciphertext.truncate(TAG_SIZE - 1);

        let err = decrypt_chunk(&key, b"aad", &record).unwrap_err();
        assert_eq!(err.to_string(), "wrong key or corrupted data");
    }

    #[test]
    fn test_nonces_are_fresh() {
        let key = key(5);
        let a = encrypt_chunk(&key, 0, b"aad", b"same").unwrap();
        let b = encrypt_chunk(&key, 0, b"aad", b"same").unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = ChunkRecord {
            seq: 2,
            nonce: [0u8; NONCE_SIZE],
            ciphertext: vec![0xfb, 0xff],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"seq":2,"iv_b64":"AAAAAAAAAAAAAAAA","ct_b64":"-_8"}"#);
    }
}
