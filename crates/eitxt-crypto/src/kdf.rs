//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → container key

use eitxt_core::{EitxtResult, EnvelopeError};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::encoding;
use crate::{KDF_ALG, KEY_SIZE, MAX_ITERATIONS, SALT_SIZE};

/// A 256-bit AES key derived from a passphrase.
///
/// Lives only for the duration of one encrypt or decrypt call and is
/// zeroized on drop.
pub struct Key {
    bytes: [u8; KEY_SIZE],
}

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for Key {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

/// KDF parameters as recorded in the container (`kdf` object).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub alg: String,
    pub iterations: u32,
    #[serde(rename = "salt_b64", with = "encoding::fixed")]
    pub salt: [u8; SALT_SIZE],
}

impl KdfParams {
    /// Fresh parameters with a newly generated salt.
    pub fn generate(iterations: u32) -> Self {
        Self {
            alg: KDF_ALG.to_string(),
            iterations,
            salt: generate_salt(),
        }
    }

    /// Reject unknown algorithms and work factors outside `1..=MAX_ITERATIONS`.
    pub fn validate(&self) -> EitxtResult<()> {
        if self.alg != KDF_ALG || self.iterations == 0 || self.iterations > MAX_ITERATIONS {
            return Err(EnvelopeError::UnsupportedKdf.into());
        }
        Ok(())
    }

    pub fn derive(&self, passphrase: &SecretString) -> Key {
        derive_key(passphrase, &self.salt, self.iterations)
    }
}

/// Generate a random 128-bit salt from the OS CSPRNG.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive a 256-bit key with PBKDF2-HMAC-SHA256.
///
/// Deterministic in its inputs. Passphrase policy (e.g. non-empty) is the
/// caller's job.
pub fn derive_key(passphrase: &SecretString, salt: &[u8; SALT_SIZE], iterations: u32) -> Key {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(
        passphrase.expose_secret().as_bytes(),
        salt,
        iterations,
        &mut key,
    );
    tracing::debug!(iterations, "derived container key");
    Key::from_bytes(key)
}
