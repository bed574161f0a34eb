//! eitxt-crypto: passphrase-protected, text-armored containers for binary blobs
//!
//! Pipeline (encrypt): plaintext → gzip (optional) → fixed-size chunks → AES-256-GCM → JSON → base64url → armor
//!
//! ```text
//! Key = PBKDF2-HMAC-SHA256(passphrase, salt=random_128bit, iterations)
//!   └── Chunk AEAD: AES-256-GCM (key, nonce=random_96bit, AAD=canonical(payload metadata))
//! ```
//!
//! Every chunk shares the same AAD, so tampering with the metadata after the
//! fact invalidates all chunks. Decryption fails closed: every cryptographic
//! or integrity failure surfaces as the same `wrong key or corrupted data`.

pub mod armor;
pub mod chunk;
pub mod compress;
pub mod container;
pub mod encoding;
pub mod kdf;
pub mod request;

pub use armor::{parse, serialize, FOOTER, HEADER};
pub use chunk::{decrypt_chunk, encrypt_chunk, ChunkRecord};
pub use container::{build_aad, chunk_count, decrypt_all, encrypt_all, Container, PayloadMetadata};
pub use kdf::{derive_key, generate_salt, Key, KdfParams};
pub use request::{decrypt_request, encrypt_request, inspect, ContainerSummary, DecryptedFile};

/// Container magic token
pub const MAGIC: &str = "EITXT";

/// The only container format version this crate reads or writes
pub const FORMAT_VERSION: u32 = 1;

/// Cipher identifier recorded in every container
pub const CIPHER_ID: &str = "AES-256-GCM";

/// KDF identifier recorded in every container
pub const KDF_ALG: &str = "PBKDF2-HMAC-SHA256";

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the per-container KDF salt
pub const SALT_SIZE: usize = 16;

pub const DEFAULT_ITERATIONS: u32 = 310_000;

pub const DEFAULT_CHUNK_BYTES: usize = 1024 * 1024;

/// Containers asking for more work than this are refused before derivation.
pub const MAX_ITERATIONS: u32 = eitxt_core::config::ITERATIONS_CEILING;
