//! Boundary operations called by the CLI and HTTP service.
//!
//! Callers hand over already-materialized buffers; transport concerns (size
//! ceilings, MIME allow-lists, multipart parsing) stay on their side.

use eitxt_core::{Compression, EitxtError, EitxtResult, EncryptOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::armor;
use crate::compress;
use crate::container::{decrypt_all, encrypt_all, PayloadMetadata};
use crate::kdf::KdfParams;
use crate::MAX_ITERATIONS;

/// File name recorded when the caller has none
pub const DEFAULT_NAME: &str = "image";

/// Plaintext recovered from a container plus its declared metadata.
pub struct DecryptedFile {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: String,
}

impl std::fmt::Debug for DecryptedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedFile")
            .field("bytes", &format_args!("[{} bytes]", self.bytes.len()))
            .field("mime", &self.mime)
            .field("name", &self.name)
            .finish()
    }
}

/// What can be learned from a container without the passphrase.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerSummary {
    pub mime: String,
    pub name: String,
    pub size: u64,
    pub compression: Compression,
    pub created_at: String,
    pub cipher: String,
    pub kdf_alg: String,
    pub iterations: u32,
    pub chunk_bytes: u64,
    pub chunks: usize,
}

/// Encrypt `file` into armored text.
pub fn encrypt_request(
    file: &[u8],
    mime: &str,
    name: &str,
    passphrase: &SecretString,
    options: &EncryptOptions,
) -> EitxtResult<String> {
    require_passphrase(passphrase)?;
    if mime.trim().is_empty() {
        return Err(EitxtError::InvalidInput("mime type required".into()));
    }
    if options.chunk_bytes == 0 {
        return Err(EitxtError::InvalidInput("chunk_bytes must be at least 1".into()));
    }
    if options.iterations == 0 || options.iterations > MAX_ITERATIONS {
        return Err(EitxtError::InvalidInput(format!(
            "iterations must be in 1..={MAX_ITERATIONS}"
        )));
    }

    let name = if name.is_empty() { DEFAULT_NAME } else { name };
    let payload = PayloadMetadata::new(mime, name, file.len() as u64, options.compression);

    let compressed;
    let stream: &[u8] = match options.compression {
        Compression::Gzip => {
            compressed = compress::compress(file)?;
            compressed.as_slice()
        }
        Compression::None => file,
    };

    let kdf = KdfParams::generate(options.iterations);
    let key = kdf.derive(passphrase);
    let container = encrypt_all(stream, &key, kdf, payload, options.chunk_bytes)?;

    tracing::debug!(
        bytes = file.len(),
        stream_bytes = stream.len(),
        chunks = container.chunks.len(),
        "encrypt request complete"
    );

    armor::serialize(&container)
}

/// Decrypt armored text, returning the plaintext and its declared metadata.
///
/// Structural problems are reported before the key is derived.
pub fn decrypt_request(armored: &str, passphrase: &SecretString) -> EitxtResult<DecryptedFile> {
    require_passphrase(passphrase)?;

    let container = armor::parse(armored)?;
    container.validate()?;

    let key = container.kdf.derive(passphrase);
    let mut plaintext = decrypt_all(&container, &key)?;

    let payload = container.payload;
    Ok(DecryptedFile {
        bytes: std::mem::take(&mut *plaintext),
        mime: payload.mime,
        name: payload.name,
    })
}

/// Parse and validate an envelope without deriving a key.
pub fn inspect(armored: &str) -> EitxtResult<ContainerSummary> {
    let container = armor::parse(armored)?;
    container.validate()?;

    let chunks = container.chunks.len();
    let payload = container.payload;
    Ok(ContainerSummary {
        mime: payload.mime,
        name: payload.name,
        size: payload.size,
        compression: payload.compression,
        created_at: payload.created_at,
        cipher: container.cipher,
        kdf_alg: container.kdf.alg,
        iterations: container.kdf.iterations,
        chunk_bytes: container.chunk_bytes,
        chunks,
    })
}

fn require_passphrase(passphrase: &SecretString) -> EitxtResult<()> {
    if passphrase.expose_secret().is_empty() {
        return Err(EitxtError::InvalidInput("passphrase required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eitxt_core::ErrorKind;

    fn opts(compression: Compression) -> EncryptOptions {
        EncryptOptions {
            compression,
            chunk_bytes: 64,
            iterations: 1000,
        }
    }

    #[test]
    fn empty_passphrase_rejected() {
        let empty = SecretString::from("");
        let err = encrypt_request(b"x", "image/png", "x.png", &empty, &opts(Compression::None))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = decrypt_request("anything", &empty).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn bad_options_rejected() {
        let pass = SecretString::from("pw");
        let mut o = opts(Compression::Gzip);
        o.iterations = 0;
        assert_eq!(
            encrypt_request(b"x", "image/png", "x", &pass, &o).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );

        let mut o = opts(Compression::Gzip);
        o.chunk_bytes = 0;
        assert_eq!(
            encrypt_request(b"x", "image/png", "x", &pass, &o).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );

        assert_eq!(
            encrypt_request(b"x", " ", "x", &pass, &opts(Compression::Gzip))
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn default_name_and_metadata_surface() {
        let pass = SecretString::from("pw");
        let armored =
            encrypt_request(b"pixels", "image/webp", "", &pass, &opts(Compression::Gzip)).unwrap();

        let out = decrypt_request(&armored, &pass).unwrap();
        assert_eq!(out.bytes, b"pixels");
        assert_eq!(out.mime, "image/webp");
        assert_eq!(out.name, DEFAULT_NAME);
    }

    #[test]
    fn inspect_needs_no_passphrase() {
        let pass = SecretString::from("pw");
        let data = vec![9u8; 200];
        let armored =
            encrypt_request(&data, "image/bmp", "b.bmp", &pass, &opts(Compression::None)).unwrap();

        let summary = inspect(&armored).unwrap();
        assert_eq!(summary.name, "b.bmp");
        assert_eq!(summary.size, 200);
        assert_eq!(summary.chunks, 4);
        assert_eq!(summary.chunk_bytes, 64);
        assert_eq!(summary.iterations, 1000);
        assert_eq!(summary.compression, Compression::None);
    }

    #[test]
    fn debug_hides_plaintext() {
        let file = DecryptedFile {
            bytes: b"top secret".to_vec(),
            mime: "image/png".into(),
            name: "a.png".into(),
        };
        let rendered = format!("{file:?}");
        assert!(rendered.contains("[10 bytes]"));
        assert!(!rendered.contains("116"));
    }
}
