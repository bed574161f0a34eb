//! Container structure, canonical associated data, and whole-payload
//! encrypt/decrypt over ordered chunks.
//!
//! JSON layout (field order is fixed):
//! ```text
//! { "magic": "EITXT", "version": 1,
//!   "kdf": { "alg", "iterations", "salt_b64" },
//!   "cipher": "AES-256-GCM", "chunk_bytes": N,
//!   "payload": { "mime", "name", "size", "compression", "createdAt" },
//!   "chunks": [ { "seq", "iv_b64", "ct_b64" }, ... ] }
//! ```

use chrono::{SecondsFormat, Utc};
use eitxt_core::{Compression, EitxtError, EitxtResult, EnvelopeError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::chunk::{decrypt_chunk, encrypt_chunk, ChunkRecord};
use crate::compress;
use crate::kdf::{Key, KdfParams};
use crate::{CIPHER_ID, FORMAT_VERSION, MAGIC};

/// Declared facts about the plaintext. Bound into every chunk's tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    pub mime: String,
    pub name: String,
    /// Uncompressed plaintext length in bytes
    pub size: u64,
    pub compression: Compression,
    /// Creation instant; kept verbatim so the AAD is reproducible
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl PayloadMetadata {
    /// Metadata stamped with the current time.
    pub fn new(mime: impl Into<String>, name: impl Into<String>, size: u64, compression: Compression) -> Self {
        Self {
            mime: mime.into(),
            name: name.into(),
            size,
            compression,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub magic: String,
    pub version: u32,
    pub kdf: KdfParams,
    pub cipher: String,
    pub chunk_bytes: u64,
    pub payload: PayloadMetadata,
    pub chunks: Vec<ChunkRecord>,
}

impl Container {
    /// Structural checks that must pass before any key material is touched.
    pub fn validate(&self) -> EitxtResult<()> {
        if self.magic != MAGIC {
            return Err(EnvelopeError::BadMagic.into());
        }
        if self.version != FORMAT_VERSION {
            return Err(EnvelopeError::UnsupportedVersion.into());
        }
        if self.cipher != CIPHER_ID {
            return Err(EnvelopeError::UnsupportedCipher.into());
        }
        self.kdf.validate()?;
        if self.chunk_bytes == 0 {
            return Err(EnvelopeError::Undecodable.into());
        }
        self.ordered_chunks().map(|_| ())
    }

    /// Chunks sorted by `seq`, which must be exactly `0..n` with `n >= 1`.
    pub fn ordered_chunks(&self) -> EitxtResult<Vec<&ChunkRecord>> {
        if self.chunks.is_empty() {
            return Err(EnvelopeError::BadSequence.into());
        }
        let mut ordered: Vec<&ChunkRecord> = self.chunks.iter().collect();
        ordered.sort_by_key(|c| c.seq);
        if ordered.iter().enumerate().any(|(i, c)| c.seq != i as u64) {
            return Err(EnvelopeError::BadSequence.into());
        }
        Ok(ordered)
    }
}

/// Canonical AAD bytes for `meta`.
///
/// `{"mime":S,"name":S,"size":N,"compression":S,"createdAt":S}` with no
/// whitespace. Strings escape only `"`, `\` and control characters
/// (`\b \f \n \r \t`, otherwise `\u00xx` lowercase); everything else is raw
/// UTF-8. Both directions must produce identical bytes, so this never goes
/// through a general-purpose serializer.
pub fn build_aad(meta: &PayloadMetadata) -> Vec<u8> {
    let mut out = String::with_capacity(80 + meta.mime.len() + meta.name.len() + meta.created_at.len());
    out.push_str("{\"mime\":");
    push_json_str(&mut out, &meta.mime);
    out.push_str(",\"name\":");
    push_json_str(&mut out, &meta.name);
    out.push_str(",\"size\":");
    out.push_str(&meta.size.to_string());
    out.push_str(",\"compression\":");
    push_json_str(&mut out, meta.compression.as_str());
    out.push_str(",\"createdAt\":");
    push_json_str(&mut out, &meta.created_at);
    out.push('}');
    out.into_bytes()
}

fn push_json_str(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Number of chunk records produced for a `len`-byte stream.
///
/// `ceil(len / chunk_bytes)`, except that an empty stream still gets one
/// (empty) chunk so the metadata and key are always authenticated.
pub fn chunk_count(len: usize, chunk_bytes: usize) -> usize {
    len.div_ceil(chunk_bytes).max(1)
}

/// Split `stream` (the possibly-compressed plaintext) into `chunk_bytes`
/// pieces and encrypt each under `key`, bound to the canonical AAD of `payload`.
pub fn encrypt_all(
    stream: &[u8],
    key: &Key,
    kdf: KdfParams,
    payload: PayloadMetadata,
    chunk_bytes: usize,
) -> EitxtResult<Container> {
    if chunk_bytes == 0 {
        return Err(EitxtError::InvalidInput("chunk_bytes must be at least 1".into()));
    }

    let aad = build_aad(&payload);

    let chunks = if stream.is_empty() {
        vec![encrypt_chunk(key, 0, &aad, &[])?]
    } else {
        stream
            .par_chunks(chunk_bytes)
            .enumerate()
            .map(|(seq, piece)| encrypt_chunk(key, seq as u64, &aad, piece))
            .collect::<EitxtResult<Vec<_>>>()?
    };

    tracing::debug!(
        chunks = chunks.len(),
        chunk_bytes,
        stream_bytes = stream.len(),
        compression = %payload.compression,
        "encrypted container"
    );

    Ok(Container {
        magic: MAGIC.to_string(),
        version: FORMAT_VERSION,
        kdf,
        cipher: CIPHER_ID.to_string(),
        chunk_bytes: chunk_bytes as u64,
        payload,
        chunks,
    })
}

/// Decrypt every chunk in `seq` order, undo compression, and check the
/// declared size.
///
/// Every failure after structural validation is [`EitxtError::Integrity`].
pub fn decrypt_all(container: &Container, key: &Key) -> EitxtResult<Zeroizing<Vec<u8>>> {
    container.validate()?;
    let ordered = container.ordered_chunks()?;

    let aad = build_aad(&container.payload);
    let chunk_bytes = container.chunk_bytes;
    let last = ordered.len() - 1;

    let parts = ordered
        .par_iter()
        .enumerate()
        .map(|(i, record)| {
            let plain = decrypt_chunk(key, &aad, record)?;
            let len = plain.len() as u64;
            // Full chunks everywhere but the tail; only a lone chunk may be empty.
            let well_sized = if i < last {
                len == chunk_bytes
            } else {
                len <= chunk_bytes && (len > 0 || last == 0)
            };
            if !well_sized {
                return Err(EitxtError::Integrity);
            }
            Ok(plain)
        })
        .collect::<EitxtResult<Vec<_>>>()?;

    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut stream = Zeroizing::new(Vec::with_capacity(total));
    for part in &parts {
        stream.extend_from_slice(part);
    }
    drop(parts);

    let declared = container.payload.size;
    let plaintext = match container.payload.compression {
        Compression::Gzip => compress::decompress(&stream, declared)?,
        Compression::None => stream,
    };

    if plaintext.len() as u64 != declared {
        return Err(EitxtError::Integrity);
    }

    tracing::debug!(
        chunks = ordered.len(),
        bytes = plaintext.len(),
        compression = %container.payload.compression,
        "decrypted container"
    );

    Ok(plaintext)
}
