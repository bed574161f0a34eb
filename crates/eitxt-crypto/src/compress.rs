//! gzip compression applied to the whole plaintext before chunking

use std::io::{Read, Write};

use eitxt_core::{EitxtError, EitxtResult};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use zeroize::Zeroizing;

/// Deflate level used for new containers
pub const GZIP_LEVEL: u32 = 6;

/// Largest buffer reserved up front for inflated output.
const PREALLOC_LIMIT: usize = 256 * 1024 * 1024;

/// Deflate never expands a byte stream by more than this factor.
const MAX_DEFLATE_RATIO: usize = 1032;

/// Upper bound on the gzip encoding of `len` bytes: stored-block overhead
/// plus header and trailer.
fn output_bound(len: usize) -> usize {
    len.saturating_add(len / 64).saturating_add(128)
}

/// Capacity reserved before inflating `data` into at most `max_len` bytes.
fn inflate_capacity(data: &[u8], max_len: u64) -> usize {
    usize::try_from(max_len.saturating_add(1))
        .unwrap_or(usize::MAX)
        .min(data.len().saturating_mul(MAX_DEFLATE_RATIO).saturating_add(1))
        .min(PREALLOC_LIMIT)
}

/// gzip-compress `data`.
///
/// The output buffer is sized for the worst case so it is never reallocated;
/// a reallocation would leave an unwiped copy of the compressed plaintext.
pub fn compress(data: &[u8]) -> EitxtResult<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(Vec::with_capacity(output_bound(data.len())));
    let mut encoder = GzEncoder::new(&mut *out, flate2::Compression::new(GZIP_LEVEL));
    encoder
        .write_all(data)
        .map_err(|e| anyhow::anyhow!("gzip compress: {e}"))?;
    encoder
        .finish()
        .map_err(|e| anyhow::anyhow!("gzip finish: {e}"))?;
    Ok(out)
}

/// gunzip `data`, producing at most `max_len` bytes.
///
/// A malformed stream, or one that inflates past `max_len`, fails with the
/// same [`EitxtError::Integrity`] as an authentication failure.
///
/// The output is reserved up front (capped at 256 MiB) so inflating
/// does not regrow it. flate2's own window and state are not wiped.
pub fn decompress(data: &[u8], max_len: u64) -> EitxtResult<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(Vec::with_capacity(inflate_capacity(data, max_len)));
    MultiGzDecoder::new(data)
        .take(max_len.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|_| EitxtError::Integrity)?;
    if out.len() as u64 > max_len {
        return Err(EitxtError::Integrity);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eitxt_core::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn round_trip_small() {
        let data = b"hello gzip hello gzip hello gzip";
        let packed = compress(data).unwrap();
        assert_eq!(&packed[..2], &[0x1f, 0x8b], "gzip magic");
        let out = decompress(&packed, data.len() as u64).unwrap();
        assert_eq!(out.as_slice(), data.as_slice());
    }

    #[test]
    fn round_trip_empty() {
        let packed = compress(b"").unwrap();
        assert!(!packed.is_empty(), "empty input still has a gzip header");
        let out = decompress(&packed, 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn compresses_repetitive_data() {
        let data = vec![0x41u8; 64 * 1024];
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len() / 10);
    }

    #[test]
    fn malformed_stream_is_integrity_failure() {
        let err = decompress(b"definitely not gzip", 1024).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.to_string(), "wrong key or corrupted data");
    }

    #[test]
    fn truncated_stream_is_integrity_failure() {
        let packed = compress(&[7u8; 4096]).unwrap();
        let err = decompress(&packed[..packed.len() - 6], 4096).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn output_is_bounded() {
        let packed = compress(&vec![0u8; 10_000]).unwrap();
        assert!(decompress(&packed, 9_999).is_err());
        assert_eq!(decompress(&packed, 10_000).unwrap().len(), 10_000);
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491_4f6c_dd1du64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state as u8
            })
            .collect()
    }

    #[test]
    fn compressed_buffer_never_regrows() {
        for len in [0, 1, 1000, 64 * 1024] {
            let data = noise(len);
            let packed = compress(&data).unwrap();
            assert!(packed.len() <= output_bound(len), "len {len}");
            assert_eq!(packed.capacity(), output_bound(len), "len {len}");
        }
    }

    #[test]
    fn inflated_buffer_never_regrows() {
        let data = noise(50_000);
        let packed = compress(&data).unwrap();
        let out = decompress(&packed, data.len() as u64).unwrap();
        assert_eq!(out.as_slice(), data.as_slice());
        assert_eq!(out.capacity(), data.len() + 1);
    }

    #[test]
    fn inflate_reservation_is_capped() {
        assert_eq!(inflate_capacity(&[0u8; 10], u64::MAX), 10 * MAX_DEFLATE_RATIO + 1);
        assert_eq!(inflate_capacity(&[0u8; 10], 5), 6);
        assert_eq!(inflate_capacity(&vec![0u8; 1 << 20], u64::MAX), PREALLOC_LIMIT);
    }

    proptest! {
        #[test]
        fn compress_decompress_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..=8192)) {
            let packed = compress(&data).unwrap();
            let out = decompress(&packed, data.len() as u64).unwrap();
            prop_assert_eq!(out.as_slice(), data.as_slice());
        }
    }
}
