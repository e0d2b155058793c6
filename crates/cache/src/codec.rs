//! Byte codec for trimmed page bitmaps.
//!
//! Pages are stored as raw deflate streams at the fastest compression level:
//! one pass, no preset dictionary. Decoding writes straight into a caller
//! supplied buffer so the decode cache can reuse its slot allocations.

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Errors raised while compressing or decompressing page bytes
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The encoder reported a failure
    #[error("compression failed: {0}")]
    Compress(#[from] std::io::Error),

    /// The compressed stream is malformed
    #[error("decompression failed: {0}")]
    Decompress(#[from] flate2::DecompressError),

    /// The output buffer cannot hold the expected bitmap
    #[error("output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// The stream decoded to a different length than recorded at compression time
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Compress a trimmed bitmap.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    // Trimmed pages are mostly flat color and shrink well below a quarter
    let buffer = Vec::with_capacity(bytes.len() / 4 + 64);
    let mut encoder = DeflateEncoder::new(buffer, Compression::fast());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompress `compressed` into the front of `out`.
///
/// The stream must end exactly after `expected` bytes of output. Anything
/// else is reported as corruption rather than truncated or padded silently.
pub fn decompress_into(
    compressed: &[u8],
    expected: usize,
    out: &mut [u8],
) -> Result<(), CodecError> {
    if out.len() < expected {
        return Err(CodecError::BufferTooSmall {
            needed: expected,
            available: out.len(),
        });
    }

    let mut inflater = Decompress::new(false);
    let status =
        inflater.decompress(compressed, &mut out[..expected], FlushDecompress::Finish)?;
    let actual = inflater.total_out() as usize;

    if status != Status::StreamEnd {
        // A full output buffer means the stream holds more than `expected`
        // bytes; otherwise the input ended early.
        let actual = if actual < expected { actual } else { expected + 1 };
        return Err(CodecError::SizeMismatch { expected, actual });
    }

    if actual != expected {
        return Err(CodecError::SizeMismatch { expected, actual });
    }

    Ok(())
}

/// Decompress into a freshly allocated buffer of exactly `expected` bytes.
pub fn decompress(compressed: &[u8], expected: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = vec![0u8; expected];
    decompress_into(compressed, expected, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sample_bitmap() -> Vec<u8> {
        // White page with a dark band, the typical shape of trimmed content
        let mut bytes = vec![255u8; 64 * 48 * 4];
        for row in 10..20 {
            let start = row * 64 * 4;
            bytes[start..start + 64 * 4].fill(0);
        }
        bytes
    }

    #[test]
    fn test_roundtrip_is_bit_exact() {
        let bitmap = sample_bitmap();
        let compressed = compress(&bitmap).unwrap();
        assert!(compressed.len() < bitmap.len());

        let restored = decompress(&compressed, bitmap.len()).unwrap();
        assert_eq!(restored, bitmap);
    }

    #[test]
    fn test_decompress_into_larger_buffer() {
        let bitmap = sample_bitmap();
        let compressed = compress(&bitmap).unwrap();

        let mut out = vec![7u8; bitmap.len() * 2];
        decompress_into(&compressed, bitmap.len(), &mut out).unwrap();
        assert_eq!(&out[..bitmap.len()], &bitmap[..]);
    }

    #[test]
    fn test_expected_size_too_small_is_mismatch() {
        let bitmap = sample_bitmap();
        let compressed = compress(&bitmap).unwrap();

        let result = decompress(&compressed, bitmap.len() - 4);
        assert!(matches!(result, Err(CodecError::SizeMismatch { .. })));
    }

    #[test]
    fn test_expected_size_too_large_is_mismatch() {
        let bitmap = sample_bitmap();
        let compressed = compress(&bitmap).unwrap();

        match decompress(&compressed, bitmap.len() + 4) {
            Err(CodecError::SizeMismatch { expected, actual }) => {
                assert_eq!(expected, bitmap.len() + 4);
                assert_eq!(actual, bitmap.len());
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_stream_reports_short_output() {
        // Noise barely compresses, so half the stream holds about half the bytes
        let mut rng = StdRng::seed_from_u64(7);
        let bitmap: Vec<u8> = (0..65_536).map(|_| rng.gen()).collect();
        let compressed = compress(&bitmap).unwrap();
        let truncated = &compressed[..compressed.len() / 2];

        match decompress(truncated, bitmap.len()) {
            Err(CodecError::SizeMismatch { expected, actual }) => {
                assert_eq!(expected, bitmap.len());
                assert!(actual < expected, "reported {} of {} bytes", actual, expected);
            }
            other => panic!("expected size mismatch, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_buffer_too_small() {
        let compressed = compress(&[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 2];
        let result = decompress_into(&compressed, 4, &mut out);
        assert!(matches!(result, Err(CodecError::BufferTooSmall { needed: 4, available: 2 })));
    }

    #[test]
    fn test_garbage_input_fails() {
        let garbage = [0xFFu8; 32];
        assert!(decompress(&garbage, 128).is_err());
    }
}
