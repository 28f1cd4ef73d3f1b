//! Per-chunk gzip compression.
//!
//! Every file-data chunk is compressed independently so the receiver can
//! decompress and write as chunks arrive, without cross-chunk state.

use crate::error::FileError;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};

/// Bytes of file content read per chunk before compression.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Gzip-compress one chunk.
///
/// # Errors
///
/// Returns `FileError::Io` if the encoder fails.
pub fn compress_chunk(data: &[u8]) -> Result<Vec<u8>, FileError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress one gzip chunk.
///
/// # Errors
///
/// Returns `FileError::Io` for truncated or corrupt chunk bytes.
pub fn decompress_chunk(data: &[u8]) -> Result<Vec<u8>, FileError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_round_trip() {
        let data = vec![42u8; CHUNK_SIZE];
        let packed = compress_chunk(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress_chunk(&packed).unwrap(), data);
    }

    #[test]
    fn test_empty_chunk_round_trip() {
        let packed = compress_chunk(&[]).unwrap();
        assert!(decompress_chunk(&packed).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_chunk_is_an_error() {
        assert!(decompress_chunk(b"definitely not gzip").is_err());
    }
}
