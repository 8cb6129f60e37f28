//! Transparent compression of values above a size threshold, grounded in
//! the teacher's `dashflow-compression` (Zstd chosen for best ratio) — here
//! used directly rather than through that crate's trait object, since the
//! storage layer only ever needs one algorithm.

use crate::error::{Result, StorageError};

/// Values at or below this size are stored as-is (spec §4.2: compression
/// kicks in above 1 KiB).
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

const ZSTD_LEVEL: i32 = 3;

/// Maximum decompressed size accepted, mirroring the teacher's
/// decompression-bomb guard.
const MAX_DECOMPRESSED_BYTES: usize = 100 * 1024 * 1024;

/// Wire envelope persisted in Redis: `compressed` tells the reader whether
/// `bytes` needs zstd decoding.
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

pub fn encode(raw: &[u8]) -> Result<Encoded> {
    if raw.len() <= COMPRESSION_THRESHOLD_BYTES {
        return Ok(Encoded { bytes: raw.to_vec(), compressed: false });
    }
    let compressed = zstd::encode_all(raw, ZSTD_LEVEL)
        .map_err(|e| StorageError::CompressionError(e.to_string()))?;
    Ok(Encoded { bytes: compressed, compressed: true })
}

pub fn decode(bytes: &[u8], compressed: bool) -> Result<Vec<u8>> {
    if !compressed {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    let mut decoder =
        zstd::Decoder::new(bytes).map_err(|e| StorageError::CompressionError(e.to_string()))?;
    std::io::copy(&mut decoder, &mut out).map_err(|e| StorageError::CompressionError(e.to_string()))?;
    if out.len() > MAX_DECOMPRESSED_BYTES {
        return Err(StorageError::CompressionError(format!(
            "decompressed size {} exceeds maximum allowed {}",
            out.len(),
            MAX_DECOMPRESSED_BYTES
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_are_not_compressed() {
        let raw = b"short value";
        let encoded = encode(raw).unwrap();
        assert!(!encoded.compressed);
        assert_eq!(encoded.bytes, raw);
    }

    #[test]
    fn large_values_roundtrip_through_compression() {
        let raw = "x".repeat(4096).into_bytes();
        let encoded = encode(&raw).unwrap();
        assert!(encoded.compressed);
        assert!(encoded.bytes.len() < raw.len());
        let decoded = decode(&encoded.bytes, encoded.compressed).unwrap();
        assert_eq!(decoded, raw);
    }
}
