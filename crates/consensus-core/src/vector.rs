//! Persisted vector codec and similarity scoring.
//!
//! Stored blob layout: a `u32` little-endian dimension tag followed by
//! `dimension` IEEE-754 `f32` little-endian values. The tag makes a
//! dimension mismatch detectable up front instead of surfacing as a
//! silently truncated or padded vector.

use crate::ConsensusError;

const TAG_LEN: usize = 4;

/// Serialize a vector into the stored blob format.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TAG_LEN + vector.len() * 4);
    bytes.extend_from_slice(&(vector.len() as u32).to_le_bytes());
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Deserialize a stored blob, enforcing the configured dimension.
///
/// A tag that disagrees with `expected_dimension` is a corruption error,
/// as are a payload length that disagrees with the tag and non-finite
/// components.
pub fn decode_vector(blob: &[u8], expected_dimension: usize) -> Result<Vec<f32>, ConsensusError> {
    if blob.len() < TAG_LEN {
        return Err(ConsensusError::CorruptVector(format!(
            "blob of {} bytes is too short to carry a dimension tag",
            blob.len()
        )));
    }

    let tag = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]) as usize;
    if tag != expected_dimension {
        return Err(ConsensusError::DimensionMismatch {
            expected: expected_dimension,
            actual: tag,
        });
    }

    let payload = &blob[TAG_LEN..];
    if payload.len() != tag * 4 {
        return Err(ConsensusError::CorruptVector(format!(
            "payload of {} bytes does not match dimension tag {tag}",
            payload.len()
        )));
    }

    let mut out = Vec::with_capacity(tag);
    for chunk in payload.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(ConsensusError::CorruptVector(
                "vector contains non-finite values".to_string(),
            ));
        }
        out.push(value);
    }
    Ok(out)
}

/// Cosine similarity of two vectors: dot product over the product of norms.
///
/// Computed in full even though well-formed stored vectors are unit-norm,
/// so corrupted norms cannot inflate scores. A zero-norm vector scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, ConsensusError> {
    if a.len() != b.len() {
        return Err(ConsensusError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / denom)
}
