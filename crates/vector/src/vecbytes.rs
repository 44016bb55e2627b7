//! Raw `f32` vector (de)serialization shared by the flat maintainer (which
//! keeps a copy of every indexed vector for retraining) and the codebook
//! trainer (which reads that copy back out to train against).

use crate::error::{VectorError, VectorResult};

/// Pack a vector as consecutive little-endian `f32`s.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Unpack bytes previously produced by [`encode_vector`].
pub fn decode_vector(bytes: &[u8]) -> VectorResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(VectorError::Corrupt(format!("vector byte length {} is not a multiple of 4", bytes.len())));
    }
    Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect())
}
