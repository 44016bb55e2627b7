//! Binary quantization: per-dimension sign (or learned-median) thresholds,
//! Hamming-distance search (spec.md §4.7 "BQ").

use crate::distance;
use crate::error::{VectorError, VectorResult};

const MAGIC: &[u8; 4] = b"BQ01";

/// A per-dimension binary quantizer. Code words are packed 64 bits at a
/// time, `ceil(dimension / 64)` words per vector.
pub struct BinaryQuantizer {
    dimension: usize,
    thresholds: Vec<f32>,
    trained: bool,
}

impl BinaryQuantizer {
    /// Construct an untrained quantizer.
    pub fn new(dimension: usize) -> Self {
        BinaryQuantizer { dimension, thresholds: Vec::new(), trained: false }
    }

    /// The configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of `u64` words one code occupies.
    pub fn code_words(&self) -> usize {
        (self.dimension + 63) / 64
    }

    /// Whether `train` has been called successfully.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Set per-dimension thresholds. With `vectors` empty, defaults to sign
    /// quantization (threshold `0.0` everywhere). With `vectors` non-empty,
    /// learns the per-dimension median instead.
    pub fn train(&mut self, vectors: &[Vec<f32>]) -> VectorResult<()> {
        if vectors.is_empty() {
            self.thresholds = vec![0.0; self.dimension];
            self.trained = true;
            return Ok(());
        }
        for v in vectors {
            if v.len() != self.dimension {
                return Err(VectorError::DimensionMismatch { expected: self.dimension, got: v.len() });
            }
        }
        let mut thresholds = Vec::with_capacity(self.dimension);
        for d in 0..self.dimension {
            let mut column: Vec<f32> = vectors.iter().map(|v| v[d]).collect();
            column.sort_by(|a, b| distance::total_cmp(*a, *b));
            thresholds.push(median(&column));
        }
        self.thresholds = thresholds;
        self.trained = true;
        Ok(())
    }

    /// Encode a vector: bit `i` is set when `v[i] >= threshold[i]`.
    pub fn encode(&self, v: &[f32]) -> VectorResult<Vec<u64>> {
        self.require_trained()?;
        if v.len() != self.dimension {
            return Err(VectorError::DimensionMismatch { expected: self.dimension, got: v.len() });
        }
        let mut code = vec![0u64; self.code_words()];
        for (i, &x) in v.iter().enumerate() {
            if x >= self.thresholds[i] {
                code[i / 64] |= 1u64 << (i % 64);
            }
        }
        Ok(code)
    }

    /// Hamming distance between two codes of this quantizer's width.
    pub fn distance(&self, a: &[u64], b: &[u64]) -> VectorResult<u32> {
        self.check_code_len(a)?;
        self.check_code_len(b)?;
        Ok(distance::hamming(a, b))
    }

    /// Encode a vector straight to bytes (`code_words() * 8` little-endian
    /// bytes), for callers that store codes as opaque `Vec<u8>` alongside
    /// PQ/SQ codes.
    pub fn encode_bytes(&self, v: &[f32]) -> VectorResult<Vec<u8>> {
        let code = self.encode(v)?;
        let mut out = Vec::with_capacity(code.len() * 8);
        for word in code {
            out.extend_from_slice(&word.to_le_bytes());
        }
        Ok(out)
    }

    /// Hamming distance between two byte-packed codes produced by
    /// [`Self::encode_bytes`].
    pub fn distance_bytes(&self, a: &[u8], b: &[u8]) -> VectorResult<u32> {
        Ok(distance::hamming(&bytes_to_words(a)?, &bytes_to_words(b)?))
    }

    /// Approximate cosine distance from Hamming distance: `2 * hamming / D`.
    pub fn approx_cosine_distance(&self, a: &[u64], b: &[u64]) -> VectorResult<f32> {
        let h = self.distance(a, b)?;
        Ok(2.0 * h as f32 / self.dimension as f32)
    }

    fn require_trained(&self) -> VectorResult<()> {
        if !self.trained {
            return Err(VectorError::NotTrained);
        }
        Ok(())
    }

    fn check_code_len(&self, code: &[u64]) -> VectorResult<()> {
        if code.len() != self.code_words() {
            return Err(VectorError::Corrupt(format!("expected a {}-word BQ code, got {}", self.code_words(), code.len())));
        }
        Ok(())
    }

    /// Serialize with the `BQ01` magic (spec.md §3 "Vector codebook").
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.push(self.trained as u8);
        if self.trained {
            for &t in &self.thresholds {
                out.extend_from_slice(&t.to_le_bytes());
            }
        }
        out
    }

    /// Parse bytes previously produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> VectorResult<Self> {
        const HEADER_LEN: usize = 4 + 4 + 1;
        if bytes.len() < HEADER_LEN {
            return Err(VectorError::Corrupt("truncated BQ codebook header".into()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(VectorError::Corrupt("bad BQ magic".into()));
        }
        let dimension = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let trained = bytes[8] != 0;
        let mut bq = BinaryQuantizer { dimension, thresholds: Vec::new(), trained: false };
        if trained {
            if bytes.len() != HEADER_LEN + dimension * 4 {
                return Err(VectorError::Corrupt("BQ codebook length mismatch".into()));
            }
            let mut pos = HEADER_LEN;
            let mut thresholds = Vec::with_capacity(dimension);
            for _ in 0..dimension {
                thresholds.push(f32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()));
                pos += 4;
            }
            bq.thresholds = thresholds;
            bq.trained = true;
        }
        Ok(bq)
    }
}

fn bytes_to_words(bytes: &[u8]) -> VectorResult<Vec<u64>> {
    if bytes.len() % 8 != 0 {
        return Err(VectorError::Corrupt(format!("BQ code byte length {} is not a multiple of 8", bytes.len())));
    }
    Ok(bytes.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())).collect())
}

fn median(sorted: &[f32]) -> f32 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_quantization_is_default_without_samples() {
        let mut bq = BinaryQuantizer::new(4);
        bq.train(&[]).unwrap();
        let code = bq.encode(&[1.0, -1.0, 0.0, 2.0]).unwrap();
        // bit set iff v >= 0.0
        assert_eq!(code[0] & 0b1111, 0b1101);
    }

    #[test]
    fn learned_median_threshold() {
        let mut bq = BinaryQuantizer::new(1);
        bq.train(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        // median is 2.0; 1.5 is below, 2.5 is above
        let below = bq.encode(&[1.5]).unwrap();
        let above = bq.encode(&[2.5]).unwrap();
        assert_eq!(below[0], 0);
        assert_eq!(above[0], 1);
    }

    #[test]
    fn hamming_zero_for_identical_codes() {
        let mut bq = BinaryQuantizer::new(8);
        bq.train(&[]).unwrap();
        let code = bq.encode(&[1.0; 8]).unwrap();
        assert_eq!(bq.distance(&code, &code).unwrap(), 0);
    }

    #[test]
    fn hamming_is_dimension_when_every_bit_disagrees() {
        let mut bq = BinaryQuantizer::new(8);
        bq.train(&[]).unwrap();
        let a = bq.encode(&[1.0; 8]).unwrap();
        let b = bq.encode(&[-1.0; 8]).unwrap();
        assert_eq!(bq.distance(&a, &b).unwrap(), 8);
    }

    #[test]
    fn code_words_spans_multiple_u64_words() {
        let bq = BinaryQuantizer::new(130);
        assert_eq!(bq.code_words(), 3);
    }

    #[test]
    fn byte_encoding_matches_word_encoding_distance() {
        let mut bq = BinaryQuantizer::new(8);
        bq.train(&[]).unwrap();
        let a = bq.encode(&[1.0; 8]).unwrap();
        let b = bq.encode(&[-1.0; 8]).unwrap();
        let ab = bq.encode_bytes(&[1.0; 8]).unwrap();
        let bb = bq.encode_bytes(&[-1.0; 8]).unwrap();
        assert_eq!(bq.distance(&a, &b).unwrap(), bq.distance_bytes(&ab, &bb).unwrap());
    }

    #[test]
    fn round_trip_serialization() {
        let mut bq = BinaryQuantizer::new(4);
        bq.train(&[vec![0.0, 1.0, 2.0, 3.0]]).unwrap();
        let bytes = bq.to_bytes();
        assert_eq!(&bytes[0..4], MAGIC);
        let reloaded = BinaryQuantizer::from_bytes(&bytes).unwrap();
        assert_eq!(bq.encode(&[1.0, 1.0, 1.0, 1.0]).unwrap(), reloaded.encode(&[1.0, 1.0, 1.0, 1.0]).unwrap());
    }
}
