//! Scalar quantization: per-dimension linear quantization with 4- or 8-bit
//! codes (spec.md §4.7 "SQ").

use crate::distance::{self, Metric};
use crate::error::{VectorError, VectorResult};

const MAGIC: &[u8; 4] = b"SQ01";
/// Below this per-dimension range, quantization would divide by ~zero;
/// treated as a degenerate constant dimension instead.
const FLOAT_TOLERANCE: f32 = 1e-12;

/// A per-dimension linear scalar quantizer.
pub struct ScalarQuantizer {
    dimension: usize,
    bits: u8,
    min: Vec<f32>,
    max: Vec<f32>,
    scale: Vec<f32>,
    trained: bool,
}

impl ScalarQuantizer {
    /// Construct an untrained quantizer. `bits` must be 4 or 8.
    pub fn new(dimension: usize, bits: u8) -> VectorResult<Self> {
        if bits != 4 && bits != 8 {
            return Err(VectorError::InvalidConfig(format!("sq bit width must be 4 or 8, got {bits}")));
        }
        Ok(ScalarQuantizer { dimension, bits, min: Vec::new(), max: Vec::new(), scale: Vec::new(), trained: false })
    }

    /// The configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether `train` has been called successfully.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    fn max_quant_value(&self) -> f32 {
        ((1u32 << self.bits) - 1) as f32
    }

    /// Learn per-dimension `[min, max]` from a training sample.
    pub fn train(&mut self, vectors: &[Vec<f32>]) -> VectorResult<()> {
        if vectors.is_empty() {
            return Err(VectorError::InvalidConfig("cannot train on an empty sample".into()));
        }
        for v in vectors {
            if v.len() != self.dimension {
                return Err(VectorError::DimensionMismatch { expected: self.dimension, got: v.len() });
            }
        }
        let mut min = vectors[0].clone();
        let mut max = vectors[0].clone();
        for v in &vectors[1..] {
            for d in 0..self.dimension {
                min[d] = min[d].min(v[d]);
                max[d] = max[d].max(v[d]);
            }
        }
        let max_q = self.max_quant_value();
        let scale = (0..self.dimension)
            .map(|d| {
                let range = max[d] - min[d];
                if range < FLOAT_TOLERANCE {
                    1.0
                } else {
                    range / max_q
                }
            })
            .collect();
        self.min = min;
        self.max = max;
        self.scale = scale;
        self.trained = true;
        Ok(())
    }

    /// Encode a vector, packing two 4-bit codes per byte (lower nibble
    /// first) or one 8-bit code per byte.
    pub fn encode(&self, v: &[f32]) -> VectorResult<Vec<u8>> {
        self.require_trained()?;
        self.check_dim(v)?;
        let max_q = self.max_quant_value();
        let codes: Vec<u8> = (0..self.dimension)
            .map(|d| {
                let q = ((v[d] - self.min[d]) / self.scale[d]).round();
                q.clamp(0.0, max_q) as u8
            })
            .collect();
        Ok(if self.bits == 8 {
            codes
        } else {
            pack_nibbles(&codes)
        })
    }

    /// Reconstruct an approximate vector from a code.
    pub fn decode(&self, code: &[u8]) -> VectorResult<Vec<f32>> {
        self.require_trained()?;
        let codes = if self.bits == 8 {
            if code.len() != self.dimension {
                return Err(VectorError::Corrupt(format!("expected {} SQ8 bytes, got {}", self.dimension, code.len())));
            }
            code.to_vec()
        } else {
            unpack_nibbles(code, self.dimension)?
        };
        Ok((0..self.dimension).map(|d| self.min[d] + codes[d] as f32 * self.scale[d]).collect())
    }

    /// Distance between a raw query vector and a stored code, under the
    /// chosen metric, computed against the decoded approximation.
    pub fn distance(&self, query: &[f32], code: &[u8], metric: Metric) -> VectorResult<f32> {
        self.check_dim(query)?;
        let decoded = self.decode(code)?;
        Ok(distance::distance(query, &decoded, metric))
    }

    fn require_trained(&self) -> VectorResult<()> {
        if !self.trained {
            return Err(VectorError::NotTrained);
        }
        Ok(())
    }

    fn check_dim(&self, v: &[f32]) -> VectorResult<()> {
        if v.len() != self.dimension {
            return Err(VectorError::DimensionMismatch { expected: self.dimension, got: v.len() });
        }
        Ok(())
    }

    /// Serialize with the `SQ01` magic (spec.md §3 "Vector codebook").
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.push(self.bits);
        out.push(self.trained as u8);
        if self.trained {
            for d in 0..self.dimension {
                out.extend_from_slice(&self.min[d].to_le_bytes());
                out.extend_from_slice(&self.max[d].to_le_bytes());
                out.extend_from_slice(&self.scale[d].to_le_bytes());
            }
        }
        out
    }

    /// Parse bytes previously produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> VectorResult<Self> {
        const HEADER_LEN: usize = 4 + 4 + 1 + 1;
        if bytes.len() < HEADER_LEN {
            return Err(VectorError::Corrupt("truncated SQ codebook header".into()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(VectorError::Corrupt("bad SQ magic".into()));
        }
        let dimension = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let bits = bytes[8];
        let trained = bytes[9] != 0;
        if bits != 4 && bits != 8 {
            return Err(VectorError::Corrupt("invalid SQ bit width in codebook".into()));
        }
        let mut sq = ScalarQuantizer { dimension, bits, min: Vec::new(), max: Vec::new(), scale: Vec::new(), trained: false };
        if trained {
            if bytes.len() != HEADER_LEN + dimension * 12 {
                return Err(VectorError::Corrupt("SQ codebook length mismatch".into()));
            }
            let mut pos = HEADER_LEN;
            let mut read_f32 = |pos: &mut usize| {
                let f = f32::from_le_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
                *pos += 4;
                f
            };
            let (mut min, mut max, mut scale) = (Vec::with_capacity(dimension), Vec::with_capacity(dimension), Vec::with_capacity(dimension));
            for _ in 0..dimension {
                min.push(read_f32(&mut pos));
                max.push(read_f32(&mut pos));
                scale.push(read_f32(&mut pos));
            }
            sq.min = min;
            sq.max = max;
            sq.scale = scale;
            sq.trained = true;
        }
        Ok(sq)
    }
}

fn pack_nibbles(codes: &[u8]) -> Vec<u8> {
    codes
        .chunks(2)
        .map(|pair| {
            let lo = pair[0] & 0x0F;
            let hi = pair.get(1).copied().unwrap_or(0) & 0x0F;
            lo | (hi << 4)
        })
        .collect()
}

fn unpack_nibbles(packed: &[u8], dimension: usize) -> VectorResult<Vec<u8>> {
    let expected_bytes = (dimension + 1) / 2;
    if packed.len() != expected_bytes {
        return Err(VectorError::Corrupt(format!("expected {expected_bytes} SQ4 bytes, got {}", packed.len())));
    }
    let mut out = Vec::with_capacity(dimension);
    for &byte in packed {
        out.push(byte & 0x0F);
        out.push((byte >> 4) & 0x0F);
    }
    out.truncate(dimension);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_bit_width() {
        assert!(ScalarQuantizer::new(4, 5).is_err());
    }

    #[test]
    fn encode_decode_round_trip_is_close_8bit() {
        let mut sq = ScalarQuantizer::new(3, 8).unwrap();
        sq.train(&[vec![0.0, -5.0, 100.0], vec![10.0, 5.0, 0.0]]).unwrap();

        let v = vec![5.0, 0.0, 50.0];
        let code = sq.encode(&v).unwrap();
        let decoded = sq.decode(&code).unwrap();
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1.0, "expected {a} close to {b}");
        }
    }

    #[test]
    fn nibble_packing_round_trips_4bit() {
        let mut sq = ScalarQuantizer::new(5, 4).unwrap();
        sq.train(&[vec![0.0; 5], vec![15.0; 5]]).unwrap();

        let v = vec![3.0, 15.0, 0.0, 7.5, 11.0];
        let code = sq.encode(&v).unwrap();
        assert_eq!(code.len(), 3); // ceil(5/2)
        let decoded = sq.decode(&code).unwrap();
        assert_eq!(decoded.len(), 5);
    }

    #[test]
    fn degenerate_constant_dimension_does_not_panic() {
        let mut sq = ScalarQuantizer::new(2, 8).unwrap();
        sq.train(&[vec![1.0, 1.0], vec![1.0, 1.0]]).unwrap();
        let code = sq.encode(&[1.0, 1.0]).unwrap();
        let decoded = sq.decode(&code).unwrap();
        assert_eq!(decoded, vec![1.0, 1.0]);
    }

    #[test]
    fn round_trip_serialization() {
        let mut sq = ScalarQuantizer::new(3, 8).unwrap();
        sq.train(&[vec![0.0, 0.0, 0.0], vec![1.0, 2.0, 3.0]]).unwrap();
        let bytes = sq.to_bytes();
        assert_eq!(&bytes[0..4], MAGIC);
        let reloaded = ScalarQuantizer::from_bytes(&bytes).unwrap();
        let v = vec![0.5, 1.0, 1.5];
        assert_eq!(sq.encode(&v).unwrap(), reloaded.encode(&v).unwrap());
    }

    #[test]
    fn dot_product_distance_is_negated() {
        let mut sq = ScalarQuantizer::new(2, 8).unwrap();
        sq.train(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let code = sq.encode(&[1.0, 1.0]).unwrap();
        let d = sq.distance(&[1.0, 1.0], &code, Metric::DotProduct).unwrap();
        assert!(d < 0.0);
    }
}
