//! Product quantization: per-subspace k-means codebooks and asymmetric
//! distance computation (spec.md §4.7 "PQ").

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::distance::squared_euclidean;
use crate::error::{VectorError, VectorResult};

const MAGIC: &[u8; 4] = b"PQ02";
const KMEANS_ITERATIONS: usize = 25;
/// Guards zero-range degeneracies in k-means++ sampling weights and the
/// Lloyd-iteration convergence check.
const KMEANS_TOLERANCE: f32 = 1e-10;

/// A trained (or untrained) product quantizer over `D`-dimensional vectors,
/// split into `M` subspaces of `D/M` dimensions each with a `K`-centroid
/// codebook per subspace.
pub struct ProductQuantizer {
    dimension: usize,
    m: usize,
    k: usize,
    sub_dim: usize,
    /// `centroids[s * k + c]`: the `c`-th centroid of the `s`-th subspace.
    centroids: Vec<Vec<f32>>,
    trained: bool,
}

/// Precomputed `M×K` squared-distance tables for one query vector (ADC:
/// Asymmetric Distance Computation).
pub struct PqQuery {
    tables: Vec<Vec<f32>>,
}

impl ProductQuantizer {
    /// Construct an untrained quantizer. `dimension % m == 0` and
    /// `1 <= k <= 256` (a centroid index must fit in one byte).
    pub fn new(dimension: usize, m: usize, k: usize) -> VectorResult<Self> {
        if m == 0 || dimension % m != 0 {
            return Err(VectorError::InvalidConfig(format!("dimension {dimension} is not divisible by m {m}")));
        }
        if k == 0 || k > 256 {
            return Err(VectorError::InvalidConfig(format!("k must be in 1..=256 for a one-byte code, got {k}")));
        }
        Ok(ProductQuantizer { dimension, m, k, sub_dim: dimension / m, centroids: Vec::new(), trained: false })
    }

    /// The configured full vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether `train` has been called successfully.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Train one k-means codebook per subspace from a sample of full
    /// `dimension`-length vectors. `seed` makes training deterministic.
    pub fn train(&mut self, vectors: &[Vec<f32>], seed: u64) -> VectorResult<()> {
        if vectors.len() < self.k {
            return Err(VectorError::InvalidConfig(format!(
                "need at least k={} training vectors, got {}",
                self.k,
                vectors.len()
            )));
        }
        for v in vectors {
            if v.len() != self.dimension {
                return Err(VectorError::DimensionMismatch { expected: self.dimension, got: v.len() });
            }
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut centroids = Vec::with_capacity(self.m * self.k);
        for s in 0..self.m {
            let sub_samples: Vec<&[f32]> = vectors.iter().map(|v| &v[s * self.sub_dim..(s + 1) * self.sub_dim]).collect();
            centroids.extend(kmeans(&sub_samples, self.k, KMEANS_ITERATIONS, &mut rng));
        }
        self.centroids = centroids;
        self.trained = true;
        Ok(())
    }

    /// Encode a full vector as `M` centroid-index bytes.
    pub fn encode(&self, v: &[f32]) -> VectorResult<Vec<u8>> {
        self.require_trained()?;
        self.check_dim(v)?;
        Ok((0..self.m)
            .map(|s| self.nearest_centroid(s, &v[s * self.sub_dim..(s + 1) * self.sub_dim]) as u8)
            .collect())
    }

    /// Reconstruct an approximate vector from a code: the concatenation of
    /// each subspace's assigned centroid.
    pub fn decode(&self, code: &[u8]) -> VectorResult<Vec<f32>> {
        self.require_trained()?;
        self.check_code_len(code)?;
        let mut out = Vec::with_capacity(self.dimension);
        for (s, &c) in code.iter().enumerate() {
            out.extend_from_slice(&self.centroids[s * self.k + c as usize]);
        }
        Ok(out)
    }

    /// Precompute the `M×K` squared-distance tables used by [`Self::distance`].
    pub fn prepare_query(&self, q: &[f32]) -> VectorResult<PqQuery> {
        self.require_trained()?;
        self.check_dim(q)?;
        let tables = (0..self.m)
            .map(|s| {
                let sub = &q[s * self.sub_dim..(s + 1) * self.sub_dim];
                (0..self.k).map(|c| squared_euclidean(sub, &self.centroids[s * self.k + c])).collect()
            })
            .collect();
        Ok(PqQuery { tables })
    }

    /// Asymmetric distance between a prepared query and a stored code: sum
    /// the `M` table lookups the code's indices select, then take the
    /// square root.
    pub fn distance(&self, query: &PqQuery, code: &[u8]) -> VectorResult<f32> {
        self.require_trained()?;
        self.check_code_len(code)?;
        let sum: f32 = code.iter().enumerate().map(|(s, &c)| query.tables[s][c as usize]).sum();
        Ok(sum.sqrt())
    }

    fn nearest_centroid(&self, s: usize, sub: &[f32]) -> usize {
        (0..self.k)
            .map(|c| (c, squared_euclidean(sub, &self.centroids[s * self.k + c])))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
            .map(|(c, _)| c)
            .unwrap_or(0)
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

    fn check_code_len(&self, code: &[u8]) -> VectorResult<()> {
        if code.len() != self.m {
            return Err(VectorError::Corrupt(format!("expected a {}-byte PQ code, got {}", self.m, code.len())));
        }
        Ok(())
    }

    /// Serialize with the `PQ02` magic (spec.md §3 "Vector codebook").
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        out.extend_from_slice(&(self.m as u32).to_le_bytes());
        out.extend_from_slice(&(self.k as u32).to_le_bytes());
        out.push(self.trained as u8);
        if self.trained {
            for row in &self.centroids {
                for &f in row {
                    out.extend_from_slice(&f.to_le_bytes());
                }
            }
        }
        out
    }

    /// Parse bytes previously produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> VectorResult<Self> {
        const HEADER_LEN: usize = 4 + 4 + 4 + 4 + 1;
        if bytes.len() < HEADER_LEN {
            return Err(VectorError::Corrupt("truncated PQ codebook header".into()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(VectorError::Corrupt("bad PQ magic".into()));
        }
        let dimension = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let m = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let k = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let trained = bytes[16] != 0;
        if m == 0 || dimension % m != 0 {
            return Err(VectorError::Corrupt("invalid PQ dimension/m in codebook".into()));
        }
        let sub_dim = dimension / m;
        let mut pq = ProductQuantizer { dimension, m, k, sub_dim, centroids: Vec::new(), trained: false };
        if trained {
            let expected_floats = m * k * sub_dim;
            if bytes.len() != HEADER_LEN + expected_floats * 4 {
                return Err(VectorError::Corrupt("PQ codebook length mismatch".into()));
            }
            let mut pos = HEADER_LEN;
            let mut centroids = Vec::with_capacity(m * k);
            for _ in 0..(m * k) {
                let mut row = Vec::with_capacity(sub_dim);
                for _ in 0..sub_dim {
                    row.push(f32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()));
                    pos += 4;
                }
                centroids.push(row);
            }
            pq.centroids = centroids;
            pq.trained = true;
        }
        Ok(pq)
    }
}

fn kmeans(samples: &[&[f32]], k: usize, iterations: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let dim = samples[0].len();
    let mut centroids = kmeans_pp_init(samples, k, rng);

    for _ in 0..iterations {
        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for &s in samples {
            let c = nearest(s, &centroids);
            counts[c] += 1;
            for (sum_d, &s_d) in sums[c].iter_mut().zip(s) {
                *sum_d += s_d;
            }
        }

        let mut shift = 0.0f32;
        for c in 0..k {
            let updated = if counts[c] == 0 {
                // Empty cluster: replace with a random sample vector rather
                // than leave a stale, unreachable centroid.
                samples[rng.gen_range(0..samples.len())].to_vec()
            } else {
                sums[c].iter().map(|&sum| sum / counts[c] as f32).collect()
            };
            shift += squared_euclidean(&centroids[c], &updated);
            centroids[c] = updated;
        }
        if shift < KMEANS_TOLERANCE {
            break;
        }
    }
    centroids
}

fn nearest(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    (0..centroids.len())
        .map(|c| (c, squared_euclidean(point, &centroids[c])))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(c, _)| c)
        .unwrap_or(0)
}

fn kmeans_pp_init(samples: &[&[f32]], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(samples[rng.gen_range(0..samples.len())].to_vec());

    while centroids.len() < k {
        let weights: Vec<f32> = samples
            .iter()
            .map(|s| centroids.iter().map(|c| squared_euclidean(s, c)).fold(f32::INFINITY, f32::min))
            .collect();
        let total: f32 = weights.iter().sum();
        let chosen = if total < KMEANS_TOLERANCE {
            // Every sample coincides with an existing centroid; fall back to
            // a uniform pick rather than divide by ~zero.
            rng.gen_range(0..samples.len())
        } else {
            let mut target = rng.gen::<f32>() * total;
            let mut chosen = samples.len() - 1;
            for (i, &w) in weights.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(samples[chosen].to_vec());
    }
    centroids
}
