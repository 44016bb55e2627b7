//! Reservoir-sampling codebook trainer and persistence (spec.md §4.7
//! "Codebook trainer", §3 "Vector codebook").
//!
//! A codebook is trained once, offline relative to normal writes, from a
//! sample of the vectors already stored in an index's `vectors` subspace,
//! then persisted so every subsequent encode uses the same centroids/
//! thresholds until retrained.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fusion_kv::{KvTransaction, Subspace};

use crate::bq::BinaryQuantizer;
use crate::distance::Metric;
use crate::error::{VectorError, VectorResult};
use crate::pq::{PqQuery, ProductQuantizer};
use crate::sq::ScalarQuantizer;
use crate::vecbytes::decode_vector;

/// Which quantizer family a codebook trains and persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizerKind {
    /// Product quantization.
    Pq,
    /// Scalar quantization.
    Sq,
    /// Binary quantization.
    Bq,
}

impl QuantizerKind {
    /// The subspace path segment this kind persists under
    /// (`index/_meta/codebook/<segment>`).
    pub fn as_str(self) -> &'static str {
        match self {
            QuantizerKind::Pq => "pq",
            QuantizerKind::Sq => "sq",
            QuantizerKind::Bq => "bq",
        }
    }
}

/// Construction parameters for a freshly trained quantizer of a given kind.
#[derive(Debug, Clone, Copy)]
pub enum QuantizerParams {
    /// Product quantization: `m` subspaces, `k` centroids each.
    Pq {
        /// Number of subspaces the full vector is split into.
        m: usize,
        /// Centroids trained per subspace.
        k: usize,
    },
    /// Scalar quantization: 4 or 8 bit codes.
    Sq {
        /// Code width in bits; must be 4 or 8.
        bits: u8,
    },
    /// Binary quantization (sign/median threshold, no extra parameters).
    Bq,
}

/// A trained quantizer, tagged by kind so it can be dispatched without the
/// caller holding onto a concrete type.
pub enum Codebook {
    /// A trained product quantizer.
    Pq(ProductQuantizer),
    /// A trained scalar quantizer.
    Sq(ScalarQuantizer),
    /// A trained binary quantizer.
    Bq(BinaryQuantizer),
}

impl Codebook {
    /// The kind this codebook was trained as.
    pub fn kind(&self) -> QuantizerKind {
        match self {
            Codebook::Pq(_) => QuantizerKind::Pq,
            Codebook::Sq(_) => QuantizerKind::Sq,
            Codebook::Bq(_) => QuantizerKind::Bq,
        }
    }

    /// Encode a raw vector with whichever quantizer this codebook wraps.
    pub fn encode(&self, v: &[f32]) -> VectorResult<Vec<u8>> {
        match self {
            Codebook::Pq(q) => q.encode(v),
            Codebook::Sq(q) => q.encode(v),
            Codebook::Bq(q) => q.encode_bytes(v),
        }
    }

    /// Serialize with this quantizer's own magic-prefixed format.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Codebook::Pq(q) => q.to_bytes(),
            Codebook::Sq(q) => q.to_bytes(),
            Codebook::Bq(q) => q.to_bytes(),
        }
    }

    /// Parse bytes previously produced by [`Self::to_bytes`] as `kind`.
    pub fn from_bytes(kind: QuantizerKind, bytes: &[u8]) -> VectorResult<Self> {
        Ok(match kind {
            QuantizerKind::Pq => Codebook::Pq(ProductQuantizer::from_bytes(bytes)?),
            QuantizerKind::Sq => Codebook::Sq(ScalarQuantizer::from_bytes(bytes)?),
            QuantizerKind::Bq => Codebook::Bq(BinaryQuantizer::from_bytes(bytes)?),
        })
    }

    /// Precompute whatever per-query state this quantizer's [`Self::distance_prepared`]
    /// needs, once per search rather than once per candidate.
    pub fn prepare<'q>(&self, query: &'q [f32], metric: Metric) -> VectorResult<PreparedQuery<'q>> {
        Ok(match self {
            Codebook::Pq(q) => PreparedQuery::Pq(q.prepare_query(query)?),
            Codebook::Sq(_) => PreparedQuery::Sq(query, metric),
            Codebook::Bq(q) => PreparedQuery::Bq(q.encode_bytes(query)?),
        })
    }

    /// Distance from a prepared query to a stored code. `prepared` must have
    /// come from [`Self::prepare`] on this same codebook.
    pub fn distance_prepared(&self, prepared: &PreparedQuery, code: &[u8]) -> VectorResult<f32> {
        match (self, prepared) {
            (Codebook::Pq(q), PreparedQuery::Pq(pq)) => q.distance(pq, code),
            (Codebook::Sq(q), PreparedQuery::Sq(query, metric)) => q.distance(query, code, *metric),
            (Codebook::Bq(q), PreparedQuery::Bq(qcode)) => Ok(q.distance_bytes(qcode, code)? as f32),
            _ => Err(VectorError::InvalidConfig("prepared query does not match this codebook's kind".into())),
        }
    }
}

/// Per-query state precomputed by [`Codebook::prepare`], kind-matched to the
/// codebook it was prepared from.
pub enum PreparedQuery<'q> {
    /// PQ's `M×K` asymmetric-distance tables.
    Pq(PqQuery),
    /// SQ decodes per candidate, so this just carries the raw query through.
    Sq(&'q [f32], Metric),
    /// The query's own BQ code, compared by Hamming distance.
    Bq(Vec<u8>),
}

/// Reservoir-samples vectors from a `vectors` subspace and trains a
/// codebook, then persists it under `meta_subspace` keyed by `kind`.
pub struct CodebookTrainer {
    sample_size: usize,
    seed: u64,
}

impl CodebookTrainer {
    /// Train from at most `sample_size` reservoir-sampled vectors, using
    /// `seed` for both the sample and any quantizer-internal randomness
    /// (e.g. PQ's k-means++ init).
    pub fn new(sample_size: usize, seed: u64) -> Self {
        CodebookTrainer { sample_size, seed }
    }

    /// Scan `vectors_subspace` in a single transaction, reservoir-sample up
    /// to `sample_size` rows (Vitter's Algorithm R), train a quantizer of
    /// `kind`/`params`/`dimension`, and persist it under `meta_subspace`.
    pub fn train_and_persist<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        vectors_subspace: &Subspace,
        meta_subspace: &Subspace,
        dimension: usize,
        kind: QuantizerKind,
        params: QuantizerParams,
    ) -> VectorResult<Codebook> {
        let sample = self.reservoir_sample(txn, vectors_subspace)?;
        let codebook = self.train(dimension, kind, params, &sample)?;
        self.persist(txn, meta_subspace, kind, &codebook);
        Ok(codebook)
    }

    /// Load a previously persisted codebook, validating it against the
    /// live descriptor's dimension.
    pub fn load<Tx: KvTransaction>(txn: &mut Tx, meta_subspace: &Subspace, kind: QuantizerKind, dimension: usize) -> VectorResult<Option<Codebook>> {
        let key = Self::meta_key(meta_subspace, kind);
        let Some(bytes) = txn.get(&key, true)? else {
            return Ok(None);
        };
        let codebook = Codebook::from_bytes(kind, &bytes)?;
        let actual_dim = match &codebook {
            Codebook::Pq(q) => q.dimension(),
            Codebook::Sq(q) => q.dimension(),
            Codebook::Bq(q) => q.dimension(),
        };
        if actual_dim != dimension {
            return Err(VectorError::Corrupt(format!("codebook dimension {actual_dim} does not match index dimension {dimension}")));
        }
        Ok(Some(codebook))
    }

    fn reservoir_sample<Tx: KvTransaction>(&self, txn: &mut Tx, vectors_subspace: &Subspace) -> VectorResult<Vec<Vec<f32>>> {
        let (begin, end) = vectors_subspace.range();
        let rows = txn.get_range(&begin, &end, true, None)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut reservoir: Vec<Vec<f32>> = Vec::with_capacity(self.sample_size);
        for (i, (_, value)) in rows.into_iter().enumerate() {
            let v = decode_vector(&value)?;
            if reservoir.len() < self.sample_size {
                reservoir.push(v);
            } else if self.sample_size > 0 {
                let j = rng.gen_range(0..=i);
                if j < self.sample_size {
                    reservoir[j] = v;
                }
            }
        }
        Ok(reservoir)
    }

    fn train(&self, dimension: usize, kind: QuantizerKind, params: QuantizerParams, sample: &[Vec<f32>]) -> VectorResult<Codebook> {
        match (kind, params) {
            (QuantizerKind::Pq, QuantizerParams::Pq { m, k }) => {
                let mut q = ProductQuantizer::new(dimension, m, k)?;
                q.train(sample, self.seed)?;
                Ok(Codebook::Pq(q))
            }
            (QuantizerKind::Sq, QuantizerParams::Sq { bits }) => {
                let mut q = ScalarQuantizer::new(dimension, bits)?;
                q.train(sample)?;
                Ok(Codebook::Sq(q))
            }
            (QuantizerKind::Bq, QuantizerParams::Bq) => {
                let mut q = BinaryQuantizer::new(dimension);
                q.train(sample)?;
                Ok(Codebook::Bq(q))
            }
            _ => Err(VectorError::InvalidConfig("quantizer kind and parameters don't match".into())),
        }
    }

    fn persist<Tx: KvTransaction>(&self, txn: &mut Tx, meta_subspace: &Subspace, kind: QuantizerKind, codebook: &Codebook) {
        let key = Self::meta_key(meta_subspace, kind);
        txn.set(&key, &codebook.to_bytes());
    }

    fn meta_key(meta_subspace: &Subspace, kind: QuantizerKind) -> Vec<u8> {
        use fusion_core::FieldValue;
        meta_subspace.child(FieldValue::String(kind.as_str().into())).bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::FieldValue;
    use fusion_kv::{InMemoryKvStore, KvStore};

    fn write_vector<Tx: KvTransaction>(txn: &mut Tx, subspace: &Subspace, id: i64, v: &[f32]) {
        let key = subspace.pack(&[FieldValue::Int64(id)]);
        txn.set(&key, &crate::vecbytes::encode_vector(v));
    }

    #[test]
    fn trains_and_persists_sq_codebook() {
        let store = InMemoryKvStore::new();
        let vectors_subspace = Subspace::root().child(FieldValue::String("vectors".into()));
        let meta_subspace = Subspace::root().child(FieldValue::String("meta".into()));

        let mut txn = store.begin();
        for i in 0..20 {
            write_vector(&mut txn, &vectors_subspace, i, &[i as f32, (i * 2) as f32]);
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let trainer = CodebookTrainer::new(10, 42);
        let codebook = trainer
            .train_and_persist(&mut txn, &vectors_subspace, &meta_subspace, 2, QuantizerKind::Sq, QuantizerParams::Sq { bits: 8 })
            .unwrap();
        txn.commit().unwrap();
        assert!(matches!(codebook, Codebook::Sq(_)));

        let mut txn = store.begin();
        let reloaded = CodebookTrainer::load(&mut txn, &meta_subspace, QuantizerKind::Sq, 2).unwrap();
        assert!(reloaded.is_some());
    }

    #[test]
    fn load_returns_none_when_untrained() {
        let store = InMemoryKvStore::new();
        let meta_subspace = Subspace::root().child(FieldValue::String("meta".into()));
        let mut txn = store.begin();
        let reloaded = CodebookTrainer::load(&mut txn, &meta_subspace, QuantizerKind::Pq, 4).unwrap();
        assert!(reloaded.is_none());
    }

    #[test]
    fn dimension_mismatch_on_reload_is_rejected() {
        let store = InMemoryKvStore::new();
        let vectors_subspace = Subspace::root().child(FieldValue::String("vectors".into()));
        let meta_subspace = Subspace::root().child(FieldValue::String("meta".into()));

        let mut txn = store.begin();
        for i in 0..5 {
            write_vector(&mut txn, &vectors_subspace, i, &[i as f32, i as f32]);
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let trainer = CodebookTrainer::new(5, 7);
        trainer
            .train_and_persist(&mut txn, &vectors_subspace, &meta_subspace, 2, QuantizerKind::Bq, QuantizerParams::Bq)
            .unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        let result = CodebookTrainer::load(&mut txn, &meta_subspace, QuantizerKind::Bq, 99);
        assert!(result.is_err());
    }

    #[test]
    fn reservoir_sample_never_exceeds_sample_size() {
        let store = InMemoryKvStore::new();
        let vectors_subspace = Subspace::root().child(FieldValue::String("vectors".into()));

        let mut txn = store.begin();
        for i in 0..100 {
            write_vector(&mut txn, &vectors_subspace, i, &[i as f32]);
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let trainer = CodebookTrainer::new(10, 1);
        let sample = trainer.reservoir_sample(&mut txn, &vectors_subspace).unwrap();
        assert_eq!(sample.len(), 10);
    }
}
