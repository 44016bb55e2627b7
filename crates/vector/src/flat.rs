//! Flat KNN index maintainer: stores every vector (and, once a codebook is
//! trained, its quantized code) and answers top-`k` queries by scanning
//! through a bounded [`TopKHeap`] (spec.md §4.3 "Vector flat"/"Vector PQ").

use fusion_core::{FieldValue, PrimaryKey};
use fusion_index::{IndexEntry, IndexMaintainer, IndexResult};
use fusion_kv::{KvTransaction, Subspace};

use crate::codebook::Codebook;
use crate::distance::{self, Metric};
use crate::error::{VectorError, VectorResult};
use crate::heap::TopKHeap;
use crate::vecbytes::{decode_vector, encode_vector};

/// An item a [`FlatMaintainer`] can index: whatever embedding a record
/// carries, plus its primary key.
pub trait VectorExtract {
    /// The item's embedding.
    fn vector(&self) -> Vec<f32>;
    /// The item's own primary key.
    fn primary_key(&self) -> PrimaryKey;
}

/// Maintains a flat (non-graph) vector index: every item's raw vector under
/// a `vectors` subspace, and, once `codebook` is `Some`, its quantized code
/// under a `codes` subspace (spec.md §4.3, §4.7).
pub struct FlatMaintainer {
    dimension: usize,
    metric: Metric,
    vectors: Subspace,
    codes: Subspace,
    codebook: Option<Codebook>,
}

impl FlatMaintainer {
    /// Build a maintainer rooted at `subspace`, indexing `dimension`-length
    /// vectors under `metric`. Pass `codebook = None` for exact (unquantized)
    /// search; once a codebook is trained, reconstruct with `Some` so new
    /// writes start encoding compressed codes too.
    pub fn new(subspace: Subspace, dimension: usize, metric: Metric, codebook: Option<Codebook>) -> Self {
        FlatMaintainer {
            dimension,
            metric,
            vectors: subspace.child(FieldValue::String("vectors".into())),
            codes: subspace.child(FieldValue::String("codes".into())),
            codebook,
        }
    }

    /// The `vectors` subspace, for the codebook trainer's reservoir scan.
    pub fn vectors_subspace(&self) -> &Subspace {
        &self.vectors
    }

    /// The `codes` subspace, for direct inspection/debugging.
    pub fn codes_subspace(&self) -> &Subspace {
        &self.codes
    }

    fn vector_key(&self, pk: &PrimaryKey) -> Vec<u8> {
        self.vectors.pack(pk.components())
    }

    fn code_key(&self, pk: &PrimaryKey) -> Vec<u8> {
        self.codes.pack(pk.components())
    }

    fn pk_from_key(subspace: &Subspace, key: &[u8]) -> VectorResult<PrimaryKey> {
        let components = subspace
            .unpack(key)
            .ok_or_else(|| VectorError::Corrupt("could not unpack a primary key from a stored vector key".into()))?;
        Ok(PrimaryKey::new(components))
    }

    /// Exact or quantized top-`k` nearest neighbors of `query`, depending on
    /// whether a codebook is configured.
    pub fn search<Tx: KvTransaction>(&self, txn: &mut Tx, query: &[f32], k: usize) -> VectorResult<Vec<(PrimaryKey, f32)>> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch { expected: self.dimension, got: query.len() });
        }
        let mut heap = TopKHeap::new(k);
        match &self.codebook {
            Some(codebook) => {
                let prepared = codebook.prepare(query, self.metric)?;
                let (begin, end) = self.codes.range();
                for (key, code) in txn.get_range(&begin, &end, true, None)? {
                    let pk = Self::pk_from_key(&self.codes, &key)?;
                    let d = codebook.distance_prepared(&prepared, &code)?;
                    heap.offer(pk, d);
                }
            }
            None => {
                let (begin, end) = self.vectors.range();
                for (key, value) in txn.get_range(&begin, &end, true, None)? {
                    let pk = Self::pk_from_key(&self.vectors, &key)?;
                    let v = decode_vector(&value)?;
                    heap.offer(pk, distance::distance(query, &v, self.metric));
                }
            }
        }
        Ok(heap.into_sorted())
    }

    /// Search with lossy-quantization rescoring (spec.md §4.7 "BQ"): collect
    /// `k * rescoring_factor` candidates through [`Self::search`] (quantized
    /// if a codebook is set, exact otherwise), then re-rank the candidates by
    /// exact distance over their original stored vectors.
    pub fn search_rescored<Tx: KvTransaction>(&self, txn: &mut Tx, query: &[f32], k: usize, rescoring_factor: f32) -> VectorResult<Vec<(PrimaryKey, f32)>> {
        let candidate_k = ((k as f32) * rescoring_factor).ceil() as usize;
        let candidates = self.search(txn, query, candidate_k.max(k))?;
        let mut heap = TopKHeap::new(k);
        for (pk, _) in candidates {
            if let Some(bytes) = txn.get(&self.vector_key(&pk), true)? {
                let v = decode_vector(&bytes)?;
                heap.offer(pk, distance::distance(query, &v, self.metric));
            }
        }
        Ok(heap.into_sorted())
    }
}

impl<Item: VectorExtract> IndexMaintainer<Item> for FlatMaintainer {
    fn index_keys(&self, item: &Item) -> Vec<IndexEntry> {
        let primary_key = item.primary_key();
        vec![IndexEntry {
            value_key: primary_key.components().to_vec(),
            primary_key,
        }]
    }

    fn update<Tx: KvTransaction>(
        &self,
        txn: &mut Tx,
        _subspace: &Subspace,
        _primary_key: &PrimaryKey,
        old_item: Option<&Item>,
        new_item: Option<&Item>,
    ) -> IndexResult<()> {
        if let Some(old) = old_item {
            let pk = old.primary_key();
            txn.clear(&self.vector_key(&pk));
            txn.clear(&self.code_key(&pk));
        }
        if let Some(new) = new_item {
            let pk = new.primary_key();
            let v = new.vector();
            txn.set(&self.vector_key(&pk), &encode_vector(&v));
            if let Some(codebook) = &self.codebook {
                match codebook.encode(&v) {
                    Ok(code) => txn.set(&self.code_key(&pk), &code),
                    Err(err) => tracing::warn!(%err, "skipping vector code write; codebook rejected this vector"),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::{CodebookTrainer, QuantizerKind, QuantizerParams};
    use fusion_kv::{InMemoryKvStore, KvStore};

    struct Doc {
        pk: i64,
        embedding: Vec<f32>,
    }

    impl VectorExtract for Doc {
        fn vector(&self) -> Vec<f32> {
            self.embedding.clone()
        }

        fn primary_key(&self) -> PrimaryKey {
            PrimaryKey::single(FieldValue::Int64(self.pk))
        }
    }

    #[test]
    fn exact_search_returns_nearest_first() {
        let subspace = Subspace::root().child(FieldValue::String("docs".into()));
        let maintainer = FlatMaintainer::new(subspace.clone(), 2, Metric::Euclidean, None);
        let store = InMemoryKvStore::new();

        let docs = vec![
            Doc { pk: 1, embedding: vec![0.0, 0.0] },
            Doc { pk: 2, embedding: vec![10.0, 10.0] },
            Doc { pk: 3, embedding: vec![1.0, 1.0] },
        ];

        let mut txn = store.begin();
        for d in &docs {
            maintainer.update(&mut txn, &subspace, &d.primary_key(), None, Some(d)).unwrap();
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = maintainer.search(&mut txn, &[0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, PrimaryKey::single(FieldValue::Int64(1)));
        assert_eq!(results[1].0, PrimaryKey::single(FieldValue::Int64(3)));
    }

    #[test]
    fn update_clears_old_vector_and_code() {
        let subspace = Subspace::root().child(FieldValue::String("docs".into()));
        let maintainer = FlatMaintainer::new(subspace.clone(), 2, Metric::Euclidean, None);
        let store = InMemoryKvStore::new();

        let doc = Doc { pk: 1, embedding: vec![1.0, 1.0] };
        let mut txn = store.begin();
        maintainer.update(&mut txn, &subspace, &doc.primary_key(), None, Some(&doc)).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        maintainer.update(&mut txn, &subspace, &doc.primary_key(), Some(&doc), None).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = maintainer.search(&mut txn, &[1.0, 1.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn quantized_search_uses_trained_codebook() {
        let subspace = Subspace::root().child(FieldValue::String("docs".into()));
        let store = InMemoryKvStore::new();

        let docs: Vec<Doc> = (0..40)
            .map(|i| Doc {
                pk: i,
                embedding: if i < 20 { vec![0.0, 0.0] } else { vec![50.0, 50.0] },
            })
            .collect();

        let bootstrap = FlatMaintainer::new(subspace.clone(), 2, Metric::Euclidean, None);
        let mut txn = store.begin();
        for d in &docs {
            bootstrap.update(&mut txn, &subspace, &d.primary_key(), None, Some(d)).unwrap();
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let meta_subspace = subspace.child(FieldValue::String("_meta".into()));
        let codebook = CodebookTrainer::new(40, 9)
            .train_and_persist(
                &mut txn,
                bootstrap.vectors_subspace(),
                &meta_subspace,
                2,
                QuantizerKind::Sq,
                QuantizerParams::Sq { bits: 8 },
            )
            .unwrap();
        txn.commit().unwrap();

        let quantized = FlatMaintainer::new(subspace.clone(), 2, Metric::Euclidean, Some(codebook));
        let mut txn = store.begin();
        for d in &docs {
            quantized.update(&mut txn, &subspace, &d.primary_key(), None, Some(d)).unwrap();
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = quantized.search(&mut txn, &[1.0, 1.0], 5).unwrap();
        assert_eq!(results.len(), 5);
        for (pk, _) in &results {
            let id = match &pk.components()[0] {
                FieldValue::Int64(n) => *n,
                _ => panic!("expected an int64 primary key"),
            };
            assert!(id < 20, "expected a near-cluster id, got {id}");
        }
    }

    #[test]
    fn rescored_search_reranks_by_exact_distance() {
        let subspace = Subspace::root().child(FieldValue::String("docs".into()));
        let maintainer = FlatMaintainer::new(subspace.clone(), 1, Metric::Euclidean, None);
        let store = InMemoryKvStore::new();

        let docs = vec![
            Doc { pk: 1, embedding: vec![0.0] },
            Doc { pk: 2, embedding: vec![1.0] },
            Doc { pk: 3, embedding: vec![2.0] },
        ];
        let mut txn = store.begin();
        for d in &docs {
            maintainer.update(&mut txn, &subspace, &d.primary_key(), None, Some(d)).unwrap();
        }
        txn.commit().unwrap();

        let mut txn = store.begin();
        let results = maintainer.search_rescored(&mut txn, &[0.0], 1, 3.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, PrimaryKey::single(FieldValue::Int64(1)));
    }
}
