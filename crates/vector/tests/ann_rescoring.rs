//! End-to-end PQ rescoring check: after training a product-quantized
//! codebook over a corpus of random embeddings, rescored search should
//! recover most of a query's true nearest neighbors.

use std::collections::HashSet;

use fusion_core::{FieldValue, PrimaryKey};
use fusion_index::IndexMaintainer;
use fusion_kv::{InMemoryKvStore, KvStore, KvTransaction, Subspace};
use fusion_vector::codebook::{CodebookTrainer, QuantizerKind, QuantizerParams};
use fusion_vector::distance::Metric;
use fusion_vector::flat::{FlatMaintainer, VectorExtract};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

struct Embedding {
    id: i64,
    vector: Vec<f32>,
}

impl VectorExtract for Embedding {
    fn vector(&self) -> Vec<f32> {
        self.vector.clone()
    }

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::single(FieldValue::Int64(self.id))
    }
}

fn random_vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn id_of(pk: &PrimaryKey) -> i64 {
    match &pk.components()[0] {
        FieldValue::Int64(n) => *n,
        _ => panic!("expected an int64 primary key"),
    }
}

#[test]
fn pq_rescored_search_recalls_most_of_exact_top_k() {
    const DIM: usize = 24;
    const COUNT: usize = 1_500;
    const M: usize = 6;
    const K: usize = 32;

    let mut rng = StdRng::seed_from_u64(4242);
    let corpus: Vec<Embedding> = (0..COUNT).map(|i| Embedding { id: i as i64, vector: random_vector(&mut rng, DIM) }).collect();

    let subspace = Subspace::root().child(FieldValue::String("embeddings".into()));
    let store = InMemoryKvStore::new();

    let exact = FlatMaintainer::new(subspace.clone(), DIM, Metric::Euclidean, None);
    let mut txn = store.begin();
    for e in &corpus {
        exact.update(&mut txn, &subspace, &e.primary_key(), None, Some(e)).unwrap();
    }
    txn.commit().unwrap();

    let meta_subspace = subspace.child(FieldValue::String("_meta".into()));
    let mut txn = store.begin();
    let codebook = CodebookTrainer::new(COUNT, 99)
        .train_and_persist(&mut txn, exact.vectors_subspace(), &meta_subspace, DIM, QuantizerKind::Pq, QuantizerParams::Pq { m: M, k: K })
        .unwrap();
    txn.commit().unwrap();

    let quantized = FlatMaintainer::new(subspace.clone(), DIM, Metric::Euclidean, Some(codebook));
    let mut txn = store.begin();
    for e in &corpus {
        quantized.update(&mut txn, &subspace, &e.primary_key(), None, Some(e)).unwrap();
    }
    txn.commit().unwrap();

    let query = random_vector(&mut rng, DIM);

    let mut txn = store.begin();
    let exact_top10: HashSet<i64> = exact.search(&mut txn, &query, 10).unwrap().into_iter().map(|(pk, _)| id_of(&pk)).collect();
    let rescored_top10: HashSet<i64> = quantized.search_rescored(&mut txn, &query, 10, 6.0).unwrap().into_iter().map(|(pk, _)| id_of(&pk)).collect();

    let overlap = exact_top10.intersection(&rescored_top10).count();
    assert!(overlap >= 8, "expected recall@10 >= 0.8, got {overlap}/10 overlapping neighbors");
}
