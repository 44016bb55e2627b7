//! Bounded max-heap of `(pk, distance)` for exact KNN (spec.md §4.7 "Flat
//! maintainer"). The heap's root is always the *worst* (largest-distance)
//! candidate accepted so far, so both the "is it full" check and eviction on
//! a better candidate are `O(log k)`; this bounds the maintainer to
//! `O(N log k)` time and `O(k)` peak memory over an `N`-row scan.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fusion_core::PrimaryKey;
use fusion_kv::tuple;

/// One accepted candidate. Ordered by distance descending (worst on top),
/// with a byte-wise primary-key tie-break so results are deterministic
/// across runs when distances collide exactly.
#[derive(Debug, Clone)]
struct Candidate {
    distance: f32,
    pk_bytes: Vec<u8>,
    pk: PrimaryKey,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Natural ordering: larger distance = Greater, so BinaryHeap<Candidate>
        // is a max-heap that always surfaces the worst accepted candidate.
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.pk_bytes.cmp(&other.pk_bytes))
    }
}

/// Bounded top-`k` collector: accepts candidates in any order, retains only
/// the `k` closest by distance.
pub struct TopKHeap {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopKHeap {
    /// Create a collector that retains at most `k` candidates.
    pub fn new(k: usize) -> Self {
        TopKHeap { k, heap: BinaryHeap::with_capacity(k) }
    }

    /// Offer a candidate. Accepted if the heap isn't full yet, or if
    /// `distance` beats the current worst accepted distance.
    pub fn offer(&mut self, pk: PrimaryKey, distance: f32) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.push(pk, distance);
            return;
        }
        if distance < self.heap.peek().expect("heap is full").distance {
            self.push(pk, distance);
            self.heap.pop();
        }
    }

    fn push(&mut self, pk: PrimaryKey, distance: f32) {
        let pk_bytes = tuple::pack(pk.components());
        self.heap.push(Candidate { distance, pk_bytes, pk });
    }

    /// Number of candidates currently retained.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if no candidates have been accepted.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into `(pk, distance)` pairs sorted by distance ascending (best
    /// first), tie-broken by primary key for determinism.
    pub fn into_sorted(self) -> Vec<(PrimaryKey, f32)> {
        let mut out: Vec<Candidate> = self.heap.into_vec();
        out.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.pk_bytes.cmp(&b.pk_bytes))
        });
        out.into_iter().map(|c| (c.pk, c.distance)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::FieldValue;

    fn pk(n: i64) -> PrimaryKey {
        PrimaryKey::single(FieldValue::Int64(n))
    }

    #[test]
    fn keeps_only_k_closest() {
        let mut heap = TopKHeap::new(2);
        heap.offer(pk(1), 5.0);
        heap.offer(pk(2), 1.0);
        heap.offer(pk(3), 3.0);

        let out = heap.into_sorted();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, pk(2));
        assert_eq!(out[1].0, pk(3));
    }

    #[test]
    fn sorted_ascending_by_distance() {
        let mut heap = TopKHeap::new(5);
        for (id, d) in [(1, 9.0), (2, 2.0), (3, 7.0), (4, 0.5)] {
            heap.offer(pk(id), d);
        }
        let out = heap.into_sorted();
        let distances: Vec<f32> = out.iter().map(|(_, d)| *d).collect();
        assert_eq!(distances, vec![0.5, 2.0, 7.0, 9.0]);
    }

    #[test]
    fn k_zero_accepts_nothing() {
        let mut heap = TopKHeap::new(0);
        heap.offer(pk(1), 1.0);
        assert!(heap.is_empty());
        assert!(heap.into_sorted().is_empty());
    }

    #[test]
    fn tie_break_is_deterministic_by_pk() {
        let mut heap = TopKHeap::new(2);
        heap.offer(pk(5), 1.0);
        heap.offer(pk(1), 1.0);
        let out = heap.into_sorted();
        assert_eq!(out[0].0, pk(1));
        assert_eq!(out[1].0, pk(5));
    }

    #[test]
    fn fewer_candidates_than_k_returns_all() {
        let mut heap = TopKHeap::new(10);
        heap.offer(pk(1), 1.0);
        heap.offer(pk(2), 2.0);
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.into_sorted().len(), 2);
    }
}
