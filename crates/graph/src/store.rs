//! Graph edge storage: redundant key layouts written atomically per edge
//! (spec.md §4.4).

use fusion_core::FieldValue;
use fusion_kv::{KvTransaction, Subspace};

use crate::edge::{Edge, EdgePattern};
use crate::error::{GraphError, GraphResult};

/// Which redundant key layouts a graph index maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStrategy {
    /// `out/<edge>/<from>/<to>` and `in/<edge>/<to>/<from>` — 2x writes.
    Adjacency,
    /// `spo`, `pos`, `osp` orderings — 3x writes.
    TripleStore,
    /// All six permutations of `(s, p, o)` — 6x writes, broadest query
    /// locality.
    Hexastore,
}

/// Every ordering a strategy maintains, named by the triple component each
/// tuple position holds (`'s'`, `'p'`, `'o'`). `out`/`in` are adjacency's
/// two-of-three orderings, written as `p`-leading since the edge label is
/// almost always the selective component for both directions.
fn orderings(strategy: StorageStrategy) -> &'static [(&'static str, [char; 3])] {
    match strategy {
        StorageStrategy::Adjacency => &[("out", ['p', 's', 'o']), ("in", ['p', 'o', 's'])],
        StorageStrategy::TripleStore => &[("spo", ['s', 'p', 'o']), ("pos", ['p', 'o', 's']), ("osp", ['o', 's', 'p'])],
        StorageStrategy::Hexastore => &[
            ("spo", ['s', 'p', 'o']),
            ("pos", ['p', 'o', 's']),
            ("osp", ['o', 's', 'p']),
            ("sop", ['s', 'o', 'p']),
            ("pso", ['p', 's', 'o']),
            ("ops", ['o', 'p', 's']),
        ],
    }
}

fn component(edge: &Edge, c: char) -> FieldValue {
    match c {
        's' => edge.source.clone(),
        'p' => FieldValue::String(edge.label.clone()),
        'o' => edge.target.clone(),
        _ => unreachable!(),
    }
}

fn decode_ordering(order: [char; 3], tuple: &[FieldValue]) -> GraphResult<Edge> {
    let mut source = None;
    let mut label = None;
    let mut target = None;
    for (c, v) in order.iter().zip(tuple) {
        match c {
            's' => source = Some(v.clone()),
            'p' => {
                label = Some(match v {
                    FieldValue::String(s) => s.clone(),
                    other => return Err(GraphError::InvalidPredicateEncoding(other.clone())),
                })
            }
            'o' => target = Some(v.clone()),
            _ => unreachable!(),
        }
    }
    Ok(Edge::new(source.unwrap(), label.unwrap(), target.unwrap()))
}

/// A graph edge index: one [`StorageStrategy`] over one subspace.
pub struct GraphEdgeStore {
    subspace: Subspace,
    strategy: StorageStrategy,
}

impl GraphEdgeStore {
    /// Build a store over `subspace` using `strategy`.
    pub fn new(subspace: Subspace, strategy: StorageStrategy) -> Self {
        GraphEdgeStore { subspace, strategy }
    }

    /// The strategy this store was built with.
    pub fn strategy(&self) -> StorageStrategy {
        self.strategy
    }

    fn segment(&self, name: &str) -> Subspace {
        self.subspace.child(FieldValue::String(name.into()))
    }

    /// Write every layout `strategy` implies for `edge`, atomically within
    /// `txn`.
    pub fn write_edge<Tx: KvTransaction>(&self, txn: &mut Tx, edge: &Edge, value: &[u8]) {
        for (name, order) in orderings(self.strategy) {
            let tuple: Vec<FieldValue> = order.iter().map(|c| component(edge, *c)).collect();
            txn.set(&self.segment(name).pack(&tuple), value);
        }
    }

    /// Remove every layout for `edge`.
    pub fn delete_edge<Tx: KvTransaction>(&self, txn: &mut Tx, edge: &Edge) {
        for (name, order) in orderings(self.strategy) {
            let tuple: Vec<FieldValue> = order.iter().map(|c| component(edge, *c)).collect();
            txn.clear(&self.segment(name).pack(&tuple));
        }
    }

    /// Pick the ordering whose longest filled prefix of `(from?, edge?,
    /// to?)` gives the tightest prefix scan, returning its name, the bound
    /// prefix elements in that ordering's tuple order, and the ordering
    /// itself (spec.md §4.4 "Scan selection").
    fn select_ordering(&self, pattern: &EdgePattern) -> (&'static str, Vec<FieldValue>, [char; 3]) {
        let bound = |c: char| -> Option<FieldValue> {
            match c {
                's' => pattern.from.clone(),
                'p' => pattern.edge.clone().map(FieldValue::String),
                'o' => pattern.to.clone(),
                _ => unreachable!(),
            }
        };

        orderings(self.strategy)
            .iter()
            .map(|(name, order)| {
                let prefix_len = order.iter().take_while(|c| bound(**c).is_some()).count();
                let prefix = order[..prefix_len].iter().map(|c| bound(*c).unwrap()).collect::<Vec<_>>();
                (*name, prefix, *order, prefix_len)
            })
            .max_by_key(|(_, _, _, len)| *len)
            .map(|(name, prefix, order, _)| (name, prefix, order))
            .expect("strategy always has at least one ordering")
    }

    /// Scan for edges matching `pattern`.
    pub fn scan<Tx: KvTransaction>(&self, txn: &mut Tx, pattern: &EdgePattern) -> GraphResult<Vec<Edge>> {
        if pattern.is_unbound() {
            return Err(GraphError::UnboundScan);
        }
        let (name, prefix, order) = self.select_ordering(pattern);
        let segment = self.segment(name);
        let (begin, end) = segment.child_tuple(&prefix).range();
        let raw = txn.get_range(&begin, &end, true, None)?;

        let mut edges = Vec::with_capacity(raw.len());
        for (key, _value) in raw {
            let Some(tuple) = segment.unpack(&key) else { continue };
            let edge = decode_ordering(order, &tuple)?;
            if matches_pattern(&edge, pattern) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }
}

fn matches_pattern(edge: &Edge, pattern: &EdgePattern) -> bool {
    if let Some(from) = &pattern.from {
        if !from.equals(&edge.source) {
            return false;
        }
    }
    if let Some(to) = &pattern.to {
        if !to.equals(&edge.target) {
            return false;
        }
    }
    if let Some(label) = &pattern.edge {
        if label != &edge.label {
            return false;
        }
    }
    true
}
