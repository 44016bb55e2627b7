//! Breadth-first traversal over a [`GraphEdgeStore`](crate::GraphEdgeStore).

use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use fusion_core::FieldValue;
use fusion_kv::KvTransaction;

use crate::edge::EdgePattern;
use crate::error::GraphResult;
use crate::store::GraphEdgeStore;

/// Which edge direction a traversal follows from each frontier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges where the frontier node is the source.
    Out,
    /// Follow edges where the frontier node is the target.
    In,
}

/// Options controlling a breadth-first traversal.
#[derive(Debug, Clone)]
pub struct BfsOptions {
    /// Maximum depth (inclusive) to explore from the origin node.
    pub max_depth: u32,
    /// Direction to follow for edge expansions.
    pub direction: Direction,
    /// Restrict expansion to this edge label, when set.
    pub edge_label: Option<String>,
    /// Cap on the number of visited nodes returned (including the origin).
    pub max_results: Option<usize>,
}

impl Default for BfsOptions {
    fn default() -> Self {
        BfsOptions {
            max_depth: 1,
            direction: Direction::Out,
            edge_label: None,
            max_results: None,
        }
    }
}

/// A node visit captured during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfsVisit {
    /// The visited node.
    pub node: FieldValue,
    /// Distance in hops from the origin.
    pub depth: u32,
}

/// Breadth-first traversal from `origin`, honoring `options`.
pub fn bfs<Tx: KvTransaction>(
    store: &GraphEdgeStore,
    txn: &mut Tx,
    origin: &FieldValue,
    options: &BfsOptions,
) -> GraphResult<Vec<BfsVisit>> {
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut out = Vec::new();
    let mut queue = VecDeque::new();

    let origin_key = format!("{origin:?}");
    visited.insert(origin_key);
    queue.push_back((origin.clone(), 0u32));
    out.push(BfsVisit {
        node: origin.clone(),
        depth: 0,
    });

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= options.max_depth {
            continue;
        }
        if let Some(limit) = options.max_results {
            if out.len() >= limit {
                break;
            }
        }

        let pattern = match options.direction {
            Direction::Out => EdgePattern {
                from: Some(node.clone()),
                edge: options.edge_label.clone(),
                to: None,
            },
            Direction::In => EdgePattern {
                from: None,
                edge: options.edge_label.clone(),
                to: Some(node.clone()),
            },
        };

        for edge in store.scan(txn, &pattern)? {
            let next = match options.direction {
                Direction::Out => edge.target,
                Direction::In => edge.source,
            };
            let key = format!("{next:?}");
            if visited.insert(key) {
                let next_depth = depth + 1;
                out.push(BfsVisit {
                    node: next.clone(),
                    depth: next_depth,
                });
                if options.max_results.is_some_and(|limit| out.len() >= limit) {
                    break;
                }
                queue.push_back((next, next_depth));
            }
        }
    }

    Ok(out)
}
