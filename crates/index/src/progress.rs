//! Resumable back-fill progress bookkeeping (spec.md §4.2).
//!
//! Serial back-fill tracks the set of primary-key ranges still left to
//! scan (`index/_progress/<indexName>`); parallel back-fill tracks
//! per-chunk completion status (`index/_build/<indexName>/<chunkIndex>`).
//! Both are persisted as JSON in the same transaction as the index writes
//! they describe, so a crash between transactions loses at most one
//! in-flight batch, never consistency between data and progress.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, IndexResult};

/// One still-unscanned primary-key range, `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEntry {
    /// Inclusive lower bound.
    pub begin: Vec<u8>,
    /// Exclusive upper bound.
    pub end: Vec<u8>,
}

/// The serial back-fill's resumption state: every range still left to
/// scan. Initialized to `[full_range]` and shrunk from the front as
/// batches complete; a batch that only partially covers a range replaces
/// it with `[last_key_seen, end)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: Vec<RangeEntry>,
}

impl RangeSet {
    /// A range set covering exactly `[begin, end)`.
    pub fn covering(begin: Vec<u8>, end: Vec<u8>) -> Self {
        RangeSet {
            ranges: vec![RangeEntry { begin, end }],
        }
    }

    /// True once every range has been scanned away.
    pub fn is_complete(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The next range a batch should scan, if any remain.
    pub fn next_range(&self) -> Option<&RangeEntry> {
        self.ranges.first()
    }

    /// Record that scanning consumed up through `last_key_seen` (exclusive
    /// of the next scan) within the current front range. If `last_key_seen`
    /// reaches the range's `end`, the whole range is dropped; otherwise the
    /// front range is narrowed to `[next_key, end)`.
    pub fn advance(&mut self, next_key: Vec<u8>) {
        let Some(front) = self.ranges.first_mut() else {
            return;
        };
        if next_key >= front.end {
            self.ranges.remove(0);
        } else {
            front.begin = next_key;
        }
    }

    /// Serialize to the bytes stored under `index/_progress/<indexName>`.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::CorruptProgress("<serialize>".into(), e.to_string()))
    }

    /// Deserialize progress previously written by [`RangeSet::to_bytes`].
    pub fn from_bytes(index: &str, bytes: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::CorruptProgress(index.to_string(), e.to_string()))
    }
}

/// One chunk's completion status in a parallel back-fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    /// No batches have been processed for this chunk yet.
    NotStarted,
    /// Scanning is underway; `last_key` is the last primary key fully
    /// indexed, so a resuming worker can restart from just after it.
    InProgress {
        /// Last primary key whose index entries were committed.
        last_key: Vec<u8>,
    },
    /// The chunk's entire range has been indexed.
    Complete,
}

impl ChunkStatus {
    /// Serialize to the bytes stored under
    /// `index/_build/<indexName>/<chunkIndex>`.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::CorruptProgress("<serialize>".into(), e.to_string()))
    }

    /// Deserialize a status previously written by [`ChunkStatus::to_bytes`].
    pub fn from_bytes(index: &str, bytes: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::CorruptProgress(index.to_string(), e.to_string()))
    }
}

/// Per-chunk progress for a parallel back-fill, keyed by chunk index so
/// each worker can claim and resume an independent slice of the primary
/// range (spec.md §4.2 "Parallel build").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressTracker {
    chunks: Vec<ChunkStatus>,
}

impl ProgressTracker {
    /// A tracker for `chunk_count` chunks, all `NotStarted`.
    pub fn new(chunk_count: usize) -> Self {
        ProgressTracker {
            chunks: vec![ChunkStatus::NotStarted; chunk_count],
        }
    }

    /// The status of chunk `index`.
    pub fn status(&self, index: usize) -> &ChunkStatus {
        &self.chunks[index]
    }

    /// Mark chunk `index` as having progressed through `last_key`.
    pub fn record_progress(&mut self, index: usize, last_key: Vec<u8>) {
        self.chunks[index] = ChunkStatus::InProgress { last_key };
    }

    /// Mark chunk `index` fully indexed.
    pub fn record_complete(&mut self, index: usize) {
        self.chunks[index] = ChunkStatus::Complete;
    }

    /// Overwrite chunk `index`'s status wholesale, used when reloading each
    /// chunk's individually-persisted status before dispatch.
    pub fn set_status(&mut self, index: usize, status: ChunkStatus) {
        self.chunks[index] = status;
    }

    /// True once every chunk is `Complete`.
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| matches!(c, ChunkStatus::Complete))
    }

    /// Indices of chunks that still have work remaining.
    pub fn incomplete_chunks(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, ChunkStatus::Complete))
            .map(|(i, _)| i)
            .collect()
    }

    /// Serialize to the bytes stored under `index/_build/<indexName>`.
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| IndexError::CorruptProgress("<serialize>".into(), e.to_string()))
    }

    /// Deserialize progress previously written by [`ProgressTracker::to_bytes`].
    pub fn from_bytes(index: &str, bytes: &[u8]) -> IndexResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| IndexError::CorruptProgress(index.to_string(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_set_advance_narrows_then_drops() {
        let mut rs = RangeSet::covering(vec![0], vec![10]);
        rs.advance(vec![5]);
        assert_eq!(rs.next_range().unwrap().begin, vec![5]);
        rs.advance(vec![10]);
        assert!(rs.is_complete());
    }

    #[test]
    fn range_set_round_trips_through_bytes() {
        let rs = RangeSet::covering(vec![1, 2], vec![9, 9]);
        let bytes = rs.to_bytes().unwrap();
        let back = RangeSet::from_bytes("idx", &bytes).unwrap();
        assert_eq!(rs.ranges, back.ranges);
    }

    #[test]
    fn progress_tracker_completes_when_all_chunks_complete() {
        let mut pt = ProgressTracker::new(2);
        assert!(!pt.is_complete());
        pt.record_progress(0, vec![1]);
        pt.record_complete(0);
        pt.record_complete(1);
        assert!(pt.is_complete());
        assert!(pt.incomplete_chunks().is_empty());
    }

    #[test]
    fn corrupt_bytes_produce_corrupt_progress_error() {
        let err = RangeSet::from_bytes("idx", b"not json").unwrap_err();
        assert!(matches!(err, IndexError::CorruptProgress(_, _)));
    }
}
