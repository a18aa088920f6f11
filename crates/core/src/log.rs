//! Replicated log entry and position types

use serde::{Deserialize, Serialize};

/// A position in a replicated log.
///
/// Ordering is lexicographic on `(term, index)`, which is exactly the
/// freshness comparison elections use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LogPosition {
    pub term: u64,
    pub index: u64,
}

impl LogPosition {
    pub fn new(term: u64, index: u64) -> Self {
        Self { term, index }
    }
}

/// An opaque committed operation carried by the data-group log.
///
/// The payload is a serialised physical plan; the slot routes the operation
/// to the partition it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub index: u64,
    pub slot: u32,
    pub payload: Vec<u8>,
}

impl LogEntry {
    pub fn new(term: u64, index: u64, slot: u32, payload: Vec<u8>) -> Self {
        Self {
            term,
            index,
            slot,
            payload,
        }
    }

    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.term, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_ordering_is_term_then_index() {
        assert!(LogPosition::new(2, 0) > LogPosition::new(1, 100));
        assert!(LogPosition::new(2, 5) > LogPosition::new(2, 4));
        assert_eq!(LogPosition::new(3, 7), LogPosition::new(3, 7));
    }
}
