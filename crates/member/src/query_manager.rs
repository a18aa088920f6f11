//! Query session registry
//!
//! Remote queries are keyed by `(requester, queryId)`; each context owns
//! the local reader ids registered for it. Readers are freed only by
//! `end_query` or exhaustion; there is no global query GC here.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chron_core::Node;
use parking_lot::Mutex;
use tracing::debug;

use crate::traits::PointReader;

type SharedReader = Arc<Mutex<Box<dyn PointReader>>>;

/// A remote requester's session on this member.
#[derive(Clone, Default)]
pub struct QueryContext {
    readers: Arc<Mutex<HashSet<u64>>>,
}

impl QueryContext {
    fn register_local_reader(&self, reader_id: u64) {
        self.readers.lock().insert(reader_id);
    }

    fn local_readers(&self) -> Vec<u64> {
        self.readers.lock().iter().copied().collect()
    }
}

/// Maps `(requester, queryId)` to contexts and reader ids to readers.
#[derive(Default)]
pub struct QueryManager {
    contexts: Mutex<HashMap<(u64, u64), QueryContext>>,
    readers: Mutex<HashMap<u64, SharedReader>>,
    next_reader_id: AtomicU64,
}

impl QueryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the requester's context, creating it on first use.
    pub fn get_query_context(&self, requester: &Node, query_id: u64) -> QueryContext {
        self.contexts
            .lock()
            .entry((requester.id, query_id))
            .or_default()
            .clone()
    }

    /// Bind a reader to a fresh local id under the given context.
    pub fn register_reader(&self, context: &QueryContext, reader: Box<dyn PointReader>) -> u64 {
        let reader_id = self.next_reader_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.readers
            .lock()
            .insert(reader_id, Arc::new(Mutex::new(reader)));
        context.register_local_reader(reader_id);
        reader_id
    }

    pub fn get_reader(&self, reader_id: u64) -> Option<SharedReader> {
        self.readers.lock().get(&reader_id).cloned()
    }

    /// Release every reader registered under the context and drop it.
    pub fn end_query(&self, requester: &Node, query_id: u64) {
        let context = self.contexts.lock().remove(&(requester.id, query_id));
        if let Some(context) = context {
            let ids = context.local_readers();
            let mut readers = self.readers.lock();
            for reader_id in &ids {
                readers.remove(reader_id);
            }
            debug!(
                "released {} readers of query {} from {}",
                ids.len(),
                query_id,
                requester
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemberError;
    use chron_core::TimeValuePair;

    struct EmptyReader;

    impl PointReader for EmptyReader {
        fn next_pair(&mut self) -> Result<Option<TimeValuePair>, MemberError> {
            Ok(None)
        }
    }

    fn requester() -> Node {
        Node::new("10.0.0.9", 9003, 9)
    }

    #[test]
    fn reader_ids_are_monotonic() {
        let manager = QueryManager::new();
        let context = manager.get_query_context(&requester(), 1);
        let a = manager.register_reader(&context, Box::new(EmptyReader));
        let b = manager.register_reader(&context, Box::new(EmptyReader));
        assert!(b > a);
        assert!(manager.get_reader(a).is_some());
    }

    #[test]
    fn context_is_shared_per_query() {
        let manager = QueryManager::new();
        let first = manager.get_query_context(&requester(), 1);
        let id = manager.register_reader(&first, Box::new(EmptyReader));
        let again = manager.get_query_context(&requester(), 1);
        assert!(again.local_readers().contains(&id));
    }

    #[test]
    fn end_query_releases_all_readers() {
        let manager = QueryManager::new();
        let context = manager.get_query_context(&requester(), 4);
        let a = manager.register_reader(&context, Box::new(EmptyReader));
        let b = manager.register_reader(&context, Box::new(EmptyReader));

        manager.end_query(&requester(), 4);
        assert!(manager.get_reader(a).is_none());
        assert!(manager.get_reader(b).is_none());

        // other queries are untouched
        let other = manager.get_query_context(&requester(), 5);
        let c = manager.register_reader(&other, Box::new(EmptyReader));
        manager.end_query(&requester(), 4);
        assert!(manager.get_reader(c).is_some());
    }
}
