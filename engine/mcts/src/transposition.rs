//! Transposition table: position hash to shared position node.
//!
//! Entries hold weak references, so the table never keeps a position alive
//! on its own. Dead entries linger until [`TranspositionTable::maintenance`].

use crate::low_node::LowNode;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Thread-safe map from position hash to [`LowNode`].
#[derive(Debug, Default)]
pub struct TranspositionTable {
    table: DashMap<u64, Weak<LowNode>>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live node stored for `hash`, if any.
    pub fn find(&self, hash: u64) -> Option<Arc<LowNode>> {
        self.table.get(&hash).and_then(|entry| entry.upgrade())
    }

    /// The node for `hash`, building it with `make` when absent or dead.
    ///
    /// The flag is true when the node was created by this call.
    pub fn get_or_insert_with(
        &self,
        hash: u64,
        make: impl FnOnce() -> LowNode,
    ) -> (Arc<LowNode>, bool) {
        match self.table.entry(hash) {
            Entry::Occupied(mut entry) => {
                if let Some(node) = entry.get().upgrade() {
                    return (node, false);
                }
                let node = Arc::new(make());
                entry.insert(Arc::downgrade(&node));
                (node, true)
            }
            Entry::Vacant(entry) => {
                let node = Arc::new(make());
                entry.insert(Arc::downgrade(&node));
                (node, true)
            }
        }
    }

    /// Drop entries whose node no longer exists.
    ///
    /// Returns the number of entries evicted.
    pub fn maintenance(&self) -> usize {
        let before = self.table.len();
        self.table.retain(|_, node| node.strong_count() > 0);
        let evicted = before.saturating_sub(self.table.len());
        debug!(evicted, remaining = self.table.len(), "transposition table maintenance");
        evicted
    }

    pub fn clear(&self) {
        self.table.clear();
    }

    /// Number of entries, dead ones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Move;

    #[test]
    fn test_get_or_insert_shares_node() {
        let tt = TranspositionTable::new();
        let (a, created_a) = tt.get_or_insert_with(7, || LowNode::new(&[Move::new(12, 28)]));
        let (b, created_b) = tt.get_or_insert_with(7, || panic!("must not build twice"));
        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&tt.find(7).unwrap(), &a));
        assert!(tt.find(8).is_none());
    }

    #[test]
    fn test_dead_entries_are_replaced_and_evicted() {
        let tt = TranspositionTable::new();
        let (node, _) = tt.get_or_insert_with(1, || LowNode::new(&[]));
        tt.get_or_insert_with(2, || LowNode::new(&[]));
        drop(node);

        assert_eq!(tt.len(), 2);
        assert!(tt.find(1).is_none());

        let (fresh, created) = tt.get_or_insert_with(1, || LowNode::new(&[]));
        assert!(created);
        assert_eq!(tt.maintenance(), 1);
        assert_eq!(tt.len(), 1);
        assert!(tt.find(1).is_some());
        drop(fresh);

        tt.clear();
        assert!(tt.is_empty());
    }
}
