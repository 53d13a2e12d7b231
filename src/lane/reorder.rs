//! Sequence-ordered release of out-of-order results.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Holds items that arrived ahead of their turn and releases them strictly in
/// sequence order.
///
/// Sequence numbers start at zero and every number must eventually be
/// inserted; a missing number blocks everything after it.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
        }
    }

    /// Store an item. Items for already-released or already-held sequence
    /// numbers are dropped and reported as false; the held item is kept.
    pub fn insert(&mut self, seq: u64, item: T) -> bool {
        if seq < self.next {
            return false;
        }
        match self.pending.entry(seq) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(item);
                true
            }
        }
    }

    /// Take the next item if it has arrived.
    pub fn pop_ready(&mut self) -> Option<T> {
        let item = self.pending.remove(&self.next)?;
        self.next += 1;
        Some(item)
    }

    /// Sequence number that will be released next.
    pub fn next_seq(&self) -> u64 {
        self.next
    }

    /// Items waiting for an earlier sequence number.
    pub fn held(&self) -> usize {
        self.pending.len()
    }
}
