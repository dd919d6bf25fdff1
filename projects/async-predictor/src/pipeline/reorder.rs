// Reorder buffer: holds results that arrived ahead of the id the caller is
// waiting for, keyed by sequence id.

use crate::pipeline::types::SequenceId;
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct ReorderBuffer<T> {
    entries: BTreeMap<SequenceId, T>,
    /// Highest id already delivered to the caller (0 before the first delivery)
    delivered: SequenceId,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            delivered: 0,
        }
    }

    /// Park an early result. Returns false (and drops the value) if the id
    /// was already delivered or is already buffered.
    pub fn insert(&mut self, id: SequenceId, value: T) -> bool {
        if id <= self.delivered || self.entries.contains_key(&id) {
            tracing::warn!("Reorder buffer: rejecting duplicate or stale result {}", id);
            return false;
        }
        self.entries.insert(id, value);
        true
    }

    /// Remove the smallest entry if, and only if, its id is `id`.
    pub fn take(&mut self, id: SequenceId) -> Option<T> {
        match self.entries.first_key_value() {
            Some((&first, _)) if first == id => {
                let (_, value) = self.entries.pop_first()?;
                self.mark_delivered(id);
                Some(value)
            }
            _ => None,
        }
    }

    /// Record that `id` reached the caller without passing through the buffer.
    pub fn mark_delivered(&mut self, id: SequenceId) {
        self.delivered = self.delivered.max(id);
    }

    pub fn peek_first_id(&self) -> Option<SequenceId> {
        self.entries.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
