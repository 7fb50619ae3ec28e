//! Pending-change buffers consumed by flush tasks.
//!
//! - [`Mailbox`] - one slot per key, a new value overwrites that key's pending one
//! - [`Batch`] - accumulates values until drained in one go

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::sync::lock;

/// Keyed, last-write-wins buffer.
///
/// Each key holds at most one pending value. Draining hands back every
/// pending value in key order.
#[derive(Debug)]
pub struct Mailbox<K, V> {
    slots: Mutex<BTreeMap<K, V>>,
}

impl<K: Ord, V> Default for Mailbox<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> Mailbox<K, V> {
    /// An empty mailbox.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Store `value` under `key`, returning the value it displaced.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        lock(&self.slots).insert(key, value)
    }

    /// Take the pending value for `key`.
    pub fn take(&self, key: &K) -> Option<V> {
        lock(&self.slots).remove(key)
    }

    /// Take every pending value, leaving the mailbox empty.
    pub fn drain(&self) -> Vec<(K, V)> {
        std::mem::take(&mut *lock(&self.slots)).into_iter().collect()
    }

    /// Whether no key has a pending value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.slots).is_empty()
    }
}

/// Accumulating buffer drained as a whole.
#[derive(Debug, Default)]
pub struct Batch<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Batch<T> {
    /// An empty batch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Append a value.
    pub fn push(&self, value: T) {
        lock(&self.items).push(value);
    }

    /// Remove and return everything accumulated so far.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *lock(&self.items))
    }

    /// Number of values waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.items).len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_last_write_wins_per_key() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.put("a", 1), None);
        assert_eq!(mailbox.put("b", 1), None);
        assert_eq!(mailbox.put("a", 2), Some(1));
        assert_eq!(mailbox.put("b", 3), Some(1));
        assert_eq!(mailbox.drain(), vec![("a", 2), ("b", 3)]);
        assert!(mailbox.is_empty());
        assert!(mailbox.drain().is_empty());
    }

    #[test]
    fn test_mailbox_take_one_key() {
        let mailbox = Mailbox::new();
        mailbox.put("a", 1);
        mailbox.put("b", 2);
        assert_eq!(mailbox.take(&"c"), None);
        assert_eq!(mailbox.take(&"a"), Some(1));
        assert!(!mailbox.is_empty());
        assert_eq!(mailbox.drain(), vec![("b", 2)]);
    }

    #[test]
    fn test_batch_drain_empties() {
        let batch = Batch::new();
        batch.push("a");
        batch.push("b");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.drain(), vec!["a", "b"]);
        assert!(batch.is_empty());
        assert!(batch.drain().is_empty());
    }
}
