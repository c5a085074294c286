//! Per-key value cell.

use std::sync::RwLock;

/// The mutable storage cell backing one normalized key.
///
/// A record is created on first registration and is never replaced afterwards: every later
/// write swaps the value in place under the record's own lock, so readers observe either the
/// old or the new value in full.
#[derive(Debug, Default)]
pub struct Record<V> {
    value: RwLock<V>,
}

impl<V: Clone> Record<V> {
    pub fn new(value: V) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Copy the current value out.
    ///
    /// Lock poisoning is recovered: the critical section is a single clone.
    pub fn load(&self) -> V {
        self.value
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Store `value` and return the one it replaced.
    pub fn swap(&self, value: V) -> V {
        let mut guard = self.value.write().unwrap_or_else(|p| p.into_inner());
        std::mem::replace(&mut *guard, value)
    }
}
