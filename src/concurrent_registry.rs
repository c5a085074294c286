//! Generic thread-safe key/value registry with two-level locking.
//!
//! The registry owns a map from normalized key to [`Record`], guarded by a structure lock.
//! The structure lock is only held long enough to find or insert a record; reading or
//! writing the value happens afterwards under the record's own lock. Traffic on distinct keys
//! therefore never serializes behind a single lock, and the two locks are never nested.
//!
//! Failures are absorbed: a key that cannot be normalized turns every operation into a no-op
//! returning `V::default()`. Callers with more context (see [`System`](crate::System)) are
//! responsible for explaining why.
//!
//! # Examples
//!
//! ```
//! use service_registry::ConcurrentRegistry;
//!
//! let registry: ConcurrentRegistry<String, u32> = ConcurrentRegistry::new();
//!
//! assert_eq!(registry.register("answer", 42), 0);
//! assert_eq!(registry.get("answer"), 42);
//! assert_eq!(registry.register("answer", 43), 42);
//! assert_eq!(registry.unregister("answer"), 43);
//! assert_eq!(registry.get("answer"), 0);
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::key::RegistryKey;
use crate::record::Record;

type Records<N, V> = HashMap<N, Arc<Record<V>>>;

pub struct ConcurrentRegistry<K: RegistryKey, V> {
    records: RwLock<Records<K::Normalized, V>>,
    _key: PhantomData<fn(K)>,
}

impl<K: RegistryKey, V: Clone + Default> ConcurrentRegistry<K, V> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            _key: PhantomData,
        }
    }

    /// Look up the record for `key` under the structure read lock.
    fn record(&self, key: &K::Normalized) -> Option<Arc<Record<V>>> {
        self.records
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }

    /// Return the value stored for `key`, or `V::default()` when absent or when the key has
    /// no identity.
    pub fn get<Q>(&self, key: &Q) -> V
    where
        Q: RegistryKey<Normalized = K::Normalized> + ?Sized,
    {
        let Ok(key) = key.normalize() else {
            return V::default();
        };

        match self.record(&key) {
            Some(record) => record.load(),
            None => V::default(),
        }
    }

    /// Store `value` for `key` and return the previous value.
    ///
    /// The first registration of a key creates its record and returns `V::default()`;
    /// later registrations swap the value inside the existing record.
    pub fn register<Q>(&self, key: &Q, value: V) -> V
    where
        Q: RegistryKey<Normalized = K::Normalized> + ?Sized,
    {
        let Ok(key) = key.normalize() else {
            return V::default();
        };

        if let Some(record) = self.record(&key) {
            return record.swap(value);
        }

        let raced = {
            let mut records = self.records.write().unwrap_or_else(|p| p.into_inner());
            match records.entry(key) {
                // Lost the race against another first registration.
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Record::new(value)));
                    trace!("created registry record");
                    return V::default();
                }
            }
        };

        raced.swap(value)
    }

    /// Remove `key` entirely and return the value it held, or `V::default()` when absent.
    pub fn unregister<Q>(&self, key: &Q) -> V
    where
        Q: RegistryKey<Normalized = K::Normalized> + ?Sized,
    {
        let Ok(key) = key.normalize() else {
            return V::default();
        };

        let removed = self
            .records
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&key);

        match removed {
            Some(record) => record.load(),
            None => V::default(),
        }
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: RegistryKey<Normalized = K::Normalized> + ?Sized,
    {
        match key.normalize() {
            Ok(key) => self
                .records
                .read()
                .unwrap_or_else(|p| p.into_inner())
                .contains_key(&key),
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the normalized keys currently present, in no particular order.
    pub fn keys(&self) -> Vec<K::Normalized> {
        self.records
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect()
    }
}

impl<K: RegistryKey, V: Clone + Default> Default for ConcurrentRegistry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: RegistryKey, V> fmt::Debug for ConcurrentRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.records.read().unwrap_or_else(|p| p.into_inner()).len();
        f.debug_struct("ConcurrentRegistry")
            .field("records", &len)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
