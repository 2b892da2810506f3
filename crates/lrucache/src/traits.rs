//! Operation set shared by the synchronized and unsynchronized caches
//!
//! [`CacheConfig::build`](crate::CacheConfig::build) hands out a
//! `Box<dyn LruCache<K, V>>`, so callers can switch construction modes
//! without touching the code that uses the cache.

use crossbeam_channel::Receiver;

use crate::error::Result;
use crate::iter::{Direction, Traversal};

/// Fixed-capacity cache with least-recently-used eviction
pub trait LruCache<K, V> {
    /// Insert or replace a value, making it the most recently used entry
    ///
    /// Evicts from the least recently used end when the cache overflows.
    fn add(&mut self, key: K, value: V);

    /// Return a copy of the value and promote the key; a miss changes nothing
    fn find(&mut self, key: &K) -> Option<V>;

    /// Remove a key and return its value
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Number of live entries
    fn size(&self) -> usize;

    /// Maximum number of live entries
    fn capacity(&self) -> usize;

    /// Cancellable stream of entries in `direction`
    fn traverse(&self, direction: Direction) -> Result<Traversal<K, V>>;

    /// Stream of entries in `direction` that always runs to completion
    fn traverse_simple(&self, direction: Direction) -> Result<Receiver<(K, V)>>;
}
