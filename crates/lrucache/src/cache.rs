//! SyncLru: thread-safe facade over the LRU core
//!
//! Every mutating operation takes the write lock. `find` is one of them:
//! a hit relinks the entry, so it cannot share the lock with other readers.
//! `size`, `peek` and `contains` leave the recency order alone and take the
//! read lock. A traversal holds the read lock on its worker thread for the
//! whole walk; the `iter` module describes how that lock is released.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::iter::{spawn_stream, spawn_traversal, Direction, Traversal};
use crate::lru::{Insertion, LruCore};
use crate::stats::CacheStats;
use crate::traits::LruCache;

/// Thread-safe LRU cache
///
/// Cloning is cheap and yields another handle to the same cache.
pub struct SyncLru<K, V> {
    /// Engine and index, guarded together
    inner: Arc<RwLock<LruCore<K, V>>>,

    /// Cache statistics
    stats: Arc<CacheStats>,

    /// Fixed at construction, readable without the lock
    capacity: usize,

    /// Traversal channel buffer
    stream_buffer: usize,
}

impl<K, V> SyncLru<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new synchronized cache with the given capacity
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(&CacheConfig::new(capacity))
    }

    /// Create a new synchronized cache from a configuration
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        let core = LruCore::with_config(config)?;
        debug!(
            capacity = config.capacity,
            stream_buffer = config.stream_buffer,
            "created synchronized cache"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(core)),
            stats: Arc::new(CacheStats::new()),
            capacity: config.capacity,
            stream_buffer: config.stream_buffer,
        })
    }

    /// Insert or replace a value, making it the most recently used entry
    pub fn add(&self, key: K, value: V) {
        let insertion = self.inner.write().insert(key, value);
        if let Insertion::Inserted { evicted } = insertion {
            self.stats.record_insert();
            self.stats.record_evictions(evicted);
        }
    }

    /// Remove a key and return its value
    pub fn remove(&self, key: &K) -> Option<V> {
        let removed = self.inner.write().remove(key);
        if removed.is_some() {
            self.stats.record_removal();
        }
        removed
    }

    /// Check whether a key is cached, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains(key)
    }

    /// Drop every entry; capacity and statistics are unchanged
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl<K, V> SyncLru<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Return a copy of the value and promote the key
    ///
    /// Takes the write lock even though it only reads the value.
    pub fn find(&self, key: &K) -> Option<V> {
        let found = self.inner.write().find(key).cloned();
        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Return a copy of the value without promoting it
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.read().peek(key).cloned()
    }
}

impl<K, V> SyncLru<K, V> {
    /// Number of live entries
    pub fn size(&self) -> usize {
        self.inner.read().size()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Maximum number of live entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K, V> SyncLru<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Cancellable stream of entries in `direction`
    ///
    /// The walk holds the read lock until it finishes or the returned
    /// [`Traversal`] is stopped or dropped. Writers on any thread block until
    /// then, including the thread consuming the traversal.
    pub fn traverse(&self, direction: Direction) -> Result<Traversal<K, V>> {
        spawn_traversal(&self.inner, direction, self.stream_buffer)
    }

    /// Stream of entries in `direction` that always runs to completion
    ///
    /// There is no stop signal. If the receiver is kept but no longer read,
    /// the walk stays blocked with the read lock held; drop the receiver or
    /// drain it to let writers through.
    pub fn traverse_simple(&self, direction: Direction) -> Result<Receiver<(K, V)>> {
        spawn_stream(&self.inner, direction, self.stream_buffer)
    }
}

impl<K, V> Clone for SyncLru<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stats: Arc::clone(&self.stats),
            capacity: self.capacity,
            stream_buffer: self.stream_buffer,
        }
    }
}

impl<K, V> fmt::Debug for SyncLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never block: a running traversal with a queued writer would stall us.
        let mut out = f.debug_struct("SyncLru");
        match self.inner.try_read() {
            Some(core) => out.field("size", &core.size()),
            None => out.field("size", &format_args!("<locked>")),
        };
        out.field("capacity", &self.capacity).finish()
    }
}

impl<K, V> LruCache<K, V> for SyncLru<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn add(&mut self, key: K, value: V) {
        SyncLru::add(self, key, value);
    }

    fn find(&mut self, key: &K) -> Option<V> {
        SyncLru::find(self, key)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        SyncLru::remove(self, key)
    }

    fn size(&self) -> usize {
        SyncLru::size(self)
    }

    fn capacity(&self) -> usize {
        SyncLru::capacity(self)
    }

    fn traverse(&self, direction: Direction) -> Result<Traversal<K, V>> {
        SyncLru::traverse(self, direction)
    }

    fn traverse_simple(&self, direction: Direction) -> Result<Receiver<(K, V)>> {
        SyncLru::traverse_simple(self, direction)
    }
}
