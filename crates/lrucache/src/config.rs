//! Cache configuration and construction
//!
//! A [`CacheConfig`] fixes everything that is decided once, at construction
//! time: the capacity, how many entries an overflowing insert evicts, whether
//! the cache is wrapped in a lock, and how much the synchronized traversal
//! channel may buffer.

use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::SyncLru;
use crate::error::{Error, Result};
use crate::lru::LruCore;
use crate::traits::LruCache;

/// How many least-recently-used entries an overflowing insert evicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMode {
    /// Exactly one entry per overflowing insert; every `add` stays O(1)
    #[default]
    Single,
    /// `max(capacity / 4, 1)` entries per overflowing insert
    ///
    /// Fewer evicting inserts overall, but the insert that triggers eviction
    /// pays O(capacity / 4).
    Quarter,
}

impl EvictionMode {
    /// Number of entries to evict once the cache holds more than `capacity`
    pub fn batch(self, capacity: usize) -> usize {
        match self {
            EvictionMode::Single => 1,
            EvictionMode::Quarter => (capacity / 4).max(1),
        }
    }
}

/// Whether the cache is guarded by a reader/writer lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Shared through [`SyncLru`]; safe to use from many threads
    #[default]
    Synchronized,
    /// Bare [`LruCore`]; the caller provides any synchronization
    Unsynchronized,
}

/// Configuration for a cache instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries (at least 1)
    pub capacity: usize,

    /// Eviction batch size on overflow
    pub eviction: EvictionMode,

    /// Locked or bare construction
    pub concurrency: Concurrency,

    /// Buffered pairs in a synchronized traversal channel (0 = rendezvous)
    pub stream_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            eviction: EvictionMode::Single,
            concurrency: Concurrency::Synchronized,
            stream_buffer: 0,
        }
    }
}

impl CacheConfig {
    /// Default configuration with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Reject configurations no cache can be built from
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidCapacity(self.capacity));
        }
        Ok(())
    }

    /// Build a cache in the configured concurrency mode
    ///
    /// # Example
    /// ```
    /// use lrucache::{CacheConfig, Concurrency};
    ///
    /// let mut cache = CacheConfig::builder()
    ///     .capacity(2)
    ///     .concurrency(Concurrency::Unsynchronized)
    ///     .build()
    ///     .build::<u32, &str>()
    ///     .unwrap();
    ///
    /// cache.add(1, "one");
    /// assert_eq!(cache.find(&1), Some("one"));
    /// ```
    pub fn build<K, V>(&self) -> Result<Box<dyn LruCache<K, V> + Send>>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        debug!(
            capacity = self.capacity,
            eviction = ?self.eviction,
            concurrency = ?self.concurrency,
            "building cache"
        );
        match self.concurrency {
            Concurrency::Synchronized => Ok(Box::new(SyncLru::with_config(self)?)),
            Concurrency::Unsynchronized => Ok(Box::new(LruCore::with_config(self)?)),
        }
    }
}

/// Builder for [`CacheConfig`] with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the maximum number of entries
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the eviction batch size
    pub fn eviction(mut self, eviction: EvictionMode) -> Self {
        self.config.eviction = eviction;
        self
    }

    /// Choose locked or bare construction
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the synchronized traversal channel buffer
    pub fn stream_buffer(mut self, stream_buffer: usize) -> Self {
        self.config.stream_buffer = stream_buffer;
        self
    }

    /// Finish building
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
