//! # lrucache
//!
//! Fixed-capacity key/value cache with least-recently-used eviction.
//!
//! ## Architecture
//! - **LruCore**: AHash index over an arena-backed doubly-linked list with
//!   head/tail sentinels. Add, find, remove and size are O(1).
//! - **SyncLru**: the core behind one `parking_lot::RwLock`. `find` promotes
//!   on a hit, so it takes the write lock like `add` and `remove`.
//! - **Traversal**: a worker thread walks the list under the read lock and
//!   streams pairs over a channel. The cancellable form can be stopped early;
//!   the simple form runs to completion.
//!
//! ## Example
//! ```
//! use lrucache::{Direction, SyncLru};
//!
//! let cache = SyncLru::new(3).unwrap();
//! cache.add(1, "one");
//! cache.add(2, "two");
//! cache.add(3, "three");
//! cache.find(&1);
//! cache.add(4, "four"); // evicts 2
//!
//! let keys: Vec<_> = cache
//!     .traverse(Direction::Forward)
//!     .unwrap()
//!     .map(|(k, _)| k)
//!     .collect();
//! assert_eq!(keys, vec![3, 1, 4]);
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod iter;
mod lru;
mod stats;
mod traits;

pub use cache::SyncLru;
pub use config::{CacheConfig, CacheConfigBuilder, Concurrency, EvictionMode};
pub use error::{Error, Result};
pub use iter::{Direction, Traversal};
pub use lru::{Iter, LruCore};
pub use stats::CacheStats;
pub use traits::LruCache;

/// Channel type returned by `traverse_simple`
pub use crossbeam_channel::Receiver;
