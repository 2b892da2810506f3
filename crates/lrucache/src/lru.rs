//! LRU (Least Recently Used) core engine
//!
//! Entries live in an arena of nodes linked into a doubly-linked list by
//! index. Slots 0 and 1 are the head and tail sentinels: `head.next` is the
//! least recently used entry, `tail.prev` the most recently used one. The
//! index maps each key to its arena slot, so every operation is O(1).
//!
//! `LruCore` does no locking. Share it across threads through
//! [`SyncLru`](crate::SyncLru).

use std::collections::HashMap;
use std::hash::Hash;
use std::iter::FusedIterator;

use ahash::RandomState;
use crossbeam_channel::Receiver;
use tracing::{debug, trace};

use crate::config::{CacheConfig, EvictionMode};
use crate::error::Result;
use crate::iter::{collect_traversal, Direction, Traversal};
use crate::traits::LruCache;

const HEAD: usize = 0;
const TAIL: usize = 1;

/// Upper bound on slots reserved at construction; larger caches grow on demand
const PREALLOC_LIMIT: usize = 1024;

/// Node in the LRU doubly-linked list
///
/// `entry` is `None` for the sentinels and for slots on the free list.
struct Node<K, V> {
    entry: Option<(K, V)>,
    prev: usize,
    next: usize,
}

impl<K, V> Node<K, V> {
    fn sentinel(prev: usize, next: usize) -> Self {
        Self {
            entry: None,
            prev,
            next,
        }
    }
}

/// What an insert did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Insertion {
    /// The key was present; its value was replaced and promoted
    Replaced,
    /// A new entry was linked, evicting `evicted` old ones
    Inserted { evicted: usize },
}

/// LRU cache with fixed capacity and no internal locking
pub struct LruCore<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Node<K, V>>,
    free_list: Vec<usize>,
    capacity: usize,
    eviction: EvictionMode,
}

impl<K, V> LruCore<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a new LRU cache with the given capacity
    ///
    /// # Errors
    /// * `Error::InvalidCapacity` - `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_config(&CacheConfig::new(capacity))
    }

    /// Create a new LRU cache from a configuration
    ///
    /// Only `capacity` and `eviction` apply to the bare engine.
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;

        let reserve = config.capacity.min(PREALLOC_LIMIT);
        let mut nodes = Vec::with_capacity(reserve + 3);
        nodes.push(Node::sentinel(HEAD, TAIL));
        nodes.push(Node::sentinel(HEAD, TAIL));

        debug!(
            capacity = config.capacity,
            eviction = ?config.eviction,
            "created lru core"
        );

        Ok(Self {
            map: HashMap::with_capacity_and_hasher(reserve, RandomState::new()),
            nodes,
            free_list: Vec::new(),
            capacity: config.capacity,
            eviction: config.eviction,
        })
    }

    /// Insert or replace a value, making it the most recently used entry
    pub fn add(&mut self, key: K, value: V) {
        self.insert(key, value);
    }

    pub(crate) fn insert(&mut self, key: K, value: V) -> Insertion {
        if let Some(&idx) = self.map.get(&key) {
            if let Some((_, slot)) = &mut self.nodes[idx].entry {
                *slot = value;
            }
            self.move_to_back(idx);
            return Insertion::Replaced;
        }

        let idx = self.alloc_node(key.clone(), value);
        self.link_back(idx);
        self.map.insert(key, idx);

        let evicted = if self.map.len() > self.capacity {
            self.evict(self.eviction.batch(self.capacity))
        } else {
            0
        };
        Insertion::Inserted { evicted }
    }

    /// Look up a value and promote it to most recently used
    ///
    /// A miss leaves the recency order untouched.
    pub fn find(&mut self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.move_to_back(idx);
        self.nodes[idx].entry.as_ref().map(|(_, value)| value)
    }

    /// Look up a value without promoting it
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.map.get(key)?;
        self.nodes[idx].entry.as_ref().map(|(_, value)| value)
    }

    /// Check whether a key is cached, without promoting it
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Remove a key from the cache
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.release(idx).map(|(_, value)| value)
    }

    /// Drop every entry; capacity is unchanged
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.truncate(2);
        self.nodes[HEAD].next = TAIL;
        self.nodes[TAIL].prev = HEAD;
        self.free_list.clear();
    }

    fn evict(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            let oldest = self.nodes[HEAD].next;
            if oldest == TAIL {
                break;
            }
            if let Some((key, _)) = self.release(oldest) {
                self.map.remove(&key);
            }
            evicted += 1;
        }
        trace!(evicted, size = self.map.len(), "evicted least recently used");
        evicted
    }
}

impl<K, V> LruCore<K, V> {
    /// Number of live entries
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of live entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Walk live entries without changing their recency
    ///
    /// `Direction::Forward` starts at the least recently used entry.
    pub fn iter(&self, direction: Direction) -> Iter<'_, K, V> {
        let cursor = match direction {
            Direction::Forward => self.nodes[HEAD].next,
            Direction::Reverse => self.nodes[TAIL].prev,
        };
        Iter {
            nodes: &self.nodes,
            cursor,
            direction,
            remaining: self.map.len(),
        }
    }

    fn move_to_back(&mut self, idx: usize) {
        if self.nodes[TAIL].prev == idx {
            return;
        }
        self.unlink(idx);
        self.link_back(idx);
    }

    fn link_back(&mut self, idx: usize) {
        let last = self.nodes[TAIL].prev;
        self.nodes[idx].prev = last;
        self.nodes[idx].next = TAIL;
        self.nodes[last].next = idx;
        self.nodes[TAIL].prev = idx;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn alloc_node(&mut self, key: K, value: V) -> usize {
        let node = Node {
            entry: Some((key, value)),
            prev: HEAD,
            next: TAIL,
        };
        if let Some(idx) = self.free_list.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Unlink a live node and return its slot to the free list
    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        self.free_list.push(idx);
        self.nodes[idx].entry.take()
    }
}

impl<K, V> LruCache<K, V> for LruCore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn add(&mut self, key: K, value: V) {
        LruCore::add(self, key, value);
    }

    fn find(&mut self, key: &K) -> Option<V> {
        LruCore::find(self, key).cloned()
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        LruCore::remove(self, key)
    }

    fn size(&self) -> usize {
        LruCore::size(self)
    }

    fn capacity(&self) -> usize {
        LruCore::capacity(self)
    }

    fn traverse(&self, direction: Direction) -> Result<Traversal<K, V>> {
        Ok(Traversal::buffered(collect_traversal(self, direction)))
    }

    fn traverse_simple(&self, direction: Direction) -> Result<Receiver<(K, V)>> {
        Ok(collect_traversal(self, direction))
    }
}

/// Borrowing walk over live entries, see [`LruCore::iter`]
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    cursor: usize,
    direction: Direction,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == HEAD || self.cursor == TAIL {
            return None;
        }
        let nodes = self.nodes;
        let node = &nodes[self.cursor];
        self.cursor = match self.direction {
            Direction::Forward => node.next,
            Direction::Reverse => node.prev,
        };
        self.remaining -= 1;
        node.entry.as_ref().map(|(key, value)| (key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn keys(cache: &LruCore<i32, i32>, direction: Direction) -> Vec<i32> {
        cache.iter(direction).map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut cache = LruCore::new(2).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");

        assert_eq!(cache.find(&1), Some(&"a"));
        assert_eq!(cache.find(&2), Some(&"b"));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_lru_zero_capacity() {
        assert!(matches!(
            LruCore::<i32, i32>::new(0),
            Err(Error::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = LruCore::new(2).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        cache.add(3, "c"); // Should evict 1

        assert_eq!(cache.find(&1), None);
        assert_eq!(cache.find(&2), Some(&"b"));
        assert_eq!(cache.find(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_eviction_single_per_overflow() {
        let mut cache = LruCore::new(10).unwrap();
        for i in 0..=10 {
            cache.add(i, i);
        }

        assert_eq!(cache.size(), 10);
        assert!(!cache.contains(&0));
        assert_eq!(keys(&cache, Direction::Forward), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_lru_eviction_quarter() {
        let config = CacheConfig::builder()
            .capacity(10)
            .eviction(EvictionMode::Quarter)
            .build();
        let mut cache = LruCore::with_config(&config).unwrap();
        for i in 0..=10 {
            cache.add(i, i);
        }
        // 11 entries overflow 10; a quarter (2) go at once.
        assert_eq!(cache.size(), 9);
        assert_eq!(keys(&cache, Direction::Forward), (2..=10).collect::<Vec<_>>());

        let config = CacheConfig::builder()
            .capacity(100)
            .eviction(EvictionMode::Quarter)
            .build();
        let mut cache = LruCore::with_config(&config).unwrap();
        for i in 0..=100 {
            cache.add(i, i);
        }
        assert_eq!(cache.size(), 76);
    }

    #[test]
    fn test_lru_find_promotes() {
        let mut cache = LruCore::new(3).unwrap();

        cache.add(1, 1);
        cache.add(2, 2);
        cache.add(3, 3);
        cache.find(&1);
        assert_eq!(keys(&cache, Direction::Forward), vec![2, 3, 1]);

        cache.add(4, 4); // Should evict 2
        assert_eq!(keys(&cache, Direction::Forward), vec![3, 1, 4]);
    }

    #[test]
    fn test_lru_find_miss_keeps_order() {
        let mut cache = LruCore::new(10).unwrap();

        cache.add(1, 1);
        cache.add(2, 2);
        cache.add(3, 3);
        cache.find(&2);
        let before = keys(&cache, Direction::Reverse);

        assert_eq!(cache.find(&4), None);
        assert_eq!(keys(&cache, Direction::Reverse), before);
        assert_eq!(before, vec![2, 3, 1]);
    }

    #[test]
    fn test_lru_peek_does_not_promote() {
        let mut cache = LruCore::new(2).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        assert_eq!(cache.peek(&1), Some(&"a"));
        cache.add(3, "c"); // 1 is still the oldest

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_lru_update() {
        let mut cache = LruCore::new(2).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        cache.find(&1); // Move 1 to the back
        cache.add(3, "c"); // Should evict 2

        assert_eq!(cache.find(&1), Some(&"a"));
        assert_eq!(cache.find(&2), None);
        assert_eq!(cache.find(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_overwrite() {
        let mut cache = LruCore::new(3).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        cache.add(3, "c");
        cache.add(2, "B"); // Overwrite and promote

        assert_eq!(cache.size(), 3);
        let pairs: Vec<_> = cache.iter(Direction::Reverse).map(|(k, v)| (*k, *v)).collect();
        assert_eq!(pairs, vec![(2, "B"), (3, "c"), (1, "a")]);
    }

    #[test]
    fn test_lru_remove() {
        let mut cache = LruCore::new(3).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        cache.add(3, "c");

        assert_eq!(cache.remove(&2), Some("b"));
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.find(&2), None);
        assert_eq!(cache.remove(&2), None);
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_lru_remove_absent_keeps_order() {
        let mut cache = LruCore::new(10).unwrap();

        cache.add(1, 1);
        cache.add(2, 2);
        cache.add(3, 3);
        cache.find(&1);
        let before = keys(&cache, Direction::Forward);

        assert_eq!(cache.remove(&4), None);
        assert_eq!(keys(&cache, Direction::Forward), before);
        assert_eq!(before, vec![2, 3, 1]);
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_lru_huge_capacity() {
        let mut cache = LruCore::<u64, u64>::new(usize::MAX).unwrap();

        assert_eq!(cache.capacity(), usize::MAX);
        assert!(cache.nodes.capacity() <= PREALLOC_LIMIT + 3);
        for i in 0..2000 {
            cache.add(i, i);
        }
        assert_eq!(cache.size(), 2000);
        assert_eq!(cache.find(&0), Some(&0));
    }

    #[test]
    fn test_lru_remove_reuses_slots() {
        let mut cache = LruCore::new(4).unwrap();
        for round in 0..100 {
            cache.add(round, round);
            if round % 2 == 0 {
                cache.remove(&round);
            }
        }

        assert_eq!(cache.size(), 4);
        assert!(cache.nodes.len() <= cache.capacity() + 3);
        assert_eq!(keys(&cache, Direction::Forward), vec![93, 95, 97, 99]);
    }

    #[test]
    fn test_lru_clear() {
        let mut cache = LruCore::new(3).unwrap();

        cache.add(1, "a");
        cache.add(2, "b");
        cache.clear();

        assert_eq!(cache.size(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.iter(Direction::Forward).count(), 0);

        cache.add(3, "c");
        assert_eq!(cache.find(&3), Some(&"c"));
    }

    #[test]
    fn test_lru_iter_directions() {
        let mut cache = LruCore::new(10).unwrap();
        for i in 0..10 {
            cache.add(i, i);
        }

        let forward = keys(&cache, Direction::Forward);
        let mut reverse = keys(&cache, Direction::Reverse);
        reverse.reverse();

        assert_eq!(forward, (0..10).collect::<Vec<_>>());
        assert_eq!(forward, reverse);
        assert_eq!(cache.iter(Direction::Forward).len(), 10);
    }

    #[test]
    fn test_lru_iter_empty() {
        let cache = LruCore::<i32, i32>::new(1).unwrap();

        assert_eq!(cache.iter(Direction::Forward).next(), None);
        assert_eq!(cache.iter(Direction::Reverse).len(), 0);
    }

    #[test]
    fn test_lru_trait_traversal() {
        let mut cache = LruCore::new(10).unwrap();
        for i in 0..10 {
            LruCache::add(&mut cache, i, i);
        }

        let mut traversal = LruCache::traverse(&cache, Direction::Reverse).unwrap();
        let mut seen = Vec::new();
        while let Some((k, _)) = traversal.next() {
            seen.push(k);
            if k == 5 {
                traversal.stop();
            }
        }
        assert_eq!(seen, vec![9, 8, 7, 6, 5]);

        let rx = LruCache::traverse_simple(&cache, Direction::Forward).unwrap();
        assert_eq!(rx.iter().map(|(k, _)| k).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
        assert_eq!(LruCache::find(&mut cache, &3), Some(3));
    }

    #[test]
    fn test_lru_capacity_one() {
        let mut cache = LruCore::new(1).unwrap();

        cache.add(1, 1);
        cache.add(2, 2);

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.peek(&1), None);
        assert_eq!(cache.peek(&2), Some(&2));
    }
}
