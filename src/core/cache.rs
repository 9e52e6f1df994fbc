// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Bounded LRU cache
//!
//! Associative container with least-recently-used eviction at a fixed
//! capacity. Entries live in an arena threaded by a doubly-linked recency
//! list; the map stores arena indices, so a lookup bump is O(1).

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Clone, Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// A bounded associative container with LRU eviction.
///
/// # Example
///
/// ```
/// # use ropt::core::cache::LruCache;
/// let mut cache = LruCache::new(2);
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// cache.insert("c", 3); // evicts "a"
/// assert_eq!(cache.get(&"a"), None);
/// assert_eq!(cache.get(&"b"), Some(&2));
/// assert_eq!(cache.get(&"c"), Some(&3));
/// ```
#[derive(Clone, Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K: Clone + Eq + Hash, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "LRU cache capacity must be positive");
        LruCache {
            capacity,
            map: HashMap::with_capacity(capacity + 1),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// True when `key` is stored. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let index = *self.map.get(key)?;
        self.detach(index);
        self.push_front(index);
        Some(&self.nodes[index].value)
    }

    /// Look up `key` without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|&index| &self.nodes[index].value)
    }

    /// Insert `key -> value`, marking it most recently used.
    ///
    /// Replaces the value when the key is already present. When the cache is
    /// full, the least-recently-used entry is evicted and returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&index) = self.map.get(&key) {
            self.nodes[index].value = value;
            self.detach(index);
            self.push_front(index);
            return None;
        }

        if self.map.len() == self.capacity {
            // Recycle the least-recently-used slot in place.
            let lru = self.tail;
            self.detach(lru);
            let node = &mut self.nodes[lru];
            self.map.remove(&node.key);
            let old_key = std::mem::replace(&mut node.key, key.clone());
            let old_value = std::mem::replace(&mut node.value, value);
            self.map.insert(key, lru);
            self.push_front(lru);
            return Some((old_key, old_value));
        }

        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = Node {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                };
                index
            }
            None => {
                self.nodes.push(Node {
                    key: key.clone(),
                    value,
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            }
        };
        self.map.insert(key, index);
        self.push_front(index);
        None
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        let mut order = Vec::with_capacity(self.map.len());
        let mut cursor = self.head;
        while cursor != NIL {
            order.push(&self.nodes[cursor].key);
            cursor = self.nodes[cursor].next;
        }
        order.into_iter()
    }

    fn detach(&mut self, index: usize) {
        let (prev, next) = (self.nodes[index].prev, self.nodes[index].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else if self.head == index {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else if self.tail == index {
            self.tail = prev;
        }
        self.nodes[index].prev = NIL;
        self.nodes[index].next = NIL;
    }

    fn push_front(&mut self, index: usize) {
        self.nodes[index].prev = NIL;
        self.nodes[index].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = index;
        }
        self.head = index;
        if self.tail == NIL {
            self.tail = index;
        }
    }
}
