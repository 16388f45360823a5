//! Fixed-capacity LRU cache shared between the ingest and arbitration loops
//!
//! [`LruState`] is the single-threaded structure: a hash index into a slab of
//! nodes threaded on a doubly linked recency list, giving O(1) get, put and
//! evict. [`BoundedCache`] wraps it in a `tokio::sync::Mutex` so every
//! operation, including the `get_all` snapshot, is serialized per instance.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use recon_common::Entity;
use tokio::sync::Mutex;

/// Cache of entity snapshots keyed by entity id
pub type EntityCache = BoundedCache<String, Entity>;

struct Node<K, V> {
    key: K,
    value: V,
    /// Towards the most recently used end
    prev: Option<usize>,
    /// Towards the least recently used end
    next: Option<usize>,
}

/// Recency-ordered map with a hard capacity
pub struct LruState<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used, next to be evicted
    tail: Option<usize>,
    capacity: usize,
}

impl<K, V> LruState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty cache. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or replace `key`, making it the most recent entry.
    ///
    /// Returns the entry evicted to make room, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&slot) = self.index.get(&key) {
            self.nodes[slot].value = value;
            self.touch(slot);
            return None;
        }

        let evicted = if self.nodes.len() >= self.capacity {
            self.tail.map(|lru| self.remove_slot(lru))
        } else {
            None
        };

        let slot = self.nodes.len();
        self.nodes.push(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.index.insert(key, slot);
        self.push_front(slot);

        evicted
    }

    /// Look up `key` and mark it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        self.touch(slot);
        Some(&self.nodes[slot].value)
    }

    /// Look up `key` without changing recency
    #[cfg(test)]
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&slot| &self.nodes[slot].value)
    }

    /// Mutable access to the value for `key` without changing recency
    pub fn peek_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(&mut self.nodes[slot].value)
    }

    #[cfg(test)]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        Some(self.remove_slot(slot).1)
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|node| node.key.clone()).collect()
    }

    fn iter(&self) -> impl Iterator<Item = &Node<K, V>> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let slot = cursor?;
            let node = &self.nodes[slot];
            cursor = node.next;
            Some(node)
        })
    }

    fn touch(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        match self.head {
            Some(old_head) => self.nodes[old_head].prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[slot].prev = None;
        self.nodes[slot].next = None;
    }

    /// Unlink and swap-remove `slot`, re-pointing the node moved into it
    fn remove_slot(&mut self, slot: usize) -> (K, V) {
        self.unlink(slot);
        let last = self.nodes.len() - 1;
        let node = self.nodes.swap_remove(slot);
        self.index.remove(&node.key);

        if slot != last {
            let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(slot),
                None => self.head = Some(slot),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(slot),
                None => self.tail = Some(slot),
            }
            let moved_key = self.nodes[slot].key.clone();
            self.index.insert(moved_key, slot);
        }

        (node.key, node.value)
    }
}

impl<K, V> LruState<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Values from most to least recently used
    pub fn values(&self) -> Vec<V> {
        self.iter().map(|node| node.value.clone()).collect()
    }
}

/// [`LruState`] behind an async mutex
pub struct BoundedCache<K, V> {
    state: Mutex<LruState<K, V>>,
    capacity: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        let state = LruState::new(capacity);
        let capacity = state.capacity();
        Self {
            state: Mutex::new(state),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or replace; returns the key evicted to make room
    pub async fn put(&self, key: K, value: V) -> Option<K> {
        let mut state = self.state.lock().await;
        state.put(key, value).map(|(evicted, _)| evicted)
    }

    /// Clone of the value, refreshing its recency
    pub async fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock().await;
        state.get(key).cloned()
    }

    /// Point-in-time copy of every value, most recent first. Does not
    /// refresh recency.
    pub async fn get_all(&self) -> Vec<V> {
        let state = self.state.lock().await;
        state.values()
    }

    pub async fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock().await;
        state.remove(key)
    }

    /// Edit the current value for `key` in place under the lock.
    ///
    /// Never inserts, so an entry evicted in the meantime stays gone, and
    /// does not refresh recency. Returns what `update` returned, or `None`
    /// when the key is absent.
    pub async fn update_if_present<Q, R, F>(&self, key: &Q, update: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&mut V) -> R,
    {
        let mut state = self.state.lock().await;
        state.peek_mut(key).map(update)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }
}
