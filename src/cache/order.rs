//! Eviction Order Module
//!
//! Tracks which key leaves the store next under either eviction policy.

use std::collections::VecDeque;

use crate::cache::CacheKey;

// == Eviction Order ==
/// Ordered sequence of every live key.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently inserted or touched
/// - Back = Next eviction candidate
///
/// The store decides when to call [`touch`](Self::touch): LRU touches on
/// every hit and update, FIFO only on insert and update.
#[derive(Debug, Default)]
pub struct EvictionOrder {
    order: VecDeque<CacheKey>,
}

impl EvictionOrder {
    // == Constructor ==
    /// Creates an empty order.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Moves a key to the front, inserting it if it is not tracked yet.
    pub fn touch(&mut self, key: &CacheKey) {
        if self.order.front() == Some(key) {
            return;
        }
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    /// Removes a key from the order. Returns false if it was not tracked.
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(index) => {
                self.order.remove(index);
                true
            }
            None => false,
        }
    }

    // == Pop Back ==
    /// Returns and removes the next eviction candidate.
    ///
    /// Returns None if the order is empty.
    pub fn pop_back(&mut self) -> Option<CacheKey> {
        self.order.pop_back()
    }

    /// Iterates keys from most recent to next eviction candidate.
    pub fn iter(&self) -> impl Iterator<Item = &CacheKey> {
        self.order.iter()
    }

    /// Forgets every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> CacheKey {
        CacheKey::new(id, false, 0, 0)
    }

    #[test]
    fn test_order_new() {
        let order = EvictionOrder::new();
        assert!(order.is_empty());
        assert_eq!(order.len(), 0);
        assert_eq!(order.iter().next(), None);
    }

    #[test]
    fn test_touch_new_keys() {
        let mut order = EvictionOrder::new();

        order.touch(&key("a"));
        order.touch(&key("b"));
        order.touch(&key("c"));

        assert_eq!(order.len(), 3);
        // a was added first, so it is the next candidate
        assert_eq!(order.iter().last(), Some(&key("a")));
    }

    #[test]
    fn test_touch_existing_key_moves_to_front() {
        let mut order = EvictionOrder::new();

        order.touch(&key("a"));
        order.touch(&key("b"));
        order.touch(&key("c"));
        order.touch(&key("a"));

        assert_eq!(order.len(), 3);
        let ids: Vec<&str> = order.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_touch_same_key_repeatedly() {
        let mut order = EvictionOrder::new();

        order.touch(&key("a"));
        order.touch(&key("a"));
        order.touch(&key("a"));

        assert_eq!(order.len(), 1);
        assert_eq!(order.pop_back(), Some(key("a")));
        assert!(order.is_empty());
    }

    #[test]
    fn test_pop_back_order() {
        let mut order = EvictionOrder::new();

        // touch(a): [a]; touch(b): [b, a]; touch(c): [c, b, a]
        // touch(a): [a, c, b]; touch(c): [c, a, b]; touch(b): [b, c, a]
        for id in ["a", "b", "c", "a", "c", "b"] {
            order.touch(&key(id));
        }

        assert_eq!(order.pop_back(), Some(key("a")));
        assert_eq!(order.pop_back(), Some(key("c")));
        assert_eq!(order.pop_back(), Some(key("b")));
        assert_eq!(order.pop_back(), None);
    }

    #[test]
    fn test_remove() {
        let mut order = EvictionOrder::new();

        order.touch(&key("a"));
        order.touch(&key("b"));

        assert!(order.remove(&key("a")));
        assert!(!order.remove(&key("a")));
        assert!(!order.remove(&key("missing")));
        assert_eq!(order.len(), 1);
    }

    #[test]
    fn test_keys_differing_only_in_indices_are_distinct() {
        let mut order = EvictionOrder::new();

        order.touch(&CacheKey::new("a", false, 0, 0));
        order.touch(&CacheKey::new("a", false, 0, 1));

        assert_eq!(order.len(), 2);
    }
}
