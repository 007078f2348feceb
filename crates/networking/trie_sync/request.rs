use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use ethereum_types::H256;
use parking_lot::Mutex;

/// Sends trie node requests to the peers of a shard.
/// Requests are fire-and-forget, answers are delivered through the intercepted nodes cache.
pub trait RequestHandler: Send + Sync {
    fn request_trie_nodes(&self, dest_shard_id: u32, hashes: &[H256], topic: &str);
}

/// Remembers which hashes were requested recently so they are not asked for again
/// before `span` has elapsed.
#[derive(Debug)]
pub struct RequestedItems {
    span: Duration,
    items: Mutex<HashMap<H256, Instant>>,
}

impl RequestedItems {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Marks the hash as requested now
    pub fn add(&self, hash: H256) {
        self.items.lock().insert(hash, Instant::now());
    }

    /// Returns true if the hash was requested less than `span` ago
    pub fn has(&self, hash: &H256) -> bool {
        self.items
            .lock()
            .get(hash)
            .is_some_and(|requested_at| requested_at.elapsed() < self.span)
    }

    /// Drops every entry older than `span`
    pub fn sweep(&self) {
        let span = self.span;
        self.items
            .lock()
            .retain(|_, requested_at| requested_at.elapsed() < span);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_hash_is_reported_within_span() {
        let requested = RequestedItems::new(Duration::from_secs(60));
        let hash = H256::repeat_byte(1);

        assert!(!requested.has(&hash));
        requested.add(hash);
        assert!(requested.has(&hash));
        assert!(!requested.has(&H256::repeat_byte(2)));
    }

    #[test]
    fn entries_expire_after_span() {
        let requested = RequestedItems::new(Duration::from_millis(10));
        let hash = H256::repeat_byte(1);
        requested.add(hash);

        std::thread::sleep(Duration::from_millis(20));

        assert!(!requested.has(&hash));
        assert_eq!(requested.len(), 1);
        requested.sweep();
        assert!(requested.is_empty());
    }
}
