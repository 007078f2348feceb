//! Holds trie nodes received from the network until a syncer consumes them.
//! Nodes may arrive before anyone asked for them (e.g. broadcasts), so the cache
//! is bounded and evicts the least recently used entries.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use ethereum_types::H256;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use shardnode_trie::{Node, TrieError, keccak};
use tracing::trace;

use crate::error::TrieSyncError;

/// Trie node as received from the network: its encoding, the decoded node and the hash of the encoding
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptedTrieNode {
    hash: H256,
    node: Node,
    encoded: Bytes,
}

impl InterceptedTrieNode {
    /// Decodes the received bytes and hashes them
    pub fn new(encoded: impl Into<Bytes>) -> Result<Self, TrieError> {
        let encoded = encoded.into();
        let node = Node::decode_raw(&encoded)?;
        Ok(Self {
            hash: keccak(&encoded),
            node,
            encoded,
        })
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    pub fn size_in_bytes(&self) -> usize {
        self.encoded.len()
    }
}

pub type HandlerId = u64;

type InterceptedNodeHandler = Arc<dyn Fn(H256, &InterceptedTrieNode) + Send + Sync>;

/// Capacity-bounded cache of intercepted trie nodes.
/// Every registered handler is notified of each inserted node.
pub struct InterceptedNodesCache {
    nodes: Mutex<LruCache<H256, InterceptedTrieNode>>,
    handlers: RwLock<Vec<(HandlerId, InterceptedNodeHandler)>>,
    next_handler_id: AtomicU64,
}

impl InterceptedNodesCache {
    pub fn new(capacity: usize) -> Result<Self, TrieSyncError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(TrieSyncError::InvalidCacheCapacity)?;
        Ok(Self {
            nodes: Mutex::new(LruCache::new(capacity)),
            handlers: RwLock::new(Vec::new()),
            next_handler_id: AtomicU64::new(0),
        })
    }

    /// Stores the node under the given hash and notifies the registered handlers.
    /// Returns true if another entry had to be evicted to make room.
    pub fn put(&self, hash: H256, node: InterceptedTrieNode) -> bool {
        let evicted = self
            .nodes
            .lock()
            .push(hash, node.clone())
            .is_some_and(|(evicted_hash, _)| evicted_hash != hash);
        if evicted {
            trace!(%hash, "Intercepted nodes cache full, evicted oldest entry");
        }

        // Handlers run without holding any cache lock
        let handlers: Vec<InterceptedNodeHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(hash, &node);
        }

        evicted
    }

    /// Decodes a node received from the network and stores it under its own hash
    pub fn put_encoded(&self, encoded: impl Into<Bytes>) -> Result<H256, TrieError> {
        let node = InterceptedTrieNode::new(encoded)?;
        let hash = node.hash();
        self.put(hash, node);
        Ok(hash)
    }

    /// Returns the node, marking it as recently used
    pub fn get(&self, hash: &H256) -> Option<InterceptedTrieNode> {
        self.nodes.lock().get(hash).cloned()
    }

    /// Returns the node without updating its position in the cache
    pub fn peek(&self, hash: &H256) -> Option<InterceptedTrieNode> {
        self.nodes.lock().peek(hash).cloned()
    }

    pub fn remove(&self, hash: &H256) -> Option<InterceptedTrieNode> {
        self.nodes.lock().pop(hash)
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.nodes.lock().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }

    pub fn clear(&self) {
        self.nodes.lock().clear();
    }

    /// Registers a handler invoked for every node put into the cache
    pub fn register_handler(
        &self,
        handler: impl Fn(H256, &InterceptedTrieNode) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    pub fn unregister_handler(&self, id: HandlerId) {
        self.handlers
            .write()
            .retain(|(handler_id, _)| *handler_id != id);
    }

    pub fn num_handlers(&self) -> usize {
        self.handlers.read().len()
    }
}

impl std::fmt::Debug for InterceptedNodesCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedNodesCache")
            .field("len", &self.len())
            .field("handlers", &self.num_handlers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardnode_trie::{LeafNode, Nibbles};
    use std::sync::atomic::AtomicUsize;

    fn encoded_leaf(key: u8) -> Vec<u8> {
        Node::from(LeafNode::new(Nibbles::from_bytes(&[key]), vec![key; 4])).encode_raw()
    }

    #[test]
    fn intercepted_node_hashes_its_encoding() {
        let encoded = encoded_leaf(1);
        let node = InterceptedTrieNode::new(encoded.clone()).unwrap();

        assert_eq!(node.hash(), keccak(&encoded));
        assert_eq!(node.size_in_bytes(), encoded.len());
        assert_eq!(node.node().compute_hash(), node.hash());
    }

    #[test]
    fn intercepted_node_rejects_garbage() {
        assert!(InterceptedTrieNode::new(vec![0x01, 0x02]).is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            InterceptedNodesCache::new(0),
            Err(TrieSyncError::InvalidCacheCapacity)
        ));
    }

    #[test]
    fn put_get_remove() {
        let cache = InterceptedNodesCache::new(10).unwrap();
        let hash = cache.put_encoded(encoded_leaf(1)).unwrap();

        assert!(cache.contains(&hash));
        assert_eq!(cache.peek(&hash).map(|n| n.hash()), Some(hash));
        assert_eq!(cache.get(&hash).map(|n| n.hash()), Some(hash));
        assert!(cache.remove(&hash).is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let cache = InterceptedNodesCache::new(2).unwrap();
        let first = cache.put_encoded(encoded_leaf(1)).unwrap();
        let second = cache.put_encoded(encoded_leaf(2)).unwrap();
        let third = InterceptedTrieNode::new(encoded_leaf(3)).unwrap();

        assert!(cache.put(third.hash(), third.clone()));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&first));
        assert!(cache.contains(&second));
        assert!(cache.contains(&third.hash()));
    }

    #[test]
    fn handlers_are_notified_until_unregistered() {
        let cache = InterceptedNodesCache::new(10).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let id = cache.register_handler(move |hash, node| {
            assert_eq!(hash, node.hash());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.put_encoded(encoded_leaf(1)).unwrap();
        cache.put_encoded(encoded_leaf(2)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.unregister_handler(id);
        cache.put_encoded(encoded_leaf(3)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.num_handlers(), 0);
    }
}
