//! In-process peer answering trie node requests out of a local store.
//! Used to exercise the syncer without a network, with optional latency and packet loss.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use ethereum_types::H256;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};
use shardnode_trie::{Trie, TrieDB, TrieError};
use tracing::{trace, warn};

use crate::{InterceptedNodesCache, RequestHandler};

pub struct LoopbackPeer {
    source: Arc<dyn TrieDB>,
    destination: Arc<InterceptedNodesCache>,
    latency: Duration,
    drop_rate: f64,
    rng: Mutex<StdRng>,
    num_requests: AtomicU64,
    num_served: AtomicU64,
}

impl LoopbackPeer {
    /// Serves nodes from `source` into `destination`, immediately and without losses
    pub fn new(source: Arc<dyn TrieDB>, destination: Arc<InterceptedNodesCache>) -> Self {
        Self {
            source,
            destination,
            latency: Duration::ZERO,
            drop_rate: 0.0,
            rng: Mutex::new(StdRng::from_entropy()),
            num_requests: AtomicU64::new(0),
            num_served: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Probability of silently dropping each requested node, clamped to [0, 1]
    pub fn with_drop_rate(mut self, drop_rate: f64) -> Self {
        self.drop_rate = drop_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn num_requests(&self) -> u64 {
        self.num_requests.load(Ordering::Relaxed)
    }

    /// Amount of nodes sent back so far
    pub fn num_served(&self) -> u64 {
        self.num_served.load(Ordering::Relaxed)
    }

    fn answer(&self, hashes: &[H256]) -> Vec<Vec<u8>> {
        let mut rng = self.rng.lock();
        let mut answers = Vec::with_capacity(hashes.len());
        for hash in hashes {
            if self.drop_rate > 0.0 && rng.gen_bool(self.drop_rate) {
                trace!(%hash, "Dropping trie node request");
                continue;
            }
            match self.source.get(*hash) {
                Ok(Some(encoded)) => answers.push(encoded),
                Ok(None) => trace!(%hash, "Requested trie node not found"),
                Err(err) => warn!(%hash, %err, "Failed to read requested trie node"),
            }
        }
        answers
    }
}

fn deliver(destination: &InterceptedNodesCache, answers: Vec<Vec<u8>>) {
    for encoded in answers {
        if let Err(err) = destination.put_encoded(encoded) {
            warn!(%err, "Failed to decode served trie node");
        }
    }
}

impl RequestHandler for LoopbackPeer {
    fn request_trie_nodes(&self, dest_shard_id: u32, hashes: &[H256], topic: &str) {
        self.num_requests.fetch_add(1, Ordering::Relaxed);
        trace!(dest_shard_id, topic, num_hashes = hashes.len(), "Serving trie node request");

        let answers = self.answer(hashes);
        self.num_served.fetch_add(answers.len() as u64, Ordering::Relaxed);

        let destination = self.destination.clone();
        let latency = self.latency;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    deliver(&destination, answers);
                });
            }
            // Outside of a runtime answers are delivered right away
            Err(_) => deliver(&destination, answers),
        }
    }
}

/// Fills the trie with `num_leaves` random 32-byte keys and returns its committed root
pub fn populate_random_trie(
    trie: &mut Trie,
    num_leaves: usize,
    rng: &mut impl Rng,
) -> Result<H256, TrieError> {
    for _ in 0..num_leaves {
        let key: [u8; 32] = rng.r#gen();
        let value_len = rng.gen_range(1..=64);
        let value: Vec<u8> = (0..value_len).map(|_| rng.r#gen()).collect();
        trie.insert(key.to_vec(), value)?;
    }
    trie.hash()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardnode_trie::InMemoryTrieDB;

    fn source() -> (InMemoryTrieDB, H256) {
        let db = InMemoryTrieDB::new_empty();
        let mut trie = Trie::new(Arc::new(db.clone()));
        let root = populate_random_trie(&mut trie, 50, &mut StdRng::seed_from_u64(7)).unwrap();
        (db, root)
    }

    #[test]
    fn serves_known_nodes_outside_runtime() {
        let (db, root) = source();
        let cache = Arc::new(InterceptedNodesCache::new(100).unwrap());
        let peer = LoopbackPeer::new(Arc::new(db), cache.clone());

        peer.request_trie_nodes(0, &[root, H256::repeat_byte(9)], "trieNodes");

        assert!(cache.contains(&root));
        assert_eq!(cache.len(), 1);
        assert_eq!(peer.num_requests(), 1);
        assert_eq!(peer.num_served(), 1);
    }

    #[test]
    fn full_drop_rate_serves_nothing() {
        let (db, root) = source();
        let cache = Arc::new(InterceptedNodesCache::new(100).unwrap());
        let peer = LoopbackPeer::new(Arc::new(db), cache.clone())
            .with_drop_rate(3.0)
            .with_seed(1);

        peer.request_trie_nodes(0, &[root], "trieNodes");

        assert!(cache.is_empty());
        assert_eq!(peer.num_served(), 0);
    }

    #[tokio::test]
    async fn delivers_after_latency_inside_runtime() {
        let (db, root) = source();
        let cache = Arc::new(InterceptedNodesCache::new(100).unwrap());
        let peer = LoopbackPeer::new(Arc::new(db), cache.clone())
            .with_latency(Duration::from_millis(20));

        peer.request_trie_nodes(0, &[root], "trieNodes");
        assert!(cache.is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.contains(&root));
    }

    #[test]
    fn random_tries_store_every_node_under_its_hash() {
        let (db, root) = source();
        let entries = db.entries().unwrap();
        assert!(entries.contains_key(&root));
        for (hash, encoded) in entries {
            assert_eq!(shardnode_trie::keccak(&encoded), hash);
        }
    }
}
