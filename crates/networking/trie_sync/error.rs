use std::time::Duration;

use shardnode_trie::TrieError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieSyncError {
    #[error("nil request handler")]
    NilRequestHandler,
    #[error("nil intercepted nodes cacher")]
    NilCacher,
    #[error("nil trie")]
    NilTrie,
    #[error("invalid trie topic")]
    InvalidTrieTopic,
    #[error("nil trie sync statistics handler")]
    NilTrieSyncStatistics,
    #[error("invalid timeout between trie nodes commits: {timeout:?}, minimum is {minimum:?}")]
    InvalidTimeout {
        timeout: Duration,
        minimum: Duration,
    },
    #[error("invalid max hard cap for missing nodes: {0}, must be at least 1")]
    InvalidMaxHardCapForMissingNodes(usize),
    #[error("invalid request interval, must be greater than zero")]
    InvalidRequestInterval,
    #[error("invalid intercepted nodes cache capacity, must be greater than zero")]
    InvalidCacheCapacity,
    #[error("trie syncer was already started")]
    AlreadyStarted,
    #[error("time is out while waiting for trie nodes")]
    TimeIsOut,
    #[error("context closing")]
    ContextClosing,
    #[error(transparent)]
    Trie(#[from] TrieError),
}
