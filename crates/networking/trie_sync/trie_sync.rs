//! Trie synchronization: fetches a whole trie from peers given its root hash,
//! verifies every node against the hash it was requested by, and commits the
//! result to the local trie store.

mod backend;
pub mod config;
mod error;
mod intercepted;
pub mod loopback;
mod request;
mod statistics;
mod syncer;

pub use backend::TrieSyncBackend;
pub use config::TrieSyncConfig;
pub use error::TrieSyncError;
pub use intercepted::{HandlerId, InterceptedNodesCache, InterceptedTrieNode};
pub use request::{RequestHandler, RequestedItems};
pub use statistics::{TrieSyncStatistics, TrieSyncStatisticsSnapshot};
pub use syncer::{NodeSource, SyncStatus, TrieNodeInfo, TrieSyncArgs, TrieSyncer};
