use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    InterceptedNodesCache, RequestHandler, TrieSyncArgs, TrieSyncBackend, TrieSyncError,
    TrieSyncStatistics,
};

/// Lowest accepted timeout between two received trie nodes
pub const MIN_TIMEOUT_BETWEEN_NODES_COMMITS: Duration = Duration::from_secs(1);
pub const DEFAULT_TIMEOUT_BETWEEN_NODES_COMMITS: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_HARD_CAP_FOR_MISSING_NODES: usize = 5_000;
/// Nodes bigger than this are reported as large, 1 MiB
pub const DEFAULT_LARGE_NODE_THRESHOLD: usize = 1 << 20;
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_INTERCEPTED_NODES_CAPACITY: usize = 50_000;
pub const DEFAULT_TRIE_NODES_TOPIC: &str = "trieNodes";

const ENV_PREFIX: &str = "TRIE_SYNC_";

/// Plain settings for a trie sync session.
/// Every field falls back to its default when absent, e.g. `TRIE_SYNC_TOPIC` or
/// `TRIE_SYNC_MAX_HARD_CAP_FOR_MISSING_NODES` when read from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieSyncConfig {
    pub shard_id: u32,
    pub topic: String,
    pub timeout_between_commits_ms: u64,
    pub max_hard_cap_for_missing_nodes: usize,
    pub large_node_threshold: usize,
    pub request_interval_ms: u64,
    pub intercepted_nodes_capacity: usize,
}

impl Default for TrieSyncConfig {
    fn default() -> Self {
        Self {
            shard_id: 0,
            topic: DEFAULT_TRIE_NODES_TOPIC.to_string(),
            timeout_between_commits_ms: as_millis(DEFAULT_TIMEOUT_BETWEEN_NODES_COMMITS),
            max_hard_cap_for_missing_nodes: DEFAULT_MAX_HARD_CAP_FOR_MISSING_NODES,
            large_node_threshold: DEFAULT_LARGE_NODE_THRESHOLD,
            request_interval_ms: as_millis(DEFAULT_REQUEST_INTERVAL),
            intercepted_nodes_capacity: DEFAULT_INTERCEPTED_NODES_CAPACITY,
        }
    }
}

const fn as_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl TrieSyncConfig {
    /// Reads the `TRIE_SYNC_*` environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    /// Same as [`Self::from_env`] but over an explicit set of variables
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_iter(vars)
    }

    pub fn timeout_between_commits(&self) -> Duration {
        Duration::from_millis(self.timeout_between_commits_ms)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn new_intercepted_nodes_cache(&self) -> Result<InterceptedNodesCache, TrieSyncError> {
        InterceptedNodesCache::new(self.intercepted_nodes_capacity)
    }

    /// Builds the syncer arguments out of these settings and the given collaborators
    pub fn into_args(
        self,
        request_handler: Arc<dyn RequestHandler>,
        intercepted_nodes: Arc<InterceptedNodesCache>,
        trie: Arc<dyn TrieSyncBackend>,
        trie_sync_statistics: Arc<TrieSyncStatistics>,
    ) -> TrieSyncArgs {
        TrieSyncArgs {
            request_handler: Some(request_handler),
            intercepted_nodes: Some(intercepted_nodes),
            trie: Some(trie),
            shard_id: self.shard_id,
            timeout_between_trie_nodes_commits: self.timeout_between_commits(),
            max_hard_cap_for_missing_nodes: self.max_hard_cap_for_missing_nodes,
            large_node_threshold: self.large_node_threshold,
            request_interval: self.request_interval(),
            trie_sync_statistics: Some(trie_sync_statistics),
            topic: self.topic,
        }
    }
}
