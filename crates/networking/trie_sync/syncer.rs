//! Rebuilds a trie locally starting from nothing but its root hash.
//!
//! The syncer keeps a table of every node hash it knows about. Hashes start out
//! unresolved and get resolved either by a node arriving from the network (through the
//! intercepted nodes cache) or by finding them in the local store. Every node received from
//! the network is decoded and its children are added to the table, as long as the amount of
//! unresolved hashes stays under the hard cap. Once nothing is left unresolved, the
//! received nodes are written to the store in a single batch.
//! Nodes found in the local store are taken as the root of a complete subtree and never descended into.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
    time::Duration,
};

use ethereum_types::H256;
use parking_lot::Mutex;
use shardnode_trie::{EMPTY_TRIE_HASH, TrieError};
use tokio::{sync::Notify, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    HandlerId, InterceptedNodesCache, InterceptedTrieNode, RequestHandler, RequestedItems,
    TrieSyncBackend, TrieSyncError, TrieSyncStatistics,
    config::{
        DEFAULT_LARGE_NODE_THRESHOLD, DEFAULT_MAX_HARD_CAP_FOR_MISSING_NODES,
        DEFAULT_REQUEST_INTERVAL, DEFAULT_TIMEOUT_BETWEEN_NODES_COMMITS, DEFAULT_TRIE_NODES_TOPIC,
        MIN_TIMEOUT_BETWEEN_NODES_COMMITS,
    },
};

/// Collaborators and settings of a [`TrieSyncer`], checked by [`TrieSyncer::new`]
#[derive(Clone)]
pub struct TrieSyncArgs {
    pub request_handler: Option<Arc<dyn RequestHandler>>,
    pub intercepted_nodes: Option<Arc<InterceptedNodesCache>>,
    pub trie: Option<Arc<dyn TrieSyncBackend>>,
    pub shard_id: u32,
    pub topic: String,
    pub trie_sync_statistics: Option<Arc<TrieSyncStatistics>>,
    /// Maximum time to wait without receiving any node
    pub timeout_between_trie_nodes_commits: Duration,
    /// Maximum amount of hashes known but not yet received
    pub max_hard_cap_for_missing_nodes: usize,
    pub large_node_threshold: usize,
    /// Time before a hash can be requested again
    pub request_interval: Duration,
}

impl Default for TrieSyncArgs {
    fn default() -> Self {
        Self {
            request_handler: None,
            intercepted_nodes: None,
            trie: None,
            shard_id: 0,
            topic: DEFAULT_TRIE_NODES_TOPIC.to_string(),
            trie_sync_statistics: None,
            timeout_between_trie_nodes_commits: DEFAULT_TIMEOUT_BETWEEN_NODES_COMMITS,
            max_hard_cap_for_missing_nodes: DEFAULT_MAX_HARD_CAP_FOR_MISSING_NODES,
            large_node_threshold: DEFAULT_LARGE_NODE_THRESHOLD,
            request_interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Resolving,
    Committing,
    Done,
    Failed,
}

/// Where a tracked node was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeSource {
    Network,
    /// Already in the local store, its subtree is not synced again
    Storage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrieNodeInfo {
    /// Only set for nodes received from the network
    pub node: Option<InterceptedTrieNode>,
    pub received: bool,
    pub source: Option<NodeSource>,
}

#[derive(Debug, Default)]
struct SyncState {
    nodes_for_trie: HashMap<H256, TrieNodeInfo>,
    /// Tracked hashes not received yet
    missing: HashSet<H256>,
    /// Received nodes whose children were not all added to the table yet
    to_expand: Vec<H256>,
    /// Hashes included in at least one request
    requested_once: HashSet<H256>,
    num_received: u64,
}

impl SyncState {
    /// Starts tracking the hash as missing, returns false if it was already known
    fn track(&mut self, hash: H256) -> bool {
        if self.nodes_for_trie.contains_key(&hash) {
            return false;
        }
        self.nodes_for_trie.insert(hash, TrieNodeInfo::default());
        self.missing.insert(hash);
        true
    }

    fn resolve_from_storage(&mut self, hash: H256) -> bool {
        let info = self.nodes_for_trie.entry(hash).or_default();
        if info.received {
            return false;
        }
        info.received = true;
        info.source = Some(NodeSource::Storage);
        self.missing.remove(&hash);
        self.num_received += 1;
        true
    }

    /// Records a node received from the network.
    /// Only applies to tracked hashes that were not received yet.
    fn mark_received(&mut self, hash: H256, node: InterceptedTrieNode) -> bool {
        let Some(info) = self.nodes_for_trie.get_mut(&hash) else {
            return false;
        };
        if info.received {
            return false;
        }
        info.node = Some(node);
        info.received = true;
        info.source = Some(NodeSource::Network);
        self.missing.remove(&hash);
        self.to_expand.push(hash);
        self.num_received += 1;
        true
    }

    fn is_synced(&self) -> bool {
        self.missing.is_empty() && self.to_expand.is_empty()
    }
}

/// Fetches every node of a trie given its root hash and commits them to the local store.
/// A syncer drives a single sync, build a new one for every root.
pub struct TrieSyncer {
    request_handler: Arc<dyn RequestHandler>,
    intercepted_nodes: Arc<InterceptedNodesCache>,
    trie: Arc<dyn TrieSyncBackend>,
    statistics: Arc<TrieSyncStatistics>,
    shard_id: u32,
    topic: String,
    timeout_between_commits: Duration,
    max_hard_cap_for_missing_nodes: usize,
    large_node_threshold: usize,
    request_interval: Duration,
    requested: RequestedItems,
    state: Mutex<SyncState>,
    status: Mutex<SyncStatus>,
    node_arrived: Notify,
    handler_id: HandlerId,
}

impl TrieSyncer {
    /// Validates the arguments and registers the syncer as a handler of the intercepted nodes cache
    pub fn new(args: TrieSyncArgs) -> Result<Arc<Self>, TrieSyncError> {
        let request_handler = args
            .request_handler
            .ok_or(TrieSyncError::NilRequestHandler)?;
        let intercepted_nodes = args.intercepted_nodes.ok_or(TrieSyncError::NilCacher)?;
        let trie = args.trie.ok_or(TrieSyncError::NilTrie)?;
        if args.topic.is_empty() {
            return Err(TrieSyncError::InvalidTrieTopic);
        }
        let statistics = args
            .trie_sync_statistics
            .ok_or(TrieSyncError::NilTrieSyncStatistics)?;
        if args.timeout_between_trie_nodes_commits < MIN_TIMEOUT_BETWEEN_NODES_COMMITS {
            return Err(TrieSyncError::InvalidTimeout {
                timeout: args.timeout_between_trie_nodes_commits,
                minimum: MIN_TIMEOUT_BETWEEN_NODES_COMMITS,
            });
        }
        if args.max_hard_cap_for_missing_nodes < 1 {
            return Err(TrieSyncError::InvalidMaxHardCapForMissingNodes(
                args.max_hard_cap_for_missing_nodes,
            ));
        }
        if args.request_interval.is_zero() {
            return Err(TrieSyncError::InvalidRequestInterval);
        }

        Ok(Arc::new_cyclic(|syncer: &Weak<TrieSyncer>| {
            let syncer = syncer.clone();
            let handler_id = intercepted_nodes.register_handler(move |hash, node| {
                if let Some(syncer) = syncer.upgrade() {
                    syncer.trie_node_intercepted(hash, node);
                }
            });
            TrieSyncer {
                request_handler,
                intercepted_nodes,
                trie,
                statistics,
                shard_id: args.shard_id,
                topic: args.topic,
                timeout_between_commits: args.timeout_between_trie_nodes_commits,
                max_hard_cap_for_missing_nodes: args.max_hard_cap_for_missing_nodes,
                large_node_threshold: args.large_node_threshold,
                request_interval: args.request_interval,
                requested: RequestedItems::new(args.request_interval),
                state: Mutex::new(SyncState::default()),
                status: Mutex::new(SyncStatus::Idle),
                node_arrived: Notify::new(),
                handler_id,
            }
        }))
    }

    /// Syncs the whole trie under `root_hash`.
    /// Returns once every node is committed, or fails with [`TrieSyncError::TimeIsOut`] if no node
    /// arrives within the configured timeout, or [`TrieSyncError::ContextClosing`] on cancellation.
    /// Nothing is written to the store unless the sync completes.
    pub async fn start_syncing(
        &self,
        root_hash: H256,
        cancel_token: &CancellationToken,
    ) -> Result<(), TrieSyncError> {
        {
            let mut status = self.status.lock();
            if *status != SyncStatus::Idle {
                return Err(TrieSyncError::AlreadyStarted);
            }
            *status = SyncStatus::Resolving;
        }

        self.statistics.start();
        let result = self.sync(root_hash, cancel_token).await;
        self.statistics.finish();

        let stats = self.statistics.snapshot();
        match &result {
            Ok(()) => {
                self.set_status(SyncStatus::Done);
                info!(
                    %root_hash,
                    requested = stats.num_requested,
                    distinct_requested = stats.num_distinct_requested,
                    received = stats.num_received,
                    bytes = stats.num_bytes_received,
                    large = stats.num_large,
                    max_missing = stats.max_num_missing,
                    elapsed = ?stats.elapsed,
                    "Trie sync finished"
                );
            }
            Err(err) => {
                self.set_status(SyncStatus::Failed);
                warn!(
                    %root_hash,
                    %err,
                    received = stats.num_received,
                    missing = stats.num_missing,
                    elapsed = ?stats.elapsed,
                    "Trie sync failed"
                );
            }
        }
        result
    }

    async fn sync(
        &self,
        root_hash: H256,
        cancel_token: &CancellationToken,
    ) -> Result<(), TrieSyncError> {
        if root_hash == *EMPTY_TRIE_HASH {
            debug!("Empty trie, nothing to sync");
            return Ok(());
        }
        if self.has_local_node(root_hash)? {
            debug!(%root_hash, "Trie root already in local storage");
            return Ok(());
        }

        self.state.lock().track(root_hash);
        self.statistics.set_num_missing(1);

        let mut deadline = Instant::now() + self.timeout_between_commits;
        let mut last_received = 0;
        loop {
            if cancel_token.is_cancelled() {
                return Err(TrieSyncError::ContextClosing);
            }

            self.resolve_pending()?;

            let (synced, num_received) = {
                let state = self.state.lock();
                (state.is_synced(), state.num_received)
            };
            if num_received > last_received {
                last_received = num_received;
                deadline = Instant::now() + self.timeout_between_commits;
            }
            if synced {
                break;
            }

            self.request_missing_nodes();

            let now = Instant::now();
            if now >= deadline {
                return Err(TrieSyncError::TimeIsOut);
            }
            let wake_at = deadline.min(now + self.request_interval);
            tokio::select! {
                _ = cancel_token.cancelled() => return Err(TrieSyncError::ContextClosing),
                _ = self.node_arrived.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }

        self.set_status(SyncStatus::Committing);
        if cancel_token.is_cancelled() {
            return Err(TrieSyncError::ContextClosing);
        }
        let num_nodes = self.commit(root_hash)?;
        debug!(%root_hash, num_nodes, "Committed synced trie nodes");
        Ok(())
    }

    /// Handles a node delivered by the network.
    /// Nodes nobody is waiting for, already received ones and nodes not matching
    /// the hash they were delivered under are ignored.
    pub fn trie_node_intercepted(&self, hash: H256, node: &InterceptedTrieNode) {
        if node.hash() != hash {
            trace!(
                %hash,
                computed = %node.hash(),
                "Ignoring trie node delivered under a wrong hash"
            );
            return;
        }
        {
            let mut state = self.state.lock();
            if !state.missing.contains(&hash) {
                trace!(%hash, "Ignoring trie node not being waited for");
                return;
            }
            self.record_network_node(&mut state, hash, node.clone());
        }
        self.intercepted_nodes.remove(&hash);
        self.node_arrived.notify_one();
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.lock()
    }

    pub fn node_info(&self, hash: &H256) -> Option<TrieNodeInfo> {
        self.state.lock().nodes_for_trie.get(hash).cloned()
    }

    /// Amount of tracked hashes not received yet
    pub fn num_missing(&self) -> usize {
        self.state.lock().missing.len()
    }

    pub fn num_tracked(&self) -> usize {
        self.state.lock().nodes_for_trie.len()
    }

    pub fn statistics(&self) -> &Arc<TrieSyncStatistics> {
        &self.statistics
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.lock() = status;
    }

    /// Consumes every awaited node already sitting in the intercepted nodes cache,
    /// resolves awaited hashes that showed up in the local store meanwhile and expands
    /// the received nodes, until nothing yields anything new
    fn resolve_pending(&self) -> Result<(), TrieSyncError> {
        let mut state = self.state.lock();
        loop {
            let mut changed = false;
            let missing: Vec<H256> = state.missing.iter().copied().collect();
            for hash in missing.iter() {
                if let Some(node) = self.intercepted_nodes.remove(hash) {
                    if node.hash() == *hash {
                        changed |= self.record_network_node(&mut state, *hash, node);
                    }
                }
            }
            for hash in missing {
                if state.missing.contains(&hash) && self.has_local_node(hash)? {
                    trace!(%hash, "Awaited trie node found in local storage");
                    changed |= state.resolve_from_storage(hash);
                }
            }
            changed |= self.expand_received_nodes(&mut state)?;
            if !changed {
                break;
            }
        }
        self.statistics.set_num_missing(state.missing.len() as u64);
        Ok(())
    }

    /// Adds the children of received nodes to the table.
    /// Children present in the local store are resolved right away, the rest become missing
    /// as long as the hard cap allows it. Parents left with unknown children are kept for the next pass.
    fn expand_received_nodes(&self, state: &mut SyncState) -> Result<bool, TrieSyncError> {
        let mut changed = false;
        let mut pending = Vec::new();
        for parent in std::mem::take(&mut state.to_expand) {
            let children = match state
                .nodes_for_trie
                .get(&parent)
                .and_then(|info| info.node.as_ref())
            {
                Some(node) => self.trie.child_hashes(node.node()),
                None => continue,
            };

            let mut expanded = true;
            for child in children {
                if state.nodes_for_trie.contains_key(&child) {
                    continue;
                }
                if state.missing.len() >= self.max_hard_cap_for_missing_nodes {
                    expanded = false;
                    break;
                }
                if self.has_local_node(child)? {
                    state.resolve_from_storage(child);
                } else {
                    state.track(child);
                    self.statistics.set_num_missing(state.missing.len() as u64);
                }
                changed = true;
            }
            if !expanded {
                pending.push(parent);
            }
        }
        state.to_expand = pending;
        Ok(changed)
    }

    fn record_network_node(
        &self,
        state: &mut SyncState,
        hash: H256,
        node: InterceptedTrieNode,
    ) -> bool {
        let size = node.size_in_bytes();
        if !state.mark_received(hash, node) {
            return false;
        }
        self.statistics.add_received(size as u64);
        if size > self.large_node_threshold {
            self.statistics.add_large();
            warn!(
                %hash,
                size,
                threshold = self.large_node_threshold,
                "Received large trie node"
            );
        }
        true
    }

    /// Sends a single request for the missing hashes that were not requested recently
    fn request_missing_nodes(&self) {
        self.requested.sweep();
        let (hashes, num_new_hashes) = {
            let mut state = self.state.lock();
            let hashes: Vec<H256> = state
                .missing
                .iter()
                .filter(|hash| !self.requested.has(hash))
                .take(self.max_hard_cap_for_missing_nodes)
                .copied()
                .collect();
            let num_new_hashes = hashes
                .iter()
                .filter(|hash| state.requested_once.insert(**hash))
                .count();
            (hashes, num_new_hashes)
        };
        if hashes.is_empty() {
            return;
        }

        for hash in hashes.iter() {
            self.requested.add(*hash);
        }
        self.statistics.add_requested_batch(hashes.len() as u64, num_new_hashes as u64);
        debug!(
            shard_id = self.shard_id,
            topic = %self.topic,
            num_hashes = hashes.len(),
            "Requesting missing trie nodes"
        );
        // The handler may deliver synchronously, so no lock is held here
        self.request_handler
            .request_trie_nodes(self.shard_id, &hashes, &self.topic);
    }

    /// Looks the hash up in the local store.
    /// A stored node that fails verification is treated as absent so it gets fetched again.
    fn has_local_node(&self, hash: H256) -> Result<bool, TrieSyncError> {
        match self.trie.get_node(hash) {
            Ok(node) => Ok(node.is_some()),
            Err(
                err @ (TrieError::HashMismatch { .. }
                | TrieError::InvalidNode(_)
                | TrieError::RLPDecode(_)),
            ) => {
                warn!(%hash, %err, "Discarding corrupted local trie node");
                Ok(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes every node received from the network that is reachable from the root, in one batch
    fn commit(&self, root_hash: H256) -> Result<usize, TrieSyncError> {
        let state = self.state.lock();
        let mut batch = Vec::new();
        let mut visited = HashSet::new();
        self.collect_received_nodes(&state.nodes_for_trie, root_hash, &mut visited, &mut batch)?;
        let num_nodes = batch.len();
        self.trie.commit_nodes(batch)?;
        Ok(num_nodes)
    }

    /// Children are pushed before their parents
    fn collect_received_nodes(
        &self,
        nodes: &HashMap<H256, TrieNodeInfo>,
        hash: H256,
        visited: &mut HashSet<H256>,
        acc: &mut Vec<(H256, Vec<u8>)>,
    ) -> Result<(), TrieSyncError> {
        if !visited.insert(hash) {
            return Ok(());
        }
        let info = nodes.get(&hash).ok_or(TrieError::InconsistentTree)?;
        let Some(node) = info.node.as_ref() else {
            return Ok(());
        };
        for child in self.trie.child_hashes(node.node()) {
            self.collect_received_nodes(nodes, child, visited, acc)?;
        }
        acc.push((hash, node.encoded().to_vec()));
        Ok(())
    }
}

impl Drop for TrieSyncer {
    fn drop(&mut self) {
        self.intercepted_nodes.unregister_handler(self.handler_id);
    }
}

impl std::fmt::Debug for TrieSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieSyncer")
            .field("shard_id", &self.shard_id)
            .field("topic", &self.topic)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardnode_trie::{InMemoryTrieDB, Trie, TrieDB};

    #[derive(Default)]
    struct RecordingRequestHandler {
        requests: Mutex<Vec<Vec<H256>>>,
    }

    impl RequestHandler for RecordingRequestHandler {
        fn request_trie_nodes(&self, _dest_shard_id: u32, hashes: &[H256], _topic: &str) {
            self.requests.lock().push(hashes.to_vec());
        }
    }

    struct Fixture {
        syncer: Arc<TrieSyncer>,
        cache: Arc<InterceptedNodesCache>,
        source: InMemoryTrieDB,
        root: H256,
    }

    fn source_trie(num_leaves: u8) -> (InMemoryTrieDB, H256) {
        let db = InMemoryTrieDB::new_empty();
        let mut trie = Trie::new(Arc::new(db.clone()));
        for i in 0..num_leaves {
            trie.insert(vec![i, i.wrapping_mul(31), 0xaa], vec![i; 8]).unwrap();
        }
        let root = trie.hash().unwrap();
        (db, root)
    }

    fn fixture(num_leaves: u8, max_hard_cap: usize) -> Fixture {
        let (source, root) = source_trie(num_leaves);
        let cache = Arc::new(InterceptedNodesCache::new(1000).unwrap());
        let syncer = TrieSyncer::new(TrieSyncArgs {
            request_handler: Some(Arc::new(RecordingRequestHandler::default())),
            intercepted_nodes: Some(cache.clone()),
            trie: Some(Arc::new(Trie::new(Arc::new(InMemoryTrieDB::new_empty())))),
            trie_sync_statistics: Some(Arc::new(TrieSyncStatistics::new())),
            max_hard_cap_for_missing_nodes: max_hard_cap,
            ..Default::default()
        })
        .unwrap();
        Fixture {
            syncer,
            cache,
            source,
            root,
        }
    }

    fn intercepted(source: &InMemoryTrieDB, hash: H256) -> InterceptedTrieNode {
        InterceptedTrieNode::new(source.get(hash).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn node_nobody_waits_for_is_ignored() {
        let f = fixture(10, 100);
        let root = intercepted(&f.source, f.root);

        f.syncer.trie_node_intercepted(f.root, &root);

        assert_eq!(f.syncer.num_tracked(), 0);
        assert!(f.syncer.node_info(&f.root).is_none());
    }

    #[test]
    fn tracked_node_is_recorded_once() {
        let f = fixture(10, 100);
        f.syncer.state.lock().track(f.root);
        let root = intercepted(&f.source, f.root);

        f.syncer.trie_node_intercepted(f.root, &root);
        let first = f.syncer.node_info(&f.root).unwrap();
        f.syncer.trie_node_intercepted(f.root, &root);
        let second = f.syncer.node_info(&f.root).unwrap();

        assert!(first.received);
        assert_eq!(first.source, Some(NodeSource::Network));
        assert_eq!(first.node.as_ref(), Some(&root));
        assert_eq!(first, second);
        assert_eq!(f.syncer.statistics().num_received(), 1);
        assert_eq!(f.syncer.num_missing(), 0);
    }

    #[test]
    fn received_node_is_never_replaced() {
        let f = fixture(10, 100);
        f.syncer.state.lock().track(f.root);
        let root = intercepted(&f.source, f.root);
        f.syncer.trie_node_intercepted(f.root, &root);

        let other_hash = f.syncer.trie.child_hashes(root.node())[0];
        let other = intercepted(&f.source, other_hash);
        f.syncer.trie_node_intercepted(f.root, &other);

        assert_eq!(f.syncer.node_info(&f.root).unwrap().node, Some(root));
    }

    #[test]
    fn node_delivered_under_wrong_hash_is_ignored() {
        let f = fixture(10, 100);
        f.syncer.state.lock().track(f.root);
        let root = intercepted(&f.source, f.root);
        let child = intercepted(&f.source, f.syncer.trie.child_hashes(root.node())[0]);

        f.syncer.trie_node_intercepted(f.root, &child);

        let info = f.syncer.node_info(&f.root).unwrap();
        assert!(!info.received);
        assert!(info.node.is_none());
    }

    #[test]
    fn expansion_stops_at_hard_cap() {
        let f = fixture(60, 3);
        f.syncer.state.lock().track(f.root);
        f.cache.put(f.root, intercepted(&f.source, f.root));

        f.syncer.resolve_pending().unwrap();

        assert_eq!(f.syncer.num_missing(), 3);
        assert_eq!(f.syncer.statistics().max_num_missing(), 3);
        assert!(!f.syncer.state.lock().to_expand.is_empty());
    }

    #[test]
    fn expansion_resumes_once_missing_nodes_arrive() {
        let f = fixture(60, 3);
        f.syncer.state.lock().track(f.root);
        f.cache.put(f.root, intercepted(&f.source, f.root));
        f.syncer.resolve_pending().unwrap();

        let missing: Vec<H256> = f.syncer.state.lock().missing.iter().copied().collect();
        for hash in missing {
            f.cache.put(hash, intercepted(&f.source, hash));
        }
        f.syncer.resolve_pending().unwrap();

        assert!(f.syncer.num_missing() <= 3);
        assert!(f.syncer.num_tracked() > 4);
        assert_eq!(f.syncer.statistics().max_num_missing(), 3);
    }

    #[test]
    fn missing_peak_within_a_pass_is_recorded() {
        let f = fixture(60, 1000);
        f.syncer.state.lock().track(f.root);
        for encoded in f.source.entries().unwrap().into_values() {
            f.cache.put_encoded(encoded).unwrap();
        }
        let root = intercepted(&f.source, f.root);
        let num_root_children = f.syncer.trie.child_hashes(root.node()).len() as u64;

        f.syncer.resolve_pending().unwrap();

        assert!(f.syncer.state.lock().is_synced());
        assert_eq!(f.syncer.statistics().num_missing(), 0);
        assert!(f.syncer.statistics().max_num_missing() >= num_root_children);
    }

    #[test]
    fn awaited_hashes_showing_up_in_store_are_resolved() {
        let f = fixture(60, 1000);
        f.syncer.state.lock().track(f.root);
        f.cache.put(f.root, intercepted(&f.source, f.root));
        f.syncer.resolve_pending().unwrap();
        let awaited: Vec<H256> = f.syncer.state.lock().missing.iter().copied().collect();
        assert!(!awaited.is_empty());

        f.syncer
            .trie
            .commit_nodes(f.source.entries().unwrap().into_iter().collect())
            .unwrap();
        f.syncer.resolve_pending().unwrap();

        assert!(f.syncer.state.lock().is_synced());
        for hash in awaited {
            let info = f.syncer.node_info(&hash).unwrap();
            assert!(info.received);
            assert_eq!(info.source, Some(NodeSource::Storage));
            assert!(info.node.is_none());
        }
    }

    #[test]
    fn re_requested_hashes_count_once_as_distinct() {
        let handler = Arc::new(RecordingRequestHandler::default());
        let (_, root) = source_trie(4);
        let syncer = TrieSyncer::new(TrieSyncArgs {
            request_handler: Some(handler.clone()),
            intercepted_nodes: Some(Arc::new(InterceptedNodesCache::new(10).unwrap())),
            trie: Some(Arc::new(Trie::new(Arc::new(InMemoryTrieDB::new_empty())))),
            trie_sync_statistics: Some(Arc::new(TrieSyncStatistics::new())),
            request_interval: Duration::from_millis(1),
            ..Default::default()
        })
        .unwrap();
        syncer.state.lock().track(root);

        syncer.request_missing_nodes();
        std::thread::sleep(Duration::from_millis(5));
        syncer.request_missing_nodes();

        let stats = syncer.statistics().snapshot();
        assert_eq!(handler.requests.lock().len(), 2);
        assert_eq!(stats.num_requested, 2);
        assert_eq!(stats.num_distinct_requested, 1);
        assert_eq!(stats.num_request_batches, 2);
    }

    #[test]
    fn requests_skip_recently_requested_hashes() {
        let handler = Arc::new(RecordingRequestHandler::default());
        let (_, root) = source_trie(4);
        let syncer = TrieSyncer::new(TrieSyncArgs {
            request_handler: Some(handler.clone()),
            intercepted_nodes: Some(Arc::new(InterceptedNodesCache::new(10).unwrap())),
            trie: Some(Arc::new(Trie::new(Arc::new(InMemoryTrieDB::new_empty())))),
            trie_sync_statistics: Some(Arc::new(TrieSyncStatistics::new())),
            request_interval: Duration::from_secs(60),
            ..Default::default()
        })
        .unwrap();
        syncer.state.lock().track(root);

        syncer.request_missing_nodes();
        syncer.request_missing_nodes();

        assert_eq!(*handler.requests.lock(), vec![vec![root]]);
        assert_eq!(syncer.statistics().snapshot().num_request_batches, 1);
    }

    #[test]
    fn dropping_the_syncer_unregisters_its_handler() {
        let f = fixture(1, 10);
        assert_eq!(f.cache.num_handlers(), 1);
        drop(f.syncer);
        assert_eq!(f.cache.num_handlers(), 0);
    }
}
