use ethereum_types::H256;
use shardnode_trie::{Node, Trie, TrieError};

/// Trie operations a [`crate::TrieSyncer`] needs from the trie it fills.
pub trait TrieSyncBackend: Send + Sync {
    /// Loads and decodes the node stored locally under `hash`.
    /// Errors if the stored encoding does not hash to `hash`.
    fn get_node(&self, hash: H256) -> Result<Option<Node>, TrieError>;

    fn child_hashes(&self, node: &Node) -> Vec<H256> {
        node.child_hashes()
    }

    /// Persists all the given encoded nodes in a single write
    fn commit_nodes(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError>;
}

impl TrieSyncBackend for Trie {
    fn get_node(&self, hash: H256) -> Result<Option<Node>, TrieError> {
        Trie::get_node(self, hash)
    }

    fn commit_nodes(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        if nodes.is_empty() {
            return Ok(());
        }
        self.db().put_batch(nodes)
    }
}
