pub mod db;
pub mod error;
mod nibbles;
mod node;
mod rlp;

use ethereum_types::H256;
use sha3::{Digest, Keccak256};
use std::sync::Arc;

pub use self::db::{InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::nibbles::{LEAF_FLAG, Nibbles};
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node, NodeRef};
pub use self::rlp::{decode_list, encode_list};

use lazy_static::lazy_static;

/// RLP encoding of an empty byte string
pub const RLP_NULL: u8 = 0x80;

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = keccak([RLP_NULL]);
}

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;
/// RLP-encoded trie node
pub type NodeRLP = Vec<u8>;

/// Keccak-256 digest of the given bytes
pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// Merkle Patricia Trie backed by a hash-keyed node store
pub struct Trie {
    db: Arc<dyn TrieDB>,
    /// Reference to the root node, invalid if the trie is empty
    root: NodeRef,
}

impl Trie {
    /// Creates a new Trie from a clean DB
    pub fn new(db: Arc<dyn TrieDB>) -> Self {
        Self {
            db,
            root: NodeRef::default(),
        }
    }

    /// Creates a trie from an already-initialized DB and sets root as the root node of the trie
    pub fn open(db: Arc<dyn TrieDB>, root: H256) -> Self {
        let root = if root == *EMPTY_TRIE_HASH {
            NodeRef::default()
        } else {
            root.into()
        };
        Self { db, root }
    }

    /// Retrieve an RLP-encoded value from the trie given its RLP-encoded path.
    pub fn get(&self, path: &PathRLP) -> Result<Option<ValueRLP>, TrieError> {
        if !self.root.is_valid() {
            return Ok(None);
        }
        let root_node = self
            .root
            .get_node(self.db.as_ref())?
            .ok_or(TrieError::InconsistentTree)?;
        root_node.get(self.db.as_ref(), Nibbles::from_bytes(path))
    }

    /// Insert an RLP-encoded value into the trie.
    pub fn insert(&mut self, path: PathRLP, value: ValueRLP) -> Result<(), TrieError> {
        let path = Nibbles::from_bytes(&path);
        let root_node = if self.root.is_valid() {
            // If the trie is not empty, call the root node's insertion logic
            self.root
                .get_node(self.db.as_ref())?
                .ok_or(TrieError::InconsistentTree)?
                .insert(self.db.as_ref(), path, value)?
        } else {
            // If the trie is empty, just add a leaf.
            LeafNode::new(path, value).into()
        };
        self.root = root_node.into();
        Ok(())
    }

    /// Return the hash of the trie's root node.
    /// Returns keccak(RLP_NULL) if the trie is empty
    /// Also commits changes to the DB
    pub fn hash(&mut self) -> Result<H256, TrieError> {
        self.commit()?;
        Ok(self.hash_no_commit())
    }

    /// Return the hash of the trie's root node.
    /// Returns keccak(RLP_NULL) if the trie is empty
    pub fn hash_no_commit(&self) -> H256 {
        if self.root.is_valid() {
            self.root.compute_hash()
        } else {
            *EMPTY_TRIE_HASH
        }
    }

    /// Writes every uncommitted node to the DB in a single batch
    pub fn commit(&mut self) -> Result<(), TrieError> {
        if self.root.is_valid() {
            let mut acc = Vec::new();
            self.root.commit(&mut acc);
            if !acc.is_empty() {
                self.db.put_batch(acc)?;
            }
        }
        Ok(())
    }

    /// Loads a node from the DB by its hash, checking the stored encoding against it
    pub fn get_node(&self, hash: H256) -> Result<Option<Node>, TrieError> {
        NodeRef::Hash(hash).get_node(self.db.as_ref())
    }

    pub fn db(&self) -> &dyn TrieDB {
        self.db.as_ref()
    }

    #[cfg(test)]
    /// Creates a new Trie based on a temporary InMemory DB
    fn new_temp() -> Self {
        Trie::new(Arc::new(InMemoryTrieDB::new_empty()))
    }
}
