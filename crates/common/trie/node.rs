mod branch;
mod extension;
mod leaf;

use std::sync::OnceLock;

pub use branch::BranchNode;
use ethereum_types::H256;
pub use extension::ExtensionNode;
pub use leaf::LeafNode;

use crate::{
    TrieDB, ValueRLP,
    error::TrieError,
    keccak,
    nibbles::Nibbles,
    rlp::{decode_list, encode_list},
};

/// A reference to a node.
#[derive(Clone, Debug)]
pub enum NodeRef {
    /// The node is embedded within the reference, it has not been committed yet.
    Node(Box<Node>, OnceLock<H256>),
    /// The node is in the database, referenced by its hash.
    Hash(H256),
}

impl NodeRef {
    /// Resolves the referenced node, loading it from the db if needed.
    /// Nodes loaded from the db are checked against the hash they are stored under.
    pub fn get_node(&self, db: &dyn TrieDB) -> Result<Option<Node>, TrieError> {
        match self {
            NodeRef::Node(node, _) => Ok(Some(node.as_ref().clone())),
            NodeRef::Hash(hash) if hash.is_zero() => Ok(None),
            NodeRef::Hash(hash) => db
                .get(*hash)?
                .map(|rlp| Node::decode_verified(&rlp, *hash))
                .transpose(),
        }
    }

    /// Returns false if the reference points to an empty slot
    pub fn is_valid(&self) -> bool {
        match self {
            NodeRef::Node(_, _) => true,
            NodeRef::Hash(hash) => !hash.is_zero(),
        }
    }

    /// Stores the referenced subtrie's uncommitted nodes in `acc` (children first)
    /// and turns the reference into a hash reference.
    pub fn commit(&mut self, acc: &mut Vec<(H256, Vec<u8>)>) -> H256 {
        match self {
            NodeRef::Node(node, hash) => {
                match node.as_mut() {
                    Node::Branch(node) => {
                        for choice in node.choices.iter_mut().filter(|c| c.is_valid()) {
                            choice.commit(acc);
                        }
                    }
                    Node::Extension(node) => {
                        node.child.commit(acc);
                    }
                    Node::Leaf(_) => {}
                }
                let hash = *hash.get_or_init(|| node.compute_hash());
                acc.push((hash, node.encode_raw()));

                *self = hash.into();

                hash
            }
            NodeRef::Hash(hash) => *hash,
        }
    }

    pub fn compute_hash(&self) -> H256 {
        match self {
            NodeRef::Node(node, hash) => *hash.get_or_init(|| node.compute_hash()),
            NodeRef::Hash(hash) => *hash,
        }
    }
}

impl Default for NodeRef {
    fn default() -> Self {
        Self::Hash(H256::zero())
    }
}

impl From<Node> for NodeRef {
    fn from(value: Node) -> Self {
        Self::Node(Box::new(value), OnceLock::new())
    }
}

impl From<H256> for NodeRef {
    fn from(value: H256) -> Self {
        Self::Hash(value)
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.compute_hash() == other.compute_hash()
    }
}

/// A Node in a Merkle Patricia Trie.
/// Every child is referenced by the keccak hash of its encoding, no node is inlined into its parent.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

impl From<Box<BranchNode>> for Node {
    fn from(val: Box<BranchNode>) -> Self {
        Node::Branch(val)
    }
}

impl From<BranchNode> for Node {
    fn from(val: BranchNode) -> Self {
        Node::Branch(Box::new(val))
    }
}

impl From<ExtensionNode> for Node {
    fn from(val: ExtensionNode) -> Self {
        Node::Extension(val)
    }
}

impl From<LeafNode> for Node {
    fn from(val: LeafNode) -> Self {
        Node::Leaf(val)
    }
}

impl Node {
    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        match self {
            Node::Branch(n) => n.get(db, path),
            Node::Extension(n) => n.get(db, path),
            Node::Leaf(n) => n.get(path),
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        self,
        db: &dyn TrieDB,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        match self {
            Node::Branch(n) => n.insert(db, path, value),
            Node::Extension(n) => n.insert(db, path, value),
            Node::Leaf(n) => n.insert(path, value),
        }
    }

    /// Hashes of the nodes directly referenced by this node
    pub fn child_hashes(&self) -> Vec<H256> {
        match self {
            Node::Branch(n) => n
                .choices
                .iter()
                .filter(|choice| choice.is_valid())
                .map(NodeRef::compute_hash)
                .collect(),
            Node::Extension(n) => vec![n.child.compute_hash()],
            Node::Leaf(_) => Vec::new(),
        }
    }

    /// Encodes the node
    pub fn encode_raw(&self) -> Vec<u8> {
        match self {
            Node::Branch(n) => {
                let hashes: Vec<Option<H256>> = n
                    .choices
                    .iter()
                    .map(|choice| choice.is_valid().then(|| choice.compute_hash()))
                    .collect();
                let mut items: Vec<&[u8]> = hashes
                    .iter()
                    .map(|hash| hash.as_ref().map(H256::as_bytes).unwrap_or_default())
                    .collect();
                items.push(&n.value);
                encode_list(&items)
            }
            Node::Extension(n) => {
                let child = n.child.compute_hash();
                encode_list(&[n.prefix.encode_compact().as_slice(), child.as_bytes()])
            }
            Node::Leaf(n) => encode_list(&[
                n.partial.encode_compact().as_slice(),
                n.value.as_slice(),
            ]),
        }
    }

    /// Decodes the node
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, TrieError> {
        let items = decode_list(rlp)?;
        // Deserialize into node depending on the available fields
        Ok(match items.len() {
            // Leaf or Extension Node
            2 => {
                let path = Nibbles::decode_compact(items[0])
                    .ok_or_else(|| TrieError::InvalidNode("malformed compact path".to_string()))?;
                if path.is_leaf() {
                    LeafNode::new(path, items[1].to_vec()).into()
                } else {
                    if path.is_empty() {
                        return Err(TrieError::InvalidNode(
                            "extension with empty prefix".to_string(),
                        ));
                    }
                    let child = decode_child(items[1])?.ok_or_else(|| {
                        TrieError::InvalidNode("extension without child".to_string())
                    })?;
                    ExtensionNode::new(path, child.into()).into()
                }
            }
            // Branch Node
            17 => {
                let mut choices = BranchNode::EMPTY_CHOICES;
                for (choice, item) in choices.iter_mut().zip(items.iter()) {
                    if let Some(hash) = decode_child(item)? {
                        *choice = hash.into();
                    }
                }
                BranchNode::new_with_value(choices, items[16].to_vec()).into()
            }
            n => {
                return Err(TrieError::InvalidNode(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {n}"
                )));
            }
        })
    }

    /// Decodes the node and checks that its hash matches the expected one
    pub fn decode_verified(rlp: &[u8], expected: H256) -> Result<Self, TrieError> {
        let computed = keccak(rlp);
        if computed != expected {
            return Err(TrieError::HashMismatch { expected, computed });
        }
        Self::decode_raw(rlp)
    }

    /// Computes the node's hash
    pub fn compute_hash(&self) -> H256 {
        keccak(&self.encode_raw())
    }
}

fn decode_child(rlp: &[u8]) -> Result<Option<H256>, TrieError> {
    match rlp.len() {
        0 => Ok(None),
        32 => Ok(Some(H256::from_slice(rlp))),
        n => Err(TrieError::InvalidNode(format!(
            "child reference must be a 32 byte hash, got {n} bytes"
        ))),
    }
}
