use crate::{TrieDB, ValueRLP, error::TrieError, nibbles::LEAF_FLAG, nibbles::Nibbles};

use super::{BranchNode, LeafNode, Node, NodeRef};

/// Extension Node of a Merkle Patricia Trie
/// Contains a prefix and a its child node
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeRef,
}

impl ExtensionNode {
    /// Creates a new extension node given its child and prefix
    pub const fn new(prefix: Nibbles, child: NodeRef) -> Self {
        Self { prefix, child }
    }

    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        // If the path is prefixed by this node's prefix, delegate to its child.
        // Otherwise, no value is present.
        if path.skip_prefix(&self.prefix) {
            let child_node = self.child.get_node(db)?.ok_or(TrieError::InconsistentTree)?;

            child_node.get(db, path)
        } else {
            Ok(None)
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        mut self,
        db: &dyn TrieDB,
        path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        /* Possible flow paths:
            * Prefix fully matches path
            Extension { BranchNode } -> Extension { BranchNode (with inserted value) }
            * No match between path and prefix
            Extension { BranchNode } -> BranchNode { [ Extension { BranchNode }, Leaf { Value } ] }
            * Prefix partially matches path
            Extension { BranchNode } -> Extension { BranchNode { [ Extension { BranchNode }, Leaf { Value } ] } }
        */
        let match_index = path.count_prefix(&self.prefix);
        if match_index == self.prefix.len() {
            let child_node = self.child.get_node(db)?.ok_or(TrieError::InconsistentTree)?;
            let new_child = child_node.insert(db, path.offset(match_index), value)?;
            self.child = new_child.into();
            return Ok(self.into());
        }

        let mut choices = BranchNode::EMPTY_CHOICES;
        // Whatever remains of the prefix below the split point hangs from the new branch
        let prefix_choice = self.prefix.at(match_index);
        choices[prefix_choice] = if match_index + 1 == self.prefix.len() {
            self.child
        } else {
            Node::from(ExtensionNode::new(
                self.prefix.offset(match_index + 1),
                self.child,
            ))
            .into()
        };

        let path_choice = path.at(match_index);
        let branch_node = if path_choice == LEAF_FLAG as usize {
            BranchNode::new_with_value(choices, value)
        } else {
            let new_leaf = LeafNode::new(path.offset(match_index + 1), value);
            choices[path_choice] = Node::from(new_leaf).into();
            BranchNode::new(choices)
        };

        let final_node = if match_index == 0 {
            branch_node.into()
        } else {
            ExtensionNode::new(
                self.prefix.slice(0, match_index),
                Node::from(branch_node).into(),
            )
            .into()
        };

        Ok(final_node)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::InMemoryTrieDB;

    fn extension_with_branch() -> ExtensionNode {
        let mut choices = BranchNode::EMPTY_CHOICES;
        choices[0] = Node::from(LeafNode::new(Nibbles::from_hex(vec![16]), vec![0x12])).into();
        choices[1] = Node::from(LeafNode::new(Nibbles::from_hex(vec![16]), vec![0x34])).into();
        ExtensionNode::new(
            Nibbles::from_hex(vec![0]),
            Node::from(BranchNode::new(choices)).into(),
        )
    }

    #[test]
    fn get_some() {
        let db = InMemoryTrieDB::new_empty();
        let node = extension_with_branch();

        assert_eq!(
            node.get(&db, Nibbles::from_bytes(&[0x00])).unwrap(),
            Some(vec![0x12])
        );
        assert_eq!(
            node.get(&db, Nibbles::from_bytes(&[0x01])).unwrap(),
            Some(vec![0x34])
        );
    }

    #[test]
    fn get_none() {
        let db = InMemoryTrieDB::new_empty();
        let node = extension_with_branch();

        assert_eq!(node.get(&db, Nibbles::from_bytes(&[0x02])).unwrap(), None);
        assert_eq!(node.get(&db, Nibbles::from_bytes(&[0x10])).unwrap(), None);
    }

    #[test]
    fn insert_passes_through_prefix() {
        let db = InMemoryTrieDB::new_empty();
        let node = extension_with_branch();
        let path = Nibbles::from_bytes(&[0x02]);

        let node = node.insert(&db, path.clone(), vec![0x56]).unwrap();
        assert!(matches!(node, Node::Extension(_)));
        assert_eq!(node.get(&db, path).unwrap(), Some(vec![0x56]));
    }

    #[test]
    fn insert_splits_prefix() {
        let db = InMemoryTrieDB::new_empty();
        let node = extension_with_branch();
        let path = Nibbles::from_bytes(&[0x10]);

        let node = node.insert(&db, path.clone(), vec![0x56]).unwrap();
        assert!(matches!(node, Node::Branch(_)));
        assert_eq!(node.get(&db, path).unwrap(), Some(vec![0x56]));
        assert_eq!(
            node.get(&db, Nibbles::from_bytes(&[0x01])).unwrap(),
            Some(vec![0x34])
        );
    }

    #[test]
    fn insert_splits_longer_prefix() {
        let db = InMemoryTrieDB::new_empty();
        let mut choices = BranchNode::EMPTY_CHOICES;
        choices[5] = Node::from(LeafNode::new(Nibbles::from_hex(vec![16]), vec![0x12])).into();
        let node = ExtensionNode::new(
            Nibbles::from_hex(vec![1, 2, 3, 4]),
            Node::from(BranchNode::new(choices)).into(),
        );
        let path = Nibbles::from_bytes(&[0x12, 0x90]);

        let node = node.insert(&db, path.clone(), vec![0x56]).unwrap();
        assert!(matches!(node, Node::Extension(_)));
        assert_eq!(node.get(&db, path).unwrap(), Some(vec![0x56]));
        assert_eq!(
            node.get(&db, Nibbles::from_bytes(&[0x12, 0x34, 0x50])).unwrap(),
            None
        );
        assert_eq!(
            node.get(&db, Nibbles::from_hex(vec![1, 2, 3, 4, 5, 16])).unwrap(),
            Some(vec![0x12])
        );
    }
}
