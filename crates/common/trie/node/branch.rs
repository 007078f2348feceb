use ethereum_types::H256;

use crate::{TrieDB, ValueRLP, error::TrieError, nibbles::Nibbles};

use super::{LeafNode, Node, NodeRef};

/// Branch Node of a Merkle Patricia Trie
/// Contains a node reference for each possible choice (0-15) and an optional value
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeRef; 16],
    pub value: ValueRLP,
}

impl BranchNode {
    /// Empty choice array for more convenient node-building
    pub const EMPTY_CHOICES: [NodeRef; 16] = [const { NodeRef::Hash(H256([0; 32])) }; 16];

    /// Creates a new branch node given its children, without any stored value
    pub const fn new(choices: [NodeRef; 16]) -> Self {
        Self {
            choices,
            value: Vec::new(),
        }
    }

    /// Creates a new branch node given its children and value
    pub const fn new_with_value(choices: [NodeRef; 16], value: ValueRLP) -> Self {
        Self { choices, value }
    }

    /// Retrieves a value from the subtrie originating from this node given its path
    pub fn get(&self, db: &dyn TrieDB, mut path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        // If path is at the end, return to its own value if present.
        // Otherwise, check the corresponding choice and delegate accordingly if present.
        if let Some(choice) = path.next_choice() {
            // Delegate to children if present
            let child_ref = &self.choices[choice];
            if child_ref.is_valid() {
                let child_node = child_ref.get_node(db)?.ok_or(TrieError::InconsistentTree)?;
                child_node.get(db, path)
            } else {
                Ok(None)
            }
        } else {
            // Return internal value if present.
            Ok((!self.value.is_empty()).then(|| self.value.clone()))
        }
    }

    /// Inserts a value into the subtrie originating from this node and returns the new root of the subtrie
    pub fn insert(
        mut self,
        db: &dyn TrieDB,
        mut path: Nibbles,
        value: ValueRLP,
    ) -> Result<Node, TrieError> {
        // If path is at the end, insert or replace its own value.
        // Otherwise, check the corresponding choice and insert or delegate accordingly.
        match path.next_choice() {
            Some(choice) => {
                let child_ref = &self.choices[choice];
                let new_child = if child_ref.is_valid() {
                    child_ref
                        .get_node(db)?
                        .ok_or(TrieError::InconsistentTree)?
                        .insert(db, path, value)?
                } else {
                    LeafNode::new(path, value).into()
                };
                self.choices[choice] = new_child.into();
            }
            None => self.value = value,
        }

        Ok(self.into())
    }
}
