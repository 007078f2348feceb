use crate::{ValueRLP, error::TrieError, nibbles::LEAF_FLAG, nibbles::Nibbles};

use super::{BranchNode, ExtensionNode, Node};

/// Leaf Node of a Merkle Patricia Trie
/// Contains the remaining path (ending in the leaf flag) and the stored value
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl LeafNode {
    /// Creates a new leaf node and stores the given (path, value) pair
    pub const fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }

    /// Returns the stored value if the given path matches the stored path
    pub fn get(&self, path: Nibbles) -> Result<Option<ValueRLP>, TrieError> {
        if self.partial == path {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    /// Stores the received value and returns the new root of the subtrie previously consisting of self
    pub fn insert(mut self, path: Nibbles, value: ValueRLP) -> Result<Node, TrieError> {
        /* Possible flow paths:
            Leaf { SelfValue } -> Leaf { Value }
            Leaf { SelfValue } -> Extension { Branch { [Self,...] Value } }
            Leaf { SelfValue } -> Extension { Branch { [ Leaf { Value } , ... ], SelfValue} }
            Leaf { SelfValue } -> Branch { [ Leaf { Value }, Self, ... ], None}
        */
        // If the path matches the stored path, update the value and return self
        if self.partial == path {
            self.value = value;
            return Ok(self.into());
        }
        let match_index = path.count_prefix(&self.partial);
        let self_choice_idx = self.partial.at(match_index);
        let new_leaf_choice_idx = path.at(match_index);
        let mut choices = BranchNode::EMPTY_CHOICES;
        let branch_node = if self_choice_idx == LEAF_FLAG as usize {
            // Create a new leaf node with the new value and store self's value in the branch
            let new_leaf = LeafNode::new(path.offset(match_index + 1), value);
            choices[new_leaf_choice_idx] = Node::from(new_leaf).into();
            BranchNode::new_with_value(choices, self.value)
        } else if new_leaf_choice_idx == LEAF_FLAG as usize {
            // Move self down one level and store the new value in the branch
            self.partial = self.partial.offset(match_index + 1);
            choices[self_choice_idx] = Node::from(self).into();
            BranchNode::new_with_value(choices, value)
        } else {
            // Both paths continue, each leaf becomes a child of the new branch
            let new_leaf = LeafNode::new(path.offset(match_index + 1), value);
            self.partial = self.partial.offset(match_index + 1);
            choices[new_leaf_choice_idx] = Node::from(new_leaf).into();
            choices[self_choice_idx] = Node::from(self).into();
            BranchNode::new(choices)
        };

        let final_node = if match_index == 0 {
            branch_node.into()
        } else {
            // Create an extension node with the shared prefix pointing to the branch
            ExtensionNode::new(path.slice(0, match_index), Node::from(branch_node).into()).into()
        };

        Ok(final_node)
    }
}
