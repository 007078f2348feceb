use ethereum_types::H256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] alloy_rlp::Error),
    #[error("Invalid node encoding: {0}")]
    InvalidNode(String),
    #[error("Node hash mismatch: expected {expected:#x}, computed {computed:#x}")]
    HashMismatch {
        expected: H256,
        computed: H256,
    },
    #[error("Inconsistent internal tree structure")]
    InconsistentTree,
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
}
