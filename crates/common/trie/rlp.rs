//! RLP list helpers for node encoding
//! Every trie node is encoded as a flat RLP list of byte strings:
//! - leaf: `[compact(partial), value]`
//! - extension: `[compact(prefix), child_hash]`
//! - branch: `[child_hash_0, ..., child_hash_15, value]`

use alloy_rlp::{Encodable, Header};

use crate::error::TrieError;

/// Encodes the given byte strings as an RLP list
pub fn encode_list(items: &[&[u8]]) -> Vec<u8> {
    let payload_length = items.iter().map(|item| item.length()).sum();
    let mut buf = Vec::with_capacity(payload_length + 9);
    Header {
        list: true,
        payload_length,
    }
    .encode(&mut buf);
    for item in items {
        Encodable::encode(*item, &mut buf);
    }
    buf
}

/// Decodes an RLP list of byte strings, returning the payload of each item.
/// Nested lists and trailing bytes are rejected.
pub fn decode_list(rlp: &[u8]) -> Result<Vec<&[u8]>, TrieError> {
    let mut buf = rlp;
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() != header.payload_length {
        return Err(TrieError::InvalidNode(format!(
            "list payload is {} bytes but header declares {}",
            buf.len(),
            header.payload_length
        )));
    }
    let mut items = Vec::new();
    while !buf.is_empty() {
        let item = Header::decode(&mut buf)?;
        if item.list {
            return Err(alloy_rlp::Error::UnexpectedList.into());
        }
        if buf.len() < item.payload_length {
            return Err(alloy_rlp::Error::InputTooShort.into());
        }
        let (payload, rest) = buf.split_at(item.payload_length);
        items.push(payload);
        buf = rest;
    }
    Ok(items)
}
