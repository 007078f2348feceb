use std::cmp;

/// Flag nibble appended at the end of a leaf path
pub const LEAF_FLAG: u8 = 16;

/// Nibble sequence used to address nodes within the trie.
///
/// Paths built from keys carry a trailing [`LEAF_FLAG`] so that a key which is a
/// prefix of another key can still terminate at a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nibbles {
    data: Vec<u8>,
}

impl Nibbles {
    /// Create `Nibbles` from hex-encoded nibbles
    pub const fn from_hex(hex: Vec<u8>) -> Self {
        Self { data: hex }
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag (a 16 nibble at the end)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::from_raw(bytes, true)
    }

    /// Splits incoming bytes into nibbles and appends the leaf flag if is_leaf is true
    pub fn from_raw(bytes: &[u8], is_leaf: bool) -> Self {
        let mut data: Vec<u8> = bytes
            .iter()
            .flat_map(|byte| [(byte >> 4) & 0x0F, byte & 0x0F])
            .collect();
        if is_leaf {
            data.push(LEAF_FLAG);
        }
        Self { data }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Returns the amount of nibbles
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no nibbles
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// If `prefix` is a prefix of self, removes it and returns true, otherwise returns false.
    pub fn skip_prefix(&mut self, prefix: &Nibbles) -> bool {
        if self.data.starts_with(&prefix.data) {
            self.data.drain(..prefix.len());
            true
        } else {
            false
        }
    }

    /// Compares self to another and returns the shared nibble count (amount of nibbles that are equal, from the start)
    pub fn count_prefix(&self, other: &Nibbles) -> usize {
        self.data
            .iter()
            .zip(other.data.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Compares self to another, comparing prefixes only in case of unequal lengths.
    pub fn compare_prefix(&self, prefix: &Nibbles) -> cmp::Ordering {
        let len = cmp::min(self.len(), prefix.len());
        self.data[..len].cmp(&prefix.data[..len])
    }

    /// Removes and returns the first nibble
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<u8> {
        (!self.is_empty()).then(|| self.data.remove(0))
    }

    /// Removes and returns the first nibble if it is a suitable choice index (aka < 16)
    pub fn next_choice(&mut self) -> Option<usize> {
        self.next()
            .filter(|choice| *choice < LEAF_FLAG)
            .map(usize::from)
    }

    /// Returns the nibbles after the given offset
    pub fn offset(&self, offset: usize) -> Nibbles {
        self.slice(offset, self.len())
    }

    /// Returns the nibbles between the start and end indexes
    pub fn slice(&self, start: usize, end: usize) -> Nibbles {
        Nibbles::from_hex(self.data[start..end].to_vec())
    }

    /// Extends the nibbles with another list of nibbles
    pub fn extend(&mut self, other: &Nibbles) {
        self.data.extend_from_slice(&other.data);
    }

    /// Return the nibble at the given index, will panic if the index is out of range
    pub fn at(&self, i: usize) -> usize {
        self.data[i] as usize
    }

    /// Inserts a nibble at the start
    pub fn prepend(&mut self, nibble: u8) {
        self.data.insert(0, nibble);
    }

    /// Inserts a nibble at the end
    pub fn append(&mut self, nibble: u8) {
        self.data.push(nibble);
    }

    /// Encodes the nibbles in compact (hex-prefix) form
    pub fn encode_compact(&self) -> Vec<u8> {
        let is_leaf = self.is_leaf();
        let mut hex = if is_leaf {
            &self.data[..self.len() - 1]
        } else {
            &self.data[..]
        };
        // node type    path length    |    prefix    hexchar
        // --------------------------------------------------
        // extension    even           |    0000      0x0
        // extension    odd            |    0001      0x1
        // leaf         even           |    0010      0x2
        // leaf         odd            |    0011      0x3
        let mut compact = Vec::with_capacity(hex.len() / 2 + 1);
        let first = if hex.len() % 2 == 1 {
            let v = 0x10 + hex[0];
            hex = &hex[1..];
            v
        } else {
            0x00
        };
        compact.push(first + if is_leaf { 0x20 } else { 0x00 });
        compact.extend(hex.chunks(2).map(|pair| (pair[0] << 4) | pair[1]));
        compact
    }

    /// Decodes nibbles in compact form, returns None if the flag byte is missing or malformed
    pub fn decode_compact(compact: &[u8]) -> Option<Self> {
        let (&flag, rest) = compact.split_first()?;
        let kind = flag >> 4;
        if kind > 3 || (kind & 1 == 0 && flag & 0x0F != 0) {
            return None;
        }
        let mut data = Vec::with_capacity(rest.len() * 2 + 2);
        if kind & 1 == 1 {
            data.push(flag & 0x0F);
        }
        data.extend(rest.iter().flat_map(|byte| [byte >> 4, byte & 0x0F]));
        if kind & 2 == 2 {
            data.push(LEAF_FLAG);
        }
        Some(Self { data })
    }

    /// Returns true if the nibbles contain the leaf flag (16) at the end
    pub fn is_leaf(&self) -> bool {
        self.data.last() == Some(&LEAF_FLAG)
    }

    /// Combines the nibbles into bytes, trimming the leaf flag if necessary
    pub fn to_bytes(&self) -> Vec<u8> {
        let trimmed = if self.is_leaf() {
            &self.data[..self.len() - 1]
        } else {
            &self.data[..]
        };
        trimmed
            .chunks(2)
            .map(|chunk| match chunk.len() {
                1 => chunk[0] << 4,
                _ => (chunk[0] << 4) | chunk[1],
            })
            .collect()
    }

    /// Concatenates self and another Nibbles returning a new Nibbles
    pub fn concat(&self, other: &Nibbles) -> Nibbles {
        let mut data = self.data.clone();
        data.extend_from_slice(&other.data);
        Nibbles { data }
    }

    /// Returns a copy of self with the nibble added at the end
    pub fn append_new(&self, nibble: u8) -> Nibbles {
        let mut data = self.data.clone();
        data.push(nibble);
        Nibbles { data }
    }
}

impl AsRef<[u8]> for Nibbles {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skip_prefix_true() {
        let mut a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        let b = Nibbles::from_hex(vec![1, 2, 3]);
        assert!(a.skip_prefix(&b));
        assert_eq!(a.as_ref(), &[4, 5])
    }

    #[test]
    fn skip_prefix_true_same_length() {
        let mut a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        let b = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        assert!(a.skip_prefix(&b));
        assert!(a.is_empty());
    }

    #[test]
    fn skip_prefix_false() {
        let mut a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        let b = Nibbles::from_hex(vec![1, 2, 4]);
        assert!(!a.skip_prefix(&b));
        assert_eq!(a.as_ref(), &[1, 2, 3, 4, 5])
    }

    #[test]
    fn count_prefix_partial() {
        let a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        let b = Nibbles::from_hex(vec![1, 2, 3]);
        assert_eq!(a.count_prefix(&b), b.len());
    }

    #[test]
    fn count_prefix_none() {
        let a = Nibbles::from_hex(vec![1, 2, 3, 4, 5]);
        let b = Nibbles::from_hex(vec![2, 3, 4, 5, 6]);
        assert_eq!(a.count_prefix(&b), 0);
    }

    #[test]
    fn from_bytes_appends_leaf_flag() {
        let nibbles = Nibbles::from_bytes(&[0xab, 0x01]);
        assert_eq!(nibbles.as_ref(), &[0xa, 0xb, 0x0, 0x1, LEAF_FLAG]);
        assert!(nibbles.is_leaf());
        assert_eq!(nibbles.to_bytes(), vec![0xab, 0x01]);
    }

    #[test]
    fn next_choice_skips_leaf_flag() {
        let mut nibbles = Nibbles::from_hex(vec![LEAF_FLAG]);
        assert_eq!(nibbles.next_choice(), None);
        assert!(nibbles.is_empty());
    }

    #[test]
    fn compact_encoding_matches_hex_prefix_table() {
        // extension, even
        assert_eq!(
            Nibbles::from_hex(vec![1, 2, 3, 4]).encode_compact(),
            vec![0x00, 0x12, 0x34]
        );
        // extension, odd
        assert_eq!(
            Nibbles::from_hex(vec![1, 2, 3]).encode_compact(),
            vec![0x11, 0x23]
        );
        // leaf, even
        assert_eq!(
            Nibbles::from_hex(vec![1, 2, LEAF_FLAG]).encode_compact(),
            vec![0x20, 0x12]
        );
        // leaf, odd
        assert_eq!(
            Nibbles::from_hex(vec![1, LEAF_FLAG]).encode_compact(),
            vec![0x31]
        );
    }

    #[test]
    fn compact_decoding_restores_nibbles() {
        for hex in [
            vec![],
            vec![LEAF_FLAG],
            vec![0xf, 0x0, 0x3],
            vec![0x1, 0x2, 0x3, 0x4, LEAF_FLAG],
            vec![0x7, LEAF_FLAG],
        ] {
            let nibbles = Nibbles::from_hex(hex);
            let decoded = Nibbles::decode_compact(&nibbles.encode_compact());
            assert_eq!(decoded, Some(nibbles));
        }
    }

    #[test]
    fn compact_decoding_rejects_bad_flags() {
        assert_eq!(Nibbles::decode_compact(&[]), None);
        assert_eq!(Nibbles::decode_compact(&[0x40]), None);
        assert_eq!(Nibbles::decode_compact(&[0x05, 0x12]), None);
    }
}
