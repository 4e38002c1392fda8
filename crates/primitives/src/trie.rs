use alloy_trie::{HashBuilder, Nibbles};

use crate::{keccak256, B256};

/// Computes the root of a trie containing the provided key-value pairs.
///
/// Keys must be unique.
pub fn trie_root<I, K, V>(entries: I) -> B256
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut leaves: Vec<(Nibbles, V)> = entries
        .into_iter()
        .map(|(key, value)| (Nibbles::unpack(key), value))
        .collect();

    // The hash builder requires leaves in lexicographic nibble order
    leaves.sort_unstable_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

    let mut builder = HashBuilder::default();
    for (key, value) in leaves {
        builder.add_leaf(key, value.as_ref());
    }

    builder.root()
}

/// Computes the root of a secure trie, i.e. a trie whose keys are the keccak
/// hashes of the provided keys.
pub fn sec_trie_root<I, K, V>(entries: I) -> B256
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    trie_root(
        entries
            .into_iter()
            .map(|(key, value)| (keccak256(key), value)),
    )
}

/// Computes the root of a trie keyed by the RLP-encoded position of each item.
pub fn ordered_trie_root<I, V>(items: I) -> B256
where
    I: IntoIterator<Item = V>,
    V: AsRef<[u8]>,
{
    trie_root(
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (alloy_rlp::encode(index), item)),
    )
}
