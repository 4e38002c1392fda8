#![warn(missing_docs)]

//! Primitive types shared by all EDR crates.

/// Merkle-Patricia trie root functions.
pub mod trie;

pub use alloy_primitives::{
    address, b256, bytes, hex, keccak256,
    map::{self, hash_map, hash_set, HashMap, HashSet},
    Address, Bloom, Bytes, ChainId, Log, LogData, Signature, TxKind, B256, B64, U160, U256, U64,
};

/// The KECCAK of the RLP encoding of empty data.
pub const KECCAK_NULL_RLP: B256 =
    b256!("0x56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// The KECCAK of empty code.
pub const KECCAK_EMPTY: B256 =
    b256!("0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");

/// The KECCAK of the RLP encoding of an empty list, i.e. the ommers hash of a
/// block without ommers.
pub const KECCAK_RLP_EMPTY_ARRAY: B256 =
    b256!("0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// One ether in wei.
pub const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

/// Computes the hash of the provided contract code, returning
/// [`KECCAK_EMPTY`] for empty code.
pub fn code_hash(code: &[u8]) -> B256 {
    if code.is_empty() {
        KECCAK_EMPTY
    } else {
        keccak256(code)
    }
}
