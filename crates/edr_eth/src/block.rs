use edr_primitives::{Address, Bloom, Bytes, B256, B64, U256};

/// A block header with transaction hashes, as returned by
/// `eth_getBlockByNumber` with `hydrated = false`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBlock {
    /// Block number
    #[serde(with = "alloy_serde::quantity")]
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Hash of the parent block
    pub parent_hash: B256,
    /// State root after executing the block
    pub state_root: B256,
    /// Block producer
    pub miner: Address,
    /// UNIX timestamp in seconds
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// Gas limit of the block
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// Gas used by the block's transactions
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Base fee per gas, after EIP-1559 activated
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub base_fee_per_gas: Option<u128>,
    /// Hashes of the block's transactions
    pub transactions: Vec<B256>,
}

/// A block as returned by `eth_getBlockByNumber`. Transactions are either
/// hashes or full transaction objects.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Block<TransactionT> {
    /// Block hash; `None` for the pending block
    pub hash: Option<B256>,
    /// Hash of the parent block
    pub parent_hash: B256,
    /// Hash of the ommers list
    pub sha3_uncles: B256,
    /// State root after executing the block
    pub state_root: B256,
    /// Root of the transaction trie
    pub transactions_root: B256,
    /// Root of the receipt trie
    pub receipts_root: B256,
    /// Block number; `None` for the pending block
    #[serde(with = "alloy_serde::quantity::opt")]
    pub number: Option<u64>,
    /// Gas used by the block's transactions
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Gas limit of the block
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// Extra data
    pub extra_data: Bytes,
    /// Bloom filter of the block's logs
    pub logs_bloom: Bloom,
    /// UNIX timestamp in seconds
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// Difficulty
    pub difficulty: U256,
    /// Ommer hashes
    #[serde(default)]
    pub uncles: Vec<B256>,
    /// Transaction hashes or objects
    #[serde(default)]
    pub transactions: Vec<TransactionT>,
    /// Mix hash, or `prevrandao` after the merge
    pub mix_hash: B256,
    /// Proof-of-work nonce
    pub nonce: B64,
    /// Base fee per gas, after EIP-1559 activated
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub base_fee_per_gas: Option<u128>,
    /// Block producer
    pub miner: Address,
    /// Root of the withdrawals trie, after Shanghai
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// Root of the parent beacon block, after Cancun
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
}
