use edr_primitives::{Address, Bloom, Bytes, B256};

/// A log emitted by a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<B256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Hash of the containing block
    pub block_hash: B256,
    /// Number of the containing block
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// Hash of the emitting transaction
    pub transaction_hash: B256,
    /// Index of the emitting transaction in the block
    #[serde(with = "alloy_serde::quantity")]
    pub transaction_index: u64,
    /// Index of the log in the block
    #[serde(with = "alloy_serde::quantity")]
    pub log_index: u64,
    /// Whether the log was removed by a reorg
    pub removed: bool,
}

/// A receipt as returned by `eth_getTransactionReceipt`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: B256,
    /// Index of the transaction in the block
    #[serde(with = "alloy_serde::quantity")]
    pub transaction_index: u64,
    /// Hash of the containing block
    pub block_hash: B256,
    /// Number of the containing block
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    /// Sender
    pub from: Address,
    /// Receiver; `None` for contract creations
    pub to: Option<Address>,
    /// Gas used by the block up to and including this transaction
    #[serde(with = "alloy_serde::quantity")]
    pub cumulative_gas_used: u64,
    /// Gas used by this transaction
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// Price per unit of gas paid by the sender
    #[serde(with = "alloy_serde::quantity")]
    pub effective_gas_price: u128,
    /// Address of the created contract, if any
    pub contract_address: Option<Address>,
    /// Emitted logs
    pub logs: Vec<Log>,
    /// Bloom filter of the logs
    pub logs_bloom: Bloom,
    /// EIP-2718 type
    #[serde(rename = "type", with = "alloy_serde::quantity")]
    pub transaction_type: u8,
    /// 1 for success, 0 for failure
    #[serde(with = "alloy_serde::quantity")]
    pub status: u8,
}
