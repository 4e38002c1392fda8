//! Ethereum block headers and the rules for deriving a child header from its
//! parent.

mod blob_gas;
mod overrides;

use edr_chain_config::Hardfork;
use edr_eip1559::{next_base_fee_per_gas, BaseFeeParams, ParentGasUsage, INITIAL_BASE_FEE};
use edr_primitives::{
    b256, keccak256, Address, Bloom, Bytes, B256, B64, KECCAK_NULL_RLP, KECCAK_RLP_EMPTY_ARRAY,
    U256,
};

pub use self::{blob_gas::BlobGas, overrides::HeaderOverrides};

/// The commitment of an empty list of execution layer requests (EIP-7685).
pub const EMPTY_REQUESTS_HASH: B256 =
    b256!("0xe3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");

/// The difficulty of the first block of a pre-merge chain.
pub const GENESIS_DIFFICULTY: u64 = 131_072;

/// ethereum block header
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    alloy_rlp::RlpDecodable,
    alloy_rlp::RlpEncodable,
    serde::Deserialize,
    serde::Serialize,
)]
#[serde(rename_all = "camelCase")]
#[rlp(trailing)]
pub struct BlockHeader {
    /// The parent block's hash
    pub parent_hash: B256,
    /// The ommers' root hash
    #[serde(rename = "sha3Uncles")]
    pub ommers_hash: B256,
    /// The block's beneficiary address
    #[serde(rename = "miner")]
    pub beneficiary: Address,
    /// The state's root hash
    pub state_root: B256,
    /// The transactions' root hash
    pub transactions_root: B256,
    /// The receipts' root hash
    pub receipts_root: B256,
    /// The logs' bloom
    pub logs_bloom: Bloom,
    /// The block's difficulty
    pub difficulty: U256,
    /// The block's number
    #[serde(with = "alloy_serde::quantity")]
    pub number: u64,
    /// The block's gas limit
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    /// The amount of gas used by the block
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    /// The block's timestamp
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// The block's extra data
    pub extra_data: Bytes,
    /// The block's mix hash
    pub mix_hash: B256,
    /// The block's nonce
    pub nonce: B64,
    /// `BaseFee` was added by EIP-1559 and is ignored in legacy headers.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub base_fee_per_gas: Option<u128>,
    /// `WithdrawalsHash` was added by EIP-4895 and is ignored in legacy
    /// headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals_root: Option<B256>,
    /// Blob gas was added by EIP-4844 and is ignored in older headers.
    #[serde(flatten)]
    pub blob_gas: Option<BlobGas>,
    /// The hash tree root of the parent beacon block for the given execution
    /// block (EIP-4788).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
    /// The commitment hash calculated for a list of [EIP-7685] data requests.
    ///
    /// [EIP-7685]: https://eips.ethereum.org/EIPS/eip-7685
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_hash: Option<B256>,
}

impl BlockHeader {
    /// Completes a [`PartialHeader`] once the transactions root is known.
    pub fn new(partial_header: PartialHeader, transactions_root: B256) -> Self {
        let PartialHeader {
            parent_hash,
            ommers_hash,
            beneficiary,
            state_root,
            receipts_root,
            logs_bloom,
            difficulty,
            number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data,
            mix_hash,
            nonce,
            base_fee,
            withdrawals_root,
            blob_gas,
            parent_beacon_block_root,
            requests_hash,
        } = partial_header;

        Self {
            parent_hash,
            ommers_hash,
            beneficiary,
            state_root,
            transactions_root,
            receipts_root,
            logs_bloom,
            difficulty,
            number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data,
            mix_hash,
            nonce,
            base_fee_per_gas: base_fee,
            withdrawals_root,
            blob_gas,
            parent_beacon_block_root,
            requests_hash,
        }
    }

    /// Keccak hash of the RLP-encoded header.
    pub fn hash(&self) -> B256 {
        keccak256(alloy_rlp::encode(self))
    }

    fn gas_usage(&self) -> ParentGasUsage {
        ParentGasUsage {
            base_fee_per_gas: self.base_fee_per_gas,
            gas_used: self.gas_used,
            gas_limit: self.gas_limit,
        }
    }
}

/// A header under construction: every field of [`BlockHeader`] except the
/// transactions root. Gas usage, receipts and the state root are filled in
/// while transactions are added to the block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialHeader {
    pub parent_hash: B256,
    pub ommers_hash: B256,
    pub beneficiary: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    pub difficulty: U256,
    pub number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub mix_hash: B256,
    pub nonce: B64,
    pub base_fee: Option<u128>,
    pub withdrawals_root: Option<B256>,
    pub blob_gas: Option<BlobGas>,
    pub parent_beacon_block_root: Option<B256>,
    pub requests_hash: Option<B256>,
}

/// The chain rules that apply to a new block.
#[derive(Clone, Debug)]
pub struct BlockConfig {
    /// Parameters of the base fee calculation
    pub base_fee_params: BaseFeeParams,
    /// The hardfork that the block is mined in
    pub hardfork: Hardfork,
}

/// Gas limit of a block whose parent and overrides don't set one.
const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

/// Proof-of-work nonce used by pre-merge blocks.
const PRE_MERGE_NONCE: u64 = 66;

impl PartialHeader {
    /// Derives the header of the child of `parent`, or of a genesis block if
    /// there is no parent. Every field set in `overrides` takes precedence.
    pub fn new(
        block_config: &BlockConfig,
        overrides: HeaderOverrides,
        parent: Option<&BlockHeader>,
    ) -> Self {
        let hardfork = block_config.hardfork;
        let is_post_merge = hardfork.is_post_merge();
        let is_cancun = hardfork >= Hardfork::Cancun;

        let base_fee = match overrides.base_fee {
            Some(base_fee) => Some(base_fee),
            None if hardfork >= Hardfork::London => {
                let base_fee_params = overrides
                    .base_fee_params
                    .as_ref()
                    .unwrap_or(&block_config.base_fee_params);

                Some(parent.map_or(u128::from(INITIAL_BASE_FEE), |parent| {
                    calculate_next_base_fee_per_gas(parent, base_fee_params)
                }))
            }
            None => None,
        };

        let difficulty = match (overrides.difficulty, parent) {
            (Some(difficulty), _) => difficulty,
            (None, _) if is_post_merge => U256::ZERO,
            (None, Some(parent)) => parent.difficulty,
            (None, None) => U256::from(GENESIS_DIFFICULTY),
        };

        let nonce = overrides.nonce.unwrap_or(if is_post_merge {
            B64::ZERO
        } else {
            B64::from(PRE_MERGE_NONCE)
        });

        Self {
            parent_hash: overrides
                .parent_hash
                .unwrap_or_else(|| parent.map_or(B256::ZERO, BlockHeader::hash)),
            ommers_hash: KECCAK_RLP_EMPTY_ARRAY,
            beneficiary: overrides.beneficiary.unwrap_or_default(),
            state_root: overrides.state_root.unwrap_or(KECCAK_NULL_RLP),
            receipts_root: KECCAK_NULL_RLP,
            logs_bloom: Bloom::default(),
            difficulty,
            number: overrides
                .number
                .unwrap_or_else(|| parent.map_or(0, |parent| parent.number + 1)),
            gas_limit: overrides.gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
            gas_used: 0,
            timestamp: overrides.timestamp.unwrap_or_default(),
            extra_data: overrides.extra_data.unwrap_or_default(),
            mix_hash: overrides.mix_hash.unwrap_or_default(),
            nonce,
            base_fee,
            withdrawals_root: (hardfork >= Hardfork::Shanghai).then_some(KECCAK_NULL_RLP),
            blob_gas: is_cancun.then(BlobGas::default),
            parent_beacon_block_root: is_cancun
                .then(|| overrides.parent_beacon_block_root.unwrap_or(B256::ZERO)),
            requests_hash: (hardfork >= Hardfork::Prague).then_some(EMPTY_REQUESTS_HASH),
        }
    }
}

/// Calculates the base fee of the child of `parent`.
///
/// A parent without base fee, i.e. the last pre-London block, yields the
/// initial base fee.
pub fn calculate_next_base_fee_per_gas(parent: &BlockHeader, base_fee_params: &BaseFeeParams) -> u128 {
    next_base_fee_per_gas(&parent.gas_usage(), base_fee_params)
}
