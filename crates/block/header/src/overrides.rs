use edr_eip1559::BaseFeeParams;
use edr_primitives::{Address, Bytes, B256, B64, U256};

/// Data of a block header that can be overridden.
#[derive(Clone, Debug, Default)]
pub struct HeaderOverrides {
    /// The block's parent hash
    pub parent_hash: Option<B256>,
    /// The block's beneficiary
    pub beneficiary: Option<Address>,
    /// The block's state root
    pub state_root: Option<B256>,
    /// The block's difficulty
    pub difficulty: Option<U256>,
    /// The block's number
    pub number: Option<u64>,
    /// The block's gas limit
    pub gas_limit: Option<u64>,
    /// The block's timestamp
    pub timestamp: Option<u64>,
    /// The block's extra data
    pub extra_data: Option<Bytes>,
    /// The block's mix hash (or prevrandao)
    pub mix_hash: Option<B256>,
    /// The block's nonce
    pub nonce: Option<B64>,
    /// The block's base fee per gas
    pub base_fee: Option<u128>,
    /// Base fee parameters used instead of the chain's, when calculating the
    /// base fee from the parent
    pub base_fee_params: Option<BaseFeeParams>,
    /// The block's parent beacon block root
    pub parent_beacon_block_root: Option<B256>,
}
