use std::time::Instant;

use edr_mem_pool::MemPool;
use edr_primitives::{Address, B256};
use edr_utils::random::RandomHashGenerator;

/// Everything `evm_revert` restores.
#[derive(Clone, Debug)]
pub(crate) struct Snapshot {
    pub block_number: u64,
    pub block_time_offset_seconds: i64,
    pub coinbase: Address,
    pub mem_pool: MemPool,
    pub next_block_base_fee_per_gas: Option<u128>,
    pub next_block_timestamp: Option<u64>,
    pub prev_randao_generator: RandomHashGenerator,
    pub state_root: B256,
    pub time: Instant,
}
