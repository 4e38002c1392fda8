use edr_chain_config::Hardfork;
use edr_primitives::{Address, B256, U256};

/// The maximum size of deployed contract code, per EIP-170.
pub const MAX_CODE_SIZE: usize = 0x6000;

/// The maximum size of init code, per EIP-3860.
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;

/// Configuration of the execution environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CfgEnv {
    /// Chain ID that replay-protected transactions must match
    pub chain_id: u64,
    /// Hardfork whose rules apply
    pub hardfork: Hardfork,
    /// Whether contracts of any size can be deployed
    pub allow_unlimited_contract_size: bool,
    /// Whether transactions with a fee below the base fee are allowed. Used
    /// for calls that should not require funds.
    pub disable_base_fee: bool,
    /// Whether the sender nonce is ignored.
    pub disable_nonce_check: bool,
    /// Whether the sender balance is topped up to cover the transaction
    /// instead of rejecting it.
    pub disable_balance_check: bool,
    /// Whether the transaction gas limit may exceed the block gas limit.
    pub disable_block_gas_limit: bool,
    /// Whether senders with deployed code are accepted (EIP-3607).
    pub disable_eip3607: bool,
}

impl CfgEnv {
    /// Constructs a configuration for the provided chain and hardfork, with
    /// all checks enabled.
    pub fn new(chain_id: u64, hardfork: Hardfork) -> Self {
        Self {
            chain_id,
            hardfork,
            allow_unlimited_contract_size: false,
            disable_base_fee: false,
            disable_nonce_check: false,
            disable_balance_check: false,
            disable_block_gas_limit: false,
            disable_eip3607: false,
        }
    }

    /// The maximum size of deployed contract code.
    pub fn max_code_size(&self) -> usize {
        if self.allow_unlimited_contract_size {
            usize::MAX
        } else {
            MAX_CODE_SIZE
        }
    }

    /// The maximum size of init code.
    pub fn max_initcode_size(&self) -> usize {
        if self.allow_unlimited_contract_size {
            usize::MAX
        } else {
            MAX_INITCODE_SIZE
        }
    }
}

/// The block in which a transaction is executed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEnv {
    /// Block number
    pub number: u64,
    /// Recipient of the block's fees and reward
    pub beneficiary: Address,
    /// UNIX timestamp in seconds
    pub timestamp: u64,
    /// Gas limit of the block
    pub gas_limit: u64,
    /// Base fee per gas, after EIP-1559 activated
    pub base_fee: Option<u128>,
    /// Difficulty, before the merge
    pub difficulty: U256,
    /// Randomness beacon output, after the merge
    pub prevrandao: Option<B256>,
}
