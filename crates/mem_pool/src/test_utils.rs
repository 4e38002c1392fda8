use core::num::NonZeroU64;

use edr_primitives::{Address, HashMap};
use edr_state_api::{StateError, StateView as _, account::AccountInfo};
use edr_state_local::LocalState;
use edr_transaction::Signed;

use crate::{MemPool, MemPoolAddTransactionError};

/// A test fixture for `MemPool`.
pub struct MemPoolTestFixture {
    /// The mem pool.
    pub mem_pool: MemPool,
    /// The state.
    pub state: LocalState,
}

impl MemPoolTestFixture {
    /// Constructs an instance with the provided accounts.
    pub fn with_accounts(accounts: &[(Address, AccountInfo)]) -> Result<Self, StateError> {
        let accounts = accounts.iter().cloned().collect::<HashMap<_, _>>();

        Ok(MemPoolTestFixture {
            // SAFETY: literal is non-zero
            mem_pool: MemPool::new(unsafe { NonZeroU64::new_unchecked(10_000_000u64) }),
            state: LocalState::with_accounts(accounts)?,
        })
    }

    /// Tries to add the provided transaction to the mem pool.
    pub fn add_transaction(
        &mut self,
        transaction: Signed,
    ) -> Result<(), MemPoolAddTransactionError<StateError>> {
        self.mem_pool.add_transaction(&self.state, transaction)
    }

    /// Overwrites an account in the state.
    pub fn set_account(&mut self, address: Address, account: AccountInfo) -> Result<(), StateError> {
        self.state.put_account(address, account)
    }

    /// Sets the block gas limit.
    pub fn set_block_gas_limit(&mut self, block_gas_limit: NonZeroU64) -> Result<(), StateError> {
        self.mem_pool
            .set_block_gas_limit(&self.state, block_gas_limit)
    }

    /// Updates the mem pool.
    pub fn update(&mut self) -> Result<(), StateError> {
        self.mem_pool.update(&self.state)
    }
}
