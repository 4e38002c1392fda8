//! Types and traits for Ethereum state management

pub mod account;
mod checkpoint;
pub mod r#dyn;
mod error;
/// Helpers for storage slots.
pub mod storage;

use core::fmt::Debug;

use auto_impl::auto_impl;
use dyn_clone::DynClone;
use edr_primitives::{trie::sec_trie_root, Address, Bytes, HashMap, B256, KECCAK_EMPTY, U256};

pub use self::{
    checkpoint::{CheckpointGuard, Checkpoints},
    error::StateError,
    r#dyn::DynState,
};
use crate::account::{Account, AccountInfo, AccountStatus, BasicAccount};

/// Account storage mapping of indices to values.
pub type AccountStorage = HashMap<U256, U256>;

/// Mapping of addresses to trie state accounts.
pub type TrieState = HashMap<Address, BasicAccount>;

/// Trait for reading state information.
#[auto_impl(&, &mut, Box, Rc, Arc)]
pub trait State {
    /// Combinatorial state error.
    type Error;

    /// Get basic account information, or `None` if the account does not
    /// exist.
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error>;

    /// Get account code by its hash
    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, Self::Error>;

    /// Get storage value of address at index.
    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error>;
}

/// A mutable account and storage view with nested checkpoints, addressable by
/// state root.
///
/// Implemented by both the local-only state and the forked state; the node
/// only depends on this trait.
pub trait StateView: State<Error = StateError> + Debug + DynClone + Send + Sync {
    /// Returns the account at the provided address, or the empty account if
    /// it does not exist.
    fn account(&self, address: Address) -> Result<AccountInfo, StateError> {
        Ok(self.basic(address)?.unwrap_or_default())
    }

    /// Overwrites the balance and nonce of the account. Code is replaced only
    /// when `account.code` is provided.
    fn put_account(&mut self, address: Address, account: AccountInfo) -> Result<(), StateError>;

    /// Removes the account, including its code and storage.
    fn delete_account(&mut self, address: Address) -> Result<(), StateError>;

    /// Whether the account is empty according to EIP-161.
    fn account_is_empty(&self, address: Address) -> Result<bool, StateError> {
        Ok(self.account(address)?.is_empty())
    }

    /// Returns the code of the account, which is empty for accounts without
    /// code.
    fn contract_code(&self, address: Address) -> Result<Bytes, StateError> {
        let account = self.account(address)?;
        if let Some(code) = account.code {
            Ok(code)
        } else if account.code_hash == KECCAK_EMPTY {
            Ok(Bytes::new())
        } else {
            self.code_by_hash(account.code_hash)
        }
    }

    /// Sets the code of the account, overwriting any existing code.
    fn put_contract_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError>;

    /// Returns the value of a storage slot.
    fn contract_storage(&self, address: Address, index: U256) -> Result<U256, StateError> {
        self.storage(address, index)
    }

    /// Returns the first value observed for the storage slot since the
    /// original storage cache was last cleared.
    fn original_contract_storage(
        &mut self,
        address: Address,
        index: U256,
    ) -> Result<U256, StateError>;

    /// Writes a storage slot.
    fn put_contract_storage(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<(), StateError>;

    /// Clears all storage slots of the account.
    fn clear_contract_storage(&mut self, address: Address) -> Result<(), StateError>;

    /// Returns the state root of the current state.
    fn state_root(&mut self) -> Result<B256, StateError>;

    /// Restores the state identified by the provided state root. Fails while
    /// checkpointed or if the state root is unknown.
    fn set_state_root(&mut self, state_root: B256) -> Result<(), StateError>;

    /// Saves the current state root on the checkpoint stack.
    fn checkpoint(&mut self) -> Result<(), StateError>;

    /// Pops the latest checkpoint, keeping all changes.
    fn commit(&mut self) -> Result<(), StateError>;

    /// Pops the latest checkpoint and restores the state it saved.
    fn revert(&mut self) -> Result<(), StateError>;

    /// Whether there are outstanding checkpoints.
    fn is_checkpointed(&self) -> bool;

    /// Points the state at the provided historical block. Fails while
    /// checkpointed.
    fn set_block_context(
        &mut self,
        state_root: B256,
        block_number: Option<u64>,
    ) -> Result<(), StateError>;

    /// Undoes a [`StateView::set_block_context`], restoring the provided state
    /// root. Fails while checkpointed.
    fn restore_fork_block_context(&mut self, state_root: B256) -> Result<(), StateError>;

    /// Forgets all values recorded for
    /// [`StateView::original_contract_storage`].
    fn clear_original_storage_cache(&mut self);

    /// Marks the account as touched during execution.
    fn touch_account(&mut self, address: Address);

    /// Removes all touched accounts that are empty, per EIP-161.
    fn cleanup_touched_accounts(&mut self) -> Result<(), StateError>;

    /// Returns all storage slots of the account.
    fn dump_storage(&self, address: Address) -> Result<AccountStorage, StateError>;

    /// Whether the state contains a genesis allocation.
    fn has_genesis_state(&self) -> Result<bool, StateError>;

    /// Initializes the state with the chain's canonical genesis allocation.
    fn generate_canonical_genesis(&mut self) -> Result<(), StateError>;

    /// Initializes the state with the provided genesis allocation.
    fn generate_genesis(
        &mut self,
        accounts: HashMap<Address, AccountInfo>,
    ) -> Result<(), StateError>;

    /// Applies the changes produced by executing a transaction.
    fn commit_changes(&mut self, changes: HashMap<Address, Account>) -> Result<(), StateError> {
        for (address, account) in changes {
            match account.status {
                AccountStatus::SelfDestructed => self.delete_account(address)?,
                AccountStatus::Created | AccountStatus::Touched => {
                    if account.status == AccountStatus::Created {
                        self.clear_contract_storage(address)?;
                    }

                    self.put_account(address, account.info)?;
                    for (index, value) in account.storage {
                        self.put_contract_storage(address, index, value)?;
                    }
                    self.touch_account(address);
                }
            }
        }

        Ok(())
    }
}

/// Calculates the state root hash of the provided state.
pub fn state_root<'a, I>(state: I) -> B256
where
    I: IntoIterator<Item = (&'a Address, &'a BasicAccount)>,
{
    sec_trie_root(state.into_iter().map(|(address, account)| {
        let account = alloy_rlp::encode(account);
        (address, account)
    }))
}

/// Calculates the storage root hash of the provided storage. Zero values are
/// not part of the trie.
pub fn storage_root<'a, I>(storage: I) -> B256
where
    I: IntoIterator<Item = (&'a U256, &'a U256)>,
{
    sec_trie_root(
        storage
            .into_iter()
            .filter(|(_, value)| **value != U256::ZERO)
            .map(|(index, value)| {
                let value = alloy_rlp::encode(value);
                (index.to_be_bytes::<32>(), value)
            }),
    )
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use edr_primitives::KECCAK_NULL_RLP;

    use super::*;

    #[test]
    fn empty_state_root() {
        let state = TrieState::default();

        assert_eq!(state_root(&state), KECCAK_NULL_RLP);
    }

    #[test]
    fn empty_storage_root() {
        let storage = AccountStorage::default();

        assert_eq!(storage_root(&storage), KECCAK_NULL_RLP);
    }

    #[test]
    fn zero_slots_do_not_affect_storage_root() {
        let mut storage = AccountStorage::default();
        storage.insert(U256::from(1), U256::ZERO);

        assert_eq!(storage_root(&storage), KECCAK_NULL_RLP);
    }

    #[test]
    fn precompiles_state_root() -> anyhow::Result<()> {
        const EXPECTED: &str = "0x5766c887a7240e4d1c035ccd3830a2f6a0c03d213a9f0b9b27c774916a4abcce";

        let mut state = TrieState::default();

        for idx in 1..=8u8 {
            let mut address = Address::ZERO;
            address.0[19] = idx;
            state.insert(address, BasicAccount::default());
        }

        assert_eq!(state_root(&state), B256::from_str(EXPECTED)?);

        Ok(())
    }
}
