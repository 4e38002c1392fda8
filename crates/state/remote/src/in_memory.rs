use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use edr_primitives::{Address, HashMap, U256};
use edr_state_api::{account::AccountInfo, StateError};
use parking_lot::Mutex;

use crate::RemoteSource;

/// Values of an item, keyed by the block number from which they apply.
type History<T> = BTreeMap<u64, T>;

fn value_at<T: Clone>(history: Option<&History<T>>, block_number: u64) -> Option<T> {
    history.and_then(|history| {
        history
            .range(..=block_number)
            .next_back()
            .map(|(_, value)| value.clone())
    })
}

/// An in-memory [`RemoteSource`] that counts the number of fetches, for
/// testing.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    accounts: Mutex<HashMap<Address, History<AccountInfo>>>,
    storage: Mutex<HashMap<(Address, U256), History<U256>>>,
    latest_block_number: u64,
    max_cacheable_block_number: u64,
    account_fetches: AtomicUsize,
    storage_fetches: AtomicUsize,
}

impl InMemoryRemote {
    /// Constructs an empty remote whose blocks up to
    /// `max_cacheable_block_number` are considered safe from reorgs.
    pub fn new(latest_block_number: u64, max_cacheable_block_number: u64) -> Self {
        Self {
            latest_block_number,
            max_cacheable_block_number,
            ..Self::default()
        }
    }

    /// The number of the latest block.
    pub fn latest_block_number(&self) -> u64 {
        self.latest_block_number
    }

    /// Inserts an account that exists from the first block onwards.
    pub fn insert_account(&self, address: Address, account_info: AccountInfo) {
        self.insert_account_at(0, address, account_info);
    }

    /// Inserts an account that applies from the provided block onwards.
    pub fn insert_account_at(&self, block_number: u64, address: Address, account_info: AccountInfo) {
        self.accounts
            .lock()
            .entry(address)
            .or_default()
            .insert(block_number, account_info);
    }

    /// Inserts a storage slot that exists from the first block onwards.
    pub fn insert_storage(&self, address: Address, index: U256, value: U256) {
        self.insert_storage_at(0, address, index, value);
    }

    /// Inserts a storage slot that applies from the provided block onwards.
    pub fn insert_storage_at(&self, block_number: u64, address: Address, index: U256, value: U256) {
        self.storage
            .lock()
            .entry((address, index))
            .or_default()
            .insert(block_number, value);
    }

    /// The number of account fetches so far.
    pub fn account_fetches(&self) -> usize {
        self.account_fetches.load(Ordering::SeqCst)
    }

    /// The number of storage fetches so far.
    pub fn storage_fetches(&self) -> usize {
        self.storage_fetches.load(Ordering::SeqCst)
    }
}

impl RemoteSource for InMemoryRemote {
    fn fetch_account(
        &self,
        address: Address,
        block_number: u64,
    ) -> Result<Option<AccountInfo>, StateError> {
        self.account_fetches.fetch_add(1, Ordering::SeqCst);

        let accounts = self.accounts.lock();
        Ok(value_at(accounts.get(&address), block_number)
            .filter(|account_info| !account_info.is_empty()))
    }

    fn fetch_storage(
        &self,
        address: Address,
        index: U256,
        block_number: u64,
    ) -> Result<U256, StateError> {
        self.storage_fetches.fetch_add(1, Ordering::SeqCst);

        let storage = self.storage.lock();
        Ok(value_at(storage.get(&(address, index)), block_number).unwrap_or(U256::ZERO))
    }

    fn is_cacheable_block_number(&self, block_number: u64) -> Result<bool, StateError> {
        Ok(block_number <= self.max_cacheable_block_number)
    }
}
