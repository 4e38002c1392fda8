use std::sync::Arc;

use edr_primitives::{hash_map::Entry, Address, Bytes, HashMap, B256, U256};
use edr_state_api::{account::AccountInfo, AccountStorage, StateError};

use crate::RemoteSource;

#[derive(Clone, Debug, Default)]
struct AccountAndStorage {
    info: Option<AccountInfo>,
    storage: AccountStorage,
}

/// A [`RemoteSource`] with a per-block cache for blocks that are safe from
/// reorgs.
#[derive(Debug)]
pub struct CachedRemoteState {
    source: Arc<dyn RemoteSource>,
    /// Mapping of block numbers to cached accounts
    account_cache: HashMap<u64, HashMap<Address, AccountAndStorage>>,
    /// Code never goes stale, so it's cached regardless of block number.
    code_cache: HashMap<B256, Bytes>,
}

impl CachedRemoteState {
    /// Constructs a new instance.
    pub fn new(source: Arc<dyn RemoteSource>) -> Self {
        Self {
            source,
            account_cache: HashMap::default(),
            code_cache: HashMap::default(),
        }
    }

    /// Retrieves the account at the provided block, without its code. The
    /// code is available through [`CachedRemoteState::code_by_hash`].
    pub fn account(
        &mut self,
        address: Address,
        block_number: u64,
    ) -> Result<Option<AccountInfo>, StateError> {
        if let Some(account) = self
            .account_cache
            .get(&block_number)
            .and_then(|accounts| accounts.get(&address))
        {
            return Ok(account.info.clone());
        }

        let account_info = self.fetch_account(address, block_number)?;
        if self.source.is_cacheable_block_number(block_number)? {
            self.account_cache
                .entry(block_number)
                .or_default()
                .entry(address)
                .or_default()
                .info
                .clone_from(&account_info);
        }

        Ok(account_info)
    }

    /// Returns the code with the provided hash, if it was previously fetched.
    pub fn code_by_hash(&self, code_hash: &B256) -> Option<Bytes> {
        self.code_cache.get(code_hash).cloned()
    }

    /// Retrieves a storage slot at the provided block.
    pub fn storage(
        &mut self,
        address: Address,
        index: U256,
        block_number: u64,
    ) -> Result<U256, StateError> {
        if let Some(value) = self
            .account_cache
            .get(&block_number)
            .and_then(|accounts| accounts.get(&address))
            .and_then(|account| account.storage.get(&index))
        {
            return Ok(*value);
        }

        let value = self.source.fetch_storage(address, index, block_number)?;
        if self.source.is_cacheable_block_number(block_number)? {
            let block_accounts = self.account_cache.entry(block_number).or_default();
            match block_accounts.entry(address) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().storage.insert(index, value);
                }
                Entry::Vacant(entry) => {
                    // Account needs to be loaded for a cache hit to be valid.
                    let info = self.source.fetch_account(address, block_number)?.map(
                        |account_info| split_code(&mut self.code_cache, account_info),
                    );

                    let mut account = AccountAndStorage {
                        info,
                        storage: AccountStorage::default(),
                    };
                    account.storage.insert(index, value);
                    entry.insert(account);
                }
            }
        }

        Ok(value)
    }

    fn fetch_account(
        &mut self,
        address: Address,
        block_number: u64,
    ) -> Result<Option<AccountInfo>, StateError> {
        Ok(self
            .source
            .fetch_account(address, block_number)?
            .map(|account_info| split_code(&mut self.code_cache, account_info)))
    }
}

/// Moves the account's code into the code cache.
fn split_code(code_cache: &mut HashMap<B256, Bytes>, mut account_info: AccountInfo) -> AccountInfo {
    if let Some(code) = account_info.code.take() {
        code_cache.entry(account_info.code_hash).or_insert(code);
    }
    account_info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryRemote;

    fn remote_with_account() -> (Arc<InMemoryRemote>, Address) {
        let address = Address::repeat_byte(0xda);

        let remote = InMemoryRemote::new(10, 5);
        remote.insert_account(
            address,
            AccountInfo::with_code(U256::from(7), 1, Bytes::from_static(&[0x60, 0x00])),
        );
        remote.insert_storage(address, U256::from(1), U256::from(42));

        (Arc::new(remote), address)
    }

    #[test]
    fn caches_safe_blocks() -> anyhow::Result<()> {
        let (remote, address) = remote_with_account();
        let mut cached = CachedRemoteState::new(remote.clone());

        let account = cached.account(address, 5)?.expect("account exists");
        assert!(account.code.is_none());
        assert!(cached.code_by_hash(&account.code_hash).is_some());

        cached.account(address, 5)?;
        assert_eq!(cached.storage(address, U256::from(1), 5)?, U256::from(42));
        assert_eq!(cached.storage(address, U256::from(1), 5)?, U256::from(42));

        assert_eq!(remote.account_fetches(), 1);
        assert_eq!(remote.storage_fetches(), 1);

        Ok(())
    }

    #[test]
    fn does_not_cache_unsafe_blocks() -> anyhow::Result<()> {
        let (remote, address) = remote_with_account();
        let mut cached = CachedRemoteState::new(remote.clone());

        cached.account(address, 10)?;
        cached.account(address, 10)?;
        cached.storage(address, U256::from(1), 10)?;
        cached.storage(address, U256::from(1), 10)?;

        assert_eq!(remote.account_fetches(), 2);
        assert_eq!(remote.storage_fetches(), 2);

        Ok(())
    }
}
