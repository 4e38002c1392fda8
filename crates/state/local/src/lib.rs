//! A state that lives entirely in memory, without a remote node backing it.

mod accounts;

use edr_primitives::{Address, Bytes, HashMap, HashSet, B256, U256};
use edr_state_api::{
    account::AccountInfo, storage::OriginalStorageCache, AccountStorage, Checkpoints, State,
    StateError, StateView,
};
use rpds::HashTrieMapSync;

pub use self::accounts::PersistentAccounts;

/// A local-only [`StateView`] whose state roots are the Merkle-Patricia roots
/// of its accounts.
///
/// Every state root that has been observed remains addressable through
/// [`StateView::set_state_root`].
#[derive(Clone, Debug)]
pub struct LocalState {
    accounts: PersistentAccounts,
    /// Cached root of `accounts`, invalidated on every mutation.
    state_root: Option<B256>,
    snapshots: HashTrieMapSync<B256, PersistentAccounts>,
    checkpoints: Checkpoints,
    original_storage: OriginalStorageCache,
    touched: HashSet<Address>,
    genesis_root: Option<B256>,
}

impl Default for LocalState {
    fn default() -> Self {
        let accounts = PersistentAccounts::default();
        let state_root = accounts.state_root();

        let mut snapshots = HashTrieMapSync::new_sync();
        snapshots.insert_mut(state_root, accounts.clone());

        Self {
            accounts,
            state_root: Some(state_root),
            snapshots,
            checkpoints: Checkpoints::default(),
            original_storage: OriginalStorageCache::default(),
            touched: HashSet::default(),
            genesis_root: None,
        }
    }
}

impl LocalState {
    /// Constructs a state containing the provided accounts.
    pub fn with_accounts(accounts: HashMap<Address, AccountInfo>) -> Result<Self, StateError> {
        let mut state = Self::default();
        state.generate_genesis(accounts)?;
        Ok(state)
    }

    fn mutate(&mut self) -> &mut PersistentAccounts {
        self.state_root = None;
        &mut self.accounts
    }

    fn restore(&mut self, state_root: B256) -> Result<(), StateError> {
        if self.state_root == Some(state_root) {
            return Ok(());
        }

        let accounts = self
            .snapshots
            .get(&state_root)
            .cloned()
            .ok_or(StateError::UnknownStateRoot(state_root))?;

        self.accounts = accounts;
        self.state_root = Some(state_root);

        Ok(())
    }
}

impl State for LocalState {
    type Error = StateError;

    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.accounts.account(&address))
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, Self::Error> {
        self.accounts
            .code_by_hash(&code_hash)
            .ok_or(StateError::InvalidCodeHash(code_hash))
    }

    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        Ok(self
            .accounts
            .storage_slot(&address, &index)
            .unwrap_or(U256::ZERO))
    }
}

impl StateView for LocalState {
    fn put_account(&mut self, address: Address, account: AccountInfo) -> Result<(), StateError> {
        self.mutate().put_account(address, account);
        Ok(())
    }

    fn delete_account(&mut self, address: Address) -> Result<(), StateError> {
        if self.accounts.contains(&address) {
            self.mutate().remove_account(&address);
        }
        Ok(())
    }

    fn put_contract_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.mutate().put_code(address, code);
        Ok(())
    }

    fn original_contract_storage(
        &mut self,
        address: Address,
        index: U256,
    ) -> Result<U256, StateError> {
        let accounts = &self.accounts;
        self.original_storage.get_or_load(address, index, || {
            Ok(accounts.storage_slot(&address, &index).unwrap_or(U256::ZERO))
        })
    }

    fn put_contract_storage(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<(), StateError> {
        self.mutate().set_storage_slot(address, index, value);
        Ok(())
    }

    fn clear_contract_storage(&mut self, address: Address) -> Result<(), StateError> {
        self.mutate().clear_storage(&address);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn state_root(&mut self) -> Result<B256, StateError> {
        if let Some(state_root) = self.state_root {
            return Ok(state_root);
        }

        let state_root = self.accounts.state_root();
        self.snapshots.insert_mut(state_root, self.accounts.clone());
        self.state_root = Some(state_root);

        Ok(state_root)
    }

    fn set_state_root(&mut self, state_root: B256) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("setStateRoot")?;
        self.restore(state_root)
    }

    fn checkpoint(&mut self) -> Result<(), StateError> {
        let state_root = self.state_root()?;
        self.checkpoints.push(state_root);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StateError> {
        self.checkpoints.pop("commit").map(|_state_root| ())
    }

    fn revert(&mut self) -> Result<(), StateError> {
        let state_root = self.checkpoints.pop("revert")?;
        self.restore(state_root)
    }

    fn is_checkpointed(&self) -> bool {
        !self.checkpoints.is_empty()
    }

    fn set_block_context(
        &mut self,
        state_root: B256,
        _block_number: Option<u64>,
    ) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("setBlockContext")?;
        self.original_storage.clear();
        self.restore(state_root)
    }

    fn restore_fork_block_context(&mut self, state_root: B256) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("restoreForkBlockContext")?;
        self.restore(state_root)
    }

    fn clear_original_storage_cache(&mut self) {
        self.original_storage.clear();
    }

    fn touch_account(&mut self, address: Address) {
        self.touched.insert(address);
    }

    fn cleanup_touched_accounts(&mut self) -> Result<(), StateError> {
        let touched = std::mem::take(&mut self.touched);
        for address in touched {
            if self
                .accounts
                .account(&address)
                .is_some_and(|account| account.is_empty())
            {
                self.mutate().remove_account(&address);
            }
        }

        Ok(())
    }

    fn dump_storage(&self, address: Address) -> Result<AccountStorage, StateError> {
        Ok(self.accounts.storage(&address))
    }

    fn has_genesis_state(&self) -> Result<bool, StateError> {
        Ok(self
            .genesis_root
            .is_some_and(|genesis_root| self.snapshots.contains_key(&genesis_root)))
    }

    fn generate_canonical_genesis(&mut self) -> Result<(), StateError> {
        // The canonical genesis of a development chain is the empty state.
        self.generate_genesis(HashMap::default())
    }

    fn generate_genesis(
        &mut self,
        accounts: HashMap<Address, AccountInfo>,
    ) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("generateGenesis")?;

        for (address, account) in accounts {
            self.mutate().put_account(address, account);
        }

        self.genesis_root = Some(self.state_root()?);
        Ok(())
    }
}
