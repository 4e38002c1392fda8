//! A state that layers local modifications on top of a remote node's state at
//! a fork block.

use std::sync::Arc;

use edr_primitives::{keccak256, Address, Bytes, HashMap, HashSet, B256, U256};
use edr_state_api::{
    account::AccountInfo, storage::OriginalStorageCache, AccountStorage, Checkpoints, State,
    StateError, StateView,
};
use edr_state_local::PersistentAccounts;
use edr_state_remote::{CachedRemoteState, RemoteSource};
use edr_utils::random::RandomHashGenerator;
use parking_lot::Mutex;
use rpds::{HashTrieMapSync, HashTrieSetSync};

/// Local modifications on top of the remote state.
#[derive(Clone, Debug)]
struct Overlay {
    accounts: PersistentAccounts,
    /// Accounts that were deleted locally, hiding their remote counterpart.
    removed_accounts: HashTrieSetSync<Address>,
    /// Accounts whose remote storage is hidden.
    cleared_storage: HashTrieSetSync<Address>,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            accounts: PersistentAccounts::default(),
            removed_accounts: HashTrieSetSync::new_sync(),
            cleared_storage: HashTrieSetSync::new_sync(),
        }
    }
}

impl Overlay {
    /// A digest of the overlay's content, read at the provided block.
    fn fingerprint(&self, block_number: u64) -> B256 {
        fn sorted(set: &HashTrieSetSync<Address>) -> Vec<Address> {
            let mut addresses: Vec<Address> = set.iter().copied().collect();
            addresses.sort_unstable();
            addresses
        }

        let mut preimage = Vec::new();
        preimage.extend_from_slice(self.accounts.state_root().as_slice());
        preimage.extend_from_slice(&block_number.to_be_bytes());
        for address in sorted(&self.removed_accounts) {
            preimage.extend_from_slice(address.as_slice());
        }
        // Separator between the two sets
        preimage.push(0xff);
        for address in sorted(&self.cleared_storage) {
            preimage.extend_from_slice(address.as_slice());
        }

        keccak256(preimage)
    }
}

#[derive(Clone, Debug)]
struct Snapshot {
    overlay: Overlay,
    block_number: u64,
}

/// A [`StateView`] that serves any data that was not modified locally from a
/// remote node at the fork block.
///
/// State roots are not Merkle roots. Each distinct local state is assigned a
/// pseudo-random root, which remains addressable through
/// [`StateView::set_state_root`].
#[derive(Clone, Debug)]
pub struct ForkedState {
    overlay: Overlay,
    remote: Arc<Mutex<CachedRemoteState>>,
    hash_generator: Arc<Mutex<RandomHashGenerator>>,
    fork_block_number: u64,
    /// The block number from which remote data is read.
    block_number: u64,
    /// Root of the current state, invalidated on every mutation.
    state_root: Option<B256>,
    snapshots: HashTrieMapSync<B256, Snapshot>,
    roots_by_fingerprint: HashTrieMapSync<B256, B256>,
    checkpoints: Checkpoints,
    original_storage: OriginalStorageCache,
    touched: HashSet<Address>,
}

impl ForkedState {
    /// Constructs a new instance that reads remote data at the fork block,
    /// whose state root is `state_root`.
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        hash_generator: Arc<Mutex<RandomHashGenerator>>,
        fork_block_number: u64,
        state_root: B256,
    ) -> Self {
        let mut state = Self {
            overlay: Overlay::default(),
            remote: Arc::new(Mutex::new(CachedRemoteState::new(remote))),
            hash_generator,
            fork_block_number,
            block_number: fork_block_number,
            state_root: None,
            snapshots: HashTrieMapSync::new_sync(),
            roots_by_fingerprint: HashTrieMapSync::new_sync(),
            checkpoints: Checkpoints::default(),
            original_storage: OriginalStorageCache::default(),
            touched: HashSet::default(),
        };

        state.remember_root(state_root);
        state
    }

    /// The number of the block that was forked.
    pub fn fork_block_number(&self) -> u64 {
        self.fork_block_number
    }

    /// The number of the block from which remote data is currently read.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    fn remember_root(&mut self, state_root: B256) {
        let fingerprint = self.overlay.fingerprint(self.block_number);

        self.snapshots.insert_mut(
            state_root,
            Snapshot {
                overlay: self.overlay.clone(),
                block_number: self.block_number,
            },
        );
        self.roots_by_fingerprint.insert_mut(fingerprint, state_root);
        self.state_root = Some(state_root);
    }

    fn restore(&mut self, state_root: B256) -> Result<(), StateError> {
        let snapshot = self
            .snapshots
            .get(&state_root)
            .cloned()
            .ok_or(StateError::UnknownStateRoot(state_root))?;

        self.overlay = snapshot.overlay;
        self.block_number = snapshot.block_number;
        self.state_root = Some(state_root);

        Ok(())
    }

    fn mutate(&mut self) -> &mut Overlay {
        self.state_root = None;
        &mut self.overlay
    }

    /// Copies the account into the overlay, if it isn't there yet, so local
    /// writes don't lose its remote fields.
    fn materialize(&mut self, address: Address) -> Result<(), StateError> {
        if self.overlay.accounts.contains(&address) {
            return Ok(());
        }

        let account_info = if self.overlay.removed_accounts.contains(&address) {
            AccountInfo::default()
        } else {
            let mut remote = self.remote.lock();
            remote
                .account(address, self.block_number)?
                .map(|mut account_info| {
                    account_info.code = remote.code_by_hash(&account_info.code_hash);
                    account_info
                })
                .unwrap_or_default()
        };

        self.mutate().accounts.put_account(address, account_info);
        Ok(())
    }
}

fn read_storage(
    overlay: &Overlay,
    remote: &Mutex<CachedRemoteState>,
    block_number: u64,
    address: Address,
    index: U256,
) -> Result<U256, StateError> {
    if let Some(value) = overlay.accounts.storage_slot(&address, &index) {
        Ok(value)
    } else if overlay.cleared_storage.contains(&address)
        || overlay.removed_accounts.contains(&address)
    {
        Ok(U256::ZERO)
    } else {
        remote.lock().storage(address, index, block_number)
    }
}

impl State for ForkedState {
    type Error = StateError;

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn basic(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if let Some(account) = self.overlay.accounts.account(&address) {
            Ok(Some(account))
        } else if self.overlay.removed_accounts.contains(&address) {
            Ok(None)
        } else {
            self.remote.lock().account(address, self.block_number)
        }
    }

    fn code_by_hash(&self, code_hash: B256) -> Result<Bytes, Self::Error> {
        self.overlay
            .accounts
            .code_by_hash(&code_hash)
            .or_else(|| self.remote.lock().code_by_hash(&code_hash))
            .ok_or(StateError::InvalidCodeHash(code_hash))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn storage(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        read_storage(
            &self.overlay,
            &self.remote,
            self.block_number,
            address,
            index,
        )
    }
}

impl StateView for ForkedState {
    fn put_account(&mut self, address: Address, account: AccountInfo) -> Result<(), StateError> {
        self.materialize(address)?;
        self.mutate().accounts.put_account(address, account);
        Ok(())
    }

    fn delete_account(&mut self, address: Address) -> Result<(), StateError> {
        let overlay = self.mutate();
        overlay.accounts.remove_account(&address);
        overlay.removed_accounts.insert_mut(address);
        overlay.cleared_storage.insert_mut(address);
        Ok(())
    }

    fn put_contract_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        self.materialize(address)?;
        self.mutate().accounts.put_code(address, code);
        Ok(())
    }

    fn original_contract_storage(
        &mut self,
        address: Address,
        index: U256,
    ) -> Result<U256, StateError> {
        self.original_storage.get_or_load(address, index, || {
            read_storage(
                &self.overlay,
                &self.remote,
                self.block_number,
                address,
                index,
            )
        })
    }

    fn put_contract_storage(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<(), StateError> {
        self.materialize(address)?;
        // Zero values are kept in the overlay to shadow remote values.
        self.mutate()
            .accounts
            .set_storage_slot(address, index, value);
        Ok(())
    }

    fn clear_contract_storage(&mut self, address: Address) -> Result<(), StateError> {
        self.materialize(address)?;

        let overlay = self.mutate();
        overlay.accounts.clear_storage(&address);
        overlay.cleared_storage.insert_mut(address);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn state_root(&mut self) -> Result<B256, StateError> {
        if let Some(state_root) = self.state_root {
            return Ok(state_root);
        }

        let fingerprint = self.overlay.fingerprint(self.block_number);
        let state_root = if let Some(state_root) = self.roots_by_fingerprint.get(&fingerprint) {
            *state_root
        } else {
            self.hash_generator.lock().next_value()
        };

        self.remember_root(state_root);
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
        block_number: Option<u64>,
    ) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("setBlockContext")?;
        self.original_storage.clear();

        match block_number {
            Some(block_number) if block_number <= self.fork_block_number => {
                self.overlay = Overlay::default();
                self.block_number = block_number;
                self.remember_root(state_root);
                Ok(())
            }
            _ => self.restore(state_root),
        }
    }

    fn restore_fork_block_context(&mut self, state_root: B256) -> Result<(), StateError> {
        self.checkpoints.ensure_empty("restoreForkBlockContext")?;
        self.block_number = self.fork_block_number;
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
                .basic(address)?
                .is_some_and(|account_info| account_info.is_empty())
            {
                self.delete_account(address)?;
            }
        }

        Ok(())
    }

    fn dump_storage(&self, _address: Address) -> Result<AccountStorage, StateError> {
        Err(StateError::UnsupportedInForkMode {
            action: "dumpStorage",
        })
    }

    fn has_genesis_state(&self) -> Result<bool, StateError> {
        Err(StateError::UnsupportedInForkMode {
            action: "hasGenesisState",
        })
    }

    fn generate_canonical_genesis(&mut self) -> Result<(), StateError> {
        Err(StateError::UnsupportedInForkMode {
            action: "generateCanonicalGenesis",
        })
    }

    fn generate_genesis(
        &mut self,
        _accounts: HashMap<Address, AccountInfo>,
    ) -> Result<(), StateError> {
        Err(StateError::UnsupportedInForkMode {
            action: "generateGenesis",
        })
    }
}
