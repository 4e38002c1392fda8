use edr_primitives::{code_hash, Address, Bytes, B256, KECCAK_EMPTY, U256};
use edr_state_api::{
    account::{AccountInfo, BasicAccount},
    state_root, storage_root, AccountStorage,
};
use rpds::HashTrieMapSync;

#[derive(Clone, Debug)]
struct StoredAccount {
    balance: U256,
    nonce: u64,
    code_hash: B256,
    storage: HashTrieMapSync<U256, U256>,
}

impl Default for StoredAccount {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            storage: HashTrieMapSync::new_sync(),
        }
    }
}

impl From<&StoredAccount> for AccountInfo {
    fn from(account: &StoredAccount) -> Self {
        Self {
            balance: account.balance,
            nonce: account.nonce,
            code_hash: account.code_hash,
            code: None,
        }
    }
}

/// Persistent mapping of accounts to their information, storage, and code.
///
/// Cloning is cheap, as the underlying maps share structure.
#[derive(Clone, Debug)]
pub struct PersistentAccounts {
    accounts: HashTrieMapSync<Address, StoredAccount>,
    code: HashTrieMapSync<B256, Bytes>,
}

impl Default for PersistentAccounts {
    fn default() -> Self {
        Self {
            accounts: HashTrieMapSync::new_sync(),
            code: HashTrieMapSync::new_sync(),
        }
    }
}

impl PersistentAccounts {
    /// Returns the account's information without its code, if it exists.
    pub fn account(&self, address: &Address) -> Option<AccountInfo> {
        self.accounts.get(address).map(AccountInfo::from)
    }

    /// Whether the account exists.
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Whether there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Returns the addresses of all accounts.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.accounts.keys()
    }

    /// Returns the code with the provided hash, if it is known.
    pub fn code_by_hash(&self, code_hash: &B256) -> Option<Bytes> {
        if *code_hash == KECCAK_EMPTY {
            Some(Bytes::new())
        } else {
            self.code.get(code_hash).cloned()
        }
    }

    /// Writes the balance and nonce of the account, creating it if necessary.
    /// The code is only replaced when provided.
    pub fn put_account(&mut self, address: Address, account_info: AccountInfo) {
        let mut account = self.accounts.get(&address).cloned().unwrap_or_default();

        account.balance = account_info.balance;
        account.nonce = account_info.nonce;
        if let Some(code) = account_info.code {
            account.code_hash = self.insert_code(code);
        }

        self.accounts.insert_mut(address, account);
    }

    /// Replaces the code of the account, creating it if necessary.
    pub fn put_code(&mut self, address: Address, code: Bytes) {
        let mut account = self.accounts.get(&address).cloned().unwrap_or_default();
        account.code_hash = self.insert_code(code);

        self.accounts.insert_mut(address, account);
    }

    fn insert_code(&mut self, code: Bytes) -> B256 {
        let code_hash = code_hash(&code);
        if code_hash != KECCAK_EMPTY {
            self.code.insert_mut(code_hash, code);
        }
        code_hash
    }

    /// Removes the account and its storage. Returns whether it existed.
    pub fn remove_account(&mut self, address: &Address) -> bool {
        self.accounts.remove_mut(address)
    }

    /// Returns the value of the storage slot if it was written. Zero values
    /// are retained, so they can shadow values stored elsewhere.
    pub fn storage_slot(&self, address: &Address, index: &U256) -> Option<U256> {
        self.accounts
            .get(address)
            .and_then(|account| account.storage.get(index).copied())
    }

    /// Writes a storage slot, creating the account if necessary.
    pub fn set_storage_slot(&mut self, address: Address, index: U256, value: U256) {
        let mut account = self.accounts.get(&address).cloned().unwrap_or_default();
        account.storage.insert_mut(index, value);

        self.accounts.insert_mut(address, account);
    }

    /// Removes all storage slots of the account, if it exists.
    pub fn clear_storage(&mut self, address: &Address) {
        if let Some(account) = self.accounts.get(address) {
            let account = StoredAccount {
                storage: HashTrieMapSync::new_sync(),
                ..account.clone()
            };

            self.accounts.insert_mut(*address, account);
        }
    }

    /// Returns all non-zero storage slots of the account.
    pub fn storage(&self, address: &Address) -> AccountStorage {
        self.accounts
            .get(address)
            .map(|account| {
                account
                    .storage
                    .iter()
                    .filter(|(_, value)| **value != U256::ZERO)
                    .map(|(index, value)| (*index, *value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Computes the Merkle-Patricia root of the accounts.
    pub fn state_root(&self) -> B256 {
        let accounts: Vec<(Address, BasicAccount)> = self
            .accounts
            .iter()
            .map(|(address, account)| {
                let basic = BasicAccount {
                    nonce: account.nonce,
                    balance: account.balance,
                    storage_root: storage_root(account.storage.iter()),
                    code_hash: account.code_hash,
                };
                (*address, basic)
            })
            .collect();

        state_root(accounts.iter().map(|(address, account)| (address, account)))
    }
}
