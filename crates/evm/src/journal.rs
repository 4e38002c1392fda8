use edr_primitives::{
    Address, Bytes, HashMap, KECCAK_EMPTY, Log, U256, code_hash, hash_map::Entry,
};
use edr_state_api::{
    StateError, StateView,
    account::{Account, AccountInfo, AccountStatus},
};

/// A saved position in a [`Journal`].
#[derive(Clone, Debug)]
pub struct JournalCheckpoint {
    changes: HashMap<Address, Account>,
    logs_len: usize,
}

/// Changes made by a transaction on top of a read-only state.
#[derive(Debug)]
pub struct Journal<'state> {
    state: &'state dyn StateView,
    changes: HashMap<Address, Account>,
    logs: Vec<Log>,
}

impl<'state> Journal<'state> {
    /// Constructs an empty journal on top of the provided state.
    pub fn new(state: &'state dyn StateView) -> Self {
        Self {
            state,
            changes: HashMap::default(),
            logs: Vec::new(),
        }
    }

    fn load(&mut self, address: Address) -> Result<&mut Account, StateError> {
        match self.changes.entry(address) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let info = self.state.basic(address)?.unwrap_or_default();
                Ok(entry.insert(Account::from(info)))
            }
        }
    }

    /// Returns the account, loading it from the state if necessary.
    pub fn account(&mut self, address: Address) -> Result<&AccountInfo, StateError> {
        Ok(&self.load(address)?.info)
    }

    /// Returns the code of the account.
    pub fn code(&mut self, address: Address) -> Result<Bytes, StateError> {
        let state = self.state;
        let info = &self.load(address)?.info;

        if let Some(code) = &info.code {
            Ok(code.clone())
        } else if info.code_hash == KECCAK_EMPTY {
            Ok(Bytes::new())
        } else {
            state.code_by_hash(info.code_hash)
        }
    }

    /// Returns the value of a storage slot.
    pub fn storage(&mut self, address: Address, index: U256) -> Result<U256, StateError> {
        let state = self.state;
        let account = self.load(address)?;

        if let Some(value) = account.storage.get(&index) {
            Ok(*value)
        } else if account.status == AccountStatus::Created {
            Ok(U256::ZERO)
        } else {
            state.storage(address, index)
        }
    }

    /// Writes a storage slot.
    pub fn set_storage(&mut self, address: Address, index: U256, value: U256) -> Result<(), StateError> {
        self.load(address)?.storage.insert(index, value);
        Ok(())
    }

    /// Increases the balance of the account.
    pub fn increment_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let account = self.load(address)?;
        account.info.balance = account.info.balance.saturating_add(amount);
        Ok(())
    }

    /// Decreases the balance of the account. Returns `false`, without
    /// changing the balance, if the account has insufficient funds.
    pub fn decrement_balance(&mut self, address: Address, amount: U256) -> Result<bool, StateError> {
        let account = self.load(address)?;
        if let Some(balance) = account.info.balance.checked_sub(amount) {
            account.info.balance = balance;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Transfers value between accounts. Returns `false`, without any
    /// changes, if the sender has insufficient funds.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<bool, StateError> {
        if !self.decrement_balance(from, value)? {
            return Ok(false);
        }

        self.increment_balance(to, value)?;
        Ok(true)
    }

    /// Increments the nonce of the account.
    pub fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let account = self.load(address)?;
        account.info.nonce = account.info.nonce.saturating_add(1);
        Ok(())
    }

    /// Creates an account without code or storage, keeping its balance.
    pub fn create_account(&mut self, address: Address, nonce: u64) -> Result<(), StateError> {
        let account = self.load(address)?;
        account.info.nonce = nonce;
        account.info.code_hash = KECCAK_EMPTY;
        account.info.code = Some(Bytes::new());
        account.storage.clear();
        account.status = AccountStatus::Created;
        Ok(())
    }

    /// Sets the code of the account.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        let account = self.load(address)?;
        account.info.code_hash = code_hash(&code);
        account.info.code = Some(code);
        Ok(())
    }

    /// Records an emitted log.
    pub fn log(&mut self, log: Log) {
        self.logs.push(log);
    }

    /// Saves the current changes.
    pub fn checkpoint(&self) -> JournalCheckpoint {
        JournalCheckpoint {
            changes: self.changes.clone(),
            logs_len: self.logs.len(),
        }
    }

    /// Discards all changes made since the checkpoint.
    pub fn revert(&mut self, checkpoint: JournalCheckpoint) {
        self.changes = checkpoint.changes;
        self.logs.truncate(checkpoint.logs_len);
    }

    /// Consumes the journal, returning the changed accounts and emitted logs.
    pub fn finalize(self) -> (HashMap<Address, Account>, Vec<Log>) {
        (self.changes, self.logs)
    }
}
