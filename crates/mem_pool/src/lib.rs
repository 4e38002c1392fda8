#![warn(missing_docs)]

//! Pool of transactions waiting to be mined, split per sender into pending
//! transactions (contiguous nonces, executable now) and future transactions
//! (waiting for a nonce gap to be filled).

/// Test fixtures for the mem pool.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use core::{cmp::Ordering, fmt::Debug, num::NonZeroU64};

use edr_primitives::{Address, B256, HashMap, U256};
use edr_state_api::{State, account::AccountInfo};
use edr_transaction::Signed;
use indexmap::{IndexMap, map::Entry};

/// An iterator over pending transactions, which yields the transactions of
/// each sender in nonce order.
pub struct PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    comparator: ComparatorT,
}

impl<ComparatorT> PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    /// Removes all pending transactions of the account corresponding to the
    /// provided address.
    pub fn remove_caller(&mut self, caller: &Address) -> Option<Vec<OrderedTransaction>> {
        self.transactions.shift_remove(caller)
    }
}

impl<ComparatorT> Debug for PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransactions")
            .field("transactions", &self.transactions)
            .finish()
    }
}

impl<ComparatorT> Iterator for PendingTransactions<ComparatorT>
where
    ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
{
    type Item = Signed;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn next(&mut self) -> Option<Self::Item> {
        let caller = self
            .transactions
            .iter()
            .filter_map(|(caller, transactions)| {
                transactions.first().map(|first| (caller, first))
            })
            .min_by(|(_, lhs), (_, rhs)| (self.comparator)(lhs, rhs))
            .map(|(caller, _)| *caller)?;

        let transactions = self.transactions.get_mut(&caller)?;
        let transaction = transactions.remove(0).transaction;

        if transactions.is_empty() {
            self.transactions.shift_remove(&caller);
        }

        Some(transaction)
    }
}

/// An error that can occur when adding a transaction to the mempool.
#[derive(Debug, thiserror::Error)]
pub enum MemPoolAddTransactionError<SE> {
    /// Transaction gas limit exceeds block gas limit.
    #[error(
        "Transaction gas limit is {transaction_gas_limit} and exceeds block gas limit of {block_gas_limit}"
    )]
    ExceedsBlockGasLimit {
        /// The block gas limit
        block_gas_limit: NonZeroU64,
        /// The transaction gas limit
        transaction_gas_limit: u64,
    },
    /// Sender does not have enough funds to send transaction.
    #[error(
        "Sender doesn't have enough funds to send tx. The max upfront cost is: {max_upfront_cost} and the sender's balance is: {sender_balance}."
    )]
    InsufficientFunds {
        /// The maximum upfront cost of the transaction
        max_upfront_cost: U256,
        /// The sender's balance
        sender_balance: U256,
    },
    /// Transaction nonce is too low.
    #[error(
        "Nonce too low. Expected nonce to be at least {sender_nonce} but got {transaction_nonce}."
    )]
    NonceTooLow {
        /// Transaction's nonce.
        transaction_nonce: u64,
        /// Sender's nonce.
        sender_nonce: u64,
    },
    /// Transaction already exists in the mempool.
    #[error("Known transaction: 0x{transaction_hash:x}")]
    TransactionAlreadyExists {
        /// The transaction hash
        transaction_hash: B256,
    },
    /// State error
    #[error(transparent)]
    State(#[from] SE),
    /// Replacement transaction has underpriced max fee per gas.
    #[error(
        "Replacement transaction underpriced. A gasPrice/maxFeePerGas of at least {min_new_max_fee_per_gas} is necessary to replace the existing transaction with nonce {transaction_nonce}."
    )]
    ReplacementMaxFeePerGasTooLow {
        /// The minimum new max fee per gas
        min_new_max_fee_per_gas: u128,
        /// The transaction nonce
        transaction_nonce: u64,
    },
    /// Replacement transaction has underpriced max priority fee per gas.
    #[error(
        "Replacement transaction underpriced. A gasPrice/maxPriorityFeePerGas of at least {min_new_max_priority_fee_per_gas} is necessary to replace the existing transaction with nonce {transaction_nonce}."
    )]
    ReplacementMaxPriorityFeePerGasTooLow {
        /// The minimum new max priority fee per gas
        min_new_max_priority_fee_per_gas: u128,
        /// The transaction nonce
        transaction_nonce: u64,
    },
}

/// A transaction in the mem pool with its order of arrival.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderedTransaction {
    order_id: usize,
    transaction: Signed,
}

impl OrderedTransaction {
    /// Retrieves the order ID of the transaction.
    pub fn order_id(&self) -> usize {
        self.order_id
    }

    /// Retrieves the transaction.
    pub fn pending(&self) -> &Signed {
        &self.transaction
    }

    fn caller(&self) -> &Address {
        self.transaction.caller()
    }

    fn hash(&self) -> &B256 {
        self.transaction.hash()
    }

    fn nonce(&self) -> u64 {
        self.transaction.nonce()
    }
}

/// The mempool contains transactions pending inclusion in the blockchain.
#[derive(Clone, Debug)]
pub struct MemPool {
    /// The block's gas limit
    block_gas_limit: NonZeroU64,
    /// Transactions that can be executed now
    pending_transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    /// Mapping of transaction hashes to transaction
    hash_to_transaction: HashMap<B256, OrderedTransaction>,
    /// Transactions that can be executed in the future, once the nonce is high
    /// enough
    future_transactions: IndexMap<Address, Vec<OrderedTransaction>>,
    next_order_id: usize,
}

impl MemPool {
    /// Constructs a new [`MemPool`] with the specified block gas limit.
    pub fn new(block_gas_limit: NonZeroU64) -> Self {
        Self {
            block_gas_limit,
            pending_transactions: IndexMap::new(),
            hash_to_transaction: HashMap::default(),
            future_transactions: IndexMap::new(),
            next_order_id: 0,
        }
    }

    /// Retrieves the instance's block gas limit.
    pub fn block_gas_limit(&self) -> NonZeroU64 {
        self.block_gas_limit
    }

    /// Sets the instance's block gas limit, evicting transactions that no
    /// longer fit.
    pub fn set_block_gas_limit<S>(&mut self, state: &S, limit: NonZeroU64) -> Result<(), S::Error>
    where
        S: State + ?Sized,
    {
        self.block_gas_limit = limit;

        self.update(state)
    }

    /// Retrieves the nonce of the last pending transaction of the account
    /// corresponding to the specified address, if it exists.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn last_pending_nonce(&self, address: &Address) -> Option<u64> {
        self.pending_transactions
            .get(address)
            .and_then(|transactions| transactions.last())
            .map(OrderedTransaction::nonce)
    }

    /// Retrieves an iterator for all future transactions.
    pub fn future_transactions(&self) -> impl Iterator<Item = &OrderedTransaction> {
        self.future_transactions.values().flatten()
    }

    /// Retrieves an iterator for all pending transactions.
    pub fn pending_transactions(&self) -> impl Iterator<Item = &OrderedTransaction> {
        self.pending_transactions.values().flatten()
    }

    /// Retrieves an iterator for all transactions in the instance. Pending
    /// transactions are followed by future transactions, grouped by sender
    /// in order of insertion.
    pub fn transactions(&self) -> impl Iterator<Item = &Signed> {
        self.pending_transactions
            .values()
            .chain(self.future_transactions.values())
            .flatten()
            .map(OrderedTransaction::pending)
    }

    /// Whether the instance has any future transactions; i.e. for which the
    /// nonces are not high enough.
    pub fn has_future_transactions(&self) -> bool {
        !self.future_transactions.is_empty()
    }

    /// Whether the instance has any pending transactions; i.e. for which the
    /// nonces are guaranteed to be high enough.
    pub fn has_pending_transactions(&self) -> bool {
        !self.pending_transactions.is_empty()
    }

    /// Whether the instance has any transactions.
    pub fn has_transactions(&self) -> bool {
        self.has_future_transactions() || self.has_pending_transactions()
    }

    /// Returns the transaction corresponding to the provided hash, if it
    /// exists.
    pub fn transaction_by_hash(&self, hash: &B256) -> Option<&OrderedTransaction> {
        self.hash_to_transaction.get(hash)
    }

    /// Removes the transaction corresponding to the provided transaction hash,
    /// if it exists. Pending transactions of the same sender with a higher
    /// nonce become future transactions.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn remove_transaction(&mut self, hash: &B256) -> Option<OrderedTransaction> {
        let old_transaction = self.hash_to_transaction.remove(hash)?;
        let caller = old_transaction.caller();

        if let Some(pending_transactions) = self.pending_transactions.get_mut(caller) {
            if let Some(idx) = pending_transactions
                .iter()
                .position(|transaction| transaction.hash() == hash)
            {
                let mut invalidated_transactions = pending_transactions.split_off(idx + 1);
                let removed = pending_transactions.remove(idx);

                if pending_transactions.is_empty() {
                    self.pending_transactions.shift_remove(caller);
                }

                if !invalidated_transactions.is_empty() {
                    let future_transactions = self.future_transactions.entry(*caller).or_default();
                    future_transactions.append(&mut invalidated_transactions);
                    future_transactions.sort_by_key(OrderedTransaction::nonce);
                }

                return Some(removed);
            }
        }

        if let Some(future_transactions) = self.future_transactions.get_mut(caller) {
            if let Some(idx) = future_transactions
                .iter()
                .position(|transaction| transaction.hash() == hash)
            {
                let removed = future_transactions.remove(idx);

                if future_transactions.is_empty() {
                    self.future_transactions.shift_remove(caller);
                }

                return Some(removed);
            }
        }

        None
    }

    /// Updates the [`MemPool`] after the state changed: evicts transactions
    /// that became invalid (e.g. mined) and moves pending transactions whose
    /// nonces are no longer contiguous to the future queue.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn update<S>(&mut self, state: &S) -> Result<(), S::Error>
    where
        S: State + ?Sized,
    {
        fn is_valid_tx(transaction: &Signed, block_gas_limit: NonZeroU64, sender: &AccountInfo) -> bool {
            transaction.gas_limit() <= block_gas_limit.get()
                && transaction.upfront_cost() <= sender.balance
                // Remove all mined transactions
                && transaction.nonce() >= sender.nonce
        }

        for (caller, transactions) in self.pending_transactions.iter_mut() {
            let sender = state.basic(*caller)?.unwrap_or_default();

            transactions.retain(|transaction| {
                let should_retain =
                    is_valid_tx(transaction.pending(), self.block_gas_limit, &sender);

                if !should_retain {
                    self.hash_to_transaction.remove(transaction.hash());
                }

                should_retain
            });

            // Pending transactions must have consecutive nonces, starting from the
            // sender's nonce
            if let Some(idx) = transactions
                .iter()
                .zip(sender.nonce..)
                .position(|(transaction, expected_nonce)| transaction.nonce() != expected_nonce)
            {
                let mut invalidated_transactions = transactions.split_off(idx);

                let future_transactions = self.future_transactions.entry(*caller).or_default();
                future_transactions.append(&mut invalidated_transactions);
                future_transactions.sort_by_key(OrderedTransaction::nonce);
            }
        }

        self.pending_transactions
            .retain(|_, transactions| !transactions.is_empty());

        for (caller, transactions) in self.future_transactions.iter_mut() {
            let sender = state.basic(*caller)?.unwrap_or_default();

            transactions.retain(|transaction| {
                let should_retain =
                    is_valid_tx(transaction.pending(), self.block_gas_limit, &sender);

                if !should_retain {
                    self.hash_to_transaction.remove(transaction.hash());
                }

                should_retain
            });
        }

        self.future_transactions
            .retain(|_, transactions| !transactions.is_empty());

        // Future transactions whose nonce gap was filled by mined transactions
        let promotable = self
            .future_transactions
            .keys()
            .copied()
            .collect::<Vec<_>>();

        for caller in promotable {
            let next_nonce = account_next_nonce(self, state, &caller)?;
            self.promote_future_transactions(caller, next_nonce);
        }

        Ok(())
    }

    /// Tries to add the provided transaction to the [`MemPool`].
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn add_transaction<S: State + ?Sized>(
        &mut self,
        state: &S,
        transaction: Signed,
    ) -> Result<(), MemPoolAddTransactionError<S::Error>> {
        let transaction_gas_limit = transaction.gas_limit();
        if transaction_gas_limit > self.block_gas_limit.get() {
            return Err(MemPoolAddTransactionError::ExceedsBlockGasLimit {
                block_gas_limit: self.block_gas_limit,
                transaction_gas_limit,
            });
        }

        if self.hash_to_transaction.contains_key(transaction.hash()) {
            return Err(MemPoolAddTransactionError::TransactionAlreadyExists {
                transaction_hash: *transaction.hash(),
            });
        }

        let sender = state.basic(*transaction.caller())?.unwrap_or_default();
        if transaction.nonce() < sender.nonce {
            return Err(MemPoolAddTransactionError::NonceTooLow {
                transaction_nonce: transaction.nonce(),
                sender_nonce: sender.nonce,
            });
        }

        // Funds are validated on admission to avoid DOS
        let max_upfront_cost = transaction.upfront_cost();
        if max_upfront_cost > sender.balance {
            return Err(MemPoolAddTransactionError::InsufficientFunds {
                max_upfront_cost,
                sender_balance: sender.balance,
            });
        }

        let next_nonce = account_next_nonce(self, state, transaction.caller())?;
        let transaction = OrderedTransaction {
            order_id: self.next_order_id,
            transaction,
        };

        if transaction.nonce() > next_nonce {
            self.insert_future_transaction(transaction.clone())?;
        } else {
            self.insert_pending_transaction(transaction.clone())?;
        }

        self.next_order_id += 1;

        self.hash_to_transaction
            .insert(*transaction.hash(), transaction);

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn insert_pending_transaction<StateError>(
        &mut self,
        transaction: OrderedTransaction,
    ) -> Result<(), MemPoolAddTransactionError<StateError>> {
        let mut pending_transactions = self.pending_transactions.entry(*transaction.caller());

        // Check whether an existing transaction can be replaced
        if let Entry::Occupied(ref mut pending_transactions) = pending_transactions {
            let replaced_transaction = pending_transactions
                .get_mut()
                .iter_mut()
                .find(|pending_transaction| transaction.nonce() == pending_transaction.nonce());

            if let Some(replaced_transaction) = replaced_transaction {
                validate_replacement_transaction(
                    &replaced_transaction.transaction,
                    &transaction.transaction,
                )?;

                self.hash_to_transaction.remove(replaced_transaction.hash());

                *replaced_transaction = transaction;

                return Ok(());
            }
        }

        let caller = *transaction.caller();
        let next_pending_nonce = transaction.nonce() + 1;

        pending_transactions.or_default().push(transaction);
        self.promote_future_transactions(caller, next_pending_nonce);

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn insert_future_transaction<StateError>(
        &mut self,
        transaction: OrderedTransaction,
    ) -> Result<(), MemPoolAddTransactionError<StateError>> {
        let future_transactions = self
            .future_transactions
            .entry(*transaction.caller())
            .or_default();

        // Check whether an existing transaction can be replaced
        if let Some(replaced_transaction) = future_transactions
            .iter_mut()
            .find(|future_transaction| transaction.nonce() == future_transaction.nonce())
        {
            validate_replacement_transaction(
                &replaced_transaction.transaction,
                &transaction.transaction,
            )?;

            self.hash_to_transaction.remove(replaced_transaction.hash());

            *replaced_transaction = transaction;

            return Ok(());
        }

        let idx = future_transactions
            .partition_point(|future_transaction| future_transaction.nonce() < transaction.nonce());
        future_transactions.insert(idx, transaction);

        Ok(())
    }

    /// Moves as many future transactions as possible to the pending status,
    /// starting at the provided nonce.
    fn promote_future_transactions(&mut self, caller: Address, mut next_pending_nonce: u64) {
        let Some(future_transactions) = self.future_transactions.get_mut(&caller) else {
            return;
        };

        let mut promoted = Vec::new();
        while let Some(idx) = future_transactions
            .iter()
            .position(|transaction| transaction.nonce() == next_pending_nonce)
        {
            promoted.push(future_transactions.remove(idx));
            next_pending_nonce += 1;
        }

        if future_transactions.is_empty() {
            self.future_transactions.shift_remove(&caller);
        }

        if !promoted.is_empty() {
            self.pending_transactions
                .entry(caller)
                .or_default()
                .append(&mut promoted);
        }
    }

    /// Creates an iterator for all pending transactions; i.e. for which the
    /// nonces are guaranteed to be high enough.
    pub fn iter<ComparatorT>(&self, comparator: ComparatorT) -> PendingTransactions<ComparatorT>
    where
        ComparatorT: Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering,
    {
        PendingTransactions {
            transactions: self.pending_transactions.clone(),
            comparator,
        }
    }
}

/// Calculates the next nonce of the account corresponding to the provided
/// address.
pub fn account_next_nonce<StateT: State + ?Sized>(
    mem_pool: &MemPool,
    state: &StateT,
    address: &Address,
) -> Result<u64, StateT::Error> {
    mem_pool.last_pending_nonce(address).map_or_else(
        || {
            state
                .basic(*address)
                .map(|account| account.map_or(0, |account| account.nonce))
        },
        |nonce| Ok(nonce + 1),
    )
}

fn validate_replacement_transaction<StateError>(
    old_transaction: &Signed,
    new_transaction: &Signed,
) -> Result<(), MemPoolAddTransactionError<StateError>> {
    let old_fee = old_transaction.fee();
    let new_fee = new_transaction.fee();

    let min_new_max_fee_per_gas = min_new_fee(old_fee.max_fee_per_gas());
    if new_fee.max_fee_per_gas() < min_new_max_fee_per_gas {
        return Err(MemPoolAddTransactionError::ReplacementMaxFeePerGasTooLow {
            min_new_max_fee_per_gas,
            transaction_nonce: old_transaction.nonce(),
        });
    }

    let min_new_max_priority_fee_per_gas = min_new_fee(old_fee.max_priority_fee_per_gas());
    if new_fee.max_priority_fee_per_gas() < min_new_max_priority_fee_per_gas {
        return Err(
            MemPoolAddTransactionError::ReplacementMaxPriorityFeePerGasTooLow {
                min_new_max_priority_fee_per_gas,
                transaction_nonce: old_transaction.nonce(),
            },
        );
    }

    Ok(())
}

/// The minimum fee of a replacement transaction: a 10% bump, rounded up.
fn min_new_fee(fee: u128) -> u128 {
    fee.saturating_mul(110).div_ceil(100)
}

#[cfg(test)]
mod tests {
    use edr_transaction::test_utils::{
        dummy_eip155_transaction, dummy_eip155_transaction_with_limit,
        dummy_eip155_transaction_with_price, dummy_eip155_transaction_with_price_limit_and_value,
        dummy_eip1559_transaction,
    };

    use super::*;
    use crate::test_utils::MemPoolTestFixture;

    fn funded_account() -> AccountInfo {
        AccountInfo {
            balance: U256::from(100_000_000u64),
            ..AccountInfo::default()
        }
    }

    fn pending_nonces(fixture: &MemPoolTestFixture, caller: &Address) -> Vec<u64> {
        fixture
            .mem_pool
            .pending_transactions()
            .filter(|transaction| transaction.caller() == caller)
            .map(OrderedTransaction::nonce)
            .collect()
    }

    fn future_nonces(fixture: &MemPoolTestFixture, caller: &Address) -> Vec<u64> {
        fixture
            .mem_pool
            .future_transactions()
            .filter(|transaction| transaction.caller() == caller)
            .map(OrderedTransaction::nonce)
            .collect()
    }

    #[test]
    fn add_pending_transaction() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        let transaction = dummy_eip155_transaction(caller, 0);
        fixture.add_transaction(transaction.clone())?;

        assert!(fixture.mem_pool.has_pending_transactions());
        assert!(!fixture.mem_pool.has_future_transactions());
        assert_eq!(
            fixture
                .mem_pool
                .transaction_by_hash(transaction.hash())
                .map(OrderedTransaction::pending),
            Some(&transaction)
        );

        Ok(())
    }

    #[test]
    fn nonce_gap_is_queued_and_promoted() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        fixture.add_transaction(dummy_eip155_transaction(caller, 2))?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 1))?;
        assert!(pending_nonces(&fixture, &caller).is_empty());
        assert_eq!(future_nonces(&fixture, &caller), vec![1, 2]);

        fixture.add_transaction(dummy_eip155_transaction(caller, 0))?;
        assert_eq!(pending_nonces(&fixture, &caller), vec![0, 1, 2]);
        assert!(!fixture.mem_pool.has_future_transactions());

        Ok(())
    }

    #[test]
    fn nonce_too_low() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(
            caller,
            AccountInfo {
                nonce: 3,
                ..funded_account()
            },
        )])?;

        let error = fixture
            .add_transaction(dummy_eip155_transaction(caller, 2))
            .unwrap_err();
        assert!(matches!(
            error,
            MemPoolAddTransactionError::NonceTooLow {
                transaction_nonce: 2,
                sender_nonce: 3
            }
        ));

        Ok(())
    }

    #[test]
    fn exceeds_block_gas_limit() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        let error = fixture
            .add_transaction(dummy_eip155_transaction_with_limit(caller, 0, 10_000_001))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Transaction gas limit is 10000001 and exceeds block gas limit of 10000000"
        );

        Ok(())
    }

    #[test]
    fn insufficient_funds() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(
            caller,
            AccountInfo {
                balance: U256::from(21_000u64),
                ..AccountInfo::default()
            },
        )])?;

        let transaction =
            dummy_eip155_transaction_with_price_limit_and_value(caller, 0, 1, 21_000, U256::from(1));
        let error = fixture.add_transaction(transaction).unwrap_err();
        assert!(error.to_string().contains("doesn't have enough funds"));
        assert!(!fixture.mem_pool.has_transactions());

        Ok(())
    }

    #[test]
    fn known_transaction() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        let transaction = dummy_eip155_transaction(caller, 0);
        fixture.add_transaction(transaction.clone())?;

        let error = fixture.add_transaction(transaction).unwrap_err();
        assert!(error.to_string().starts_with("Known transaction: 0x"));

        Ok(())
    }

    macro_rules! impl_replacement_tests {
        ($($name:ident => ($queued_nonce:expr, $existing:expr, $underpriced:expr, $replacement:expr),)+) => {
            $(
                paste::item! {
                    #[test]
                    fn [<replacement_underpriced_ $name>]() -> anyhow::Result<()> {
                        let caller = Address::random();
                        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

                        let existing = ($existing)(caller, $queued_nonce);
                        fixture.add_transaction(existing.clone())?;

                        let error = fixture
                            .add_transaction(($underpriced)(caller, $queued_nonce))
                            .unwrap_err();
                        assert!(error.to_string().starts_with("Replacement transaction underpriced."));

                        assert!(fixture.mem_pool.transaction_by_hash(existing.hash()).is_some());

                        Ok(())
                    }

                    #[test]
                    fn [<replacement_accepted_ $name>]() -> anyhow::Result<()> {
                        let caller = Address::random();
                        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

                        let existing = ($existing)(caller, $queued_nonce);
                        fixture.add_transaction(existing.clone())?;

                        let replacement = ($replacement)(caller, $queued_nonce);
                        fixture.add_transaction(replacement.clone())?;

                        assert!(fixture.mem_pool.transaction_by_hash(existing.hash()).is_none());
                        assert!(fixture.mem_pool.transaction_by_hash(replacement.hash()).is_some());
                        assert_eq!(fixture.mem_pool.transactions().count(), 1);

                        Ok(())
                    }
                }
            )+
        };
    }

    impl_replacement_tests! {
        pending_legacy => (
            0,
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 100),
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 109),
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 110)
        ),
        future_legacy => (
            5,
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 100),
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 109),
            |caller, nonce| dummy_eip155_transaction_with_price(caller, nonce, 110)
        ),
        pending_eip1559 => (
            0,
            |caller, nonce| dummy_eip1559_transaction(caller, nonce, 100, 10),
            |caller, nonce| dummy_eip1559_transaction(caller, nonce, 200, 10),
            |caller, nonce| dummy_eip1559_transaction(caller, nonce, 110, 11)
        ),
    }

    #[test]
    fn min_new_fee_rounds_up() {
        assert_eq!(min_new_fee(100), 110);
        assert_eq!(min_new_fee(101), 112);
        assert_eq!(min_new_fee(0), 0);
    }

    #[test]
    fn remove_pending_transaction_queues_successors() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        let first = dummy_eip155_transaction(caller, 0);
        fixture.add_transaction(first.clone())?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 1))?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 2))?;

        let removed = fixture.mem_pool.remove_transaction(first.hash());
        assert_eq!(removed.map(|removed| removed.transaction), Some(first.clone()));
        assert!(pending_nonces(&fixture, &caller).is_empty());
        assert_eq!(future_nonces(&fixture, &caller), vec![1, 2]);

        assert!(fixture.mem_pool.remove_transaction(first.hash()).is_none());

        Ok(())
    }

    #[test]
    fn update_removes_mined_and_promotes() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        let mined = dummy_eip155_transaction(caller, 0);
        fixture.add_transaction(mined.clone())?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 2))?;

        fixture.set_account(
            caller,
            AccountInfo {
                nonce: 2,
                ..funded_account()
            },
        )?;
        fixture.update()?;

        assert!(fixture.mem_pool.transaction_by_hash(mined.hash()).is_none());
        assert_eq!(pending_nonces(&fixture, &caller), vec![2]);
        assert!(!fixture.mem_pool.has_future_transactions());

        Ok(())
    }

    #[test]
    fn update_moves_non_contiguous_pending_to_future() -> anyhow::Result<()> {
        let caller = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[(caller, funded_account())])?;

        fixture.add_transaction(dummy_eip155_transaction(caller, 0))?;
        fixture.add_transaction(dummy_eip155_transaction_with_limit(caller, 1, 5_000_000))?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 2))?;

        fixture.set_block_gas_limit(NonZeroU64::new(1_000_000).expect("non-zero"))?;

        assert_eq!(pending_nonces(&fixture, &caller), vec![0]);
        assert_eq!(future_nonces(&fixture, &caller), vec![2]);

        Ok(())
    }

    #[test]
    fn iterator_keeps_sender_nonce_order() -> anyhow::Result<()> {
        let caller = Address::random();
        let other = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (caller, funded_account()),
            (other, funded_account()),
        ])?;

        let first = dummy_eip155_transaction_with_price(caller, 0, 1);
        let second = dummy_eip155_transaction_with_price(caller, 1, 1_000);
        let third = dummy_eip155_transaction_with_price(other, 0, 500);
        fixture.add_transaction(first.clone())?;
        fixture.add_transaction(second.clone())?;
        fixture.add_transaction(third.clone())?;

        // Highest gas price first, but never ahead of a lower nonce of the same sender
        let mut ordered = fixture.mem_pool.iter(|lhs, rhs| {
            rhs.pending()
                .gas_price()
                .cmp(&lhs.pending().gas_price())
                .then_with(|| lhs.order_id().cmp(&rhs.order_id()))
        });

        assert_eq!(ordered.next(), Some(third));
        assert_eq!(ordered.next(), Some(first));
        assert_eq!(ordered.next(), Some(second));
        assert_eq!(ordered.next(), None);

        Ok(())
    }

    #[test]
    fn iterator_remove_caller() -> anyhow::Result<()> {
        let caller = Address::random();
        let other = Address::random();
        let mut fixture = MemPoolTestFixture::with_accounts(&[
            (caller, funded_account()),
            (other, funded_account()),
        ])?;

        fixture.add_transaction(dummy_eip155_transaction(caller, 0))?;
        fixture.add_transaction(dummy_eip155_transaction(caller, 1))?;
        let other_transaction = dummy_eip155_transaction(other, 0);
        fixture.add_transaction(other_transaction.clone())?;

        let mut ordered = fixture
            .mem_pool
            .iter(|lhs, rhs| lhs.order_id().cmp(&rhs.order_id()));

        let removed = ordered.remove_caller(&caller).map(|removed| removed.len());
        assert_eq!(removed, Some(2));
        assert_eq!(ordered.next(), Some(other_transaction));
        assert_eq!(ordered.next(), None);

        // The mem pool itself is unaffected
        assert_eq!(fixture.mem_pool.transactions().count(), 3);

        Ok(())
    }
}
