//! Block mining on top of a [`MemPool`].
#![warn(missing_docs)]

mod builder;

use core::cmp::Ordering;

use edr_block_header::{BlockConfig, BlockHeader, HeaderOverrides};
use edr_chain_config::Hardfork;
use edr_evm::{config::CfgEnv, Executor, InvalidTransaction, TransactionError};
use edr_mem_pool::{MemPool, OrderedTransaction};
use edr_primitives::{U256, ONE_ETHER};
use edr_state_api::{StateError, StateView};
use edr_transaction::Signed;
use serde::{Deserialize, Serialize};

pub use self::builder::{
    block_env, BlockBuilder, BlockTransactionError, ExecutedTransaction, LocalBlock,
};

/// The type of ordering to use when selecting blocks to mine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MineOrdering {
    /// Insertion order
    Fifo,
    /// Effective miner fee
    #[default]
    Priority,
}

/// The chain-wide inputs of mining a block.
#[derive(Debug)]
pub struct MineBlockInputs<'inputs> {
    /// Runs transaction code
    pub executor: &'inputs dyn Executor,
    /// Execution configuration
    pub cfg: CfgEnv,
    /// Block configuration
    pub block_config: BlockConfig,
    /// The parent block's header, if any
    pub parent: Option<&'inputs BlockHeader>,
    /// Overrides of the mined block's header
    pub overrides: HeaderOverrides,
}

/// An error that occurred while mining a block.
#[derive(Debug, thiserror::Error)]
pub enum MineBlockError {
    /// An error that occurred while executing a transaction.
    #[error(transparent)]
    BlockTransaction(#[from] BlockTransactionError),
    /// An error that occurred while finalizing a block.
    #[error(transparent)]
    BlockFinalize(StateError),
}

/// Mines a block using as many transactions as can fit in it.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn mine_block(
    state: &mut dyn StateView,
    mem_pool: &MemPool,
    inputs: MineBlockInputs<'_>,
    min_gas_price: u128,
    mine_ordering: MineOrdering,
) -> Result<LocalBlock, MineBlockError> {
    let MineBlockInputs {
        executor,
        cfg,
        block_config,
        parent,
        overrides,
    } = inputs;

    let reward = miner_reward(cfg.hardfork);
    let mut block_builder =
        BlockBuilder::new(executor, state, cfg, &block_config, overrides, parent);

    let base_fee = block_builder.header().base_fee;
    let mut pending_transactions = {
        type MineOrderComparator =
            dyn Fn(&OrderedTransaction, &OrderedTransaction) -> Ordering + Send;

        let comparator: Box<MineOrderComparator> = match mine_ordering {
            MineOrdering::Fifo => Box::new(first_in_first_out_comparator),
            MineOrdering::Priority => {
                Box::new(move |lhs, rhs| priority_comparator(lhs, rhs, base_fee))
            }
        };

        mem_pool.iter(comparator)
    };

    while let Some(transaction) = pending_transactions.next() {
        if transaction.gas_price() < min_gas_price {
            pending_transactions.remove_caller(transaction.caller());
            continue;
        }

        let caller = *transaction.caller();
        if let Err(error) = block_builder.add_transaction(transaction) {
            match error {
                BlockTransactionError::ExceedsBlockGasLimit => {
                    pending_transactions.remove_caller(&caller);
                }
                BlockTransactionError::Transaction(TransactionError::InvalidTransaction(
                    InvalidTransaction::GasPriceLessThanBasefee,
                )) => {
                    pending_transactions.remove_caller(&caller);
                }
                BlockTransactionError::Transaction(TransactionError::InvalidTransaction(
                    error,
                )) => {
                    log::warn!("Skipping transaction from {caller}: {error}");
                    pending_transactions.remove_caller(&caller);
                }
                remainder => return Err(MineBlockError::BlockTransaction(remainder)),
            }
        }
    }

    let beneficiary = block_builder.header().beneficiary;
    let rewards = vec![(beneficiary, reward)];

    block_builder
        .finalize(rewards)
        .map_err(MineBlockError::BlockFinalize)
}

/// The block reward paid to the miner in the provided hardfork.
pub fn miner_reward(hardfork: Hardfork) -> U256 {
    let ether = if hardfork.is_post_merge() {
        0
    } else if hardfork >= Hardfork::Constantinople {
        2
    } else if hardfork >= Hardfork::Byzantium {
        3
    } else {
        5
    };

    U256::from(ether) * U256::from(ONE_ETHER)
}

fn effective_miner_fee(transaction: &Signed, base_fee: Option<u128>) -> u128 {
    transaction.fee().effective_miner_fee(base_fee)
}

fn first_in_first_out_comparator(lhs: &OrderedTransaction, rhs: &OrderedTransaction) -> Ordering {
    lhs.order_id().cmp(&rhs.order_id())
}

fn priority_comparator(
    lhs: &OrderedTransaction,
    rhs: &OrderedTransaction,
    base_fee: Option<u128>,
) -> Ordering {
    let effective_miner_fee = move |transaction: &Signed| effective_miner_fee(transaction, base_fee);

    // Invert lhs and rhs to get decreasing order by effective miner fee
    let ordering = effective_miner_fee(rhs.pending()).cmp(&effective_miner_fee(lhs.pending()));

    // If two txs have the same effective miner fee we want to sort them
    // in increasing order by orderId
    if ordering == Ordering::Equal {
        lhs.order_id().cmp(&rhs.order_id())
    } else {
        ordering
    }
}
