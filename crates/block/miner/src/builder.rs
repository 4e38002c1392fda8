use alloy_rlp::{BufMut as _, Encodable as _, RlpEncodable};
use edr_block_header::{BlockConfig, BlockHeader, HeaderOverrides, PartialHeader};
use edr_chain_config::Hardfork;
use edr_evm::{
    config::{BlockEnv, CfgEnv},
    result::ExecutionResult,
    Executor, TransactionError,
};
use edr_primitives::{trie::ordered_trie_root, Address, Bloom, Log, B256, U256};
use edr_state_api::{CheckpointGuard, StateError, StateView};
use edr_transaction::{Signed, TransactionType};

/// An error that occurs while adding a transaction to a block.
#[derive(Debug, thiserror::Error)]
pub enum BlockTransactionError {
    /// The transaction's gas limit exceeds the block's remaining gas.
    #[error("Transaction has a higher gas limit than the remaining gas in the block")]
    ExceedsBlockGasLimit,
    /// The transaction could not be executed.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    /// Checkpointing the state failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// A transaction that was included in a block, with its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedTransaction {
    /// The transaction
    pub transaction: Signed,
    /// The result of executing the transaction
    pub result: ExecutionResult,
    /// Gas used by the block up to and including this transaction
    pub cumulative_gas_used: u64,
    /// The price per unit of gas paid by the sender
    pub effective_gas_price: u128,
    /// Bloom filter of the transaction's logs
    pub logs_bloom: Bloom,
}

impl ExecutedTransaction {
    /// Whether the transaction executed successfully.
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// The address of the contract created by the transaction, if any.
    pub fn contract_address(&self) -> Option<Address> {
        match &self.result {
            ExecutionResult::Success { output, .. } => output.address().copied(),
            ExecutionResult::Revert { .. } | ExecutionResult::Halt { .. } => None,
        }
    }

    fn encode_receipt(&self) -> Vec<u8> {
        #[derive(RlpEncodable)]
        struct ReceiptFields {
            status: bool,
            cumulative_gas_used: u64,
            logs_bloom: Bloom,
            logs: Vec<Log>,
        }

        let fields = ReceiptFields {
            status: self.is_success(),
            cumulative_gas_used: self.cumulative_gas_used,
            logs_bloom: self.logs_bloom,
            logs: self.result.logs().to_vec(),
        };

        let mut encoded = Vec::new();
        let transaction_type = self.transaction.transaction_type();
        if transaction_type != TransactionType::Legacy {
            encoded.put_u8(transaction_type.into());
        }
        fields.encode(&mut encoded);

        encoded
    }
}

/// A block mined on top of the local chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalBlock {
    /// The block's header
    pub header: BlockHeader,
    /// The block's hash
    pub hash: B256,
    /// The block's transactions, in execution order
    pub transactions: Vec<ExecutedTransaction>,
}

impl LocalBlock {
    /// Retrieves the transaction with the provided hash, and its index in the
    /// block.
    pub fn transaction_by_hash(&self, hash: &B256) -> Option<(usize, &ExecutedTransaction)> {
        self.transactions
            .iter()
            .enumerate()
            .find(|(_, executed)| executed.transaction.hash() == hash)
    }
}

/// Constructs the execution context of a block from its header.
pub fn block_env(header: &PartialHeader, hardfork: Hardfork) -> BlockEnv {
    BlockEnv {
        number: header.number,
        beneficiary: header.beneficiary,
        timestamp: header.timestamp,
        gas_limit: header.gas_limit,
        base_fee: header.base_fee,
        difficulty: header.difficulty,
        prevrandao: (hardfork >= Hardfork::Merge).then_some(header.mix_hash),
    }
}

/// Builds a block by executing transactions one at a time on top of a state.
#[derive(Debug)]
pub struct BlockBuilder<'builder> {
    executor: &'builder dyn Executor,
    state: &'builder mut dyn StateView,
    cfg: CfgEnv,
    header: PartialHeader,
    transactions: Vec<ExecutedTransaction>,
}

impl<'builder> BlockBuilder<'builder> {
    /// Creates a builder for a child of the provided parent.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn new(
        executor: &'builder dyn Executor,
        state: &'builder mut dyn StateView,
        cfg: CfgEnv,
        block_config: &BlockConfig,
        overrides: HeaderOverrides,
        parent: Option<&BlockHeader>,
    ) -> Self {
        let header = PartialHeader::new(block_config, overrides, parent);

        Self {
            executor,
            state,
            cfg,
            header,
            transactions: Vec::new(),
        }
    }

    /// The header of the block under construction.
    pub fn header(&self) -> &PartialHeader {
        &self.header
    }

    /// The gas that remains available in the block.
    pub fn gas_remaining(&self) -> u64 {
        self.header.gas_limit - self.header.gas_used
    }

    /// The transactions added so far.
    pub fn transactions(&self) -> &[ExecutedTransaction] {
        &self.transactions
    }

    /// Executes the transaction and adds it to the block.
    ///
    /// Transactions that revert or halt are included. Transactions that cannot
    /// be executed leave the state untouched and return an error.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn add_transaction(&mut self, transaction: Signed) -> Result<(), BlockTransactionError> {
        if transaction.gas_limit() > self.gas_remaining() {
            return Err(BlockTransactionError::ExceedsBlockGasLimit);
        }

        let block = block_env(&self.header, self.cfg.hardfork);

        let mut state = CheckpointGuard::new(&mut *self.state)?;
        let result = edr_evm::run(self.executor, &mut *state, &self.cfg, &block, &transaction)?;
        state.commit()?;

        self.header.gas_used += result.gas_used();

        let mut logs_bloom = Bloom::default();
        for log in result.logs() {
            logs_bloom.accrue_log(log);
        }
        self.header.logs_bloom.accrue_bloom(&logs_bloom);

        let effective_gas_price = transaction
            .fee()
            .effective_gas_price(block.base_fee)
            .unwrap_or_else(|| transaction.gas_price());

        self.transactions.push(ExecutedTransaction {
            transaction,
            result,
            cumulative_gas_used: self.header.gas_used,
            effective_gas_price,
            logs_bloom,
        });

        Ok(())
    }

    /// Pays the rewards and seals the block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn finalize(self, rewards: Vec<(Address, U256)>) -> Result<LocalBlock, StateError> {
        let Self {
            state,
            mut header,
            transactions,
            ..
        } = self;

        for (address, reward) in rewards {
            if reward > U256::ZERO {
                let mut account = state.account(address)?;
                account.balance += reward;
                // Leave the code as-is
                account.code = None;

                state.put_account(address, account)?;
            }
        }

        header.state_root = state.state_root()?;
        header.receipts_root = ordered_trie_root(
            transactions
                .iter()
                .map(ExecutedTransaction::encode_receipt),
        );

        let transactions_root = ordered_trie_root(
            transactions
                .iter()
                .map(|executed| executed.transaction.rlp_encoding()),
        );

        let header = BlockHeader::new(header, transactions_root);
        let hash = header.hash();

        Ok(LocalBlock {
            header,
            hash,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use edr_eip1559::BaseFeeParams;
    use edr_evm::{InvalidTransaction, TransferExecutor};
    use edr_primitives::ONE_ETHER;
    use edr_state_api::account::AccountInfo;
    use edr_state_local::LocalState;
    use edr_transaction::test_utils::{
        dummy_eip155_transaction_with_price, dummy_eip155_transaction_with_price_and_limit,
        DUMMY_CHAIN_ID,
    };

    use super::*;

    fn builder<'builder>(state: &'builder mut dyn StateView) -> BlockBuilder<'builder> {
        BlockBuilder::new(
            &TransferExecutor,
            state,
            CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun),
            &BlockConfig {
                base_fee_params: BaseFeeParams::ethereum(),
                hardfork: Hardfork::Cancun,
            },
            HeaderOverrides {
                gas_limit: Some(60_000),
                timestamp: Some(1),
                ..HeaderOverrides::default()
            },
            None,
        )
    }

    #[test]
    fn added_transactions_accumulate_gas() -> anyhow::Result<()> {
        let sender = Address::random();
        let mut state = LocalState::with_accounts(
            [(
                sender,
                AccountInfo {
                    balance: U256::from(ONE_ETHER),
                    ..AccountInfo::default()
                },
            )]
            .into_iter()
            .collect(),
        )?;

        let mut builder = builder(&mut state);
        builder.add_transaction(dummy_eip155_transaction_with_price(
            sender,
            0,
            2_000_000_000,
        ))?;

        assert_eq!(builder.transactions().len(), 1);
        assert_eq!(builder.transactions()[0].cumulative_gas_used, 21_000);
        assert_eq!(builder.gas_remaining(), 39_000);

        // Does not fit in the remaining gas
        let error = builder
            .add_transaction(dummy_eip155_transaction_with_price_and_limit(
                sender,
                1,
                2_000_000_000,
                40_000,
            ))
            .expect_err("exceeds block gas limit");
        assert!(matches!(error, BlockTransactionError::ExceedsBlockGasLimit));

        // Rejected transactions are not recorded
        let error = builder
            .add_transaction(dummy_eip155_transaction_with_price(sender, 0, 2_000_000_000))
            .expect_err("nonce already used");
        assert!(matches!(
            error,
            BlockTransactionError::Transaction(TransactionError::InvalidTransaction(
                InvalidTransaction::NonceTooLow { .. }
            ))
        ));
        assert_eq!(builder.transactions().len(), 1);

        Ok(())
    }
}
