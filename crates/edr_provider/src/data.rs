mod account;
mod call;
mod gas;

use core::cmp::{self, Ordering};
use std::{
    collections::BTreeMap,
    num::NonZeroU64,
    sync::Arc,
    time::{Instant, SystemTime, UNIX_EPOCH},
};

use edr_block_header::{
    calculate_next_base_fee_per_gas, BlockConfig, BlockHeader, HeaderOverrides, PartialHeader,
};
use edr_block_miner::{mine_block, LocalBlock, MineBlockInputs, MineOrdering};
use edr_chain_config::{chains::largest_possible_reorg, Hardfork};
use edr_eip1559::INITIAL_BASE_FEE;
use edr_eth::{fee_history::FeeHistoryResult, BlockSpec, BlockTag};
use edr_evm::{
    config::{BlockEnv, CfgEnv},
    gas::intrinsic_gas,
    result::ExecutionResult,
    Executor,
};
use edr_mem_pool::{account_next_nonce, MemPool};
use edr_primitives::{Address, Bytes, HashSet, B256, KECCAK_NULL_RLP, U256};
use edr_rpc_client::{HeaderMap, RpcClient};
use edr_state_api::{account::AccountInfo, DynState, StateView};
use edr_state_fork::ForkedState;
use edr_state_local::LocalState;
use edr_transaction::{Request, Signed, TransactionType};
use edr_utils::random::RandomHashGenerator;
use indexmap::IndexMap;
use tokio::runtime;

use self::{
    call::{run_call, RunCallArgs},
    gas::{compute_rewards, gas_used_ratio, BinarySearchEstimationArgs, CheckGasLimitArgs},
};
use crate::{
    blockchain::{
        base_fee_params, Blockchain, ChainBlock, MinedTransaction, RemoteChain, RemoteNode,
    },
    debug_trace::{debug_trace_transaction, DebugTraceResult},
    error::{CreationError, TransactionFailure, TransactionFailureReason},
    logger::SyncLogger,
    snapshot::Snapshot,
    time::{CurrentTime, TimeSinceEpoch},
    ForkConfig, ProviderConfig, ProviderError,
};

const MIX_HASH_SEED: &str = "randomMixHashSeed";
const STATE_ROOT_HASH_SEED: &str = "seed";

/// Priority fee suggested by `eth_maxPriorityFeePerGas`.
pub const DEFAULT_MAX_PRIORITY_FEE_PER_GAS: u128 = 1_000_000_000;
/// Gas price suggested before EIP-1559.
const DEFAULT_GAS_PRICE: u128 = 8_000_000_000;

/// Options for mining a single block.
#[derive(Clone, Debug, Default)]
pub struct BlockOptions {
    /// Explicit timestamp of the block
    pub timestamp: Option<u64>,
}

/// The outcome of sending a transaction.
#[derive(Clone, Debug)]
pub struct SendTransactionResult {
    /// Hash of the sent transaction
    pub transaction_hash: B256,
    /// Blocks mined while auto-mining the transaction, in order
    pub mined_blocks: Vec<Arc<LocalBlock>>,
}

impl SendTransactionResult {
    /// The sent transaction, if it was mined and failed.
    pub fn transaction_failure(&self) -> Option<TransactionFailure> {
        self.mined_blocks.iter().find_map(|block| {
            let (_index, executed) = block.transaction_by_hash(&self.transaction_hash)?;
            TransactionFailure::from_execution_result(&executed.result, Some(&self.transaction_hash))
        })
    }
}

/// The location of a mined transaction.
#[derive(Clone, Debug)]
pub struct BlockDataForTransaction {
    /// The containing block
    pub block: Arc<LocalBlock>,
    /// Index of the transaction in the block
    pub transaction_index: u64,
}

/// A pending or mined transaction.
#[derive(Clone, Debug)]
pub struct TransactionAndBlock {
    /// The transaction
    pub transaction: Signed,
    /// Where the transaction was mined; `None` while pending
    pub block_data: Option<BlockDataForTransaction>,
}

/// The execution environment of a block.
#[derive(Clone, Debug)]
pub(crate) struct BlockContext {
    pub cfg: CfgEnv,
    pub block: BlockEnv,
}

/// The node: chain, state, mem pool and the policies that drive mining.
pub struct ProviderData<TimerT: TimeSinceEpoch = CurrentTime> {
    runtime_handle: runtime::Handle,
    initial_config: ProviderConfig,
    executor: Arc<dyn Executor>,
    blockchain: Blockchain,
    state: DynState,
    mem_pool: MemPool,
    beneficiary: Address,
    min_gas_price: u128,
    mine_ordering: MineOrdering,
    prev_randao_generator: RandomHashGenerator,
    block_time_offset_seconds: i64,
    is_auto_mining: bool,
    next_block_base_fee_per_gas: Option<u128>,
    next_block_timestamp: Option<u64>,
    next_snapshot_id: u64,
    snapshots: BTreeMap<u64, Snapshot>,
    allow_blocks_with_same_timestamp: bool,
    allow_unlimited_contract_size: bool,
    network_id: u64,
    local_accounts: IndexMap<Address, k256::SecretKey>,
    impersonated_accounts: HashSet<Address>,
    logger: Box<dyn SyncLogger>,
    timer: TimerT,
}

impl<TimerT: TimeSinceEpoch> ProviderData<TimerT> {
    /// Constructs a node from the provided configuration. In fork mode, this
    /// blocks on the remote node.
    pub fn new(
        runtime_handle: runtime::Handle,
        executor: Arc<dyn Executor>,
        logger: Box<dyn SyncLogger>,
        config: ProviderConfig,
        timer: TimerT,
    ) -> Result<Self, CreationError> {
        let chain_and_state = match &config.fork {
            Some(fork_config) => {
                let remote = rpc_remote_node(runtime_handle.clone(), fork_config)?;
                create_forked_chain_and_state(remote, &config, &timer)?
            }
            None => create_local_chain_and_state(&config, &timer)?,
        };

        Self::with_chain_and_state(runtime_handle, executor, logger, config, timer, chain_and_state)
    }

    /// Constructs a node that forks the provided remote node. The fork block
    /// number of `config.fork` applies, its URL and headers are unused.
    pub fn with_remote(
        runtime_handle: runtime::Handle,
        executor: Arc<dyn Executor>,
        logger: Box<dyn SyncLogger>,
        config: ProviderConfig,
        timer: TimerT,
        remote: RemoteNode,
    ) -> Result<Self, CreationError> {
        let chain_and_state = create_forked_chain_and_state(remote, &config, &timer)?;

        Self::with_chain_and_state(runtime_handle, executor, logger, config, timer, chain_and_state)
    }

    fn with_chain_and_state(
        runtime_handle: runtime::Handle,
        executor: Arc<dyn Executor>,
        logger: Box<dyn SyncLogger>,
        config: ProviderConfig,
        timer: TimerT,
        chain_and_state: ChainAndState,
    ) -> Result<Self, CreationError> {
        let ChainAndState {
            blockchain,
            state,
            prev_randao_generator,
            block_time_offset_seconds,
            next_block_base_fee_per_gas,
        } = chain_and_state;

        let mut mem_pool = MemPool::new(config.block_gas_limit);
        mem_pool.set_block_gas_limit(&*state, config.block_gas_limit)?;

        let local_accounts = account::local_accounts(&config);

        Ok(Self {
            runtime_handle,
            executor,
            blockchain,
            state,
            mem_pool,
            beneficiary: config.coinbase,
            min_gas_price: config.min_gas_price,
            mine_ordering: config.mining.mem_pool.order,
            prev_randao_generator,
            block_time_offset_seconds,
            is_auto_mining: config.mining.auto_mine,
            next_block_base_fee_per_gas,
            next_block_timestamp: None,
            // Ganache and Hardhat start snapshot IDs at 1
            next_snapshot_id: 1,
            snapshots: BTreeMap::new(),
            allow_blocks_with_same_timestamp: config.allow_blocks_with_same_timestamp,
            allow_unlimited_contract_size: config.allow_unlimited_contract_size,
            network_id: config.network_id,
            local_accounts,
            impersonated_accounts: HashSet::default(),
            logger,
            timer,
            initial_config: config,
        })
    }

    /// Rebuilds the node from its initial configuration, with the provided
    /// fork configuration.
    pub fn reset(&mut self, fork_config: Option<ForkConfig>) -> Result<(), CreationError> {
        let mut config = self.initial_config.clone();
        config.fork = fork_config;

        let mut reset_instance = Self::new(
            self.runtime_handle.clone(),
            self.executor.clone(),
            self.logger.clone(),
            config,
            self.timer.clone(),
        )?;

        // Resetting doesn't change the initial configuration
        reset_instance.initial_config = self.initial_config.clone();

        std::mem::swap(self, &mut reset_instance);

        Ok(())
    }

    /// The addresses of the accounts whose secret keys are held by the node.
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.local_accounts.keys()
    }

    /// The gas limit of the next block.
    pub fn block_gas_limit(&self) -> u64 {
        self.mem_pool.block_gas_limit().get()
    }

    /// The chain ID of locally mined blocks.
    pub fn chain_id(&self) -> u64 {
        self.blockchain.chain_id()
    }

    /// The beneficiary of mined blocks.
    pub fn coinbase(&self) -> Address {
        self.beneficiary
    }

    /// The sender of calls that don't specify one.
    pub fn default_caller(&self) -> Address {
        self.local_accounts
            .keys()
            .next()
            .copied()
            .unwrap_or(Address::ZERO)
    }

    /// The hardfork of locally mined blocks.
    pub fn hardfork(&self) -> Hardfork {
        self.blockchain.hardfork()
    }

    /// The initial configuration.
    pub fn initial_config(&self) -> &ProviderConfig {
        &self.initial_config
    }

    /// Allows transactions from the address without a secret key.
    pub fn impersonate_account(&mut self, address: Address) {
        self.impersonated_accounts.insert(address);
    }

    /// Stops impersonating the address. Returns whether it was impersonated.
    pub fn stop_impersonating_account(&mut self, address: Address) -> bool {
        self.impersonated_accounts.remove(&address)
    }

    /// Increases the time offset of future blocks. Returns the new offset.
    pub fn increase_block_time(&mut self, increment: u64) -> i64 {
        let increment = i64::try_from(increment).unwrap_or(i64::MAX);
        self.block_time_offset_seconds = self.block_time_offset_seconds.saturating_add(increment);
        self.block_time_offset_seconds
    }

    /// Whether every admitted transaction is mined immediately.
    pub fn is_auto_mining(&self) -> bool {
        self.is_auto_mining
    }

    /// Sets whether every admitted transaction is mined immediately.
    pub fn set_auto_mining(&mut self, enabled: bool) {
        self.is_auto_mining = enabled;
    }

    /// The most recent block.
    pub fn last_block(&self) -> &Arc<LocalBlock> {
        self.blockchain.last_block()
    }

    /// The number of the most recent block.
    pub fn last_block_number(&self) -> u64 {
        self.blockchain.last_block_number()
    }

    /// The console logger.
    pub fn logger_mut(&mut self) -> &mut dyn SyncLogger {
        &mut *self.logger
    }

    /// The network ID reported by `net_version`.
    pub fn network_id(&self) -> String {
        self.network_id.to_string()
    }

    /// Pending and queued transactions.
    pub fn pending_transactions(&self) -> impl Iterator<Item = &Signed> {
        self.mem_pool.transactions()
    }

    /// Sets the beneficiary of mined blocks.
    pub fn set_coinbase(&mut self, coinbase: Address) {
        self.beneficiary = coinbase;
    }

    /// Removes a transaction from the mem pool. Returns whether it was
    /// removed; fails for transactions that were already mined.
    pub fn remove_pending_transaction(&mut self, transaction_hash: &B256) -> Result<bool, ProviderError> {
        if self.mem_pool.remove_transaction(transaction_hash).is_some() {
            return Ok(true);
        }

        if self.blockchain.contains_transaction(transaction_hash) {
            return Err(ProviderError::InvalidDropTransactionHash(*transaction_hash));
        }

        Ok(false)
    }

    /// Snapshots everything that `revert_to_snapshot` restores and returns
    /// the snapshot's ID.
    pub fn make_snapshot(&mut self) -> Result<u64, ProviderError> {
        let state_root = self.state.state_root()?;

        let id = self.next_snapshot_id;
        self.next_snapshot_id += 1;

        let snapshot = Snapshot {
            block_number: self.blockchain.last_block_number(),
            block_time_offset_seconds: self.block_time_offset_seconds,
            coinbase: self.beneficiary,
            mem_pool: self.mem_pool.clone(),
            next_block_base_fee_per_gas: self.next_block_base_fee_per_gas,
            next_block_timestamp: self.next_block_timestamp,
            prev_randao_generator: self.prev_randao_generator.clone(),
            state_root,
            time: Instant::now(),
        };
        self.snapshots.insert(id, snapshot);

        Ok(id)
    }

    /// Restores the snapshot with the provided ID. The snapshot and all later
    /// snapshots are discarded. Returns whether the snapshot existed.
    pub fn revert_to_snapshot(&mut self, snapshot_id: u64) -> Result<bool, ProviderError> {
        // Snapshots can only be used once, so later snapshots are invalidated too.
        let mut removed_snapshots = self.snapshots.split_off(&snapshot_id);

        let Some(snapshot) = removed_snapshots.remove(&snapshot_id) else {
            return Ok(false);
        };

        let Snapshot {
            block_number,
            block_time_offset_seconds,
            coinbase,
            mem_pool,
            next_block_base_fee_per_gas,
            next_block_timestamp,
            prev_randao_generator,
            state_root,
            time,
        } = snapshot;

        self.state.set_state_root(state_root)?;

        // now + new_offset == snapshot_time + old_offset
        let elapsed = i64::try_from(Instant::now().duration_since(time).as_secs()).unwrap_or(i64::MAX);
        self.block_time_offset_seconds = block_time_offset_seconds.saturating_add(elapsed);

        self.beneficiary = coinbase;
        if !self.blockchain.revert_to_block(block_number) {
            log::warn!("Snapshot of block {block_number} does not refer to a local block");
        }

        self.mem_pool = mem_pool;
        self.next_block_base_fee_per_gas = next_block_base_fee_per_gas;
        self.next_block_timestamp = next_block_timestamp;
        self.prev_randao_generator = prev_randao_generator;

        Ok(true)
    }

    /// Signs the request with the sender's secret key, or fake-signs it for
    /// impersonated senders.
    pub fn sign_transaction_request(
        &self,
        request: Request,
        sender: Address,
    ) -> Result<Signed, ProviderError> {
        if self.impersonated_accounts.contains(&sender) {
            return Ok(request.fake_sign(sender));
        }

        let secret_key = self
            .local_accounts
            .get(&sender)
            .ok_or(ProviderError::UnknownAddress { address: sender })?;

        Ok(request.sign(secret_key)?)
    }

    /// The nonce of the sender's next transaction, taking pending
    /// transactions into account.
    pub fn account_next_nonce(&self, address: &Address) -> Result<u64, ProviderError> {
        Ok(account_next_nonce(&self.mem_pool, &*self.state, address)?)
    }

    /// Retrieves the block that corresponds to the block spec. Returns `None`
    /// for the pending block.
    pub fn block_by_block_spec(&self, block_spec: &BlockSpec) -> Result<Option<ChainBlock>, ProviderError> {
        let invalid_block_spec = || ProviderError::InvalidBlockNumberOrHash {
            block_spec: block_spec.clone(),
            latest_block_number: self.blockchain.last_block_number(),
        };

        match block_spec {
            BlockSpec::Number(number) => self
                .blockchain
                .block_by_number(*number)?
                .map(Some)
                .ok_or_else(invalid_block_spec),
            BlockSpec::Tag(BlockTag::Earliest) => self
                .blockchain
                .block_by_number(0)?
                .map(Some)
                .ok_or_else(invalid_block_spec),
            BlockSpec::Tag(block_tag @ (BlockTag::Safe | BlockTag::Finalized)) => {
                let hardfork = self.hardfork();
                if hardfork < Hardfork::Merge {
                    return Err(ProviderError::InvalidBlockTag {
                        block_tag: *block_tag,
                        hardfork,
                    });
                }

                self.latest_block().map(Some)
            }
            BlockSpec::Tag(BlockTag::Latest) => self.latest_block().map(Some),
            BlockSpec::Tag(BlockTag::Pending) => Ok(None),
            BlockSpec::Hash { block_hash, .. } => self
                .blockchain
                .block_by_hash(block_hash)
                .map(Some)
                .ok_or_else(invalid_block_spec),
        }
    }

    /// Retrieves a locally mined block by its hash.
    pub fn block_by_hash(&self, block_hash: &B256) -> Option<ChainBlock> {
        self.blockchain.block_by_hash(block_hash)
    }

    /// The suggested gas price for new transactions.
    pub fn gas_price(&self) -> u128 {
        self.next_block_base_fee_per_gas()
            .map_or(DEFAULT_GAS_PRICE, |base_fee| {
                base_fee + DEFAULT_MAX_PRIORITY_FEE_PER_GAS
            })
    }

    /// The base fee of the next block, after EIP-1559 activated.
    pub fn next_block_base_fee_per_gas(&self) -> Option<u128> {
        if self.hardfork() < Hardfork::London {
            return None;
        }

        self.next_block_base_fee_per_gas.or_else(|| {
            let block_config = self.blockchain.block_config();
            Some(calculate_next_base_fee_per_gas(
                &self.blockchain.last_block().header,
                &block_config.base_fee_params,
            ))
        })
    }

    /// Sets the gas limit of future blocks, evicting pending transactions
    /// that no longer fit.
    pub fn set_block_gas_limit(&mut self, gas_limit: NonZeroU64) -> Result<(), ProviderError> {
        Ok(self.mem_pool.set_block_gas_limit(&*self.state, gas_limit)?)
    }

    /// Sets the minimum gas price of mined transactions. Only supported
    /// before EIP-1559.
    pub fn set_min_gas_price(&mut self, min_gas_price: u128) -> Result<(), ProviderError> {
        if self.hardfork() >= Hardfork::London {
            return Err(ProviderError::SetMinGasPriceUnsupported);
        }

        self.min_gas_price = min_gas_price;

        Ok(())
    }

    /// Sets the base fee of the next block. Only supported after EIP-1559.
    pub fn set_next_block_base_fee_per_gas(&mut self, base_fee_per_gas: u128) -> Result<(), ProviderError> {
        let hardfork = self.hardfork();
        if hardfork < Hardfork::London {
            return Err(ProviderError::SetNextBlockBaseFeePerGasUnsupported { hardfork });
        }

        self.next_block_base_fee_per_gas = Some(base_fee_per_gas);

        Ok(())
    }

    /// Sets the timestamp of the next block.
    pub fn set_next_block_timestamp(&mut self, timestamp: u64) -> Result<u64, ProviderError> {
        let previous = self.blockchain.last_block().header.timestamp;

        match timestamp.cmp(&previous) {
            Ordering::Less => Err(ProviderError::TimestampLowerThanPrevious {
                proposed: timestamp,
                previous,
            }),
            Ordering::Equal if !self.allow_blocks_with_same_timestamp => {
                Err(ProviderError::TimestampEqualsPrevious {
                    proposed: timestamp,
                })
            }
            Ordering::Equal | Ordering::Greater => {
                self.next_block_timestamp = Some(timestamp);
                Ok(timestamp)
            }
        }
    }

    /// Overwrites the balance of the account.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), ProviderError> {
        self.modify_state(|state| {
            let mut account = state.account(address)?;
            account.balance = balance;
            account.code = None;

            state.put_account(address, account)
        })
    }

    /// Overwrites the code of the account.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), ProviderError> {
        self.modify_state(|state| {
            let account = state.account(address)?;
            state.put_account(
                address,
                AccountInfo::with_code(account.balance, account.nonce, code),
            )
        })
    }

    /// Overwrites the nonce of the account. The nonce can only be increased,
    /// and only while the mem pool is empty.
    pub fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), ProviderError> {
        if self.mem_pool.has_transactions() {
            return Err(ProviderError::SetAccountNonceWithPendingTransactions);
        }

        let previous = self.state.account(address)?.nonce;
        if nonce < previous {
            return Err(ProviderError::SetAccountNonceLowerThanCurrent {
                previous,
                proposed: nonce,
            });
        }

        self.modify_state(|state| {
            let mut account = state.account(address)?;
            account.nonce = nonce;
            account.code = None;

            state.put_account(address, account)
        })
    }

    /// Overwrites a storage slot of the account.
    pub fn set_account_storage_slot(
        &mut self,
        address: Address,
        index: U256,
        value: U256,
    ) -> Result<(), ProviderError> {
        self.modify_state(|state| state.put_contract_storage(address, index, value))
    }

    /// Applies a modification to a copy of the state, which replaces the
    /// state if the modification and the subsequent mem pool update succeed.
    fn modify_state(
        &mut self,
        modifier: impl FnOnce(&mut dyn StateView) -> Result<(), edr_state_api::StateError>,
    ) -> Result<(), ProviderError> {
        let mut modified_state = self.state.clone();
        modifier(&mut *modified_state)?;

        let mut mem_pool = self.mem_pool.clone();
        mem_pool
            .update(&*modified_state)
            .map_err(ProviderError::MemPoolUpdate)?;

        self.state = modified_state;
        self.mem_pool = mem_pool;

        Ok(())
    }

    /// Retrieves a pending or mined transaction.
    pub fn transaction_by_hash(&self, hash: &B256) -> Option<TransactionAndBlock> {
        if let Some(transaction) = self.mem_pool.transaction_by_hash(hash) {
            return Some(TransactionAndBlock {
                transaction: transaction.pending().clone(),
                block_data: None,
            });
        }

        self.blockchain
            .transaction_by_hash(hash)
            .map(|mined| TransactionAndBlock {
                transaction: mined.executed().transaction.clone(),
                block_data: Some(BlockDataForTransaction {
                    block: mined.block,
                    transaction_index: mined.index as u64,
                }),
            })
    }

    /// Retrieves a mined transaction and its block.
    pub fn mined_transaction(&self, hash: &B256) -> Option<MinedTransaction> {
        self.blockchain.transaction_by_hash(hash)
    }

    /// Adds the transaction to the mem pool and, when auto-mining, mines it
    /// together with any other pending transactions.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn send_transaction(&mut self, transaction: Signed) -> Result<SendTransactionResult, ProviderError> {
        let minimum_gas = intrinsic_gas(
            self.hardfork(),
            transaction.kind(),
            transaction.input(),
            transaction.access_list(),
        );
        if transaction.gas_limit() < minimum_gas {
            return Err(ProviderError::InvalidInput(format!(
                "Transaction requires at least {minimum_gas} gas but got {}",
                transaction.gas_limit()
            )));
        }

        if !self.is_auto_mining {
            let transaction_hash = self.add_pending_transaction(transaction)?;
            return Ok(SendTransactionResult {
                transaction_hash,
                mined_blocks: Vec::new(),
            });
        }

        self.validate_auto_mine_transaction(&transaction)?;
        let snapshot_id = self.make_snapshot()?;

        let transaction_hash = match self.add_pending_transaction(transaction) {
            Ok(transaction_hash) => transaction_hash,
            Err(error) => {
                self.revert_to_snapshot_after_error(snapshot_id);
                return Err(error);
            }
        };

        let mined_blocks = match self.mine_until_transaction_is_mined(&transaction_hash) {
            Ok(mined_blocks) => mined_blocks,
            Err(error) => {
                self.revert_to_snapshot_after_error(snapshot_id);
                return Err(error);
            }
        };

        self.snapshots.remove(&snapshot_id);

        Ok(SendTransactionResult {
            transaction_hash,
            mined_blocks,
        })
    }

    fn mine_until_transaction_is_mined(
        &mut self,
        transaction_hash: &B256,
    ) -> Result<Vec<Arc<LocalBlock>>, ProviderError> {
        let mut mined_blocks = Vec::new();

        loop {
            let block = self.mine_and_commit_block(BlockOptions::default())?;
            let is_mined = block.transaction_by_hash(transaction_hash).is_some();
            let is_empty = block.transactions.is_empty();
            mined_blocks.push(block);

            if is_mined {
                break;
            }

            if is_empty {
                log::warn!("Transaction {transaction_hash} could not be mined");
                return Ok(mined_blocks);
            }
        }

        while self.mem_pool.has_pending_transactions() {
            let block = self.mine_and_commit_block(BlockOptions::default())?;
            let is_empty = block.transactions.is_empty();
            mined_blocks.push(block);

            if is_empty {
                break;
            }
        }

        Ok(mined_blocks)
    }

    fn revert_to_snapshot_after_error(&mut self, snapshot_id: u64) {
        if let Err(error) = self.revert_to_snapshot(snapshot_id) {
            log::error!("Failed to revert to snapshot {snapshot_id}: {error}");
        }
    }

    fn add_pending_transaction(&mut self, transaction: Signed) -> Result<B256, ProviderError> {
        let transaction_hash = *transaction.hash();

        self.mem_pool.add_transaction(&*self.state, transaction)?;

        Ok(transaction_hash)
    }

    fn validate_auto_mine_transaction(&self, transaction: &Signed) -> Result<(), ProviderError> {
        let next_nonce = self.account_next_nonce(transaction.caller())?;

        match transaction.nonce().cmp(&next_nonce) {
            Ordering::Less => {
                return Err(ProviderError::AutoMineNonceTooLow {
                    expected: next_nonce,
                    actual: transaction.nonce(),
                });
            }
            Ordering::Equal => (),
            Ordering::Greater => {
                return Err(ProviderError::AutoMineNonceTooHigh {
                    expected: next_nonce,
                    actual: transaction.nonce(),
                });
            }
        }

        let fee = transaction.fee();
        let max_priority_fee_per_gas = fee.max_priority_fee_per_gas();
        if max_priority_fee_per_gas < self.min_gas_price {
            return Err(ProviderError::AutoMinePriorityFeeTooLow {
                expected: self.min_gas_price,
                actual: max_priority_fee_per_gas,
            });
        }

        if let Some(next_block_base_fee) = self.next_block_base_fee_per_gas() {
            let max_fee_per_gas = fee.max_fee_per_gas();
            if max_fee_per_gas < next_block_base_fee {
                return Err(if transaction.transaction_type() == TransactionType::Eip1559 {
                    ProviderError::AutoMineMaxFeePerGasTooLow {
                        expected: next_block_base_fee,
                        actual: max_fee_per_gas,
                    }
                } else {
                    ProviderError::AutoMineGasPriceTooLow {
                        expected: next_block_base_fee,
                        actual: max_fee_per_gas,
                    }
                });
            }
        }

        Ok(())
    }

    /// Mines a block with the transactions in the mem pool and appends it to
    /// the chain.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn mine_and_commit_block(&mut self, options: BlockOptions) -> Result<Arc<LocalBlock>, ProviderError> {
        let (block_timestamp, new_offset) = self.next_block_timestamp(options.timestamp)?;

        let mut state = self.state.clone();
        let block = self.mine_block(&mut *state, block_timestamp)?;

        self.state = state;
        let block = self.blockchain.insert_block(block);

        self.mem_pool
            .update(&*self.state)
            .map_err(ProviderError::MemPoolUpdate)?;

        if let Some(new_offset) = new_offset {
            self.block_time_offset_seconds = new_offset;
        }

        // Reset the next block overrides
        self.next_block_base_fee_per_gas = None;
        self.next_block_timestamp = None;

        if self.hardfork().is_post_merge() {
            self.prev_randao_generator.next_value();
        }

        Ok(block)
    }

    /// Mines `number_of_blocks` blocks, `interval` seconds apart.
    pub fn mine_and_commit_blocks(
        &mut self,
        number_of_blocks: u64,
        interval: u64,
    ) -> Result<Vec<Arc<LocalBlock>>, ProviderError> {
        if number_of_blocks == 0 {
            return Ok(Vec::new());
        }

        // The interval doesn't apply to the first block
        let first_block = self.mine_and_commit_block(BlockOptions::default())?;
        let mut previous_timestamp = first_block.header.timestamp;
        let mut mined_blocks = vec![first_block];

        for _ in 1..number_of_blocks {
            let block = self.mine_and_commit_block(BlockOptions {
                timestamp: Some(previous_timestamp + interval),
            })?;

            previous_timestamp = block.header.timestamp;
            mined_blocks.push(block);
        }

        Ok(mined_blocks)
    }

    /// Mines a block for the interval miner.
    pub fn interval_mine(&mut self) -> Result<bool, ProviderError> {
        let block = self.mine_and_commit_block(BlockOptions::default())?;

        self.logger.log_interval_mined(&block)?;

        Ok(true)
    }

    /// Mines the pending block on a copy of the state, without modifying the
    /// node.
    pub fn mine_pending_block(&self) -> Result<(LocalBlock, DynState), ProviderError> {
        let (block_timestamp, _new_offset) = self.next_block_timestamp(None)?;

        let mut state = self.state.clone();
        let block = self.mine_block(&mut *state, block_timestamp)?;

        Ok((block, state))
    }

    fn mine_block(&self, state: &mut dyn StateView, timestamp: u64) -> Result<LocalBlock, ProviderError> {
        let parent = self.blockchain.last_block();

        let overrides = HeaderOverrides {
            parent_hash: Some(parent.hash),
            beneficiary: Some(self.beneficiary),
            gas_limit: Some(self.block_gas_limit()),
            timestamp: Some(timestamp),
            base_fee: self.next_block_base_fee_per_gas,
            mix_hash: self.hardfork().is_post_merge().then(|| self.prev_randao_generator.peek()),
            ..HeaderOverrides::default()
        };

        let block = mine_block(
            state,
            &self.mem_pool,
            MineBlockInputs {
                executor: &*self.executor,
                cfg: self.create_evm_config(),
                block_config: self.blockchain.block_config(),
                parent: Some(&parent.header),
                overrides,
            },
            self.min_gas_price,
            self.mine_ordering,
        )?;

        Ok(block)
    }

    /// Determines the timestamp of the next block and, if it changes, the new
    /// time offset.
    fn next_block_timestamp(&self, timestamp: Option<u64>) -> Result<(u64, Option<i64>), ProviderError> {
        let previous = self.blockchain.last_block().header.timestamp;
        let current_timestamp = i64::try_from(self.timer.since_epoch()).unwrap_or(i64::MAX);

        let (mut block_timestamp, mut new_offset) = if let Some(timestamp) = timestamp {
            if timestamp < previous {
                return Err(ProviderError::TimestampLowerThanPrevious {
                    proposed: timestamp,
                    previous,
                });
            }

            (timestamp, Some(to_i64(timestamp) - current_timestamp))
        } else if let Some(next_block_timestamp) = self.next_block_timestamp {
            (
                next_block_timestamp,
                Some(to_i64(next_block_timestamp) - current_timestamp),
            )
        } else {
            let offset_timestamp = current_timestamp.saturating_add(self.block_time_offset_seconds);
            let offset_timestamp = u64::try_from(offset_timestamp).unwrap_or_default();

            if offset_timestamp < previous {
                // The clock must not run backwards
                (previous, Some(to_i64(previous) - current_timestamp))
            } else {
                (offset_timestamp, None)
            }
        };

        if block_timestamp == previous && !self.allow_blocks_with_same_timestamp {
            block_timestamp += 1;
            new_offset = Some(new_offset.unwrap_or(self.block_time_offset_seconds) + 1);
        }

        Ok((block_timestamp, new_offset))
    }

    fn create_evm_config(&self) -> CfgEnv {
        self.evm_config(self.blockchain.chain_id(), self.hardfork())
    }

    fn evm_config(&self, chain_id: u64, hardfork: Hardfork) -> CfgEnv {
        let mut cfg = CfgEnv::new(chain_id, hardfork);
        cfg.allow_unlimited_contract_size = self.allow_unlimited_contract_size;
        cfg
    }

    fn latest_block(&self) -> Result<ChainBlock, ProviderError> {
        let last_block = self.blockchain.last_block();

        // In fork mode, the fork block is served by the remote node
        if self.blockchain.fork_block_number() == Some(last_block.header.number) {
            if let Some(block) = self.blockchain.block_by_number(last_block.header.number)? {
                return Ok(block);
            }
        }

        Ok(ChainBlock::Local(last_block.clone()))
    }

    fn block_context(&self, block: &ChainBlock) -> Result<BlockContext, ProviderError> {
        let hardfork = self
            .blockchain
            .hardfork_at_block(block.number(), block.timestamp())?;
        let chain_id = self.blockchain.chain_id_at_block(block.number());

        Ok(BlockContext {
            cfg: self.evm_config(chain_id, hardfork),
            block: block.block_env(hardfork),
        })
    }

    /// Runs the function on the state of the provided block; the latest
    /// block by default.
    fn execute_in_block_context<T>(
        &mut self,
        block_spec: Option<&BlockSpec>,
        function: impl FnOnce(&dyn Executor, &BlockContext, &mut dyn StateView) -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        let latest = BlockSpec::latest();
        let block_spec = block_spec.unwrap_or(&latest);

        match self.block_by_block_spec(block_spec)? {
            Some(block) if block.number() == self.blockchain.last_block_number() => {
                let context = self.block_context(&block)?;
                function(&*self.executor, &context, &mut *self.state)
            }
            Some(block) => {
                let context = self.block_context(&block)?;

                let mut state = self.state.clone();
                state.set_block_context(block.state_root(), Some(block.number()))?;

                function(&*self.executor, &context, &mut *state)
            }
            None => {
                let (pending_block, mut state) = self.mine_pending_block()?;

                let hardfork = self.hardfork();
                let context = BlockContext {
                    cfg: self.create_evm_config(),
                    block: ChainBlock::Local(Arc::new(pending_block)).block_env(hardfork),
                };

                function(&*self.executor, &context, &mut *state)
            }
        }
    }

    /// The balance of the account at the provided block.
    pub fn balance(&mut self, address: Address, block_spec: Option<&BlockSpec>) -> Result<U256, ProviderError> {
        self.execute_in_block_context(block_spec, |_executor, _context, state| {
            Ok(state.account(address)?.balance)
        })
    }

    /// The code of the account at the provided block.
    pub fn get_code(&mut self, address: Address, block_spec: Option<&BlockSpec>) -> Result<Bytes, ProviderError> {
        self.execute_in_block_context(block_spec, |_executor, _context, state| {
            Ok(state.contract_code(address)?)
        })
    }

    /// A storage slot of the account at the provided block.
    pub fn get_storage_at(
        &mut self,
        address: Address,
        index: U256,
        block_spec: Option<&BlockSpec>,
    ) -> Result<U256, ProviderError> {
        self.execute_in_block_context(block_spec, |_executor, _context, state| {
            Ok(state.contract_storage(address, index)?)
        })
    }

    /// The number of transactions sent by the account at the provided block.
    /// For the pending block, pending transactions are included.
    pub fn get_transaction_count(
        &mut self,
        address: Address,
        block_spec: Option<&BlockSpec>,
    ) -> Result<u64, ProviderError> {
        if matches!(block_spec, Some(BlockSpec::Tag(BlockTag::Pending))) {
            return self.account_next_nonce(&address);
        }

        self.execute_in_block_context(block_spec, |_executor, _context, state| {
            Ok(state.account(address)?.nonce)
        })
    }

    /// Executes the transaction on the state of the provided block, without
    /// committing any changes.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn run_call(&mut self, transaction: Signed, block_spec: &BlockSpec) -> Result<ExecutionResult, ProviderError> {
        let result = self.execute_in_block_context(Some(block_spec), |executor, context, state| {
            run_call(RunCallArgs {
                executor,
                state,
                cfg_env: context.cfg.clone(),
                block: &context.block,
                transaction: transaction.clone(),
            })
        })?;

        self.logger.log_call(&transaction, &result)?;

        Ok(result)
    }

    /// Estimates the gas limit that the transaction needs to succeed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn estimate_gas(&mut self, transaction: Signed, block_spec: &BlockSpec) -> Result<u64, ProviderError> {
        self.execute_in_block_context(Some(block_spec), |executor, context, state| {
            // Minimum gas cost that is required for the transaction to be included in a block
            let minimum_cost = intrinsic_gas(
                context.cfg.hardfork,
                transaction.kind(),
                transaction.input(),
                transaction.access_list(),
            );

            // Report errors of the initial call as if from `eth_call`
            let result = run_call(RunCallArgs {
                executor,
                state: &mut *state,
                cfg_env: context.cfg.clone(),
                block: &context.block,
                transaction: transaction.clone(),
            })?;

            let mut initial_estimation = match result {
                ExecutionResult::Success { gas_used, .. } => gas_used,
                ExecutionResult::Revert { output, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::revert(output, None),
                    )));
                }
                ExecutionResult::Halt { reason, .. } => {
                    return Err(ProviderError::TransactionFailed(Box::new(
                        TransactionFailure::halt(TransactionFailureReason::from(reason), None),
                    )));
                }
            };

            if initial_estimation <= minimum_cost {
                initial_estimation = minimum_cost + 1;
            }

            let success = gas::check_gas_limit(CheckGasLimitArgs {
                executor,
                state: &mut *state,
                cfg_env: &context.cfg,
                block: &context.block,
                transaction: &transaction,
                gas_limit: initial_estimation,
            })?;

            if success {
                return Ok(initial_estimation);
            }

            // Execution logic can depend on the available gas, so the used gas is not
            // necessarily sufficient.
            gas::binary_search_estimation(BinarySearchEstimationArgs {
                executor,
                state,
                cfg_env: &context.cfg,
                block: &context.block,
                transaction: &transaction,
                lower_bound: initial_estimation,
                upper_bound: context.block.gas_limit,
            })
        })
    }

    /// Base fees, gas used ratios and reward percentiles of a range of
    /// blocks ending at the newest block.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn fee_history(
        &mut self,
        block_count: u64,
        newest_block_spec: &BlockSpec,
        percentiles: Option<Vec<f64>>,
    ) -> Result<FeeHistoryResult, ProviderError> {
        let hardfork = self.hardfork();
        if hardfork < Hardfork::London {
            return Err(ProviderError::UnmetHardfork {
                actual: hardfork,
                minimum: Hardfork::London,
            });
        }

        let pending_block_number = self.last_block_number() + 1;
        let newest_block_number = self
            .block_by_block_spec(newest_block_spec)?
            .map_or(pending_block_number, |block| block.number());
        let oldest_block_number = (newest_block_number + 1).saturating_sub(block_count);
        // The base fee of the block after the newest block is included too
        let last_block_number = newest_block_number + 1;

        let pending_block = if last_block_number >= pending_block_number {
            let (block, _state) = self.mine_pending_block()?;
            Some(block)
        } else {
            None
        };

        let mut result = FeeHistoryResult::new(oldest_block_number);

        let mut reward_and_percentiles = percentiles.and_then(|percentiles| {
            if percentiles.is_empty() {
                None
            } else {
                Some((Vec::new(), percentiles))
            }
        });

        let mut first_local_block = oldest_block_number;
        if let Some(remote) = self.blockchain.remote() {
            let fork_block_number = remote.fork_block_number();

            if oldest_block_number <= fork_block_number {
                let last_remote_block = cmp::min(fork_block_number, newest_block_number);
                let remote_block_count = last_remote_block - oldest_block_number + 1;

                let FeeHistoryResult {
                    oldest_block: _,
                    mut base_fee_per_gas,
                    gas_used_ratio,
                    reward: remote_reward,
                } = remote.fee_history(
                    remote_block_count,
                    last_remote_block,
                    reward_and_percentiles
                        .as_ref()
                        .map(|(_, percentiles)| percentiles.clone())
                        .unwrap_or_default(),
                )?;

                first_local_block = last_remote_block + 1;
                if first_local_block <= last_block_number {
                    // The base fee of the first local block is determined locally
                    base_fee_per_gas.pop();
                }

                result.base_fee_per_gas = base_fee_per_gas;
                result.gas_used_ratio = gas_used_ratio;
                if let Some((reward, _)) = reward_and_percentiles.as_mut() {
                    if let Some(remote_reward) = remote_reward {
                        *reward = remote_reward;
                    }
                }
            }
        }

        for block_number in first_local_block..=last_block_number {
            match block_number.cmp(&pending_block_number) {
                Ordering::Less => {
                    let block = self
                        .blockchain
                        .block_by_number(block_number)?
                        .ok_or_else(|| ProviderError::InvalidBlockNumberOrHash {
                            block_spec: BlockSpec::Number(block_number),
                            latest_block_number: self.last_block_number(),
                        })?;

                    result
                        .base_fee_per_gas
                        .push(block.base_fee_per_gas().unwrap_or_default());

                    if block_number < last_block_number {
                        result
                            .gas_used_ratio
                            .push(gas_used_ratio(block.gas_used(), block.gas_limit()));

                        if let Some((reward, percentiles)) = reward_and_percentiles.as_mut() {
                            reward.push(match &block {
                                ChainBlock::Local(block) => compute_rewards(block, percentiles),
                                ChainBlock::Remote(_) => vec![U256::ZERO; percentiles.len()],
                            });
                        }
                    }
                }
                Ordering::Equal => {
                    result
                        .base_fee_per_gas
                        .push(self.next_block_base_fee_per_gas().unwrap_or_default());

                    if block_number < last_block_number {
                        if let Some(block) = &pending_block {
                            result
                                .gas_used_ratio
                                .push(gas_used_ratio(block.header.gas_used, block.header.gas_limit));
                        }

                        if let Some((reward, percentiles)) = reward_and_percentiles.as_mut() {
                            // The pending block has no effective miner fee yet
                            reward.push(vec![U256::ZERO; percentiles.len()]);
                        }
                    }
                }
                Ordering::Greater => {
                    if let Some(block) = &pending_block {
                        let block_config = self.blockchain.block_config();
                        result.base_fee_per_gas.push(calculate_next_base_fee_per_gas(
                            &block.header,
                            &block_config.base_fee_params,
                        ));
                    }
                }
            }
        }

        if let Some((reward, _)) = reward_and_percentiles {
            result.reward = Some(reward);
        }

        Ok(result)
    }

    /// Re-executes a mined transaction on top of its block's parent state.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub fn debug_trace_transaction(&mut self, transaction_hash: &B256) -> Result<DebugTraceResult, ProviderError> {
        let mined = self
            .blockchain
            .transaction_by_hash(transaction_hash)
            .ok_or(ProviderError::InvalidTransactionHash(*transaction_hash))?;

        let block = ChainBlock::Local(mined.block.clone());
        let context = self.block_context(&block)?;
        let transactions = mined
            .block
            .transactions
            .iter()
            .map(|executed| executed.transaction.clone());

        let parent_number = block.number().saturating_sub(1);
        self.execute_in_block_context(
            Some(&BlockSpec::Number(parent_number)),
            |executor, _parent_context, state| {
                let mut state = dyn_clone::clone_box(&*state);
                debug_trace_transaction(
                    executor,
                    &mut *state,
                    &context.cfg,
                    &context.block,
                    transactions,
                    transaction_hash,
                )
            },
        )
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

struct ChainAndState {
    blockchain: Blockchain,
    state: DynState,
    prev_randao_generator: RandomHashGenerator,
    block_time_offset_seconds: i64,
    next_block_base_fee_per_gas: Option<u128>,
}

fn rpc_remote_node(
    runtime: runtime::Handle,
    fork_config: &ForkConfig,
) -> Result<RemoteNode, CreationError> {
    let http_headers = fork_config
        .http_headers
        .as_ref()
        .map(|headers| {
            HeaderMap::try_from(headers)
                .map_err(|error| CreationError::InvalidHttpHeader(error.to_string()))
        })
        .transpose()?;

    let rpc_client = Arc::new(RpcClient::new(&fork_config.url, http_headers)?);

    Ok(RemoteNode::from_rpc_client(rpc_client, runtime))
}

fn create_forked_chain_and_state(
    remote: RemoteNode,
    config: &ProviderConfig,
    timer: &impl TimeSinceEpoch,
) -> Result<ChainAndState, CreationError> {
    let prev_randao_generator = RandomHashGenerator::with_seed(MIX_HASH_SEED);
    let block_time_offset_seconds = block_time_offset_seconds(config, timer)?;

    let chain_id = remote.blocks.chain_id()?;
    let latest_block_number = remote.blocks.latest_block_number()?;

    let fork_block_number = match config.fork.as_ref().and_then(|fork| fork.block_number) {
        Some(fork_block_number) if fork_block_number > latest_block_number => {
            return Err(CreationError::InvalidBlockNumber {
                fork_block_number,
                latest_block_number,
            });
        }
        Some(fork_block_number) => fork_block_number,
        None => latest_block_number.saturating_sub(largest_possible_reorg(chain_id)),
    };

    let fork_block = remote
        .blocks
        .block_by_number(fork_block_number)?
        .ok_or(CreationError::MissingForkBlock(fork_block_number))?;

    let state_root_generator = Arc::new(parking_lot::Mutex::new(RandomHashGenerator::with_seed(
        STATE_ROOT_HASH_SEED,
    )));

    let mut state = ForkedState::new(
        remote.state,
        state_root_generator,
        fork_block_number,
        fork_block.state_root,
    );
    account::apply_account_overrides(&mut state, &config.genesis_state)?;

    let next_block_base_fee_per_gas = if config.hardfork >= Hardfork::London {
        config.initial_base_fee_per_gas.or_else(|| {
            // The first block after a pre-London fork block
            fork_block
                .base_fee_per_gas
                .is_none()
                .then_some(u128::from(INITIAL_BASE_FEE))
        })
    } else {
        None
    };

    let remote_chain = RemoteChain::new(remote.blocks, chain_id, fork_block);
    let blockchain = Blockchain::forked(
        remote_chain,
        config.chain_id,
        config.hardfork,
        config.chains.clone(),
    );

    Ok(ChainAndState {
        blockchain,
        state: Box::new(state),
        prev_randao_generator,
        block_time_offset_seconds,
        next_block_base_fee_per_gas,
    })
}

fn create_local_chain_and_state(
    config: &ProviderConfig,
    timer: &impl TimeSinceEpoch,
) -> Result<ChainAndState, CreationError> {
    let mut prev_randao_generator = RandomHashGenerator::with_seed(MIX_HASH_SEED);
    let block_time_offset_seconds = block_time_offset_seconds(config, timer)?;

    let mut state = LocalState::with_accounts(account::genesis_accounts(&config.genesis_state))?;
    account::apply_storage_overrides(&mut state, &config.genesis_state)?;

    let timestamp = match config.initial_date {
        Some(initial_date) => unix_timestamp(initial_date)?,
        None => timer.since_epoch(),
    };

    let block_config = BlockConfig {
        base_fee_params: base_fee_params(&config.chains, config.chain_id),
        hardfork: config.hardfork,
    };

    let mix_hash = config.hardfork.is_post_merge().then(|| prev_randao_generator.next_value());

    let partial_header = PartialHeader::new(
        &block_config,
        HeaderOverrides {
            beneficiary: Some(Address::ZERO),
            state_root: Some(state.state_root()?),
            gas_limit: Some(config.block_gas_limit.get()),
            timestamp: Some(timestamp),
            base_fee: config
                .initial_base_fee_per_gas
                .filter(|_base_fee| config.hardfork >= Hardfork::London),
            mix_hash,
            ..HeaderOverrides::default()
        },
        None,
    );

    let header = BlockHeader::new(partial_header, KECCAK_NULL_RLP);
    let genesis = LocalBlock {
        hash: header.hash(),
        header,
        transactions: Vec::new(),
    };

    let blockchain = Blockchain::with_genesis(
        genesis,
        config.chain_id,
        config.hardfork,
        config.chains.clone(),
    );

    Ok(ChainAndState {
        blockchain,
        state: Box::new(state),
        prev_randao_generator,
        block_time_offset_seconds,
        // The initial base fee is part of the genesis block
        next_block_base_fee_per_gas: None,
    })
}

fn unix_timestamp(date: SystemTime) -> Result<u64, CreationError> {
    date.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .map_err(|_error| CreationError::InvalidInitialDate(date))
}

/// The offset between the initial date and the current time.
fn block_time_offset_seconds(config: &ProviderConfig, timer: &impl TimeSinceEpoch) -> Result<i64, CreationError> {
    config.initial_date.map_or(Ok(0), |initial_date| {
        let initial_timestamp = unix_timestamp(initial_date)?;
        Ok(to_i64(initial_timestamp) - to_i64(timer.since_epoch()))
    })
}

#[cfg(test)]
mod tests {
    use edr_primitives::ONE_ETHER;

    use edr_evm::TransferExecutor;
    use edr_state_remote::InMemoryRemote;

    use super::*;
    use crate::{
        logger::NoopLogger,
        test_utils::{
            create_test_config, create_test_config_with_fork, in_memory_fork_config,
            in_memory_remote_node, InMemoryBlocks, ProviderTestFixture, IN_MEMORY_BASE_FEE,
        },
        time::MockTime,
    };

    #[test]
    fn local_account_balance() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let account = fixture.first_account();
        let balance = fixture.provider_data.balance(account, None)?;
        assert_eq!(balance, U256::from(ONE_ETHER) * U256::from(1000));

        Ok(())
    }

    #[test]
    fn sign_transaction_request_for_unknown_account() -> anyhow::Result<()> {
        let fixture = ProviderTestFixture::new_local()?;

        let request = fixture.dummy_request(0);
        let error = fixture
            .provider_data
            .sign_transaction_request(request, Address::repeat_byte(0x99))
            .unwrap_err();

        assert!(matches!(error, ProviderError::UnknownAddress { .. }));

        Ok(())
    }

    #[test]
    fn sign_transaction_request_impersonated_account() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let impersonated = Address::repeat_byte(0x42);
        fixture.provider_data.impersonate_account(impersonated);

        let transaction = fixture
            .provider_data
            .sign_transaction_request(fixture.dummy_request(0), impersonated)?;

        assert!(transaction.is_impersonated());
        assert_eq!(*transaction.caller(), impersonated);

        Ok(())
    }

    #[test]
    fn block_by_block_spec_earliest_and_pending() -> anyhow::Result<()> {
        let fixture = ProviderTestFixture::new_local()?;

        let earliest = fixture
            .provider_data
            .block_by_block_spec(&BlockSpec::Tag(BlockTag::Earliest))?
            .ok_or_else(|| anyhow::anyhow!("missing genesis block"))?;
        assert_eq!(earliest.number(), 0);

        let pending = fixture.provider_data.block_by_block_spec(&BlockSpec::pending())?;
        assert!(pending.is_none());

        let future = fixture.provider_data.block_by_block_spec(&BlockSpec::Number(10));
        assert!(matches!(
            future,
            Err(ProviderError::InvalidBlockNumberOrHash { .. })
        ));

        Ok(())
    }

    #[test]
    fn safe_tag_before_merge() -> anyhow::Result<()> {
        let mut config = create_test_config();
        config.hardfork = Hardfork::London;
        let fixture = ProviderTestFixture::with_config(config)?;

        let result = fixture
            .provider_data
            .block_by_block_spec(&BlockSpec::Tag(BlockTag::Safe));
        assert!(matches!(result, Err(ProviderError::InvalidBlockTag { .. })));

        Ok(())
    }

    #[test]
    fn mine_and_commit_block_empty() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let previous_block_number = fixture.provider_data.last_block_number();
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;

        assert!(block.transactions.is_empty());
        assert_eq!(fixture.provider_data.last_block_number(), previous_block_number + 1);

        Ok(())
    }

    #[test]
    fn mine_and_commit_block_single_transaction() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let transaction = fixture.signed_dummy_transaction(0)?;
        let receiver = Address::repeat_byte(0x01);
        let value = transaction.value();

        fixture.provider_data.send_transaction(transaction)?;
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert_eq!(block.transactions.len(), 1);

        let balance = fixture.provider_data.balance(receiver, None)?;
        assert_eq!(balance, value);

        assert_eq!(fixture.provider_data.pending_transactions().count(), 0);

        Ok(())
    }

    #[test]
    fn mine_and_commit_blocks_with_interval() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let blocks = fixture.provider_data.mine_and_commit_blocks(3, 10)?;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].header.timestamp, blocks[0].header.timestamp + 10);
        assert_eq!(blocks[2].header.timestamp, blocks[1].header.timestamp + 10);
        assert_eq!(fixture.provider_data.last_block_number(), 3);

        Ok(())
    }

    #[test]
    fn timestamps_strictly_increase() -> anyhow::Result<()> {
        let timer = MockTime::with_seconds(1_700_000_000);
        let mut config = create_test_config();
        config.initial_date = None;
        let mut fixture = ProviderTestFixture::with_config_and_timer(config, timer)?;

        let genesis_timestamp = fixture.provider_data.last_block().header.timestamp;

        // The clock doesn't move, so blocks are one second apart
        let first = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        let second = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;

        assert_eq!(first.header.timestamp, genesis_timestamp + 1);
        assert_eq!(second.header.timestamp, genesis_timestamp + 2);

        Ok(())
    }

    #[test]
    fn next_block_timestamp_and_increase_time() -> anyhow::Result<()> {
        let timer = MockTime::with_seconds(1_700_000_000);
        let mut config = create_test_config();
        config.initial_date = None;
        let mut fixture = ProviderTestFixture::with_config_and_timer(config, timer.clone())?;

        fixture.provider_data.set_next_block_timestamp(1_700_001_000)?;
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert_eq!(block.header.timestamp, 1_700_001_000);

        // The explicit timestamp only applies once, but its offset persists
        timer.add_seconds(5);
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert_eq!(block.header.timestamp, 1_700_001_005);

        fixture.provider_data.increase_block_time(100);
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert_eq!(block.header.timestamp, 1_700_001_105);

        let error = fixture
            .provider_data
            .set_next_block_timestamp(1_700_000_000)
            .unwrap_err();
        assert!(matches!(
            error,
            ProviderError::TimestampLowerThanPrevious { .. }
        ));

        let error = fixture
            .provider_data
            .set_next_block_timestamp(1_700_001_105)
            .unwrap_err();
        assert!(matches!(error, ProviderError::TimestampEqualsPrevious { .. }));

        Ok(())
    }

    #[test]
    fn snapshots_restore_chain_and_state() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        let account = fixture.first_account();

        let snapshot_id = fixture.provider_data.make_snapshot()?;
        assert_eq!(snapshot_id, 1);

        fixture.provider_data.set_balance(account, U256::from(1))?;
        fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        let later_snapshot_id = fixture.provider_data.make_snapshot()?;
        assert_eq!(later_snapshot_id, 2);

        assert!(fixture.provider_data.revert_to_snapshot(snapshot_id)?);
        assert_eq!(fixture.provider_data.last_block_number(), 0);
        assert_eq!(
            fixture.provider_data.balance(account, None)?,
            U256::from(ONE_ETHER) * U256::from(1000)
        );

        // Later snapshots are discarded and snapshots can only be used once
        assert!(!fixture.provider_data.revert_to_snapshot(later_snapshot_id)?);
        assert!(!fixture.provider_data.revert_to_snapshot(snapshot_id)?);

        Ok(())
    }

    #[test]
    fn drop_transaction() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let pending = fixture.signed_dummy_transaction(0)?;
        let pending_hash = *pending.hash();
        fixture.provider_data.send_transaction(pending)?;

        assert!(fixture.provider_data.remove_pending_transaction(&pending_hash)?);
        assert!(!fixture.provider_data.remove_pending_transaction(&pending_hash)?);

        let mined = fixture.signed_dummy_transaction(0)?;
        let mined_hash = *mined.hash();
        fixture.provider_data.set_auto_mining(true);
        fixture.provider_data.send_transaction(mined)?;

        let error = fixture
            .provider_data
            .remove_pending_transaction(&mined_hash)
            .unwrap_err();
        assert!(matches!(error, ProviderError::InvalidDropTransactionHash(_)));

        Ok(())
    }

    #[test]
    fn transaction_below_intrinsic_gas_is_rejected() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let mut request = fixture.dummy_request(0);
        if let Request::Eip1559(eip1559) = &mut request {
            eip1559.gas_limit = 20_000;
        }
        let transaction = fixture
            .provider_data
            .sign_transaction_request(request, fixture.first_account())?;

        for auto_mining in [false, true] {
            fixture.provider_data.set_auto_mining(auto_mining);

            let error = fixture
                .provider_data
                .send_transaction(transaction.clone())
                .unwrap_err();
            assert!(matches!(
                error,
                ProviderError::InvalidInput(message)
                    if message == "Transaction requires at least 21000 gas but got 20000"
            ));
        }

        assert_eq!(fixture.provider_data.pending_transactions().count(), 0);

        // Mining is unaffected by the rejected transaction
        let block = fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert!(block.transactions.is_empty());
        assert_eq!(fixture.provider_data.last_block_number(), 1);

        Ok(())
    }

    #[test]
    fn set_nonce_rules() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        let account = fixture.first_account();

        fixture.provider_data.set_nonce(account, 5)?;
        assert_eq!(fixture.provider_data.get_transaction_count(account, None)?, 5);

        let error = fixture.provider_data.set_nonce(account, 4).unwrap_err();
        assert!(matches!(
            error,
            ProviderError::SetAccountNonceLowerThanCurrent {
                previous: 5,
                proposed: 4
            }
        ));

        fixture.provider_data.set_auto_mining(false);
        let transaction = fixture.signed_dummy_transaction(5)?;
        fixture.provider_data.send_transaction(transaction)?;

        let error = fixture.provider_data.set_nonce(account, 10).unwrap_err();
        assert!(matches!(
            error,
            ProviderError::SetAccountNonceWithPendingTransactions
        ));

        Ok(())
    }

    #[test]
    fn fee_policies_are_exclusive() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        assert!(matches!(
            fixture.provider_data.set_min_gas_price(1),
            Err(ProviderError::SetMinGasPriceUnsupported)
        ));
        fixture.provider_data.set_next_block_base_fee_per_gas(7)?;
        assert_eq!(fixture.provider_data.next_block_base_fee_per_gas(), Some(7));

        let mut config = create_test_config();
        config.hardfork = Hardfork::Berlin;
        config.initial_base_fee_per_gas = None;
        let mut fixture = ProviderTestFixture::with_config(config)?;
        fixture.provider_data.set_min_gas_price(1)?;
        assert!(matches!(
            fixture.provider_data.set_next_block_base_fee_per_gas(7),
            Err(ProviderError::SetNextBlockBaseFeePerGasUnsupported { .. })
        ));

        Ok(())
    }

    #[test]
    fn historical_balance() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        let account = fixture.first_account();

        fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        fixture.provider_data.set_balance(account, U256::from(10))?;
        fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;

        let historical = fixture
            .provider_data
            .balance(account, Some(&BlockSpec::Number(1)))?;
        assert_eq!(historical, U256::from(ONE_ETHER) * U256::from(1000));

        let latest = fixture.provider_data.balance(account, None)?;
        assert_eq!(latest, U256::from(10));

        Ok(())
    }

    #[test]
    fn estimate_gas_of_transfer() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.impersonated_dummy_transaction(0);
        let estimation = fixture
            .provider_data
            .estimate_gas(transaction, &BlockSpec::pending())?;

        assert_eq!(estimation, 21_001);

        Ok(())
    }

    #[test]
    fn debug_trace_mined_transaction() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.signed_dummy_transaction(0)?;
        let result = fixture.provider_data.send_transaction(transaction)?;

        let trace = fixture
            .provider_data
            .debug_trace_transaction(&result.transaction_hash)?;
        assert!(!trace.failed);
        assert_eq!(trace.gas, 21_000);
        assert!(trace.struct_logs.is_empty());

        let error = fixture
            .provider_data
            .debug_trace_transaction(&B256::repeat_byte(0x01))
            .unwrap_err();
        assert!(matches!(error, ProviderError::InvalidTransactionHash(_)));

        Ok(())
    }

    #[test]
    fn reset_restores_initial_state() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;
        assert_eq!(fixture.provider_data.last_block_number(), 1);

        fixture.provider_data.reset(None)?;
        assert_eq!(fixture.provider_data.last_block_number(), 0);

        Ok(())
    }

    #[test]
    fn fee_history_spans_fork_block() -> anyhow::Result<()> {
        let remote = in_memory_remote_node(
            InMemoryBlocks::new(1, 120),
            Arc::new(InMemoryRemote::new(120, 100)),
        );
        let mut fixture = ProviderTestFixture::new_forked(remote, 100)?;
        fixture
            .provider_data
            .mine_and_commit_block(BlockOptions::default())?;

        let result = fixture
            .provider_data
            .fee_history(4, &BlockSpec::latest(), None)?;

        assert_eq!(result.oldest_block, 98);
        // Blocks 98 to 101 and the pending block
        assert_eq!(result.base_fee_per_gas.len(), 5);
        assert_eq!(result.base_fee_per_gas[..3], [IN_MEMORY_BASE_FEE; 3]);
        assert_eq!(result.gas_used_ratio.len(), 4);
        assert!(result.reward.is_none());

        Ok(())
    }

    #[test]
    fn fork_block_newer_than_latest_is_rejected() {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime");

        let remote = in_memory_remote_node(
            InMemoryBlocks::new(1, 50),
            Arc::new(InMemoryRemote::new(50, 50)),
        );
        let result = ProviderData::with_remote(
            runtime.handle().clone(),
            Arc::new(TransferExecutor),
            Box::new(NoopLogger),
            create_test_config_with_fork(Some(in_memory_fork_config(100))),
            CurrentTime,
            remote,
        );

        assert!(matches!(
            result,
            Err(CreationError::InvalidBlockNumber {
                fork_block_number: 100,
                latest_block_number: 50,
            })
        ));
    }
}
