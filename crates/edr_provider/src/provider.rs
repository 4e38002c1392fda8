use std::sync::Arc;

use edr_evm::Executor;
use parking_lot::Mutex;
use tokio::{runtime, sync::Mutex as AsyncMutex, task};

use crate::{
    blockchain::RemoteNode,
    data::ProviderData,
    error::{CreationError, ProviderError},
    interval::IntervalMiner,
    logger::SyncLogger,
    requests::{
        debug,
        eth::{self, handle_set_interval_mining},
        hardhat, MethodInvocation, ProviderRequest,
    },
    time::{CurrentTime, TimeSinceEpoch},
    to_json, IntervalConfig, ProviderConfig, PRIVATE_RPC_METHODS,
};

/// Blocking JSON-RPC front of a development node.
///
/// The JSON-RPC envelope (`jsonrpc`, `id`) is left to the caller, which
/// parses the rest of the request into a [`ProviderRequest`] and turns the
/// returned [`ProviderError`] into a JSON-RPC error object.
pub struct Provider<TimerT: TimeSinceEpoch = CurrentTime> {
    data: Arc<AsyncMutex<ProviderData<TimerT>>>,
    /// Competes with requests for the data lock, so it stops itself while
    /// waiting for the lock when it is dropped.
    interval_miner: Arc<Mutex<Option<IntervalMiner>>>,
    runtime: runtime::Handle,
}

impl<TimerT: TimeSinceEpoch> Provider<TimerT> {
    /// Constructs a new instance, starting the interval miner if the config
    /// enables it.
    pub fn new(
        runtime: runtime::Handle,
        executor: Arc<dyn Executor>,
        logger: Box<dyn SyncLogger>,
        config: ProviderConfig,
        timer: TimerT,
    ) -> Result<Self, CreationError> {
        let interval_config = config.mining.interval.clone();
        let data = ProviderData::new(runtime.clone(), executor, logger, config, timer)?;

        Ok(Self::with_data(runtime, data, interval_config))
    }

    /// Constructs an instance that forks the provided remote node instead of
    /// connecting to the URL of the fork config.
    pub fn with_remote(
        runtime: runtime::Handle,
        executor: Arc<dyn Executor>,
        logger: Box<dyn SyncLogger>,
        config: ProviderConfig,
        timer: TimerT,
        remote: RemoteNode,
    ) -> Result<Self, CreationError> {
        let interval_config = config.mining.interval.clone();
        let data =
            ProviderData::with_remote(runtime.clone(), executor, logger, config, timer, remote)?;

        Ok(Self::with_data(runtime, data, interval_config))
    }

    fn with_data(
        runtime: runtime::Handle,
        data: ProviderData<TimerT>,
        interval_config: Option<IntervalConfig>,
    ) -> Self {
        let data = Arc::new(AsyncMutex::new(data));

        let interval_miner = interval_config
            .map(|config| IntervalMiner::new(runtime.clone(), config, data.clone()));

        let interval_miner = Arc::new(Mutex::new(interval_miner));

        Self {
            data,
            interval_miner,
            runtime,
        }
    }

    /// Prints the console log of a request that could not be parsed, e.g.
    /// because its method is unknown.
    pub fn log_failed_deserialization(
        &self,
        method_name: &str,
        error: &ProviderError,
    ) -> Result<(), ProviderError> {
        let mut data = task::block_in_place(|| self.runtime.block_on(self.data.lock()));
        data.logger_mut()
            .print_method_logs(method_name, Some(error))
            .map_err(ProviderError::Logger)
    }

    /// Handles a single or batch request, blocking until the node is
    /// available.
    pub fn handle_request(
        &self,
        request: ProviderRequest,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut data = task::block_in_place(|| self.runtime.block_on(self.data.lock()));

        match request {
            ProviderRequest::Single(request) => self.handle_single_request(&mut data, *request),
            ProviderRequest::Batch(requests) => self.handle_batch_request(&mut data, requests),
        }
    }

    /// Handles the requests of a batch in order, stopping at the first
    /// failure.
    fn handle_batch_request(
        &self,
        data: &mut ProviderData<TimerT>,
        requests: Vec<MethodInvocation>,
    ) -> Result<serde_json::Value, ProviderError> {
        let results = requests
            .into_iter()
            .map(|request| self.handle_single_request(data, request))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(serde_json::Value::Array(results))
    }

    fn handle_single_request(
        &self,
        data: &mut ProviderData<TimerT>,
        request: MethodInvocation,
    ) -> Result<serde_json::Value, ProviderError> {
        let method_name = request.method_name();
        let logged_method = (data.logger_mut().is_enabled()
            && !PRIVATE_RPC_METHODS.contains(&method_name))
        .then_some(method_name);

        log::trace!("Handling request: {method_name}");

        let result = match request {
            // eth_* method
            MethodInvocation::Accounts(()) => eth::handle_accounts_request(data).and_then(to_json),
            MethodInvocation::BlockNumber(()) => {
                eth::handle_block_number_request(data).and_then(to_json)
            }
            MethodInvocation::Call(request, block_spec) => {
                eth::handle_call_request(data, request, block_spec).and_then(to_json)
            }
            MethodInvocation::ChainId(()) => eth::handle_chain_id_request(data).and_then(to_json),
            MethodInvocation::Coinbase(()) => eth::handle_coinbase_request(data).and_then(to_json),
            MethodInvocation::EstimateGas(call_request, block_spec) => {
                eth::handle_estimate_gas(data, call_request, block_spec).and_then(to_json)
            }
            MethodInvocation::FeeHistory(block_count, newest_block, reward_percentiles) => {
                eth::handle_fee_history(data, block_count, newest_block, reward_percentiles)
                    .and_then(to_json)
            }
            MethodInvocation::GasPrice(()) => eth::handle_gas_price(data).and_then(to_json),
            MethodInvocation::GetBalance(address, block_spec) => {
                eth::handle_get_balance_request(data, address, block_spec).and_then(to_json)
            }
            MethodInvocation::GetBlockByNumber(block_spec, transaction_detail_flag) => {
                eth::handle_get_block_by_number_request(data, block_spec, transaction_detail_flag)
                    .and_then(to_json)
            }
            MethodInvocation::GetCode(address, block_spec) => {
                eth::handle_get_code_request(data, address, block_spec).and_then(to_json)
            }
            MethodInvocation::GetStorageAt(address, index, block_spec) => {
                eth::handle_get_storage_at_request(data, address, index, block_spec)
                    .and_then(to_json)
            }
            MethodInvocation::GetTransactionByHash(transaction_hash) => {
                eth::handle_get_transaction_by_hash(data, transaction_hash).and_then(to_json)
            }
            MethodInvocation::GetTransactionCount(address, block_spec) => {
                eth::handle_get_transaction_count_request(data, address, block_spec)
                    .and_then(to_json)
            }
            MethodInvocation::GetTransactionReceipt(transaction_hash) => {
                eth::handle_get_transaction_receipt(data, transaction_hash).and_then(to_json)
            }
            MethodInvocation::MaxPriorityFeePerGas(()) => {
                eth::handle_max_priority_fee_per_gas().and_then(to_json)
            }
            MethodInvocation::NetVersion(()) => {
                eth::handle_net_version_request(data).and_then(to_json)
            }
            MethodInvocation::PendingTransactions(()) => {
                eth::handle_pending_transactions(data).and_then(to_json)
            }
            MethodInvocation::SendRawTransaction(raw_transaction) => {
                eth::handle_send_raw_transaction_request(data, raw_transaction).and_then(to_json)
            }
            MethodInvocation::SendTransaction(transaction_request) => {
                eth::handle_send_transaction_request(data, transaction_request).and_then(to_json)
            }

            // evm_* methods
            MethodInvocation::EvmIncreaseTime(increment) => {
                eth::handle_increase_time_request(data, increment).and_then(to_json)
            }
            MethodInvocation::EvmMine(timestamp) => {
                eth::handle_mine_request(data, timestamp).and_then(to_json)
            }
            MethodInvocation::EvmRevert(snapshot_id) => {
                eth::handle_revert_request(data, snapshot_id).and_then(to_json)
            }
            MethodInvocation::EvmSetAutomine(enabled) => {
                eth::handle_set_automine_request(data, enabled).and_then(to_json)
            }
            MethodInvocation::EvmSetBlockGasLimit(gas_limit) => {
                eth::handle_set_block_gas_limit_request(data, gas_limit).and_then(to_json)
            }
            MethodInvocation::EvmSetIntervalMining(config) => handle_set_interval_mining(
                self.data.clone(),
                &mut self.interval_miner.lock(),
                self.runtime.clone(),
                config,
            )
            .and_then(to_json),
            MethodInvocation::EvmSetNextBlockTimestamp(timestamp) => {
                eth::handle_set_next_block_timestamp_request(data, timestamp).and_then(to_json)
            }
            MethodInvocation::EvmSnapshot(()) => eth::handle_snapshot_request(data).and_then(to_json),

            // debug_* methods
            MethodInvocation::DebugTraceTransaction(transaction_hash, config) => {
                debug::handle_debug_trace_transaction(data, transaction_hash, config)
                    .and_then(to_json)
            }

            // hardhat_* methods
            MethodInvocation::DropTransaction(transaction_hash) => {
                hardhat::handle_drop_transaction(data, transaction_hash).and_then(to_json)
            }
            MethodInvocation::GetAutomine(()) => {
                hardhat::handle_get_automine_request(data).and_then(to_json)
            }
            MethodInvocation::ImpersonateAccount(address) => {
                hardhat::handle_impersonate_account_request(data, *address).and_then(to_json)
            }
            MethodInvocation::IntervalMine(()) => {
                hardhat::handle_interval_mine_request(data).and_then(to_json)
            }
            MethodInvocation::Mine(number_of_blocks, interval) => {
                hardhat::handle_mine(data, number_of_blocks, interval).and_then(to_json)
            }
            MethodInvocation::Reset(config) => hardhat::handle_reset(data, config).and_then(to_json),
            MethodInvocation::SetBalance(address, balance) => {
                hardhat::handle_set_balance(data, address, balance).and_then(to_json)
            }
            MethodInvocation::SetCode(address, code) => {
                hardhat::handle_set_code(data, address, code).and_then(to_json)
            }
            MethodInvocation::SetCoinbase(coinbase) => {
                hardhat::handle_set_coinbase_request(data, *coinbase).and_then(to_json)
            }
            MethodInvocation::SetLoggingEnabled(is_enabled) => {
                hardhat::handle_set_logging_enabled_request(data, is_enabled).and_then(to_json)
            }
            MethodInvocation::SetMinGasPrice(min_gas_price) => {
                hardhat::handle_set_min_gas_price(data, min_gas_price).and_then(to_json)
            }
            MethodInvocation::SetNextBlockBaseFeePerGas(base_fee_per_gas) => {
                hardhat::handle_set_next_block_base_fee_per_gas_request(data, base_fee_per_gas)
                    .and_then(to_json)
            }
            MethodInvocation::SetNonce(address, nonce) => {
                hardhat::handle_set_nonce(data, address, nonce).and_then(to_json)
            }
            MethodInvocation::SetStorageAt(address, index, value) => {
                hardhat::handle_set_storage_at(data, address, index, value).and_then(to_json)
            }
            MethodInvocation::StopImpersonatingAccount(address) => {
                hardhat::handle_stop_impersonating_account_request(data, *address)
                    .and_then(to_json)
            }
        };

        if let Some(method_name) = logged_method {
            data.logger_mut()
                .print_method_logs(method_name, result.as_ref().err())
                .map_err(ProviderError::Logger)?;
        }

        result
    }
}
