use std::{num::NonZeroU64, sync::Arc};

use edr_chain_config::Hardfork;
use edr_eth::{block::RemoteBlock, fee_history::FeeHistoryResult};
use edr_evm::TransferExecutor;
use edr_primitives::{keccak256, Address, HashMap, TxKind, B256, ONE_ETHER, U256};
use edr_rpc_client::RpcClientError;
use edr_state_remote::InMemoryRemote;
use edr_test_utils::secret_key::{secret_key_from_str, DEFAULT_SECRET_KEY, SECOND_SECRET_KEY};
use edr_transaction::{request, AccessList, Request, Signed};
use tokio::runtime;

use crate::{
    blockchain::{RemoteBlockSource, RemoteNode},
    config::{AccountOverride, ForkConfig, MiningConfig, ProviderConfig},
    data::ProviderData,
    logger::NoopLogger,
    time::{CurrentTime, TimeSinceEpoch},
};

/// The default chain ID of test providers.
pub const TEST_CHAIN_ID: u64 = 123;

/// Base fee of every block of an [`InMemoryBlocks`] chain.
pub const IN_MEMORY_BASE_FEE: u128 = 1_000_000_000;

const IN_MEMORY_GENESIS_TIMESTAMP: u64 = 1_438_269_973;

/// One ether in wei.
pub fn one_ether() -> U256 {
    U256::from(ONE_ETHER)
}

/// Constructs a test config with two owned accounts with 1000 ether each.
pub fn create_test_config() -> ProviderConfig {
    create_test_config_with_fork(None)
}

/// Constructs a test config with two owned accounts with 1000 ether each,
/// forking the provided remote chain.
pub fn create_test_config_with_fork(fork: Option<ForkConfig>) -> ProviderConfig {
    let owned_accounts = [DEFAULT_SECRET_KEY, SECOND_SECRET_KEY]
        .into_iter()
        .map(|secret_key| secret_key_from_str(secret_key).expect("valid secret key"))
        .collect::<Vec<_>>();

    let genesis_state = owned_accounts
        .iter()
        .map(|secret_key| {
            (
                edr_signer::secret_key_to_address(secret_key),
                AccountOverride {
                    balance: Some(one_ether() * U256::from(1000)),
                    ..AccountOverride::default()
                },
            )
        })
        .collect::<HashMap<_, _>>();

    ProviderConfig {
        allow_blocks_with_same_timestamp: false,
        allow_unlimited_contract_size: false,
        block_gas_limit: NonZeroU64::new(30_000_000).expect("non-zero"),
        chain_id: TEST_CHAIN_ID,
        chains: HashMap::default(),
        coinbase: Address::repeat_byte(0xc0),
        fork,
        genesis_state,
        hardfork: Hardfork::default(),
        initial_base_fee_per_gas: Some(1_000_000_000),
        initial_date: None,
        min_gas_price: 0,
        mining: MiningConfig::default(),
        network_id: TEST_CHAIN_ID,
        owned_accounts,
    }
}

/// A node running on its own runtime, with helpers to construct
/// transactions.
pub struct ProviderTestFixture<TimerT: TimeSinceEpoch = CurrentTime> {
    _runtime: runtime::Runtime,
    /// The node under test
    pub provider_data: ProviderData<TimerT>,
}

impl ProviderTestFixture<CurrentTime> {
    /// Constructs a local node with the test config.
    pub fn new_local() -> anyhow::Result<Self> {
        Self::with_config(create_test_config())
    }

    /// Constructs a node with the provided config.
    pub fn with_config(config: ProviderConfig) -> anyhow::Result<Self> {
        Self::with_config_and_timer(config, CurrentTime)
    }

    /// Constructs a node with the test config that forks the provided remote
    /// node at `fork_block_number`.
    pub fn new_forked(remote: RemoteNode, fork_block_number: u64) -> anyhow::Result<Self> {
        let runtime = test_runtime()?;

        let provider_data = ProviderData::with_remote(
            runtime.handle().clone(),
            Arc::new(TransferExecutor),
            Box::new(NoopLogger),
            create_test_config_with_fork(Some(in_memory_fork_config(fork_block_number))),
            CurrentTime,
            remote,
        )?;

        Ok(Self {
            _runtime: runtime,
            provider_data,
        })
    }
}

impl<TimerT: TimeSinceEpoch> ProviderTestFixture<TimerT> {
    /// Constructs a node with the provided config and clock.
    pub fn with_config_and_timer(config: ProviderConfig, timer: TimerT) -> anyhow::Result<Self> {
        let runtime = test_runtime()?;

        let provider_data = ProviderData::new(
            runtime.handle().clone(),
            Arc::new(TransferExecutor),
            Box::new(NoopLogger),
            config,
            timer,
        )?;

        Ok(Self {
            _runtime: runtime,
            provider_data,
        })
    }

    /// The first owned account.
    pub fn first_account(&self) -> Address {
        self.provider_data.default_caller()
    }

    /// A value transfer of 1 wei from the first owned account.
    pub fn dummy_request(&self, nonce: u64) -> Request {
        Request::Eip1559(request::Eip1559 {
            chain_id: self.provider_data.chain_id(),
            nonce,
            max_priority_fee_per_gas: 1_000,
            max_fee_per_gas: 100_000_000_000,
            gas_limit: 21_000,
            kind: TxKind::Call(Address::repeat_byte(0x01)),
            value: U256::from(1),
            input: Default::default(),
            access_list: AccessList::default(),
        })
    }

    /// A signed value transfer from the first owned account.
    pub fn signed_dummy_transaction(&self, nonce: u64) -> anyhow::Result<Signed> {
        let transaction = self
            .provider_data
            .sign_transaction_request(self.dummy_request(nonce), self.first_account())?;

        Ok(transaction)
    }

    /// A fake-signed value transfer from the first owned account.
    pub fn impersonated_dummy_transaction(&self, nonce: u64) -> Signed {
        self.dummy_request(nonce).fake_sign(self.first_account())
    }
}

fn test_runtime() -> std::io::Result<runtime::Runtime> {
    runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("provider-test-fixture")
        .build()
}

/// A fork config for a remote node that is injected rather than dialled.
pub fn in_memory_fork_config(fork_block_number: u64) -> ForkConfig {
    ForkConfig {
        url: "in-memory".to_owned(),
        block_number: Some(fork_block_number),
        http_headers: None,
    }
}

/// Constructs a remote node that serves empty blocks from `blocks` and
/// account data from `state`.
pub fn in_memory_remote_node(blocks: InMemoryBlocks, state: Arc<InMemoryRemote>) -> RemoteNode {
    RemoteNode {
        blocks: Arc::new(blocks),
        state,
    }
}

/// A remote chain of empty blocks up to `latest_block_number`, derived from
/// the block number.
#[derive(Debug)]
pub struct InMemoryBlocks {
    chain_id: u64,
    latest_block_number: u64,
}

impl InMemoryBlocks {
    /// Constructs a new instance.
    pub fn new(chain_id: u64, latest_block_number: u64) -> Self {
        Self {
            chain_id,
            latest_block_number,
        }
    }

    /// The block with the provided number, if it is not newer than the latest
    /// block.
    pub fn block(&self, number: u64) -> Option<RemoteBlock> {
        (number <= self.latest_block_number).then(|| RemoteBlock {
            number,
            hash: block_hash(number),
            parent_hash: number.checked_sub(1).map_or(B256::ZERO, block_hash),
            state_root: keccak256([b"state".as_slice(), &number.to_be_bytes()].concat()),
            miner: Address::ZERO,
            timestamp: IN_MEMORY_GENESIS_TIMESTAMP + number * 12,
            gas_limit: 30_000_000,
            gas_used: 0,
            base_fee_per_gas: Some(IN_MEMORY_BASE_FEE),
            transactions: Vec::new(),
        })
    }
}

fn block_hash(number: u64) -> B256 {
    keccak256(number.to_be_bytes())
}

impl RemoteBlockSource for InMemoryBlocks {
    fn chain_id(&self) -> Result<u64, RpcClientError> {
        Ok(self.chain_id)
    }

    fn latest_block_number(&self) -> Result<u64, RpcClientError> {
        Ok(self.latest_block_number)
    }

    fn block_by_number(&self, number: u64) -> Result<Option<RemoteBlock>, RpcClientError> {
        Ok(self.block(number))
    }

    fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryResult, RpcClientError> {
        let newest_block = newest_block.min(self.latest_block_number);
        let oldest_block = (newest_block + 1).saturating_sub(block_count);
        let block_count = usize::try_from(newest_block + 1 - oldest_block).unwrap_or_default();

        let reward = (!reward_percentiles.is_empty())
            .then(|| vec![vec![U256::ZERO; reward_percentiles.len()]; block_count]);

        Ok(FeeHistoryResult {
            oldest_block,
            // Includes the block after the newest one
            base_fee_per_gas: vec![IN_MEMORY_BASE_FEE; block_count + 1],
            gas_used_ratio: vec![0.0; block_count],
            reward,
        })
    }
}
