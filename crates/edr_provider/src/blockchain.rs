use std::{fmt::Debug, sync::Arc};

use edr_block_header::{BlockConfig, BlockHeader};
use edr_block_miner::{ExecutedTransaction, LocalBlock};
use edr_chain_config::{
    chains::l1_chain_config, resolve_hardfork, ChainConfig, Hardfork, HardforkActivations,
    ResolveHardforkArgs,
};
use edr_eip1559::BaseFeeParams;
use edr_eth::{block::RemoteBlock, fee_history::FeeHistoryResult, BlockSpec};
use edr_evm::config::BlockEnv;
use edr_primitives::{HashMap, B256, U256};
use edr_rpc_client::{RpcClient, RpcClientError};
use edr_state_remote::{RemoteSource, RemoteState};
use parking_lot::Mutex;
use tokio::runtime;

use crate::ProviderError;

/// A block of the chain, either mined locally or fetched from the remote
/// node that the provider forked.
#[derive(Clone, Debug)]
pub enum ChainBlock {
    /// Mined locally, or the genesis block
    Local(Arc<LocalBlock>),
    /// A block up to and including the fork block
    Remote(Arc<RemoteBlock>),
}

impl ChainBlock {
    /// The block's number.
    pub fn number(&self) -> u64 {
        match self {
            ChainBlock::Local(block) => block.header.number,
            ChainBlock::Remote(block) => block.number,
        }
    }

    /// The block's hash.
    pub fn hash(&self) -> B256 {
        match self {
            ChainBlock::Local(block) => block.hash,
            ChainBlock::Remote(block) => block.hash,
        }
    }

    /// The block's timestamp.
    pub fn timestamp(&self) -> u64 {
        match self {
            ChainBlock::Local(block) => block.header.timestamp,
            ChainBlock::Remote(block) => block.timestamp,
        }
    }

    /// The state root after executing the block.
    pub fn state_root(&self) -> B256 {
        match self {
            ChainBlock::Local(block) => block.header.state_root,
            ChainBlock::Remote(block) => block.state_root,
        }
    }

    /// The block's gas limit.
    pub fn gas_limit(&self) -> u64 {
        match self {
            ChainBlock::Local(block) => block.header.gas_limit,
            ChainBlock::Remote(block) => block.gas_limit,
        }
    }

    /// The gas used by the block's transactions.
    pub fn gas_used(&self) -> u64 {
        match self {
            ChainBlock::Local(block) => block.header.gas_used,
            ChainBlock::Remote(block) => block.gas_used,
        }
    }

    /// The block's base fee, after EIP-1559 activated.
    pub fn base_fee_per_gas(&self) -> Option<u128> {
        match self {
            ChainBlock::Local(block) => block.header.base_fee_per_gas,
            ChainBlock::Remote(block) => block.base_fee_per_gas,
        }
    }

    /// The execution context of a transaction in this block.
    pub fn block_env(&self, hardfork: Hardfork) -> BlockEnv {
        match self {
            ChainBlock::Local(block) => {
                let header = &block.header;
                BlockEnv {
                    number: header.number,
                    beneficiary: header.beneficiary,
                    timestamp: header.timestamp,
                    gas_limit: header.gas_limit,
                    base_fee: header.base_fee_per_gas,
                    difficulty: header.difficulty,
                    prevrandao: (hardfork >= Hardfork::Merge).then_some(header.mix_hash),
                }
            }
            ChainBlock::Remote(block) => BlockEnv {
                number: block.number,
                beneficiary: block.miner,
                timestamp: block.timestamp,
                gas_limit: block.gas_limit,
                base_fee: block.base_fee_per_gas,
                difficulty: U256::ZERO,
                prevrandao: (hardfork >= Hardfork::Merge).then_some(B256::ZERO),
            },
        }
    }
}

/// A source of the blocks of a remote chain.
pub trait RemoteBlockSource: Debug + Send + Sync {
    /// The chain ID of the remote chain.
    fn chain_id(&self) -> Result<u64, RpcClientError>;

    /// The number of the remote chain's latest block.
    fn latest_block_number(&self) -> Result<u64, RpcClientError>;

    /// Retrieves the block with the provided number, if it exists.
    fn block_by_number(&self, number: u64) -> Result<Option<RemoteBlock>, RpcClientError>;

    /// Retrieves the fee history of blocks up to and including
    /// `newest_block`.
    fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryResult, RpcClientError>;
}

/// A [`RemoteBlockSource`] backed by a JSON-RPC client.
///
/// Requests block the current thread, so it must be used from a
/// multi-threaded `tokio` runtime.
#[derive(Debug)]
pub struct RpcBlockSource {
    client: Arc<RpcClient>,
    runtime: runtime::Handle,
}

impl RpcBlockSource {
    /// Constructs a new instance.
    pub fn new(client: Arc<RpcClient>, runtime: runtime::Handle) -> Self {
        Self { client, runtime }
    }

    fn block_on<FutureT: Future>(&self, future: FutureT) -> FutureT::Output {
        tokio::task::block_in_place(move || self.runtime.block_on(future))
    }
}

impl RemoteBlockSource for RpcBlockSource {
    fn chain_id(&self) -> Result<u64, RpcClientError> {
        self.block_on(self.client.chain_id())
    }

    fn latest_block_number(&self) -> Result<u64, RpcClientError> {
        self.block_on(self.client.block_number())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn block_by_number(&self, number: u64) -> Result<Option<RemoteBlock>, RpcClientError> {
        self.block_on(self.client.get_block_by_number(BlockSpec::Number(number)))
    }

    fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryResult, RpcClientError> {
        self.block_on(self.client.fee_history(
            block_count,
            BlockSpec::Number(newest_block),
            reward_percentiles,
        ))
    }
}

/// The remote node that a provider forks: its blocks and its state.
#[derive(Clone, Debug)]
pub struct RemoteNode {
    /// Blocks up to and including the fork block
    pub blocks: Arc<dyn RemoteBlockSource>,
    /// Account and storage data of historical blocks
    pub state: Arc<dyn RemoteSource>,
}

impl RemoteNode {
    /// Constructs a remote node that is queried over JSON-RPC.
    pub fn from_rpc_client(client: Arc<RpcClient>, runtime: runtime::Handle) -> Self {
        Self {
            blocks: Arc::new(RpcBlockSource::new(client.clone(), runtime.clone())),
            state: Arc::new(RemoteState::new(runtime, client)),
        }
    }
}

/// The remote chain that the provider forked.
#[derive(Debug)]
pub struct RemoteChain {
    source: Arc<dyn RemoteBlockSource>,
    chain_id: u64,
    fork_block: Arc<RemoteBlock>,
    blocks: Mutex<HashMap<u64, Arc<RemoteBlock>>>,
}

impl RemoteChain {
    /// Constructs a new instance. `fork_block` is cached as the first block.
    pub fn new(source: Arc<dyn RemoteBlockSource>, chain_id: u64, fork_block: RemoteBlock) -> Self {
        let fork_block = Arc::new(fork_block);

        let mut blocks = HashMap::default();
        blocks.insert(fork_block.number, fork_block.clone());

        Self {
            source,
            chain_id,
            fork_block,
            blocks: Mutex::new(blocks),
        }
    }

    /// The chain ID of the remote chain.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The number of the forked block.
    pub fn fork_block_number(&self) -> u64 {
        self.fork_block.number
    }

    /// The forked block.
    pub fn fork_block(&self) -> &Arc<RemoteBlock> {
        &self.fork_block
    }

    /// Retrieves a block, which must not be newer than the fork block.
    pub fn block_by_number(&self, number: u64) -> Result<Option<Arc<RemoteBlock>>, ProviderError> {
        if let Some(block) = self.blocks.lock().get(&number) {
            return Ok(Some(block.clone()));
        }

        let block = self.source.block_by_number(number)?;
        Ok(block.map(|block| {
            let block = Arc::new(block);
            self.blocks.lock().insert(number, block.clone());
            block
        }))
    }

    /// Retrieves the fee history of blocks up to and including
    /// `newest_block`.
    pub fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryResult, ProviderError> {
        Ok(self
            .source
            .fee_history(block_count, newest_block, reward_percentiles)?)
    }
}

/// A mined transaction together with its block.
#[derive(Clone, Debug)]
pub struct MinedTransaction {
    /// The block containing the transaction
    pub block: Arc<LocalBlock>,
    /// The index of the transaction in the block
    pub index: usize,
}

impl MinedTransaction {
    /// The executed transaction.
    pub fn executed(&self) -> &ExecutedTransaction {
        &self.block.transactions[self.index]
    }
}

/// The chain of blocks of the provider.
///
/// Locally mined blocks follow either a locally generated genesis block or
/// the fork block. Blocks up to and including the fork block are served by
/// the remote node.
#[derive(Debug)]
pub struct Blockchain {
    chain_id: u64,
    hardfork: Hardfork,
    base_fee_params: BaseFeeParams,
    chains: HashMap<u64, ChainConfig>,
    /// The first entry is the genesis or fork block.
    blocks: Vec<Arc<LocalBlock>>,
    block_numbers_by_hash: HashMap<B256, u64>,
    transaction_locations: HashMap<B256, (u64, usize)>,
    remote: Option<RemoteChain>,
}

impl Blockchain {
    /// Constructs a local chain starting at the provided genesis block.
    pub fn with_genesis(
        genesis: LocalBlock,
        chain_id: u64,
        hardfork: Hardfork,
        chains: HashMap<u64, ChainConfig>,
    ) -> Self {
        let base_fee_params = base_fee_params(&chains, chain_id);

        let mut blockchain = Self {
            chain_id,
            hardfork,
            base_fee_params,
            chains,
            blocks: Vec::new(),
            block_numbers_by_hash: HashMap::default(),
            transaction_locations: HashMap::default(),
            remote: None,
        };
        blockchain.push(genesis);

        blockchain
    }

    /// Constructs a chain that continues the remote chain after its fork
    /// block.
    pub fn forked(
        remote: RemoteChain,
        chain_id: u64,
        hardfork: Hardfork,
        chains: HashMap<u64, ChainConfig>,
    ) -> Self {
        let base_fee_params = base_fee_params(&chains, remote.chain_id());
        let fork_block = header_from_remote(remote.fork_block());

        Self {
            chain_id,
            hardfork,
            base_fee_params,
            chains,
            blocks: vec![Arc::new(fork_block)],
            block_numbers_by_hash: HashMap::default(),
            transaction_locations: HashMap::default(),
            remote: Some(remote),
        }
    }

    /// The chain ID of locally mined blocks.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The hardfork of locally mined blocks.
    pub fn hardfork(&self) -> Hardfork {
        self.hardfork
    }

    /// The configuration used to derive the headers of new blocks.
    pub fn block_config(&self) -> BlockConfig {
        BlockConfig {
            base_fee_params: self.base_fee_params,
            hardfork: self.hardfork,
        }
    }

    /// The remote chain, in fork mode.
    pub fn remote(&self) -> Option<&RemoteChain> {
        self.remote.as_ref()
    }

    /// The number of the fork block, in fork mode.
    pub fn fork_block_number(&self) -> Option<u64> {
        self.remote.as_ref().map(RemoteChain::fork_block_number)
    }

    /// The latest block. In fork mode, before any block is mined, this is a
    /// local copy of the fork block's header.
    pub fn last_block(&self) -> &Arc<LocalBlock> {
        // Constructors always push the genesis or fork block
        &self.blocks[self.blocks.len() - 1]
    }

    /// The number of the latest block.
    pub fn last_block_number(&self) -> u64 {
        self.last_block().header.number
    }

    /// The number of the first block kept locally.
    fn first_local_block_number(&self) -> u64 {
        self.blocks[0].header.number
    }

    /// Retrieves the block with the provided number, if it exists.
    pub fn block_by_number(&self, number: u64) -> Result<Option<ChainBlock>, ProviderError> {
        if let Some(remote) = &self.remote {
            if number <= remote.fork_block_number() {
                return Ok(remote.block_by_number(number)?.map(ChainBlock::Remote));
            }
        }

        let Some(index) = number.checked_sub(self.first_local_block_number()) else {
            return Ok(None);
        };

        Ok(usize::try_from(index)
            .ok()
            .and_then(|index| self.blocks.get(index))
            .cloned()
            .map(ChainBlock::Local))
    }

    /// Retrieves a locally mined block by its hash.
    pub fn block_by_hash(&self, hash: &B256) -> Option<ChainBlock> {
        let number = self.block_numbers_by_hash.get(hash)?;
        let index = usize::try_from(number - self.first_local_block_number()).ok()?;

        self.blocks.get(index).cloned().map(ChainBlock::Local)
    }

    /// Retrieves a locally mined transaction and its block.
    pub fn transaction_by_hash(&self, hash: &B256) -> Option<MinedTransaction> {
        let (number, index) = self.transaction_locations.get(hash)?;
        let block_index = usize::try_from(number - self.first_local_block_number()).ok()?;

        self.blocks
            .get(block_index)
            .map(|block| MinedTransaction {
                block: block.clone(),
                index: *index,
            })
    }

    /// Whether the transaction was mined locally.
    pub fn contains_transaction(&self, hash: &B256) -> bool {
        self.transaction_locations.contains_key(hash)
    }

    /// Appends a newly mined block.
    pub fn insert_block(&mut self, block: LocalBlock) -> Arc<LocalBlock> {
        self.push(block);
        self.last_block().clone()
    }

    /// Removes all blocks after the provided block number. Returns whether the
    /// block number is local.
    pub fn revert_to_block(&mut self, number: u64) -> bool {
        let Some(index) = number.checked_sub(self.first_local_block_number()) else {
            return false;
        };
        let Ok(retained) = usize::try_from(index + 1) else {
            return false;
        };

        if retained > self.blocks.len() {
            return false;
        }

        for removed in self.blocks.drain(retained..) {
            self.block_numbers_by_hash.remove(&removed.hash);
            for executed in &removed.transactions {
                self.transaction_locations.remove(executed.transaction.hash());
            }
        }

        true
    }

    /// Determines the hardfork of the block with the provided number.
    ///
    /// Blocks up to the fork block resolve their hardfork from the remote
    /// chain's activation history.
    pub fn hardfork_at_block(&self, number: u64, timestamp: u64) -> Result<Hardfork, ProviderError> {
        let Some(remote) = &self.remote else {
            return Ok(self.hardfork);
        };

        if number > remote.fork_block_number() {
            return Ok(self.hardfork);
        }

        let remote_chain_id = remote.chain_id();
        let activations: Option<&HardforkActivations> = self
            .chains
            .get(&remote_chain_id)
            .or_else(|| l1_chain_config(remote_chain_id))
            .map(|config| &config.hardfork_activations);

        Ok(resolve_hardfork(ResolveHardforkArgs {
            activations,
            chain_id: remote_chain_id,
            block_number: number,
            timestamp,
            fork_block_number: remote.fork_block_number(),
        })?)
    }

    /// The chain ID that applies to the block with the provided number.
    pub fn chain_id_at_block(&self, number: u64) -> u64 {
        match &self.remote {
            Some(remote) if number <= remote.fork_block_number() => remote.chain_id(),
            _ => self.chain_id,
        }
    }

    fn push(&mut self, block: LocalBlock) {
        let number = block.header.number;
        self.block_numbers_by_hash.insert(block.hash, number);
        for (index, executed) in block.transactions.iter().enumerate() {
            self.transaction_locations
                .insert(*executed.transaction.hash(), (number, index));
        }

        self.blocks.push(Arc::new(block));
    }
}

pub(crate) fn base_fee_params(chains: &HashMap<u64, ChainConfig>, chain_id: u64) -> BaseFeeParams {
    chains
        .get(&chain_id)
        .or_else(|| l1_chain_config(chain_id))
        .map_or_else(BaseFeeParams::ethereum, |config| config.base_fee_params)
}

/// Constructs a local stand-in for the remote fork block, used as the parent
/// of the first locally mined block.
fn header_from_remote(block: &RemoteBlock) -> LocalBlock {
    let header = BlockHeader {
        parent_hash: block.parent_hash,
        beneficiary: block.miner,
        state_root: block.state_root,
        number: block.number,
        gas_limit: block.gas_limit,
        gas_used: block.gas_used,
        timestamp: block.timestamp,
        base_fee_per_gas: block.base_fee_per_gas,
        ..BlockHeader::default()
    };

    LocalBlock {
        header,
        hash: block.hash,
        transactions: Vec::new(),
    }
}

