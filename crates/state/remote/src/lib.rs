//! Retrieval of account and storage data from a remote Ethereum node at a
//! pinned block number.
mod cached;
#[cfg(any(test, feature = "test-utils"))]
mod in_memory;

use std::{fmt::Debug, sync::Arc};

use auto_impl::auto_impl;
use edr_eth::BlockSpec;
use edr_primitives::{Address, U256};
use edr_rpc_client::RpcClient;
use edr_state_api::{account::AccountInfo, StateError};
use tokio::runtime;

pub use self::cached::CachedRemoteState;
#[cfg(any(test, feature = "test-utils"))]
pub use self::in_memory::InMemoryRemote;

/// A source of historical account and storage data.
#[auto_impl(&, Box, Arc)]
pub trait RemoteSource: Debug + Send + Sync {
    /// Retrieves the account, including its code, at the provided block.
    /// Returns `None` for accounts that are empty.
    fn fetch_account(
        &self,
        address: Address,
        block_number: u64,
    ) -> Result<Option<AccountInfo>, StateError>;

    /// Retrieves a storage slot at the provided block.
    fn fetch_storage(
        &self,
        address: Address,
        index: U256,
        block_number: u64,
    ) -> Result<U256, StateError>;

    /// Whether data of the provided block is safe from reorgs and can be
    /// cached.
    fn is_cacheable_block_number(&self, block_number: u64) -> Result<bool, StateError>;
}

/// A [`RemoteSource`] backed by a JSON-RPC client.
///
/// Requests block the current thread, so it must be used from a
/// multi-threaded `tokio` runtime.
#[derive(Debug)]
pub struct RemoteState {
    client: Arc<RpcClient>,
    runtime: runtime::Handle,
}

impl RemoteState {
    /// Constructs a new instance.
    pub fn new(runtime: runtime::Handle, client: Arc<RpcClient>) -> Self {
        Self { client, runtime }
    }

    /// Returns the underlying RPC client.
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    fn block_on<FutureT: Future>(&self, future: FutureT) -> FutureT::Output {
        tokio::task::block_in_place(move || self.runtime.block_on(future))
    }
}

impl RemoteSource for RemoteState {
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn fetch_account(
        &self,
        address: Address,
        block_number: u64,
    ) -> Result<Option<AccountInfo>, StateError> {
        let account = self.block_on(
            self.client
                .get_account_info(address, BlockSpec::Number(block_number)),
        )?;

        let account_info = AccountInfo::with_code(account.balance, account.nonce, account.code);
        Ok(if account_info.is_empty() {
            None
        } else {
            Some(account_info)
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    fn fetch_storage(
        &self,
        address: Address,
        index: U256,
        block_number: u64,
    ) -> Result<U256, StateError> {
        Ok(self.block_on(self.client.get_storage_at(
            address,
            index,
            BlockSpec::Number(block_number),
        ))?)
    }

    fn is_cacheable_block_number(&self, block_number: u64) -> Result<bool, StateError> {
        Ok(self.block_on(self.client.is_cacheable_block_number(block_number))?)
    }
}
