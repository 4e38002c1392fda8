//! A local Ethereum development node: forked or local chain state, a
//! transaction pool, block mining and the JSON-RPC methods that drive them.

mod blockchain;
mod config;
mod data;
mod debug_trace;
mod error;
mod interval;
mod logger;
mod provider;
/// Type for RPC requests.
pub mod requests;
mod snapshot;
/// Utilities for testing
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
/// Types for temporal operations
pub mod time;

pub use self::{
    blockchain::{ChainBlock, MinedTransaction, RemoteBlockSource, RemoteNode, RpcBlockSource},
    config::*,
    data::{
        BlockDataForTransaction, BlockOptions, ProviderData, SendTransactionResult,
        TransactionAndBlock, DEFAULT_MAX_PRIORITY_FEE_PER_GAS,
    },
    debug_trace::{DebugTraceLogItem, DebugTraceResult},
    error::{CreationError, ProviderError, TransactionFailure, TransactionFailureReason},
    interval::IntervalMiner,
    logger::{CollapsingLogger, Logger, LoggerError, NoopLogger, PrintLineFn, SyncLogger},
    provider::Provider,
    requests::{
        hardhat::rpc_types as hardhat_rpc_types, IntervalConfig as IntervalConfigRequest,
        InvalidRequestReason, MethodInvocation, ProviderRequest, Timestamp,
    },
};

/// Methods that are not logged when the logger is enabled.
pub const PRIVATE_RPC_METHODS: &[&str] = &["hardhat_setLoggingEnabled"];

fn to_json<T: serde::Serialize>(value: T) -> Result<serde_json::Value, ProviderError> {
    serde_json::to_value(value).map_err(ProviderError::Serialization)
}
