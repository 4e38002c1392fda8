#![warn(missing_docs)]

//! Ethereum JSON-RPC types shared between the remote client and the provider.

/// Types for blocks as reported by a remote node.
pub mod block;
mod block_spec;
/// Types for `eth_feeHistory`.
pub mod fee_history;
/// Types for transaction receipts and logs.
pub mod receipt;
/// Helper utilities for serde
pub mod serde;
/// Types for transaction requests and transactions.
pub mod transaction;

pub use self::block_spec::{BlockSpec, BlockTag};
