use edr_eth::BlockSpec;
use edr_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Methods invoked on a remote node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum RequestMethod {
    /// `eth_blockNumber`
    #[serde(rename = "eth_blockNumber", with = "edr_eth::serde::empty_params")]
    BlockNumber(()),
    /// `eth_chainId`
    #[serde(rename = "eth_chainId", with = "edr_eth::serde::empty_params")]
    ChainId(()),
    /// `eth_feeHistory`
    #[serde(rename = "eth_feeHistory")]
    FeeHistory(U256, BlockSpec, Vec<f64>),
    /// `eth_getBalance`
    #[serde(rename = "eth_getBalance")]
    GetBalance(Address, BlockSpec),
    /// `eth_getBlockByNumber`
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber(BlockSpec, bool),
    /// `eth_getCode`
    #[serde(rename = "eth_getCode")]
    GetCode(Address, BlockSpec),
    /// `eth_getStorageAt`
    #[serde(rename = "eth_getStorageAt")]
    GetStorageAt(Address, U256, BlockSpec),
    /// `eth_getTransactionCount`
    #[serde(rename = "eth_getTransactionCount")]
    GetTransactionCount(Address, BlockSpec),
    /// `net_version`
    #[serde(rename = "net_version", with = "edr_eth::serde::empty_params")]
    NetVersion(()),
}

impl RequestMethod {
    /// The name of the method.
    pub fn name(&self) -> &'static str {
        match self {
            RequestMethod::BlockNumber(()) => "eth_blockNumber",
            RequestMethod::ChainId(()) => "eth_chainId",
            RequestMethod::FeeHistory(..) => "eth_feeHistory",
            RequestMethod::GetBalance(..) => "eth_getBalance",
            RequestMethod::GetBlockByNumber(..) => "eth_getBlockByNumber",
            RequestMethod::GetCode(..) => "eth_getCode",
            RequestMethod::GetStorageAt(..) => "eth_getStorageAt",
            RequestMethod::GetTransactionCount(..) => "eth_getTransactionCount",
            RequestMethod::NetVersion(()) => "net_version",
        }
    }
}
