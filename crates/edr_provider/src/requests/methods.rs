use edr_eth::{
    serde::{optional_single_to_sequence, sequence_to_optional_single},
    transaction::{CallRequest, TransactionRequest},
    BlockSpec,
};
use edr_primitives::{Address, Bytes, B256, U256, U64};
use serde::{Deserialize, Serialize};

use super::{
    debug::DebugTraceConfig,
    hardhat::rpc_types::ResetProviderConfig,
    serde::{RpcAddress, Timestamp},
};

mod optional_block_spec {
    use super::BlockSpec;

    pub fn latest() -> Option<BlockSpec> {
        Some(BlockSpec::latest())
    }

    pub fn pending() -> Option<BlockSpec> {
        Some(BlockSpec::pending())
    }
}

/// For invoking a JSON-RPC method on a local Ethereum development node.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "method", content = "params")]
pub enum MethodInvocation {
    /// `eth_accounts`
    #[serde(rename = "eth_accounts", with = "edr_eth::serde::empty_params")]
    Accounts(()),
    /// `eth_blockNumber`
    #[serde(rename = "eth_blockNumber", with = "edr_eth::serde::empty_params")]
    BlockNumber(()),
    /// `eth_call`
    ///
    /// Executes a message call on top of the state of the provided block,
    /// `"latest"` by default. The sender defaults to the first owned account
    /// and gas is free of charge.
    #[serde(rename = "eth_call")]
    Call(
        CallRequest,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::latest"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_chainId`
    #[serde(rename = "eth_chainId", with = "edr_eth::serde::empty_params")]
    ChainId(()),
    /// `eth_coinbase`
    #[serde(rename = "eth_coinbase", with = "edr_eth::serde::empty_params")]
    Coinbase(()),
    /// `eth_estimateGas`
    ///
    /// Estimates the gas limit that the transaction needs to succeed, on top
    /// of the `"pending"` block by default.
    #[serde(rename = "eth_estimateGas")]
    EstimateGas(
        CallRequest,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::pending"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_feeHistory`
    ///
    /// Params: block count, newest block and optional reward percentiles.
    #[serde(rename = "eth_feeHistory")]
    FeeHistory(
        U256,
        BlockSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")] Option<Vec<f64>>,
    ),
    /// `eth_gasPrice`
    #[serde(rename = "eth_gasPrice", with = "edr_eth::serde::empty_params")]
    GasPrice(()),
    /// `eth_getBalance`
    #[serde(rename = "eth_getBalance")]
    GetBalance(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::latest"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_getBlockByNumber`
    ///
    /// Params: block spec and whether to include full transaction objects.
    #[serde(rename = "eth_getBlockByNumber")]
    GetBlockByNumber(BlockSpec, bool),
    /// `eth_getCode`
    #[serde(rename = "eth_getCode")]
    GetCode(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::latest"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_getStorageAt`
    #[serde(rename = "eth_getStorageAt")]
    GetStorageAt(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(deserialize_with = "crate::requests::serde::deserialize_storage_key")] U256,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::latest"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_getTransactionByHash`
    #[serde(rename = "eth_getTransactionByHash", with = "edr_eth::serde::sequence")]
    GetTransactionByHash(B256),
    /// `eth_getTransactionCount`
    #[serde(rename = "eth_getTransactionCount")]
    GetTransactionCount(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(
            skip_serializing_if = "Option::is_none",
            default = "optional_block_spec::latest"
        )]
        Option<BlockSpec>,
    ),
    /// `eth_getTransactionReceipt`
    #[serde(
        rename = "eth_getTransactionReceipt",
        with = "edr_eth::serde::sequence"
    )]
    GetTransactionReceipt(B256),
    /// `eth_maxPriorityFeePerGas`
    #[serde(
        rename = "eth_maxPriorityFeePerGas",
        with = "edr_eth::serde::empty_params"
    )]
    MaxPriorityFeePerGas(()),
    /// `net_version`
    #[serde(rename = "net_version", with = "edr_eth::serde::empty_params")]
    NetVersion(()),
    /// `eth_pendingTransactions`
    #[serde(
        rename = "eth_pendingTransactions",
        with = "edr_eth::serde::empty_params"
    )]
    PendingTransactions(()),
    /// `eth_sendRawTransaction`
    #[serde(rename = "eth_sendRawTransaction", with = "edr_eth::serde::sequence")]
    SendRawTransaction(Bytes),
    /// `eth_sendTransaction`
    ///
    /// Signs the transaction with the sender's owned key, or fake-signs it
    /// for impersonated senders.
    #[serde(rename = "eth_sendTransaction", with = "edr_eth::serde::sequence")]
    SendTransaction(TransactionRequest),
    /// `evm_increaseTime`
    #[serde(rename = "evm_increaseTime", with = "edr_eth::serde::sequence")]
    EvmIncreaseTime(Timestamp),
    /// `evm_mine`
    ///
    /// Mines a single block, optionally with the provided timestamp.
    #[serde(
        rename = "evm_mine",
        serialize_with = "optional_single_to_sequence",
        deserialize_with = "sequence_to_optional_single"
    )]
    EvmMine(Option<Timestamp>),
    /// `evm_revert`
    #[serde(rename = "evm_revert", with = "edr_eth::serde::sequence")]
    EvmRevert(U64),
    /// `evm_setAutomine`
    #[serde(rename = "evm_setAutomine", with = "edr_eth::serde::sequence")]
    EvmSetAutomine(bool),
    /// `evm_setBlockGasLimit`
    #[serde(rename = "evm_setBlockGasLimit", with = "edr_eth::serde::sequence")]
    EvmSetBlockGasLimit(U64),
    /// `evm_setIntervalMining`
    ///
    /// Zero disables interval mining; a `[min, max]` pair picks a random
    /// interval for every block.
    #[serde(rename = "evm_setIntervalMining", with = "edr_eth::serde::sequence")]
    EvmSetIntervalMining(IntervalConfig),
    /// `evm_setNextBlockTimestamp`
    #[serde(
        rename = "evm_setNextBlockTimestamp",
        with = "edr_eth::serde::sequence"
    )]
    EvmSetNextBlockTimestamp(Timestamp),
    /// `evm_snapshot`
    #[serde(rename = "evm_snapshot", with = "edr_eth::serde::empty_params")]
    EvmSnapshot(()),
    /// `debug_traceTransaction`
    #[serde(rename = "debug_traceTransaction")]
    DebugTraceTransaction(
        B256,
        #[serde(default, skip_serializing_if = "Option::is_none")] Option<DebugTraceConfig>,
    ),
    /// `hardhat_dropTransaction`
    #[serde(rename = "hardhat_dropTransaction", with = "edr_eth::serde::sequence")]
    DropTransaction(B256),
    /// `hardhat_getAutomine`
    #[serde(rename = "hardhat_getAutomine", with = "edr_eth::serde::empty_params")]
    GetAutomine(()),
    /// `hardhat_impersonateAccount`
    #[serde(
        rename = "hardhat_impersonateAccount",
        with = "edr_eth::serde::sequence"
    )]
    ImpersonateAccount(RpcAddress),
    /// `hardhat_intervalMine`
    #[serde(rename = "hardhat_intervalMine", with = "edr_eth::serde::empty_params")]
    IntervalMine(()),
    /// `hardhat_mine`
    ///
    /// Params: number of blocks (default 1) and the interval between their
    /// timestamps (default 1).
    #[serde(rename = "hardhat_mine")]
    Mine(
        #[serde(default, with = "alloy_serde::quantity::opt")] Option<u64>,
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            with = "alloy_serde::quantity::opt"
        )]
        Option<u64>,
    ),
    /// `hardhat_reset`
    #[serde(
        rename = "hardhat_reset",
        serialize_with = "optional_single_to_sequence",
        deserialize_with = "sequence_to_optional_single"
    )]
    Reset(Option<ResetProviderConfig>),
    /// `hardhat_setBalance`
    #[serde(rename = "hardhat_setBalance")]
    SetBalance(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(deserialize_with = "crate::requests::serde::deserialize_quantity")] U256,
    ),
    /// `hardhat_setCode`
    #[serde(rename = "hardhat_setCode")]
    SetCode(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(deserialize_with = "crate::requests::serde::deserialize_data")] Bytes,
    ),
    /// `hardhat_setCoinbase`
    #[serde(rename = "hardhat_setCoinbase", with = "edr_eth::serde::sequence")]
    SetCoinbase(RpcAddress),
    /// `hardhat_setLoggingEnabled`
    #[serde(
        rename = "hardhat_setLoggingEnabled",
        with = "edr_eth::serde::sequence"
    )]
    SetLoggingEnabled(bool),
    /// `hardhat_setMinGasPrice`
    #[serde(rename = "hardhat_setMinGasPrice", with = "edr_eth::serde::sequence")]
    SetMinGasPrice(U256),
    /// `hardhat_setNextBlockBaseFeePerGas`
    #[serde(
        rename = "hardhat_setNextBlockBaseFeePerGas",
        with = "edr_eth::serde::sequence"
    )]
    SetNextBlockBaseFeePerGas(U256),
    /// `hardhat_setNonce`
    #[serde(rename = "hardhat_setNonce")]
    SetNonce(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(
            deserialize_with = "crate::requests::serde::deserialize_nonce",
            serialize_with = "alloy_serde::quantity::serialize"
        )]
        u64,
    ),
    /// `hardhat_setStorageAt`
    ///
    /// The value must be exactly 32 bytes.
    #[serde(rename = "hardhat_setStorageAt")]
    SetStorageAt(
        #[serde(deserialize_with = "crate::requests::serde::deserialize_address")] Address,
        #[serde(deserialize_with = "crate::requests::serde::deserialize_storage_key")] U256,
        #[serde(with = "crate::requests::serde::storage_value")] U256,
    ),
    /// `hardhat_stopImpersonatingAccount`
    #[serde(
        rename = "hardhat_stopImpersonatingAccount",
        with = "edr_eth::serde::sequence"
    )]
    StopImpersonatingAccount(RpcAddress),
}

impl MethodInvocation {
    /// Retrieves the instance's method name.
    pub fn method_name(&self) -> &'static str {
        match self {
            MethodInvocation::Accounts(_) => "eth_accounts",
            MethodInvocation::BlockNumber(_) => "eth_blockNumber",
            MethodInvocation::Call(_, _) => "eth_call",
            MethodInvocation::ChainId(_) => "eth_chainId",
            MethodInvocation::Coinbase(_) => "eth_coinbase",
            MethodInvocation::EstimateGas(_, _) => "eth_estimateGas",
            MethodInvocation::FeeHistory(_, _, _) => "eth_feeHistory",
            MethodInvocation::GasPrice(_) => "eth_gasPrice",
            MethodInvocation::GetBalance(_, _) => "eth_getBalance",
            MethodInvocation::GetBlockByNumber(_, _) => "eth_getBlockByNumber",
            MethodInvocation::GetCode(_, _) => "eth_getCode",
            MethodInvocation::GetStorageAt(_, _, _) => "eth_getStorageAt",
            MethodInvocation::GetTransactionByHash(_) => "eth_getTransactionByHash",
            MethodInvocation::GetTransactionCount(_, _) => "eth_getTransactionCount",
            MethodInvocation::GetTransactionReceipt(_) => "eth_getTransactionReceipt",
            MethodInvocation::MaxPriorityFeePerGas(_) => "eth_maxPriorityFeePerGas",
            MethodInvocation::NetVersion(_) => "net_version",
            MethodInvocation::PendingTransactions(_) => "eth_pendingTransactions",
            MethodInvocation::SendRawTransaction(_) => "eth_sendRawTransaction",
            MethodInvocation::SendTransaction(_) => "eth_sendTransaction",
            MethodInvocation::EvmIncreaseTime(_) => "evm_increaseTime",
            MethodInvocation::EvmMine(_) => "evm_mine",
            MethodInvocation::EvmRevert(_) => "evm_revert",
            MethodInvocation::EvmSetAutomine(_) => "evm_setAutomine",
            MethodInvocation::EvmSetBlockGasLimit(_) => "evm_setBlockGasLimit",
            MethodInvocation::EvmSetIntervalMining(_) => "evm_setIntervalMining",
            MethodInvocation::EvmSetNextBlockTimestamp(_) => "evm_setNextBlockTimestamp",
            MethodInvocation::EvmSnapshot(_) => "evm_snapshot",
            MethodInvocation::DebugTraceTransaction(_, _) => "debug_traceTransaction",
            MethodInvocation::DropTransaction(_) => "hardhat_dropTransaction",
            MethodInvocation::GetAutomine(_) => "hardhat_getAutomine",
            MethodInvocation::ImpersonateAccount(_) => "hardhat_impersonateAccount",
            MethodInvocation::IntervalMine(_) => "hardhat_intervalMine",
            MethodInvocation::Mine(_, _) => "hardhat_mine",
            MethodInvocation::Reset(_) => "hardhat_reset",
            MethodInvocation::SetBalance(_, _) => "hardhat_setBalance",
            MethodInvocation::SetCode(_, _) => "hardhat_setCode",
            MethodInvocation::SetCoinbase(_) => "hardhat_setCoinbase",
            MethodInvocation::SetLoggingEnabled(_) => "hardhat_setLoggingEnabled",
            MethodInvocation::SetMinGasPrice(_) => "hardhat_setMinGasPrice",
            MethodInvocation::SetNextBlockBaseFeePerGas(_) => "hardhat_setNextBlockBaseFeePerGas",
            MethodInvocation::SetNonce(_, _) => "hardhat_setNonce",
            MethodInvocation::SetStorageAt(_, _, _) => "hardhat_setStorageAt",
            MethodInvocation::StopImpersonatingAccount(_) => "hardhat_stopImpersonatingAccount",
        }
    }
}

/// An input that can be either a single `u64` or an array of two `u64` values.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum IntervalConfig {
    /// A fixed value; or disabled, when zero.
    FixedOrDisabled(u64),
    /// An array of two `u64` values representing a `[min, max]` range.
    Range([u64; 2]),
}

#[cfg(test)]
mod tests {
    use edr_eth::BlockTag;

    use super::*;

    fn help_test_method_invocation_serde(call: MethodInvocation) -> anyhow::Result<()> {
        let json = serde_json::to_string(&call)?;
        let deserialized: MethodInvocation = serde_json::from_str(&json)?;
        assert_eq!(call, deserialized, "json: {json}");

        Ok(())
    }

    #[test]
    fn method_name_matches_serialized_method() -> anyhow::Result<()> {
        let calls = [
            MethodInvocation::EvmSnapshot(()),
            MethodInvocation::GetAutomine(()),
            MethodInvocation::IntervalMine(()),
            MethodInvocation::EvmMine(None),
            MethodInvocation::Reset(None),
            MethodInvocation::DropTransaction(B256::repeat_byte(1)),
        ];

        for call in calls {
            let json = serde_json::to_value(&call)?;
            assert_eq!(json["method"], call.method_name());
        }

        Ok(())
    }

    #[test]
    fn optional_params_serde() -> anyhow::Result<()> {
        help_test_method_invocation_serde(MethodInvocation::EvmMine(Some(Timestamp(100))))?;
        help_test_method_invocation_serde(MethodInvocation::Mine(Some(10), Some(5)))?;
        help_test_method_invocation_serde(MethodInvocation::GetBalance(
            Address::repeat_byte(1),
            Some(BlockSpec::Tag(BlockTag::Pending)),
        ))?;

        Ok(())
    }

    #[test]
    fn block_spec_defaults() -> anyhow::Result<()> {
        let call: MethodInvocation = serde_json::from_str(
            r#"{"method":"eth_getBalance","params":["0x0101010101010101010101010101010101010101"]}"#,
        )?;
        assert_eq!(
            call,
            MethodInvocation::GetBalance(Address::repeat_byte(1), Some(BlockSpec::latest()))
        );

        let call: MethodInvocation = serde_json::from_str(
            r#"{"method":"eth_estimateGas","params":[{"to":"0x0101010101010101010101010101010101010101"}]}"#,
        )?;
        let MethodInvocation::EstimateGas(_, block_spec) = call else {
            anyhow::bail!("unexpected method: {}", call.method_name());
        };
        assert_eq!(block_spec, Some(BlockSpec::pending()));

        Ok(())
    }

    #[test]
    fn interval_config_untagged() -> anyhow::Result<()> {
        let call: MethodInvocation =
            serde_json::from_str(r#"{"method":"evm_setIntervalMining","params":[[100, 200]]}"#)?;
        assert_eq!(
            call,
            MethodInvocation::EvmSetIntervalMining(IntervalConfig::Range([100, 200]))
        );

        let call: MethodInvocation =
            serde_json::from_str(r#"{"method":"evm_setIntervalMining","params":[0]}"#)?;
        assert_eq!(
            call,
            MethodInvocation::EvmSetIntervalMining(IntervalConfig::FixedOrDisabled(0))
        );

        Ok(())
    }

    #[test]
    fn storage_value_must_be_32_bytes() {
        let result = serde_json::from_str::<MethodInvocation>(
            r#"{"method":"hardhat_setStorageAt","params":["0x0101010101010101010101010101010101010101","0x0","0x01"]}"#,
        );
        assert!(result.is_err());
    }
}
