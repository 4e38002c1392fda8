use core::fmt;
use std::time::SystemTime;

use alloy_sol_types::{ContractError, GenericContractError, SolInterface as _};
use edr_block_miner::MineBlockError;
use edr_chain_config::{Hardfork, HardforkResolutionError};
use edr_eth::{BlockSpec, BlockTag};
use edr_evm::{
    result::{ExecutionResult, HaltReason},
    TransactionError,
};
use edr_mem_pool::MemPoolAddTransactionError;
use edr_primitives::{hex, Address, Bytes, B256};
use edr_rpc_client::{jsonrpc, RpcClientError};
use edr_signer::SignatureError;
use edr_state_api::StateError;
use serde::Serialize;

use crate::{config::IntervalConfigConversionError, logger::LoggerError};

/// An error that occurs while constructing a provider.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    /// The fork block is newer than the remote chain's latest block.
    #[error("Trying to initialize a provider with block {fork_block_number} but the current block is {latest_block_number}")]
    InvalidBlockNumber {
        /// Requested fork block number
        fork_block_number: u64,
        /// Latest block number of the remote chain
        latest_block_number: u64,
    },
    /// The initial date precedes the UNIX epoch.
    #[error("The initial date configuration value {0:?} is before the UNIX epoch")]
    InvalidInitialDate(SystemTime),
    /// A fork HTTP header could not be parsed.
    #[error("Invalid HTTP header: {0}")]
    InvalidHttpHeader(String),
    /// The remote block to fork from does not exist.
    #[error("The remote node does not have block {0}")]
    MissingForkBlock(u64),
    /// An error occurred while querying the remote node.
    #[error(transparent)]
    RpcClient(#[from] RpcClientError),
    /// An error occurred while generating the genesis state.
    #[error(transparent)]
    State(#[from] StateError),
}

/// An error that occurs while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The transaction's gas price is lower than the next block's base fee,
    /// while automatically mining.
    #[error(
        "Transaction gasPrice ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}"
    )]
    AutoMineGasPriceTooLow {
        /// Next block's base fee
        expected: u128,
        /// Transaction gas price
        actual: u128,
    },
    /// The transaction's max fee per gas is lower than the next block's base
    /// fee, while automatically mining.
    #[error(
        "Transaction maxFeePerGas ({actual}) is too low for the next block, which has a baseFeePerGas of {expected}"
    )]
    AutoMineMaxFeePerGasTooLow {
        /// Next block's base fee
        expected: u128,
        /// Transaction max fee per gas
        actual: u128,
    },
    /// The transaction's priority fee is lower than the minimum gas price,
    /// while automatically mining.
    #[error("Transaction gas price is {actual}, which is below the minimum of {expected}")]
    AutoMinePriorityFeeTooLow {
        /// Minimum gas price
        expected: u128,
        /// Transaction priority fee
        actual: u128,
    },
    /// The transaction nonce is too high, while automatically mining.
    #[error(
        "Nonce too high. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining."
    )]
    AutoMineNonceTooHigh {
        /// Sender's next nonce
        expected: u64,
        /// Transaction nonce
        actual: u64,
    },
    /// The transaction nonce is too low, while automatically mining.
    #[error(
        "Nonce too low. Expected nonce to be {expected} but got {actual}. Note that transactions can't be queued when automining."
    )]
    AutoMineNonceTooLow {
        /// Sender's next nonce
        expected: u64,
        /// Transaction nonce
        actual: u64,
    },
    /// An error occurred while constructing a provider.
    #[error(transparent)]
    Creation(#[from] CreationError),
    /// No hardfork could be determined for a historical block.
    #[error(transparent)]
    HardforkResolution(#[from] HardforkResolutionError),
    /// Malformed request parameters
    #[error("{0}")]
    InvalidArgument(String),
    /// Block number or hash doesn't exist in blockchain
    #[error("Received invalid block tag {block_spec}. Latest block number is {latest_block_number}")]
    InvalidBlockNumberOrHash {
        /// Requested block
        block_spec: BlockSpec,
        /// Latest block number
        latest_block_number: u64,
    },
    /// The block tag is not allowed in pre-merge hardforks.
    #[error(
        "The '{block_tag}' block tag is not allowed in pre-merge hardforks. You are using the '{hardfork:?}' hardfork."
    )]
    InvalidBlockTag {
        /// Requested tag
        block_tag: BlockTag,
        /// Current hardfork
        hardfork: Hardfork,
    },
    /// Invalid chain ID
    #[error("Invalid chainId {actual} provided, expected {expected} instead.")]
    InvalidChainId {
        /// The provider's chain ID
        expected: u64,
        /// The requested chain ID
        actual: u64,
    },
    /// The transaction with the provided hash was already mined.
    #[error("Transaction {0} cannot be dropped because it's already mined")]
    InvalidDropTransactionHash(B256),
    /// The EIP-155 transaction was signed with another chain ID
    #[error("Trying to send an incompatible EIP-155 transaction, signed for another chain.")]
    InvalidEip155TransactionChainId,
    /// Semantically invalid input
    #[error("{0}")]
    InvalidInput(String),
    /// Transaction hash doesn't exist on the blockchain.
    #[error("Transaction hash '{0}' doesn't exist on the blockchain.")]
    InvalidTransactionHash(B256),
    /// Invalid transaction request
    #[error("{0}")]
    InvalidTransactionInput(String),
    /// An error occurred while printing logs.
    #[error(transparent)]
    Logger(#[from] LoggerError),
    /// An error occurred while adding a pending transaction to the mem pool.
    #[error(transparent)]
    MemPoolAddTransaction(#[from] MemPoolAddTransactionError<StateError>),
    /// An error occurred while updating the mem pool.
    #[error(transparent)]
    MemPoolUpdate(StateError),
    /// An error occurred while mining a block.
    #[error(transparent)]
    MineBlock(#[from] MineBlockError),
    /// Rpc client error
    #[error(transparent)]
    RpcClientError(#[from] RpcClientError),
    /// Error while running a transaction
    #[error(transparent)]
    RunTransaction(#[from] TransactionError),
    /// Serialization error
    #[error("Failed to serialize response: {0}")]
    Serialization(serde_json::Error),
    /// The new nonce is lower than the account's nonce.
    #[error("New nonce ({proposed}) must not be smaller than the existing nonce ({previous})")]
    SetAccountNonceLowerThanCurrent {
        /// The account's nonce
        previous: u64,
        /// The requested nonce
        proposed: u64,
    },
    /// Cannot set account nonce when the mem pool is not empty
    #[error("Cannot set account nonce when the transaction pool is not empty")]
    SetAccountNonceWithPendingTransactions,
    /// `evm_setBlockGasLimit` was called with a gas limit of zero.
    #[error("Block gas limit must be greater than 0")]
    SetBlockGasLimitMustBeGreaterThanZero,
    /// The `evm_setIntervalMining` method was called with an invalid interval.
    #[error(transparent)]
    SetIntervalMiningConfigInvalid(#[from] IntervalConfigConversionError),
    /// The `hardhat_setMinGasPrice` method is not supported when EIP-1559 is
    /// active.
    #[error("hardhat_setMinGasPrice is not supported when EIP-1559 is active")]
    SetMinGasPriceUnsupported,
    /// The `hardhat_setNextBlockBaseFeePerGas` method is not supported due to
    /// an older hardfork.
    #[error("hardhat_setNextBlockBaseFeePerGas is disabled because EIP-1559 is not active")]
    SetNextBlockBaseFeePerGasUnsupported {
        /// Current hardfork
        hardfork: Hardfork,
    },
    /// An error occurred while signing or recovering a signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// State error
    #[error(transparent)]
    State(#[from] StateError),
    /// Timestamp lower than previous timestamp
    #[error("Timestamp {proposed} is lower than the previous block's timestamp {previous}")]
    TimestampLowerThanPrevious {
        /// Requested timestamp
        proposed: u64,
        /// Timestamp of the latest block
        previous: u64,
    },
    /// Timestamp equals previous timestamp
    #[error(
        "Timestamp {proposed} is equal to the previous block's timestamp. Enable the 'allowBlocksWithSameTimestamp' option to allow this"
    )]
    TimestampEqualsPrevious {
        /// Requested timestamp
        proposed: u64,
    },
    /// A raw transaction could not be decoded.
    #[error(transparent)]
    TransactionDecoding(#[from] edr_transaction::TransactionError),
    /// A transaction was mined but failed.
    #[error(transparent)]
    TransactionFailed(Box<TransactionFailure>),
    /// The address is not owned by this node.
    #[error("Unknown account {address}")]
    UnknownAddress {
        /// The sender
        address: Address,
    },
    /// Minimum required hardfork not met
    #[error("Feature is only available in post-{minimum:?} hardforks, the current hardfork is {actual:?}")]
    UnmetHardfork {
        /// Current hardfork
        actual: Hardfork,
        /// Required hardfork
        minimum: Hardfork,
    },
    /// The transaction contains an access list before Berlin.
    #[error(
        "The transaction contains an access list parameter, but this is not supported by the current hardfork: {current_hardfork:?}"
    )]
    UnsupportedAccessListParameter {
        /// Current hardfork
        current_hardfork: Hardfork,
        /// Required hardfork
        minimum_hardfork: Hardfork,
    },
    /// The transaction contains EIP-1559 fields before London.
    #[error(
        "The transaction contains EIP-1559 parameters, but they are not supported by the current hardfork: {current_hardfork:?}"
    )]
    UnsupportedEIP1559Parameters {
        /// Current hardfork
        current_hardfork: Hardfork,
        /// Required hardfork
        minimum_hardfork: Hardfork,
    },
    /// The method is not supported.
    #[error("{method_name} - Method not supported")]
    UnsupportedMethod {
        /// Name of the method
        method_name: String,
    },
}

impl ProviderError {
    /// Returns the transaction failure if the error contains one.
    pub fn as_transaction_failure(&self) -> Option<&TransactionFailure> {
        match self {
            ProviderError::TransactionFailed(transaction_failure) => Some(transaction_failure),
            _ => None,
        }
    }
}

impl From<ProviderError> for jsonrpc::Error {
    fn from(value: ProviderError) -> Self {
        const INVALID_INPUT: i64 = -32000;
        const INTERNAL_ERROR: i64 = -32603;
        const INVALID_PARAMS: i64 = -32602;

        #[allow(clippy::match_same_arms)]
        let code = match &value {
            ProviderError::AutoMineGasPriceTooLow { .. } => INVALID_INPUT,
            ProviderError::AutoMineMaxFeePerGasTooLow { .. } => INVALID_INPUT,
            ProviderError::AutoMineNonceTooHigh { .. } => INVALID_INPUT,
            ProviderError::AutoMineNonceTooLow { .. } => INVALID_INPUT,
            ProviderError::AutoMinePriorityFeeTooLow { .. } => INVALID_INPUT,
            ProviderError::Creation(_) => INVALID_INPUT,
            ProviderError::HardforkResolution(_) => INVALID_INPUT,
            ProviderError::InvalidArgument(_) => INVALID_PARAMS,
            ProviderError::InvalidBlockNumberOrHash { .. } => INVALID_INPUT,
            ProviderError::InvalidBlockTag { .. } => INVALID_PARAMS,
            ProviderError::InvalidChainId { .. } => INVALID_PARAMS,
            ProviderError::InvalidDropTransactionHash(_) => INVALID_PARAMS,
            ProviderError::InvalidEip155TransactionChainId => INVALID_PARAMS,
            ProviderError::InvalidInput(_) => INVALID_INPUT,
            ProviderError::InvalidTransactionHash(_) => INVALID_PARAMS,
            ProviderError::InvalidTransactionInput(_) => INVALID_INPUT,
            ProviderError::Logger(_) => INTERNAL_ERROR,
            ProviderError::MemPoolAddTransaction(_) => INVALID_INPUT,
            ProviderError::MemPoolUpdate(_) => INVALID_INPUT,
            ProviderError::MineBlock(_) => INVALID_INPUT,
            ProviderError::RpcClientError(_) => INTERNAL_ERROR,
            ProviderError::RunTransaction(_) => INVALID_INPUT,
            ProviderError::Serialization(_) => INVALID_INPUT,
            ProviderError::SetAccountNonceLowerThanCurrent { .. } => INVALID_INPUT,
            ProviderError::SetAccountNonceWithPendingTransactions => INTERNAL_ERROR,
            ProviderError::SetBlockGasLimitMustBeGreaterThanZero => INVALID_INPUT,
            ProviderError::SetIntervalMiningConfigInvalid(_) => INVALID_PARAMS,
            ProviderError::SetMinGasPriceUnsupported => INVALID_INPUT,
            ProviderError::SetNextBlockBaseFeePerGasUnsupported { .. } => INVALID_INPUT,
            ProviderError::Signature(_) => INVALID_PARAMS,
            ProviderError::State(_) => INVALID_INPUT,
            ProviderError::TimestampLowerThanPrevious { .. } => INVALID_INPUT,
            ProviderError::TimestampEqualsPrevious { .. } => INVALID_INPUT,
            ProviderError::TransactionDecoding(_) => INVALID_PARAMS,
            ProviderError::TransactionFailed(_) => INVALID_INPUT,
            ProviderError::UnknownAddress { .. } => INVALID_INPUT,
            ProviderError::UnmetHardfork { .. } => INVALID_PARAMS,
            ProviderError::UnsupportedAccessListParameter { .. } => INVALID_PARAMS,
            ProviderError::UnsupportedEIP1559Parameters { .. } => INVALID_PARAMS,
            ProviderError::UnsupportedMethod { .. } => -32004,
        };

        let data = value
            .as_transaction_failure()
            .and_then(|transaction_failure| serde_json::to_value(transaction_failure).ok());

        let message = value.to_string();

        Self {
            code,
            message,
            data,
        }
    }
}

/// Wrapper around a failed execution to convert error messages to match
/// Hardhat.
#[derive(Clone, Debug, thiserror::Error, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFailure {
    /// Why the transaction failed
    #[serde(skip)]
    pub reason: TransactionFailureReason,
    /// Human-readable error message
    pub message: String,
    /// Hex-encoded revert data
    pub data: String,
    /// Hash of the mined transaction, if it was mined
    #[serde(rename = "txHash", skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
}

impl TransactionFailure {
    /// Constructs a failure from the execution result, if it failed.
    pub fn from_execution_result(
        execution_result: &ExecutionResult,
        transaction_hash: Option<&B256>,
    ) -> Option<Self> {
        match execution_result {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Revert { output, .. } => {
                Some(Self::revert(output.clone(), transaction_hash.copied()))
            }
            ExecutionResult::Halt { reason, .. } => {
                Some(Self::halt(TransactionFailureReason::from(*reason), transaction_hash.copied()))
            }
        }
    }

    /// Constructs a failure for an exceptional halt.
    pub fn halt(reason: TransactionFailureReason, transaction_hash: Option<B256>) -> Self {
        let message = reason.to_string();
        Self {
            reason,
            message,
            data: "0x".to_string(),
            transaction_hash,
        }
    }

    /// Constructs a failure for a revert with the provided output.
    pub fn revert(output: Bytes, transaction_hash: Option<B256>) -> Self {
        let data = hex::encode_prefixed(output.as_ref());
        let reason = TransactionFailureReason::Revert(output);
        let message = reason.to_string();
        Self {
            reason,
            message,
            data,
            transaction_hash,
        }
    }
}

impl fmt::Display for TransactionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The reason a transaction failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionFailureReason {
    /// Deployed code exceeds the maximum code size
    CreateContractSizeLimit,
    /// Any other halt
    Inner(HaltReason),
    /// Unknown opcode
    OpcodeNotFound,
    /// Ran out of gas
    OutOfGas,
    /// Reverted with the provided output
    Revert(Bytes),
}

impl From<HaltReason> for TransactionFailureReason {
    fn from(reason: HaltReason) -> Self {
        match reason {
            HaltReason::CreateContractSizeLimit => Self::CreateContractSizeLimit,
            HaltReason::OpcodeNotFound => Self::OpcodeNotFound,
            HaltReason::OutOfGas => Self::OutOfGas,
            reason @ (HaltReason::CreateCollision | HaltReason::OutOfFunds) => Self::Inner(reason),
        }
    }
}

impl fmt::Display for TransactionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionFailureReason::CreateContractSizeLimit => write!(
                f,
                "Transaction reverted: trying to deploy a contract whose code is too large"
            ),
            TransactionFailureReason::Inner(halt) => write!(f, "{halt:?}"),
            TransactionFailureReason::OpcodeNotFound => {
                write!(f, "VM Exception while processing transaction: invalid opcode")
            }
            TransactionFailureReason::OutOfGas => write!(f, "Transaction ran out of gas"),
            TransactionFailureReason::Revert(output) => write!(f, "{}", revert_error(output)),
        }
    }
}

fn revert_error(output: &Bytes) -> String {
    if output.is_empty() {
        return "Transaction reverted without a reason".to_string();
    }

    match GenericContractError::abi_decode(output.as_ref()) {
        Ok(ContractError::CustomError(custom_error)) => format!(
            "VM Exception while processing transaction: reverted with an unrecognized custom error (return data: {custom_error})"
        ),
        Ok(ContractError::Revert(revert)) => {
            format!("reverted with reason string '{}'", revert.reason())
        }
        Ok(ContractError::Panic(panic)) => {
            let code = u64::try_from(panic.code).unwrap_or(u64::MAX);
            format!(
                "VM Exception while processing transaction: reverted with panic code {code:#x} ({})",
                panic_code_to_error_reason(code)
            )
        }
        Err(_decode_error) => format!(
            "VM Exception while processing transaction: reverted with an unrecognized custom error (return data: {})",
            hex::encode_prefixed(output)
        ),
    }
}

fn panic_code_to_error_reason(error_code: u64) -> &'static str {
    match error_code {
        0x1 => "Assertion error",
        0x11 => "Arithmetic operation underflowed or overflowed outside of an unchecked block",
        0x12 => "Division or modulo division by zero",
        0x21 => "Tried to convert a value into an enum, but the value was too big or negative",
        0x22 => "Incorrectly encoded storage byte array",
        0x31 => ".pop() was called on an empty array",
        0x32 => "Array accessed at an out-of-bounds or negative index",
        0x41 => "Too much memory was allocated, or an array was created that is too large",
        0x51 => "Called a zero-initialized variable of internal function type",
        _ => "Unknown panic code",
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{Revert, SolError as _};

    use super::*;

    #[test]
    fn revert_without_reason() {
        let failure = TransactionFailure::revert(Bytes::new(), None);
        assert_eq!(failure.to_string(), "Transaction reverted without a reason");
        assert_eq!(failure.data, "0x");
    }

    #[test]
    fn revert_with_reason_string() {
        let output = Bytes::from(Revert::from("insufficient allowance").abi_encode());
        let failure = TransactionFailure::revert(output, Some(B256::repeat_byte(1)));

        assert_eq!(
            failure.to_string(),
            "reverted with reason string 'insufficient allowance'"
        );
    }

    #[test]
    fn transaction_failure_json_error_carries_hash() -> anyhow::Result<()> {
        let transaction_hash = B256::repeat_byte(0xab);
        let failure = TransactionFailure::halt(TransactionFailureReason::OutOfGas, Some(transaction_hash));
        let error = jsonrpc::Error::from(ProviderError::TransactionFailed(Box::new(failure)));

        assert_eq!(error.code, -32000);
        assert_eq!(error.message, "Transaction ran out of gas");

        let data = error.data.ok_or_else(|| anyhow::anyhow!("missing data"))?;
        assert_eq!(data["txHash"], serde_json::to_value(transaction_hash)?);
        assert_eq!(data["message"], "Transaction ran out of gas");

        Ok(())
    }

    #[test]
    fn error_codes() {
        let unsupported = jsonrpc::Error::from(ProviderError::UnsupportedMethod {
            method_name: "eth_mining".to_string(),
        });
        assert_eq!(unsupported.code, -32004);
        assert_eq!(unsupported.message, "eth_mining - Method not supported");

        let drop = jsonrpc::Error::from(ProviderError::InvalidDropTransactionHash(B256::ZERO));
        assert_eq!(drop.code, -32602);

        let nonce = jsonrpc::Error::from(ProviderError::SetAccountNonceWithPendingTransactions);
        assert_eq!(nonce.code, -32603);
    }
}
