use edr_chain_config::Hardfork;
use edr_eth::{
    transaction::{CallRequest, TransactionRequest},
    BlockSpec, BlockTag,
};
use edr_evm::config::MAX_INITCODE_SIZE;
use edr_primitives::{Address, Bytes};
use edr_transaction::{AccessListItem, Fee, Signed, TransactionType};

use crate::{data::ProviderData, time::TimeSinceEpoch, ProviderError};

/// The fee and access list fields that depend on the active hardfork.
pub(crate) trait HardforkValidationData {
    fn to(&self) -> Option<Address>;

    fn gas_price(&self) -> Option<u128>;

    fn max_fee_per_gas(&self) -> Option<u128>;

    fn max_priority_fee_per_gas(&self) -> Option<u128>;

    fn access_list(&self) -> Option<&[AccessListItem]>;
}

impl HardforkValidationData for TransactionRequest {
    fn to(&self) -> Option<Address> {
        self.to
    }

    fn gas_price(&self) -> Option<u128> {
        self.gas_price
    }

    fn max_fee_per_gas(&self) -> Option<u128> {
        self.max_fee_per_gas
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        self.max_priority_fee_per_gas
    }

    fn access_list(&self) -> Option<&[AccessListItem]> {
        self.access_list.as_deref()
    }
}

impl HardforkValidationData for CallRequest {
    fn to(&self) -> Option<Address> {
        self.to
    }

    fn gas_price(&self) -> Option<u128> {
        self.gas_price
    }

    fn max_fee_per_gas(&self) -> Option<u128> {
        self.max_fee_per_gas
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        self.max_priority_fee_per_gas
    }

    fn access_list(&self) -> Option<&[AccessListItem]> {
        self.access_list.as_deref()
    }
}

impl HardforkValidationData for Signed {
    fn to(&self) -> Option<Address> {
        self.kind().to().copied()
    }

    fn gas_price(&self) -> Option<u128> {
        match self.fee() {
            Fee::Legacy { gas_price } => Some(gas_price),
            Fee::Eip1559 { .. } => None,
        }
    }

    fn max_fee_per_gas(&self) -> Option<u128> {
        match self.fee() {
            Fee::Legacy { .. } => None,
            Fee::Eip1559 {
                max_fee_per_gas, ..
            } => Some(max_fee_per_gas),
        }
    }

    fn max_priority_fee_per_gas(&self) -> Option<u128> {
        match self.fee() {
            Fee::Legacy { .. } => None,
            Fee::Eip1559 {
                max_priority_fee_per_gas,
                ..
            } => Some(max_priority_fee_per_gas),
        }
    }

    fn access_list(&self) -> Option<&[AccessListItem]> {
        match self.transaction_type() {
            TransactionType::Legacy => None,
            TransactionType::Eip2930 | TransactionType::Eip1559 => {
                Some(Signed::access_list(self))
            }
        }
    }
}

/// Validates a `TransactionRequest` against the node's chain ID and
/// hardfork.
pub fn validate_send_transaction_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
    request: &TransactionRequest,
) -> Result<(), ProviderError> {
    if let Some(chain_id) = request.chain_id {
        let expected = data.chain_id();
        if chain_id != expected {
            return Err(ProviderError::InvalidChainId {
                expected,
                actual: chain_id,
            });
        }
    }

    if let Some(request_data) = &request.data {
        validate_eip3860_max_initcode_size(
            data.hardfork(),
            data.initial_config().allow_unlimited_contract_size,
            request.to.as_ref(),
            request_data,
        )?;
    }

    if let Some(transaction_type) = request.transaction_type {
        TransactionType::try_from(transaction_type).map_err(|_error| {
            ProviderError::InvalidArgument(format!(
                "Unsupported transaction type {transaction_type}"
            ))
        })?;
    }

    validate_transaction_and_call_request(data.hardfork(), request)
        .map_err(map_unsupported_eip1559_parameters)
}

/// Validates a raw transaction against the node's hardfork.
pub fn validate_raw_transaction<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
    transaction: &Signed,
) -> Result<(), ProviderError> {
    validate_eip3860_max_initcode_size(
        data.hardfork(),
        data.initial_config().allow_unlimited_contract_size,
        transaction.kind().to(),
        transaction.input(),
    )?;

    validate_transaction_and_call_request(data.hardfork(), transaction).map_err(
        |error| match error {
            ProviderError::UnsupportedEIP1559Parameters { .. } => ProviderError::InvalidArgument(
                "Trying to send an EIP-1559 transaction but they are not supported by the current hard fork.\n\nYou can use them by running Hardhat Network with 'hardfork' London or later.".to_string(),
            ),
            error => error,
        },
    )
}

/// Validates a `CallRequest` and `BlockSpec` against the provided hardfork.
pub fn validate_call_request(
    hardfork: Hardfork,
    call_request: &CallRequest,
    block_spec: &BlockSpec,
) -> Result<(), ProviderError> {
    validate_post_merge_block_tags(hardfork, block_spec)?;

    validate_transaction_and_call_request(hardfork, call_request)
        .map_err(map_unsupported_eip1559_parameters)
}

fn map_unsupported_eip1559_parameters(error: ProviderError) -> ProviderError {
    match error {
        ProviderError::UnsupportedEIP1559Parameters {
            minimum_hardfork, ..
        } => ProviderError::InvalidArgument(format!("\
EIP-1559 style fee params (maxFeePerGas or maxPriorityFeePerGas) received but they are not supported by the current hardfork.

You can use them by running Hardhat Network with 'hardfork' {minimum_hardfork:?} or later.")),
        error => error,
    }
}

pub(crate) fn validate_transaction_and_call_request(
    hardfork: Hardfork,
    validation_data: &impl HardforkValidationData,
) -> Result<(), ProviderError> {
    validate_transaction_spec(hardfork, validation_data).map_err(|error| match error {
        ProviderError::UnsupportedAccessListParameter {
            minimum_hardfork, ..
        } => ProviderError::InvalidArgument(format!(
            "\
Access list received but is not supported by the current hardfork.

You can use them by running Hardhat Network with 'hardfork' {minimum_hardfork:?} or later."
        )),
        error => error,
    })
}

fn validate_transaction_spec(
    hardfork: Hardfork,
    value: &impl HardforkValidationData,
) -> Result<(), ProviderError> {
    if !hardfork.is_eip2930_active() && value.access_list().is_some() {
        return Err(ProviderError::UnsupportedAccessListParameter {
            current_hardfork: hardfork,
            minimum_hardfork: Hardfork::Berlin,
        });
    }

    if hardfork < Hardfork::London
        && (value.max_fee_per_gas().is_some() || value.max_priority_fee_per_gas().is_some())
    {
        return Err(ProviderError::UnsupportedEIP1559Parameters {
            current_hardfork: hardfork,
            minimum_hardfork: Hardfork::London,
        });
    }

    if value.gas_price().is_some() {
        if value.max_fee_per_gas().is_some() {
            return Err(ProviderError::InvalidTransactionInput(
                "Cannot send both gasPrice and maxFeePerGas params".to_string(),
            ));
        }

        if value.max_priority_fee_per_gas().is_some() {
            return Err(ProviderError::InvalidTransactionInput(
                "Cannot send both gasPrice and maxPriorityFeePerGas".to_string(),
            ));
        }
    }

    if let (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) =
        (value.max_fee_per_gas(), value.max_priority_fee_per_gas())
    {
        if max_priority_fee_per_gas > max_fee_per_gas {
            return Err(ProviderError::InvalidTransactionInput(format!(
                "maxPriorityFeePerGas ({max_priority_fee_per_gas}) is bigger than maxFeePerGas ({max_fee_per_gas})"
            )));
        }
    }

    Ok(())
}

pub(crate) fn validate_eip3860_max_initcode_size(
    hardfork: Hardfork,
    allow_unlimited_contract_code_size: bool,
    to: Option<&Address>,
    data: &Bytes,
) -> Result<(), ProviderError> {
    if hardfork < Hardfork::Shanghai || to.is_some() || allow_unlimited_contract_code_size {
        return Ok(());
    }

    if data.len() > MAX_INITCODE_SIZE {
        return Err(ProviderError::InvalidArgument(format!("
Trying to send a deployment transaction whose init code length is {}. The max length allowed by EIP-3860 is {}.

Enable the 'allowUnlimitedContractSize' option to allow init codes of any length.", data.len(), MAX_INITCODE_SIZE)));
    }

    Ok(())
}

/// Rejects the `safe` and `finalized` tags before the merge.
pub(crate) fn validate_post_merge_block_tags(
    hardfork: Hardfork,
    block_spec: &BlockSpec,
) -> Result<(), ProviderError> {
    if !hardfork.is_post_merge() {
        if let BlockSpec::Tag(tag @ (BlockTag::Safe | BlockTag::Finalized)) = block_spec {
            return Err(ProviderError::InvalidBlockTag {
                block_tag: *tag,
                hardfork,
            });
        }
    }

    Ok(())
}

/// Validates the parameters of `eth_feeHistory`.
pub(crate) fn validate_fee_history_params(
    block_count: u64,
    reward_percentiles: Option<&[f64]>,
) -> Result<(), ProviderError> {
    use edr_eth::fee_history::MAX_FEE_HISTORY_BLOCK_COUNT;

    if block_count == 0 {
        return Err(ProviderError::InvalidInput(
            "blockCount should be at least 1".to_string(),
        ));
    }

    if block_count > MAX_FEE_HISTORY_BLOCK_COUNT {
        return Err(ProviderError::InvalidInput(format!(
            "blockCount should be at most {MAX_FEE_HISTORY_BLOCK_COUNT}"
        )));
    }

    if let Some(percentiles) = reward_percentiles {
        for (index, percentile) in percentiles.iter().enumerate() {
            if !(0.0..=100.0).contains(percentile) {
                return Err(ProviderError::InvalidInput(format!(
                    "The reward percentile number {} is invalid. It must be a float between 0 and 100, but is {percentile} instead.",
                    index + 1
                )));
            }

            if index > 0 {
                let previous = percentiles[index - 1];
                if *percentile < previous {
                    return Err(ProviderError::InvalidInput(format!(
                        "\
The reward percentiles should be in non-decreasing order, but the percentile number {index} is greater than the next one"
                    )));
                }
            }
        }
    }

    Ok(())
}
