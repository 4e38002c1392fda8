use edr_eth::{
    receipt::{Log, Receipt},
    transaction::{Transaction, TransactionRequest},
};
use edr_primitives::{Bytes, B256, U256};
use edr_transaction::{request, Fee, Request, Signed, TransactionType, TxKind};

use crate::{
    blockchain::MinedTransaction,
    data::{
        BlockDataForTransaction, ProviderData, SendTransactionResult, TransactionAndBlock,
        DEFAULT_MAX_PRIORITY_FEE_PER_GAS,
    },
    requests::validation::{validate_raw_transaction, validate_send_transaction_request},
    time::TimeSinceEpoch,
    ProviderError,
};

pub fn handle_get_transaction_by_hash<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
    transaction_hash: B256,
) -> Result<Option<Transaction>, ProviderError> {
    Ok(data
        .transaction_by_hash(&transaction_hash)
        .map(|transaction_and_block| transaction_to_rpc(&transaction_and_block)))
}

pub fn handle_get_transaction_receipt<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
    transaction_hash: B256,
) -> Result<Option<Receipt>, ProviderError> {
    Ok(data
        .mined_transaction(&transaction_hash)
        .map(|mined| receipt_to_rpc(&mined)))
}

pub fn handle_pending_transactions<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<Vec<Transaction>, ProviderError> {
    Ok(data
        .pending_transactions()
        .map(|transaction| {
            transaction_to_rpc(&TransactionAndBlock {
                transaction: transaction.clone(),
                block_data: None,
            })
        })
        .collect())
}

pub fn handle_send_transaction_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    transaction_request: TransactionRequest,
) -> Result<B256, ProviderError> {
    validate_send_transaction_request(data, &transaction_request)?;

    let sender = transaction_request.from;
    let request = resolve_transaction_request(data, transaction_request)?;
    let signed_transaction = data.sign_transaction_request(request, sender)?;

    send_transaction_and_log(data, signed_transaction)
}

pub fn handle_send_raw_transaction_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    raw_transaction: Bytes,
) -> Result<B256, ProviderError> {
    let signed_transaction = Signed::decode(&raw_transaction)
        .map_err(|error| ProviderError::InvalidArgument(error.to_string()))?;

    if let Some(chain_id) = signed_transaction.chain_id() {
        let expected = data.chain_id();
        if chain_id != expected {
            let error = if signed_transaction.transaction_type() == TransactionType::Legacy {
                ProviderError::InvalidEip155TransactionChainId
            } else {
                ProviderError::InvalidArgument(format!(
                    "Trying to send a raw transaction with an invalid chainId. The expected chainId is {expected}"
                ))
            };
            return Err(error);
        }
    }

    validate_raw_transaction(data, &signed_transaction)?;

    send_transaction_and_log(data, signed_transaction)
}

fn send_transaction_and_log<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    signed_transaction: Signed,
) -> Result<B256, ProviderError> {
    let result = data.send_transaction(signed_transaction.clone())?;

    data.logger_mut()
        .log_send_transaction(&signed_transaction, &result.mined_blocks)?;

    fail_on_mined_failure(&result)?;

    Ok(result.transaction_hash)
}

/// A transaction that was auto-mined but failed is still part of the chain;
/// the failure is reported to the sender, together with the hash.
fn fail_on_mined_failure(result: &SendTransactionResult) -> Result<(), ProviderError> {
    match result.transaction_failure() {
        Some(failure) => Err(ProviderError::TransactionFailed(Box::new(failure))),
        None => Ok(()),
    }
}

fn resolve_transaction_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
    transaction_request: TransactionRequest,
) -> Result<Request, ProviderError> {
    let TransactionRequest {
        from,
        to,
        gas_price,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        gas,
        value,
        data: input,
        nonce,
        chain_id,
        access_list,
        // The type is derived from the provided fields
        transaction_type: _,
    } = transaction_request;

    let chain_id = chain_id.unwrap_or_else(|| data.chain_id());
    let gas_limit = gas.unwrap_or_else(|| data.block_gas_limit());
    let input = input.unwrap_or_default();
    let nonce = nonce.map_or_else(|| data.account_next_nonce(&from), Ok)?;
    let value = value.unwrap_or(U256::ZERO);
    let kind = match to {
        Some(to) => TxKind::Call(to),
        None => TxKind::Create,
    };

    let next_block_base_fee_per_gas = data.next_block_base_fee_per_gas();

    let request = match (next_block_base_fee_per_gas, gas_price, access_list) {
        // EIP-1559 is active and no legacy fee was requested
        (Some(base_fee_per_gas), gas_price, access_list)
            if gas_price.is_none()
                || max_fee_per_gas.is_some()
                || max_priority_fee_per_gas.is_some() =>
        {
            let max_fee_for_priority_fee = |max_priority_fee_per_gas: u128| {
                base_fee_per_gas
                    .saturating_mul(2)
                    .saturating_add(max_priority_fee_per_gas)
            };

            let (max_fee_per_gas, max_priority_fee_per_gas) =
                match (max_fee_per_gas, max_priority_fee_per_gas) {
                    (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => {
                        (max_fee_per_gas, max_priority_fee_per_gas)
                    }
                    (Some(max_fee_per_gas), None) => (
                        max_fee_per_gas,
                        max_fee_per_gas.min(DEFAULT_MAX_PRIORITY_FEE_PER_GAS),
                    ),
                    (None, Some(max_priority_fee_per_gas)) => (
                        max_fee_for_priority_fee(max_priority_fee_per_gas),
                        max_priority_fee_per_gas,
                    ),
                    (None, None) => (
                        max_fee_for_priority_fee(DEFAULT_MAX_PRIORITY_FEE_PER_GAS),
                        DEFAULT_MAX_PRIORITY_FEE_PER_GAS,
                    ),
                };

            Request::Eip1559(request::Eip1559 {
                chain_id,
                nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit,
                kind,
                value,
                input,
                access_list: access_list.unwrap_or_default().into(),
            })
        }
        (_, gas_price, Some(access_list)) => Request::Eip2930(request::Eip2930 {
            chain_id,
            nonce,
            gas_price: gas_price.unwrap_or_else(|| data.gas_price()),
            gas_limit,
            kind,
            value,
            input,
            access_list: access_list.into(),
        }),
        (_, gas_price, None) => Request::Legacy(request::Legacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price: gas_price.unwrap_or_else(|| data.gas_price()),
            gas_limit,
            kind,
            value,
            input,
        }),
    };

    Ok(request)
}

/// Converts a pending or mined transaction to its JSON-RPC representation.
pub(crate) fn transaction_to_rpc(transaction_and_block: &TransactionAndBlock) -> Transaction {
    let TransactionAndBlock {
        transaction,
        block_data,
    } = transaction_and_block;

    let (block_hash, block_number, transaction_index, gas_price) = match block_data {
        Some(BlockDataForTransaction {
            block,
            transaction_index,
        }) => {
            let effective_gas_price = usize::try_from(*transaction_index)
                .ok()
                .and_then(|index| block.transactions.get(index))
                .map_or_else(
                    || transaction.gas_price(),
                    |executed| executed.effective_gas_price,
                );

            (
                Some(block.hash),
                Some(block.header.number),
                Some(*transaction_index),
                effective_gas_price,
            )
        }
        None => (None, None, None, transaction.gas_price()),
    };

    let transaction_type = transaction.transaction_type();
    let (max_fee_per_gas, max_priority_fee_per_gas) = match transaction.fee() {
        Fee::Legacy { .. } => (None, None),
        Fee::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)),
    };

    let signature = transaction.signature();

    Transaction {
        hash: *transaction.hash(),
        nonce: transaction.nonce(),
        block_hash,
        block_number,
        transaction_index,
        from: *transaction.caller(),
        to: transaction.kind().to().copied(),
        value: transaction.value(),
        gas_price,
        gas: transaction.gas_limit(),
        input: transaction.input().clone(),
        v: transaction.v(),
        r: signature.r(),
        s: signature.s(),
        chain_id: transaction.chain_id(),
        transaction_type: transaction_type.into(),
        access_list: (transaction_type != TransactionType::Legacy)
            .then(|| transaction.access_list().to_vec()),
        max_fee_per_gas,
        max_priority_fee_per_gas,
    }
}

/// Converts a mined transaction to its JSON-RPC receipt.
pub(crate) fn receipt_to_rpc(mined: &MinedTransaction) -> Receipt {
    let block = &mined.block;
    let executed = mined.executed();
    let transaction = &executed.transaction;
    let transaction_index = mined.index as u64;

    // Log indices are counted across the whole block
    let first_log_index: usize = block.transactions[..mined.index]
        .iter()
        .map(|previous| previous.result.logs().len())
        .sum();

    let logs = executed
        .result
        .logs()
        .iter()
        .enumerate()
        .map(|(index, log)| Log {
            address: log.address,
            topics: log.data.topics().to_vec(),
            data: log.data.data.clone(),
            block_hash: block.hash,
            block_number: block.header.number,
            transaction_hash: *transaction.hash(),
            transaction_index,
            log_index: (first_log_index + index) as u64,
            removed: false,
        })
        .collect();

    let previous_cumulative_gas_used = mined
        .index
        .checked_sub(1)
        .map_or(0, |previous| block.transactions[previous].cumulative_gas_used);

    Receipt {
        transaction_hash: *transaction.hash(),
        transaction_index,
        block_hash: block.hash,
        block_number: block.header.number,
        from: *transaction.caller(),
        to: transaction.kind().to().copied(),
        cumulative_gas_used: executed.cumulative_gas_used,
        gas_used: executed.cumulative_gas_used - previous_cumulative_gas_used,
        effective_gas_price: executed.effective_gas_price,
        contract_address: executed.contract_address(),
        logs,
        logs_bloom: executed.logs_bloom,
        transaction_type: transaction.transaction_type().into(),
        status: u8::from(executed.is_success()),
    }
}
