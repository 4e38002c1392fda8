use edr_chain_config::Hardfork;
use edr_eth::{transaction::CallRequest, BlockSpec};
use edr_primitives::{Bytes, U256};
use edr_transaction::{request, Request, Signed, TxKind};

use crate::{
    data::ProviderData, requests::validation::validate_call_request, time::TimeSinceEpoch,
    ProviderError, TransactionFailure,
};

pub fn handle_call_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    request: CallRequest,
    block_spec: Option<BlockSpec>,
) -> Result<Bytes, ProviderError> {
    let block_spec = block_spec.unwrap_or_else(BlockSpec::latest);
    validate_call_request(data.hardfork(), &request, &block_spec)?;

    let transaction = resolve_call_request(data, request, &block_spec)?;
    let result = data.run_call(transaction, &block_spec)?;

    if let Some(failure) = TransactionFailure::from_execution_result(&result, None) {
        return Err(ProviderError::TransactionFailed(Box::new(failure)));
    }

    Ok(result.output().cloned().unwrap_or_default())
}

/// Converts a call request into an impersonated transaction. Calls are free,
/// so unspecified fees default to zero.
pub(crate) fn resolve_call_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    request: CallRequest,
    block_spec: &BlockSpec,
) -> Result<Signed, ProviderError> {
    let CallRequest {
        from,
        to,
        gas,
        gas_price,
        max_fee_per_gas,
        max_priority_fee_per_gas,
        value,
        data: input,
        access_list,
    } = request;

    let sender = from.unwrap_or_else(|| data.default_caller());
    let nonce = data.get_transaction_count(sender, Some(block_spec))?;

    let chain_id = data.chain_id();
    let gas_limit = gas.unwrap_or_else(|| data.block_gas_limit());
    let kind = to.map_or(TxKind::Create, TxKind::Call);
    let value = value.unwrap_or(U256::ZERO);
    let input = input.unwrap_or_default();

    let hardfork = data.hardfork();
    let request = if hardfork >= Hardfork::London && gas_price.is_none() {
        let max_fee_per_gas = max_fee_per_gas.or(max_priority_fee_per_gas).unwrap_or(0);
        let max_priority_fee_per_gas = max_priority_fee_per_gas.unwrap_or(0);

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
    } else if let Some(access_list) = access_list {
        Request::Eip2930(request::Eip2930 {
            chain_id,
            nonce,
            gas_price: gas_price.unwrap_or(0),
            gas_limit,
            kind,
            value,
            input,
            access_list: access_list.into(),
        })
    } else {
        Request::Legacy(request::Legacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price: gas_price.unwrap_or(0),
            gas_limit,
            kind,
            value,
            input,
        })
    };

    Ok(request.fake_sign(sender))
}
