use edr_primitives::{Address, U256, U64};

use crate::{
    data::{ProviderData, DEFAULT_MAX_PRIORITY_FEE_PER_GAS},
    time::TimeSinceEpoch,
    ProviderError,
};

pub fn handle_chain_id_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<U64, ProviderError> {
    Ok(U64::from(data.chain_id()))
}

pub fn handle_coinbase_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<Address, ProviderError> {
    Ok(data.coinbase())
}

pub fn handle_gas_price<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<U256, ProviderError> {
    Ok(U256::from(data.gas_price()))
}

pub fn handle_max_priority_fee_per_gas() -> Result<U256, ProviderError> {
    Ok(U256::from(DEFAULT_MAX_PRIORITY_FEE_PER_GAS))
}

pub fn handle_net_version_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<String, ProviderError> {
    Ok(data.network_id())
}
