use edr_primitives::{Address, U256};

use crate::{data::ProviderData, time::TimeSinceEpoch, ProviderError};

pub fn handle_get_automine_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<bool, ProviderError> {
    Ok(data.is_auto_mining())
}

pub fn handle_set_coinbase_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    coinbase: Address,
) -> Result<bool, ProviderError> {
    data.set_coinbase(coinbase);

    Ok(true)
}

pub fn handle_set_min_gas_price<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    min_gas_price: U256,
) -> Result<bool, ProviderError> {
    let min_gas_price = to_u128(min_gas_price, "minGasPrice")?;
    data.set_min_gas_price(min_gas_price)?;

    Ok(true)
}

pub fn handle_set_next_block_base_fee_per_gas_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    base_fee_per_gas: U256,
) -> Result<bool, ProviderError> {
    let base_fee_per_gas = to_u128(base_fee_per_gas, "baseFeePerGas")?;
    data.set_next_block_base_fee_per_gas(base_fee_per_gas)?;

    Ok(true)
}

fn to_u128(value: U256, name: &str) -> Result<u128, ProviderError> {
    u128::try_from(value).map_err(|_error| {
        ProviderError::InvalidArgument(format!(
            "{name} must not be greater than or equal to 2^128. Received {value}."
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_fee_is_rejected() {
        let result = to_u128(U256::from(u128::MAX) + U256::from(1), "baseFeePerGas");

        assert!(matches!(result, Err(ProviderError::InvalidArgument(_))));
        assert_eq!(to_u128(U256::from(7), "baseFeePerGas").ok(), Some(7));
    }
}
