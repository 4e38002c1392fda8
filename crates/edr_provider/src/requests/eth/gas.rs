use edr_chain_config::Hardfork;
use edr_eth::{fee_history::FeeHistoryResult, transaction::CallRequest, BlockSpec};
use edr_primitives::{U256, U64};

use crate::{
    data::ProviderData,
    requests::{
        eth::call::resolve_call_request,
        validation::{
            validate_call_request, validate_fee_history_params, validate_post_merge_block_tags,
        },
    },
    time::TimeSinceEpoch,
    ProviderError,
};

pub fn handle_estimate_gas<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    request: CallRequest,
    block_spec: Option<BlockSpec>,
) -> Result<U64, ProviderError> {
    // Matching Hardhat behavior in defaulting to "pending" instead of "latest" for
    // estimate gas.
    let block_spec = block_spec.unwrap_or_else(BlockSpec::pending);
    validate_call_request(data.hardfork(), &request, &block_spec)?;

    let transaction = resolve_call_request(data, request, &block_spec)?;
    let estimation = data.estimate_gas(transaction, &block_spec)?;

    Ok(U64::from(estimation))
}

pub fn handle_fee_history<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    block_count: U256,
    newest_block: BlockSpec,
    reward_percentiles: Option<Vec<f64>>,
) -> Result<FeeHistoryResult, ProviderError> {
    if data.hardfork() < Hardfork::London {
        return Err(ProviderError::InvalidInput(
            "eth_feeHistory is disabled. It only works with the London hardfork or a later one."
                .into(),
        ));
    }

    let block_count: u64 = block_count
        .try_into()
        .map_err(|_error| ProviderError::InvalidInput("blockCount should be at most 1024".into()))?;

    validate_fee_history_params(block_count, reward_percentiles.as_deref())?;
    validate_post_merge_block_tags(data.hardfork(), &newest_block)?;

    data.fee_history(block_count, &newest_block, reward_percentiles)
}

#[cfg(test)]
mod tests {
    use edr_primitives::Address;

    use super::*;
    use crate::test_utils::{create_test_config, ProviderTestFixture};

    #[test]
    fn estimate_transfer() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let estimation = handle_estimate_gas(
            &mut fixture.provider_data,
            CallRequest {
                to: Some(Address::repeat_byte(0x01)),
                value: Some(U256::from(1)),
                ..CallRequest::default()
            },
            None,
        )?;

        assert_eq!(estimation, U64::from(21_001));

        Ok(())
    }

    #[test]
    fn fee_history_disabled_before_london() -> anyhow::Result<()> {
        let mut config = create_test_config();
        config.hardfork = Hardfork::Berlin;
        config.initial_base_fee_per_gas = None;
        let mut fixture = ProviderTestFixture::with_config(config)?;

        let result = handle_fee_history(
            &mut fixture.provider_data,
            U256::from(1),
            BlockSpec::latest(),
            None,
        );
        assert!(matches!(result, Err(ProviderError::InvalidInput(_))));

        Ok(())
    }

    #[test]
    fn fee_history_block_count_bounds() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        for block_count in [U256::ZERO, U256::from(1025), U256::MAX] {
            let result = handle_fee_history(
                &mut fixture.provider_data,
                block_count,
                BlockSpec::latest(),
                None,
            );
            assert!(matches!(result, Err(ProviderError::InvalidInput(_))));
        }

        let result = handle_fee_history(
            &mut fixture.provider_data,
            U256::from(1),
            BlockSpec::latest(),
            Some(vec![50.0, 25.0]),
        );
        assert!(matches!(result, Err(ProviderError::InvalidInput(_))));

        Ok(())
    }

    #[test]
    fn fee_history_of_latest_block() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let result = handle_fee_history(
            &mut fixture.provider_data,
            U256::from(1),
            BlockSpec::latest(),
            Some(vec![25.0, 75.0]),
        )?;

        assert_eq!(result.oldest_block, 0);
        // The base fee of the next block is included
        assert_eq!(result.base_fee_per_gas.len(), 2);
        assert_eq!(result.gas_used_ratio, vec![0.0]);
        assert_eq!(result.reward, Some(vec![vec![U256::ZERO, U256::ZERO]]));

        Ok(())
    }
}
