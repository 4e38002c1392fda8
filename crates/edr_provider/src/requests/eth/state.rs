use edr_eth::BlockSpec;
use edr_primitives::{Address, Bytes, B256, U256, U64};

use crate::{
    data::ProviderData, requests::validation::validate_post_merge_block_tags,
    time::TimeSinceEpoch, ProviderError,
};

pub fn handle_get_balance_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    address: Address,
    block_spec: Option<BlockSpec>,
) -> Result<U256, ProviderError> {
    if let Some(block_spec) = block_spec.as_ref() {
        validate_post_merge_block_tags(data.hardfork(), block_spec)?;
    }

    data.balance(address, block_spec.as_ref())
}

pub fn handle_get_code_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    address: Address,
    block_spec: Option<BlockSpec>,
) -> Result<Bytes, ProviderError> {
    if let Some(block_spec) = block_spec.as_ref() {
        validate_post_merge_block_tags(data.hardfork(), block_spec)?;
    }

    data.get_code(address, block_spec.as_ref())
}

/// Returns the slot value as a 32-byte, zero-padded hex string.
pub fn handle_get_storage_at_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    address: Address,
    index: U256,
    block_spec: Option<BlockSpec>,
) -> Result<String, ProviderError> {
    if let Some(block_spec) = block_spec.as_ref() {
        validate_post_merge_block_tags(data.hardfork(), block_spec)?;
    }

    let value = data.get_storage_at(address, index, block_spec.as_ref())?;
    Ok(B256::from(value).to_string())
}

pub fn handle_get_transaction_count_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    address: Address,
    block_spec: Option<BlockSpec>,
) -> Result<U64, ProviderError> {
    if let Some(block_spec) = block_spec.as_ref() {
        validate_post_merge_block_tags(data.hardfork(), block_spec)?;
    }

    data.get_transaction_count(address, block_spec.as_ref())
        .map(U64::from)
}

#[cfg(test)]
mod tests {
    use edr_chain_config::Hardfork;
    use edr_eth::BlockTag;

    use super::*;
    use crate::test_utils::{create_test_config, one_ether, ProviderTestFixture};

    #[test]
    fn storage_is_padded() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        let address = Address::repeat_byte(0x0a);

        fixture
            .provider_data
            .set_account_storage_slot(address, U256::from(1), U256::from(0xff))?;

        let value = handle_get_storage_at_request(
            &mut fixture.provider_data,
            address,
            U256::from(1),
            None,
        )?;
        assert_eq!(
            value,
            "0x00000000000000000000000000000000000000000000000000000000000000ff"
        );

        Ok(())
    }

    #[test]
    fn balance_of_owned_account() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        let account = fixture.first_account();

        let balance =
            handle_get_balance_request(&mut fixture.provider_data, account, None)?;
        assert_eq!(balance, one_ether() * U256::from(1000));

        Ok(())
    }

    #[test]
    fn post_merge_tags_rejected_before_merge() -> anyhow::Result<()> {
        let mut config = create_test_config();
        config.hardfork = Hardfork::London;
        let mut fixture = ProviderTestFixture::with_config(config)?;

        let result = handle_get_code_request(
            &mut fixture.provider_data,
            Address::repeat_byte(0x0a),
            Some(BlockSpec::Tag(BlockTag::Safe)),
        );
        assert!(matches!(result, Err(ProviderError::InvalidBlockTag { .. })));

        Ok(())
    }

    #[test]
    fn pending_transaction_count_includes_pool() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let transaction = fixture.signed_dummy_transaction(0)?;
        fixture.provider_data.send_transaction(transaction)?;

        let account = fixture.first_account();
        let latest = handle_get_transaction_count_request(
            &mut fixture.provider_data,
            account,
            Some(BlockSpec::latest()),
        )?;
        assert_eq!(latest, U64::ZERO);

        let pending = handle_get_transaction_count_request(
            &mut fixture.provider_data,
            account,
            Some(BlockSpec::pending()),
        )?;
        assert_eq!(pending, U64::from(1));

        Ok(())
    }
}
