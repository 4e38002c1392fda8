use std::num::NonZeroU64;

use edr_provider::{
    test_utils::{create_test_config, ProviderTestFixture},
    BlockOptions,
};

fn fixture_with_gas_limit(block_gas_limit: u64) -> anyhow::Result<ProviderTestFixture> {
    let mut config = create_test_config();
    config.block_gas_limit = NonZeroU64::new(block_gas_limit).expect("non-zero");
    config.mining.auto_mine = false;

    ProviderTestFixture::with_config(config)
}

#[test]
fn block_is_packed_up_to_the_gas_limit() -> anyhow::Result<()> {
    let mut fixture = fixture_with_gas_limit(45_000)?;

    for nonce in 0..4 {
        let transaction = fixture.signed_dummy_transaction(nonce)?;
        fixture.provider_data.send_transaction(transaction)?;
    }

    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;

    assert_eq!(block.transactions.len(), 2);
    assert_eq!(block.header.gas_used, 42_000);
    assert_eq!(fixture.provider_data.pending_transactions().count(), 2);

    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;

    assert_eq!(block.transactions.len(), 2);
    assert_eq!(fixture.provider_data.pending_transactions().count(), 0);

    Ok(())
}

#[test]
fn base_fee_follows_gas_used() -> anyhow::Result<()> {
    let mut fixture = fixture_with_gas_limit(84_000)?;

    assert_eq!(
        fixture.provider_data.last_block().header.base_fee_per_gas,
        Some(1_000_000_000)
    );

    // Half the gas target
    let transaction = fixture.signed_dummy_transaction(0)?;
    fixture.provider_data.send_transaction(transaction)?;
    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;

    assert_eq!(block.header.gas_used, 21_000);
    assert_eq!(block.header.base_fee_per_gas, Some(875_000_000));

    // One and a half times the gas target
    for nonce in 1..4 {
        let transaction = fixture.signed_dummy_transaction(nonce)?;
        fixture.provider_data.send_transaction(transaction)?;
    }
    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;

    assert_eq!(block.header.gas_used, 63_000);
    assert_eq!(block.header.base_fee_per_gas, Some(820_312_500));

    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;

    assert!(block.transactions.is_empty());
    assert_eq!(block.header.base_fee_per_gas, Some(871_582_031));

    Ok(())
}

#[test]
fn overridden_base_fee_applies_to_a_single_block() -> anyhow::Result<()> {
    let mut fixture = fixture_with_gas_limit(30_000_000)?;

    fixture
        .provider_data
        .set_next_block_base_fee_per_gas(5_000_000_000)?;
    assert_eq!(fixture.provider_data.gas_price(), 5_000_000_000);

    let block = fixture
        .provider_data
        .mine_and_commit_block(BlockOptions::default())?;
    assert_eq!(block.header.base_fee_per_gas, Some(5_000_000_000));

    // Empty block, so the base fee decreases by 1/8
    assert_eq!(
        fixture.provider_data.next_block_base_fee_per_gas(),
        Some(4_375_000_000)
    );

    Ok(())
}

#[test]
fn lowered_gas_limit_evicts_pending_transactions() -> anyhow::Result<()> {
    let mut fixture = fixture_with_gas_limit(30_000_000)?;

    let transaction = fixture.signed_dummy_transaction(0)?;
    fixture.provider_data.send_transaction(transaction)?;

    fixture
        .provider_data
        .set_block_gas_limit(NonZeroU64::new(20_000).expect("non-zero"))?;

    assert_eq!(fixture.provider_data.pending_transactions().count(), 0);

    Ok(())
}
