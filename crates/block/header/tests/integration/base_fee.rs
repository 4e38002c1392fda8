use edr_block_header::{
    calculate_next_base_fee_per_gas, BlockConfig, BlockHeader, HeaderOverrides, PartialHeader,
};
use edr_chain_config::{chains::l1_chain_config, Hardfork};
use edr_eip1559::{BaseFeeParams, INITIAL_BASE_FEE};
use edr_primitives::KECCAK_NULL_RLP;

const DEFAULT_INITIAL_BASE_FEE: u128 = INITIAL_BASE_FEE as u128;
const L1_MAINNET_CHAIN_ID: u64 = 1;

fn mainnet_block_config(hardfork: Hardfork) -> BlockConfig {
    let chain_config =
        l1_chain_config(L1_MAINNET_CHAIN_ID).expect("L1 Mainnet config should exist");

    BlockConfig {
        base_fee_params: chain_config.base_fee_params,
        hardfork,
    }
}

fn mine_child(config: &BlockConfig, parent: &BlockHeader, gas_used: u64) -> BlockHeader {
    let mut partial_header = PartialHeader::new(
        config,
        HeaderOverrides {
            gas_limit: Some(parent.gas_limit),
            ..HeaderOverrides::default()
        },
        Some(parent),
    );
    partial_header.gas_used = gas_used;

    BlockHeader::new(partial_header, KECCAK_NULL_RLP)
}

#[test]
fn test_partial_header_uses_base_fee_override() {
    let configured_base_fee = 2_000_000_000;
    let overrides = HeaderOverrides {
        base_fee: Some(configured_base_fee),
        ..HeaderOverrides::default()
    };

    let block_config = mainnet_block_config(Hardfork::London);
    let partial_header = PartialHeader::new(&block_config, overrides, None);

    assert_eq!(partial_header.base_fee, Some(configured_base_fee));
}

#[test]
fn test_partial_header_base_fee_override_takes_precedence_over_base_fee_params_override() {
    let configured_base_fee = 2_000_000_000;
    let overrides = HeaderOverrides {
        base_fee: Some(configured_base_fee),
        base_fee_params: Some(BaseFeeParams::new(50, 2)),
        ..HeaderOverrides::default()
    };

    let block_config = mainnet_block_config(Hardfork::London);
    let partial_header = PartialHeader::new(&block_config, overrides, None);

    assert_eq!(partial_header.base_fee, Some(configured_base_fee));
}

#[test]
fn test_partial_header_ignores_base_fee_params_if_before_london() {
    let overrides = HeaderOverrides {
        base_fee_params: Some(BaseFeeParams::new(50, 2)),
        ..HeaderOverrides::default()
    };

    let block_config = mainnet_block_config(Hardfork::Berlin);
    let partial_header = PartialHeader::new(&block_config, overrides, None);

    assert_eq!(partial_header.base_fee, None);
}

#[test]
fn test_partial_header_uses_initial_base_fee_without_parent() {
    let block_config = mainnet_block_config(Hardfork::London);
    let partial_header = PartialHeader::new(&block_config, HeaderOverrides::default(), None);

    assert_eq!(partial_header.base_fee, Some(DEFAULT_INITIAL_BASE_FEE));
}

#[test]
fn test_partial_header_uses_base_fee_params_override_with_parent() {
    let block_config = mainnet_block_config(Hardfork::London);
    let genesis = BlockHeader::new(
        PartialHeader::new(
            &block_config,
            HeaderOverrides {
                gas_limit: Some(84_000),
                ..HeaderOverrides::default()
            },
            None,
        ),
        KECCAK_NULL_RLP,
    );

    // An empty parent with a max change denominator of 4 decreases the base fee
    // by a quarter
    let overrides = HeaderOverrides {
        base_fee_params: Some(BaseFeeParams::new(4, 2)),
        ..HeaderOverrides::default()
    };
    let partial_header = PartialHeader::new(&block_config, overrides, Some(&genesis));

    assert_eq!(partial_header.base_fee, Some(750_000_000));
}

#[test]
fn test_base_fee_sequence() {
    let block_config = mainnet_block_config(Hardfork::London);
    let genesis = BlockHeader::new(
        PartialHeader::new(
            &block_config,
            HeaderOverrides {
                gas_limit: Some(84_000),
                ..HeaderOverrides::default()
            },
            None,
        ),
        KECCAK_NULL_RLP,
    );
    assert_eq!(genesis.base_fee_per_gas, Some(DEFAULT_INITIAL_BASE_FEE));

    let first = mine_child(&block_config, &genesis, 21_000);
    assert_eq!(first.base_fee_per_gas, Some(875_000_000));

    let second = mine_child(&block_config, &first, 42_000);
    assert_eq!(second.base_fee_per_gas, Some(820_312_500));

    let third = mine_child(&block_config, &second, 84_000);
    assert_eq!(third.base_fee_per_gas, Some(820_312_500));

    assert_eq!(
        calculate_next_base_fee_per_gas(&third, &block_config.base_fee_params),
        922_851_562
    );
}

#[test]
fn test_first_london_block_after_legacy_parent() {
    let legacy = BlockHeader::new(
        PartialHeader::new(
            &mainnet_block_config(Hardfork::Berlin),
            HeaderOverrides::default(),
            None,
        ),
        KECCAK_NULL_RLP,
    );
    assert_eq!(legacy.base_fee_per_gas, None);

    let london = PartialHeader::new(
        &mainnet_block_config(Hardfork::London),
        HeaderOverrides::default(),
        Some(&legacy),
    );
    assert_eq!(london.base_fee, Some(DEFAULT_INITIAL_BASE_FEE));
}
