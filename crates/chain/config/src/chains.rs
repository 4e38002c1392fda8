//! Configurations for well-known Ethereum L1 chains.

use std::sync::OnceLock;

use edr_eip1559::BaseFeeParams;

use crate::{ChainConfig, ForkCondition, Hardfork, HardforkActivation};

/// Mainnet chain ID
pub const MAINNET_CHAIN_ID: u64 = 0x1;

const MAINNET_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: Hardfork::Frontier,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_150_000),
        hardfork: Hardfork::Homestead,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_920_000),
        hardfork: Hardfork::DaoFork,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_463_000),
        hardfork: Hardfork::Tangerine,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_675_000),
        hardfork: Hardfork::SpuriousDragon,
    },
    HardforkActivation {
        condition: ForkCondition::Block(4_370_000),
        hardfork: Hardfork::Byzantium,
    },
    HardforkActivation {
        condition: ForkCondition::Block(7_280_000),
        hardfork: Hardfork::Petersburg,
    },
    HardforkActivation {
        condition: ForkCondition::Block(9_069_000),
        hardfork: Hardfork::Istanbul,
    },
    HardforkActivation {
        condition: ForkCondition::Block(9_200_000),
        hardfork: Hardfork::MuirGlacier,
    },
    HardforkActivation {
        condition: ForkCondition::Block(12_244_000),
        hardfork: Hardfork::Berlin,
    },
    HardforkActivation {
        condition: ForkCondition::Block(12_965_000),
        hardfork: Hardfork::London,
    },
    HardforkActivation {
        condition: ForkCondition::Block(13_773_000),
        hardfork: Hardfork::ArrowGlacier,
    },
    HardforkActivation {
        condition: ForkCondition::Block(15_050_000),
        hardfork: Hardfork::GrayGlacier,
    },
    HardforkActivation {
        condition: ForkCondition::Block(15_537_394),
        hardfork: Hardfork::Merge,
    },
    HardforkActivation {
        condition: ForkCondition::Block(17_034_870),
        hardfork: Hardfork::Shanghai,
    },
    HardforkActivation {
        condition: ForkCondition::Block(19_426_589),
        hardfork: Hardfork::Cancun,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_746_612_311),
        hardfork: Hardfork::Prague,
    },
];

/// Sepolia chain ID
pub const SEPOLIA_CHAIN_ID: u64 = 0xaa36a7;

const SEPOLIA_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: Hardfork::London,
    },
    HardforkActivation {
        condition: ForkCondition::Block(1_450_409),
        hardfork: Hardfork::Merge,
    },
    HardforkActivation {
        condition: ForkCondition::Block(2_990_908),
        hardfork: Hardfork::Shanghai,
    },
    HardforkActivation {
        condition: ForkCondition::Block(5_187_023),
        hardfork: Hardfork::Cancun,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_741_159_776),
        hardfork: Hardfork::Prague,
    },
];

/// Holesky chain ID
pub const HOLESKY_CHAIN_ID: u64 = 0x4268;

const HOLESKY_HARDFORKS: &[HardforkActivation] = &[
    HardforkActivation {
        condition: ForkCondition::Block(0),
        hardfork: Hardfork::Merge,
    },
    HardforkActivation {
        condition: ForkCondition::Block(6_698),
        hardfork: Hardfork::Shanghai,
    },
    HardforkActivation {
        condition: ForkCondition::Block(894_733),
        hardfork: Hardfork::Cancun,
    },
    HardforkActivation {
        condition: ForkCondition::Timestamp(1_740_434_112),
        hardfork: Hardfork::Prague,
    },
];

fn config(name: &str, hardforks: &[HardforkActivation]) -> ChainConfig {
    ChainConfig {
        name: name.to_owned(),
        hardfork_activations: hardforks.into(),
        base_fee_params: BaseFeeParams::ethereum(),
    }
}

/// Returns the configuration of a well-known chain, if any.
pub fn l1_chain_config(chain_id: u64) -> Option<&'static ChainConfig> {
    static MAINNET: OnceLock<ChainConfig> = OnceLock::new();
    static SEPOLIA: OnceLock<ChainConfig> = OnceLock::new();
    static HOLESKY: OnceLock<ChainConfig> = OnceLock::new();

    match chain_id {
        MAINNET_CHAIN_ID => Some(MAINNET.get_or_init(|| config("Mainnet", MAINNET_HARDFORKS))),
        SEPOLIA_CHAIN_ID => Some(SEPOLIA.get_or_init(|| config("Sepolia", SEPOLIA_HARDFORKS))),
        HOLESKY_CHAIN_ID => Some(HOLESKY.get_or_init(|| config("Holesky", HOLESKY_HARDFORKS))),
        _ => None,
    }
}

/// The number of blocks after which a block of the specified chain is
/// considered final, i.e. safe from reorgs.
pub fn largest_possible_reorg(chain_id: u64) -> u64 {
    match chain_id {
        MAINNET_CHAIN_ID | SEPOLIA_CHAIN_ID | HOLESKY_CHAIN_ID => 5,
        _ => 30,
    }
}
