use std::{num::NonZeroU64, time::SystemTime};

use edr_block_miner::MineOrdering;
use edr_chain_config::{ChainConfig, Hardfork};
use edr_primitives::{Address, Bytes, ChainId, HashMap, U256};
use rand::Rng as _;
use serde::{Deserialize, Serialize};

use crate::requests::IntervalConfig as IntervalConfigRequest;

/// Configuration of an account and its storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverride {
    /// If present, the overwriting balance.
    pub balance: Option<U256>,
    /// If present, the overwriting nonce.
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub nonce: Option<u64>,
    /// If present, the overwriting code.
    pub code: Option<Bytes>,
    /// If present, the overwriting storage
    pub storage: Option<HashMap<U256, U256>>,
}

/// Configuration for forking a remote chain.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkConfig {
    /// JSON-RPC URL of the remote archive node
    pub url: String,
    /// Block to fork from. Defaults to the latest reorg-safe block.
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub block_number: Option<u64>,
    /// Headers sent with every remote request
    #[serde(default)]
    pub http_headers: Option<std::collections::HashMap<String, String>>,
}

/// Configuration for interval mining.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all_fields = "camelCase")]
pub enum IntervalConfig {
    /// Mine every `n` milliseconds
    Fixed(NonZeroU64),
    /// Mine after a random number of milliseconds in the inclusive range
    Range {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },
}

impl IntervalConfig {
    /// Generates a (random) interval based on the configuration.
    pub fn generate_interval(&self) -> u64 {
        match self {
            IntervalConfig::Fixed(interval) => interval.get(),
            IntervalConfig::Range { min, max } => rand::rng().random_range(*min..=*max),
        }
    }
}

/// An error that occurs when trying to convert [`IntervalConfigRequest`] to an
/// `Option<IntervalConfig>`.
#[derive(Debug, thiserror::Error)]
pub enum IntervalConfigConversionError {
    /// The minimum value in the range is greater than the maximum value.
    #[error("Minimum value in range is greater than maximum value")]
    MinGreaterThanMax,
}

impl TryInto<Option<IntervalConfig>> for IntervalConfigRequest {
    type Error = IntervalConfigConversionError;

    fn try_into(self) -> Result<Option<IntervalConfig>, Self::Error> {
        match self {
            // Zero implies disabled
            Self::FixedOrDisabled(value) => Ok(NonZeroU64::new(value).map(IntervalConfig::Fixed)),
            Self::Range([min, max]) => {
                if max >= min {
                    Ok(Some(IntervalConfig::Range { min, max }))
                } else {
                    Err(IntervalConfigConversionError::MinGreaterThanMax)
                }
            }
        }
    }
}

/// Configuration for the provider's mem pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemPoolConfig {
    /// Order in which pending transactions are mined
    pub order: MineOrdering,
}

/// Configuration for the provider's miner.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningConfig {
    /// Whether every admitted transaction is mined immediately
    pub auto_mine: bool,
    /// Interval mining, if enabled
    pub interval: Option<IntervalConfig>,
    /// Mem pool configuration
    pub mem_pool: MemPoolConfig,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            auto_mine: true,
            interval: None,
            mem_pool: MemPoolConfig::default(),
        }
    }
}

/// Configuration for the provider
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Whether consecutive blocks may have the same timestamp
    pub allow_blocks_with_same_timestamp: bool,
    /// Whether contracts of any size can be deployed
    pub allow_unlimited_contract_size: bool,
    /// Gas limit of mined blocks
    pub block_gas_limit: NonZeroU64,
    /// Chain ID of the local chain
    #[serde(with = "alloy_serde::quantity")]
    pub chain_id: ChainId,
    /// Configurations of known chains, used to resolve the hardfork of
    /// historical blocks in fork mode
    #[serde(default)]
    pub chains: HashMap<ChainId, ChainConfig>,
    /// Beneficiary of mined blocks
    pub coinbase: Address,
    /// Remote chain to fork, if any
    pub fork: Option<ForkConfig>,
    /// Accounts that are created, or overridden in fork mode, at genesis
    #[serde(default)]
    pub genesis_state: HashMap<Address, AccountOverride>,
    /// Hardfork of locally mined blocks
    pub hardfork: Hardfork,
    /// Base fee of the first locally mined block
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub initial_base_fee_per_gas: Option<u128>,
    /// Timestamp of the genesis block
    pub initial_date: Option<SystemTime>,
    /// Minimum gas price of mined transactions, before EIP-1559
    #[serde(with = "alloy_serde::quantity")]
    pub min_gas_price: u128,
    /// Mining configuration
    pub mining: MiningConfig,
    /// Network ID reported by `net_version`
    #[serde(with = "alloy_serde::quantity")]
    pub network_id: u64,
    /// Accounts whose secret keys are held by the provider
    #[serde(with = "secret_keys")]
    pub owned_accounts: Vec<k256::SecretKey>,
}

mod secret_keys {
    use edr_primitives::hex;
    #[allow(deprecated)]
    // Secret keys are only parsed from configuration
    use edr_signer::{secret_key_from_str, DangerousSecretKeyStr};
    use serde::{de::Error as _, ser::SerializeSeq as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<SerializerT: Serializer>(
        secret_keys: &[k256::SecretKey],
        serializer: SerializerT,
    ) -> Result<SerializerT::Ok, SerializerT::Error> {
        let mut seq = serializer.serialize_seq(Some(secret_keys.len()))?;
        for secret_key in secret_keys {
            seq.serialize_element(&hex::encode_prefixed(secret_key.to_bytes()))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, DeserializerT: Deserializer<'de>>(
        deserializer: DeserializerT,
    ) -> Result<Vec<k256::SecretKey>, DeserializerT::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|secret_key| {
                #[allow(deprecated)]
                secret_key_from_str(DangerousSecretKeyStr(secret_key)).map_err(DeserializerT::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_config_conversion() -> anyhow::Result<()> {
        let disabled: Option<IntervalConfig> = IntervalConfigRequest::FixedOrDisabled(0).try_into()?;
        assert_eq!(disabled, None);

        let fixed: Option<IntervalConfig> = IntervalConfigRequest::FixedOrDisabled(100).try_into()?;
        assert_eq!(fixed.map(|interval| interval.generate_interval()), Some(100));

        let range: Option<IntervalConfig> = IntervalConfigRequest::Range([10, 20]).try_into()?;
        let interval = range.map(|interval| interval.generate_interval()).unwrap_or_default();
        assert!((10..=20).contains(&interval));

        let invalid: Result<Option<IntervalConfig>, _> = IntervalConfigRequest::Range([20, 10]).try_into();
        assert!(matches!(invalid, Err(IntervalConfigConversionError::MinGreaterThanMax)));

        Ok(())
    }

    #[test]
    fn mining_defaults_to_auto_mine() {
        let mining = MiningConfig::default();
        assert!(mining.auto_mine);
        assert_eq!(mining.interval, None);
        assert_eq!(mining.mem_pool.order, MineOrdering::Priority);
    }
}
