use core::{fmt, str::FromStr};

/// Ethereum L1 hardforks, in activation order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize,
)]
pub enum Hardfork {
    /// Frontier
    #[serde(rename = "chainstart")]
    Frontier,
    /// Homestead
    #[serde(rename = "homestead")]
    Homestead,
    /// DAO fork
    #[serde(rename = "dao")]
    DaoFork,
    /// Tangerine Whistle
    #[serde(rename = "tangerineWhistle")]
    Tangerine,
    /// Spurious Dragon
    #[serde(rename = "spuriousDragon")]
    SpuriousDragon,
    /// Byzantium
    #[serde(rename = "byzantium")]
    Byzantium,
    /// Constantinople
    #[serde(rename = "constantinople")]
    Constantinople,
    /// Petersburg
    #[serde(rename = "petersburg")]
    Petersburg,
    /// Istanbul
    #[serde(rename = "istanbul")]
    Istanbul,
    /// Muir Glacier
    #[serde(rename = "muirGlacier")]
    MuirGlacier,
    /// Berlin
    #[serde(rename = "berlin")]
    Berlin,
    /// London
    #[serde(rename = "london")]
    London,
    /// Arrow Glacier
    #[serde(rename = "arrowGlacier")]
    ArrowGlacier,
    /// Gray Glacier
    #[serde(rename = "grayGlacier")]
    GrayGlacier,
    /// Paris
    #[serde(rename = "merge")]
    Merge,
    /// Shanghai
    #[serde(rename = "shanghai")]
    Shanghai,
    /// Cancun
    #[default]
    #[serde(rename = "cancun")]
    Cancun,
    /// Prague
    #[serde(rename = "prague")]
    Prague,
}

const NAMES: &[(Hardfork, &str)] = &[
    (Hardfork::Frontier, "chainstart"),
    (Hardfork::Homestead, "homestead"),
    (Hardfork::DaoFork, "dao"),
    (Hardfork::Tangerine, "tangerineWhistle"),
    (Hardfork::SpuriousDragon, "spuriousDragon"),
    (Hardfork::Byzantium, "byzantium"),
    (Hardfork::Constantinople, "constantinople"),
    (Hardfork::Petersburg, "petersburg"),
    (Hardfork::Istanbul, "istanbul"),
    (Hardfork::MuirGlacier, "muirGlacier"),
    (Hardfork::Berlin, "berlin"),
    (Hardfork::London, "london"),
    (Hardfork::ArrowGlacier, "arrowGlacier"),
    (Hardfork::GrayGlacier, "grayGlacier"),
    (Hardfork::Merge, "merge"),
    (Hardfork::Shanghai, "shanghai"),
    (Hardfork::Cancun, "cancun"),
    (Hardfork::Prague, "prague"),
];

impl Hardfork {
    /// The name of the hardfork, as used in configuration files.
    pub fn name(&self) -> &'static str {
        NAMES
            .iter()
            .find_map(|(hardfork, name)| (hardfork == self).then_some(*name))
            .unwrap_or("unknown")
    }

    /// Whether EIP-1559 fee market rules apply.
    pub fn is_eip1559_active(&self) -> bool {
        *self >= Hardfork::London
    }

    /// Whether EIP-2930 access list transactions are accepted.
    pub fn is_eip2930_active(&self) -> bool {
        *self >= Hardfork::Berlin
    }

    /// Whether the chain uses proof-of-stake, i.e. blocks carry no reward.
    pub fn is_post_merge(&self) -> bool {
        *self >= Hardfork::Merge
    }
}

impl fmt::Display for Hardfork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error that occurs when a hardfork name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hardfork name '{0}'")]
pub struct UnknownHardforkName(pub String);

impl FromStr for Hardfork {
    type Err = UnknownHardforkName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find_map(|(hardfork, name)| (*name == s).then_some(*hardfork))
            .ok_or_else(|| UnknownHardforkName(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for (hardfork, name) in NAMES {
            assert_eq!(hardfork.name(), *name);
            assert_eq!(Hardfork::from_str(name), Ok(*hardfork));
            assert_eq!(
                serde_json::to_string(hardfork).expect("serializes"),
                format!("\"{name}\"")
            );
        }
    }

    #[test]
    fn unknown_name() {
        assert_eq!(
            Hardfork::from_str("paris"),
            Err(UnknownHardforkName("paris".to_owned()))
        );
    }

    #[test]
    fn fee_market_activation() {
        assert!(!Hardfork::Berlin.is_eip1559_active());
        assert!(Hardfork::London.is_eip1559_active());
        assert!(Hardfork::Prague.is_eip1559_active());
    }
}
