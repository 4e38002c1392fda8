use core::fmt;

use edr_primitives::B256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    /// The genesis block
    Earliest,
    /// The most recently mined block
    Latest,
    /// The block that would be mined next
    Pending,
    /// The most recent safe block
    Safe,
    /// The most recent finalized block
    Finalized,
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockTag::Earliest => "earliest",
            BlockTag::Latest => "latest",
            BlockTag::Pending => "pending",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
        };

        f.write_str(name)
    }
}

/// A block identifier: a number, a tag, or (per EIP-1898) a hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockSpec {
    /// Block number
    Number(u64),
    /// Block tag
    Tag(BlockTag),
    /// Block hash
    Hash {
        /// The hash of the block
        block_hash: B256,
        /// Whether the block must be part of the canonical chain
        require_canonical: Option<bool>,
    },
}

impl BlockSpec {
    /// Constructs a spec for the latest block.
    pub const fn latest() -> Self {
        Self::Tag(BlockTag::Latest)
    }

    /// Constructs a spec for the pending block.
    pub const fn pending() -> Self {
        Self::Tag(BlockTag::Pending)
    }
}

impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSpec::Number(number) => write!(f, "{number}"),
            BlockSpec::Tag(tag) => write!(f, "{tag}"),
            BlockSpec::Hash { block_hash, .. } => write!(f, "{block_hash}"),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum BlockSpecRepr {
    Number(#[serde(with = "alloy_serde::quantity")] u64),
    Tag(BlockTag),
    Object(Eip1898BlockSpec),
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Eip1898BlockSpec {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    require_canonical: Option<bool>,
}

impl<'de> Deserialize<'de> for BlockSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BlockSpecRepr::deserialize(deserializer)? {
            BlockSpecRepr::Number(number) => Ok(BlockSpec::Number(number)),
            BlockSpecRepr::Tag(tag) => Ok(BlockSpec::Tag(tag)),
            BlockSpecRepr::Object(Eip1898BlockSpec {
                block_number: Some(number),
                block_hash: None,
                require_canonical: None,
            }) => Ok(BlockSpec::Number(number)),
            BlockSpecRepr::Object(Eip1898BlockSpec {
                block_number: None,
                block_hash: Some(block_hash),
                require_canonical,
            }) => Ok(BlockSpec::Hash {
                block_hash,
                require_canonical,
            }),
            BlockSpecRepr::Object(_) => Err(serde::de::Error::custom(
                "expected exactly one of `blockNumber` or `blockHash`",
            )),
        }
    }
}

impl Serialize for BlockSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            BlockSpec::Number(number) => BlockSpecRepr::Number(*number),
            BlockSpec::Tag(tag) => BlockSpecRepr::Tag(*tag),
            BlockSpec::Hash {
                block_hash,
                require_canonical,
            } => BlockSpecRepr::Object(Eip1898BlockSpec {
                block_number: None,
                block_hash: Some(*block_hash),
                require_canonical: *require_canonical,
            }),
        };

        repr.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_variants() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::from_str::<BlockSpec>("\"0x10\"")?,
            BlockSpec::Number(16)
        );
        assert_eq!(
            serde_json::from_str::<BlockSpec>("\"pending\"")?,
            BlockSpec::pending()
        );
        assert_eq!(
            serde_json::from_str::<BlockSpec>(r#"{"blockNumber":"0x2"}"#)?,
            BlockSpec::Number(2)
        );

        let hash = B256::repeat_byte(0x11);
        let json = format!(r#"{{"blockHash":"{hash}","requireCanonical":true}}"#);
        assert_eq!(
            serde_json::from_str::<BlockSpec>(&json)?,
            BlockSpec::Hash {
                block_hash: hash,
                require_canonical: Some(true)
            }
        );

        Ok(())
    }

    #[test]
    fn reject_invalid() {
        assert!(serde_json::from_str::<BlockSpec>("\"newest\"").is_err());
        assert!(serde_json::from_str::<BlockSpec>(r#"{"blockNumber":"0x1","blockHash":"0x00"}"#).is_err());
    }

    #[test]
    fn serialize_number_as_quantity() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&BlockSpec::Number(255))?, "\"0xff\"");
        assert_eq!(serde_json::to_string(&BlockSpec::latest())?, "\"latest\"");
        Ok(())
    }
}
