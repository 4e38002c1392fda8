pub(crate) mod debug;
/// Ethereum RPC request handlers
pub(crate) mod eth;
/// Hardhat RPC request handlers
pub(crate) mod hardhat;
mod methods;
mod serde;
/// Types and functions for validating JSON-RPC requests.
pub mod validation;

use std::fmt;

use ::serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

pub use self::{
    debug::DebugTraceConfig,
    hardhat::rpc_types::{ResetForkConfig, ResetProviderConfig},
    methods::{IntervalConfig, MethodInvocation},
    serde::{InvalidRequestReason, RpcAddress, Timestamp},
};

/// JSON-RPC request for the provider.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ProviderRequest {
    /// A single JSON-RPC request
    Single(Box<MethodInvocation>),
    /// A batch of requests
    Batch(Vec<MethodInvocation>),
}

impl ProviderRequest {
    /// Constructs a new instance from a single [`MethodInvocation`].
    pub fn with_single(method: MethodInvocation) -> Self {
        Self::Single(Box::new(method))
    }
}

// `#[serde(untagged)]` would hide the custom error messages of the methods.
impl<'de> Deserialize<'de> for ProviderRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SingleOrBatchRequestVisitor;

        impl<'de> Visitor<'de> for SingleOrBatchRequestVisitor {
            type Value = ProviderRequest;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("single or batch request")
            }

            fn visit_seq<A>(self, seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                Ok(ProviderRequest::Batch(Deserialize::deserialize(
                    de::value::SeqAccessDeserializer::new(seq),
                )?))
            }

            fn visit_map<M>(self, map: M) -> Result<ProviderRequest, M::Error>
            where
                M: MapAccess<'de>,
            {
                Ok(ProviderRequest::with_single(Deserialize::deserialize(
                    de::value::MapAccessDeserializer::new(map),
                )?))
            }
        }

        deserializer.deserialize_any(SingleOrBatchRequestVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_single_and_batch() -> anyhow::Result<()> {
        let single: ProviderRequest =
            serde_json::from_str(r#"{"method":"eth_blockNumber","params":[]}"#)?;
        assert_eq!(
            single,
            ProviderRequest::with_single(MethodInvocation::BlockNumber(()))
        );

        let batch: ProviderRequest = serde_json::from_str(
            r#"[{"method":"eth_chainId","params":[]},{"method":"evm_snapshot","params":[]}]"#,
        )?;
        assert_eq!(
            batch,
            ProviderRequest::Batch(vec![
                MethodInvocation::ChainId(()),
                MethodInvocation::EvmSnapshot(())
            ])
        );

        Ok(())
    }

    #[test]
    fn unsupported_method_error() {
        let error = serde_json::from_str::<ProviderRequest>(r#"{"method":"eth_foo","params":[]}"#)
            .unwrap_err()
            .to_string();

        let reason = InvalidRequestReason::new(Some("eth_foo"), &error);
        assert_eq!(reason.error_code(), -32004);
    }
}
