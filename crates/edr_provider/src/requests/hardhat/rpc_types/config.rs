use std::collections::HashMap;

use crate::config::ForkConfig;

/// Parameters of `hardhat_reset`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ResetProviderConfig {
    /// The remote chain to fork. When absent, the node resets to a local
    /// chain.
    #[serde(default)]
    pub forking: Option<ResetForkConfig>,
}

/// Configuration for forking a remote chain when resetting the node.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetForkConfig {
    /// JSON-RPC URL of the remote archive node
    pub json_rpc_url: String,
    /// Block to fork from
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub block_number: Option<u64>,
    /// Headers sent with every remote request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<HashMap<String, String>>,
}

impl From<ResetForkConfig> for ForkConfig {
    fn from(value: ResetForkConfig) -> Self {
        Self {
            url: value.json_rpc_url,
            block_number: value.block_number,
            http_headers: value.http_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_forking() -> anyhow::Result<()> {
        let config: ResetProviderConfig = serde_json::from_str(
            r#"{"forking":{"jsonRpcUrl":"http://localhost:8545","blockNumber":100}}"#,
        )?;

        let fork_config: ForkConfig = config
            .forking
            .ok_or_else(|| anyhow::anyhow!("missing forking config"))?
            .into();

        assert_eq!(fork_config.url, "http://localhost:8545");
        assert_eq!(fork_config.block_number, Some(100));
        assert_eq!(fork_config.http_headers, None);

        Ok(())
    }

    #[test]
    fn deserialize_without_forking() -> anyhow::Result<()> {
        let config: ResetProviderConfig = serde_json::from_str("{}")?;
        assert_eq!(config, ResetProviderConfig::default());

        Ok(())
    }
}
