//! Remote node URLs for network tests, read from the environment.

/// Reads a required environment variable.
///
/// # Panics
///
/// Panics if the variable is missing, empty or not valid unicode.
fn required_env_var(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        Ok(_) => panic!("{name} environment variable is empty"),
        Err(error) => panic!("{name} environment variable is unusable: {error}"),
    }
}

/// Archive node URLs of the chains that remote tests fork from. All of them
/// are derived from the mainnet URL in `ALCHEMY_URL`.
pub mod json_rpc_url_provider {
    use super::required_env_var;

    const MAINNET_URL_VAR: &str = "ALCHEMY_URL";

    /// Ethereum mainnet.
    pub fn ethereum_mainnet() -> String {
        required_env_var(MAINNET_URL_VAR)
    }

    /// The Sepolia testnet.
    pub fn ethereum_sepolia() -> String {
        ethereum_mainnet().replace("mainnet", "sepolia")
    }

    /// The Holesky testnet.
    pub fn ethereum_holesky() -> String {
        ethereum_mainnet().replace("mainnet", "holesky")
    }
}
