use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use edr_chain_config::chains::largest_possible_reorg;
use edr_eth::{block::RemoteBlock, fee_history::FeeHistoryResult, BlockSpec};
use edr_primitives::{Address, Bytes, U256, U64};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client as HttpClient,
};
use reqwest_middleware::{ClientBuilder as HttpClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
#[cfg(feature = "tracing")]
use reqwest_tracing::TracingMiddleware;
use serde::de::DeserializeOwned;
use tokio::sync::{OnceCell, RwLock};

use crate::{jsonrpc, RequestMethod};

// Retry parameters for rate limited requests.
const EXPONENT_BASE: u32 = 2;
const MIN_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(32);
const MAX_RETRIES: u32 = 9;

/// Specialized error types
#[derive(Debug, thiserror::Error)]
pub enum RpcClientError {
    /// The message could not be sent to the remote node
    #[error(transparent)]
    FailedToSend(reqwest_middleware::Error),

    /// The remote node failed to reply with the body of the response
    #[error("The response text was corrupted: {0}.")]
    CorruptedResponse(reqwest::Error),

    /// The server returned an error code.
    #[error("The Http server returned error status code: {0}")]
    HttpStatus(reqwest::Error),

    /// The provided headers are invalid.
    #[error("Invalid HTTP header: {0}")]
    InvalidHeader(String),

    /// The request cannot be serialized as JSON.
    #[error(transparent)]
    InvalidJsonRequest(serde_json::Error),

    /// The server returned an invalid JSON-RPC response.
    #[error(
        "Response '{response}' failed to parse with expected type '{expected_type}', due to error: '{error}'"
    )]
    InvalidResponse {
        /// The response text
        response: String,
        /// The expected type of the response
        expected_type: &'static str,
        /// The parse error
        error: serde_json::Error,
    },

    /// Invalid URL format
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    /// The JSON-RPC returned an error.
    #[error("{error}. Request: {request}")]
    JsonRpcError {
        /// The JSON-RPC error
        error: jsonrpc::Error,
        /// The request JSON
        request: String,
    },
}

/// Account information of a remote account, including its code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteAccount {
    /// Balance of the account
    pub balance: U256,
    /// Nonce of the account
    pub nonce: u64,
    /// Code of the account
    pub code: Bytes,
}

#[derive(Clone, Copy, Debug)]
struct CachedBlockNumber {
    block_number: u64,
    timestamp: Instant,
}

/// A client for executing RPC methods on a remote Ethereum node.
#[derive(Debug)]
pub struct RpcClient {
    url: url::Url,
    chain_id: OnceCell<u64>,
    cached_block_number: RwLock<Option<CachedBlockNumber>>,
    client: ClientWithMiddleware,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new instance, given a remote node URL and additional HTTP
    /// headers to send with every request.
    pub fn new(url: &str, extra_headers: Option<HeaderMap>) -> Result<Self, RpcClientError> {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL)
            .base(EXPONENT_BASE)
            .build_with_max_retries(MAX_RETRIES);

        let mut headers = extra_headers.unwrap_or_default();
        headers.append(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.append(
            header::USER_AGENT,
            HeaderValue::from_str(&format!("edr {}", env!("CARGO_PKG_VERSION")))
                .map_err(|error| RpcClientError::InvalidHeader(error.to_string()))?,
        );

        let client = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(RpcClientError::HttpStatus)?;

        #[cfg(feature = "tracing")]
        let client = HttpClientBuilder::new(client)
            .with(TracingMiddleware::default())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        #[cfg(not(feature = "tracing"))]
        let client = HttpClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(RpcClient {
            url: url.parse()?,
            chain_id: OnceCell::new(),
            cached_block_number: RwLock::new(None),
            client,
            next_id: AtomicU64::new(0),
        })
    }

    /// The URL of the remote node.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    fn parse_response_str<SuccessT: DeserializeOwned>(
        response: String,
    ) -> Result<jsonrpc::Response<SuccessT>, RpcClientError> {
        serde_json::from_str(&response).map_err(|error| RpcClientError::InvalidResponse {
            response,
            expected_type: std::any::type_name::<jsonrpc::Response<SuccessT>>(),
            error,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    async fn send_request_body(&self, request_body: &str) -> Result<String, RpcClientError> {
        self.client
            .post(self.url.clone())
            .body(request_body.to_owned())
            .send()
            .await
            .map_err(RpcClientError::FailedToSend)?
            .error_for_status()
            .map_err(RpcClientError::HttpStatus)?
            .text()
            .await
            .map_err(RpcClientError::CorruptedResponse)
    }

    fn serialize_request(&self, method: &RequestMethod) -> Result<String, RpcClientError> {
        let id = jsonrpc::Id::Num(self.next_id.fetch_add(1, Ordering::Relaxed));

        serde_json::to_string(&jsonrpc::Request {
            version: jsonrpc::Version::V2_0,
            id,
            method,
        })
        .map_err(RpcClientError::InvalidJsonRequest)
    }

    /// Calls the provided JSON-RPC method and returns the result.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip(self)))]
    pub async fn call<SuccessT: DeserializeOwned>(
        &self,
        method: RequestMethod,
    ) -> Result<SuccessT, RpcClientError> {
        let request = self.serialize_request(&method)?;

        let result = self
            .send_request_body(&request)
            .await
            .and_then(Self::parse_response_str)?
            .data
            .into_result();

        match result {
            Ok(result) => Ok(result),
            // Some providers sporadically fail to serve historical state, so we retry once at
            // the application level.
            Err(error) if is_missing_trie_node_error(&error) => {
                log::warn!("Retrying {} after error: {error}", method.name());

                self.send_request_body(&request)
                    .await
                    .and_then(Self::parse_response_str)?
                    .data
                    .into_result()
                    .map_err(|error| RpcClientError::JsonRpcError { error, request })
            }
            Err(error) => Err(RpcClientError::JsonRpcError { error, request }),
        }
    }

    /// Calls `eth_blockNumber` and returns the block number.
    pub async fn block_number(&self) -> Result<u64, RpcClientError> {
        let block_number = self
            .call::<U64>(RequestMethod::BlockNumber(()))
            .await?
            .to::<u64>();

        *self.cached_block_number.write().await = Some(CachedBlockNumber {
            block_number,
            timestamp: Instant::now(),
        });

        Ok(block_number)
    }

    /// Returns the latest block number, reusing the last retrieved value if
    /// it is younger than the chain's block time.
    async fn cached_block_number(&self) -> Result<u64, RpcClientError> {
        let cached = *self.cached_block_number.read().await;
        if let Some(cached) = cached {
            let block_time = block_time(self.chain_id().await?);
            if cached.timestamp.elapsed() < block_time {
                return Ok(cached.block_number);
            }
        }

        self.block_number().await
    }

    /// Calls `eth_chainId` and returns the chain ID.
    pub async fn chain_id(&self) -> Result<u64, RpcClientError> {
        let chain_id = *self
            .chain_id
            .get_or_try_init(|| async {
                self.call::<U64>(RequestMethod::ChainId(()))
                    .await
                    .map(|chain_id| chain_id.to::<u64>())
            })
            .await?;

        Ok(chain_id)
    }

    /// Calls `net_version` and returns the network ID.
    pub async fn network_id(&self) -> Result<u64, RpcClientError> {
        let network_id = self.call::<String>(RequestMethod::NetVersion(())).await?;

        network_id
            .parse()
            .map_err(|_error| RpcClientError::InvalidResponse {
                response: network_id.clone(),
                expected_type: "u64",
                error: <serde_json::Error as serde::de::Error>::custom("invalid network id"),
            })
    }

    /// Whether data of the provided block can be cached, i.e. the block is
    /// deep enough to be safe from reorgs.
    pub async fn is_cacheable_block_number(&self, block_number: u64) -> Result<bool, RpcClientError> {
        let chain_id = self.chain_id().await?;
        let latest_block_number = self.cached_block_number().await?;

        Ok(block_number <= latest_block_number.saturating_sub(largest_possible_reorg(chain_id)))
    }

    /// Retrieves the balance, nonce, and code of an account.
    pub async fn get_account_info(
        &self,
        address: Address,
        block: BlockSpec,
    ) -> Result<RemoteAccount, RpcClientError> {
        let (balance, nonce, code) = futures::try_join!(
            self.call::<U256>(RequestMethod::GetBalance(address, block.clone())),
            self.call::<U64>(RequestMethod::GetTransactionCount(address, block.clone())),
            self.call::<Bytes>(RequestMethod::GetCode(address, block)),
        )?;

        Ok(RemoteAccount {
            balance,
            nonce: nonce.to::<u64>(),
            code,
        })
    }

    /// Calls `eth_getStorageAt`.
    pub async fn get_storage_at(
        &self,
        address: Address,
        index: U256,
        block: BlockSpec,
    ) -> Result<U256, RpcClientError> {
        self.call(RequestMethod::GetStorageAt(address, index, block))
            .await
    }

    /// Calls `eth_getBlockByNumber` without transaction bodies.
    pub async fn get_block_by_number(
        &self,
        block: BlockSpec,
    ) -> Result<Option<RemoteBlock>, RpcClientError> {
        self.call(RequestMethod::GetBlockByNumber(block, false))
            .await
    }

    /// Calls `eth_feeHistory`.
    pub async fn fee_history(
        &self,
        block_count: u64,
        newest_block: BlockSpec,
        reward_percentiles: Vec<f64>,
    ) -> Result<FeeHistoryResult, RpcClientError> {
        self.call(RequestMethod::FeeHistory(
            U256::from(block_count),
            newest_block,
            reward_percentiles,
        ))
        .await
    }
}

fn is_missing_trie_node_error(error: &jsonrpc::Error) -> bool {
    error.code == -32000 && error.message.to_lowercase().contains("missing trie node")
}

/// The expected time between blocks of the specified chain.
fn block_time(chain_id: u64) -> Duration {
    match chain_id {
        1 | 11_155_111 | 17_000 => Duration::from_secs(12),
        _ => Duration::from_secs(1),
    }
}


#[cfg(all(test, feature = "test-remote"))]
mod remote_tests {
    use std::str::FromStr;

    use edr_test_utils::env::json_rpc_url_provider;

    use super::*;

    const DAI_ADDRESS: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    #[tokio::test(flavor = "multi_thread")]
    async fn get_account_info_works() -> anyhow::Result<()> {
        let client = RpcClient::new(&json_rpc_url_provider::ethereum_mainnet(), None)?;

        let account = client
            .get_account_info(Address::from_str(DAI_ADDRESS)?, BlockSpec::Number(16_220_843))
            .await?;

        assert_eq!(account.balance, U256::ZERO);
        assert_eq!(account.nonce, 1);
        assert!(!account.code.is_empty());

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chain_id_is_mainnet() -> anyhow::Result<()> {
        let client = RpcClient::new(&json_rpc_url_provider::ethereum_mainnet(), None)?;

        assert_eq!(client.chain_id().await?, 1);
        assert!(client.is_cacheable_block_number(16_220_843).await?);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn chain_ids_of_testnets() -> anyhow::Result<()> {
        let sepolia = RpcClient::new(&json_rpc_url_provider::ethereum_sepolia(), None)?;
        assert_eq!(sepolia.chain_id().await?, 11_155_111);

        let holesky = RpcClient::new(&json_rpc_url_provider::ethereum_holesky(), None)?;
        assert_eq!(holesky.chain_id().await?, 17_000);

        Ok(())
    }
}
