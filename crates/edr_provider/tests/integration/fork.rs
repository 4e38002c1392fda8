use std::sync::Arc;

use edr_evm::TransferExecutor;
use edr_primitives::{Address, ONE_ETHER, U256};
use edr_provider::{
    test_utils::{
        create_test_config_with_fork, in_memory_fork_config, in_memory_remote_node,
        InMemoryBlocks,
    },
    time::CurrentTime,
    NoopLogger, Provider, ProviderError, ProviderRequest,
};
use edr_state_api::account::AccountInfo;
use edr_state_remote::InMemoryRemote;
use serde_json::json;
use tokio::runtime;

const FORK_BLOCK_NUMBER: u64 = 100;
const REMOTE_ACCOUNT: Address = Address::repeat_byte(0xaa);

fn ether(amount: u64) -> U256 {
    U256::from(ONE_ETHER) * U256::from(amount)
}

struct ForkedProvider {
    provider: Provider<CurrentTime>,
    _runtime: runtime::Runtime,
}

impl ForkedProvider {
    /// Forks a mainnet-like chain whose remote account holds 5 ether until
    /// the fork block, from which it holds 7 ether.
    fn new() -> anyhow::Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let state = Arc::new(InMemoryRemote::new(FORK_BLOCK_NUMBER + 10, FORK_BLOCK_NUMBER));
        state.insert_account(
            REMOTE_ACCOUNT,
            AccountInfo {
                balance: ether(5),
                ..AccountInfo::default()
            },
        );
        state.insert_account_at(
            FORK_BLOCK_NUMBER,
            REMOTE_ACCOUNT,
            AccountInfo {
                balance: ether(7),
                ..AccountInfo::default()
            },
        );

        let remote = in_memory_remote_node(InMemoryBlocks::new(1, FORK_BLOCK_NUMBER + 10), state);

        let provider = Provider::with_remote(
            runtime.handle().clone(),
            Arc::new(TransferExecutor),
            Box::new(NoopLogger),
            create_test_config_with_fork(Some(in_memory_fork_config(FORK_BLOCK_NUMBER))),
            CurrentTime,
            remote,
        )?;

        Ok(Self {
            provider,
            _runtime: runtime,
        })
    }

    fn request(&self, request: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
        let request: ProviderRequest =
            serde_json::from_value(request).expect("request is well-formed");

        self.provider.handle_request(request)
    }

    fn balance(&self, address: Address, block: &str) -> anyhow::Result<U256> {
        let balance = self.request(json!({
            "method": "eth_getBalance",
            "params": [address, block],
        }))?;

        Ok(serde_json::from_value(balance)?)
    }

    fn send_ether(&self, recipient: Address, amount: U256) -> anyhow::Result<()> {
        let accounts = self.request(json!({"method": "eth_accounts", "params": []}))?;

        self.request(json!({
            "method": "eth_sendTransaction",
            "params": [{"from": accounts[0], "to": recipient, "value": amount}],
        }))?;

        Ok(())
    }
}

#[test]
fn starts_at_fork_block() -> anyhow::Result<()> {
    let provider = ForkedProvider::new()?;

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x64"));

    // Local blocks use the configured chain ID
    let chain_id = provider.request(json!({"method": "eth_chainId", "params": []}))?;
    assert_eq!(chain_id, json!("0x7b"));

    Ok(())
}

#[test]
fn historical_balances_around_fork_block() -> anyhow::Result<()> {
    let provider = ForkedProvider::new()?;
    let before_fork = format!("{:#x}", FORK_BLOCK_NUMBER - 1);
    let at_fork = format!("{FORK_BLOCK_NUMBER:#x}");

    assert_eq!(provider.balance(REMOTE_ACCOUNT, &before_fork)?, ether(5));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, &at_fork)?, ether(7));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, "latest")?, ether(7));

    provider.send_ether(REMOTE_ACCOUNT, ether(1))?;

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x65"));

    assert_eq!(provider.balance(REMOTE_ACCOUNT, "latest")?, ether(8));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, "0x65")?, ether(8));

    // Blocks up to the fork block still read the remote state
    assert_eq!(provider.balance(REMOTE_ACCOUNT, &at_fork)?, ether(7));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, &before_fork)?, ether(5));

    Ok(())
}

#[test]
fn snapshot_and_revert_after_fork() -> anyhow::Result<()> {
    let provider = ForkedProvider::new()?;

    let snapshot_id = provider.request(json!({"method": "evm_snapshot", "params": []}))?;

    provider.send_ether(REMOTE_ACCOUNT, ether(2))?;
    provider.request(json!({"method": "hardhat_mine", "params": ["0x3"]}))?;

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x68"));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, "latest")?, ether(9));

    let reverted = provider.request(json!({"method": "evm_revert", "params": [snapshot_id]}))?;
    assert_eq!(reverted, json!(true));

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x64"));
    assert_eq!(provider.balance(REMOTE_ACCOUNT, "latest")?, ether(7));

    // The reverted chain can be extended again
    provider.send_ether(REMOTE_ACCOUNT, ether(1))?;
    assert_eq!(provider.balance(REMOTE_ACCOUNT, "latest")?, ether(8));

    Ok(())
}
