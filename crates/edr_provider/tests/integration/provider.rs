use std::sync::Arc;

use edr_evm::{Executor, Frame, FrameResult, FrameStatus, Journal, TransferExecutor};
use edr_primitives::{Address, Bytes};
use edr_provider::{
    test_utils::create_test_config, time::CurrentTime, CollapsingLogger, NoopLogger, Provider,
    ProviderError, ProviderRequest, SyncLogger,
};
use edr_state_api::StateError;
use parking_lot::Mutex;
use serde_json::json;
use tokio::runtime;

/// Reverts every frame that runs code.
#[derive(Debug)]
struct RevertingExecutor;

impl Executor for RevertingExecutor {
    fn execute(&self, frame: Frame<'_>, _journal: &mut Journal<'_>) -> Result<FrameResult, StateError> {
        let status = if frame.code.is_empty() {
            FrameStatus::Return(Bytes::new())
        } else {
            FrameStatus::Revert(Bytes::new())
        };

        Ok(FrameResult {
            status,
            gas_used: 100,
            gas_refunded: 0,
        })
    }
}

struct TestProvider {
    provider: Provider<CurrentTime>,
    _runtime: runtime::Runtime,
}

impl TestProvider {
    fn new(executor: Arc<dyn Executor>, logger: Box<dyn SyncLogger>) -> anyhow::Result<Self> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let provider = Provider::new(
            runtime.handle().clone(),
            executor,
            logger,
            create_test_config(),
            CurrentTime,
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

    fn first_account(&self) -> anyhow::Result<String> {
        let accounts = self.request(json!({"method": "eth_accounts", "params": []}))?;
        let account = accounts[0].as_str().expect("account is a string").to_owned();

        Ok(account)
    }
}

#[test]
fn batch_request() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(NoopLogger))?;

    let result = provider.request(json!([
        {"method": "eth_chainId", "params": []},
        {"method": "eth_blockNumber", "params": []},
        {"method": "net_version", "params": []},
    ]))?;

    assert_eq!(result, json!(["0x7b", "0x0", "123"]));

    Ok(())
}

#[test]
fn send_transaction_and_mine() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(NoopLogger))?;
    let sender = provider.first_account()?;
    let recipient = Address::repeat_byte(0x0b);

    let transaction_hash = provider.request(json!({
        "method": "eth_sendTransaction",
        "params": [{"from": sender, "to": recipient, "value": "0x64"}],
    }))?;

    let receipt = provider.request(json!({
        "method": "eth_getTransactionReceipt",
        "params": [transaction_hash],
    }))?;
    assert_eq!(receipt["blockNumber"], json!("0x1"));
    assert_eq!(receipt["status"], json!("0x1"));

    let balance = provider.request(json!({
        "method": "eth_getBalance",
        "params": [recipient, "latest"],
    }))?;
    assert_eq!(balance, json!("0x64"));

    let balance_before = provider.request(json!({
        "method": "eth_getBalance",
        "params": [recipient, "0x0"],
    }))?;
    assert_eq!(balance_before, json!("0x0"));

    Ok(())
}

#[test]
fn gas_price_and_max_fee_are_exclusive() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(NoopLogger))?;
    let sender = provider.first_account()?;

    let result = provider.request(json!({
        "method": "eth_sendTransaction",
        "params": [{
            "from": sender,
            "to": Address::repeat_byte(0x0b),
            "gasPrice": "0x3b9aca00",
            "maxFeePerGas": "0x3b9aca00",
        }],
    }));

    assert!(matches!(
        result,
        Err(ProviderError::InvalidTransactionInput(_))
    ));

    Ok(())
}

#[test]
fn reverted_transaction_is_mined_and_reported() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(RevertingExecutor), Box::new(NoopLogger))?;
    let sender = provider.first_account()?;
    let contract = Address::repeat_byte(0x0c);

    provider.request(json!({
        "method": "hardhat_setCode",
        "params": [contract, "0xfd"],
    }))?;

    let error = provider
        .request(json!({
            "method": "eth_sendTransaction",
            "params": [{"from": sender, "to": contract, "gas": "0x186a0"}],
        }))
        .expect_err("transaction reverts");

    let failure = error.as_transaction_failure().expect("transaction failure");
    let transaction_hash = failure.transaction_hash.expect("mined transaction has a hash");

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x1"));

    let receipt = provider.request(json!({
        "method": "eth_getTransactionReceipt",
        "params": [transaction_hash],
    }))?;
    assert_eq!(receipt["status"], json!("0x0"));

    let error = provider
        .request(json!({
            "method": "eth_call",
            "params": [{"from": sender, "to": contract}],
        }))
        .expect_err("call reverts");

    let failure = error.as_transaction_failure().expect("transaction failure");
    assert_eq!(failure.transaction_hash, None);

    Ok(())
}

#[test]
fn snapshot_and_revert() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(NoopLogger))?;

    let snapshot_id = provider.request(json!({"method": "evm_snapshot", "params": []}))?;
    assert_eq!(snapshot_id, json!("0x1"));

    provider.request(json!({"method": "hardhat_mine", "params": ["0x5"]}))?;
    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x5"));

    let reverted = provider.request(json!({"method": "evm_revert", "params": [snapshot_id]}))?;
    assert_eq!(reverted, json!(true));

    let block_number = provider.request(json!({"method": "eth_blockNumber", "params": []}))?;
    assert_eq!(block_number, json!("0x0"));

    // Snapshots can only be reverted to once
    let reverted = provider.request(json!({"method": "evm_revert", "params": [snapshot_id]}))?;
    assert_eq!(reverted, json!(false));

    Ok(())
}

#[test]
fn drop_mined_transaction_fails() -> anyhow::Result<()> {
    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(NoopLogger))?;
    let sender = provider.first_account()?;

    let transaction_hash = provider.request(json!({
        "method": "eth_sendTransaction",
        "params": [{"from": sender, "to": Address::repeat_byte(0x0b)}],
    }))?;

    let result = provider.request(json!({
        "method": "hardhat_dropTransaction",
        "params": [transaction_hash],
    }));
    assert!(matches!(
        result,
        Err(ProviderError::InvalidDropTransactionHash(_))
    ));

    Ok(())
}

#[test]
fn method_logs_are_collapsed() -> anyhow::Result<()> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let logger = CollapsingLogger::new(
        true,
        Arc::new(move |line: String, replace: bool| {
            let mut lines = sink.lock();
            if replace {
                lines.pop();
            }
            lines.push(line);
            Ok(())
        }),
    );

    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(logger))?;

    provider.request(json!({"method": "eth_chainId", "params": []}))?;
    provider.request(json!({"method": "eth_chainId", "params": []}))?;
    // Private methods are not logged
    provider.request(json!({"method": "hardhat_setLoggingEnabled", "params": [true]}))?;
    provider.request(json!({"method": "eth_blockNumber", "params": []}))?;

    assert_eq!(*lines.lock(), vec!["eth_chainId (2)", "eth_blockNumber"]);

    Ok(())
}

#[test]
fn unsupported_method_is_logged() -> anyhow::Result<()> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let logger = CollapsingLogger::new(
        true,
        Arc::new(move |line: String, _replace: bool| {
            sink.lock().push(line);
            Ok(())
        }),
    );

    let provider = TestProvider::new(Arc::new(TransferExecutor), Box::new(logger))?;

    let parsed = serde_json::from_value::<ProviderRequest>(
        json!({"method": "eth_subscribe", "params": ["newHeads"]}),
    );
    assert!(parsed.is_err());

    let error = ProviderError::UnsupportedMethod {
        method_name: "eth_subscribe".to_owned(),
    };
    provider.provider.log_failed_deserialization("eth_subscribe", &error)?;

    assert_eq!(
        *lines.lock(),
        vec!["eth_subscribe - Method not supported".to_owned()]
    );

    Ok(())
}
