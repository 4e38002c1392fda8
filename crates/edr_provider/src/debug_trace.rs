use edr_evm::{
    config::{BlockEnv, CfgEnv},
    dry_run, run, Executor,
};
use edr_primitives::{hex, HashMap, B256};
use edr_state_api::StateView;
use edr_transaction::Signed;
use serde::{Serialize, Serializer};

use crate::ProviderError;

/// Result of a `debug_traceTransaction` call.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTraceResult {
    /// Whether the transaction reverted or halted.
    pub failed: bool,
    /// Gas used by the transaction.
    pub gas: u64,
    /// Output of the transaction, hex-encoded without prefix.
    #[serde(serialize_with = "serialize_unprefixed_hex")]
    pub return_value: Vec<u8>,
    /// Opcode-level steps, in execution order.
    pub struct_logs: Vec<DebugTraceLogItem>,
}

/// A single step of an EIP-3155 trace.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTraceLogItem {
    /// Program counter
    pub pc: u64,
    /// Name of the operation
    pub op: String,
    /// Gas left before executing the operation
    pub gas: u64,
    /// Gas cost of the operation
    pub gas_cost: u64,
    /// Depth of the call stack
    pub depth: u64,
    /// Values on the stack, as hex strings
    pub stack: Vec<String>,
    /// Memory words, as hex strings
    pub memory: Vec<String>,
    /// Touched storage slots, as hex strings
    pub storage: HashMap<String, String>,
}

fn serialize_unprefixed_hex<SerializerT: Serializer>(
    value: &[u8],
    serializer: SerializerT,
) -> Result<SerializerT::Ok, SerializerT::Error> {
    serializer.serialize_str(&hex::encode(value))
}

/// Re-executes the transactions of a block on top of its parent's state,
/// up to and including the transaction with the provided hash, and reports
/// the outcome of the latter.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub(crate) fn debug_trace_transaction(
    executor: &dyn Executor,
    state: &mut dyn StateView,
    cfg: &CfgEnv,
    block: &BlockEnv,
    transactions: impl IntoIterator<Item = Signed>,
    transaction_hash: &B256,
) -> Result<DebugTraceResult, ProviderError> {
    for transaction in transactions {
        if transaction.hash() == transaction_hash {
            let result = dry_run(executor, &*state, cfg, block, &transaction)?.result;

            return Ok(DebugTraceResult {
                failed: !result.is_success(),
                gas: result.gas_used(),
                return_value: result.output().map(|output| output.to_vec()).unwrap_or_default(),
                struct_logs: Vec::new(),
            });
        }

        run(executor, state, cfg, block, &transaction)?;
    }

    Err(ProviderError::InvalidTransactionHash(*transaction_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_return_value_without_prefix() -> anyhow::Result<()> {
        let result = DebugTraceResult {
            failed: false,
            gas: 21_000,
            return_value: vec![0xde, 0xad],
            struct_logs: Vec::new(),
        };

        let json = serde_json::to_value(result)?;
        assert_eq!(
            json,
            serde_json::json!({
                "failed": false,
                "gas": 21_000,
                "returnValue": "dead",
                "structLogs": [],
            })
        );

        Ok(())
    }
}
