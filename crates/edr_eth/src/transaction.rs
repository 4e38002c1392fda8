use alloy_eips::eip2930::AccessListItem;
use edr_primitives::{Address, Bytes, B256, U256};

/// Transaction parameters of `eth_sendTransaction`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender
    pub from: Address,
    /// Receiver; `None` for contract creations
    #[serde(default)]
    pub to: Option<Address>,
    /// Legacy gas price
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub gas_price: Option<u128>,
    /// Max base fee per gas the sender is willing to pay
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub max_fee_per_gas: Option<u128>,
    /// Miner tip
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// Gas limit
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub gas: Option<u64>,
    /// Transferred value in wei
    #[serde(default)]
    pub value: Option<U256>,
    /// Call data or init code
    #[serde(default, alias = "input")]
    pub data: Option<Bytes>,
    /// Sender nonce
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub nonce: Option<u64>,
    /// Chain ID
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub chain_id: Option<u64>,
    /// Warm storage access pre-payment
    #[serde(default)]
    pub access_list: Option<Vec<AccessListItem>>,
    /// EIP-2718 type
    #[serde(default, rename = "type", with = "alloy_serde::quantity::opt")]
    pub transaction_type: Option<u8>,
}

/// Transaction parameters of `eth_call` and `eth_estimateGas`.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Sender; defaults to the first owned account
    #[serde(default)]
    pub from: Option<Address>,
    /// Receiver; `None` for contract creations
    #[serde(default)]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub gas: Option<u64>,
    /// Legacy gas price
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub gas_price: Option<u128>,
    /// Max base fee per gas the sender is willing to pay
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub max_fee_per_gas: Option<u128>,
    /// Miner tip
    #[serde(default, with = "alloy_serde::quantity::opt")]
    pub max_priority_fee_per_gas: Option<u128>,
    /// Transferred value in wei
    #[serde(default)]
    pub value: Option<U256>,
    /// Call data or init code
    #[serde(default, alias = "input")]
    pub data: Option<Bytes>,
    /// Warm storage access pre-payment
    #[serde(default)]
    pub access_list: Option<Vec<AccessListItem>>,
}

/// A transaction as returned by `eth_getTransactionByHash` and
/// `eth_pendingTransactions`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash
    pub hash: B256,
    /// Sender nonce
    #[serde(with = "alloy_serde::quantity")]
    pub nonce: u64,
    /// Hash of the containing block; `None` while pending
    pub block_hash: Option<B256>,
    /// Number of the containing block; `None` while pending
    #[serde(with = "alloy_serde::quantity::opt")]
    pub block_number: Option<u64>,
    /// Index in the containing block; `None` while pending
    #[serde(with = "alloy_serde::quantity::opt")]
    pub transaction_index: Option<u64>,
    /// Sender
    pub from: Address,
    /// Receiver; `None` for contract creations
    pub to: Option<Address>,
    /// Transferred value in wei
    pub value: U256,
    /// Effective gas price once mined, otherwise the fee cap
    #[serde(with = "alloy_serde::quantity")]
    pub gas_price: u128,
    /// Gas limit
    #[serde(with = "alloy_serde::quantity")]
    pub gas: u64,
    /// Call data or init code
    pub input: Bytes,
    /// ECDSA recovery id
    #[serde(with = "alloy_serde::quantity")]
    pub v: u64,
    /// ECDSA signature r
    pub r: U256,
    /// ECDSA signature s
    pub s: U256,
    /// Chain ID, for replay-protected transactions
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub chain_id: Option<u64>,
    /// EIP-2718 type
    #[serde(rename = "type", with = "alloy_serde::quantity")]
    pub transaction_type: u8,
    /// Access list, for typed transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<AccessListItem>>,
    /// Max fee per gas, for EIP-1559 transactions
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub max_fee_per_gas: Option<u128>,
    /// Max priority fee per gas, for EIP-1559 transactions
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub max_priority_fee_per_gas: Option<u128>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_alias() -> anyhow::Result<()> {
        const JSON_WITH_DATA: &str = r#"{
            "from":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to":"0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "data":"0x8b1329e0"
        }"#;

        const JSON_WITH_INPUT: &str = r#"{
            "from":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "input":"0x8b1329e0",
            "to":"0x5fbdb2315678afecb367f032d93f642f64180aa3"
        }"#;

        let with_data: CallRequest = serde_json::from_str(JSON_WITH_DATA)?;
        let with_input: CallRequest = serde_json::from_str(JSON_WITH_INPUT)?;
        assert_eq!(with_data.data, with_input.data);

        let request: TransactionRequest = serde_json::from_str(JSON_WITH_INPUT)?;
        assert_eq!(request.data, with_data.data);
        assert_eq!(request.gas_price, None);

        Ok(())
    }

    #[test]
    fn quantities() -> anyhow::Result<()> {
        let request: TransactionRequest = serde_json::from_str(
            r#"{
                "from":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
                "gas":"0x5208",
                "maxFeePerGas":"0x3b9aca00",
                "nonce":"0x0"
            }"#,
        )?;

        assert_eq!(request.gas, Some(21_000));
        assert_eq!(request.max_fee_per_gas, Some(1_000_000_000));
        assert_eq!(request.nonce, Some(0));
        assert_eq!(request.to, None);

        Ok(())
    }
}
