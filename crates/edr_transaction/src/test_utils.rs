use edr_primitives::{Address, Bytes, U256};

use crate::{AccessList, Request, Signed, TxKind, request};

/// Chain ID used by dummy transactions.
pub const DUMMY_CHAIN_ID: u64 = 123;

/// Creates a dummy impersonated EIP-155 transaction.
pub fn dummy_eip155_transaction(caller: Address, nonce: u64) -> Signed {
    dummy_eip155_transaction_with_price(caller, nonce, 0)
}

/// Creates a dummy impersonated EIP-155 transaction with the provided gas
/// price.
pub fn dummy_eip155_transaction_with_price(caller: Address, nonce: u64, gas_price: u128) -> Signed {
    dummy_eip155_transaction_with_price_and_limit(caller, nonce, gas_price, 30_000)
}

/// Creates a dummy impersonated EIP-155 transaction with the provided gas
/// limit.
pub fn dummy_eip155_transaction_with_limit(caller: Address, nonce: u64, gas_limit: u64) -> Signed {
    dummy_eip155_transaction_with_price_and_limit(caller, nonce, 0, gas_limit)
}

/// Creates a dummy impersonated EIP-155 transaction with the provided gas
/// price and gas limit.
pub fn dummy_eip155_transaction_with_price_and_limit(
    caller: Address,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
) -> Signed {
    dummy_eip155_transaction_with_price_limit_and_value(
        caller,
        nonce,
        gas_price,
        gas_limit,
        U256::ZERO,
    )
}

/// Creates a dummy impersonated EIP-155 transaction with the provided gas
/// price, gas limit, and value.
pub fn dummy_eip155_transaction_with_price_limit_and_value(
    caller: Address,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    value: U256,
) -> Signed {
    let request = request::Legacy {
        chain_id: Some(DUMMY_CHAIN_ID),
        nonce,
        gas_price,
        gas_limit,
        kind: TxKind::Call(Address::random()),
        value,
        input: Bytes::new(),
    };

    Request::Legacy(request).fake_sign(caller)
}

/// Creates a dummy impersonated EIP-1559 transaction with the provided max fee
/// and max priority fee per gas.
pub fn dummy_eip1559_transaction(
    caller: Address,
    nonce: u64,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
) -> Signed {
    let request = request::Eip1559 {
        chain_id: DUMMY_CHAIN_ID,
        nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit: 30_000,
        kind: TxKind::Call(Address::random()),
        value: U256::ZERO,
        input: Bytes::new(),
        access_list: AccessList::default(),
    };

    Request::Eip1559(request).fake_sign(caller)
}
