#![warn(missing_docs)]

//! Ethereum transaction types: unsigned requests, signed (or impersonated)
//! transactions and the fee model shared by the mem pool and the miner.

/// Types for transaction requests.
pub mod request;
/// Types for signed transactions.
pub mod signed;
/// Dummy transactions for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alloy_eips::eip2930::{AccessList, AccessListItem};
use edr_primitives::U256;
pub use edr_primitives::TxKind;
use edr_signer::SignatureError;

pub use self::{request::Request, signed::Signed};

/// The type of a transaction, as encoded in its EIP-2718 envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Legacy transaction, optionally with EIP-155 replay protection
    Legacy,
    /// EIP-2930 transaction with an access list
    Eip2930,
    /// EIP-1559 transaction with a dynamic fee
    Eip1559,
}

impl From<TransactionType> for u8 {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Legacy => 0,
            TransactionType::Eip2930 => 1,
            TransactionType::Eip1559 => 2,
        }
    }
}

impl TryFrom<u8> for TransactionType {
    type Error = TransactionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Eip2930),
            2 => Ok(Self::Eip1559),
            unsupported => Err(TransactionError::UnsupportedType(unsupported)),
        }
    }
}

/// The fee a transaction is willing to pay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fee {
    /// A fixed gas price
    Legacy {
        /// Price per unit of gas
        gas_price: u128,
    },
    /// A fee cap and a tip, per EIP-1559
    Eip1559 {
        /// Maximum total fee per unit of gas
        max_fee_per_gas: u128,
        /// Maximum fee per unit of gas paid to the block producer
        max_priority_fee_per_gas: u128,
    },
}

impl Fee {
    /// The maximum amount per unit of gas the transaction can pay.
    pub fn max_fee_per_gas(&self) -> u128 {
        match self {
            Fee::Legacy { gas_price } => *gas_price,
            Fee::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// The maximum amount per unit of gas paid to the block producer. For
    /// legacy fees this is the gas price.
    pub fn max_priority_fee_per_gas(&self) -> u128 {
        match self {
            Fee::Legacy { gas_price } => *gas_price,
            Fee::Eip1559 {
                max_priority_fee_per_gas,
                ..
            } => *max_priority_fee_per_gas,
        }
    }

    /// The price per unit of gas that the sender pays in a block with the
    /// provided base fee, or `None` if the fee cap is below the base fee.
    pub fn effective_gas_price(&self, base_fee: Option<u128>) -> Option<u128> {
        let Some(base_fee) = base_fee else {
            return Some(self.max_fee_per_gas());
        };

        match self {
            Fee::Legacy { gas_price } => (*gas_price >= base_fee).then_some(*gas_price),
            Fee::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => (*max_fee_per_gas >= base_fee).then(|| {
                (*max_fee_per_gas).min(base_fee.saturating_add(*max_priority_fee_per_gas))
            }),
        }
    }

    /// The price per unit of gas that is paid to the block producer in a block
    /// with the provided base fee.
    pub fn effective_miner_fee(&self, base_fee: Option<u128>) -> u128 {
        let max_fee_per_gas = self.max_fee_per_gas();

        base_fee.map_or(max_fee_per_gas, |base_fee| {
            self.max_priority_fee_per_gas()
                .min(max_fee_per_gas.saturating_sub(base_fee))
        })
    }
}

/// Computes the maximum amount of wei a transaction can cost the sender:
/// `gas_limit * max_fee_per_gas + value`.
pub fn upfront_cost(gas_limit: u64, fee: &Fee, value: U256) -> U256 {
    U256::from(gas_limit)
        .saturating_mul(U256::from(fee.max_fee_per_gas()))
        .saturating_add(value)
}

/// An error that occurs while decoding or signing a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction is not valid RLP.
    #[error("Invalid transaction: {0}")]
    Decode(#[from] alloy_rlp::Error),
    /// The raw transaction is empty.
    #[error("Invalid transaction: empty input")]
    Empty,
    /// A legacy transaction has a `v` value that is neither pre- nor
    /// post-EIP-155.
    #[error("Invalid transaction: `v` value {0} is invalid")]
    InvalidV(u64),
    /// The signature is invalid or cannot be recovered.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// The transaction type is not supported.
    #[error("Invalid transaction: unsupported transaction type {0}")]
    UnsupportedType(u8),
}
