use alloy_rlp::RlpEncodable;
use edr_primitives::{keccak256, Address, Bytes, ChainId, B256, U256};
use edr_signer::{FakeableSignature, SecretKey, SignatureError, secret_key_to_address, sign_hash};

use crate::{AccessList, AccessListItem, Fee, Signed, TransactionType, TxKind};

/// A legacy transaction request. With a chain ID it is signed according to
/// EIP-155.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Legacy {
    /// Chain ID for replay protection
    pub chain_id: Option<ChainId>,
    /// Sender nonce
    pub nonce: u64,
    /// Price per unit of gas
    pub gas_price: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Call or create
    pub kind: TxKind,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
}

#[derive(RlpEncodable)]
struct PreEip155SigningFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
}

#[derive(RlpEncodable)]
struct Eip155SigningFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

impl Legacy {
    fn signature_hash(&self) -> B256 {
        let encoded = if let Some(chain_id) = self.chain_id {
            alloy_rlp::encode(Eip155SigningFields {
                nonce: self.nonce,
                gas_price: self.gas_price,
                gas_limit: self.gas_limit,
                kind: self.kind,
                value: self.value,
                input: self.input.clone(),
                chain_id,
                empty_r: 0,
                empty_s: 0,
            })
        } else {
            alloy_rlp::encode(PreEip155SigningFields {
                nonce: self.nonce,
                gas_price: self.gas_price,
                gas_limit: self.gas_limit,
                kind: self.kind,
                value: self.value,
                input: self.input.clone(),
            })
        };

        keccak256(encoded)
    }
}

/// An EIP-2930 transaction request.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable)]
pub struct Eip2930 {
    // The order of these fields determines encoding order.
    /// Chain ID
    pub chain_id: ChainId,
    /// Sender nonce
    pub nonce: u64,
    /// Price per unit of gas
    pub gas_price: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Call or create
    pub kind: TxKind,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Pre-warmed addresses and storage slots
    pub access_list: AccessList,
}

/// An EIP-1559 transaction request.
#[derive(Clone, Debug, PartialEq, Eq, RlpEncodable)]
pub struct Eip1559 {
    // The order of these fields determines encoding order.
    /// Chain ID
    pub chain_id: ChainId,
    /// Sender nonce
    pub nonce: u64,
    /// Maximum fee per unit of gas paid to the block producer
    pub max_priority_fee_per_gas: u128,
    /// Maximum total fee per unit of gas
    pub max_fee_per_gas: u128,
    /// Gas limit
    pub gas_limit: u64,
    /// Call or create
    pub kind: TxKind,
    /// Transferred value
    pub value: U256,
    /// Call data or init code
    pub input: Bytes,
    /// Pre-warmed addresses and storage slots
    pub access_list: AccessList,
}

/// Prepends the provided RLP-encoded bytes with the transaction type.
pub(crate) fn envelop_bytes(transaction_type: TransactionType, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(u8::from(transaction_type));
    out.extend_from_slice(bytes);
    out
}

/// A transaction request of any supported type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Legacy transaction
    Legacy(Legacy),
    /// EIP-2930 transaction
    Eip2930(Eip2930),
    /// EIP-1559 transaction
    Eip1559(Eip1559),
}

impl Request {
    /// The hash that is signed by the sender.
    pub fn signature_hash(&self) -> B256 {
        match self {
            Request::Legacy(request) => request.signature_hash(),
            Request::Eip2930(request) => keccak256(envelop_bytes(
                TransactionType::Eip2930,
                &alloy_rlp::encode(request),
            )),
            Request::Eip1559(request) => keccak256(envelop_bytes(
                TransactionType::Eip1559,
                &alloy_rlp::encode(request),
            )),
        }
    }

    /// Signs the request with the provided secret key.
    pub fn sign(self, secret_key: &SecretKey) -> Result<Signed, SignatureError> {
        let caller = secret_key_to_address(secret_key);
        let signature = sign_hash(secret_key, &self.signature_hash())?;

        // SAFETY: The caller is derived from the secret key.
        let signature = unsafe { FakeableSignature::with_address_unchecked(signature, caller) };

        Ok(Signed::new(self, signature))
    }

    /// Creates an impersonated transaction for the provided sender.
    pub fn fake_sign(self, sender: Address) -> Signed {
        Signed::new(self, FakeableSignature::fake(sender))
    }

    /// The transaction's type.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Request::Legacy(_) => TransactionType::Legacy,
            Request::Eip2930(_) => TransactionType::Eip2930,
            Request::Eip1559(_) => TransactionType::Eip1559,
        }
    }

    /// The chain ID, if the transaction is replay-protected.
    pub fn chain_id(&self) -> Option<ChainId> {
        match self {
            Request::Legacy(request) => request.chain_id,
            Request::Eip2930(request) => Some(request.chain_id),
            Request::Eip1559(request) => Some(request.chain_id),
        }
    }

    /// The sender nonce.
    pub fn nonce(&self) -> u64 {
        match self {
            Request::Legacy(request) => request.nonce,
            Request::Eip2930(request) => request.nonce,
            Request::Eip1559(request) => request.nonce,
        }
    }

    /// The gas limit.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Request::Legacy(request) => request.gas_limit,
            Request::Eip2930(request) => request.gas_limit,
            Request::Eip1559(request) => request.gas_limit,
        }
    }

    /// The fee the sender is willing to pay.
    pub fn fee(&self) -> Fee {
        match self {
            Request::Legacy(Legacy { gas_price, .. })
            | Request::Eip2930(Eip2930 { gas_price, .. }) => Fee::Legacy {
                gas_price: *gas_price,
            },
            Request::Eip1559(request) => Fee::Eip1559 {
                max_fee_per_gas: request.max_fee_per_gas,
                max_priority_fee_per_gas: request.max_priority_fee_per_gas,
            },
        }
    }

    /// Whether the transaction calls an address or creates a contract.
    pub fn kind(&self) -> TxKind {
        match self {
            Request::Legacy(request) => request.kind,
            Request::Eip2930(request) => request.kind,
            Request::Eip1559(request) => request.kind,
        }
    }

    /// The transferred value.
    pub fn value(&self) -> U256 {
        match self {
            Request::Legacy(request) => request.value,
            Request::Eip2930(request) => request.value,
            Request::Eip1559(request) => request.value,
        }
    }

    /// The call data or init code.
    pub fn input(&self) -> &Bytes {
        match self {
            Request::Legacy(request) => &request.input,
            Request::Eip2930(request) => &request.input,
            Request::Eip1559(request) => &request.input,
        }
    }

    /// The access list, which is empty for legacy transactions.
    pub fn access_list(&self) -> &[AccessListItem] {
        match self {
            Request::Legacy(_) => &[],
            Request::Eip2930(request) => &request.access_list.0,
            Request::Eip1559(request) => &request.access_list.0,
        }
    }
}

impl From<Legacy> for Request {
    fn from(value: Legacy) -> Self {
        Self::Legacy(value)
    }
}

impl From<Eip2930> for Request {
    fn from(value: Eip2930) -> Self {
        Self::Eip2930(value)
    }
}

impl From<Eip1559> for Request {
    fn from(value: Eip1559) -> Self {
        Self::Eip1559(value)
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::{address, b256};
    use edr_test_utils::secret_key::{DEFAULT_SECRET_KEY, secret_key_from_str};

    use super::*;

    fn dummy_legacy(chain_id: Option<u64>) -> Legacy {
        Legacy {
            chain_id,
            nonce: 1,
            gas_price: 2,
            gas_limit: 3,
            kind: TxKind::Call(address!("0x0000000000000000000000000000000000000001")),
            value: U256::from(4),
            input: Bytes::from(vec![1, 2]),
        }
    }

    #[test]
    fn eip155_signature_hash() {
        // From https://eips.ethereum.org/EIPS/eip-155
        let request = Legacy {
            chain_id: Some(1),
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            kind: TxKind::Call(address!("0x3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000_000u128),
            input: Bytes::new(),
        };

        assert_eq!(
            Request::from(request).signature_hash(),
            b256!("0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
        );
    }

    #[test]
    fn chain_id_changes_signature_hash() {
        let pre_eip155 = Request::from(dummy_legacy(None)).signature_hash();
        let post_eip155 = Request::from(dummy_legacy(Some(1))).signature_hash();

        assert_ne!(pre_eip155, post_eip155);
    }

    #[test]
    fn signing_sets_caller() -> anyhow::Result<()> {
        let secret_key = secret_key_from_str(DEFAULT_SECRET_KEY)?;
        let signed = Request::from(dummy_legacy(Some(31337))).sign(&secret_key)?;

        assert_eq!(
            *signed.caller(),
            address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        assert!(!signed.is_impersonated());

        Ok(())
    }

    #[test]
    fn fake_signed_hash_depends_on_sender() {
        let first = Request::from(dummy_legacy(Some(1))).fake_sign(Address::repeat_byte(1));
        let second = Request::from(dummy_legacy(Some(1))).fake_sign(Address::repeat_byte(2));
        let first_again = Request::from(dummy_legacy(Some(1))).fake_sign(Address::repeat_byte(1));

        assert!(first.is_impersonated());
        assert_ne!(first.hash(), second.hash());
        assert_eq!(first.hash(), first_again.hash());
    }
}
