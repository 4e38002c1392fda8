use alloy_rlp::{RlpDecodable, RlpEncodable};
use edr_primitives::{keccak256, Address, Bytes, ChainId, Signature, B256, U256};
use edr_signer::FakeableSignature;

use crate::{
    request::{self, envelop_bytes},
    AccessList, AccessListItem, Fee, Request, TransactionError, TransactionType, TxKind,
};

/// A transaction with a sender, either signed by its sender's secret key or
/// impersonated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signed {
    request: Request,
    signature: FakeableSignature,
    hash: B256,
    rlp_encoding: Bytes,
}

#[derive(RlpEncodable, RlpDecodable)]
struct LegacyFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

#[derive(RlpEncodable, RlpDecodable)]
struct Eip2930Fields {
    chain_id: ChainId,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
    access_list: AccessList,
    y_parity: bool,
    r: U256,
    s: U256,
}

#[derive(RlpEncodable, RlpDecodable)]
struct Eip1559Fields {
    chain_id: ChainId,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    kind: TxKind,
    value: U256,
    input: Bytes,
    access_list: AccessList,
    y_parity: bool,
    r: U256,
    s: U256,
}

fn legacy_v(chain_id: Option<ChainId>, y_parity: bool) -> u64 {
    let y_parity = u64::from(y_parity);
    chain_id.map_or(27 + y_parity, |chain_id| 35 + 2 * chain_id + y_parity)
}

/// Splits a legacy `v` value into the chain ID and the y-parity.
fn split_legacy_v(v: u64) -> Result<(Option<ChainId>, bool), TransactionError> {
    match v {
        27 | 28 => Ok((None, v == 28)),
        v if v >= 35 => Ok((Some((v - 35) / 2), (v - 35) % 2 == 1)),
        v => Err(TransactionError::InvalidV(v)),
    }
}

fn encode(request: &Request, signature: &Signature) -> Vec<u8> {
    let y_parity = signature.v();
    let r = signature.r();
    let s = signature.s();

    match request.clone() {
        Request::Legacy(request) => alloy_rlp::encode(LegacyFields {
            nonce: request.nonce,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            kind: request.kind,
            value: request.value,
            input: request.input,
            v: legacy_v(request.chain_id, y_parity),
            r,
            s,
        }),
        Request::Eip2930(request) => envelop_bytes(
            TransactionType::Eip2930,
            &alloy_rlp::encode(Eip2930Fields {
                chain_id: request.chain_id,
                nonce: request.nonce,
                gas_price: request.gas_price,
                gas_limit: request.gas_limit,
                kind: request.kind,
                value: request.value,
                input: request.input,
                access_list: request.access_list,
                y_parity,
                r,
                s,
            }),
        ),
        Request::Eip1559(request) => envelop_bytes(
            TransactionType::Eip1559,
            &alloy_rlp::encode(Eip1559Fields {
                chain_id: request.chain_id,
                nonce: request.nonce,
                max_priority_fee_per_gas: request.max_priority_fee_per_gas,
                max_fee_per_gas: request.max_fee_per_gas,
                gas_limit: request.gas_limit,
                kind: request.kind,
                value: request.value,
                input: request.input,
                access_list: request.access_list,
                y_parity,
                r,
                s,
            }),
        ),
    }
}

impl Signed {
    /// Constructs a transaction from a request and its signature.
    pub(crate) fn new(request: Request, signature: FakeableSignature) -> Self {
        let rlp_encoding = Bytes::from(encode(&request, signature.signature()));
        let hash = keccak256(&rlp_encoding);

        Self {
            request,
            signature,
            hash,
            rlp_encoding,
        }
    }

    /// Decodes an EIP-2718 encoded transaction and recovers its sender.
    pub fn decode(raw: &[u8]) -> Result<Self, TransactionError> {
        let (first, payload) = raw.split_first().ok_or(TransactionError::Empty)?;

        let (request, signature) = if *first >= 0xc0 {
            let fields: LegacyFields = alloy_rlp::decode_exact(raw)?;
            let (chain_id, y_parity) = split_legacy_v(fields.v)?;

            let request = Request::Legacy(request::Legacy {
                chain_id,
                nonce: fields.nonce,
                gas_price: fields.gas_price,
                gas_limit: fields.gas_limit,
                kind: fields.kind,
                value: fields.value,
                input: fields.input,
            });
            (request, Signature::new(fields.r, fields.s, y_parity))
        } else {
            match TransactionType::try_from(*first)? {
                TransactionType::Eip2930 => {
                    let fields: Eip2930Fields = alloy_rlp::decode_exact(payload)?;
                    let request = Request::Eip2930(request::Eip2930 {
                        chain_id: fields.chain_id,
                        nonce: fields.nonce,
                        gas_price: fields.gas_price,
                        gas_limit: fields.gas_limit,
                        kind: fields.kind,
                        value: fields.value,
                        input: fields.input,
                        access_list: fields.access_list,
                    });
                    (request, Signature::new(fields.r, fields.s, fields.y_parity))
                }
                TransactionType::Eip1559 => {
                    let fields: Eip1559Fields = alloy_rlp::decode_exact(payload)?;
                    let request = Request::Eip1559(request::Eip1559 {
                        chain_id: fields.chain_id,
                        nonce: fields.nonce,
                        max_priority_fee_per_gas: fields.max_priority_fee_per_gas,
                        max_fee_per_gas: fields.max_fee_per_gas,
                        gas_limit: fields.gas_limit,
                        kind: fields.kind,
                        value: fields.value,
                        input: fields.input,
                        access_list: fields.access_list,
                    });
                    (request, Signature::new(fields.r, fields.s, fields.y_parity))
                }
                TransactionType::Legacy => return Err(TransactionError::UnsupportedType(0)),
            }
        };

        let signature = FakeableSignature::recover(signature, &request.signature_hash())?;

        Ok(Self::new(request, signature))
    }

    /// The transaction hash.
    pub fn hash(&self) -> &B256 {
        &self.hash
    }

    /// The sender of the transaction.
    pub fn caller(&self) -> &Address {
        self.signature.caller()
    }

    /// Whether the transaction was created for an impersonated account.
    pub fn is_impersonated(&self) -> bool {
        self.signature.is_fake()
    }

    /// The signature of the transaction.
    pub fn signature(&self) -> &Signature {
        self.signature.signature()
    }

    /// The `v` value of the signature as reported over JSON-RPC: EIP-155
    /// encoded for legacy transactions, the y-parity otherwise.
    pub fn v(&self) -> u64 {
        let y_parity = self.signature().v();
        match &self.request {
            Request::Legacy(request) => legacy_v(request.chain_id, y_parity),
            Request::Eip2930(_) | Request::Eip1559(_) => u64::from(y_parity),
        }
    }

    /// The unsigned request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The EIP-2718 encoding of the transaction.
    pub fn rlp_encoding(&self) -> &Bytes {
        &self.rlp_encoding
    }

    /// The transaction's type.
    pub fn transaction_type(&self) -> TransactionType {
        self.request.transaction_type()
    }

    /// The chain ID, if the transaction is replay-protected.
    pub fn chain_id(&self) -> Option<ChainId> {
        self.request.chain_id()
    }

    /// The sender nonce.
    pub fn nonce(&self) -> u64 {
        self.request.nonce()
    }

    /// The gas limit.
    pub fn gas_limit(&self) -> u64 {
        self.request.gas_limit()
    }

    /// The fee the sender is willing to pay.
    pub fn fee(&self) -> Fee {
        self.request.fee()
    }

    /// The maximum fee per unit of gas: the gas price for legacy fees.
    pub fn gas_price(&self) -> u128 {
        self.fee().max_fee_per_gas()
    }

    /// Whether the transaction calls an address or creates a contract.
    pub fn kind(&self) -> TxKind {
        self.request.kind()
    }

    /// The transferred value.
    pub fn value(&self) -> U256 {
        self.request.value()
    }

    /// The call data or init code.
    pub fn input(&self) -> &Bytes {
        self.request.input()
    }

    /// The access list.
    pub fn access_list(&self) -> &[AccessListItem] {
        self.request.access_list()
    }

    /// The maximum amount of wei the transaction can cost its sender.
    pub fn upfront_cost(&self) -> U256 {
        crate::upfront_cost(self.gas_limit(), &self.fee(), self.value())
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::{address, hex};
    use edr_test_utils::secret_key::{DEFAULT_SECRET_KEY, secret_key_from_str};

    use super::*;

    fn dummy_eip1559() -> Request {
        Request::Eip1559(request::Eip1559 {
            chain_id: 31337,
            nonce: 0,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 2_000_000_000,
            gas_limit: 21_000,
            kind: TxKind::Call(address!("0x70997970c51812dc3a010c7d01b50e0d17dc79c8")),
            value: U256::from(1),
            input: Bytes::new(),
            access_list: AccessList::default(),
        })
    }

    #[test]
    fn eip155_signed_encoding() -> anyhow::Result<()> {
        // From https://eips.ethereum.org/EIPS/eip-155
        let raw = hex::decode(
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83",
        )?;

        let transaction = Signed::decode(&raw)?;
        assert_eq!(transaction.chain_id(), Some(1));
        assert_eq!(transaction.nonce(), 9);
        assert_eq!(transaction.fee(), Fee::Legacy { gas_price: 20_000_000_000 });
        assert_eq!(
            *transaction.caller(),
            address!("0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f")
        );
        assert_eq!(transaction.rlp_encoding().as_ref(), raw.as_slice());
        assert_eq!(*transaction.hash(), keccak256(&raw));

        Ok(())
    }

    #[test]
    fn signed_transactions_decode_to_themselves() -> anyhow::Result<()> {
        let secret_key = secret_key_from_str(DEFAULT_SECRET_KEY)?;

        let access_list = AccessList(vec![AccessListItem {
            address: Address::repeat_byte(7),
            storage_keys: vec![B256::repeat_byte(1)],
        }]);
        let eip2930 = Request::Eip2930(request::Eip2930 {
            chain_id: 1,
            nonce: 3,
            gas_price: 10,
            gas_limit: 50_000,
            kind: TxKind::Create,
            value: U256::ZERO,
            input: Bytes::from(vec![0x60, 0x00]),
            access_list,
        });

        for request in [dummy_eip1559(), eip2930] {
            let signed = request.sign(&secret_key)?;
            let decoded = Signed::decode(signed.rlp_encoding())?;

            assert_eq!(decoded, signed);
            assert_eq!(decoded.caller(), signed.caller());
        }

        Ok(())
    }

    #[test]
    fn typed_encoding_starts_with_type() -> anyhow::Result<()> {
        let secret_key = secret_key_from_str(DEFAULT_SECRET_KEY)?;
        let signed = dummy_eip1559().sign(&secret_key)?;

        assert_eq!(signed.rlp_encoding().first(), Some(&2));
        assert_eq!(signed.transaction_type(), TransactionType::Eip1559);
        assert_eq!(signed.upfront_cost(), U256::from(42_000_000_000_001u64));

        Ok(())
    }

    #[test]
    fn reject_unsupported_types() {
        assert!(matches!(
            Signed::decode(&[0x03, 0xc0]),
            Err(TransactionError::UnsupportedType(3))
        ));
        assert!(matches!(Signed::decode(&[]), Err(TransactionError::Empty)));
    }

    #[test]
    fn reject_invalid_v() {
        let mut encoded = Vec::new();
        alloy_rlp::Encodable::encode(
            &LegacyFields {
                nonce: 0,
                gas_price: 1,
                gas_limit: 21_000,
                kind: TxKind::Create,
                value: U256::ZERO,
                input: Bytes::new(),
                v: 30,
                r: U256::from(1),
                s: U256::from(1),
            },
            &mut encoded,
        );

        assert!(matches!(
            Signed::decode(&encoded),
            Err(TransactionError::InvalidV(30))
        ));
    }
}
