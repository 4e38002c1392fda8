use core::fmt::Debug;
use std::{ops::Deref, str::FromStr};

use edr_primitives::{Address, Bytes, U256, U64};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ProviderError;

/// An address that only deserializes from a `0x`-prefixed string of 20
/// bytes.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(transparent)]
pub struct RpcAddress(#[serde(deserialize_with = "deserialize_address")] pub Address);

impl Deref for RpcAddress {
    type Target = Address;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Address> for RpcAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

const STORAGE_KEY_TOO_LARGE_ERROR_MESSAGE: &str =
    "Storage key must not be greater than or equal to 2^256.";
const STORAGE_VALUE_INVALID_LENGTH_ERROR_MESSAGE: &str =
    "Storage value must be exactly 32 bytes long.";
const UNSUPPORTED_METHOD: &str = "unknown variant";

/// Why a request could not be deserialized.
pub enum InvalidRequestReason<'a> {
    /// The method is not supported
    UnsupportedMethod {
        /// Name of the method
        method_name: &'a str,
    },
    /// A storage key exceeds 32 bytes
    InvalidStorageKey {
        /// Name of the method
        method_name: &'a str,
        /// Deserialization error
        error_message: &'a str,
    },
    /// A storage value is not exactly 32 bytes
    InvalidStorageValue {
        /// Name of the method
        method_name: &'a str,
        /// Deserialization error
        error_message: &'a str,
    },
    /// Any other malformed request
    InvalidJson {
        /// Deserialization error
        error_message: &'a str,
    },
}

impl<'a> InvalidRequestReason<'a> {
    /// Classifies a deserialization error of the method with the provided
    /// name.
    pub fn new(method_name: Option<&'a str>, error_message: &'a str) -> Self {
        if let Some(method_name) = method_name {
            if error_message.starts_with(STORAGE_KEY_TOO_LARGE_ERROR_MESSAGE) {
                return InvalidRequestReason::InvalidStorageKey {
                    method_name,
                    error_message,
                };
            } else if error_message.starts_with(STORAGE_VALUE_INVALID_LENGTH_ERROR_MESSAGE) {
                return InvalidRequestReason::InvalidStorageValue {
                    method_name,
                    error_message,
                };
            } else if error_message.starts_with(UNSUPPORTED_METHOD) {
                return InvalidRequestReason::UnsupportedMethod { method_name };
            }
        }

        InvalidRequestReason::InvalidJson { error_message }
    }

    /// The JSON-RPC error code.
    pub fn error_code(&self) -> i16 {
        match self {
            InvalidRequestReason::UnsupportedMethod { .. } => -32004,
            InvalidRequestReason::InvalidStorageKey { .. }
            | InvalidRequestReason::InvalidStorageValue { .. } => -32000,
            InvalidRequestReason::InvalidJson { .. } => -32602,
        }
    }

    /// The JSON-RPC error message.
    pub fn error_message(&self) -> String {
        match self {
            InvalidRequestReason::UnsupportedMethod { method_name } => {
                format!("Method {method_name} is not supported")
            }
            InvalidRequestReason::InvalidStorageKey { error_message, .. }
            | InvalidRequestReason::InvalidStorageValue { error_message, .. }
            | InvalidRequestReason::InvalidJson { error_message } => (*error_message).into(),
        }
    }

    /// Converts the reason into a provider error, for reasons that relate to
    /// a known method.
    pub fn provider_error(&self) -> Option<(&str, ProviderError)> {
        match self {
            InvalidRequestReason::InvalidJson { .. } => None,
            InvalidRequestReason::InvalidStorageKey {
                error_message,
                method_name,
            }
            | InvalidRequestReason::InvalidStorageValue {
                error_message,
                method_name,
            } => Some((
                method_name,
                ProviderError::InvalidInput((*error_message).to_string()),
            )),
            InvalidRequestReason::UnsupportedMethod { method_name } => Some((
                method_name,
                ProviderError::UnsupportedMethod {
                    method_name: (*method_name).to_string(),
                },
            )),
        }
    }
}

/// The JSON-RPC value kinds that requests are validated against.
#[derive(Clone, Copy)]
enum RpcKind {
    Address,
    Data,
    Quantity,
}

impl RpcKind {
    fn name(self) -> &'static str {
        match self {
            RpcKind::Address => "ADDRESS",
            RpcKind::Data => "DATA",
            RpcKind::Quantity => "QUANTITY",
        }
    }

    fn invalid_value<ErrorT: serde::de::Error>(self, value: &str) -> ErrorT {
        ErrorT::custom(format!("invalid value \"{value}\" supplied to : {}", self.name()))
    }
}

/// Deserializes a `0x`-prefixed string, reporting non-string input the way
/// Hardhat does.
fn deserialize_prefixed<'de, DeserializerT>(
    deserializer: DeserializerT,
    kind: RpcKind,
) -> Result<String, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    let value = String::deserialize(deserializer).map_err(|error| {
        let message = error.to_string();
        match extract_value_from_serde_json_error(&message) {
            Some(value) => serde::de::Error::custom(format!(
                "This method only supports strings but input was: {value}"
            )),
            None => serde::de::Error::custom(format!(
                "Failed to deserialize {} argument into string with error: '{message}'",
                kind.name().to_lowercase()
            )),
        }
    })?;

    if value.starts_with("0x") {
        Ok(value)
    } else {
        Err(kind.invalid_value(&value))
    }
}

fn parse_prefixed<'de, DeserializerT, T: FromStr>(
    deserializer: DeserializerT,
    kind: RpcKind,
) -> Result<T, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    let value = deserialize_prefixed(deserializer, kind)?;
    value.parse().map_err(|_error| kind.invalid_value(&value))
}

/// Deserializes the JSON-RPC address type.
pub(crate) fn deserialize_address<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<Address, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    let value = deserialize_prefixed(deserializer, RpcKind::Address)?;
    if value.len() != 42 {
        return Err(RpcKind::Address.invalid_value(&value));
    }

    value
        .parse()
        .map_err(|_error| RpcKind::Address.invalid_value(&value))
}

/// Deserializes the JSON-RPC data type.
pub(crate) fn deserialize_data<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<Bytes, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    parse_prefixed(deserializer, RpcKind::Data)
}

/// Deserializes the JSON-RPC quantity type.
pub(crate) fn deserialize_quantity<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<U256, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    parse_prefixed(deserializer, RpcKind::Quantity)
}

/// Deserializes a nonce, which must fit into 64 bits.
pub(crate) fn deserialize_nonce<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<u64, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    let value = deserialize_prefixed(deserializer, RpcKind::Quantity)?;
    // "0x" followed by at most 16 nibbles
    if value.len() > 18 {
        return Err(serde::de::Error::custom(format!(
            "Nonce must not be greater than or equal to 2^64. Received {value}"
        )));
    }

    U64::from_str(&value)
        .map(|nonce| nonce.to::<u64>())
        .map_err(|_error| RpcKind::Quantity.invalid_value(&value))
}

/// Deserializes a storage key, which must fit into 256 bits.
pub(crate) fn deserialize_storage_key<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<U256, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    let value = deserialize_prefixed(deserializer, RpcKind::Quantity)?;
    if value.len() > 66 {
        return Err(serde::de::Error::custom(format!(
            "{STORAGE_KEY_TOO_LARGE_ERROR_MESSAGE} Received {value}."
        )));
    }

    U256::from_str(&value).map_err(|_error| RpcKind::Quantity.invalid_value(&value))
}

/// A timestamp in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(pub u64);

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        U64::deserialize(deserializer)
            .map(|value| Timestamp(value.to::<u64>()))
            .map_err(|_err| {
                serde::de::Error::custom(
                    "Timestamp must be a non-negative number not exceeding 2^64 - 1",
                )
            })
    }
}

/// (De)serializes a storage value, which must be exactly 32 bytes.
pub(crate) mod storage_value {
    use edr_primitives::hex;
    use edr_state_api::storage::storage_value_from_bytes;
    use serde::Serializer;

    use super::{
        deserialize_prefixed, Deserializer, RpcKind, STORAGE_VALUE_INVALID_LENGTH_ERROR_MESSAGE,
        U256,
    };

    /// Deserializes a `0x`-prefixed storage value of exactly 32 bytes.
    pub fn deserialize<'de, DeserializerT>(
        deserializer: DeserializerT,
    ) -> Result<U256, DeserializerT::Error>
    where
        DeserializerT: Deserializer<'de>,
    {
        let value = deserialize_prefixed(deserializer, RpcKind::Data)?;
        let bytes = hex::decode(&value).map_err(|_error| RpcKind::Data.invalid_value(&value))?;

        storage_value_from_bytes(&bytes).map_err(|_error| {
            serde::de::Error::custom(format!(
                "{STORAGE_VALUE_INVALID_LENGTH_ERROR_MESSAGE} Received {value}, which is {} bytes long.",
                bytes.len()
            ))
        })
    }

    /// Serializes a storage value padded to 32 bytes.
    pub fn serialize<SerializerT>(
        value: &U256,
        serializer: SerializerT,
    ) -> Result<SerializerT::Ok, SerializerT::Error>
    where
        SerializerT: Serializer,
    {
        let padded = format!("0x{value:0>64x}");
        serializer.serialize_str(&padded)
    }
}

fn extract_value_from_serde_json_error(error_message: &str) -> Option<&str> {
    let start = error_message.find('`')?;
    let end = error_message.rfind('`')?;
    if start < end {
        error_message.get(start + 1..end)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_value_from_error_message() {
        assert_eq!(
            extract_value_from_serde_json_error("invalid type: integer `0`, expected a string"),
            Some("0"),
        );
        assert_eq!(extract_value_from_serde_json_error(""), None);
        assert_eq!(extract_value_from_serde_json_error("`"), None);
        assert_eq!(extract_value_from_serde_json_error("``"), Some(""));
        assert_eq!(
            extract_value_from_serde_json_error("foo`bar`baz"),
            Some("bar")
        );
    }

    #[test]
    fn address_requires_prefix_and_length() {
        let parse = |json: &str| {
            let mut deserializer = serde_json::Deserializer::from_str(json);
            deserialize_address(&mut deserializer).map_err(|error| error.to_string())
        };

        assert_eq!(
            parse(r#""0x0000000000000000000000000000000000000001""#),
            Ok(Address::with_last_byte(1))
        );
        assert_eq!(
            parse(r#""0x01""#),
            Err("invalid value \"0x01\" supplied to : ADDRESS".to_owned())
        );
        assert_eq!(
            parse("1"),
            Err("This method only supports strings but input was: 1".to_owned())
        );
    }

    #[test]
    fn data_requires_prefix() {
        let mut deserializer = serde_json::Deserializer::from_str(r#""abcd""#);
        let error = deserialize_data(&mut deserializer).unwrap_err().to_string();

        assert_eq!(error, "invalid value \"abcd\" supplied to : DATA");
    }

    #[test]
    fn deserialize_too_large_nonce() {
        let json = r#""0xffffffffffffffffff""#;

        let mut deserializer = serde_json::Deserializer::from_str(json);
        let error = deserialize_nonce(&mut deserializer)
            .unwrap_err()
            .to_string();

        assert!(
            error.contains("Nonce must not be greater than or equal to 2^64."),
            "actual: {error}"
        );
    }

    #[test]
    fn storage_value_must_be_32_bytes() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Test {
            #[serde(with = "storage_value")]
            n: U256,
        }

        let error = serde_json::from_str::<Test>(r#"{"n":"0x01"}"#)
            .unwrap_err()
            .to_string();
        assert!(
            error.starts_with(STORAGE_VALUE_INVALID_LENGTH_ERROR_MESSAGE),
            "actual: {error}"
        );

        let json = serde_json::to_string(&Test { n: U256::from(1) }).unwrap();
        assert!(json.contains("0x0000000000000000000000000000000000000000000000000000000000000001"));

        let parsed = serde_json::from_str::<Test>(&json).unwrap();
        assert_eq!(parsed.n, U256::from(1));
    }

    #[test]
    fn deserialize_timestamp() {
        serde_json::from_str::<Timestamp>("\"0x0\"").unwrap();
        serde_json::from_str::<Timestamp>("\"0x1122334455667788\"").unwrap();

        assert_eq!(
            serde_json::from_str::<Timestamp>("\"0x11223344556677889900\"")
                .unwrap_err()
                .to_string(),
            "Timestamp must be a non-negative number not exceeding 2^64 - 1"
        );
    }

    #[test]
    fn invalid_request_reason_codes() {
        let reason = InvalidRequestReason::new(Some("eth_foo"), "unknown variant `eth_foo`");
        assert_eq!(reason.error_code(), -32004);
        assert_eq!(reason.error_message(), "Method eth_foo is not supported");

        let reason = InvalidRequestReason::new(None, "missing field `params`");
        assert_eq!(reason.error_code(), -32602);
        assert!(reason.provider_error().is_none());
    }
}
