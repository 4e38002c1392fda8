//! Helpers for (de)serializing JSON-RPC parameter sequences.

use serde::{
    de::DeserializeOwned, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer,
};

/// for use with serde's `serialize_with` on an optional single value that
/// should be serialized as a sequence
pub fn optional_single_to_sequence<S, T>(val: &Option<T>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    let mut seq = s.serialize_seq(Some(usize::from(val.is_some())))?;
    if let Some(val) = val {
        seq.serialize_element(val)?;
    }
    seq.end()
}

/// for use with serde's `deserialize_with` on a sequence that should be
/// deserialized as a single but optional value.
pub fn sequence_to_optional_single<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let mut values = Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default();
    match values.len() {
        0 => Ok(None),
        1 => Ok(values.pop()),
        len => Err(serde::de::Error::custom(format!(
            "expected params sequence with length 0 or 1 but got {len}"
        ))),
    }
}

/// (De)serializes `()` as an empty params sequence.
pub mod empty_params {
    use super::{Deserialize, Deserializer, SerializeSeq, Serializer};

    /// Deserializes `[]` (or absent params) into `()`.
    pub fn deserialize<'de, DeserializerT>(d: DeserializerT) -> Result<(), DeserializerT::Error>
    where
        DeserializerT: Deserializer<'de>,
    {
        let seq = Option::<Vec<serde::de::IgnoredAny>>::deserialize(d)?.unwrap_or_default();
        if !seq.is_empty() {
            return Err(serde::de::Error::custom(format!(
                "expected params sequence with length 0 but got {}",
                seq.len()
            )));
        }
        Ok(())
    }

    /// Serializes `()` into `[]`.
    pub fn serialize<SerializerT>(
        _val: &(),
        s: SerializerT,
    ) -> Result<SerializerT::Ok, SerializerT::Error>
    where
        SerializerT: Serializer,
    {
        let seq = s.serialize_seq(Some(0))?;
        seq.end()
    }
}

/// (De)serializes a single value as a sequence of length one.
pub mod sequence {
    use super::{Deserialize, DeserializeOwned, Deserializer, Serialize, SerializeSeq, Serializer};

    /// Deserializes a single value from a sequence of length one.
    pub fn deserialize<'de, T, DeserializerT>(d: DeserializerT) -> Result<T, DeserializerT::Error>
    where
        DeserializerT: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let mut seq = Vec::<T>::deserialize(d)?;
        if seq.len() != 1 {
            return Err(serde::de::Error::custom(format!(
                "expected params sequence with length 1 but got {}",
                seq.len()
            )));
        }
        Ok(seq.remove(0))
    }

    /// Serializes a single value into a sequence of length one.
    pub fn serialize<SerializerT, T>(
        val: &T,
        s: SerializerT,
    ) -> Result<SerializerT::Ok, SerializerT::Error>
    where
        SerializerT: Serializer,
        T: Serialize,
    {
        let mut seq = s.serialize_seq(Some(1))?;
        seq.serialize_element(val)?;
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    #[serde(tag = "method", content = "params")]
    enum Method {
        #[serde(rename = "none", with = "super::empty_params")]
        Empty(()),
        #[serde(rename = "one", with = "super::sequence")]
        One(u64),
        #[serde(
            rename = "maybe",
            serialize_with = "super::optional_single_to_sequence",
            deserialize_with = "super::sequence_to_optional_single"
        )]
        Maybe(Option<u64>),
    }

    #[test]
    fn params_sequences() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&Method::Empty(()))?,
            r#"{"method":"none","params":[]}"#
        );
        assert_eq!(
            serde_json::from_str::<Method>(r#"{"method":"one","params":[7]}"#)?,
            Method::One(7)
        );
        assert_eq!(
            serde_json::from_str::<Method>(r#"{"method":"maybe","params":[]}"#)?,
            Method::Maybe(None)
        );
        assert_eq!(
            serde_json::to_string(&Method::Maybe(Some(3)))?,
            r#"{"method":"maybe","params":[3]}"#
        );
        assert!(serde_json::from_str::<Method>(r#"{"method":"none","params":[1]}"#).is_err());

        Ok(())
    }
}
