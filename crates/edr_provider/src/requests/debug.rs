use edr_primitives::B256;
use serde::{Deserialize, Deserializer};

use crate::{
    data::ProviderData, debug_trace::DebugTraceResult, time::TimeSinceEpoch, ProviderError,
};

pub fn handle_debug_trace_transaction<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    transaction_hash: B256,
    // Struct logs are always empty, so the disable flags have no effect.
    _config: Option<DebugTraceConfig>,
) -> Result<DebugTraceResult, ProviderError> {
    data.debug_trace_transaction(&transaction_hash)
        .map_err(|error| match error {
            ProviderError::InvalidTransactionHash(tx_hash) => ProviderError::InvalidInput(format!(
                "Unable to find a block containing transaction {tx_hash}"
            )),
            _ => error,
        })
}

/// Config options for `debug_traceTransaction`
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTraceConfig {
    /// Which tracer to use. Only the default tracer is supported, so this
    /// must be omitted.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_tracer"
    )]
    pub tracer: Option<Tracer>,
    /// Disable storage trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_storage: Option<bool>,
    /// Disable memory trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_memory: Option<bool>,
    /// Disable stack trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_stack: Option<bool>,
}

/// The tracer of `debug_traceTransaction`.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Tracer {
    /// Struct log tracer
    #[default]
    #[serde(rename = "default")]
    Default,
}

fn deserialize_tracer<'de, DeserializerT>(
    deserializer: DeserializerT,
) -> Result<Option<Tracer>, DeserializerT::Error>
where
    DeserializerT: Deserializer<'de>,
{
    const HARDHAT_ERROR: &str = "Hardhat currently only supports the default tracer, so no tracer parameter should be passed.";

    let tracer = Option::<Tracer>::deserialize(deserializer)
        .map_err(|_error| serde::de::Error::custom(HARDHAT_ERROR))?;

    if tracer.is_some() {
        Err(serde::de::Error::custom(HARDHAT_ERROR))
    } else {
        Ok(tracer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracer_is_rejected() {
        let error = serde_json::from_str::<DebugTraceConfig>(r#"{"tracer":"callTracer"}"#)
            .unwrap_err()
            .to_string();

        assert!(error.contains("only supports the default tracer"), "{error}");
    }

    #[test]
    fn disable_flags() -> anyhow::Result<()> {
        let config: DebugTraceConfig =
            serde_json::from_str(r#"{"disableStorage":true,"disableStack":false}"#)?;

        assert_eq!(
            config,
            DebugTraceConfig {
                tracer: None,
                disable_storage: Some(true),
                disable_memory: None,
                disable_stack: Some(false),
            }
        );

        Ok(())
    }
}
