use serde::{Deserialize, Serialize};

/// Represents a JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, thiserror::Error)]
#[error("The response reported error `{code}`: `{message}`. (optional data: {data:?})")]
pub struct Error {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The version of the JSON-RPC protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum Version {
    /// Version 2.0
    #[default]
    #[serde(rename = "2.0")]
    V2_0,
}

/// A request or response identifier.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Id {
    /// Numeric id
    Num(u64),
    /// String id
    Str(String),
}

/// A JSON-RPC request.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Request<MethodT> {
    /// JSON-RPC version
    #[serde(rename = "jsonrpc")]
    pub version: Version,
    /// The method and its parameters
    #[serde(flatten)]
    pub method: MethodT,
    /// The request id
    pub id: Id,
}

/// A JSON-RPC response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Response<SuccessT> {
    /// JSON-RPC version
    #[serde(rename = "jsonrpc")]
    pub version: Version,
    /// The id of the request this responds to
    pub id: Id,
    /// The result or error
    #[serde(flatten)]
    pub data: ResponseData<SuccessT>,
}

/// The payload of a JSON-RPC response.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ResponseData<SuccessT> {
    /// An error
    Error {
        /// The error object
        error: Error,
    },
    /// A successful result
    Success {
        /// The result
        result: SuccessT,
    },
}

impl<SuccessT> ResponseData<SuccessT> {
    /// Converts the response into a `Result`.
    pub fn into_result(self) -> Result<SuccessT, Error> {
        match self {
            ResponseData::Success { result } => Ok(result),
            ResponseData::Error { error } => Err(error),
        }
    }
}

impl<SuccessT> From<Result<SuccessT, Error>> for ResponseData<SuccessT> {
    fn from(result: Result<SuccessT, Error>) -> Self {
        match result {
            Ok(result) => ResponseData::Success { result },
            Err(error) => ResponseData::Error { error },
        }
    }
}
