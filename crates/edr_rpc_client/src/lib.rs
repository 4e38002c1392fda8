#![warn(missing_docs)]

//! Ethereum JSON-RPC client

mod client;
/// Types specific to JSON-RPC
pub mod jsonrpc;
mod method;

pub use reqwest::header::{self, HeaderMap};

pub use self::{
    client::{RemoteAccount, RpcClient, RpcClientError},
    method::RequestMethod,
};
