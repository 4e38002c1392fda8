use edr_primitives::B256;
use edr_rpc_client::RpcClientError;

/// Combinatorial error for the state API
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A checkpoint operation was invoked without any checkpoint.
    #[error("{action} called when not checkpointed")]
    NotCheckpointed {
        /// The invoked operation
        action: &'static str,
    },
    /// An operation that replaces the state was invoked while checkpointed.
    #[error("{action} called when checkpointed")]
    CalledWhileCheckpointed {
        /// The invoked operation
        action: &'static str,
    },
    /// Contract with specified code hash does not exist
    #[error("Contract with code hash `{0}` does not exist.")]
    InvalidCodeHash(B256),
    /// The state root was never produced by this state.
    #[error("Unknown state root")]
    UnknownStateRoot(B256),
    /// A storage value that is not exactly 32 bytes long.
    #[error("Storage value must be 32 bytes long, but is {0} bytes")]
    InvalidStorageValueLength(usize),
    /// Error from the underlying RPC client
    #[error(transparent)]
    Remote(#[from] RpcClientError),
    /// An operation that cannot be performed on a forked state.
    #[error("{action} is not supported when forking from remote network")]
    UnsupportedInForkMode {
        /// The invoked operation
        action: &'static str,
    },
}
