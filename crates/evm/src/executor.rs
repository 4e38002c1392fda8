use core::fmt::Debug;

use auto_impl::auto_impl;
use edr_primitives::{Address, Bytes, U256};
use edr_state_api::StateError;

use crate::{
    config::{BlockEnv, CfgEnv},
    journal::Journal,
    result::HaltReason,
};

/// The message that an [`Executor`] runs after the transaction's fees, nonce
/// and value transfer have been applied.
#[derive(Clone, Debug)]
pub struct Frame<'a> {
    /// Execution configuration
    pub cfg: &'a CfgEnv,
    /// The block the transaction is executed in
    pub block: &'a BlockEnv,
    /// The transaction sender
    pub caller: Address,
    /// The called or created address
    pub target: Address,
    /// Whether the frame creates a contract at `target`
    pub is_create: bool,
    /// The code to run: the callee's code, or the init code of a creation
    pub code: Bytes,
    /// Call data; empty for creations
    pub input: Bytes,
    /// Transferred value
    pub value: U256,
    /// Gas available after the intrinsic cost was paid
    pub gas_limit: u64,
}

/// How a frame ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Returned data; for creations the data is the code to deploy
    Return(Bytes),
    /// Reverted with data
    Revert(Bytes),
    /// Halted exceptionally
    Halt(HaltReason),
}

/// The result of running a [`Frame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameResult {
    /// How the frame ended
    pub status: FrameStatus,
    /// Gas used, excluding the intrinsic cost
    pub gas_used: u64,
    /// Gas to refund, before capping
    pub gas_refunded: u64,
}

/// Runs the code of a transaction. This is the seam at which a bytecode
/// interpreter is plugged in.
///
/// Changes are made through the [`Journal`]; they are discarded by the
/// caller unless the frame returns successfully.
#[auto_impl(&, Box, Arc)]
pub trait Executor: Debug + Send + Sync {
    /// Runs the frame.
    fn execute(&self, frame: Frame<'_>, journal: &mut Journal<'_>) -> Result<FrameResult, StateError>;
}

/// An executor without a bytecode interpreter. Calls return empty data
/// without running the callee's code, and creations deploy their input as the
/// contract's code.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransferExecutor;

impl Executor for TransferExecutor {
    fn execute(&self, frame: Frame<'_>, _journal: &mut Journal<'_>) -> Result<FrameResult, StateError> {
        let output = if frame.is_create {
            frame.code
        } else {
            Bytes::new()
        };

        Ok(FrameResult {
            status: FrameStatus::Return(output),
            gas_used: 0,
            gas_refunded: 0,
        })
    }
}
