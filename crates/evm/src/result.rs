use edr_primitives::{Address, Bytes, HashMap, Log};
use edr_state_api::account::Account;

/// The output of a successful execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    /// Data returned by a call
    Call(Bytes),
    /// Code deployed by a contract creation, and the created address
    Create(Bytes, Option<Address>),
}

impl Output {
    /// The returned data or deployed code.
    pub fn data(&self) -> &Bytes {
        match self {
            Output::Call(data) | Output::Create(data, _) => data,
        }
    }

    /// The created address, if any.
    pub fn address(&self) -> Option<&Address> {
        match self {
            Output::Call(_) => None,
            Output::Create(_, address) => address.as_ref(),
        }
    }
}

/// Reason for an exceptional halt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// Not enough gas to continue execution
    OutOfGas,
    /// Contract creation at an address that already has code or a nonce
    CreateCollision,
    /// Deployed code exceeds the maximum code size
    CreateContractSizeLimit,
    /// An opcode that is unknown or not supported
    OpcodeNotFound,
    /// Value transfer with insufficient balance
    OutOfFunds,
}

/// The result of executing a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Returned successfully
    Success {
        /// Gas used, after refunds
        gas_used: u64,
        /// Gas refunded
        gas_refunded: u64,
        /// Emitted logs
        logs: Vec<Log>,
        /// Output of the call or creation
        output: Output,
    },
    /// Reverted by the `REVERT` opcode, which does not consume all gas
    Revert {
        /// Gas used
        gas_used: u64,
        /// Revert data
        output: Bytes,
    },
    /// Halted exceptionally, consuming all gas
    Halt {
        /// Halting reason
        reason: HaltReason,
        /// Gas used, which is the gas limit
        gas_used: u64,
    },
}

impl ExecutionResult {
    /// Whether the execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    /// The gas used by the transaction.
    pub fn gas_used(&self) -> u64 {
        match self {
            ExecutionResult::Success { gas_used, .. }
            | ExecutionResult::Revert { gas_used, .. }
            | ExecutionResult::Halt { gas_used, .. } => *gas_used,
        }
    }

    /// The logs emitted by the transaction.
    pub fn logs(&self) -> &[Log] {
        match self {
            ExecutionResult::Success { logs, .. } => logs,
            ExecutionResult::Revert { .. } | ExecutionResult::Halt { .. } => &[],
        }
    }

    /// The returned data, revert data, or nothing for halts.
    pub fn output(&self) -> Option<&Bytes> {
        match self {
            ExecutionResult::Success { output, .. } => Some(output.data()),
            ExecutionResult::Revert { output, .. } => Some(output),
            ExecutionResult::Halt { .. } => None,
        }
    }
}

/// The result of executing a transaction, together with the resulting state
/// changes.
#[derive(Clone, Debug)]
pub struct ExecutionResultAndState {
    /// The execution result
    pub result: ExecutionResult,
    /// Accounts that were changed or touched
    pub state: HashMap<Address, Account>,
}
