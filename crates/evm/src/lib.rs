//! Utilities for running transactions against a state.
//!
//! Bytecode execution is delegated to an [`Executor`]. This crate performs
//! everything around it: validation, fee payment, nonce and value handling,
//! contract deployment, refunds and the miner's payment.
#![warn(missing_docs)]

pub mod config;
mod executor;
pub mod gas;
mod journal;
pub mod result;

use edr_chain_config::Hardfork;
use edr_primitives::{Address, Bytes, HashMap, KECCAK_EMPTY, U256};
use edr_state_api::{
    StateError, StateView,
    account::{Account, AccountStatus},
};
use edr_transaction::{Signed, TransactionType, TxKind};

pub use self::{
    executor::{Executor, Frame, FrameResult, FrameStatus, TransferExecutor},
    journal::{Journal, JournalCheckpoint},
};
use self::{
    config::{BlockEnv, CfgEnv},
    result::{ExecutionResult, ExecutionResultAndState, HaltReason, Output},
};

/// Reasons for a transaction to be rejected before execution.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidTransaction {
    /// The priority fee exceeds the fee cap.
    #[error("priority fee is greater than max fee")]
    PriorityFeeGreaterThanMaxFee,
    /// The fee cap is below the block's base fee.
    #[error("gas price is less than basefee")]
    GasPriceLessThanBasefee,
    /// The gas limit exceeds the block gas limit.
    #[error("caller gas limit exceeds the block gas limit")]
    CallerGasLimitMoreThanBlock,
    /// The gas limit does not cover the intrinsic cost.
    #[error("call gas cost ({intrinsic_gas}) exceeds the gas limit ({gas_limit})")]
    CallGasCostMoreThanGasLimit {
        /// Intrinsic cost of the transaction
        intrinsic_gas: u64,
        /// Gas limit of the transaction
        gas_limit: u64,
    },
    /// The sender has deployed code (EIP-3607).
    #[error("reject transactions from senders with deployed code")]
    RejectCallerWithCode,
    /// The sender cannot pay for the transaction's gas and value.
    #[error("lack of funds ({balance}) for max fee ({fee})")]
    LackOfFundForMaxFee {
        /// Upfront cost of the transaction
        fee: Box<U256>,
        /// Sender balance
        balance: Box<U256>,
    },
    /// The nonce is higher than the sender's.
    #[error("nonce {tx} too high, expected {state}")]
    NonceTooHigh {
        /// Transaction nonce
        tx: u64,
        /// Sender nonce
        state: u64,
    },
    /// The nonce is lower than the sender's.
    #[error("nonce {tx} too low, expected {state}")]
    NonceTooLow {
        /// Transaction nonce
        tx: u64,
        /// Sender nonce
        state: u64,
    },
    /// The init code exceeds the maximum size (EIP-3860).
    #[error("create initcode size limit")]
    CreateInitCodeSizeLimit,
    /// The chain ID does not match.
    #[error("invalid chain ID")]
    InvalidChainId,
    /// EIP-2930 transactions are not supported by the hardfork.
    #[error("EIP-2930 not supported")]
    Eip2930NotSupported,
    /// EIP-1559 transactions are not supported by the hardfork.
    #[error("EIP-1559 not supported")]
    Eip1559NotSupported,
}

/// An error that occurs while running a transaction.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The transaction is invalid in the provided context.
    #[error(transparent)]
    InvalidTransaction(#[from] InvalidTransaction),
    /// Reading or writing the state failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Runs a transaction without committing the state.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn dry_run(
    executor: &dyn Executor,
    state: &dyn StateView,
    cfg: &CfgEnv,
    block: &BlockEnv,
    transaction: &Signed,
) -> Result<ExecutionResultAndState, TransactionError> {
    let gas_price = validate(cfg, block, transaction)?;

    let caller = *transaction.caller();
    let mut journal = Journal::new(state);

    let sender = journal.account(caller)?.clone();
    if !cfg.disable_eip3607 && sender.code_hash != KECCAK_EMPTY {
        return Err(InvalidTransaction::RejectCallerWithCode.into());
    }

    if !cfg.disable_nonce_check {
        let nonce = transaction.nonce();
        if nonce > sender.nonce {
            return Err(InvalidTransaction::NonceTooHigh {
                tx: nonce,
                state: sender.nonce,
            }
            .into());
        } else if nonce < sender.nonce {
            return Err(InvalidTransaction::NonceTooLow {
                tx: nonce,
                state: sender.nonce,
            }
            .into());
        }
    }

    let upfront_cost = transaction.upfront_cost();
    if sender.balance < upfront_cost {
        if cfg.disable_balance_check {
            journal.increment_balance(caller, upfront_cost - sender.balance)?;
        } else {
            return Err(InvalidTransaction::LackOfFundForMaxFee {
                fee: Box::new(upfront_cost),
                balance: Box::new(sender.balance),
            }
            .into());
        }
    }

    let gas_limit = transaction.gas_limit();
    let gas_cost = U256::from(gas_limit) * U256::from(gas_price);
    journal.decrement_balance(caller, gas_cost)?;

    if transaction.kind().is_call() {
        journal.increment_nonce(caller)?;
    }

    let intrinsic_gas = gas::intrinsic_gas(
        cfg.hardfork,
        transaction.kind(),
        transaction.input(),
        transaction.access_list(),
    );

    let outcome = execute_frame(
        executor,
        &mut journal,
        cfg,
        block,
        transaction,
        sender.nonce,
        gas_limit - intrinsic_gas,
    )?;

    let (gas_used, gas_refunded) = match &outcome {
        FrameOutcome::Success {
            gas_used,
            gas_refunded,
            ..
        } => {
            let gas_used = intrinsic_gas + gas_used;
            let gas_refunded =
                (*gas_refunded).min(gas_used / gas::max_refund_quotient(cfg.hardfork));

            (gas_used - gas_refunded, gas_refunded)
        }
        FrameOutcome::Revert { gas_used, .. } => (intrinsic_gas + gas_used, 0),
        // Exceptional halts consume all gas
        FrameOutcome::Halt(_) => (gas_limit, 0),
    };

    let unused_gas = U256::from(gas_limit - gas_used);
    journal.increment_balance(caller, unused_gas * U256::from(gas_price))?;

    let miner_fee = transaction.fee().effective_miner_fee(block.base_fee);
    let reward = U256::from(gas_used) * U256::from(miner_fee);
    if reward > U256::ZERO {
        journal.increment_balance(block.beneficiary, reward)?;
    }

    let (mut changes, logs) = journal.finalize();
    if cfg.hardfork >= Hardfork::SpuriousDragon {
        remove_touched_empty_accounts(&mut changes);
    }

    let result = match outcome {
        FrameOutcome::Success { output, .. } => ExecutionResult::Success {
            gas_used,
            gas_refunded,
            logs,
            output,
        },
        FrameOutcome::Revert { output, .. } => ExecutionResult::Revert { gas_used, output },
        FrameOutcome::Halt(reason) => ExecutionResult::Halt { reason, gas_used },
    };

    Ok(ExecutionResultAndState {
        result,
        state: changes,
    })
}

/// Runs a transaction without committing the state, while disabling the
/// nonce, balance and block gas limit checks.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn guaranteed_dry_run(
    executor: &dyn Executor,
    state: &dyn StateView,
    mut cfg: CfgEnv,
    block: &BlockEnv,
    transaction: &Signed,
) -> Result<ExecutionResultAndState, TransactionError> {
    set_guarantees(&mut cfg);

    dry_run(executor, state, &cfg, block, transaction)
}

/// Runs a transaction, committing the state in the process.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub fn run(
    executor: &dyn Executor,
    state: &mut dyn StateView,
    cfg: &CfgEnv,
    block: &BlockEnv,
    transaction: &Signed,
) -> Result<ExecutionResult, TransactionError> {
    let ExecutionResultAndState {
        result,
        state: changes,
    } = dry_run(executor, state, cfg, block, transaction)?;

    state.commit_changes(changes)?;

    Ok(result)
}

fn set_guarantees(cfg: &mut CfgEnv) {
    cfg.disable_balance_check = true;
    cfg.disable_block_gas_limit = true;
    cfg.disable_nonce_check = true;
}

/// Checks the transaction against the configuration and block, returning the
/// price per unit of gas it pays.
fn validate(
    cfg: &CfgEnv,
    block: &BlockEnv,
    transaction: &Signed,
) -> Result<u128, InvalidTransaction> {
    match transaction.transaction_type() {
        TransactionType::Legacy => (),
        TransactionType::Eip2930 => {
            if cfg.hardfork < Hardfork::Berlin {
                return Err(InvalidTransaction::Eip2930NotSupported);
            }
        }
        TransactionType::Eip1559 => {
            if cfg.hardfork < Hardfork::London {
                return Err(InvalidTransaction::Eip1559NotSupported);
            }
        }
    }

    if transaction
        .chain_id()
        .is_some_and(|chain_id| chain_id != cfg.chain_id)
    {
        return Err(InvalidTransaction::InvalidChainId);
    }

    let fee = transaction.fee();
    if fee.max_priority_fee_per_gas() > fee.max_fee_per_gas() {
        return Err(InvalidTransaction::PriorityFeeGreaterThanMaxFee);
    }

    let gas_price = match fee.effective_gas_price(block.base_fee) {
        Some(gas_price) => gas_price,
        None if cfg.disable_base_fee => fee.max_fee_per_gas(),
        None => return Err(InvalidTransaction::GasPriceLessThanBasefee),
    };

    let gas_limit = transaction.gas_limit();
    if !cfg.disable_block_gas_limit && gas_limit > block.gas_limit {
        return Err(InvalidTransaction::CallerGasLimitMoreThanBlock);
    }

    if transaction.kind().is_create()
        && cfg.hardfork >= Hardfork::Shanghai
        && transaction.input().len() > cfg.max_initcode_size()
    {
        return Err(InvalidTransaction::CreateInitCodeSizeLimit);
    }

    let intrinsic_gas = gas::intrinsic_gas(
        cfg.hardfork,
        transaction.kind(),
        transaction.input(),
        transaction.access_list(),
    );
    if intrinsic_gas > gas_limit {
        return Err(InvalidTransaction::CallGasCostMoreThanGasLimit {
            intrinsic_gas,
            gas_limit,
        });
    }

    Ok(gas_price)
}

enum FrameOutcome {
    Success {
        gas_used: u64,
        gas_refunded: u64,
        output: Output,
    },
    Revert {
        gas_used: u64,
        output: Bytes,
    },
    Halt(HaltReason),
}

fn execute_frame(
    executor: &dyn Executor,
    journal: &mut Journal<'_>,
    cfg: &CfgEnv,
    block: &BlockEnv,
    transaction: &Signed,
    sender_nonce: u64,
    gas_limit: u64,
) -> Result<FrameOutcome, StateError> {
    let caller = *transaction.caller();
    let value = transaction.value();

    let (frame, checkpoint) = match transaction.kind() {
        TxKind::Call(target) => {
            let checkpoint = journal.checkpoint();

            let code = journal.code(target)?;
            if !journal.transfer(caller, target, value)? {
                journal.revert(checkpoint);
                return Ok(FrameOutcome::Halt(HaltReason::OutOfFunds));
            }

            let frame = Frame {
                cfg,
                block,
                caller,
                target,
                is_create: false,
                code,
                input: transaction.input().clone(),
                value,
                gas_limit,
            };

            (frame, checkpoint)
        }
        TxKind::Create => {
            let target = caller.create(sender_nonce);

            // The sender's nonce is incremented even if the creation fails
            journal.increment_nonce(caller)?;
            let checkpoint = journal.checkpoint();

            let existing = journal.account(target)?;
            if existing.nonce != 0 || existing.code_hash != KECCAK_EMPTY {
                return Ok(FrameOutcome::Halt(HaltReason::CreateCollision));
            }

            let nonce = u64::from(cfg.hardfork >= Hardfork::SpuriousDragon);
            journal.create_account(target, nonce)?;

            if !journal.transfer(caller, target, value)? {
                journal.revert(checkpoint);
                return Ok(FrameOutcome::Halt(HaltReason::OutOfFunds));
            }

            let frame = Frame {
                cfg,
                block,
                caller,
                target,
                is_create: true,
                code: transaction.input().clone(),
                input: Bytes::new(),
                value,
                gas_limit,
            };

            (frame, checkpoint)
        }
    };

    let target = frame.target;
    let is_create = frame.is_create;

    let FrameResult {
        status,
        gas_used,
        gas_refunded,
    } = executor.execute(frame, journal)?;

    if gas_used > gas_limit {
        journal.revert(checkpoint);
        return Ok(FrameOutcome::Halt(HaltReason::OutOfGas));
    }

    match status {
        FrameStatus::Return(code) if is_create => {
            if code.len() > cfg.max_code_size() {
                journal.revert(checkpoint);
                return Ok(FrameOutcome::Halt(HaltReason::CreateContractSizeLimit));
            }

            let gas_used = gas_used + code.len() as u64 * gas::CODE_DEPOSIT_GAS;
            if gas_used > gas_limit {
                journal.revert(checkpoint);
                return Ok(FrameOutcome::Halt(HaltReason::OutOfGas));
            }

            journal.set_code(target, code.clone())?;

            Ok(FrameOutcome::Success {
                gas_used,
                gas_refunded,
                output: Output::Create(code, Some(target)),
            })
        }
        FrameStatus::Return(data) => Ok(FrameOutcome::Success {
            gas_used,
            gas_refunded,
            output: Output::Call(data),
        }),
        FrameStatus::Revert(output) => {
            journal.revert(checkpoint);
            Ok(FrameOutcome::Revert { gas_used, output })
        }
        FrameStatus::Halt(reason) => {
            journal.revert(checkpoint);
            Ok(FrameOutcome::Halt(reason))
        }
    }
}

/// Removes empty accounts that were touched but not created (EIP-161).
fn remove_touched_empty_accounts(changes: &mut HashMap<Address, Account>) {
    for account in changes.values_mut() {
        if account.status == AccountStatus::Touched && account.info.is_empty() {
            account.status = AccountStatus::SelfDestructed;
        }
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::address;
    use edr_state_api::{State, account::AccountInfo};
    use edr_state_local::LocalState;
    use edr_transaction::{
        AccessList, Request, request,
        test_utils::{
            DUMMY_CHAIN_ID, dummy_eip155_transaction_with_price_limit_and_value,
            dummy_eip1559_transaction,
        },
    };

    use super::*;

    const CALLER: Address = address!("0x1000000000000000000000000000000000000001");
    const COINBASE: Address = address!("0xc014ba5ec014ba5ec014ba5ec014ba5ec014ba5e");
    const INITIAL_BALANCE: u64 = 1_000_000_000_000_000_000;

    #[derive(Debug)]
    struct StatusExecutor(FrameStatus);

    impl Executor for StatusExecutor {
        fn execute(
            &self,
            frame: Frame<'_>,
            journal: &mut Journal<'_>,
        ) -> Result<FrameResult, StateError> {
            journal.set_storage(frame.target, U256::from(1), U256::from(1))?;

            Ok(FrameResult {
                status: self.0.clone(),
                gas_used: 5_000,
                gas_refunded: 0,
            })
        }
    }

    fn state_with_caller() -> anyhow::Result<LocalState> {
        let mut accounts = HashMap::default();
        accounts.insert(
            CALLER,
            AccountInfo {
                balance: U256::from(INITIAL_BALANCE),
                ..AccountInfo::default()
            },
        );

        Ok(LocalState::with_accounts(accounts)?)
    }

    fn block_env(base_fee: Option<u128>) -> BlockEnv {
        BlockEnv {
            number: 1,
            beneficiary: COINBASE,
            timestamp: 1,
            gas_limit: 30_000_000,
            base_fee,
            difficulty: U256::ZERO,
            prevrandao: None,
        }
    }

    fn balance(state: &LocalState, address: Address) -> anyhow::Result<U256> {
        Ok(state
            .basic(address)?
            .map_or(U256::ZERO, |account| account.balance))
    }

    fn callee(transaction: &Signed) -> Address {
        match transaction.kind() {
            TxKind::Call(address) => address,
            TxKind::Create => unreachable!("dummy transactions are calls"),
        }
    }

    #[test]
    fn value_transfer_pays_fees() -> anyhow::Result<()> {
        let mut state = state_with_caller()?;
        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);

        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            CALLER,
            0,
            10,
            30_000,
            U256::from(1),
        );
        let receiver = callee(&transaction);

        let result = run(&TransferExecutor, &mut state, &cfg, &block_env(Some(7)), &transaction)?;
        assert!(result.is_success());
        assert_eq!(result.gas_used(), 21_000);

        assert_eq!(
            balance(&state, CALLER)?,
            U256::from(INITIAL_BALANCE - 21_000 * 10 - 1)
        );
        assert_eq!(balance(&state, receiver)?, U256::from(1));
        assert_eq!(balance(&state, COINBASE)?, U256::from(21_000 * 3));
        assert_eq!(state.account(CALLER)?.nonce, 1);

        Ok(())
    }

    #[test]
    fn rejects_invalid_transactions() -> anyhow::Result<()> {
        let state = state_with_caller()?;
        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);
        let block = block_env(Some(100));

        let transaction = dummy_eip1559_transaction(CALLER, 1, 200, 1);
        let error = dry_run(&TransferExecutor, &state, &cfg, &block, &transaction)
            .expect_err("nonce is too high");
        assert!(matches!(
            error,
            TransactionError::InvalidTransaction(InvalidTransaction::NonceTooHigh { tx: 1, state: 0 })
        ));

        let transaction = dummy_eip1559_transaction(CALLER, 0, 50, 1);
        let error = dry_run(&TransferExecutor, &state, &cfg, &block, &transaction)
            .expect_err("fee is below the base fee");
        assert!(matches!(
            error,
            TransactionError::InvalidTransaction(InvalidTransaction::GasPriceLessThanBasefee)
        ));

        let transaction = dummy_eip1559_transaction(CALLER, 0, 200, 300);
        let error = dry_run(&TransferExecutor, &state, &cfg, &block, &transaction)
            .expect_err("tip exceeds the fee cap");
        assert!(matches!(
            error,
            TransactionError::InvalidTransaction(InvalidTransaction::PriorityFeeGreaterThanMaxFee)
        ));

        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Berlin);
        let transaction = dummy_eip1559_transaction(CALLER, 0, 200, 1);
        let error = dry_run(&TransferExecutor, &state, &cfg, &block_env(None), &transaction)
            .expect_err("EIP-1559 is not active");
        assert!(matches!(
            error,
            TransactionError::InvalidTransaction(InvalidTransaction::Eip1559NotSupported)
        ));

        Ok(())
    }

    #[test]
    fn insufficient_funds() -> anyhow::Result<()> {
        let state = LocalState::default();
        let mut cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);
        let block = block_env(Some(7));

        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            CALLER,
            0,
            10,
            30_000,
            U256::from(1),
        );

        let error = dry_run(&TransferExecutor, &state, &cfg, &block, &transaction)
            .expect_err("caller has no funds");
        assert!(matches!(
            error,
            TransactionError::InvalidTransaction(InvalidTransaction::LackOfFundForMaxFee { .. })
        ));

        cfg.disable_base_fee = true;
        let ExecutionResultAndState { result, .. } =
            guaranteed_dry_run(&TransferExecutor, &state, cfg, &block, &transaction)?;
        assert!(result.is_success());

        Ok(())
    }

    #[test]
    fn revert_keeps_gas_and_nonce() -> anyhow::Result<()> {
        let mut state = state_with_caller()?;
        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);

        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            CALLER,
            0,
            10,
            30_000,
            U256::from(1),
        );
        let receiver = callee(&transaction);

        let executor = StatusExecutor(FrameStatus::Revert(Bytes::from_static(b"reverted")));
        let result = run(&executor, &mut state, &cfg, &block_env(None), &transaction)?;

        assert_eq!(
            result,
            ExecutionResult::Revert {
                gas_used: 26_000,
                output: Bytes::from_static(b"reverted"),
            }
        );
        assert_eq!(
            balance(&state, CALLER)?,
            U256::from(INITIAL_BALANCE - 26_000 * 10)
        );
        assert_eq!(balance(&state, receiver)?, U256::ZERO);
        assert_eq!(state.storage(receiver, U256::from(1))?, U256::ZERO);
        assert_eq!(state.account(CALLER)?.nonce, 1);

        Ok(())
    }

    #[test]
    fn halt_consumes_all_gas() -> anyhow::Result<()> {
        let state = state_with_caller()?;
        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);

        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            CALLER,
            0,
            1,
            30_000,
            U256::ZERO,
        );

        let executor = StatusExecutor(FrameStatus::Halt(HaltReason::OpcodeNotFound));
        let ExecutionResultAndState { result, state: changes } =
            dry_run(&executor, &state, &cfg, &block_env(None), &transaction)?;

        assert_eq!(
            result,
            ExecutionResult::Halt {
                reason: HaltReason::OpcodeNotFound,
                gas_used: 30_000,
            }
        );

        let caller = changes.get(&CALLER).expect("caller changed");
        assert_eq!(caller.info.balance, U256::from(INITIAL_BALANCE - 30_000));

        Ok(())
    }

    #[test]
    fn contract_creation_deploys_code() -> anyhow::Result<()> {
        let mut state = state_with_caller()?;
        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);

        let code = Bytes::from_static(&[0x60, 0x01, 0x60, 0x00]);
        let transaction = Request::Eip1559(request::Eip1559 {
            chain_id: DUMMY_CHAIN_ID,
            nonce: 0,
            max_priority_fee_per_gas: 1,
            max_fee_per_gas: 1,
            gas_limit: 100_000,
            kind: TxKind::Create,
            value: U256::ZERO,
            input: code.clone(),
            access_list: AccessList::default(),
        })
        .fake_sign(CALLER);

        let result = run(&TransferExecutor, &mut state, &cfg, &block_env(None), &transaction)?;

        let expected_address = CALLER.create(0);
        let intrinsic_gas = gas::intrinsic_gas(Hardfork::Cancun, TxKind::Create, &code, &[]);
        assert_eq!(
            result,
            ExecutionResult::Success {
                gas_used: intrinsic_gas + 4 * gas::CODE_DEPOSIT_GAS,
                gas_refunded: 0,
                logs: Vec::new(),
                output: Output::Create(code.clone(), Some(expected_address)),
            }
        );

        assert_eq!(state.contract_code(expected_address)?, code);
        assert_eq!(state.account(expected_address)?.nonce, 1);
        assert_eq!(state.account(CALLER)?.nonce, 1);

        Ok(())
    }

    #[test]
    fn touched_empty_accounts_are_removed() -> anyhow::Result<()> {
        let mut state = state_with_caller()?;
        let transaction = dummy_eip155_transaction_with_price_limit_and_value(
            CALLER,
            0,
            0,
            30_000,
            U256::ZERO,
        );
        let receiver = callee(&transaction);

        let cfg = CfgEnv::new(DUMMY_CHAIN_ID, Hardfork::Cancun);
        run(&TransferExecutor, &mut state, &cfg, &block_env(None), &transaction)?;
        assert_eq!(state.basic(receiver)?, None);

        Ok(())
    }
}
