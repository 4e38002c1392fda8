use edr_evm::{
    config::{BlockEnv, CfgEnv},
    guaranteed_dry_run,
    result::ExecutionResult,
    Executor,
};
use edr_state_api::{CheckpointGuard, StateView};
use edr_transaction::Signed;

use crate::ProviderError;

pub(super) struct RunCallArgs<'a> {
    pub executor: &'a dyn Executor,
    pub state: &'a mut dyn StateView,
    pub cfg_env: CfgEnv,
    pub block: &'a BlockEnv,
    pub transaction: Signed,
}

/// Executes a transaction without committing its changes.
///
/// The state is checkpointed before execution and the checkpoint is always
/// reverted, so the call cannot leak changes even if execution fails
/// half-way.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
pub(super) fn run_call(args: RunCallArgs<'_>) -> Result<ExecutionResult, ProviderError> {
    let RunCallArgs {
        executor,
        state,
        mut cfg_env,
        block,
        transaction,
    } = args;

    // Calls are free of charge
    let mut block = block.clone();
    block.base_fee = block.base_fee.map(|_base_fee| 0);
    cfg_env.disable_base_fee = true;

    let guard = CheckpointGuard::new(state)?;
    let result = guaranteed_dry_run(executor, &*guard, cfg_env, &block, &transaction);
    guard.revert()?;

    Ok(result?.result)
}
