use core::cmp;

use edr_block_miner::LocalBlock;
use edr_eth::fee_history::reward_percentiles;
use edr_evm::{
    config::{BlockEnv, CfgEnv},
    result::ExecutionResult,
    Executor,
};
use edr_primitives::U256;
use edr_state_api::StateView;
use edr_transaction::{request, Request, Signed};

use crate::{
    data::call::{self, RunCallArgs},
    ProviderError,
};

pub(super) struct CheckGasLimitArgs<'a> {
    pub executor: &'a dyn Executor,
    pub state: &'a mut dyn StateView,
    pub cfg_env: &'a CfgEnv,
    pub block: &'a BlockEnv,
    pub transaction: &'a Signed,
    pub gas_limit: u64,
}

/// Test if the transaction successfully executes with the given gas limit.
/// Returns true on success and false if the transaction runs out of gas,
/// reverts or halts otherwise.
pub(super) fn check_gas_limit(args: CheckGasLimitArgs<'_>) -> Result<bool, ProviderError> {
    let CheckGasLimitArgs {
        executor,
        state,
        cfg_env,
        block,
        transaction,
        gas_limit,
    } = args;

    let result = call::run_call(RunCallArgs {
        executor,
        state,
        cfg_env: cfg_env.clone(),
        block,
        transaction: with_gas_limit(transaction, gas_limit),
    })?;

    Ok(matches!(result, ExecutionResult::Success { .. }))
}

pub(super) struct BinarySearchEstimationArgs<'a> {
    pub executor: &'a dyn Executor,
    pub state: &'a mut dyn StateView,
    pub cfg_env: &'a CfgEnv,
    pub block: &'a BlockEnv,
    pub transaction: &'a Signed,
    pub lower_bound: u64,
    pub upper_bound: u64,
}

/// Search for a tight upper bound on the gas limit that will allow the
/// transaction to execute.
pub(super) fn binary_search_estimation(
    args: BinarySearchEstimationArgs<'_>,
) -> Result<u64, ProviderError> {
    const MAX_ITERATIONS: usize = 20;

    let BinarySearchEstimationArgs {
        executor,
        state,
        cfg_env,
        block,
        transaction,
        mut lower_bound,
        mut upper_bound,
    } = args;

    let mut i = 0;

    while upper_bound - lower_bound > min_difference(lower_bound) && i < MAX_ITERATIONS {
        let mut mid = lower_bound + (upper_bound - lower_bound) / 2;
        if i == 0 {
            // Start close to the lower bound as it's assumed to be derived from the gas
            // used by the transaction.
            let initial_mid = 3 * lower_bound;
            mid = cmp::min(mid, initial_mid);
        }

        let success = check_gas_limit(CheckGasLimitArgs {
            executor,
            state: &mut *state,
            cfg_env,
            block,
            transaction,
            gas_limit: mid,
        })?;

        if success {
            upper_bound = mid;
        } else {
            lower_bound = mid + 1;
        }

        i += 1;
    }

    Ok(upper_bound)
}

#[inline]
fn min_difference(lower_bound: u64) -> u64 {
    if lower_bound >= 4_000_000 {
        50_000
    } else if lower_bound >= 1_000_000 {
        10_000
    } else if lower_bound >= 100_000 {
        1_000
    } else if lower_bound >= 50_000 {
        500
    } else if lower_bound >= 30_000 {
        300
    } else {
        200
    }
}

/// Compute miner rewards for percentiles.
pub(super) fn compute_rewards(block: &LocalBlock, percentiles: &[f64]) -> Vec<U256> {
    let base_fee = block.header.base_fee_per_gas;

    let mut previous_cumulative_gas_used = 0;
    let rewards = block
        .transactions
        .iter()
        .map(|executed| {
            let gas_used = executed.cumulative_gas_used - previous_cumulative_gas_used;
            previous_cumulative_gas_used = executed.cumulative_gas_used;

            let reward = executed.transaction.fee().effective_miner_fee(base_fee);
            (reward, gas_used)
        })
        .collect();

    reward_percentiles(rewards, block.header.gas_used, percentiles)
}

/// Gas used to gas limit ratio
pub(super) fn gas_used_ratio(gas_used: u64, gas_limit: u64) -> f64 {
    const FLOATS_PRECISION: f64 = 100_000.0;

    #[allow(clippy::cast_precision_loss)]
    let ratio = gas_used as f64 * FLOATS_PRECISION / gas_limit as f64 / FLOATS_PRECISION;
    ratio
}

/// Constructs an impersonated copy of the transaction with a different gas
/// limit.
pub(crate) fn with_gas_limit(transaction: &Signed, gas_limit: u64) -> Signed {
    let request = match transaction.request().clone() {
        Request::Legacy(request) => Request::Legacy(request::Legacy {
            gas_limit,
            ..request
        }),
        Request::Eip2930(request) => Request::Eip2930(request::Eip2930 {
            gas_limit,
            ..request
        }),
        Request::Eip1559(request) => Request::Eip1559(request::Eip1559 {
            gas_limit,
            ..request
        }),
    };

    request.fake_sign(*transaction.caller())
}
