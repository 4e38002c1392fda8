//! Types and fee-market arithmetic related to EIP-1559.

pub use alloy_eips::eip1559::{BaseFeeParams, INITIAL_BASE_FEE};

/// The gas usage of a parent block that determines the base fee of its child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentGasUsage {
    /// The parent's base fee per gas, if it had one.
    pub base_fee_per_gas: Option<u128>,
    /// The gas used by the parent.
    pub gas_used: u64,
    /// The gas limit of the parent.
    pub gas_limit: u64,
}

/// Calculates the base fee per gas of a block, given its parent's gas usage.
///
/// The gas target is the parent's gas limit divided by the elasticity
/// multiplier. A block exactly on target keeps the base fee; otherwise the fee
/// moves proportionally to the deviation, by at most `1 / max_change_denominator`.
/// An increase is always at least one wei. A parent without base fee (i.e. the
/// block that activates EIP-1559) yields [`INITIAL_BASE_FEE`].
pub fn next_base_fee_per_gas(parent: &ParentGasUsage, params: &BaseFeeParams) -> u128 {
    let Some(base_fee) = parent.base_fee_per_gas else {
        return u128::from(INITIAL_BASE_FEE);
    };

    let gas_target = u128::from(parent.gas_limit) / params.elasticity_multiplier;
    let gas_used = u128::from(parent.gas_used);

    if gas_target == 0 || gas_used == gas_target {
        return base_fee;
    }

    let denominator = gas_target * params.max_change_denominator;
    if gas_used > gas_target {
        let delta = base_fee * (gas_used - gas_target) / denominator;
        base_fee + delta.max(1)
    } else {
        let delta = base_fee * (gas_target - gas_used) / denominator;
        base_fee.saturating_sub(delta)
    }
}
