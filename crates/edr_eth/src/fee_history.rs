use edr_primitives::U256;

/// Fee history for the returned block range. This can be a subsection of the
/// requested range if not all blocks are available.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeHistoryResult {
    /// Lowest number block of returned range.
    #[serde(with = "alloy_serde::quantity")]
    pub oldest_block: u64,
    /// An array of block base fees per gas. This includes the next block after
    /// the newest of the returned range, because this value can be derived from
    /// the newest block. Zeroes are returned for pre-EIP-1559 blocks.
    #[serde(with = "alloy_serde::quantity::vec")]
    pub base_fee_per_gas: Vec<u128>,
    /// An array of block gas used ratios. These are calculated as the ratio of
    /// gas used and gas limit.
    pub gas_used_ratio: Vec<f64>,
    /// A two-dimensional array of effective priority fees per gas at the
    /// requested block percentiles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<Vec<Vec<U256>>>,
}

impl FeeHistoryResult {
    /// Constructs a new `FeeHistoryResult` with the oldest block and otherwise
    /// default fields.
    pub fn new(oldest_block: u64) -> Self {
        Self {
            oldest_block,
            base_fee_per_gas: Vec::default(),
            gas_used_ratio: Vec::default(),
            reward: Option::default(),
        }
    }
}

/// Maximum number of blocks that can be requested from `eth_feeHistory`.
pub const MAX_FEE_HISTORY_BLOCK_COUNT: u64 = 1024;

/// Computes the requested percentiles of the effective priority fees paid in a
/// block, weighting each fee by the gas its transaction used.
///
/// `rewards` are `(effective_priority_fee, gas_used)` pairs. Percentiles must
/// be sorted in non-decreasing order.
pub fn reward_percentiles(
    mut rewards: Vec<(u128, u64)>,
    block_gas_used: u64,
    percentiles: &[f64],
) -> Vec<U256> {
    if rewards.is_empty() {
        return vec![U256::ZERO; percentiles.len()];
    }

    rewards.sort_by_key(|(reward, _)| *reward);

    let mut index = 0;
    let mut cumulative_gas_used = rewards[0].1;

    percentiles
        .iter()
        .map(|percentile| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let gas_threshold = (block_gas_used as f64 * percentile / 100.0) as u64;

            while cumulative_gas_used < gas_threshold && index < rewards.len() - 1 {
                index += 1;
                cumulative_gas_used += rewards[index].1;
            }

            U256::from(rewards[index].0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_rewards_are_zero() {
        assert_eq!(
            reward_percentiles(Vec::new(), 0, &[10.0, 90.0]),
            vec![U256::ZERO, U256::ZERO]
        );
    }

    #[test]
    fn rewards_are_weighted_by_gas() {
        let rewards = vec![(30, 21_000), (10, 21_000), (20, 42_000)];

        assert_eq!(
            reward_percentiles(rewards, 84_000, &[0.0, 25.0, 50.0, 100.0]),
            vec![U256::from(10), U256::from(10), U256::from(20), U256::from(30)]
        );
    }

    #[test]
    fn serializes_quantities() -> anyhow::Result<()> {
        let mut result = FeeHistoryResult::new(1);
        result.base_fee_per_gas = vec![875_000_000, 820_312_500];
        result.gas_used_ratio = vec![0.25];

        let json = serde_json::to_value(&result)?;
        assert_eq!(json["oldestBlock"], "0x1");
        assert_eq!(json["baseFeePerGas"][0], "0x342770c0");
        assert!(json.get("reward").is_none());

        Ok(())
    }
}
