use std::num::NonZeroU64;

use edr_primitives::U64;

use crate::{
    data::{BlockOptions, ProviderData},
    time::TimeSinceEpoch,
    ProviderError, Timestamp,
};

pub fn handle_increase_time_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    increment: Timestamp,
) -> Result<String, ProviderError> {
    let new_block_time = data.increase_block_time(increment.into());

    // This RPC call is an exception: it returns a number as a string decimal
    Ok(new_block_time.to_string())
}

pub fn handle_mine_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    timestamp: Option<Timestamp>,
) -> Result<String, ProviderError> {
    let block = data.mine_and_commit_block(BlockOptions {
        timestamp: timestamp.map(Into::into),
    })?;

    data.logger_mut().log_mined_block(&[block])?;

    Ok(String::from("0"))
}

pub fn handle_revert_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    snapshot_id: U64,
) -> Result<bool, ProviderError> {
    data.revert_to_snapshot(snapshot_id.to::<u64>())
}

pub fn handle_set_automine_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    automine: bool,
) -> Result<bool, ProviderError> {
    data.set_auto_mining(automine);

    Ok(true)
}

pub fn handle_set_block_gas_limit_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    gas_limit: U64,
) -> Result<bool, ProviderError> {
    let gas_limit = NonZeroU64::new(gas_limit.to::<u64>())
        .ok_or(ProviderError::SetBlockGasLimitMustBeGreaterThanZero)?;

    data.set_block_gas_limit(gas_limit)?;

    Ok(true)
}

pub fn handle_set_next_block_timestamp_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    timestamp: Timestamp,
) -> Result<String, ProviderError> {
    let new_timestamp = data.set_next_block_timestamp(timestamp.into())?;

    // This RPC call is an exception: it returns a number as a string decimal
    Ok(new_timestamp.to_string())
}

pub fn handle_snapshot_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
) -> Result<U64, ProviderError> {
    let snapshot_id = data.make_snapshot()?;

    Ok(U64::from(snapshot_id))
}
