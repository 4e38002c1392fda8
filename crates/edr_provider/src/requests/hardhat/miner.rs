use crate::{data::ProviderData, time::TimeSinceEpoch, ProviderError};

pub fn handle_interval_mine_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
) -> Result<bool, ProviderError> {
    data.interval_mine()
}

pub fn handle_mine<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    number_of_blocks: Option<u64>,
    interval: Option<u64>,
) -> Result<bool, ProviderError> {
    let number_of_blocks = number_of_blocks.unwrap_or(1);
    let interval = interval.unwrap_or(1);

    let mined_blocks = data.mine_and_commit_blocks(number_of_blocks, interval)?;

    data.logger_mut().log_mined_block(&mined_blocks)?;

    Ok(true)
}
