use std::sync::Arc;

use tokio::{runtime, sync::Mutex};

use crate::{
    config::IntervalConfig, data::ProviderData, interval::IntervalMiner, requests,
    time::TimeSinceEpoch, ProviderError,
};

/// Replaces the interval miner. Dropping the previous miner stops it.
pub fn handle_set_interval_mining<TimerT: TimeSinceEpoch>(
    data: Arc<Mutex<ProviderData<TimerT>>>,
    interval_miner: &mut Option<IntervalMiner>,
    runtime: runtime::Handle,
    config: requests::IntervalConfig,
) -> Result<bool, ProviderError> {
    let config: Option<IntervalConfig> = config.try_into()?;
    *interval_miner = config.map(|config| IntervalMiner::new(runtime, config, data));

    Ok(true)
}
