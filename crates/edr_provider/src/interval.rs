use std::{sync::Arc, time::Duration};

use tokio::{
    runtime,
    sync::{watch, Mutex},
    task::{self, JoinHandle},
    time::{sleep_until, Instant},
};

use crate::{data::ProviderData, time::TimeSinceEpoch, IntervalConfig, ProviderError};

/// Background task that mines a block each time the configured interval
/// elapses. Dropping the miner stops the task and waits for it to finish.
pub struct IntervalMiner {
    stop_sender: watch::Sender<bool>,
    task: Option<JoinHandle<Result<(), ProviderError>>>,
    runtime: runtime::Handle,
}

impl IntervalMiner {
    /// Spawns the mining task on the provided runtime.
    pub fn new<TimerT: TimeSinceEpoch>(
        runtime: runtime::Handle,
        config: IntervalConfig,
        data: Arc<Mutex<ProviderData<TimerT>>>,
    ) -> Self {
        let (stop_sender, stop_receiver) = watch::channel(false);
        let task = runtime.spawn(mine_on_interval(config, data, stop_receiver));

        Self {
            stop_sender,
            task: Some(task),
            runtime,
        }
    }
}

/// Resolves once a stop has been requested or the miner was dropped.
async fn stop_requested(stop_receiver: &mut watch::Receiver<bool>) {
    // An error means the sender is gone, which also stops the task
    let _result = stop_receiver.wait_for(|stop| *stop).await;
}

#[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
async fn mine_on_interval<TimerT: TimeSinceEpoch>(
    config: IntervalConfig,
    data: Arc<Mutex<ProviderData<TimerT>>>,
    mut stop_receiver: watch::Receiver<bool>,
) -> Result<(), ProviderError> {
    let mut last_mined = Instant::now();

    loop {
        let deadline = last_mined + Duration::from_millis(config.generate_interval());

        tokio::select! {
            () = stop_requested(&mut stop_receiver) => return Ok(()),
            () = sleep_until(deadline) => {}
        }

        // Acquiring the lock can take a while, so stopping must still be
        // possible in the meantime.
        let mut data = tokio::select! {
            () = stop_requested(&mut stop_receiver) => return Ok(()),
            data = data.lock() => data,
        };

        last_mined = Instant::now();
        data.interval_mine().map_err(|error| {
            log::error!("Unexpected error while performing interval mining: {error}");
            error
        })?;
    }
}

impl Drop for IntervalMiner {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    fn drop(&mut self) {
        let Some(handle) = self.task.take() else {
            return;
        };

        // Fails only when the task already exited
        let _sent = self.stop_sender.send(true);

        let runtime = self.runtime.clone();
        match task::block_in_place(move || runtime.block_on(handle)) {
            Ok(Ok(())) => (),
            Ok(Err(error)) => log::debug!("Interval miner stopped after an error: {error}"),
            Err(error) => log::error!("Failed to join interval mining task: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::*;
    use crate::test_utils::ProviderTestFixture;

    #[test]
    fn mines_until_dropped() -> anyhow::Result<()> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let fixture = ProviderTestFixture::new_local()?;
        let data = Arc::new(Mutex::new(fixture.provider_data));

        let miner = IntervalMiner::new(
            runtime.handle().clone(),
            IntervalConfig::Fixed(NonZeroU64::new(10).expect("non-zero")),
            data.clone(),
        );

        std::thread::sleep(Duration::from_millis(200));
        drop(miner);

        let mined = runtime.block_on(data.lock()).last_block_number();
        assert!(mined > 0);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(runtime.block_on(data.lock()).last_block_number(), mined);

        Ok(())
    }
}
