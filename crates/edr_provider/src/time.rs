use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;

/// Trait for timestamp-related operations.
pub trait TimeSinceEpoch: Clone + Send + Sync + 'static {
    /// Returns the number of seconds since the UNIX epoch.
    fn since_epoch(&self) -> u64;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentTime;

impl TimeSinceEpoch for CurrentTime {
    fn since_epoch(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_secs())
    }
}

/// Time that only moves when explicitly told to. Clones share the same clock.
#[derive(Clone, Debug)]
pub struct MockTime {
    now: Arc<Mutex<Duration>>,
}

impl MockTime {
    /// Constructs a clock at the provided number of seconds since the epoch.
    pub fn with_seconds(seconds: u64) -> Self {
        Self {
            now: Arc::new(Mutex::new(Duration::from_secs(seconds))),
        }
    }

    /// Constructs a clock at the current wall-clock time.
    pub fn now() -> Self {
        Self::with_seconds(CurrentTime.since_epoch())
    }

    /// Moves the clock forward.
    pub fn add_seconds(&self, seconds: u64) {
        *self.now.lock() += Duration::from_secs(seconds);
    }
}

impl TimeSinceEpoch for MockTime {
    fn since_epoch(&self) -> u64 {
        self.now.lock().as_secs()
    }
}
