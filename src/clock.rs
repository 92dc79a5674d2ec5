//! Virtual clock: lets the agent's timers be driven by a fake clock in tests
//! instead of `SystemTime`/`tokio::time::sleep` wall time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current-time source, injected into anything that needs `now()`.
pub trait Clock: Send + Sync {
    /// Unix timestamp in seconds.
    fn now_unix(&self) -> u64;
}

/// Real wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs()
    }
}
