// Summary feed constants (no magic values)
use std::time::Duration;

/// Default aggregation/broadcast tick (1s)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Floor for configured tick intervals, prevents a busy loop on tiny values
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Per-subscriber buffered messages before ticks are skipped for that channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Grace period for the tick loop to exit after stop is requested
pub const PUBLISHER_STOP_TIMEOUT: Duration = Duration::from_secs(5);
