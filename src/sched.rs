//! Tick scheduling with overlap serialization.
//!
//! One scheduler drives the aggregation cycle. A fire that arrives while
//! the previous handler is still running is dropped and counted rather
//! than queued; a fixed-cadence sampler gains nothing from a backlog.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::warn;

/// Serializing driver for the periodic aggregation tick.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homewatt::sched::TickScheduler;
///
/// let scheduler = TickScheduler::new(Duration::from_secs(5));
/// let mut count = 0;
/// scheduler.run_ticks(3, |_| count += 1);
/// assert_eq!(count, 3);
/// assert_eq!(scheduler.ticks_fired(), 3);
/// assert_eq!(scheduler.dropped_ticks(), 0);
/// ```
#[derive(Debug)]
pub struct TickScheduler {
    interval: Duration,
    busy: AtomicBool,
    fired: AtomicUsize,
    dropped: AtomicUsize,
}

impl TickScheduler {
    /// Creates a scheduler with the given tick interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            busy: AtomicBool::new(false),
            fired: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Configured tick interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one tick handler, unless a previous handler is still running.
    ///
    /// Returns `true` when the handler ran, `false` when the fire was
    /// dropped because the scheduler was busy.
    pub fn fire<F: FnOnce()>(&self, handler: F) -> bool {
        if self.busy.swap(true, Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(dropped = self.dropped_ticks(), "tick overlapped, dropping");
            return false;
        }
        let _guard = BusyGuard(&self.busy);
        handler();
        self.fired.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Fires `count` sequential ticks, passing the tick index to `handler`.
    pub fn run_ticks(&self, count: usize, mut handler: impl FnMut(usize)) {
        for t in 0..count {
            self.fire(|| handler(t));
        }
    }

    /// Number of handlers that actually ran.
    pub fn ticks_fired(&self) -> usize {
        self.fired.load(Ordering::Relaxed)
    }

    /// Number of fires dropped due to overlap.
    pub fn dropped_ticks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Clears the busy flag even when the handler unwinds.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
