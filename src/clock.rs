//! Simulation clock
//!
//! All timestamps in the crate are nanoseconds on a single monotonic
//! timeline. [`MonotonicClock`] follows wall time since the first use in the
//! process; [`ManualClock`] only moves when told to.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Source of the current simulation time.
pub trait Clock: Send + Sync + Debug {
    /// Current time in nanoseconds.
    fn now_ns(&self) -> u64;
}

/// Nanoseconds since the process-wide epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Clock that is advanced explicitly.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ns: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ns),
        }
    }

    /// Move the clock forward by `delta_ns`.
    pub fn advance(&self, delta_ns: u64) -> u64 {
        self.now.fetch_add(delta_ns, Ordering::SeqCst) + delta_ns
    }

    pub fn set(&self, now_ns: u64) {
        self.now.store(now_ns, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
