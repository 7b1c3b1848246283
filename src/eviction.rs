//! Idle tracking and sweep bookkeeping

use std::time::{Duration, Instant};

/// A free resource together with the moment it was last handed back.
#[derive(Debug)]
pub(crate) struct PooledItem<T> {
    value: T,
    last_active: Instant,
}

impl<T> PooledItem<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            last_active: Instant::now(),
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// A zero threshold disables expiry.
    pub fn is_expired(&self, threshold: Duration) -> bool {
        !threshold.is_zero() && self.idle_for() > threshold
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Whether a borrow recorded at `since` has been outstanding longer than `threshold`.
pub(crate) fn is_stale(since: Instant, threshold: Duration) -> bool {
    !threshold.is_zero() && since.elapsed() > threshold
}

/// Outcome of a single maintenance pass.
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
///
/// let pool = ManagedResourcePool::new(Factory::new(|| 0u8), PoolConfiguration::new()).unwrap();
/// let report = pool.sweep_now().unwrap();
/// assert!(report.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SweepReport {
    /// Busy entries dropped from accounting because they were never returned
    pub stale_reclaimed: usize,

    /// Overflow items destroyed after sitting idle
    pub idle_evicted: usize,

    /// Hot-store items destroyed by the full-idle threshold
    pub hot_evicted: usize,

    /// Wall time spent in the pass
    pub elapsed: Duration,
}

impl SweepReport {
    /// Number of items destroyed by this pass.
    pub fn evicted(&self) -> usize {
        self.idle_evicted + self.hot_evicted
    }

    /// True when the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.stale_reclaimed == 0 && self.evicted() == 0
    }
}
