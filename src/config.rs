//! Pool configuration options

use crate::errors::{PoolError, PoolResult};
use std::time::Duration;

/// Default capacity of a lock-free slot array: twice the available parallelism.
pub fn default_slot_capacity() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Configuration for [`ManagedResourcePool`](crate::ManagedResourcePool) behavior
///
/// # Examples
///
/// ```
/// use tiered_pool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_name("db")
///     .with_min(2)
///     .with_max(50)
///     .with_idle_eviction(Duration::from_secs(30))
///     .with_stale_borrow(Duration::from_secs(300));
///
/// assert_eq!(config.max, 50);
/// assert_eq!(config.min, 2);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Name used in log events and metric labels
    pub name: String,

    /// Number of free resources kept indefinitely
    pub min: usize,

    /// Hard cap on free plus busy resources
    pub max: usize,

    /// Overflow items idle longer than this are destroyed (zero disables)
    pub idle_eviction: Duration,

    /// Hot-store items idle longer than this are destroyed (zero disables)
    pub full_idle_eviction: Duration,

    /// Borrows outstanding longer than this are dropped from accounting (zero disables)
    pub stale_borrow: Duration,

    /// Period of the background sweep
    pub sweep_interval: Duration,

    /// Number of slots in the lock-free hot store
    pub hot_capacity: Option<usize>,

    /// How long `take_async` keeps retrying an exhausted pool
    pub acquire_timeout: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            min: 1,
            max: 100,
            idle_eviction: Duration::from_secs(10),
            full_idle_eviction: Duration::ZERO,
            stale_borrow: Duration::ZERO,
            sweep_interval: Duration::from_secs(5),
            hot_capacity: None,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the number of resources retained while idle
    pub fn with_min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    /// Set the maximum number of resources
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    /// Set the idle eviction threshold for the overflow store
    pub fn with_idle_eviction(mut self, threshold: Duration) -> Self {
        self.idle_eviction = threshold;
        self
    }

    /// Set the idle eviction threshold for the hot store
    pub fn with_full_idle_eviction(mut self, threshold: Duration) -> Self {
        self.full_idle_eviction = threshold;
        self
    }

    /// Set the stale-borrow threshold
    pub fn with_stale_borrow(mut self, threshold: Duration) -> Self {
        self.stale_borrow = threshold;
        self
    }

    /// Set the sweep period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the hot-store slot count
    pub fn with_hot_capacity(mut self, slots: usize) -> Self {
        self.hot_capacity = Some(slots);
        self
    }

    /// Set the async acquire timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Effective hot-store capacity.
    pub fn hot_slots(&self) -> usize {
        self.hot_capacity
            .unwrap_or_else(|| self.min.max(default_slot_capacity()))
    }

    /// Check the configuration for values a pool cannot run with.
    ///
    /// # Examples
    ///
    /// ```
    /// use tiered_pool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_min(10).with_max(5);
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if self.max == 0 {
            return Err(PoolError::InvalidConfiguration("max must be greater than zero".into()));
        }
        if self.min > self.max {
            return Err(PoolError::InvalidConfiguration(format!(
                "min ({}) exceeds max ({})",
                self.min, self.max
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration("sweep_interval must be non-zero".into()));
        }
        if self.hot_capacity == Some(0) {
            return Err(PoolError::InvalidConfiguration("hot_capacity must be non-zero".into()));
        }
        Ok(())
    }
}
