//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[cfg(feature = "metrics")]
use crate::errors::{PoolError, PoolResult};

/// Point-in-time view of a pool's counters
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
///
/// let pool = ManagedResourcePool::new(Factory::new(|| 7u32), PoolConfiguration::new()).unwrap();
///
/// {
///     let _lease = pool.take().unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.total_requests, 1);
///     assert_eq!(metrics.busy_resources, 1);
/// }
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Calls to `take`
    pub total_requests: usize,

    /// Calls to `take` that produced a lease
    pub total_successes: usize,

    /// Leases served from the hot or overflow store
    pub reused: usize,

    /// Resources built by the factory
    pub created: usize,

    /// Resources destroyed by the pool
    pub destroyed: usize,

    /// Resources destroyed by idle eviction
    pub evicted: usize,

    /// Busy entries dropped by stale-borrow repair
    pub stale_reclaimed: usize,

    /// Calls to `take` refused at capacity
    pub exhausted: usize,

    /// Factory failures
    pub construction_failures: usize,

    /// Returns of leases the pool was not tracking
    pub invalid_returns: usize,

    /// Items refused by a borrow or return check
    pub rejected: usize,

    /// Destroy hooks that panicked
    pub destroy_failures: usize,

    /// Current free resources
    pub free_resources: usize,

    /// Current busy resources
    pub busy_resources: usize,

    /// Configured maximum
    pub max_resources: usize,

    /// Smoothed `take` latency
    pub average_latency: Duration,

    /// Busy over maximum (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Share of requests that succeeded.
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_successes as f64 / self.total_requests as f64
        }
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_requests".to_string(), self.total_requests.to_string());
        metrics.insert("total_successes".to_string(), self.total_successes.to_string());
        metrics.insert("reused".to_string(), self.reused.to_string());
        metrics.insert("created".to_string(), self.created.to_string());
        metrics.insert("destroyed".to_string(), self.destroyed.to_string());
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("stale_reclaimed".to_string(), self.stale_reclaimed.to_string());
        metrics.insert("exhausted".to_string(), self.exhausted.to_string());
        metrics.insert("construction_failures".to_string(), self.construction_failures.to_string());
        metrics.insert("invalid_returns".to_string(), self.invalid_returns.to_string());
        metrics.insert("rejected".to_string(), self.rejected.to_string());
        metrics.insert("destroy_failures".to_string(), self.destroy_failures.to_string());
        metrics.insert("free_resources".to_string(), self.free_resources.to_string());
        metrics.insert("busy_resources".to_string(), self.busy_resources.to_string());
        metrics.insert("max_resources".to_string(), self.max_resources.to_string());
        metrics.insert(
            "average_latency_us".to_string(),
            format!("{:.2}", self.average_latency.as_secs_f64() * 1_000_000.0),
        );
        metrics.insert("hit_rate".to_string(), format!("{:.4}", self.hit_rate()));
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ManagedResourcePool::new(
    ///     Factory::new(|| 0u8),
    ///     PoolConfiguration::new().with_name("db"),
    /// ).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus(Some(&tags)).unwrap();
    /// assert!(output.contains("resource_pool_busy"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let registry = Registry::new();
        let labels = Self::labels(pool_name, tags);
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("resource_pool_busy", "Current busy resources", metrics.busy_resources),
            ("resource_pool_free", "Current free resources", metrics.free_resources),
            ("resource_pool_max", "Configured maximum resources", metrics.max_resources),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help)).map_err(Self::failed)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(Self::failed)?;
        }

        let counters = [
            ("resource_pool_requests_total", "Total take requests", metrics.total_requests),
            ("resource_pool_successes_total", "Successful take requests", metrics.total_successes),
            ("resource_pool_created_total", "Resources created", metrics.created),
            ("resource_pool_destroyed_total", "Resources destroyed", metrics.destroyed),
            ("resource_pool_evicted_total", "Resources evicted while idle", metrics.evicted),
            ("resource_pool_stale_reclaimed_total", "Stale borrows reclaimed", metrics.stale_reclaimed),
            ("resource_pool_exhausted_total", "Requests refused at capacity", metrics.exhausted),
            ("resource_pool_invalid_returns_total", "Untracked returns", metrics.invalid_returns),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help)).map_err(Self::failed)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(Self::failed)?;
        }

        let latency = Gauge::with_opts(opts(
            "resource_pool_take_latency_seconds",
            "Smoothed take latency",
        ))
        .map_err(Self::failed)?;
        latency.set(metrics.average_latency.as_secs_f64());
        registry.register(Box::new(latency)).map_err(Self::failed)?;

        let utilization = Gauge::with_opts(opts("resource_pool_utilization", "Busy over maximum"))
            .map_err(Self::failed)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(Self::failed)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(Self::failed)?;
        String::from_utf8(buffer).map_err(|e| PoolError::MetricsExport(e.to_string()))
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }
        labels
    }

    fn failed(err: prometheus::Error) -> PoolError {
        PoolError::MetricsExport(err.to_string())
    }
}

/// Internal counters shared by every operation of a pool
#[derive(Default)]
pub(crate) struct StatsTracker {
    pub total_requests: AtomicUsize,
    pub total_successes: AtomicUsize,
    pub reused: AtomicUsize,
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub evicted: AtomicUsize,
    pub stale_reclaimed: AtomicUsize,
    pub exhausted: AtomicUsize,
    pub construction_failures: AtomicUsize,
    pub invalid_returns: AtomicUsize,
    pub rejected: AtomicUsize,
    pub destroy_failures: AtomicUsize,
    /// Nanoseconds, stored as `f64` bits
    latency_ns: AtomicU64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(counter: &AtomicUsize, by: usize) {
        if by > 0 {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    /// Fold a latency sample into the running average: `(avg * 3 + sample) / 4`.
    pub fn record_latency(&self, sample: Duration) {
        let sample = sample.as_nanos() as f64;
        let _ = self
            .latency_ns
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let avg = f64::from_bits(bits);
                let next = if avg == 0.0 { sample } else { (avg * 3.0 + sample) / 4.0 };
                Some(next.to_bits())
            });
    }

    pub fn average_latency(&self) -> Duration {
        let ns = f64::from_bits(self.latency_ns.load(Ordering::Relaxed));
        Duration::from_nanos(ns.round() as u64)
    }

    pub fn get_metrics(&self, free: usize, busy: usize, max: usize) -> PoolMetrics {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        let utilization = if max > 0 { busy as f64 / max as f64 } else { 0.0 };

        PoolMetrics {
            total_requests: load(&self.total_requests),
            total_successes: load(&self.total_successes),
            reused: load(&self.reused),
            created: load(&self.created),
            destroyed: load(&self.destroyed),
            evicted: load(&self.evicted),
            stale_reclaimed: load(&self.stale_reclaimed),
            exhausted: load(&self.exhausted),
            construction_failures: load(&self.construction_failures),
            invalid_returns: load(&self.invalid_returns),
            rejected: load(&self.rejected),
            destroy_failures: load(&self.destroy_failures),
            free_resources: free,
            busy_resources: busy,
            max_resources: max,
            average_latency: self.average_latency(),
            utilization,
        }
    }
}
