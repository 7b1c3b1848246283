//! Bounded, lifetime-aware resource pool
//!
//! Free resources live in two tiers: a lock-free hot store holding roughly
//! `min` of the most recently returned items, and a FIFO overflow store for
//! the rest. Borrowed resources are tracked by lease key in a concurrent busy
//! map. A background sweep repairs leaked borrows and destroys idle items.

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{PooledItem, SweepReport, is_stale};
use crate::factory::Factory;
use crate::health::HealthStatus;
use crate::hooks::{DefaultHooks, PoolHooks};
use crate::lockfree::SlotArray;
use crate::metrics::{PoolMetrics, StatsTracker};
use crate::sweeper::Sweeper;

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A borrowed resource that goes back to its pool when dropped
pub struct Lease<T: Send + 'static> {
    value: Option<T>,
    key: u64,
    pool: Arc<Shared<T>>,
}

impl<T: Send + 'static> Lease<T> {
    /// Return the resource now and report whether the pool kept it.
    pub fn release(mut self) -> bool {
        match self.value.take() {
            Some(value) => Shared::restore(&self.pool, self.key, value),
            None => false,
        }
    }

    /// Take the resource out of the pool for good.
    ///
    /// The pool stops counting it, so its slot becomes available again.
    pub fn detach(mut self) -> T {
        self.pool.untrack(self.key);
        self.value.take().expect("Value already taken")
    }
}

impl<T: Send + 'static> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            Shared::restore(&self.pool, self.key, value);
        }
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

/// Pool state shared with leases and the sweeper thread.
struct Shared<T: Send + 'static> {
    config: PoolConfiguration,
    factory: Factory<T>,
    hooks: Box<dyn PoolHooks<T>>,
    hot: SlotArray<PooledItem<T>>,
    overflow: Mutex<VecDeque<PooledItem<T>>>,
    busy: DashMap<u64, Instant>,
    next_key: AtomicU64,
    free_count: AtomicUsize,
    busy_count: AtomicUsize,
    /// Free plus busy; reserved by CAS before a resource is built
    live_count: AtomicUsize,
    stats: StatsTracker,
    disposed: AtomicBool,
    sweeping: AtomicBool,
    sweeper: Sweeper,
}

/// Clears the re-entrancy flag when a sweep ends, even by panic.
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Send + 'static> Shared<T> {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Reserve room for one more resource, failing at `max`.
    fn reserve(&self) -> PoolResult<()> {
        let max = self.config.max;
        self.live_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < max).then_some(live + 1)
            })
            .map(|_| ())
            .map_err(|_| PoolError::PoolExhausted {
                busy: self.busy_count.load(Ordering::Acquire),
                max,
            })
    }

    fn pop_free(&self) -> Option<PooledItem<T>> {
        let item = self
            .hot
            .try_take()
            .or_else(|| self.overflow.lock().pop_front())?;
        self.free_count.fetch_sub(1, Ordering::AcqRel);
        Some(item)
    }

    fn take(this: &Arc<Self>) -> PoolResult<Lease<T>> {
        let started = Instant::now();
        StatsTracker::bump(&this.stats.total_requests, 1);

        if this.is_disposed() {
            return Err(PoolError::PoolDisposed);
        }

        loop {
            let value = match this.pop_free() {
                Some(item) => {
                    StatsTracker::bump(&this.stats.reused, 1);
                    item.into_value()
                }
                None => {
                    if let Err(err) = this.reserve() {
                        StatsTracker::bump(&this.stats.exhausted, 1);
                        debug!(pool = %this.name(), error = %err, "take refused");
                        return Err(err);
                    }
                    match this.factory.create() {
                        Ok(value) => {
                            StatsTracker::bump(&this.stats.created, 1);
                            debug!(
                                pool = %this.name(),
                                free = this.free_count.load(Ordering::Relaxed),
                                busy = this.busy_count.load(Ordering::Relaxed) + 1,
                                "created resource"
                            );
                            value
                        }
                        Err(err) => {
                            this.live_count.fetch_sub(1, Ordering::AcqRel);
                            StatsTracker::bump(&this.stats.construction_failures, 1);
                            warn!(pool = %this.name(), error = %err, "resource construction failed");
                            return Err(err);
                        }
                    }
                }
            };

            if !this.hooks.on_borrow_check(&value) {
                StatsTracker::bump(&this.stats.rejected, 1);
                debug!(pool = %this.name(), "borrow check rejected resource");
                this.discard(value);
                continue;
            }

            let key = this.next_key.fetch_add(1, Ordering::Relaxed);
            this.busy_count.fetch_add(1, Ordering::AcqRel);
            this.busy.insert(key, Instant::now());

            StatsTracker::bump(&this.stats.total_successes, 1);
            this.stats.record_latency(started.elapsed());

            return Ok(Lease {
                value: Some(value),
                key,
                pool: Arc::clone(this),
            });
        }
    }

    fn restore(this: &Arc<Self>, key: u64, value: T) -> bool {
        let tracked = this.busy.remove(&key).is_some();
        if tracked {
            this.busy_count.fetch_sub(1, Ordering::AcqRel);
        }

        if this.is_disposed() {
            if tracked {
                this.live_count.fetch_sub(1, Ordering::AcqRel);
            }
            this.destroy(value);
            return false;
        }

        if !tracked {
            // reclaimed as stale, so nothing else will ever release it
            StatsTracker::bump(&this.stats.invalid_returns, 1);
            warn!(pool = %this.name(), key, error = %PoolError::InvalidReturn, "put ignored");
            this.destroy(value);
            return false;
        }

        if !this.hooks.on_return_check(&value) {
            this.live_count.fetch_sub(1, Ordering::AcqRel);
            StatsTracker::bump(&this.stats.rejected, 1);
            debug!(pool = %this.name(), key, "return check rejected resource");
            return false;
        }

        this.stash(value);

        if this.is_disposed() {
            // raced with clear(); its drain may have missed this item
            this.destroy_free();
            return false;
        }

        Self::ensure_sweeper(this);
        true
    }

    /// Count a free item and route it: hot store while free or hot occupancy
    /// is below `min`, overflow otherwise.
    fn stash(&self, value: T) {
        let min = self.config.min;
        let prefer_hot = self.free_count.fetch_add(1, Ordering::AcqRel) < min || self.hot.len() < min;
        let item = PooledItem::new(value);
        if prefer_hot {
            if let Err(item) = self.hot.try_put(item) {
                self.overflow.lock().push_back(item);
            }
        } else {
            self.overflow.lock().push_back(item);
        }
    }

    fn untrack(&self, key: u64) {
        if self.busy.remove(&key).is_some() {
            self.busy_count.fetch_sub(1, Ordering::AcqRel);
            self.live_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Destroy an item that still counts against `live_count`.
    fn discard(&self, value: T) {
        self.live_count.fetch_sub(1, Ordering::AcqRel);
        self.destroy(value);
    }

    /// Run the destroy hook, containing any panic it raises.
    fn destroy(&self, value: T) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.hooks.on_destroy(value)));
        match outcome {
            Ok(()) => StatsTracker::bump(&self.stats.destroyed, 1),
            Err(_) => {
                StatsTracker::bump(&self.stats.destroy_failures, 1);
                error!(pool = %self.name(), "destroy hook panicked");
            }
        }
    }

    fn destroy_free(&self) -> usize {
        let mut items = self.hot.drain();
        items.extend(self.overflow.lock().drain(..));
        let count = items.len();
        for item in items {
            self.free_count.fetch_sub(1, Ordering::AcqRel);
            self.discard(item.into_value());
        }
        count
    }

    fn clear(&self) -> usize {
        self.disposed.store(true, Ordering::Release);

        let destroyed = self.destroy_free();

        let mut invalidated = 0;
        self.busy.retain(|_, _| {
            invalidated += 1;
            false
        });
        if invalidated > 0 {
            self.busy_count.fetch_sub(invalidated, Ordering::AcqRel);
            self.live_count.fetch_sub(invalidated, Ordering::AcqRel);
        }

        self.sweeper.stop();

        let count = destroyed + invalidated;
        if count > 0 {
            info!(pool = %self.name(), destroyed, invalidated, "pool cleared");
        }
        count
    }

    fn ensure_sweeper(this: &Arc<Self>) {
        if this.sweeper.is_started() {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(this);
        let started = this.sweeper.start(this.name(), this.config.sweep_interval, move || {
            match weak.upgrade() {
                Some(pool) if !pool.is_disposed() => {
                    pool.sweep();
                    true
                }
                _ => false,
            }
        });
        match started {
            Ok(true) => debug!(pool = %this.name(), interval = ?this.config.sweep_interval, "sweeper started"),
            Ok(false) => {}
            Err(err) => error!(pool = %this.name(), error = %err, "failed to spawn sweeper thread"),
        }
    }

    /// One maintenance pass; `None` when another pass is already running.
    fn sweep(&self) -> Option<SweepReport> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _guard = SweepGuard(&self.sweeping);

        let started = Instant::now();
        let mut report = SweepReport::default();

        let stale = self.config.stale_borrow;
        if !stale.is_zero() {
            let mut reclaimed = 0;
            self.busy.retain(|_, since| {
                let keep = !is_stale(*since, stale);
                if !keep {
                    reclaimed += 1;
                }
                keep
            });
            if reclaimed > 0 {
                // the caller may still hold the resource, so only the books change
                self.busy_count.fetch_sub(reclaimed, Ordering::AcqRel);
                self.live_count.fetch_sub(reclaimed, Ordering::AcqRel);
                StatsTracker::bump(&self.stats.stale_reclaimed, reclaimed);
                report.stale_reclaimed = reclaimed;
            }
        }

        let idle = self.config.idle_eviction;
        if !idle.is_zero() {
            let mut surplus = self
                .live_count
                .load(Ordering::Acquire)
                .saturating_sub(self.config.min);
            let mut expired = Vec::new();
            {
                let mut overflow = self.overflow.lock();
                while surplus > 0 && overflow.front().is_some_and(|item| item.is_expired(idle)) {
                    if let Some(item) = overflow.pop_front() {
                        expired.push(item);
                        surplus -= 1;
                    }
                }
            }
            report.idle_evicted = self.evict(expired);
        }

        let full_idle = self.config.full_idle_eviction;
        if !full_idle.is_zero() {
            let sifted = self.hot.sift(|item| item.is_expired(full_idle));
            if !sifted.displaced.is_empty() {
                self.overflow.lock().extend(sifted.displaced);
            }
            report.hot_evicted = self.evict(sifted.removed);
        }

        report.elapsed = started.elapsed();

        if !report.is_empty() {
            let metrics = self.metrics();
            debug!(
                pool = %self.name(),
                free = metrics.free_resources,
                busy = metrics.busy_resources,
                stale = report.stale_reclaimed,
                evicted = report.evicted(),
                requests = metrics.total_requests,
                hit_rate = metrics.hit_rate(),
                avg_latency_us = metrics.average_latency.as_secs_f64() * 1_000_000.0,
                elapsed = ?report.elapsed,
                "sweep released resources"
            );
            if panic::catch_unwind(AssertUnwindSafe(|| self.hooks.on_sweep(&report))).is_err() {
                error!(pool = %self.name(), "sweep hook panicked");
            }
        }

        Some(report)
    }

    fn evict(&self, items: Vec<PooledItem<T>>) -> usize {
        let count = items.len();
        for item in items {
            self.free_count.fetch_sub(1, Ordering::AcqRel);
            self.discard(item.into_value());
        }
        StatsTracker::bump(&self.stats.evicted, count);
        count
    }

    fn warmup(this: &Arc<Self>, count: usize) -> PoolResult<usize> {
        if this.is_disposed() {
            return Err(PoolError::PoolDisposed);
        }
        let mut warmed = 0;
        while warmed < count && this.reserve().is_ok() {
            let value = match this.factory.create() {
                Ok(value) => value,
                Err(err) => {
                    this.live_count.fetch_sub(1, Ordering::AcqRel);
                    StatsTracker::bump(&this.stats.construction_failures, 1);
                    return Err(err);
                }
            };
            StatsTracker::bump(&this.stats.created, 1);
            this.stash(value);
            warmed += 1;
        }
        if warmed > 0 {
            debug!(pool = %this.name(), warmed, "pool warmed up");
            Self::ensure_sweeper(this);
        }
        Ok(warmed)
    }

    fn metrics(&self) -> PoolMetrics {
        self.stats.get_metrics(
            self.free_count.load(Ordering::Acquire),
            self.busy_count.load(Ordering::Acquire),
            self.config.max,
        )
    }
}

/// Thread-safe pool that lends out factory-built resources up to a fixed maximum
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
///
/// let pool = ManagedResourcePool::new(
///     Factory::new(|| String::from("conn")),
///     PoolConfiguration::new().with_max(2),
/// ).unwrap();
///
/// let first = pool.take().unwrap();
/// let second = pool.take().unwrap();
/// assert!(pool.take().unwrap_err().is_exhausted());
///
/// assert!(pool.put(first));
/// drop(second);
/// assert_eq!(pool.free_count(), 2);
/// ```
pub struct ManagedResourcePool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> ManagedResourcePool<T> {
    /// Create a pool with permissive hooks.
    pub fn new(factory: Factory<T>, config: PoolConfiguration) -> PoolResult<Self> {
        Self::with_hooks(factory, config, DefaultHooks)
    }

    /// Create a pool whose lending, return and destruction are customised by `hooks`.
    pub fn with_hooks<H>(factory: Factory<T>, config: PoolConfiguration, hooks: H) -> PoolResult<Self>
    where
        H: PoolHooks<T> + 'static,
    {
        config.validate()?;
        debug!(
            pool = %config.name,
            min = config.min,
            max = config.max,
            idle_eviction = ?config.idle_eviction,
            full_idle_eviction = ?config.full_idle_eviction,
            stale_borrow = ?config.stale_borrow,
            "created resource pool"
        );

        let hot = SlotArray::new(config.hot_slots());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                factory,
                hooks: Box::new(hooks),
                hot,
                overflow: Mutex::new(VecDeque::new()),
                busy: DashMap::new(),
                next_key: AtomicU64::new(0),
                free_count: AtomicUsize::new(0),
                busy_count: AtomicUsize::new(0),
                live_count: AtomicUsize::new(0),
                stats: StatsTracker::new(),
                disposed: AtomicBool::new(false),
                sweeping: AtomicBool::new(false),
                sweeper: Sweeper::new(),
            }),
        })
    }

    /// Borrow a resource without ever waiting.
    ///
    /// Serves from the hot store, then the overflow store, then the factory.
    /// Fails with [`PoolError::PoolExhausted`] at `max`.
    pub fn take(&self) -> PoolResult<Lease<T>> {
        Shared::take(&self.shared)
    }

    /// Borrow a resource, retrying while the pool is exhausted until the
    /// configured acquire timeout elapses.
    pub async fn take_async(&self) -> PoolResult<Lease<T>> {
        let timeout = self.shared.config.acquire_timeout;

        tokio::time::timeout(timeout, async {
            loop {
                match self.take() {
                    Err(PoolError::PoolExhausted { .. }) => {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    other => return other,
                }
            }
        })
        .await
        .map_err(|_| PoolError::Timeout(timeout))?
    }

    /// Hand a lease back. Returns `false` when the pool did not keep the resource.
    pub fn put(&self, lease: Lease<T>) -> bool {
        if !Arc::ptr_eq(&lease.pool, &self.shared) {
            StatsTracker::bump(&self.shared.stats.invalid_returns, 1);
            warn!(pool = %self.shared.name(), "put ignored for lease owned by another pool");
            // dropping sends it home
            drop(lease);
            return false;
        }
        lease.release()
    }

    /// Destroy every free resource, forget every busy one and dispose the pool.
    ///
    /// Leases still out are destroyed when they come back. Returns the number
    /// of resources destroyed or invalidated.
    pub fn clear(&self) -> usize {
        self.shared.clear()
    }

    /// Run one sweep now on the calling thread.
    pub fn sweep_now(&self) -> Option<SweepReport> {
        self.shared.sweep()
    }

    /// Pre-build up to `count` free resources without exceeding `max`.
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        Shared::warmup(&self.shared, count)
    }

    /// Warm up on the blocking thread pool.
    pub async fn warmup_async(&self, count: usize) -> PoolResult<usize> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || Shared::warmup(&shared, count))
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Resources ready to lend.
    pub fn free_count(&self) -> usize {
        self.shared.free_count.load(Ordering::Acquire)
    }

    /// Resources currently lent out.
    pub fn busy_count(&self) -> usize {
        self.shared.busy_count.load(Ordering::Acquire)
    }

    /// Free resources cached in the hot store.
    pub fn hot_count(&self) -> usize {
        self.shared.hot.len()
    }

    /// Free resources waiting in the overflow store.
    pub fn overflow_count(&self) -> usize {
        self.shared.overflow.lock().len()
    }

    pub fn total_requests(&self) -> usize {
        self.shared.stats.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_successes(&self) -> usize {
        self.shared.stats.total_successes.load(Ordering::Relaxed)
    }

    /// Smoothed time spent in `take`.
    pub fn average_latency(&self) -> Duration {
        self.shared.stats.average_latency()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Whether the background sweep thread is alive.
    pub fn sweeper_running(&self) -> bool {
        self.shared.sweeper.is_running()
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.shared.metrics()
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format, labelled with the pool name and `tags`
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(&self, tags: Option<&HashMap<String, String>>) -> PoolResult<String> {
        MetricsExporter::export_prometheus(&self.metrics(), self.name(), tags)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::new(
            self.free_count(),
            self.busy_count(),
            self.shared.config.max,
            self.is_disposed(),
        )
    }
}

impl<T: Send + 'static> Drop for ManagedResourcePool<T> {
    fn drop(&mut self) {
        self.shared.clear();
    }
}

impl<T: Send + 'static> fmt::Debug for ManagedResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedResourcePool")
            .field("name", &self.name())
            .field("free", &self.free_count())
            .field("busy", &self.busy_count())
            .field("max", &self.shared.config.max)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counting_pool(config: PoolConfiguration) -> (ManagedResourcePool<usize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = ManagedResourcePool::new(
            Factory::new(move || counter.fetch_add(1, Ordering::SeqCst)),
            config,
        )
        .unwrap();
        (pool, created)
    }

    #[derive(Default)]
    struct Recording {
        destroyed: Arc<Mutex<Vec<usize>>>,
        reject_borrow: Option<usize>,
    }

    impl PoolHooks<usize> for Recording {
        fn on_borrow_check(&self, value: &usize) -> bool {
            self.reject_borrow != Some(*value)
        }

        fn on_return_check(&self, value: &usize) -> bool {
            *value != 999
        }

        fn on_destroy(&self, value: usize) {
            self.destroyed.lock().push(value);
        }
    }

    #[test]
    fn test_take_put_reuses_without_factory() {
        let (pool, created) = counting_pool(PoolConfiguration::new().with_max(4));

        let lease = pool.take().unwrap();
        assert_eq!(*lease, 0);
        assert_eq!(pool.busy_count(), 1);
        assert!(pool.put(lease));
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.busy_count(), 0);

        let again = pool.take().unwrap();
        assert_eq!(*again, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.metrics().reused, 1);
    }

    #[test]
    fn test_exhausted_never_constructs() {
        let (pool, created) = counting_pool(PoolConfiguration::new().with_max(2));

        let _a = pool.take().unwrap();
        let _b = pool.take().unwrap();
        match pool.take() {
            Err(PoolError::PoolExhausted { busy, max }) => {
                assert_eq!(busy, 2);
                assert_eq!(max, 2);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.total_requests(), 3);
        assert_eq!(pool.total_successes(), 2);
        assert_eq!(pool.metrics().exhausted, 1);
    }

    #[test]
    fn test_routing_prefers_hot_until_min() {
        let (pool, _) = counting_pool(PoolConfiguration::new().with_min(2).with_max(10).with_hot_capacity(8));

        let leases: Vec<_> = (0..5).map(|_| pool.take().unwrap()).collect();
        drop(leases);

        assert_eq!(pool.free_count(), 5);
        assert_eq!(pool.hot_count(), 2);
        assert_eq!(pool.overflow_count(), 3);
    }

    #[test]
    fn test_hot_overflow_when_slots_full() {
        let (pool, _) = counting_pool(PoolConfiguration::new().with_min(4).with_max(10).with_hot_capacity(1));

        let leases: Vec<_> = (0..3).map(|_| pool.take().unwrap()).collect();
        drop(leases);

        assert_eq!(pool.hot_count(), 1);
        assert_eq!(pool.overflow_count(), 2);
        assert_eq!(pool.free_count(), 3);
    }

    #[test]
    fn test_clear_twice_destroys_once() {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let next = Arc::clone(&counter);
        let pool = ManagedResourcePool::with_hooks(
            Factory::new(move || next.fetch_add(1, Ordering::SeqCst)),
            PoolConfiguration::new().with_max(4),
            Recording {
                destroyed: Arc::clone(&destroyed),
                ..Recording::default()
            },
        )
        .unwrap();

        let a = pool.take().unwrap();
        let b = pool.take().unwrap();
        drop(a);

        assert_eq!(pool.clear(), 2);
        assert_eq!(pool.clear(), 0);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.busy_count(), 0);
        assert_eq!(*destroyed.lock(), vec![0]);

        // the outstanding lease is destroyed on its way back
        assert!(!pool.put(b));
        assert_eq!(*destroyed.lock(), vec![0, 1]);
        assert!(matches!(pool.take(), Err(PoolError::PoolDisposed)));
    }

    #[test]
    fn test_borrow_check_rejection_retries() {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let next = Arc::clone(&counter);
        let pool = ManagedResourcePool::with_hooks(
            Factory::new(move || next.fetch_add(1, Ordering::SeqCst)),
            PoolConfiguration::new().with_max(1),
            Recording {
                destroyed: Arc::clone(&destroyed),
                reject_borrow: Some(0),
            },
        )
        .unwrap();

        let lease = pool.take().unwrap();
        assert_eq!(*lease, 1);
        assert_eq!(*destroyed.lock(), vec![0]);
        assert_eq!(pool.busy_count(), 1);
        assert_eq!(pool.metrics().rejected, 1);
    }

    #[test]
    fn test_return_check_rejection_does_not_destroy() {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let pool = ManagedResourcePool::with_hooks(
            Factory::new(|| 5usize),
            PoolConfiguration::new().with_max(1),
            Recording {
                destroyed: Arc::clone(&destroyed),
                ..Recording::default()
            },
        )
        .unwrap();

        let mut lease = pool.take().unwrap();
        *lease = 999;
        assert!(!pool.put(lease));
        assert!(destroyed.lock().is_empty());
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.busy_count(), 0);
        // capacity came back
        assert_eq!(*pool.take().unwrap(), 5);
    }

    #[test]
    fn test_construction_failure_releases_reservation() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let pool: ManagedResourcePool<u32> = ManagedResourcePool::new(
            Factory::fallible(move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("connection refused".into())
                } else {
                    Ok(7)
                }
            }),
            PoolConfiguration::new().with_max(1),
        )
        .unwrap();

        let err = pool.take().unwrap_err();
        assert!(matches!(err, PoolError::ConstructionFailed(_)));
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(*pool.take().unwrap(), 7);
        assert_eq!(pool.metrics().construction_failures, 1);
    }

    #[test]
    fn test_foreign_lease_goes_home() {
        let (home, _) = counting_pool(PoolConfiguration::new());
        let (other, _) = counting_pool(PoolConfiguration::new());

        let lease = home.take().unwrap();
        assert!(!other.put(lease));
        assert_eq!(other.metrics().invalid_returns, 1);
        assert_eq!(home.free_count(), 1);
        assert_eq!(home.busy_count(), 0);
    }

    #[test]
    fn test_detach_frees_capacity() {
        let (pool, _) = counting_pool(PoolConfiguration::new().with_max(1));

        let kept = pool.take().unwrap().detach();
        assert_eq!(kept, 0);
        assert_eq!(pool.busy_count(), 0);
        assert_eq!(*pool.take().unwrap(), 1);
    }

    #[test]
    fn test_stale_return_is_invalid() {
        let (pool, _) = counting_pool(
            PoolConfiguration::new()
                .with_max(2)
                .with_stale_borrow(Duration::from_millis(20)),
        );

        let lease = pool.take().unwrap();
        thread::sleep(Duration::from_millis(50));
        let report = pool.sweep_now().unwrap();
        assert_eq!(report.stale_reclaimed, 1);
        assert_eq!(pool.busy_count(), 0);

        assert!(!lease.release());
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.metrics().invalid_returns, 1);
    }

    #[test]
    fn test_full_idle_evicts_hot() {
        let (pool, _) = counting_pool(
            PoolConfiguration::new()
                .with_min(2)
                .with_max(4)
                .with_full_idle_eviction(Duration::from_millis(20)),
        );

        let leases: Vec<_> = (0..2).map(|_| pool.take().unwrap()).collect();
        drop(leases);
        assert_eq!(pool.hot_count(), 2);

        thread::sleep(Duration::from_millis(50));
        let report = pool.sweep_now().unwrap();
        assert_eq!(report.hot_evicted, 2);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.metrics().evicted, 2);
    }

    #[test]
    fn test_sweep_is_not_reentrant() {
        let (pool, _) = counting_pool(PoolConfiguration::new());
        pool.shared.sweeping.store(true, Ordering::SeqCst);
        assert!(pool.sweep_now().is_none());
        pool.shared.sweeping.store(false, Ordering::SeqCst);
        assert!(pool.sweep_now().is_some());
    }

    #[test]
    fn test_warmup_respects_max() {
        let (pool, created) = counting_pool(PoolConfiguration::new().with_max(3));
        assert_eq!(pool.warmup(10).unwrap(), 3);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(created.load(Ordering::SeqCst), 3);

        let _leases: Vec<_> = (0..3).map(|_| pool.take().unwrap()).collect();
        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert!(pool.take().unwrap_err().is_exhausted());
    }

    #[test]
    fn test_sweeper_starts_on_first_put() {
        let (pool, _) = counting_pool(PoolConfiguration::new());
        let lease = pool.take().unwrap();
        assert!(!pool.sweeper_running());
        drop(lease);
        assert!(pool.sweeper_running());
        pool.clear();
        assert!(!pool.sweeper_running());
    }

    #[tokio::test]
    async fn test_take_async_times_out() {
        let (pool, _) = counting_pool(
            PoolConfiguration::new()
                .with_max(1)
                .with_acquire_timeout(Duration::from_millis(50)),
        );
        let _held = pool.take().unwrap();
        let err = pool.take_async().await.unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_warmup_async() {
        let (pool, _) = counting_pool(PoolConfiguration::new().with_max(5));
        assert_eq!(pool.warmup_async(2).await.unwrap(), 2);
        assert_eq!(pool.free_count(), 2);
        let lease = pool.take_async().await.unwrap();
        assert!(*lease < 2);
    }
}
