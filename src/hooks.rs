//! Lifecycle hooks for managed pools

use crate::eviction::SweepReport;

/// Capability hooks a [`ManagedResourcePool`](crate::ManagedResourcePool) consults
/// while lending, accepting and destroying resources.
///
/// Every method has a permissive default, so implementors only override what
/// they care about.
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration, PoolHooks};
///
/// struct Conn { open: bool }
///
/// struct DropClosed;
///
/// impl PoolHooks<Conn> for DropClosed {
///     fn on_return_check(&self, conn: &Conn) -> bool {
///         conn.open
///     }
/// }
///
/// let pool = ManagedResourcePool::with_hooks(
///     Factory::new(|| Conn { open: true }),
///     PoolConfiguration::new(),
///     DropClosed,
/// ).unwrap();
///
/// let mut conn = pool.take().unwrap();
/// conn.open = false;
/// assert!(!pool.put(conn));
/// assert_eq!(pool.free_count(), 0);
/// ```
pub trait PoolHooks<T>: Send + Sync {
    /// Called for every item about to be lent out; `false` discards it and
    /// the pool tries again.
    ///
    /// `take` keeps building and discarding until an item passes, so a check
    /// that can never succeed makes `take` spin forever.
    fn on_borrow_check(&self, _value: &T) -> bool {
        true
    }

    /// Called for every item handed back; `false` drops it without pooling.
    fn on_return_check(&self, _value: &T) -> bool {
        true
    }

    /// Releases a resource the pool no longer wants.
    fn on_destroy(&self, value: T) {
        drop(value);
    }

    /// Observes the result of every sweep that did some work.
    fn on_sweep(&self, _report: &SweepReport) {}
}

/// Accepts everything and destroys by dropping.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl<T> PoolHooks<T> for DefaultHooks {}
