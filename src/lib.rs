//! # tiered_pool
//!
//! Two layered resource pools for Rust.
//!
//! ## Features
//!
//! - [`LockFreePool`]: fixed-capacity, array-based object cache; never blocks
//! - [`ManagedResourcePool`]: bounded pool with a minimum and maximum count
//! - Hot store (lock-free slots) plus FIFO overflow store for free resources
//! - Busy tracking with stale-borrow repair for leases that never come back
//! - Idle eviction by a background sweep thread owned by the pool
//! - Automatic return of resources via RAII (Drop trait)
//! - Lifecycle hooks for borrow/return checks and destruction
//! - Usage statistics, health status and Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
//!
//! let pool = ManagedResourcePool::new(
//!     Factory::new(|| Vec::<u8>::with_capacity(4096)),
//!     PoolConfiguration::new().with_min(1).with_max(8),
//! ).unwrap();
//!
//! {
//!     let mut buffer = pool.take().unwrap();
//!     buffer.extend_from_slice(b"payload");
//!     // Resource automatically returned when `buffer` goes out of scope
//! }
//! assert_eq!(pool.free_count(), 1);
//! ```

mod config;
mod errors;
mod eviction;
mod factory;
mod health;
mod hooks;
mod lockfree;
mod metrics;
mod pool;
mod sweeper;

pub use config::{PoolConfiguration, default_slot_capacity};
pub use errors::{BoxError, PoolError, PoolResult};
pub use eviction::SweepReport;
pub use factory::Factory;
pub use health::HealthStatus;
pub use hooks::{DefaultHooks, PoolHooks};
pub use lockfree::{LockFreePool, Rented};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::{Lease, ManagedResourcePool};
