//! Health monitoring for resource pools

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, ManagedResourcePool, PoolConfiguration};
///
/// let pool = ManagedResourcePool::new(
///     Factory::new(|| 1u32),
///     PoolConfiguration::new().with_max(3),
/// ).unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.busy_resources, 0);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Current pool utilization (0.0 to 1.0)
    pub utilization: f64,

    /// Free resources count
    pub free_resources: usize,

    /// Busy resources count
    pub busy_resources: usize,

    /// Configured maximum
    pub max_resources: usize,

    /// Whether the pool has been disposed
    pub disposed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(free: usize, busy: usize, max: usize, disposed: bool) -> Self {
        let utilization = if max > 0 { busy as f64 / max as f64 } else { 0.0 };

        let mut warnings = Vec::new();
        let mut is_healthy = !disposed;

        if disposed {
            warnings.push("Pool is disposed".to_string());
        }

        if utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if busy >= max && free == 0 && max > 0 {
            warnings.push("Pool is exhausted".to_string());
        }

        Self {
            is_healthy,
            utilization,
            free_resources: free,
            busy_resources: busy,
            max_resources: max,
            disposed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }

    /// Number of warnings detected
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}
