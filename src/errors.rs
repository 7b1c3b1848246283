//! Error types for the resource pools

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by fallible resource factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool exhausted - {busy} resources busy, maximum is {max}")]
    PoolExhausted { busy: usize, max: usize },

    #[error("Returned resource is not tracked as busy by this pool")]
    InvalidReturn,

    #[error("Resource construction failed: {0}")]
    ConstructionFailed(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("Pool has been disposed")]
    PoolDisposed,

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Metrics export failed: {0}")]
    MetricsExport(String),
}

impl PoolError {
    pub(crate) fn construction(err: BoxError) -> Self {
        PoolError::ConstructionFailed(Arc::from(err))
    }

    /// Whether the error is the expected steady-state "pool at capacity" signal.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::PoolExhausted { .. })
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
