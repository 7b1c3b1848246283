//! Resource construction

use crate::errors::{BoxError, PoolError, PoolResult};
use std::fmt;
use std::sync::Arc;

/// Constructs new resources on behalf of a pool.
///
/// Cheap to clone; clones share the same closure.
///
/// # Examples
///
/// ```
/// use tiered_pool::Factory;
///
/// let buffers = Factory::new(|| Vec::<u8>::with_capacity(1024));
/// assert_eq!(buffers.create().unwrap().capacity(), 1024);
///
/// let failing: Factory<u32> = Factory::fallible(|| Err("backend offline".into()));
/// assert!(failing.create().is_err());
/// ```
pub struct Factory<T> {
    create: Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>,
}

impl<T> Factory<T> {
    /// Wrap a constructor that cannot fail.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(move || Ok(create())),
        }
    }

    /// Wrap a constructor that may fail, e.g. opening a connection.
    pub fn fallible<F>(create: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
        }
    }

    /// Build one resource. Failures surface as [`PoolError::ConstructionFailed`].
    pub fn create(&self) -> PoolResult<T> {
        (self.create)().map_err(PoolError::construction)
    }
}

impl<T: Default + 'static> Default for Factory<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            create: Arc::clone(&self.create),
        }
    }
}

impl<T> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").finish_non_exhaustive()
    }
}
