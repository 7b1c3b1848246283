//! Lock-free object cache
//!
//! One "current" slot holds the hottest item; a fixed array of further slots
//! holds the rest. Every slot is an `AtomicPtr` to a boxed value and ownership
//! moves in and out of a slot through a single compare-and-swap, so callers
//! never block on each other.

use crate::config::default_slot_capacity;
use crate::errors::PoolResult;
use crate::factory::Factory;

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// Fixed-capacity array of CAS-claimed slots.
pub(crate) struct SlotArray<T> {
    current: AtomicPtr<T>,
    slots: Box<[AtomicPtr<T>]>,
    len: AtomicUsize,
    _owns: PhantomData<T>,
}

// SAFETY: values are only ever moved in and out whole, never shared by
// reference, so `T: Send` is enough for concurrent access.
unsafe impl<T: Send> Sync for SlotArray<T> {}

/// Items pulled out by [`SlotArray::sift`].
pub(crate) struct Sifted<T> {
    pub removed: Vec<T>,
    /// Kept items whose slot was refilled meanwhile and found no other room
    pub displaced: Vec<T>,
}

impl<T> SlotArray<T> {
    /// `capacity` counts the current slot; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let extra = capacity.max(1) - 1;
        let slots = (0..extra)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            current: AtomicPtr::new(ptr::null_mut()),
            slots,
            len: AtomicUsize::new(0),
            _owns: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len() + 1
    }

    /// Approximate number of cached items; never lower than the real count.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    fn positions(&self) -> impl Iterator<Item = &AtomicPtr<T>> {
        std::iter::once(&self.current).chain(self.slots.iter())
    }

    fn claim(slot: &AtomicPtr<T>) -> Option<Box<T>> {
        let head = slot.load(Ordering::Acquire);
        if head.is_null() {
            return None;
        }
        slot.compare_exchange(head, ptr::null_mut(), Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            // SAFETY: the pointer came from `Box::into_raw` in `fill`, and the
            // successful CAS made this thread its only owner.
            .map(|claimed| unsafe { Box::from_raw(claimed) })
    }

    fn fill(slot: &AtomicPtr<T>, boxed: Box<T>) -> Result<(), Box<T>> {
        let raw = Box::into_raw(boxed);
        match slot.compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => Ok(()),
            // SAFETY: the CAS failed, so `raw` was never published.
            Err(_) => Err(unsafe { Box::from_raw(raw) }),
        }
    }

    /// Claim any cached item, current slot first.
    pub fn try_take(&self) -> Option<T> {
        let boxed = self.positions().find_map(Self::claim)?;
        self.len.fetch_sub(1, Ordering::AcqRel);
        Some(*boxed)
    }

    /// Store an item in the first empty slot, handing it back when all are full.
    pub fn try_put(&self, value: T) -> Result<(), T> {
        self.len.fetch_add(1, Ordering::AcqRel);
        let mut boxed = Box::new(value);
        for slot in self.positions() {
            match Self::fill(slot, boxed) {
                Ok(()) => return Ok(()),
                Err(back) => boxed = back,
            }
        }
        self.len.fetch_sub(1, Ordering::AcqRel);
        Err(*boxed)
    }

    /// Empty every slot.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(value) = self.try_take() {
            out.push(value);
        }
        out
    }

    /// Visit every occupied slot once, removing the items `remove` selects.
    ///
    /// Each kept item goes back into its own slot when possible.
    pub fn sift<F>(&self, mut remove: F) -> Sifted<T>
    where
        F: FnMut(&T) -> bool,
    {
        let mut sifted = Sifted {
            removed: Vec::new(),
            displaced: Vec::new(),
        };
        for slot in self.positions() {
            let Some(boxed) = Self::claim(slot) else {
                continue;
            };
            if remove(&*boxed) {
                self.len.fetch_sub(1, Ordering::AcqRel);
                sifted.removed.push(*boxed);
                continue;
            }
            if let Err(boxed) = Self::fill(slot, boxed) {
                self.len.fetch_sub(1, Ordering::AcqRel);
                if let Err(value) = self.try_put(*boxed) {
                    sifted.displaced.push(value);
                }
            }
        }
        sifted
    }
}

impl<T> Drop for SlotArray<T> {
    fn drop(&mut self) {
        for slot in self.positions() {
            let raw = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !raw.is_null() {
                // SAFETY: `&mut self` rules out concurrent claims.
                drop(unsafe { Box::from_raw(raw) });
            }
        }
    }
}

/// Near-zero-overhead cache of reusable objects.
///
/// `get` never blocks: it reuses a cached object when one can be claimed and
/// falls back to the factory otherwise. `put` caches the object when a slot is
/// free and drops it otherwise.
///
/// # Examples
///
/// ```
/// use tiered_pool::{Factory, LockFreePool};
///
/// let pool = LockFreePool::with_capacity(Factory::new(String::new), 4)
///     .with_recycle(|s: &mut String| {
///         s.clear();
///         s.capacity() <= 4096
///     });
///
/// let mut s = pool.get().unwrap();
/// s.push_str("hello");
/// assert!(pool.put(s));
///
/// assert_eq!(pool.get().unwrap(), "");
/// assert_eq!(pool.hits(), 1);
/// ```
pub struct LockFreePool<T> {
    slots: SlotArray<T>,
    factory: Factory<T>,
    recycle: Option<Arc<dyn Fn(&mut T) -> bool + Send + Sync>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<T: Send> LockFreePool<T> {
    /// Create a pool sized to twice the available parallelism.
    pub fn new(factory: Factory<T>) -> Self {
        Self::with_capacity(factory, default_slot_capacity())
    }

    /// Create a pool caching at most `capacity` objects.
    ///
    /// The current slot always exists, so a `capacity` of zero caches one object.
    pub fn with_capacity(factory: Factory<T>, capacity: usize) -> Self {
        Self {
            slots: SlotArray::new(capacity),
            factory,
            recycle: None,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Reset objects on return; returning `false` drops the object instead of caching it.
    pub fn with_recycle<F>(mut self, recycle: F) -> Self
    where
        F: Fn(&mut T) -> bool + Send + Sync + 'static,
    {
        self.recycle = Some(Arc::new(recycle));
        self
    }

    /// Take a cached object or build a new one.
    pub fn get(&self) -> PoolResult<T> {
        if let Some(value) = self.slots.try_take() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.factory.create()
    }

    /// Cache an object for reuse. Returns `false` when it was dropped instead.
    pub fn put(&self, mut value: T) -> bool {
        if let Some(ref recycle) = self.recycle
            && !recycle(&mut value)
        {
            return false;
        }
        self.slots.try_put(value).is_ok()
    }

    /// Borrow an object that goes back to the pool when the guard drops.
    pub fn rent(&self) -> PoolResult<Rented<'_, T>> {
        let value = self.get()?;
        Ok(Rented {
            value: Some(value),
            pool: self,
        })
    }

    /// Drop every cached object. Intended for shutdown.
    pub fn clear(&self) -> usize {
        self.slots.drain().len()
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached objects.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Gets served from the cache.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Gets that fell through to the factory.
    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<T: Send + Default + 'static> Default for LockFreePool<T> {
    fn default() -> Self {
        Self::new(Factory::default())
    }
}

/// An object rented from a [`LockFreePool`], returned on drop.
pub struct Rented<'a, T: Send> {
    value: Option<T>,
    pool: &'a LockFreePool<T>,
}

impl<T: Send> Rented<'_, T> {
    /// Keep the object instead of returning it.
    pub fn into_inner(mut self) -> T {
        self.value.take().expect("Value already taken")
    }
}

impl<T: Send> Deref for Rented<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send> DerefMut for Rented<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send> Drop for Rented<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put(value);
        }
    }
}
