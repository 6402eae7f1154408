//! A bounded pool of resource handles.
//!
//! The pool owns `capacity` units, numbered `1..=capacity`, and dispenses them
//! highest first. Acquisition never blocks: an exhausted pool answers `None`.
//! Units are returned with [`BoundedPool::release`] or by dropping a
//! [`HandleGuard`].
//!
//! # Examples
//!
//! ```
//! use singleton_pool::BoundedPool;
//!
//! let pool = BoundedPool::new(2);
//! let first = pool.acquire().unwrap();
//! let _second = pool.acquire().unwrap();
//! assert!(pool.acquire().is_none());
//!
//! pool.release(first).unwrap();
//! assert_eq!(pool.available(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::PoolError;

/// Capacity of a pool built with [`BoundedPool::default`].
pub const DEFAULT_CAPACITY: usize = 5;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// One checked-out unit of a pool's capacity.
///
/// Handles are plain tokens. Copying one does not create capacity: each
/// checkout is stamped, and a pool accepts the release of a unit only from the
/// handle of its current checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pool: u64,
    unit: usize,
    checkout: u64,
}

impl Handle {
    pub(crate) fn new(pool: u64, unit: usize, checkout: u64) -> Self {
        Self {
            pool,
            unit,
            checkout,
        }
    }

    /// Id of the pool that issued this handle.
    pub fn pool_id(&self) -> u64 {
        self.pool
    }

    /// Unit number in `1..=capacity`.
    pub fn unit(&self) -> usize {
        self.unit
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle {} of pool {}", self.unit, self.pool)
    }
}

// Memory grows with the number of units in circulation, not with capacity.
#[derive(Debug)]
struct PoolState {
    // Units `1..=next_fresh` have never been dispensed.
    next_fresh: usize,
    // Returned units; the top is dispensed before any fresh unit.
    free: Vec<usize>,
    // Checkout stamp of every unit currently checked out.
    checkouts: HashMap<usize, u64>,
    next_checkout: u64,
}

impl PoolState {
    fn available(&self) -> usize {
        self.next_fresh + self.free.len()
    }
}

/// Dispenses at most `capacity` handles to concurrent callers.
#[derive(Debug)]
pub struct BoundedPool {
    id: u64,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl BoundedPool {
    /// Creates a pool with every unit available.
    ///
    /// A capacity of zero is allowed; every acquisition on such a pool is
    /// exhausted.
    pub fn new(capacity: usize) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        debug!(pool = id, capacity, "created bounded pool");

        Self {
            id,
            capacity,
            state: Mutex::new(PoolState {
                next_fresh: capacity,
                free: Vec::new(),
                checkouts: HashMap::new(),
                next_checkout: 0,
            }),
        }
    }

    // Every critical section leaves the state consistent before it could
    // panic, so a poisoned lock is safe to recover.
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Takes one unit of capacity, or returns `None` when the pool is exhausted.
    pub fn acquire(&self) -> Option<Handle> {
        let mut state = self.state();
        let unit = match state.free.pop() {
            Some(unit) => unit,
            None if state.next_fresh > 0 => {
                let unit = state.next_fresh;
                state.next_fresh -= 1;
                unit
            }
            None => {
                drop(state);
                trace!(pool = self.id, capacity = self.capacity, "pool exhausted");
                return None;
            }
        };
        let checkout = state.next_checkout;
        state.next_checkout += 1;
        state.checkouts.insert(unit, checkout);
        let available = state.available();
        drop(state);

        debug!(pool = self.id, unit, available, "acquired unit");
        Some(Handle::new(self.id, unit, checkout))
    }

    /// Like [`acquire`](Self::acquire), but reports exhaustion as
    /// [`PoolError::Exhausted`].
    pub fn try_acquire(&self) -> Result<Handle, PoolError> {
        self.acquire().ok_or(PoolError::Exhausted {
            capacity: self.capacity,
        })
    }

    /// Takes one unit wrapped in a guard that releases it on drop.
    ///
    /// # Examples
    ///
    /// ```
    /// use singleton_pool::BoundedPool;
    ///
    /// let pool = BoundedPool::new(1);
    /// {
    ///     let guard = pool.acquire_guard().unwrap();
    ///     assert_eq!(guard.unit(), 1);
    ///     assert!(pool.acquire().is_none());
    /// }
    /// assert_eq!(pool.available(), 1);
    /// ```
    pub fn acquire_guard(&self) -> Option<HandleGuard<'_>> {
        self.acquire()
            .map(|handle| HandleGuard { pool: self, handle })
    }

    /// Returns a checked-out unit to the pool.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidRelease`] if the handle was issued by another pool,
    /// or it does not belong to the unit's current checkout (double release,
    /// or a stale copy of a unit that has since been acquired again).
    pub fn release(&self, handle: Handle) -> Result<(), PoolError> {
        if handle.pool != self.id || handle.unit == 0 || handle.unit > self.capacity {
            warn!(pool = self.id, %handle, "rejected release of foreign handle");
            return Err(PoolError::InvalidRelease { handle });
        }

        let mut state = self.state();
        if state.checkouts.get(&handle.unit) != Some(&handle.checkout) {
            drop(state);
            warn!(pool = self.id, %handle, "rejected release of unit not checked out");
            return Err(PoolError::InvalidRelease { handle });
        }
        state.checkouts.remove(&handle.unit);
        state.free.push(handle.unit);
        let available = state.available();
        drop(state);

        debug!(pool = self.id, unit = handle.unit, available, "released unit");
        Ok(())
    }

    /// Process-unique id of this pool.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of units that can currently be acquired.
    pub fn available(&self) -> usize {
        self.state().available()
    }

    /// Number of units currently checked out.
    pub fn outstanding(&self) -> usize {
        self.capacity - self.available()
    }
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A checked-out unit that is released when the guard is dropped.
#[derive(Debug)]
pub struct HandleGuard<'a> {
    pool: &'a BoundedPool,
    handle: Handle,
}

impl HandleGuard<'_> {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn unit(&self) -> usize {
        self.handle.unit()
    }

    /// Detaches the handle; the caller becomes responsible for releasing it.
    pub fn into_handle(self) -> Handle {
        let handle = self.handle;
        std::mem::forget(self);
        handle
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        // A copy of the handle may have been released by hand already, in
        // which case the stale checkout is rejected and nothing changes.
        if self.pool.release(self.handle).is_err() {
            trace!(pool = self.pool.id, handle = %self.handle, "guard dropped with stale checkout");
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------
