use crate::core::locks::NEXT_LOCK_ID;
#[cfg(feature = "logging")]
use crate::core::logger;
use crate::core::recorder::{self, ENABLED};
use crate::core::types::{LockId, LockName};
#[cfg(feature = "logging")]
use crate::core::types::{Events, get_current_thread_id};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::Ordering;
use std::time::Duration;

/// A reentrant mutex that records the order in which locks are taken
///
/// The Mutex wraps [`parking_lot::ReentrantMutex`] and, in debug builds, tells
/// the calling thread's recorder about every acquisition and release. The
/// thread that holds the lock may lock it again without blocking; every
/// [`MutexGuard`] must be dropped before other threads can get in.
///
/// Like any reentrant mutex it only hands out shared references; wrap the
/// data in a `Cell` or `RefCell` to mutate it.
///
/// # Example
///
/// ```rust
/// use locktree::Mutex;
/// use std::cell::Cell;
/// use std::sync::Arc;
/// use std::thread;
///
/// let counter = Arc::new(Mutex::with_name(Cell::new(0), "counter"));
/// let clone = Arc::clone(&counter);
///
/// thread::spawn(move || {
///     let guard = clone.lock();
///     guard.set(guard.get() + 1);
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(counter.lock().get(), 1);
/// ```
pub struct Mutex<T> {
    /// Unique identifier for this mutex
    id: LockId,
    /// Display name given at construction
    name: Option<LockName>,
    /// The wrapped mutex
    inner: ReentrantMutex<T>,
}

/// Guard for a [`Mutex`], records the release when dropped
pub struct MutexGuard<'a, T> {
    /// Lock that this guard is for
    lock_id: LockId,
    /// The inner guard, released after the release is recorded
    guard: ReentrantMutexGuard<'a, T>,
}

impl<T> Mutex<T> {
    /// Create a new unnamed Mutex with an automatically assigned ID
    ///
    /// # Example
    ///
    /// ```rust
    /// use locktree::Mutex;
    ///
    /// let first = Mutex::new(());
    /// let second = Mutex::new(());
    /// assert!(second.id() > first.id());
    /// ```
    pub fn new(value: T) -> Self {
        Self::create(value, None)
    }

    /// Create a new Mutex with a display name used in reports
    pub fn with_name(value: T, name: impl Into<LockName>) -> Self {
        Self::create(value, Some(name.into()))
    }

    fn create(value: T, name: Option<LockName>) -> Self {
        let id = NEXT_LOCK_ID.fetch_add(1, Ordering::SeqCst);

        #[cfg(feature = "logging")]
        if ENABLED {
            logger::log_lock_event(id, name.as_ref());
        }

        Mutex {
            id,
            name,
            inner: ReentrantMutex::new(value),
        }
    }

    /// Get the ID of this mutex
    pub fn id(&self) -> LockId {
        self.id
    }

    /// Get the display name of this mutex, if it has one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Acquire the lock, blocking until it is available
    ///
    /// The acquisition is recorded before blocking. Locking again from the
    /// thread that already holds the lock succeeds immediately.
    ///
    /// # Panics
    /// Panics if the thread's recorded lock path no longer matches its
    /// acquisition tree, which happens when guards were dropped out of
    /// nesting order and another lock is taken before the rest are released.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        if ENABLED {
            recorder::on_acquire(self.id, self.name.as_ref());
        }

        let guard = self.inner.lock();
        self.guard(guard)
    }

    /// Try to acquire the lock without blocking
    ///
    /// Nothing is recorded when the lock is held by another thread.
    ///
    /// # Example
    ///
    /// ```rust
    /// use locktree::Mutex;
    ///
    /// let mutex = Mutex::new(42);
    /// let outer = mutex.lock();
    /// // Same thread, so the reentrant lock is available
    /// let inner = mutex.try_lock().unwrap();
    /// assert_eq!(*inner, *outer);
    /// ```
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let guard = self.inner.try_lock()?;
        Some(self.record_and_guard(guard))
    }

    /// Try to acquire the lock, giving up after `timeout`
    ///
    /// Nothing is recorded when the attempt times out.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<MutexGuard<'_, T>> {
        let guard = self.inner.try_lock_for(timeout)?;
        Some(self.record_and_guard(guard))
    }

    fn record_and_guard<'a>(&'a self, guard: ReentrantMutexGuard<'a, T>) -> MutexGuard<'a, T> {
        if ENABLED {
            recorder::on_acquire(self.id, self.name.as_ref());
        }
        self.guard(guard)
    }

    fn guard<'a>(&'a self, guard: ReentrantMutexGuard<'a, T>) -> MutexGuard<'a, T> {
        #[cfg(feature = "logging")]
        if ENABLED {
            logger::log_interaction_event(get_current_thread_id(), self.id, Events::Acquired);
        }

        MutexGuard {
            lock_id: self.id,
            guard,
        }
    }

    /// Consumes this mutex, returning the underlying data
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Returns a mutable reference to the underlying data
    ///
    /// The mutable borrow statically guarantees no guard exists, so nothing is
    /// locked or recorded.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<T> MutexGuard<'_, T> {
    /// Get the ID of the mutex this guard holds
    pub fn lock_id(&self) -> LockId {
        self.lock_id
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.guard.deref()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if ENABLED {
            recorder::on_release(self.lock_id);

            #[cfg(feature = "logging")]
            logger::log_interaction_event(get_current_thread_id(), self.lock_id, Events::Released);
        }
        // `guard` is dropped after this, releasing the primitive
    }
}

impl<T: fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// Trait implementations for better compatibility with std

impl<T: Default> Default for Mutex<T> {
    /// Creates a `Mutex<T>`, with the Default value for T
    fn default() -> Mutex<T> {
        Mutex::new(Default::default())
    }
}

impl<T> From<T> for Mutex<T> {
    /// Creates a new mutex in an unlocked state ready for use
    /// This is equivalent to Mutex::new
    fn from(t: T) -> Self {
        Mutex::new(t)
    }
}
