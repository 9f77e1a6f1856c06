// Copyright 2025 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking resource pools.
//!
//! A blocking pool hands out slots synchronously: [`Pool::get_auto_recycle`]
//! and [`Pool::get_auto_waste`] return a [`Handle`] immediately when a slot
//! is free, and otherwise block the calling thread on a condition variable
//! until a slot is returned, the wait duration elapses, or the pool is
//! disabled. `Duration::MAX` waits without deadline. The order in which
//! blocked threads are served follows the condition variable's wake order,
//! so it is first-in first-out only on a best-effort basis.
//!
//! Slots start empty: the first caller to reserve one receives an empty
//! [`Handle`] and is expected to [`reset`](Handle::reset) a freshly built
//! value into it. Dropping a handle returns its slot with the disposition
//! chosen at acquisition.
//!
//! ## Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use respool::blocking::Pool;
//!
//! let pool = Pool::new(4);
//!
//! let mut handle = pool.get_auto_recycle(Duration::ZERO).unwrap();
//! assert!(handle.is_empty());
//! handle.reset("connection".to_owned()).unwrap();
//! drop(handle);
//!
//! // The recycled value is handed out again.
//! let handle = pool.get_auto_recycle(Duration::ZERO).unwrap();
//! assert_eq!(handle.get().unwrap(), "connection");
//! ```
//!
//! An exhausted pool makes callers wait:
//!
//! ```
//! use std::time::Duration;
//!
//! use respool::blocking::Pool;
//! use respool::Error;
//!
//! let pool = Pool::<u32>::new(1);
//! let _held = pool.get_auto_recycle(Duration::ZERO).unwrap();
//!
//! let err = pool.get_auto_recycle(Duration::from_millis(10)).unwrap_err();
//! assert_eq!(err, Error::GetResourceTimeout);
//! ```

use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use crate::common::Disposition;
use crate::common::PoolStatus;
use crate::error::Error;
use crate::mutex::Condvar;
use crate::mutex::Mutex;
use crate::slot::SlotArena;
use crate::slot::SlotId;
use crate::time;
use crate::time::TimePoint;

struct State<T> {
    slots: SlotArena<T>,
    disabled: bool,
}

struct Core<T> {
    state: Mutex<State<T>>,
    has_capacity: Condvar,
    wait_count: AtomicUsize,
}

impl<T> Core<T> {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                slots: SlotArena::new(capacity),
                disabled: false,
            }),
            has_capacity: Condvar::new(),
            wait_count: AtomicUsize::new(0),
        })
    }

    fn get(&self, wait: Duration) -> Result<(SlotId, Option<T>), Error> {
        let deadline = time::now().saturating_add(wait);
        let mut state = self.state.lock();

        loop {
            if state.disabled {
                return Err(Error::Disabled);
            }
            if let Some(found) = state.slots.alloc_available() {
                return Ok(found);
            }
            if state.slots.fit_capacity() {
                return Ok((state.slots.reserve(), None));
            }

            let now = time::now();
            if now >= deadline {
                return Err(Error::GetResourceTimeout);
            }

            self.wait_count.fetch_add(1, Ordering::Relaxed);
            let _waiting = scopeguard::guard((), |()| {
                self.wait_count.fetch_sub(1, Ordering::Relaxed);
            });

            // A wake-up only means the predicate is worth re-evaluating; the
            // loop decides whether the wait is over.
            state = if deadline == TimePoint::MAX {
                self.has_capacity.wait(state)
            } else {
                let remaining = deadline.saturating_duration_since(now);
                self.has_capacity.wait_timeout(state, remaining).0
            };
        }
    }

    fn recycle(&self, id: SlotId, value: Option<T>) {
        let mut state = self.state.lock();
        state.slots.recycle(id, value);
        drop(state);
        self.has_capacity.notify_one();
    }

    fn waste(&self, id: SlotId) {
        let mut state = self.state.lock();
        state.slots.waste(id);
        drop(state);
        self.has_capacity.notify_one();
    }

    fn disable(&self) {
        self.state.lock().disabled = true;
        self.has_capacity.notify_all();
    }

    fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        let (capacity, size, available, used) = (
            state.slots.capacity(),
            state.slots.size(),
            state.slots.available(),
            state.slots.used(),
        );
        drop(state);

        PoolStatus {
            capacity,
            size,
            available,
            used,
            wait_count: self.wait_count.load(Ordering::Relaxed),
        }
    }
}

/// Generic blocking resource pool with a maximum size.
///
/// See the [module level documentation](self) for more.
pub struct Pool<T> {
    core: Arc<Core<T>>,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Pool<T> {
    /// Creates a new [`Pool`] with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            core: Core::new(capacity),
        }
    }

    /// Returns the maximum number of slots.
    pub fn capacity(&self) -> usize {
        self.core.state.lock().slots.capacity()
    }

    /// Returns the number of live slots, available plus in-use.
    pub fn size(&self) -> usize {
        self.core.state.lock().slots.size()
    }

    /// Returns the number of slots ready to be handed out.
    pub fn available(&self) -> usize {
        self.core.state.lock().slots.available()
    }

    /// Returns the number of slots currently held by handles.
    pub fn used(&self) -> usize {
        self.core.state.lock().slots.used()
    }

    /// Returns the current status of the pool.
    ///
    /// The numbers are not guaranteed to be mutually consistent under heavy
    /// load; they are meant for an overall insight.
    pub fn status(&self) -> PoolStatus {
        self.core.status()
    }

    /// Acquires a slot whose handle recycles on drop.
    ///
    /// Blocks for at most `wait` when the pool is exhausted;
    /// `Duration::MAX` waits without deadline.
    pub fn get_auto_recycle(&self, wait: Duration) -> Result<Handle<T>, Error> {
        self.get_handle(Disposition::Recycle, wait)
    }

    /// Acquires a slot whose handle empties on drop.
    ///
    /// Blocks for at most `wait` when the pool is exhausted;
    /// `Duration::MAX` waits without deadline.
    pub fn get_auto_waste(&self, wait: Duration) -> Result<Handle<T>, Error> {
        self.get_handle(Disposition::Waste, wait)
    }

    /// Shuts the pool down.
    ///
    /// Every blocked caller wakes up with [`Error::Disabled`], and every
    /// subsequent `get` fails the same way. Disabling is permanent.
    pub fn disable(&self) {
        self.core.disable();
    }

    fn get_handle(&self, disposition: Disposition, wait: Duration) -> Result<Handle<T>, Error> {
        let (id, value) = self.core.get(wait)?;
        Ok(Handle {
            core: Arc::downgrade(&self.core),
            slot: Some(id),
            value,
            disposition,
        })
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.core.disable();
    }
}

/// Exclusive use of one slot of a blocking [`Pool`].
///
/// Dropping the handle applies the disposition chosen at acquisition. The
/// handle holds only a weak reference to its pool: outliving the pool is
/// fine, and every operation on such an orphan fails with
/// [`Error::UnusableHandle`] instead of touching freed state.
pub struct Handle<T> {
    core: Weak<Core<T>>,
    slot: Option<SlotId>,
    value: Option<T>,
    disposition: Disposition,
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("unusable", &self.is_unusable())
            .field("empty", &self.is_empty())
            .field("disposition", &self.disposition)
            .finish()
    }
}

impl<T> Handle<T> {
    /// Whether the handle can no longer operate on its slot: it was already
    /// recycled or wasted, or the pool has been dropped.
    pub fn is_unusable(&self) -> bool {
        self.slot.is_none() || self.core.strong_count() == 0
    }

    /// Whether the handle holds no value.
    pub fn is_empty(&self) -> bool {
        self.is_unusable() || self.value.is_none()
    }

    /// Returns the resource value.
    pub fn get(&self) -> Result<&T, Error> {
        if self.is_unusable() {
            return Err(Error::UnusableHandle);
        }
        self.value.as_ref().ok_or(Error::EmptyHandle)
    }

    /// Returns the resource value mutably.
    pub fn get_mut(&mut self) -> Result<&mut T, Error> {
        if self.is_unusable() {
            return Err(Error::UnusableHandle);
        }
        self.value.as_mut().ok_or(Error::EmptyHandle)
    }

    /// Places a freshly built value into the handle, returning the displaced
    /// one, if any.
    pub fn reset(&mut self, value: T) -> Result<Option<T>, Error> {
        if self.is_unusable() {
            return Err(Error::UnusableHandle);
        }
        Ok(self.value.replace(value))
    }

    /// Returns the slot to the pool with its value preserved, regardless of
    /// the disposition chosen at acquisition. The handle becomes unusable.
    pub fn recycle(&mut self) -> Result<(), Error> {
        let id = self.slot.take().ok_or(Error::UnusableHandle)?;
        let value = self.value.take();
        if let Some(core) = self.core.upgrade() {
            core.recycle(id, value);
        }
        Ok(())
    }

    /// Returns the slot to the pool empty, discarding the value. The handle
    /// becomes unusable.
    pub fn waste(&mut self) -> Result<(), Error> {
        let id = self.slot.take().ok_or(Error::UnusableHandle)?;
        self.value = None;
        if let Some(core) = self.core.upgrade() {
            core.waste(id);
        }
        Ok(())
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(id) = self.slot.take() {
            if let Some(core) = self.core.upgrade() {
                match self.disposition {
                    Disposition::Recycle => core.recycle(id, self.value.take()),
                    Disposition::Waste => {
                        self.value = None;
                        core.waste(id);
                    }
                }
            } else {
                cfg_log! {
                    log::error!("pool was dropped before its handle; the resource is discarded");
                }
                cfg_tracing! {
                    tracing::error!("pool was dropped before its handle; the resource is discarded");
                }
            }
        }
    }
}
