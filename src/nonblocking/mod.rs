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

//! Nonblocking resource pools.
//!
//! A nonblocking pool never blocks the caller: [`Pool::get_auto_recycle`] and
//! [`Pool::get_auto_waste`] either deliver a [`Handle`] through a completion
//! callback posted on the given [`Executor`], or enqueue the request on an
//! expiring waiter queue. Waiters are served strictly first-in first-out;
//! each carries its own deadline, tracked by a single timer armed at the
//! earliest outstanding deadline.
//!
//! Slots start empty: the first caller to reserve one receives an empty
//! [`Handle`] and is expected to [`reset`](Handle::reset) a freshly built
//! value into it. Dropping a handle returns its slot with the disposition
//! chosen at acquisition, which also serves the oldest waiter.
//!
//! ## Examples
//!
//! ```
//! use std::sync::mpsc;
//! use std::time::Duration;
//!
//! use respool::executor::EventLoop;
//! use respool::nonblocking::Pool;
//! use respool::nonblocking::PoolConfig;
//!
//! let executor = EventLoop::new();
//! let pool = Pool::<String, EventLoop>::new(PoolConfig::new(4, 16));
//!
//! let (tx, rx) = mpsc::channel();
//! pool.get_auto_recycle(&executor, Duration::ZERO, move |result| {
//!     let mut handle = result.unwrap();
//!     handle.reset("connection".to_owned()).unwrap();
//!     assert_eq!(handle.get().unwrap(), "connection");
//!     drop(handle);
//!     tx.send(()).unwrap();
//! });
//!
//! rx.recv().unwrap();
//! assert_eq!(pool.available(), 1);
//! assert_eq!(pool.used(), 0);
//! ```

use std::fmt;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::MutexGuard;
use std::sync::Weak;
use std::time::Duration;

use crate::common::Disposition;
use crate::common::PoolStatus;
use crate::error::Error;
use crate::executor::Executor;
use crate::mutex::Mutex;
use crate::slot::SlotArena;
use crate::slot::SlotId;
use queue::OnExpired;
use queue::WaitQueue;

mod queue;

/// A boxed completion callback.
type Completion<T, E> = Box<dyn FnOnce(Result<Handle<T, E>, Error>) + Send + 'static>;

/// Invoked when a user completion panics.
type PanicHook = Arc<dyn Fn(Error) + Send + Sync + 'static>;

fn default_panic_hook() -> PanicHook {
    Arc::new(|err| {
        eprintln!("respool fatal error: {err}");
        std::process::abort();
    })
}

/// The configuration of [`Pool`].
#[derive(Clone)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Maximum number of slots of the [`Pool`].
    pub capacity: usize,

    /// Maximum number of waiters queued at once.
    ///
    /// A `get` that finds the queue full completes with
    /// [`Error::RequestQueueOverflow`].
    pub queue_capacity: usize,

    panic_hook: PanicHook,
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("capacity", &self.capacity)
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl PoolConfig {
    /// Creates a new [`PoolConfig`].
    pub fn new(capacity: usize, queue_capacity: usize) -> Self {
        Self {
            capacity,
            queue_capacity,
            panic_hook: default_panic_hook(),
        }
    }

    /// Returns a new [`PoolConfig`] with the specified panic hook.
    ///
    /// The hook receives [`Error::ClientHandlerPanic`] whenever a user
    /// completion panics. The default hook reports the error and aborts the
    /// process, since a panicking completion has already escaped its
    /// executor.
    pub fn with_panic_hook(mut self, hook: impl Fn(Error) + Send + Sync + 'static) -> Self {
        self.panic_hook = Arc::new(hook);
        self
    }
}

struct State<T> {
    slots: SlotArena<T>,
    disabled: bool,
}

/// A request parked in the waiter queue, or about to be.
struct PendingRequest<T: Send + 'static, E: Executor> {
    completion: Completion<T, E>,
    disposition: Disposition,
}

struct Core<T: Send + 'static, E: Executor> {
    state: Mutex<State<T>>,
    waiters: Arc<WaitQueue<E, PendingRequest<T, E>>>,
    panic_hook: PanicHook,
}

impl<T: Send + 'static, E: Executor> Core<T, E> {
    fn new(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                slots: SlotArena::new(config.capacity),
                disabled: false,
            }),
            waiters: WaitQueue::new(config.queue_capacity),
            panic_hook: config.panic_hook,
        })
    }

    fn get(
        self: &Arc<Self>,
        executor: &E,
        wait: Duration,
        disposition: Disposition,
        completion: Completion<T, E>,
    ) {
        let mut state = self.state.lock();
        if state.disabled {
            drop(state);
            self.post_completion(executor, completion, Err(Error::Disabled));
            return;
        }
        if let Some((id, value)) = state.slots.alloc_available() {
            drop(state);
            let handle = Handle::new(Arc::downgrade(self), id, value, disposition);
            self.post_completion(executor, completion, Ok(handle));
            return;
        }
        if state.slots.fit_capacity() {
            let id = state.slots.reserve();
            drop(state);
            let handle = Handle::new(Arc::downgrade(self), id, None, disposition);
            self.post_completion(executor, completion, Ok(handle));
            return;
        }
        drop(state);

        if wait == Duration::ZERO {
            self.post_completion(executor, completion, Err(Error::GetResourceTimeout));
            return;
        }

        let pending = PendingRequest {
            completion,
            disposition,
        };
        let hook = self.panic_hook.clone();
        let on_expired: OnExpired<PendingRequest<T, E>> = Box::new(move |pending| {
            run_completion(pending.completion, Err(Error::GetResourceTimeout), &hook);
        });
        match self.waiters.push(executor.clone(), pending, on_expired, wait) {
            Ok(()) => {
                // disable() may have drained the queue between the disabled
                // check above and this insert.
                if self.state.lock().disabled {
                    self.drain_disabled();
                }
            }
            Err(pending) => {
                self.post_completion(
                    executor,
                    pending.completion,
                    Err(Error::RequestQueueOverflow),
                );
            }
        }
    }

    fn recycle(self: &Arc<Self>, id: SlotId, value: Option<T>) {
        let mut state = self.state.lock();
        state.slots.recycle(id, value);
        self.serve_next(state);
    }

    fn waste(self: &Arc<Self>, id: SlotId) {
        let mut state = self.state.lock();
        state.slots.waste(id);
        self.serve_next(state);
    }

    /// Hands the capacity freed by a recycle or waste to the oldest waiter.
    ///
    /// The pool lock is held from the pop until the slot is reserved, so the
    /// waiter cannot race another acquisition; its completion is posted, not
    /// invoked.
    fn serve_next(self: &Arc<Self>, mut state: MutexGuard<'_, State<T>>) {
        if let Some((executor, pending)) = self.waiters.pop() {
            let (id, value) = match state.slots.alloc_available() {
                Some(found) => found,
                // The freed capacity is a hole left by waste; materialize an
                // empty cell for the waiter.
                None => (state.slots.reserve(), None),
            };
            drop(state);
            let handle = Handle::new(Arc::downgrade(self), id, value, pending.disposition);
            self.post_completion(&executor, pending.completion, Ok(handle));
        }
    }

    fn disable(self: &Arc<Self>) {
        self.state.lock().disabled = true;
        self.drain_disabled();
    }

    fn drain_disabled(self: &Arc<Self>) {
        while let Some((executor, pending)) = self.waiters.pop() {
            self.post_completion(&executor, pending.completion, Err(Error::Disabled));
        }
    }

    fn post_completion(
        &self,
        executor: &E,
        completion: Completion<T, E>,
        result: Result<Handle<T, E>, Error>,
    ) {
        let hook = self.panic_hook.clone();
        executor.post(Box::new(move || run_completion(completion, result, &hook)));
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
            wait_count: self.waiters.len(),
        }
    }
}

fn run_completion<T: Send + 'static, E: Executor>(
    completion: Completion<T, E>,
    result: Result<Handle<T, E>, Error>,
    hook: &PanicHook,
) {
    let outcome = catch_unwind(AssertUnwindSafe(move || completion(result)));
    if outcome.is_err() {
        hook.as_ref()(Error::ClientHandlerPanic);
    }
}

/// Generic nonblocking resource pool with a maximum size.
///
/// See the [module level documentation](self) for more.
pub struct Pool<T: Send + 'static, E: Executor> {
    core: Arc<Core<T, E>>,
}

impl<T: Send + 'static, E: Executor> fmt::Debug for Pool<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .finish()
    }
}

impl<T: Send + 'static, E: Executor> Pool<T, E> {
    /// Creates a new [`Pool`].
    ///
    /// # Panics
    ///
    /// Panics if the configured capacity is zero.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            core: Core::new(config),
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
    /// The completion is posted on `executor` with either a [`Handle`] or the
    /// failure. If no slot is free and `wait` is nonzero, the request waits
    /// in the queue for at most `wait`; `Duration::MAX` waits without
    /// deadline.
    pub fn get_auto_recycle(
        &self,
        executor: &E,
        wait: Duration,
        completion: impl FnOnce(Result<Handle<T, E>, Error>) + Send + 'static,
    ) {
        self.core
            .get(executor, wait, Disposition::Recycle, Box::new(completion));
    }

    /// Acquires a slot whose handle empties on drop.
    ///
    /// See [`Pool::get_auto_recycle`] for the completion contract.
    pub fn get_auto_waste(
        &self,
        executor: &E,
        wait: Duration,
        completion: impl FnOnce(Result<Handle<T, E>, Error>) + Send + 'static,
    ) {
        self.core
            .get(executor, wait, Disposition::Waste, Box::new(completion));
    }

    /// Shuts the pool down.
    ///
    /// Every queued waiter completes with [`Error::Disabled`], and every
    /// subsequent `get` fails the same way. Disabling is permanent.
    pub fn disable(&self) {
        self.core.disable();
    }
}

impl<T: Send + 'static, E: Executor> Drop for Pool<T, E> {
    fn drop(&mut self) {
        self.core.disable();
    }
}

/// Exclusive use of one slot, delivered through a completion callback.
///
/// Dropping the handle applies the disposition chosen at acquisition. The
/// handle holds only a weak reference to its pool: outliving the pool is
/// fine, and every operation on such an orphan fails with
/// [`Error::UnusableHandle`] instead of touching freed state.
pub struct Handle<T: Send + 'static, E: Executor> {
    core: Weak<Core<T, E>>,
    slot: Option<SlotId>,
    value: Option<T>,
    disposition: Disposition,
}

impl<T: Send + 'static, E: Executor> fmt::Debug for Handle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("unusable", &self.is_unusable())
            .field("empty", &self.is_empty())
            .field("disposition", &self.disposition)
            .finish()
    }
}

impl<T: Send + 'static, E: Executor> Handle<T, E> {
    fn new(core: Weak<Core<T, E>>, slot: SlotId, value: Option<T>, disposition: Disposition) -> Self {
        Self {
            core,
            slot: Some(slot),
            value,
            disposition,
        }
    }

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

impl<T: Send + 'static, E: Executor> Drop for Handle<T, E> {
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
