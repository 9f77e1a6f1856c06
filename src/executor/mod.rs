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

//! The executor seam of the nonblocking pool.
//!
//! The pool needs two capabilities from the reactor that drives it: schedule
//! a callable to run once without blocking the caller ([`Executor::post`]),
//! and wait until a time point with cancellation ([`Timer`]). Everything else
//! about the reactor is out of scope.
//!
//! Two implementations ship with the crate: [`EventLoop`], a self-contained
//! background-thread run loop, and, behind the `rt-tokio` feature,
//! [`TokioExecutor`], which adapts a [`tokio`] runtime handle.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::time::TimePoint;

pub use event_loop::EventLoop;
pub use event_loop::EventLoopTimer;
#[cfg(feature = "rt-tokio")]
pub use self::tokio::TokioExecutor;
#[cfg(feature = "rt-tokio")]
pub use self::tokio::TokioTimer;

mod event_loop;
#[cfg(feature = "rt-tokio")]
mod tokio;

/// A callable scheduled to run once on an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The callback armed on a [`Timer`], invoked exactly once with the wait
/// outcome.
pub type TimerTask = Box<dyn FnOnce(FireStatus) + Send + 'static>;

/// Identity of an execution context.
///
/// The waiter queue keys its timers by this value, so all clones of one
/// executor handle must report the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExecutorId(u64);

impl ExecutorId {
    /// Allocates a process-unique id.
    pub fn next() -> ExecutorId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ExecutorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The outcome a [`Timer`] delivers to its armed callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FireStatus {
    /// The deadline was reached.
    Fired,
    /// The wait was cancelled, by [`Timer::cancel`] or by re-arming.
    Cancelled,
}

/// A mechanism capable of running a callable later, possibly on another
/// thread.
pub trait Executor: Clone + Send + Sync + 'static {
    /// The single-shot timer type bound to this executor.
    type Timer: Timer;

    /// Returns the identity of the underlying execution context. All clones
    /// of one handle report the same id.
    fn id(&self) -> ExecutorId;

    /// Schedules `task` to run once, without blocking the caller.
    fn post(&self, task: Task);

    /// Creates a new, unarmed single-shot timer.
    fn timer(&self) -> Self::Timer;
}

/// A single-shot wait until a time point.
pub trait Timer: Send + 'static {
    /// Arms the timer to fire at `deadline`, invoking `on_fire` with
    /// [`FireStatus::Fired`] once the deadline is reached.
    ///
    /// Arming an already armed timer cancels the outstanding wait first: its
    /// callback is delivered with [`FireStatus::Cancelled`].
    fn arm_at(&mut self, deadline: TimePoint, on_fire: TimerTask);

    /// Transitions any pending firing to [`FireStatus::Cancelled`].
    fn cancel(&mut self);
}
