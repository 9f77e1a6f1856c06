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

use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::executor::Executor;
use crate::executor::ExecutorId;
use crate::executor::FireStatus;
use crate::executor::Task;
use crate::executor::Timer;
use crate::executor::TimerTask;
use crate::time;
use crate::time::TimePoint;

/// An [`Executor`] backed by a tokio runtime.
///
/// `post` spawns the task onto the runtime; timers are driven by
/// `tokio::time`. Each `TokioExecutor` counts as a distinct execution
/// context, even when two of them wrap the same runtime; clone the handle to
/// share one context.
#[derive(Clone)]
pub struct TokioExecutor {
    handle: Handle,
    id: ExecutorId,
}

impl TokioExecutor {
    /// Wraps the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            id: ExecutorId::next(),
        }
    }

    /// Wraps the runtime of the current async context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, as
    /// [`Handle::current`] does.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    type Timer = TokioTimer;

    fn id(&self) -> ExecutorId {
        self.id
    }

    fn post(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }

    fn timer(&self) -> TokioTimer {
        TokioTimer {
            handle: self.handle.clone(),
            cancel: None,
        }
    }
}

/// The single-shot timer of a [`TokioExecutor`].
///
/// Arming races a `tokio::time::sleep` against a oneshot cancellation
/// channel.
pub struct TokioTimer {
    handle: Handle,
    cancel: Option<oneshot::Sender<()>>,
}

impl TokioTimer {
    fn cancel_armed(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }
}

impl Timer for TokioTimer {
    fn arm_at(&mut self, deadline: TimePoint, on_fire: TimerTask) {
        self.cancel_armed();

        let (tx, rx) = oneshot::channel();
        self.cancel = Some(tx);

        let wait = deadline.saturating_duration_since(time::now());
        self.handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(wait) => on_fire(FireStatus::Fired),
                _ = rx => on_fire(FireStatus::Cancelled),
            }
        });
    }

    fn cancel(&mut self) {
        self.cancel_armed();
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel_armed();
    }
}
