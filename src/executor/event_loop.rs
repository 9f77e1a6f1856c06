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

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread;

use crate::executor::Executor;
use crate::executor::ExecutorId;
use crate::executor::FireStatus;
use crate::executor::Task;
use crate::executor::Timer;
use crate::executor::TimerTask;
use crate::mutex::Condvar;
use crate::mutex::Mutex;
use crate::time;
use crate::time::TimePoint;

type TimerKey = (TimePoint, u64);

struct LoopState {
    tasks: VecDeque<Task>,
    timers: BTreeMap<TimerKey, TimerTask>,
    next_timer_seq: u64,
    live_handles: usize,
}

struct Shared {
    state: Mutex<LoopState>,
    cond: Condvar,
}

/// A self-contained executor: one background thread draining a task queue
/// and a deadline-ordered timer map.
///
/// Cloning the handle is cheap; all clones drive the same thread and report
/// the same [`ExecutorId`]. When the last handle is dropped, the thread
/// drains its task backlog and exits; timers still pending at that point are
/// abandoned.
pub struct EventLoop {
    shared: Arc<Shared>,
    id: ExecutorId,
}

impl EventLoop {
    /// Spawns the loop thread and returns a handle to it.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(LoopState {
                tasks: VecDeque::new(),
                timers: BTreeMap::new(),
                next_timer_seq: 0,
                live_handles: 1,
            }),
            cond: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name("respool-event-loop".to_owned())
            .spawn(move || run(worker))
            .expect("failed to spawn event loop thread");

        Self {
            shared,
            id: ExecutorId::next(),
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLoop {
    fn clone(&self) -> Self {
        self.shared.state.lock().live_handles += 1;
        Self {
            shared: Arc::clone(&self.shared),
            id: self.id,
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.live_handles -= 1;
        if state.live_handles == 0 {
            drop(state);
            self.shared.cond.notify_all();
        }
    }
}

impl Executor for EventLoop {
    type Timer = EventLoopTimer;

    fn id(&self) -> ExecutorId {
        self.id
    }

    fn post(&self, task: Task) {
        let mut state = self.shared.state.lock();
        state.tasks.push_back(task);
        drop(state);
        self.shared.cond.notify_all();
    }

    fn timer(&self) -> EventLoopTimer {
        EventLoopTimer {
            shared: Arc::clone(&self.shared),
            armed: None,
        }
    }
}

fn run(shared: Arc<Shared>) {
    let mut state = shared.state.lock();
    loop {
        if let Some(task) = state.tasks.pop_front() {
            drop(state);
            run_callable(task);
            state = shared.state.lock();
            continue;
        }

        let now = time::now();
        let next_deadline = match state.timers.keys().next().copied() {
            Some(key) if key.0 <= now => {
                if let Some(on_fire) = state.timers.remove(&key) {
                    drop(state);
                    run_callable(Box::new(move || on_fire(FireStatus::Fired)));
                    state = shared.state.lock();
                }
                continue;
            }
            Some(key) => Some(key.0),
            None => None,
        };

        if state.live_handles == 0 {
            return;
        }

        state = match next_deadline {
            Some(deadline) if deadline < TimePoint::MAX => {
                let (guard, _) = shared
                    .cond
                    .wait_timeout(state, deadline.saturating_duration_since(now));
                guard
            }
            _ => shared.cond.wait(state),
        };
    }
}

fn run_callable(task: Task) {
    let result = catch_unwind(AssertUnwindSafe(task));
    if result.is_err() {
        cfg_log! {
            log::error!("task panicked on the event loop thread");
        }
        cfg_tracing! {
            tracing::error!("task panicked on the event loop thread");
        }
    }
}

/// The single-shot timer of an [`EventLoop`].
pub struct EventLoopTimer {
    shared: Arc<Shared>,
    armed: Option<TimerKey>,
}

impl EventLoopTimer {
    fn disarm(state: &mut LoopState, armed: Option<TimerKey>) {
        if let Some(key) = armed {
            if let Some(on_fire) = state.timers.remove(&key) {
                state
                    .tasks
                    .push_back(Box::new(move || on_fire(FireStatus::Cancelled)));
            }
        }
    }
}

impl Timer for EventLoopTimer {
    fn arm_at(&mut self, deadline: TimePoint, on_fire: TimerTask) {
        let mut state = self.shared.state.lock();
        Self::disarm(&mut state, self.armed.take());
        let key = (deadline, state.next_timer_seq);
        state.next_timer_seq += 1;
        state.timers.insert(key, on_fire);
        self.armed = Some(key);
        drop(state);
        self.shared.cond.notify_all();
    }

    fn cancel(&mut self) {
        let mut state = self.shared.state.lock();
        Self::disarm(&mut state, self.armed.take());
        drop(state);
        self.shared.cond.notify_all();
    }
}

impl Drop for EventLoopTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
