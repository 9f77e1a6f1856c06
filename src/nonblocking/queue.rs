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
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use crate::executor::Executor;
use crate::executor::ExecutorId;
use crate::executor::FireStatus;
use crate::executor::Timer;
use crate::executor::TimerTask;
use crate::mutex::Mutex;
use crate::time;
use crate::time::TimePoint;

/// Invoked with the request payload when a waiter's deadline passes. Always
/// posted on the waiter's own executor, never called inline.
pub(crate) type OnExpired<R> = Box<dyn FnOnce(R) + Send + 'static>;

/// Deadline-map key: the deadline plus an insertion sequence to break ties.
type DeadlineKey = (TimePoint, u64);

struct Waiter<E, R> {
    executor: E,
    request: R,
    on_expired: OnExpired<R>,
    deadline_key: DeadlineKey,
}

struct Inner<E: Executor, R> {
    /// Arena of waiter nodes; FIFO and deadline map reference it by index.
    arena: Vec<Option<Waiter<E, R>>>,
    /// Indices whose FIFO entry has been consumed and may be reused.
    reusable: Vec<usize>,
    /// Arrival order. An index whose arena node is gone is a tombstone left
    /// by expiry; `pop` skips and reclaims it.
    fifo: VecDeque<usize>,
    /// Live waiters keyed by deadline.
    by_deadline: BTreeMap<DeadlineKey, usize>,
    /// One single-shot timer per distinct executor seen in the queue.
    timers: HashMap<ExecutorId, E::Timer>,
    next_seq: u64,
}

/// The FIFO of pending acquisitions with per-waiter deadlines.
///
/// A single mutex guards the arena, the FIFO, the deadline map, and the
/// timers; every structural change re-arms the timer of the earliest waiter
/// before the lock is released. The timer callback holds only a weak
/// reference, so an armed timer never keeps the queue alive.
pub(crate) struct WaitQueue<E: Executor, R> {
    inner: Mutex<Inner<E, R>>,
    capacity: usize,
}

impl<E: Executor, R: Send + 'static> WaitQueue<E, R> {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                arena: Vec::new(),
                reusable: Vec::new(),
                fifo: VecDeque::new(),
                by_deadline: BTreeMap::new(),
                timers: HashMap::new(),
                next_seq: 0,
            }),
            capacity,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of pending waiters.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().by_deadline.len()
    }

    /// Enqueues a waiter expiring `wait` from now. On overflow the request
    /// payload is handed back.
    pub(crate) fn push(
        self: &Arc<Self>,
        executor: E,
        request: R,
        on_expired: OnExpired<R>,
        wait: Duration,
    ) -> Result<(), R> {
        let mut inner = self.inner.lock();
        if inner.by_deadline.len() >= self.capacity() {
            return Err(request);
        }

        let deadline_key = (time::now().saturating_add(wait), inner.next_seq);
        inner.next_seq += 1;

        let waiter = Waiter {
            executor,
            request,
            on_expired,
            deadline_key,
        };
        let index = match inner.reusable.pop() {
            Some(index) => {
                inner.arena[index] = Some(waiter);
                index
            }
            None => {
                inner.arena.push(Some(waiter));
                inner.arena.len() - 1
            }
        };
        inner.fifo.push_back(index);
        inner.by_deadline.insert(deadline_key, index);

        self.update_timer(&mut inner);
        Ok(())
    }

    /// Dequeues the oldest waiter. Its expiration machinery is removed
    /// atomically, so the returned request can no longer expire.
    pub(crate) fn pop(self: &Arc<Self>) -> Option<(E, R)> {
        let mut inner = self.inner.lock();
        loop {
            let index = inner.fifo.pop_front()?;
            let waiter = match inner.arena[index].take() {
                Some(waiter) => waiter,
                None => {
                    // Tombstone left by an expired waiter.
                    inner.reusable.push(index);
                    continue;
                }
            };
            inner.reusable.push(index);
            inner.by_deadline.remove(&waiter.deadline_key);
            self.update_timer(&mut inner);
            return Some((waiter.executor, waiter.request));
        }
    }

    /// Expires every waiter whose deadline is at or before `expires_at`,
    /// posting its `on_expired` on the executor captured at enqueue time.
    fn cancel(self: &Arc<Self>, expires_at: TimePoint) {
        let mut inner = self.inner.lock();
        let expired: Vec<(DeadlineKey, usize)> = inner
            .by_deadline
            .range(..=(expires_at, u64::MAX))
            .map(|(&key, &index)| (key, index))
            .collect();

        for (key, index) in expired {
            inner.by_deadline.remove(&key);
            if let Some(waiter) = inner.arena[index].take() {
                // The FIFO entry stays behind as a tombstone; the index is
                // not reusable until `pop` consumes it.
                let Waiter {
                    executor,
                    request,
                    on_expired,
                    ..
                } = waiter;
                executor.post(Box::new(move || on_expired(request)));
            }
        }

        self.update_timer(&mut inner);
    }

    /// Re-arms the timer of the earliest waiter's executor, or cancels and
    /// releases every timer when the queue is empty.
    fn update_timer(self: &Arc<Self>, inner: &mut Inner<E, R>) {
        let (key, index) = match inner.by_deadline.iter().next() {
            Some((&key, &index)) => (key, index),
            None => {
                for timer in inner.timers.values_mut() {
                    timer.cancel();
                }
                inner.timers.clear();
                return;
            }
        };

        let executor = match inner.arena[index].as_ref() {
            Some(waiter) => waiter.executor.clone(),
            None => return,
        };

        let deadline = key.0;
        let weak = Arc::downgrade(self);
        let on_fire: TimerTask = Box::new(move |status| {
            if status == FireStatus::Cancelled {
                return;
            }
            if let Some(queue) = weak.upgrade() {
                queue.cancel(deadline);
            }
        });

        let timer = inner
            .timers
            .entry(executor.id())
            .or_insert_with(|| executor.timer());
        timer.arm_at(deadline, on_fire);
    }
}
