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

use std::sync::mpsc;
use std::thread::ThreadId;
use std::time::Duration;
use std::time::Instant;

use respool::executor::EventLoop;
use respool::executor::Executor;
use respool::nonblocking::Handle;
use respool::nonblocking::Pool;
use respool::nonblocking::PoolConfig;
use respool::Error;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Acquires a handle and ships it back to the test thread.
fn acquire(
    pool: &Pool<String, EventLoop>,
    executor: &EventLoop,
    wait: Duration,
) -> Result<Handle<String, EventLoop>, Error> {
    let (tx, rx) = mpsc::channel();
    pool.get_auto_recycle(executor, wait, move |result| tx.send(result).unwrap());
    rx.recv_timeout(RECV_TIMEOUT).unwrap()
}

fn loop_thread_id(executor: &EventLoop) -> ThreadId {
    let (tx, rx) = mpsc::channel();
    executor.post(Box::new(move || {
        tx.send(std::thread::current().id()).unwrap();
    }));
    rx.recv_timeout(RECV_TIMEOUT).unwrap()
}

/// An empty pool delivers an empty handle through the completion; dropping
/// it recycles the slot.
#[test]
fn test_immediate_acquire_and_recycle() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let mut handle = acquire(&pool, &executor, Duration::ZERO).unwrap();
    assert!(handle.is_empty());
    assert_eq!(pool.used(), 1);

    handle.reset("resource".to_owned()).unwrap();
    drop(handle);
    assert_eq!(pool.available(), 1);
    assert_eq!(pool.used(), 0);

    let handle = acquire(&pool, &executor, Duration::ZERO).unwrap();
    assert_eq!(handle.get().unwrap(), "resource");
}

/// Queued waiters are served strictly in arrival order as the slot cycles.
#[test]
fn test_waiters_are_served_fifo() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 3));

    let held = acquire(&pool, &executor, Duration::ZERO).unwrap();

    let (tx, rx) = mpsc::channel();
    for tag in 1..=3 {
        let tx = tx.clone();
        pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
            // The handle drops here, which serves the next waiter in line.
            result.unwrap();
            tx.send(tag).unwrap();
        });
    }
    assert_eq!(pool.status().wait_count, 3);

    drop(held);
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), 1);
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), 2);
    assert_eq!(rx.recv_timeout(RECV_TIMEOUT).unwrap(), 3);
    assert_eq!(pool.status().wait_count, 0);
}

/// A waiter expires with a timeout when no slot is freed in time.
#[test]
fn test_waiter_times_out() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let _held = acquire(&pool, &executor, Duration::ZERO).unwrap();

    let started = Instant::now();
    let err = acquire(&pool, &executor, Duration::from_millis(100)).unwrap_err();
    assert_eq!(err, Error::GetResourceTimeout);
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(pool.status().wait_count, 0);
}

/// A zero wait on an exhausted pool completes immediately with a timeout.
#[test]
fn test_zero_wait_completes_immediately() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let _held = acquire(&pool, &executor, Duration::ZERO).unwrap();
    let err = acquire(&pool, &executor, Duration::ZERO).unwrap_err();
    assert_eq!(err, Error::GetResourceTimeout);
}

/// Waiters beyond the queue capacity are rejected on the spot.
#[test]
fn test_queue_overflow() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 2));

    let _held = acquire(&pool, &executor, Duration::ZERO).unwrap();

    let (tx, rx) = mpsc::channel();
    for tag in 1..=3 {
        let tx = tx.clone();
        pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
            tx.send((tag, result.map(drop))).unwrap();
        });
    }

    let (tag, result) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(tag, 3);
    assert_eq!(result.unwrap_err(), Error::RequestQueueOverflow);
    assert_eq!(pool.status().wait_count, 2);

    pool.disable();
    for _ in 0..2 {
        let (_, result) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(result.unwrap_err(), Error::Disabled);
    }
}

/// `disable` delivers a terminal status to every queued waiter and to every
/// later acquisition.
#[test]
fn test_disable_drains_waiters() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let _held = acquire(&pool, &executor, Duration::ZERO).unwrap();

    let (tx, rx) = mpsc::channel();
    for _ in 0..3 {
        let tx = tx.clone();
        pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
            tx.send(result.map(drop)).unwrap();
        });
    }
    assert_eq!(pool.status().wait_count, 3);

    pool.disable();
    for _ in 0..3 {
        let result = rx.recv_timeout(RECV_TIMEOUT).unwrap();
        assert_eq!(result.unwrap_err(), Error::Disabled);
    }

    let err = acquire(&pool, &executor, Duration::ZERO).unwrap_err();
    assert_eq!(err, Error::Disabled);
}

/// Dropping the pool facade behaves like `disable`: pending waiters are not
/// leaked.
#[test]
fn test_drop_pool_delivers_disabled() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let held = acquire(&pool, &executor, Duration::ZERO).unwrap();

    let (tx, rx) = mpsc::channel();
    pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
        tx.send(result.map(drop)).unwrap();
    });

    drop(pool);
    let result = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.unwrap_err(), Error::Disabled);

    // The held handle is now an orphan; dropping it is a no-op.
    drop(held);
}

/// A slot wasted while a waiter is queued serves that waiter with an empty
/// slot.
#[test]
fn test_waste_serves_waiter_with_empty_slot() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let (tx, rx) = mpsc::channel();
    pool.get_auto_waste(&executor, Duration::ZERO, move |result| {
        tx.send(result).unwrap();
    });
    let mut held = rx.recv_timeout(RECV_TIMEOUT).unwrap().unwrap();
    held.reset("resource".to_owned()).unwrap();

    let (tx, rx) = mpsc::channel();
    pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
        tx.send(result).unwrap();
    });

    drop(held);
    let handle = rx.recv_timeout(RECV_TIMEOUT).unwrap().unwrap();
    assert!(handle.is_empty());
}

/// Completions and expirations run on the executor given at enqueue time,
/// also when several executors share one pool.
#[test]
fn test_completions_run_on_their_own_executor() {
    let executor1 = EventLoop::new();
    let executor2 = EventLoop::new();
    let thread1 = loop_thread_id(&executor1);
    let thread2 = loop_thread_id(&executor2);
    assert_ne!(thread1, thread2);

    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));
    let held = acquire(&pool, &executor1, Duration::ZERO).unwrap();

    let (tx, rx) = mpsc::channel();
    let tx1 = tx.clone();
    pool.get_auto_recycle(&executor1, Duration::from_secs(60), move |result| {
        result.unwrap();
        tx1.send((1, std::thread::current().id())).unwrap();
    });
    pool.get_auto_recycle(&executor2, Duration::from_secs(60), move |result| {
        result.unwrap();
        tx.send((2, std::thread::current().id())).unwrap();
    });

    drop(held);
    // The two completions run on distinct loop threads, so their arrival
    // order here is not fixed.
    let mut results: Vec<(i32, ThreadId)> = (0..2)
        .map(|_| rx.recv_timeout(RECV_TIMEOUT).unwrap())
        .collect();
    results.sort_by_key(|(tag, _)| *tag);
    assert_eq!(results, vec![(1, thread1), (2, thread2)]);
}

/// A waiter whose deadline is driven by another executor's timer still
/// expires on its own executor.
#[test]
fn test_expiry_is_posted_on_the_waiters_executor() {
    let executor1 = EventLoop::new();
    let executor2 = EventLoop::new();
    let thread2 = loop_thread_id(&executor2);

    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));
    let _held = acquire(&pool, &executor1, Duration::ZERO).unwrap();

    // The earliest deadline belongs to executor1's waiter, so executor1's
    // timer fires first; the second waiter must still expire on its own
    // executor.
    let (tx1, rx1) = mpsc::channel();
    pool.get_auto_recycle(&executor1, Duration::from_millis(50), move |result| {
        tx1.send(result.map(drop)).unwrap();
    });
    let (tx2, rx2) = mpsc::channel();
    pool.get_auto_recycle(&executor2, Duration::from_millis(60), move |result| {
        tx2.send((result.map(drop), std::thread::current().id())).unwrap();
    });

    assert_eq!(
        rx1.recv_timeout(RECV_TIMEOUT).unwrap().unwrap_err(),
        Error::GetResourceTimeout
    );
    let (result, thread) = rx2.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(result.unwrap_err(), Error::GetResourceTimeout);
    assert_eq!(thread, thread2);
}

/// A panicking completion is contained and reported to the panic hook.
#[test]
fn test_panic_in_completion_reports_hook() {
    let executor = EventLoop::new();
    let (hook_tx, hook_rx) = mpsc::channel();
    let config = PoolConfig::new(1, 4).with_panic_hook(move |err| hook_tx.send(err).unwrap());
    let pool = Pool::<String, EventLoop>::new(config);

    pool.get_auto_recycle(&executor, Duration::ZERO, |_result| {
        panic!("completion panicked on purpose");
    });

    assert_eq!(
        hook_rx.recv_timeout(RECV_TIMEOUT).unwrap(),
        Error::ClientHandlerPanic
    );
    // The handle was dropped by the unwind, so the slot went back.
    assert_eq!(pool.available(), 1);
    assert_eq!(pool.used(), 0);
}

/// A handle delivered before the pool was dropped degrades into an orphan.
#[test]
fn test_handle_outlives_pool() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(1, 4));

    let mut handle = acquire(&pool, &executor, Duration::ZERO).unwrap();
    handle.reset("resource".to_owned()).unwrap();

    drop(pool);
    assert!(handle.is_unusable());
    assert_eq!(handle.get().unwrap_err(), Error::UnusableHandle);
    drop(handle);
}

/// The counters respect `used + available <= capacity` while the queue
/// cycles.
#[test]
fn test_counters_stay_within_capacity() {
    let executor = EventLoop::new();
    let pool = Pool::<String, EventLoop>::new(PoolConfig::new(2, 4));

    let check = |pool: &Pool<String, EventLoop>| {
        let status = pool.status();
        assert!(status.used + status.available <= status.capacity);
        assert_eq!(status.size, status.used + status.available);
    };

    let first = acquire(&pool, &executor, Duration::ZERO).unwrap();
    check(&pool);
    let second = acquire(&pool, &executor, Duration::ZERO).unwrap();
    check(&pool);
    assert_eq!(pool.used(), 2);

    drop(first);
    check(&pool);
    drop(second);
    check(&pool);
    assert_eq!(pool.available(), 2);
}
