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

use std::time::Duration;
use std::time::Instant;

use respool::executor::TokioExecutor;
use respool::nonblocking::Pool;
use respool::nonblocking::PoolConfig;
use respool::Error;
use tokio::sync::mpsc::unbounded_channel;

#[tokio::test]
async fn test_acquire_on_tokio_runtime() {
    let executor = TokioExecutor::current();
    let pool = Pool::<String, TokioExecutor>::new(PoolConfig::new(1, 4));

    let (tx, mut rx) = unbounded_channel();
    pool.get_auto_recycle(&executor, Duration::ZERO, move |result| {
        tx.send(result).unwrap();
    });

    let mut handle = rx.recv().await.unwrap().unwrap();
    assert!(handle.is_empty());
    handle.reset("resource".to_owned()).unwrap();
    drop(handle);

    assert_eq!(pool.available(), 1);
    assert_eq!(pool.used(), 0);
}

#[tokio::test]
async fn test_waiter_times_out_on_tokio_timer() {
    let executor = TokioExecutor::current();
    let pool = Pool::<String, TokioExecutor>::new(PoolConfig::new(1, 4));

    let (tx, mut rx) = unbounded_channel();
    pool.get_auto_recycle(&executor, Duration::ZERO, move |result| {
        tx.send(result).unwrap();
    });
    let _held = rx.recv().await.unwrap().unwrap();

    let (tx, mut rx) = unbounded_channel();
    let started = Instant::now();
    pool.get_auto_recycle(&executor, Duration::from_millis(100), move |result| {
        tx.send(result.map(drop)).unwrap();
    });

    let result = rx.recv().await.unwrap();
    assert_eq!(result.unwrap_err(), Error::GetResourceTimeout);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_recycle_serves_waiter() {
    let executor = TokioExecutor::current();
    let pool = Pool::<String, TokioExecutor>::new(PoolConfig::new(1, 4));

    let (tx, mut rx) = unbounded_channel();
    pool.get_auto_recycle(&executor, Duration::ZERO, move |result| {
        tx.send(result).unwrap();
    });
    let mut held = rx.recv().await.unwrap().unwrap();
    held.reset("resource".to_owned()).unwrap();

    let (tx, mut rx) = unbounded_channel();
    pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
        let value = result.unwrap().get().map(String::clone);
        tx.send(value).unwrap();
    });

    drop(held);
    let value = rx.recv().await.unwrap().unwrap();
    assert_eq!(value, "resource");
}

#[tokio::test]
async fn test_disable_completes_waiters() {
    let executor = TokioExecutor::current();
    let pool = Pool::<String, TokioExecutor>::new(PoolConfig::new(1, 4));

    let (tx, mut rx) = unbounded_channel();
    pool.get_auto_recycle(&executor, Duration::ZERO, move |result| {
        tx.send(result).unwrap();
    });
    let _held = rx.recv().await.unwrap().unwrap();

    let (tx, mut rx) = unbounded_channel();
    for _ in 0..2 {
        let tx = tx.clone();
        pool.get_auto_recycle(&executor, Duration::from_secs(60), move |result| {
            tx.send(result.map(drop)).unwrap();
        });
    }

    pool.disable();
    for _ in 0..2 {
        let result = rx.recv().await.unwrap();
        assert_eq!(result.unwrap_err(), Error::Disabled);
    }
}
