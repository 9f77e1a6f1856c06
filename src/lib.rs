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

#![deny(missing_docs)]

//! Respool provides bounded pools of expensive-to-create values, such as
//! database connections, open files, or compiled artifacts.
//!
//! This crate provides two acquisition flavors: the
//! [blocking pool](blocking::Pool) and the
//! [nonblocking pool](nonblocking::Pool).
//!
//! Both flavors share the same model. A pool owns up to `capacity` slots;
//! a slot is either available, held by a [handle](blocking::Handle), or an
//! empty hole. Slots start empty: the first caller to reserve one receives
//! an empty handle and `reset`s a freshly built value into it, so the pool
//! itself never constructs resources. Dropping a handle returns the slot
//! with the disposition chosen at acquisition: `get_auto_recycle` keeps the
//! value for the next caller, `get_auto_waste` discards it.
//!
//! # Blocking pool
//!
//! A blocking `get` returns immediately when a slot is free and otherwise
//! parks the calling thread on a condition variable, up to a wait duration.
//!
//! ```
//! use std::time::Duration;
//!
//! use respool::blocking::Pool;
//!
//! let pool = Pool::new(4);
//!
//! let mut handle = pool.get_auto_recycle(Duration::ZERO).unwrap();
//! handle.reset("connection".to_owned()).unwrap();
//! drop(handle);
//!
//! assert_eq!(pool.available(), 1);
//! let handle = pool.get_auto_recycle(Duration::ZERO).unwrap();
//! assert_eq!(handle.get().unwrap(), "connection");
//! ```
//!
//! # Nonblocking pool
//!
//! A nonblocking `get` never blocks: the outcome is delivered to a
//! completion callback posted on an [executor](executor::Executor). Requests
//! that find the pool exhausted wait in a bounded FIFO queue, each with its
//! own deadline.
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
//!     drop(handle);
//!     tx.send(()).unwrap();
//! });
//! rx.recv().unwrap();
//!
//! assert_eq!(pool.available(), 1);
//! ```

#[macro_use]
mod cfg;

pub use common::Disposition;
pub use common::PoolStatus;
pub use error::Error;

mod common;
mod error;
mod mutex;
mod slot;

pub mod blocking;
pub mod executor;
pub mod nonblocking;
pub mod time;
