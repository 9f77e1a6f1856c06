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

/// The failure modes of a resource pool.
///
/// Every fallible operation in this crate reports one of these values, either
/// as the `Err` arm of a returned `Result` (blocking flavor) or as the `Err`
/// arm delivered to a completion callback (nonblocking flavor). The messages
/// are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The wait expired before a slot became free.
    #[error("get resource timeout")]
    GetResourceTimeout,

    /// The nonblocking pool's waiter queue is at capacity.
    #[error("request queue overflow")]
    RequestQueueOverflow,

    /// The pool has been shut down.
    #[error("resource pool is disabled")]
    Disabled,

    /// A user-supplied completion callback panicked. The pool's invariants
    /// still hold.
    #[error("panic in client handler")]
    ClientHandlerPanic,

    /// The handle holds no resource value.
    #[error("handle is empty")]
    EmptyHandle,

    /// The handle was already disposed, or its pool no longer exists.
    #[error("handle is unusable")]
    UnusableHandle,

    /// Catch-all for failures with no dedicated code.
    #[error("resource pool error")]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_stable() {
        assert_eq!(Error::GetResourceTimeout.to_string(), "get resource timeout");
        assert_eq!(Error::RequestQueueOverflow.to_string(), "request queue overflow");
        assert_eq!(Error::Disabled.to_string(), "resource pool is disabled");
        assert_eq!(Error::ClientHandlerPanic.to_string(), "panic in client handler");
        assert_eq!(Error::EmptyHandle.to_string(), "handle is empty");
        assert_eq!(Error::UnusableHandle.to_string(), "handle is unusable");
        assert_eq!(Error::Unknown.to_string(), "resource pool error");
    }

    #[test]
    fn test_codes_are_value_types() {
        let a = Error::Disabled;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(Error::Disabled, Error::GetResourceTimeout);
    }

    #[test]
    fn test_implements_std_error() {
        fn assert_error<E: std::error::Error>(_: E) {}
        assert_error(Error::Unknown);
    }
}
