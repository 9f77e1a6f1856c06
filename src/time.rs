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

//! Monotonic time points with saturating arithmetic.
//!
//! Deadlines inside the pools are expressed as [`TimePoint`]s measured against
//! a process-wide monotonic epoch. The two sentinels make deadline handling
//! uniform: [`TimePoint::MAX`] means "never" (a wait without deadline) and
//! [`TimePoint::MIN`] means "already expired". [`TimePoint::saturating_add`]
//! clamps instead of wrapping, so `now() + Duration::MAX` is a valid "no
//! deadline" expression without special cases at the call sites.

use std::sync::OnceLock;
use std::time::Duration;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

fn epoch() -> Instant {
    *EPOCH.get_or_init(Instant::now)
}

/// A point on the process-wide monotonic clock.
///
/// Internally an offset from a lazily initialized epoch, which gives the type
/// total ordering and cheap `Copy` semantics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePoint(Duration);

impl TimePoint {
    /// The earliest representable point: the epoch itself.
    pub const MIN: TimePoint = TimePoint(Duration::ZERO);

    /// The latest representable point, used as the "never" sentinel.
    pub const MAX: TimePoint = TimePoint(Duration::MAX);

    /// Adds `d`, clamping to [`TimePoint::MAX`] on overflow.
    ///
    /// Overflow is detected before the addition, so `MAX + d == MAX` for any
    /// `d`.
    pub fn saturating_add(self, d: Duration) -> TimePoint {
        match self.0.checked_add(d) {
            Some(offset) => TimePoint(offset),
            None => TimePoint::MAX,
        }
    }

    /// Returns the distance from `earlier` to `self`, or zero if `self` is
    /// not later.
    pub fn saturating_duration_since(self, earlier: TimePoint) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Reads the monotonic clock.
pub fn now() -> TimePoint {
    TimePoint(epoch().elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_to_max_returns_max() {
        assert_eq!(TimePoint::MAX.saturating_add(Duration::MAX), TimePoint::MAX);
        assert_eq!(
            TimePoint::MAX.saturating_add(Duration::from_nanos(1)),
            TimePoint::MAX
        );
        assert_eq!(TimePoint::MAX.saturating_add(Duration::ZERO), TimePoint::MAX);
    }

    #[test]
    fn test_add_to_min_increases() {
        let result = TimePoint::MIN.saturating_add(Duration::from_secs(1));
        assert!(result > TimePoint::MIN);
        assert_eq!(result.saturating_duration_since(TimePoint::MIN), Duration::from_secs(1));
    }

    #[test]
    fn test_now_is_between_sentinels() {
        let t = now();
        assert!(t >= TimePoint::MIN);
        assert!(t < TimePoint::MAX);
    }

    #[test]
    fn test_now_is_monotonic() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }

    #[test]
    fn test_duration_since_earlier_point_is_zero() {
        let earlier = TimePoint::MIN;
        assert_eq!(earlier.saturating_duration_since(TimePoint::MAX), Duration::ZERO);
    }
}
