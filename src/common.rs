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

/// The action a handle applies to its slot when dropped.
///
/// Chosen at acquisition time via the `get_auto_recycle` / `get_auto_waste`
/// methods of the pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return the slot to the available set, preserving its value.
    Recycle,
    /// Return the slot in an empty state, discarding its value.
    Waste,
}

/// A point-in-time snapshot of pool counters.
///
/// The numbers are not guaranteed to be mutually consistent under heavy load;
/// they are meant for an overall insight.
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolStatus {
    /// The maximum number of slots the pool may hold.
    pub capacity: usize,

    /// The number of live slots, available plus in-use.
    pub size: usize,

    /// The number of slots ready to be handed out.
    pub available: usize,

    /// The number of slots currently held by handles.
    pub used: usize,

    /// The number of callers waiting for a slot.
    pub wait_count: usize,
}
