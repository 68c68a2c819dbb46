// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event loop lifecycle.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the connector loop.
///
/// `Idle -> Running -> Halting -> Stopped`. `Stopped` is terminal; a failed
/// startup goes straight from `Idle` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoopState {
    /// Built but not started.
    Idle = 0,
    /// Started; `run` keeps servicing wakes.
    Running = 1,
    /// A halt was requested; `run` exits at its next check.
    Halting = 2,
    /// The loop has exited.
    Stopped = 3,
}

impl LoopState {
    /// Returns the lowercase state name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Halting => "halting",
            Self::Stopped => "stopped",
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Halting,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loop state shared between the connector and its handles.
#[derive(Debug, Clone)]
pub(crate) struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(LoopState::Idle as u8)))
    }

    pub(crate) fn get(&self) -> LoopState {
        LoopState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves `from -> to` atomically. Returns `false` if the state was not `from`.
    pub(crate) fn transition(&self, from: LoopState, to: LoopState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
