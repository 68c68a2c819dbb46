// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cross-thread wake signal for the connector loop.
//!
//! The loop thread blocks in [`WakeSignal::wait`]; any thread may call
//! [`Waker::kick`]. The signal is a single latched bit, so any number of kicks
//! issued before the waiter runs collapse into one wake.
//!
//! Kicking takes a mutex, so it must not be called from a signal handler.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// The narrow capability handed to producers: "wake the loop".
pub trait Waker: Send + Sync {
    /// Requests one more pass of the loop.
    fn kick(&self);
}

/// Reference-counted waker handle.
pub type SharedWaker = Arc<dyn Waker>;

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    released: bool,
}

/// Latched, idempotent wake signal.
///
/// # Examples
///
/// ```
/// use enebular_connector::wake::{WakeSignal, Waker};
///
/// let signal = WakeSignal::new();
/// signal.kick();
/// signal.kick();
///
/// // Both kicks are consumed by a single wait.
/// assert!(signal.wait());
/// assert!(!signal.is_pending());
/// ```
#[derive(Debug, Default)]
pub struct WakeSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl WakeSignal {
    /// Creates a signal with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the signal is kicked, then consumes it.
    ///
    /// Returns `false` without blocking once the signal has been released.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        while !state.pending && !state.released {
            self.cond.wait(&mut state);
        }
        Self::consume(&mut state)
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns `true` only if a kick was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if !state.pending && !state.released {
            let _ = self
                .cond
                .wait_while_for(&mut state, |s| !s.pending && !s.released, timeout);
        }
        Self::consume(&mut state)
    }

    fn consume(state: &mut SignalState) -> bool {
        if state.released {
            return false;
        }
        std::mem::replace(&mut state.pending, false)
    }

    /// Returns `true` if a kick is waiting to be consumed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Releases the signal: wakes any waiter and turns later kicks into no-ops.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        state.pending = false;
        self.cond.notify_all();
    }

    /// Returns `true` once [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

impl Waker for WakeSignal {
    fn kick(&self) {
        let mut state = self.state.lock();
        if state.released || state.pending {
            return;
        }
        state.pending = true;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn many_kicks_collapse_into_one_wake() {
        let signal = WakeSignal::new();
        for _ in 0..10 {
            signal.kick();
        }

        assert!(signal.wait_timeout(Duration::from_millis(10)));
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn wait_timeout_without_kick() {
        let signal = WakeSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn kick_from_other_thread_wakes_waiter() {
        let signal = Arc::new(WakeSignal::new());
        let kicker = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            kicker.kick();
        });

        assert!(signal.wait());
        handle.join().unwrap();
    }

    #[test]
    fn release_unblocks_waiter_and_disables_kicks() {
        let signal = Arc::new(WakeSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = thread::spawn(move || waiter.wait());
        thread::sleep(Duration::from_millis(20));
        signal.release();

        assert!(!handle.join().unwrap());
        assert!(signal.is_released());

        signal.kick();
        assert!(!signal.is_pending());
        assert!(!signal.wait());
    }

    #[test]
    fn usable_as_shared_waker() {
        let signal = Arc::new(WakeSignal::new());
        let waker: SharedWaker = signal.clone();
        waker.kick();
        assert!(signal.is_pending());
    }
}
