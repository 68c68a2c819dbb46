// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Halting the loop from POSIX signals.
//!
//! [`ConnectorHandle::halt`] locks the wake signal, so it must not run inside
//! a signal handler. Instead, signal-hook's handler only writes to its
//! self-pipe, and a helper thread reads the pipe and calls `halt` from normal
//! thread context.

use std::io;
use std::os::raw::c_int;
use std::thread::{self, JoinHandle};

use signal_hook::iterator::{Handle, Signals};

use super::ConnectorHandle;

/// Keeps a signal listener alive. Dropping it unregisters the listener and
/// joins its thread.
#[derive(Debug)]
pub struct SignalGuard {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Stops listening. Same as dropping the guard.
    pub fn close(self) {}
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl ConnectorHandle {
    /// Halts the loop whenever one of `signals` is delivered to the process.
    ///
    /// ```no_run
    /// # fn demo(handle: enebular_connector::ConnectorHandle) -> std::io::Result<()> {
    /// use signal_hook::consts::{SIGINT, SIGTERM};
    ///
    /// let _guard = handle.halt_on_signals(&[SIGINT, SIGTERM])?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if a handler cannot be installed (for example for
    /// `SIGKILL`) or the listener thread cannot be spawned.
    pub fn halt_on_signals(&self, signals: &[c_int]) -> io::Result<SignalGuard> {
        let mut listener = Signals::new(signals)?;
        let handle = listener.handle();
        let control = self.clone();

        let thread = thread::Builder::new()
            .name("connector-signals".to_string())
            .spawn(move || {
                for signal in listener.forever() {
                    let halted = control.halt();
                    tracing::info!(signal, halted, "Signal received");
                }
            });
        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                handle.close();
                return Err(e);
            }
        };

        Ok(SignalGuard {
            handle,
            thread: Some(thread),
        })
    }
}
