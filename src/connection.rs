// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Registration state tracking.
//!
//! The cloud client reports lifecycle events from its own threads. The
//! tracker keeps only the latest `registered` value plus a dirty bit; the
//! connector loop clears the bit and notifies subscribers once per tick, so a
//! burst of flips between two ticks is delivered as a single notification
//! carrying the final value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ConnectorErrorKind;
use crate::logger::{LogLevel, SharedLogger};
use crate::wake::SharedWaker;

/// Tracks whether the device is registered with the cloud service.
pub struct ConnectionTracker {
    registered: AtomicBool,
    dirty: AtomicBool,
    waker: SharedWaker,
    logger: SharedLogger,
}

impl ConnectionTracker {
    /// Creates a tracker in the unregistered state.
    #[must_use]
    pub fn new(waker: SharedWaker, logger: SharedLogger) -> Self {
        Self {
            registered: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            waker,
            logger,
        }
    }

    /// The client completed registration.
    pub fn on_registered(&self) {
        self.update(true);
        self.logger.log(LogLevel::Info, "Client registered");
    }

    /// The client refreshed an existing registration. No state change.
    pub fn on_registration_updated(&self) {
        self.logger.log(LogLevel::Info, "Client registration updated");
    }

    /// The client lost or dropped its registration.
    pub fn on_unregistered(&self) {
        self.update(false);
        self.logger.log(LogLevel::Info, "Client unregistered");
    }

    /// The client reported an error. Logged only; does not change state.
    pub fn on_error(&self, code: i32, details: Option<&str>) -> ConnectorErrorKind {
        let kind = ConnectorErrorKind::from_code(code);
        self.logger.log(
            LogLevel::Error,
            &format!("Client error occurred: {kind} ({code})"),
        );
        if let Some(details) = details {
            self.logger
                .log(LogLevel::Error, &format!("Error details: {details}"));
        }
        kind
    }

    /// Returns the latest registration state. Does not clear the dirty bit.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Returns `true` if a notification is owed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clears the dirty bit and returns the state to notify, if one is owed.
    #[must_use]
    pub fn take_change(&self) -> Option<bool> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.is_connected())
        } else {
            None
        }
    }

    fn update(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
        self.dirty.store(true, Ordering::Release);
        self.waker.kick();
    }
}

impl fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("registered", &self.is_connected())
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}
