// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound message queue.
//!
//! Many producers push, one consumer drains. The queue is unbounded: a push
//! never fails and never blocks beyond the short critical section.

use std::fmt;

use parking_lot::Mutex;

use crate::message::AgentMessage;
use crate::wake::SharedWaker;

/// Thread-safe FIFO of [`AgentMessage`]s that kicks the loop on every push.
pub struct MessageQueue {
    messages: Mutex<Vec<AgentMessage>>,
    waker: SharedWaker,
}

impl MessageQueue {
    /// Creates an empty queue that signals `waker` after each push.
    #[must_use]
    pub fn new(waker: SharedWaker) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            waker,
        }
    }

    /// Appends a message and wakes the consumer.
    pub fn push(&self, message: AgentMessage) {
        self.messages.lock().push(message);
        self.waker.kick();
    }

    /// Takes every queued message, oldest first.
    ///
    /// Producers may keep pushing while the returned batch is processed;
    /// their messages land in the next drain.
    #[must_use]
    pub fn drain(&self) -> Vec<AgentMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Returns the number of queued messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
