// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coalescing groups.
//!
//! A group turns a burst of member updates into one message. Every update
//! stamps the member with the current time and re-evaluates the group: when
//! every member was stamped no more than `window` seconds ago, the group
//! builds its message from the current member values, queues it, and resets
//! every stamp to `0`. The reset forces a complete new round before the next
//! message. A stale or never-stamped member suppresses emission, and so does
//! a member stamped later than `now`, which happens when the wall clock steps
//! backwards.
//!
//! A single-member group emits on every update.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Resource;
use crate::message::{AgentMessage, encode_fields};
use crate::queue::MessageQueue;

/// One member of a group: the JSON field name and the resource feeding it.
#[derive(Debug, Clone)]
pub struct GroupField {
    name: String,
    resource: Arc<Resource>,
}

impl GroupField {
    pub(crate) fn new(name: impl Into<String>, resource: Arc<Resource>) -> Self {
        Self {
            name: name.into(),
            resource,
        }
    }

    /// Returns the JSON field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the member resource.
    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }
}

#[derive(Debug, Default)]
struct Round {
    emitted: u64,
}

/// A set of resources reported together as one message.
pub struct ResourceGroup {
    kind: String,
    fields: Vec<GroupField>,
    window: u64,
    round: Mutex<Round>,
}

impl ResourceGroup {
    pub(crate) fn new(kind: impl Into<String>, fields: Vec<GroupField>, window: u64) -> Self {
        Self {
            kind: kind.into(),
            fields,
            window,
            round: Mutex::new(Round::default()),
        }
    }

    /// Returns the message type this group emits.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the members in field order.
    #[must_use]
    pub fn fields(&self) -> &[GroupField] {
        &self.fields
    }

    /// Returns the coalescing window in seconds.
    #[must_use]
    pub fn window(&self) -> u64 {
        self.window
    }

    /// Returns how many messages this group has queued.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.round.lock().emitted
    }

    /// Stamps `member` with `now` and queues the group message if the round
    /// is complete.
    ///
    /// Returns `true` if a message was queued.
    pub(crate) fn record(&self, member: &Resource, now: u64, queue: &MessageQueue) -> bool {
        let mut round = self.round.lock();
        member.stamp(now);

        if !self.is_complete(now) {
            return false;
        }

        let values: Vec<String> = self.fields.iter().map(|f| f.resource.value()).collect();
        let content = encode_fields(
            self.fields
                .iter()
                .zip(&values)
                .map(|(field, value)| (field.name.as_str(), value.as_str())),
        );
        queue.push(AgentMessage::new(self.kind.as_str(), content));

        for field in &self.fields {
            field.resource.stamp(0);
        }
        round.emitted += 1;
        true
    }

    fn is_complete(&self, now: u64) -> bool {
        self.fields.iter().all(|field| {
            let stamp = field.resource.last_update_time();
            stamp != 0 && now.checked_sub(stamp).is_some_and(|age| age <= self.window)
        })
    }
}

impl fmt::Debug for ResourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGroup")
            .field("kind", &self.kind)
            .field(
                "fields",
                &self.fields.iter().map(GroupField::name).collect::<Vec<_>>(),
            )
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
