// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for connector output.

use crate::subscription::SubscriptionId;

/// Trait for types that deliver agent messages and connection state changes.
pub trait Subscribable {
    /// Subscribes to agent manager messages.
    ///
    /// The callback receives the message type (`deploy`, `register`,
    /// `updateAuth`) and its JSON content.
    fn on_agent_message<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &str) + Send + Sync + 'static;

    /// Subscribes to connection state changes.
    ///
    /// The callback is called at most once per loop tick with the latest
    /// registration state.
    fn on_connection_state<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static;

    /// Unsubscribes a callback by its subscription ID.
    ///
    /// Returns `true` if the subscription was found and removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
