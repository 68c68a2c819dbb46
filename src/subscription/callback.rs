// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback storage and dispatch.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Ordered callback lists, dispatched on the loop thread

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Unique identifier for a subscription.
///
/// IDs are unique within a connector's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Agent manager message callback: `(type, content)`.
type MessageCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Connection state callback: receives the latest `registered` value.
type StateCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Registry of connector subscribers.
///
/// Callbacks run in registration order. Dispatch copies the callback list out
/// of the lock first, so a callback may subscribe or unsubscribe without
/// deadlocking; such changes take effect from the next dispatch.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    message_callbacks: RwLock<Vec<(SubscriptionId, MessageCallback)>>,
    state_callbacks: RwLock<Vec<(SubscriptionId, StateCallback)>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            message_callbacks: RwLock::new(Vec::new()),
            state_callbacks: RwLock::new(Vec::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a callback for agent manager messages.
    pub fn on_agent_message<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.message_callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Registers a callback for connection state changes.
    pub fn on_connection_state<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.state_callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        fn remove<T>(list: &RwLock<Vec<(SubscriptionId, T)>>, id: SubscriptionId) -> bool {
            let mut list = list.write();
            let before = list.len();
            list.retain(|(sub, _)| *sub != id);
            list.len() != before
        }

        remove(&self.message_callbacks, id) || remove(&self.state_callbacks, id)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Calls every message callback with `(kind, content)`.
    pub fn dispatch_message(&self, kind: &str, content: &str) {
        let callbacks: Vec<MessageCallback> = self
            .message_callbacks
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(kind, content);
        }
    }

    /// Calls every state callback with the latest registration state.
    pub fn dispatch_connection_state(&self, registered: bool) {
        let callbacks: Vec<StateCallback> = self
            .state_callbacks
            .read()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(registered);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.message_callbacks.read().len() + self.state_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_id_display() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.to_string(), "Sub(42)");
    }

    #[test]
    fn registry_new_is_empty() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.callback_count(), 0);
    }

    #[test]
    fn message_callbacks_run_in_registration_order() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = Arc::clone(&calls);
            registry.on_agent_message(move |kind, content| {
                calls.lock().push(format!("{tag}:{kind}:{content}"));
            });
        }

        registry.dispatch_message("deploy", "{}");
        assert_eq!(
            *calls.lock(),
            ["first:deploy:{}", "second:deploy:{}", "third:deploy:{}"]
        );
    }

    #[test]
    fn state_callback_receives_value() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        registry.on_connection_state(move |registered| seen_clone.lock().push(registered));
        registry.dispatch_connection_state(true);
        registry.dispatch_connection_state(false);

        assert_eq!(*seen.lock(), [true, false]);
    }

    #[test]
    fn unsubscribe_keeps_remaining_order() {
        let registry = CallbackRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let ids: Vec<_> = (0..3)
            .map(|i| {
                let calls = Arc::clone(&calls);
                registry.on_agent_message(move |_, _| calls.lock().push(i))
            })
            .collect();

        assert!(registry.unsubscribe(ids[1]));
        registry.dispatch_message("x", "{}");
        assert_eq!(*calls.lock(), [0, 2]);
    }

    #[test]
    fn unsubscribe_state_callback() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let id = registry.on_connection_state(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(registry.unsubscribe(id));
        registry.dispatch_connection_state(true);

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_unsubscribe_nonexistent() {
        let registry = CallbackRegistry::new();
        assert!(!registry.unsubscribe(SubscriptionId::new(999)));
    }

    #[test]
    fn callback_may_subscribe_during_dispatch() {
        let registry = Arc::new(CallbackRegistry::new());
        let inner = Arc::clone(&registry);

        registry.on_agent_message(move |_, _| {
            inner.on_agent_message(|_, _| {});
        });
        registry.dispatch_message("x", "{}");

        assert_eq!(registry.callback_count(), 2);
    }

    #[test]
    fn registry_unique_ids() {
        let registry = CallbackRegistry::new();
        let id1 = registry.on_agent_message(|_, _| {});
        let id2 = registry.on_connection_state(|_| {});
        assert_ne!(id1, id2);
    }

    #[test]
    fn registry_debug() {
        let registry = CallbackRegistry::new();
        registry.on_connection_state(|_| {});

        let debug = format!("{registry:?}");
        assert!(debug.contains("CallbackRegistry"));
        assert!(debug.contains("callback_count"));
    }
}
