// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriptions to connector output.
//!
//! Two streams are exposed: agent manager messages (`(type, content)`) and
//! connection state changes (`registered`). Both are dispatched only on the
//! thread running [`Connector::run`](crate::Connector::run), so callbacks need
//! no synchronization of their own beyond the `Send + Sync` bound required to
//! store them.
//!
//! # Usage
//!
//! ```no_run
//! use enebular_connector::subscription::Subscribable;
//! # fn example(connector: &impl Subscribable) {
//! let sub_id = connector.on_agent_message(|kind, content| {
//!     println!("{kind}: {content}");
//! });
//!
//! connector.on_connection_state(|registered| {
//!     println!("registered: {registered}");
//! });
//!
//! // Later, unsubscribe
//! connector.unsubscribe(sub_id);
//! # }
//! ```

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
