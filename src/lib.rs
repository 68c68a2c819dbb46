// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `enebular_connector` - bridges a device-management cloud client to a
//! single-threaded enebular agent.
//!
//! The cloud client writes remote resources from its own worker threads. The
//! connector groups related writes into coalesced JSON messages, queues them,
//! and delivers them, in order, on the one thread that runs the event loop.
//! Registration changes are collapsed into a connection state notification
//! carrying the latest value.
//!
//! # Messages
//!
//! | Type         | Content                                                                 |
//! |--------------|-------------------------------------------------------------------------|
//! | `deploy`     | `{"downloadUrl":…}`                                                     |
//! | `register`   | `{"connectionId":…,"deviceId":…,"authRequestUrl":…,"agentManagerBaseUrl":…}` |
//! | `updateAuth` | `{"accessToken":…,"idToken":…,"state":…}`                               |
//!
//! A multi-field message is only emitted once every field has been written
//! within the coalescing window (10 seconds by default) of the others.
//!
//! # Quick Start
//!
//! ```no_run
//! use enebular_connector::Connector;
//! use enebular_connector::message::RegisterMessage;
//! use enebular_connector::mqtt::MqttClientBuilder;
//! use enebular_connector::subscription::Subscribable;
//!
//! fn main() -> enebular_connector::Result<()> {
//!     let client = MqttClientBuilder::new()
//!         .broker("mqtt://192.168.1.50:1883")
//!         .build()?;
//!
//!     let mut connector = Connector::builder(client).build()?;
//!
//!     connector.on_agent_message(|kind, content| {
//!         if kind == "register" {
//!             if let Ok(register) = serde_json::from_str::<RegisterMessage>(content) {
//!                 println!("device id: {}", register.device_id);
//!             }
//!         }
//!     });
//!     connector.on_connection_state(|registered| {
//!         println!("registered: {registered}");
//!     });
//!
//!     connector.startup(())?;
//!     connector.run()?;
//!     connector.shutdown()
//! }
//! ```

pub mod bridge;
pub mod client;
pub mod clock;
pub mod config;
mod connection;
mod connector;
pub mod error;
pub mod logger;
pub mod message;
#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod queue;
pub mod resource;
pub mod subscription;
pub mod wake;

pub use bridge::{BridgeBuilder, GroupHandle, ResourceBridge, ResourceHandle};
pub use client::{ClientEvents, CloudClient, EndpointInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ConnectorConfig;
pub use connection::ConnectionTracker;
pub use connector::{Connector, ConnectorBuilder, ConnectorHandle, LoopState, WaitSource};
#[cfg(all(unix, feature = "signals"))]
pub use connector::SignalGuard;
pub use error::{ConfigError, ConnectorErrorKind, Error, ResourceError, Result, StartupError};
pub use logger::{LogLevel, Logger, MemoryLogger, SharedLogger, TracingLogger};
pub use message::AgentMessage;
pub use resource::{AgentResources, ResourceCoord, ResourceDescriptor};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use wake::{SharedWaker, WakeSignal, Waker};
