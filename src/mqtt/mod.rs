// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT-backed cloud client.
//!
//! The device is addressed under `<prefix>/<endpoint>/`:
//!
//! | Topic                                    | Direction | Meaning                  |
//! |------------------------------------------|-----------|--------------------------|
//! | `<prefix>/<endpoint>/objects`            | publish   | resource list (retained) |
//! | `<prefix>/<endpoint>/<o>/<i>/<r>`        | subscribe | write payload to `o/i/r` |
//! | `<prefix>/<endpoint>/<o>/<i>/<r>/exec`   | subscribe | execute `o/i/r`          |
//!
//! A CONNACK marks the device registered and a PINGRESP counts as a
//! registration refresh. Connection errors are reported through
//! [`ClientEvents::on_error`](crate::client::ClientEvents::on_error) and the
//! event loop reconnects on its own.
//!
//! ```no_run
//! use enebular_connector::Connector;
//! use enebular_connector::mqtt::MqttClientBuilder;
//!
//! # fn main() -> enebular_connector::Result<()> {
//! let client = MqttClientBuilder::new()
//!     .broker("mqtt://192.168.1.50:1883")
//!     .endpoint_name("gateway-01")
//!     .build()?;
//!
//! let mut connector = Connector::builder(client).build()?;
//! connector.startup(())?;
//! connector.run()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod topic;

pub use client::MqttCloudClient;
pub use config::{MqttClientBuilder, MqttClientConfig, parse_mqtt_url};
pub use topic::{TopicAction, TopicLayout};
