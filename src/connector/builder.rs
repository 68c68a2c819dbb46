// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builder for [`Connector`].

use std::sync::Arc;

use super::Connector;
use super::state::SharedState;
use crate::bridge::BridgeBuilder;
use crate::client::CloudClient;
use crate::clock::{Clock, SystemClock};
use crate::config::ConnectorConfig;
use crate::connection::ConnectionTracker;
use crate::error::Error;
use crate::logger::{SharedLogger, TracingLogger};
use crate::queue::MessageQueue;
use crate::resource::AgentResources;
use crate::subscription::CallbackRegistry;
use crate::wake::WakeSignal;

/// Builder for a [`Connector`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use enebular_connector::client::{ClientEvents, CloudClient, EndpointInfo};
/// use enebular_connector::config::ConnectorConfig;
/// use enebular_connector::error::StartupError;
/// use enebular_connector::resource::ResourceDescriptor;
/// use enebular_connector::Connector;
///
/// # struct Offline;
/// # impl CloudClient for Offline {
/// #     type Interface = ();
/// #     fn setup(&mut self, _: &[ResourceDescriptor], _: Arc<dyn ClientEvents>) -> Result<(), StartupError> { Ok(()) }
/// #     fn connect(&mut self, _: ()) -> Result<(), StartupError> { Ok(()) }
/// #     fn disconnect(&mut self) {}
/// #     fn endpoint_info(&self) -> Option<EndpointInfo> { None }
/// # }
/// let connector = Connector::builder(Offline)
///     .with_config(ConnectorConfig::default().with_coalescing_window(Duration::from_secs(5)))
///     .build()?;
/// assert_eq!(connector.bridge().descriptors().len(), 8);
/// # Ok::<(), enebular_connector::Error>(())
/// ```
pub struct ConnectorBuilder<C: CloudClient> {
    client: C,
    config: ConnectorConfig,
    logger: Option<SharedLogger>,
    clock: Option<Arc<dyn Clock>>,
}

impl<C: CloudClient> ConnectorBuilder<C> {
    pub(crate) fn new(client: C) -> Self {
        Self {
            client,
            config: ConnectorConfig::default(),
            logger: None,
            clock: None,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ConnectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the logger. Defaults to a [`TracingLogger`] at the configured level.
    #[must_use]
    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Installs the agent resources and wires the loop components.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn build(self) -> Result<Connector<C>, Error> {
        self.config.validate()?;

        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingLogger::new(self.config.log_level)));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let signal = Arc::new(WakeSignal::new());
        let queue = Arc::new(MessageQueue::new(signal.clone()));

        let mut resources = BridgeBuilder::new().window(self.config.coalescing_window_secs);
        let agent = AgentResources::install(&mut resources)?;
        let bridge = Arc::new(resources.build(queue, clock, Arc::clone(&logger)));

        let tracker = Arc::new(ConnectionTracker::new(signal.clone(), Arc::clone(&logger)));

        Ok(Connector {
            client: self.client,
            config: self.config,
            logger,
            signal,
            bridge,
            tracker,
            callbacks: Arc::new(CallbackRegistry::new()),
            agent,
            state: SharedState::new(),
            wait_sources: Vec::new(),
            shut_down: false,
        })
    }
}

impl<C: CloudClient> std::fmt::Debug for ConnectorBuilder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorBuilder")
            .field("config", &self.config)
            .field("custom_logger", &self.logger.is_some())
            .field("custom_clock", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}
