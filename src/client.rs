// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cloud client seam.
//!
//! The device-management transport lives behind [`CloudClient`]. At startup
//! the connector hands the client its resource descriptors and a
//! [`ClientEvents`] sink; the client then reports writes, executes and
//! registration changes into that sink from whatever threads it owns.

use std::fmt;
use std::sync::Arc;

use crate::bridge::ResourceBridge;
use crate::connection::ConnectionTracker;
use crate::error::StartupError;
use crate::logger::{LogLevel, SharedLogger};
use crate::resource::{ResourceCoord, ResourceDescriptor};

/// Names the device is known by on the cloud service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Endpoint name chosen by the device.
    pub endpoint_name: String,
    /// Identifier assigned by the service; used as the device id.
    pub internal_endpoint_name: String,
}

/// Callbacks a [`CloudClient`] invokes from its worker threads.
///
/// Every method must be cheap: implementations record state and signal the
/// connector loop, they never run subscriber code.
pub trait ClientEvents: Send + Sync {
    /// Registration with the service completed.
    fn on_registered(&self);

    /// An existing registration was refreshed.
    fn on_registration_updated(&self);

    /// The registration was lost or dropped.
    fn on_unregistered(&self);

    /// The client hit an error. `code` follows the
    /// [`ConnectorErrorKind`](crate::error::ConnectorErrorKind) table.
    fn on_error(&self, code: i32, details: Option<&str>);

    /// The service wrote `value` to the resource at `coord`.
    fn on_resource_write(&self, coord: ResourceCoord, value: &str);

    /// The service executed the resource at `coord`.
    fn on_resource_execute(&self, coord: ResourceCoord, argument: Option<&str>);
}

/// A device-management client the connector drives.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use enebular_connector::client::{ClientEvents, CloudClient, EndpointInfo};
/// use enebular_connector::error::StartupError;
/// use enebular_connector::resource::ResourceDescriptor;
///
/// struct Offline;
///
/// impl CloudClient for Offline {
///     type Interface = ();
///
///     fn setup(
///         &mut self,
///         _resources: &[ResourceDescriptor],
///         _events: Arc<dyn ClientEvents>,
///     ) -> Result<(), StartupError> {
///         Ok(())
///     }
///
///     fn connect(&mut self, _iface: ()) -> Result<(), StartupError> {
///         Err(StartupError::Connection("no network".into()))
///     }
///
///     fn disconnect(&mut self) {}
///
///     fn endpoint_info(&self) -> Option<EndpointInfo> {
///         None
///     }
/// }
/// ```
pub trait CloudClient: Send {
    /// Network interface handle passed through from
    /// [`Connector::startup`](crate::Connector::startup).
    type Interface;

    /// Publishes the resource tree and installs the event sink.
    ///
    /// # Errors
    ///
    /// Returns error if provisioning or object setup fails.
    fn setup(
        &mut self,
        resources: &[ResourceDescriptor],
        events: Arc<dyn ClientEvents>,
    ) -> Result<(), StartupError>;

    /// Starts connecting on `iface`. Registration completes asynchronously
    /// through [`ClientEvents::on_registered`].
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be initialized.
    fn connect(&mut self, iface: Self::Interface) -> Result<(), StartupError>;

    /// Closes the connection and stops the client's workers.
    fn disconnect(&mut self);

    /// Returns the endpoint names, once known.
    fn endpoint_info(&self) -> Option<EndpointInfo>;
}

/// Routes client events into the bridge and the tracker.
pub(crate) struct ClientCallbacks {
    bridge: Arc<ResourceBridge>,
    tracker: Arc<ConnectionTracker>,
    logger: SharedLogger,
}

impl ClientCallbacks {
    pub(crate) fn new(
        bridge: Arc<ResourceBridge>,
        tracker: Arc<ConnectionTracker>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            bridge,
            tracker,
            logger,
        }
    }
}

impl ClientEvents for ClientCallbacks {
    fn on_registered(&self) {
        self.tracker.on_registered();
    }

    fn on_registration_updated(&self) {
        self.tracker.on_registration_updated();
    }

    fn on_unregistered(&self) {
        self.tracker.on_unregistered();
    }

    fn on_error(&self, code: i32, details: Option<&str>) {
        self.tracker.on_error(code, details);
    }

    fn on_resource_write(&self, coord: ResourceCoord, value: &str) {
        if let Err(e) = self.bridge.on_write(coord, value) {
            self.logger
                .log(LogLevel::Warn, &format!("ignored write to {coord}: {e}"));
        }
    }

    fn on_resource_execute(&self, coord: ResourceCoord, argument: Option<&str>) {
        if let Err(e) = self.bridge.on_execute(coord, argument) {
            self.logger
                .log(LogLevel::Warn, &format!("ignored execute of {coord}: {e}"));
        }
    }
}

impl fmt::Debug for ClientCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCallbacks")
            .field("bridge", &self.bridge)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
