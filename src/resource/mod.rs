// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remotely writable resources and their coalescing groups.
//!
//! A resource is addressed by an `object/instance/resource` triple
//! ([`ResourceCoord`]) and is either written (`PUT`) or executed (`POST`) by
//! the cloud side. Resources whose values only make sense together are
//! collected into a [`ResourceGroup`], which emits one message once every
//! member has been touched within the coalescing window.
//!
//! # Examples
//!
//! ```
//! use enebular_connector::resource::{ResourceCoord, ResourceSpec};
//!
//! let spec = ResourceSpec::write(ResourceCoord::new(26242, 0, 26241), "download_url");
//! assert_eq!(spec.coord.to_string(), "26242/0/26241");
//! ```

mod agent;
mod coord;
mod group;

pub use agent::AgentResources;
pub use coord::{ResourceCoord, ResourceKind, ResourceMode};
pub use group::{GroupField, ResourceGroup};

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

/// Everything needed to create a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Where the resource lives in the object tree.
    pub coord: ResourceCoord,
    /// Resource type name advertised to the server.
    pub name: String,
    /// Data type of the value.
    pub kind: ResourceKind,
    /// Whether the server writes or executes it.
    pub mode: ResourceMode,
    /// Value before the first remote write.
    pub initial_value: Option<String>,
    /// Whether the server may observe it.
    pub observable: bool,
}

impl ResourceSpec {
    /// A non-observable string resource written by the server.
    #[must_use]
    pub fn write(coord: ResourceCoord, name: impl Into<String>) -> Self {
        Self {
            coord,
            name: name.into(),
            kind: ResourceKind::String,
            mode: ResourceMode::ReadWrite,
            initial_value: None,
            observable: false,
        }
    }

    /// A resource executed by the server.
    #[must_use]
    pub fn execute(coord: ResourceCoord, name: impl Into<String>) -> Self {
        Self {
            coord,
            name: name.into(),
            kind: ResourceKind::String,
            mode: ResourceMode::Execute,
            initial_value: None,
            observable: false,
        }
    }

    /// Sets the data type.
    #[must_use]
    pub fn with_kind(mut self, kind: ResourceKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Marks the resource observable.
    #[must_use]
    pub fn observable(mut self) -> Self {
        self.observable = true;
        self
    }
}

/// A registered resource.
///
/// The value is only mutated from the write/execute path; the stamp is
/// written under the owning group's lock.
#[derive(Debug)]
pub struct Resource {
    spec: ResourceSpec,
    value: RwLock<String>,
    last_update: AtomicU64,
    group: Option<usize>,
}

impl Resource {
    pub(crate) fn new(spec: ResourceSpec, group: Option<usize>) -> Self {
        let value = spec.initial_value.clone().unwrap_or_default();
        Self {
            spec,
            value: RwLock::new(value),
            last_update: AtomicU64::new(0),
            group,
        }
    }

    /// Returns the coordinate.
    #[must_use]
    pub fn coord(&self) -> ResourceCoord {
        self.spec.coord
    }

    /// Returns the creation parameters.
    #[must_use]
    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> ResourceMode {
        self.spec.mode
    }

    /// Returns a copy of the current value.
    #[must_use]
    pub fn value(&self) -> String {
        self.value.read().clone()
    }

    pub(crate) fn set_value(&self, value: &str) {
        let mut current = self.value.write();
        current.clear();
        current.push_str(value);
    }

    /// Seconds-since-epoch of the last counted update, `0` if none.
    #[must_use]
    pub fn last_update_time(&self) -> u64 {
        self.last_update.load(Ordering::Acquire)
    }

    pub(crate) fn stamp(&self, now: u64) {
        self.last_update.store(now, Ordering::Release);
    }

    /// Index of the owning group in its bridge, if any.
    #[must_use]
    pub fn group(&self) -> Option<usize> {
        self.group
    }
}

/// Description of a resource handed to the cloud client at setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Where the resource lives.
    pub coord: ResourceCoord,
    /// Resource type name.
    pub name: String,
    /// Data type.
    pub kind: ResourceKind,
    /// Write or execute.
    pub mode: ResourceMode,
    /// Whether it is observable.
    pub observable: bool,
    /// Initial value, if any.
    pub initial_value: Option<String>,
}

impl From<&ResourceSpec> for ResourceDescriptor {
    fn from(spec: &ResourceSpec) -> Self {
        Self {
            coord: spec.coord,
            name: spec.name.clone(),
            kind: spec.kind,
            mode: spec.mode,
            observable: spec.observable,
            initial_value: spec.initial_value.clone(),
        }
    }
}
