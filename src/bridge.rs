// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resource bridge: remote writes in, coalesced agent messages out.
//!
//! The bridge is assembled once with a [`BridgeBuilder`] and is immutable in
//! shape afterwards; only resource values and stamps change. Writes arrive on
//! the cloud client's worker threads. Writes to different resources may run
//! concurrently, writes to one resource are serialized by the client.
//!
//! The bridge never calls subscribers. Its only output is the
//! [`MessageQueue`], whose push wakes the connector loop.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use enebular_connector::bridge::BridgeBuilder;
//! use enebular_connector::clock::ManualClock;
//! use enebular_connector::logger::MemoryLogger;
//! use enebular_connector::queue::MessageQueue;
//! use enebular_connector::resource::{ResourceCoord, ResourceSpec};
//! use enebular_connector::wake::WakeSignal;
//!
//! let mut builder = BridgeBuilder::new();
//! let url = builder
//!     .register_resource(ResourceSpec::write(ResourceCoord::new(26242, 0, 26241), "download_url"))
//!     .unwrap();
//! builder.register_group("deploy", &[("downloadUrl", url)]).unwrap();
//!
//! let queue = Arc::new(MessageQueue::new(Arc::new(WakeSignal::new())));
//! let bridge = builder.build(
//!     Arc::clone(&queue),
//!     Arc::new(ManualClock::new(1_700_000_000)),
//!     Arc::new(MemoryLogger::new()),
//! );
//!
//! bridge.on_write(ResourceCoord::new(26242, 0, 26241), "https://example.com/flow").unwrap();
//! assert_eq!(queue.len(), 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::ResourceError;
use crate::logger::{LogLevel, SharedLogger};
use crate::queue::MessageQueue;
use crate::resource::{
    GroupField, Resource, ResourceCoord, ResourceDescriptor, ResourceGroup, ResourceMode,
    ResourceSpec,
};

/// Default coalescing window in seconds.
pub const DEFAULT_WINDOW_SECS: u64 = 10;

/// Handle to a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle(usize);

impl ResourceHandle {
    /// Returns the raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to a registered group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupHandle(usize);

impl GroupHandle {
    /// Returns the raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct GroupSpec {
    kind: String,
    fields: Vec<(String, usize)>,
}

/// Object → instance → resource id → resource index.
type ObjectTree = BTreeMap<u16, BTreeMap<u16, BTreeMap<u16, usize>>>;

/// Collects resources and groups before the bridge goes live.
#[derive(Debug)]
pub struct BridgeBuilder {
    specs: Vec<ResourceSpec>,
    membership: Vec<Option<usize>>,
    groups: Vec<GroupSpec>,
    objects: ObjectTree,
    window: u64,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    /// Creates an empty builder with the default window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            membership: Vec::new(),
            groups: Vec::new(),
            objects: BTreeMap::new(),
            window: DEFAULT_WINDOW_SECS,
        }
    }

    /// Sets the coalescing window in seconds.
    #[must_use]
    pub fn window(mut self, secs: u64) -> Self {
        self.window = secs;
        self
    }

    /// Registers a resource, creating its object and instance on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Duplicate`] if the coordinate is taken.
    pub fn register_resource(&mut self, spec: ResourceSpec) -> Result<ResourceHandle, ResourceError> {
        let coord = spec.coord;
        let resources = self
            .objects
            .entry(coord.object)
            .or_default()
            .entry(coord.instance)
            .or_default();
        if resources.contains_key(&coord.resource) {
            return Err(ResourceError::Duplicate(coord));
        }

        let index = self.specs.len();
        resources.insert(coord.resource, index);
        self.specs.push(spec);
        self.membership.push(None);
        Ok(ResourceHandle(index))
    }

    /// Declares a group emitting `kind` messages with the given fields, in order.
    ///
    /// # Errors
    ///
    /// Returns error if `fields` is empty, a handle is foreign, or a resource
    /// already belongs to a group.
    pub fn register_group(
        &mut self,
        kind: impl Into<String>,
        fields: &[(&str, ResourceHandle)],
    ) -> Result<GroupHandle, ResourceError> {
        let kind = kind.into();
        if fields.is_empty() {
            return Err(ResourceError::EmptyGroup(kind));
        }

        let mut claimed = Vec::with_capacity(fields.len());
        for &(_, ResourceHandle(index)) in fields {
            let Some(owner) = self.membership.get(index) else {
                return Err(ResourceError::InvalidHandle(index));
            };
            if owner.is_some() || claimed.contains(&index) {
                return Err(ResourceError::AlreadyGrouped(self.specs[index].coord));
            }
            claimed.push(index);
        }

        let group = self.groups.len();
        for &index in &claimed {
            self.membership[index] = Some(group);
        }
        self.groups.push(GroupSpec {
            kind,
            fields: fields
                .iter()
                .map(|&(name, handle)| (name.to_string(), handle.0))
                .collect(),
        });
        Ok(GroupHandle(group))
    }

    /// Returns the ids of all objects created so far.
    #[must_use]
    pub fn object_ids(&self) -> Vec<u16> {
        self.objects.keys().copied().collect()
    }

    /// Returns the number of registered resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.specs.len()
    }

    /// Freezes the registration and returns the live bridge.
    #[must_use]
    pub fn build(
        self,
        queue: Arc<MessageQueue>,
        clock: Arc<dyn Clock>,
        logger: SharedLogger,
    ) -> ResourceBridge {
        let resources: Vec<Arc<Resource>> = self
            .specs
            .into_iter()
            .zip(self.membership)
            .map(|(spec, group)| Arc::new(Resource::new(spec, group)))
            .collect();

        let groups = self
            .groups
            .into_iter()
            .map(|spec| {
                let fields = spec
                    .fields
                    .into_iter()
                    .map(|(name, index)| GroupField::new(name, Arc::clone(&resources[index])))
                    .collect();
                ResourceGroup::new(spec.kind, fields, self.window)
            })
            .collect();

        let order: Vec<usize> = self
            .objects
            .values()
            .flat_map(BTreeMap::values)
            .flat_map(BTreeMap::values)
            .copied()
            .collect();
        let index = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.coord(), i))
            .collect();

        ResourceBridge {
            resources,
            groups,
            index,
            order,
            queue,
            clock,
            logger,
        }
    }
}

/// The live bridge between resource writes and the message queue.
pub struct ResourceBridge {
    resources: Vec<Arc<Resource>>,
    groups: Vec<ResourceGroup>,
    index: HashMap<ResourceCoord, usize>,
    order: Vec<usize>,
    queue: Arc<MessageQueue>,
    clock: Arc<dyn Clock>,
    logger: SharedLogger,
}

impl ResourceBridge {
    /// Handles a remote write: stores the value and evaluates the owning group.
    ///
    /// Returns `true` if the write completed a group round and queued a message.
    ///
    /// # Errors
    ///
    /// Returns error if no resource lives at `coord` or it is not writable.
    pub fn on_write(&self, coord: ResourceCoord, value: &str) -> Result<bool, ResourceError> {
        let resource = self.lookup(coord, ResourceMode::ReadWrite)?;
        resource.set_value(value);
        self.logger.log(
            LogLevel::Debug,
            &format!("{}: {value}", resource.spec().name),
        );
        Ok(self.touch(resource))
    }

    /// Handles a remote execute, storing `argument` as the value when present.
    ///
    /// # Errors
    ///
    /// Returns error if no resource lives at `coord` or it is not executable.
    pub fn on_execute(
        &self,
        coord: ResourceCoord,
        argument: Option<&str>,
    ) -> Result<bool, ResourceError> {
        let resource = self.lookup(coord, ResourceMode::Execute)?;
        if let Some(argument) = argument {
            resource.set_value(argument);
        }
        self.logger.log(
            LogLevel::Debug,
            &format!("{} executed", resource.spec().name),
        );
        Ok(self.touch(resource))
    }

    fn lookup(&self, coord: ResourceCoord, mode: ResourceMode) -> Result<&Resource, ResourceError> {
        let resource = self
            .index
            .get(&coord)
            .map(|&i| self.resources[i].as_ref())
            .ok_or(ResourceError::Unknown(coord))?;
        if resource.mode() != mode {
            return Err(ResourceError::ModeMismatch {
                coord,
                operation: mode.operation(),
            });
        }
        Ok(resource)
    }

    fn touch(&self, resource: &Resource) -> bool {
        let now = self.clock.now();
        let Some(group) = resource.group().map(|g| &self.groups[g]) else {
            resource.stamp(now);
            return false;
        };

        let emitted = group.record(resource, now, &self.queue);
        if emitted {
            self.logger.log(
                LogLevel::Info,
                &format!("queued {} message", group.kind()),
            );
        }
        emitted
    }

    /// Returns the resource behind a handle.
    #[must_use]
    pub fn resource(&self, handle: ResourceHandle) -> Option<&Arc<Resource>> {
        self.resources.get(handle.0)
    }

    /// Returns the resource at a coordinate.
    #[must_use]
    pub fn resource_at(&self, coord: ResourceCoord) -> Option<&Arc<Resource>> {
        self.index.get(&coord).map(|&i| &self.resources[i])
    }

    /// Returns the group behind a handle.
    #[must_use]
    pub fn group(&self, handle: GroupHandle) -> Option<&ResourceGroup> {
        self.groups.get(handle.0)
    }

    /// Returns the current value at a coordinate.
    #[must_use]
    pub fn value(&self, coord: ResourceCoord) -> Option<String> {
        self.resource_at(coord).map(|r| r.value())
    }

    /// Returns the last update stamp at a coordinate.
    #[must_use]
    pub fn last_update_time(&self, coord: ResourceCoord) -> Option<u64> {
        self.resource_at(coord).map(|r| r.last_update_time())
    }

    /// Describes every resource, ordered by object, instance and resource id.
    #[must_use]
    pub fn descriptors(&self) -> Vec<ResourceDescriptor> {
        self.order
            .iter()
            .map(|&i| ResourceDescriptor::from(self.resources[i].spec()))
            .collect()
    }

    /// Returns the outbound queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }
}

impl fmt::Debug for ResourceBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBridge")
            .field("resources", &self.resources.len())
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}
