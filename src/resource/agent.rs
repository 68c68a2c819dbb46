// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The agent's resource table.
//!
//! | Message      | Field               | Coordinate        |
//! |--------------|---------------------|-------------------|
//! | `deploy`     | downloadUrl         | 26242/0/26241     |
//! | `register`   | connectionId        | 26243/0/26241     |
//! |              | deviceId            | 26243/0/26242     |
//! |              | authRequestUrl      | 26243/0/26243     |
//! |              | agentManagerBaseUrl | 26243/0/26244     |
//! | `updateAuth` | accessToken         | 26244/0/26241     |
//! |              | idToken             | 26244/0/26242     |
//! |              | state               | 26244/0/26243     |

use super::{ResourceCoord, ResourceSpec};
use crate::bridge::{BridgeBuilder, GroupHandle, ResourceHandle};
use crate::error::ResourceError;
use crate::message;

/// Deploy-flow object id.
pub const OBJECT_DEPLOY_FLOW: u16 = 26242;
/// Register object id.
pub const OBJECT_REGISTER: u16 = 26243;
/// Auth-token object id.
pub const OBJECT_AUTH_TOKEN: u16 = 26244;

const FIRST_RESOURCE: u16 = 26241;

/// `(field, resource type name)` per group, in message field order.
const DEPLOY_FIELDS: [(&str, &str); 1] = [("downloadUrl", "download_url")];
const REGISTER_FIELDS: [(&str, &str); 4] = [
    ("connectionId", "connection_id"),
    ("deviceId", "device_id"),
    ("authRequestUrl", "auth_request_url"),
    ("agentManagerBaseUrl", "agent_manager_base_url"),
];
const UPDATE_AUTH_FIELDS: [(&str, &str); 3] = [
    ("accessToken", "access_token"),
    ("idToken", "id_token"),
    ("state", "state"),
];

/// Handles to the agent's groups, as installed into a [`BridgeBuilder`].
#[derive(Debug, Clone)]
pub struct AgentResources {
    /// The `deploy` group.
    pub deploy: GroupHandle,
    /// The `register` group.
    pub register: GroupHandle,
    /// The `updateAuth` group.
    pub update_auth: GroupHandle,
    /// Every installed resource, in table order.
    pub resources: Vec<ResourceHandle>,
}

impl AgentResources {
    /// Registers the agent's resources and groups.
    ///
    /// # Errors
    ///
    /// Returns error if any of the coordinates is already taken.
    pub fn install(builder: &mut BridgeBuilder) -> Result<Self, ResourceError> {
        let mut resources = Vec::new();
        let deploy = install_group(
            builder,
            message::DEPLOY,
            OBJECT_DEPLOY_FLOW,
            &DEPLOY_FIELDS,
            &mut resources,
        )?;
        let register = install_group(
            builder,
            message::REGISTER,
            OBJECT_REGISTER,
            &REGISTER_FIELDS,
            &mut resources,
        )?;
        let update_auth = install_group(
            builder,
            message::UPDATE_AUTH,
            OBJECT_AUTH_TOKEN,
            &UPDATE_AUTH_FIELDS,
            &mut resources,
        )?;

        Ok(Self {
            deploy,
            register,
            update_auth,
            resources,
        })
    }

    /// Returns the coordinate of a message field, e.g. `("register", "deviceId")`.
    #[must_use]
    pub fn coord(kind: &str, field: &str) -> Option<ResourceCoord> {
        let (object, fields): (u16, &[(&str, &str)]) = match kind {
            message::DEPLOY => (OBJECT_DEPLOY_FLOW, &DEPLOY_FIELDS),
            message::REGISTER => (OBJECT_REGISTER, &REGISTER_FIELDS),
            message::UPDATE_AUTH => (OBJECT_AUTH_TOKEN, &UPDATE_AUTH_FIELDS),
            _ => return None,
        };
        let offset = fields.iter().position(|(name, _)| *name == field)?;
        let offset = u16::try_from(offset).ok()?;
        Some(ResourceCoord::new(object, 0, FIRST_RESOURCE + offset))
    }
}

fn install_group(
    builder: &mut BridgeBuilder,
    kind: &str,
    object: u16,
    fields: &[(&str, &str)],
    installed: &mut Vec<ResourceHandle>,
) -> Result<GroupHandle, ResourceError> {
    let mut members = Vec::with_capacity(fields.len());
    for (resource, &(field, name)) in (FIRST_RESOURCE..).zip(fields) {
        let handle = builder.register_resource(ResourceSpec::write(
            ResourceCoord::new(object, 0, resource),
            name,
        ))?;
        installed.push(handle);
        members.push((field, handle));
    }
    builder.register_group(kind, &members)
}
