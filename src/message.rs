// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Agent manager messages.
//!
//! An [`AgentMessage`] is what the bridge hands to the loop: a message type
//! (`"deploy"`, `"register"`, `"updateAuth"`) and a JSON object built from the
//! current values of a resource group. The typed payload structs let a
//! consumer decode the content without repeating the field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type emitted by the deploy group.
pub const DEPLOY: &str = "deploy";
/// Message type emitted by the register group.
pub const REGISTER: &str = "register";
/// Message type emitted by the update-auth group.
pub const UPDATE_AUTH: &str = "updateAuth";

/// An outbound message for the agent manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    kind: String,
    content: String,
}

impl AgentMessage {
    /// Creates a message from its type and JSON content.
    #[must_use]
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
        }
    }

    /// Returns the message type.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the JSON-encoded content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Parses the content as a specific payload type.
    ///
    /// # Errors
    ///
    /// Returns error if the content does not match `T`.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.content)
    }
}

/// Builds a flat JSON object from `(field, value)` pairs, keeping their order.
///
/// Values are emitted as JSON strings, escaped as needed.
#[must_use]
pub fn encode_fields<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::from("{");
    for (i, (name, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::from(name).to_string());
        out.push(':');
        out.push_str(&Value::from(value).to_string());
    }
    out.push('}');
    out
}

/// Content of a `deploy` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployMessage {
    /// Where to fetch the flow package from.
    pub download_url: String,
}

/// Content of a `register` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMessage {
    /// Agent manager connection id.
    pub connection_id: String,
    /// Agent manager device id.
    pub device_id: String,
    /// URL used to request authentication.
    pub auth_request_url: String,
    /// Base URL of the agent manager API.
    pub agent_manager_base_url: String,
}

/// Content of an `updateAuth` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthMessage {
    /// New access token.
    pub access_token: String,
    /// New id token.
    pub id_token: String,
    /// Opaque state echoed back to the auth request.
    pub state: String,
}
