// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resource addressing and typing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResourceError;

/// An `object/instance/resource` coordinate.
///
/// # Examples
///
/// ```
/// use enebular_connector::resource::ResourceCoord;
///
/// let coord: ResourceCoord = "26243/0/26241".parse().unwrap();
/// assert_eq!(coord, ResourceCoord::new(26243, 0, 26241));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceCoord {
    /// Object id.
    pub object: u16,
    /// Object instance id.
    pub instance: u16,
    /// Resource id.
    pub resource: u16,
}

impl ResourceCoord {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(object: u16, instance: u16, resource: u16) -> Self {
        Self {
            object,
            instance,
            resource,
        }
    }
}

impl fmt::Display for ResourceCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.object, self.instance, self.resource)
    }
}

impl FromStr for ResourceCoord {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ResourceError::InvalidCoord {
            input: s.to_string(),
            reason,
        };
        let mut parts = s.split('/');
        let mut next = |name: &str| -> Result<u16, ResourceError> {
            let part = parts
                .next()
                .ok_or_else(|| invalid(format!("missing {name} id")))?;
            part.parse()
                .map_err(|_| invalid(format!("invalid {name} id {part:?}")))
        };

        let coord = Self::new(next("object")?, next("instance")?, next("resource")?);
        if parts.next().is_some() {
            return Err(invalid("trailing segments".to_string()));
        }
        Ok(coord)
    }
}

/// Data type of a resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// UTF-8 text.
    #[default]
    String,
    /// Signed integer, carried as its decimal text.
    Integer,
    /// Floating point number, carried as its decimal text.
    Float,
}

/// How the server interacts with a resource. The two modes are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMode {
    /// `GET`/`PUT`: the server sets the value.
    ReadWrite,
    /// `GET`/`POST`: the server invokes an action.
    Execute,
}

impl ResourceMode {
    /// Name of the operation this mode accepts.
    #[must_use]
    pub fn operation(self) -> &'static str {
        match self {
            Self::ReadWrite => "write",
            Self::Execute => "execute",
        }
    }
}
