// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic layout for one endpoint.

use crate::resource::ResourceCoord;

/// What an incoming publish asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    /// Write the payload to the resource.
    Write(ResourceCoord),
    /// Execute the resource with the payload as argument.
    Execute(ResourceCoord),
}

/// Builds and matches the topics of one endpoint.
///
/// # Examples
///
/// ```
/// use enebular_connector::mqtt::{TopicAction, TopicLayout};
/// use enebular_connector::resource::ResourceCoord;
///
/// let layout = TopicLayout::new("enebular", "gw-1");
/// assert_eq!(
///     layout.parse("enebular/gw-1/26242/0/26241"),
///     Some(TopicAction::Write(ResourceCoord::new(26242, 0, 26241)))
/// );
/// assert_eq!(layout.parse("enebular/gw-2/26242/0/26241"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicLayout {
    base: String,
}

impl TopicLayout {
    /// Creates the layout for `<prefix>/<endpoint>/`.
    #[must_use]
    pub fn new(prefix: &str, endpoint: &str) -> Self {
        Self {
            base: format!("{prefix}/{endpoint}/"),
        }
    }

    /// Filter matching resource writes.
    #[must_use]
    pub fn write_filter(&self) -> String {
        format!("{}+/+/+", self.base)
    }

    /// Filter matching resource executes.
    #[must_use]
    pub fn execute_filter(&self) -> String {
        format!("{}+/+/+/exec", self.base)
    }

    /// Topic the resource list is published on.
    #[must_use]
    pub fn objects_topic(&self) -> String {
        format!("{}objects", self.base)
    }

    /// Topic a write to `coord` arrives on.
    #[must_use]
    pub fn resource_topic(&self, coord: ResourceCoord) -> String {
        format!(
            "{}{}/{}/{}",
            self.base, coord.object, coord.instance, coord.resource
        )
    }

    /// Matches an incoming topic against this endpoint.
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<TopicAction> {
        let rest = topic.strip_prefix(&self.base)?;
        let (path, execute) = match rest.strip_suffix("/exec") {
            Some(path) => (path, true),
            None => (rest, false),
        };
        let coord: ResourceCoord = path.parse().ok()?;
        Some(if execute {
            TopicAction::Execute(coord)
        } else {
            TopicAction::Write(coord)
        })
    }
}
