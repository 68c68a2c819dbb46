// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT client configuration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::MqttCloudClient;
use crate::error::StartupError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default topic prefix.
pub const DEFAULT_TOPIC_PREFIX: &str = "enebular";

/// Resolved configuration for an [`MqttCloudClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttClientConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// `(username, password)`, if the broker needs them.
    pub credentials: Option<(String, String)>,
    /// MQTT client id; also reported as the device id.
    pub client_id: String,
    /// Keep-alive interval. Each ping response counts as a registration refresh.
    pub keep_alive: Duration,
    /// First topic level.
    pub topic_prefix: String,
    /// Second topic level; the device's endpoint name.
    pub endpoint_name: String,
    /// Pause before polling again after a connection error.
    pub reconnect_delay: Duration,
}

/// Builder for an [`MqttCloudClient`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use enebular_connector::mqtt::MqttClientBuilder;
///
/// let client = MqttClientBuilder::new()
///     .broker("tcp://broker.local:8883")
///     .credentials("agent", "secret")
///     .keep_alive(Duration::from_secs(60))
///     .endpoint_name("gateway-01")
///     .build()
///     .unwrap();
///
/// assert_eq!(client.config().port, 8883);
/// assert_eq!(client.config().topic_prefix, "enebular");
/// ```
#[derive(Debug, Default)]
pub struct MqttClientBuilder {
    broker: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    keep_alive: Option<Duration>,
    topic_prefix: Option<String>,
    endpoint_name: Option<String>,
    reconnect_delay: Option<Duration>,
}

impl MqttClientBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the MQTT broker URL (`mqtt://`, `tcp://` or bare `host[:port]`).
    #[must_use]
    pub fn broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = Some(broker.into());
        self
    }

    /// Sets authentication credentials for the MQTT broker.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets a custom client ID.
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets the keep-alive interval. Zero disables keep-alive; any other value
    /// must be at least one second.
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = Some(duration);
        self
    }

    /// Sets the topic prefix. Defaults to `enebular`.
    #[must_use]
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }

    /// Sets the endpoint name. Defaults to `enebular-<uuid>`.
    #[must_use]
    pub fn endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = Some(name.into());
        self
    }

    /// Sets the pause between reconnection attempts.
    #[must_use]
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    /// Resolves the configuration without building a client.
    ///
    /// # Errors
    ///
    /// Returns error if the broker is missing or its address is invalid, if
    /// a topic level contains MQTT wildcards, or if the keep-alive is shorter
    /// than one second.
    pub fn into_config(self) -> Result<MqttClientConfig, StartupError> {
        let broker = self
            .broker
            .ok_or_else(|| StartupError::InvalidAddress("broker is required".to_string()))?;
        let (host, port) = parse_mqtt_url(&broker)?;

        // PID + counter keeps several connectors in one process apart
        let client_id = self.client_id.unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("enebular_{}_{}", std::process::id(), counter)
        });
        let endpoint_name = self
            .endpoint_name
            .unwrap_or_else(|| format!("enebular-{}", uuid::Uuid::new_v4()));
        let topic_prefix = self
            .topic_prefix
            .unwrap_or_else(|| DEFAULT_TOPIC_PREFIX.to_string());

        for (field, level) in [("topic_prefix", &topic_prefix), ("endpoint_name", &endpoint_name)] {
            if level.is_empty() || level.contains(['+', '#']) {
                return Err(StartupError::InvalidAddress(format!(
                    "invalid {field}: {level:?}"
                )));
            }
        }

        let keep_alive = self.keep_alive.unwrap_or(Duration::from_secs(30));
        if !keep_alive.is_zero() && keep_alive < Duration::from_secs(1) {
            return Err(StartupError::InvalidConfig(format!(
                "keep_alive must be zero or at least 1s, got {keep_alive:?}"
            )));
        }

        Ok(MqttClientConfig {
            host,
            port,
            credentials: self.username.zip(self.password),
            client_id,
            keep_alive,
            topic_prefix,
            endpoint_name,
            reconnect_delay: self.reconnect_delay.unwrap_or(Duration::from_secs(1)),
        })
    }

    /// Builds the client. Nothing connects until
    /// [`Connector::startup`](crate::Connector::startup).
    ///
    /// # Errors
    ///
    /// Same as [`into_config`](Self::into_config).
    pub fn build(self) -> Result<MqttCloudClient, StartupError> {
        Ok(MqttCloudClient::new(self.into_config()?))
    }
}

/// Parses an MQTT URL into host and port. The port defaults to 1883.
///
/// IPv6 hosts must be bracketed (`[::1]:1883`); the brackets are stripped
/// from the returned host.
///
/// # Errors
///
/// Returns error if the host is empty or the port is not a number.
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), StartupError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some(bracketed) = url.strip_prefix('[') {
        let (host, rest) = bracketed
            .split_once(']')
            .ok_or_else(|| StartupError::InvalidAddress(format!("Unclosed bracket: {url}")))?;
        match rest {
            "" => (host, 1883),
            _ => {
                let p = rest.strip_prefix(':').ok_or_else(|| {
                    StartupError::InvalidAddress(format!("Invalid address: {url}"))
                })?;
                (host, parse_port(p)?)
            }
        }
    } else {
        match url.rsplit_once(':') {
            Some((h, p)) => (h, parse_port(p)?),
            None => (url, 1883),
        }
    };

    if host.is_empty() {
        return Err(StartupError::InvalidAddress("empty host".to_string()));
    }
    Ok((host.to_string(), port))
}

fn parse_port(p: &str) -> Result<u16, StartupError> {
    p.parse()
        .map_err(|_| StartupError::InvalidAddress(format!("Invalid port: {p}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mqtt_url_with_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1883").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_default_port() {
        let (host, port) = parse_mqtt_url("broker.local").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_tcp_scheme() {
        let (host, port) = parse_mqtt_url("tcp://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn parse_mqtt_url_rejects_bad_input() {
        assert!(matches!(
            parse_mqtt_url("mqtt://broker:port"),
            Err(StartupError::InvalidAddress(_))
        ));
        assert!(parse_mqtt_url("mqtt://:1883").is_err());
    }

    #[test]
    fn parse_mqtt_url_ipv6() {
        assert_eq!(
            parse_mqtt_url("mqtt://[::1]:1884").unwrap(),
            ("::1".to_string(), 1884)
        );
        assert_eq!(
            parse_mqtt_url("[fe80::2]").unwrap(),
            ("fe80::2".to_string(), 1883)
        );
        assert!(parse_mqtt_url("[::1").is_err());
        assert!(parse_mqtt_url("[::1]1883").is_err());
        assert!(parse_mqtt_url("[]:1883").is_err());
    }

    #[test]
    fn builder_rejects_sub_second_keep_alive() {
        let err = MqttClientBuilder::new()
            .broker("127.0.0.1:1")
            .keep_alive(Duration::from_millis(500))
            .build()
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidConfig(_)));

        let config = MqttClientBuilder::new()
            .broker("h")
            .keep_alive(Duration::ZERO)
            .into_config()
            .unwrap();
        assert!(config.keep_alive.is_zero());
    }

    #[test]
    fn builder_requires_broker() {
        let err = MqttClientBuilder::new().into_config().unwrap_err();
        assert!(err.to_string().contains("broker is required"));
    }

    #[test]
    fn builder_defaults() {
        let config = MqttClientBuilder::new()
            .broker("localhost")
            .into_config()
            .unwrap();

        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive, Duration::from_secs(30));
        assert_eq!(config.topic_prefix, "enebular");
        assert!(config.endpoint_name.starts_with("enebular-"));
        assert!(config.client_id.starts_with("enebular_"));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn builder_unique_client_ids() {
        let a = MqttClientBuilder::new().broker("h").into_config().unwrap();
        let b = MqttClientBuilder::new().broker("h").into_config().unwrap();
        assert_ne!(a.client_id, b.client_id);
        assert_ne!(a.endpoint_name, b.endpoint_name);
    }

    #[test]
    fn builder_with_everything() {
        let config = MqttClientBuilder::new()
            .broker("mqtt://broker:1884")
            .credentials("user", "pass")
            .client_id("my_client")
            .keep_alive(Duration::from_secs(60))
            .topic_prefix("acme/agents")
            .endpoint_name("gw-7")
            .reconnect_delay(Duration::from_millis(250))
            .into_config()
            .unwrap();

        assert_eq!(config.host, "broker");
        assert_eq!(config.port, 1884);
        assert_eq!(
            config.credentials,
            Some(("user".to_string(), "pass".to_string()))
        );
        assert_eq!(config.client_id, "my_client");
        assert_eq!(config.topic_prefix, "acme/agents");
        assert_eq!(config.endpoint_name, "gw-7");
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn builder_rejects_wildcards() {
        let err = MqttClientBuilder::new()
            .broker("h")
            .endpoint_name("gw/#")
            .into_config()
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidAddress(_)));
    }
}
