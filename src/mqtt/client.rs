// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MQTT cloud client and its worker thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tokio::sync::oneshot;

use super::config::MqttClientConfig;
use super::topic::{TopicAction, TopicLayout};
use crate::client::{ClientEvents, CloudClient, EndpointInfo};
use crate::error::{ConnectorErrorKind, StartupError};
use crate::resource::ResourceDescriptor;

/// A [`CloudClient`] that talks to an MQTT broker from its own thread.
pub struct MqttCloudClient {
    config: MqttClientConfig,
    layout: TopicLayout,
    resources: Vec<ResourceDescriptor>,
    events: Option<Arc<dyn ClientEvents>>,
    worker: Option<Worker>,
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

impl MqttCloudClient {
    /// Creates an unconnected client.
    #[must_use]
    pub fn new(config: MqttClientConfig) -> Self {
        let layout = TopicLayout::new(&config.topic_prefix, &config.endpoint_name);
        Self {
            config,
            layout,
            resources: Vec::new(),
            events: None,
            worker: None,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MqttClientConfig {
        &self.config
    }

    /// Returns the topic layout of this endpoint.
    #[must_use]
    pub fn topics(&self) -> &TopicLayout {
        &self.layout
    }

    /// Returns the resources handed over at setup.
    #[must_use]
    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Returns `true` while the worker thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.thread.is_finished())
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            &self.config.client_id,
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(self.config.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.config.credentials {
            options.set_credentials(username.clone(), password.clone());
        }
        options
    }
}

impl CloudClient for MqttCloudClient {
    type Interface = ();

    fn setup(
        &mut self,
        resources: &[ResourceDescriptor],
        events: Arc<dyn ClientEvents>,
    ) -> Result<(), StartupError> {
        tracing::debug!(
            endpoint = %self.config.endpoint_name,
            resources = resources.len(),
            "Resource list received"
        );
        self.resources = resources.to_vec();
        self.events = Some(events);
        Ok(())
    }

    fn connect(&mut self, (): ()) -> Result<(), StartupError> {
        if self.worker.is_some() {
            return Err(StartupError::Connection("already connected".to_string()));
        }
        let events = self
            .events
            .clone()
            .ok_or_else(|| StartupError::Provisioning("setup was not called".to_string()))?;
        let objects = serde_json::to_string(&self.resources)
            .map_err(|e| StartupError::Provisioning(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StartupError::Worker(e.to_string()))?;

        let session = Session {
            events,
            layout: self.layout.clone(),
            objects,
            reconnect_delay: self.config.reconnect_delay,
            registered: false,
        };
        let options = self.options();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("cloud-client".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let (client, event_loop) = AsyncClient::new(options, 10);
                    session.run(client, event_loop, shutdown_rx).await;
                });
            })
            .map_err(|e| StartupError::Worker(e.to_string()))?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            "MQTT cloud client started"
        );
        self.worker = Some(Worker {
            shutdown: shutdown_tx,
            thread,
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // The worker may already be gone; a closed channel is fine
        let _ = worker.shutdown.send(());
        if worker.thread.join().is_err() {
            tracing::error!("MQTT worker thread panicked");
        }
        tracing::info!(endpoint = %self.config.endpoint_name, "MQTT cloud client stopped");
    }

    fn endpoint_info(&self) -> Option<EndpointInfo> {
        Some(EndpointInfo {
            endpoint_name: self.config.endpoint_name.clone(),
            internal_endpoint_name: self.config.client_id.clone(),
        })
    }
}

impl Drop for MqttCloudClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for MqttCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttCloudClient")
            .field("config", &self.config)
            .field("resources", &self.resources.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// State owned by the worker thread.
struct Session {
    events: Arc<dyn ClientEvents>,
    layout: TopicLayout,
    objects: String,
    reconnect_delay: std::time::Duration,
    registered: bool,
}

impl Session {
    async fn run(
        mut self,
        client: AsyncClient,
        mut event_loop: EventLoop,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(packet)) => self.handle_packet(&client, packet),
                    Ok(Event::Outgoing(_)) => {}
                    Err(e) => {
                        self.handle_error(&e);
                        tokio::select! {
                            _ = &mut shutdown => break,
                            () = tokio::time::sleep(self.reconnect_delay) => {}
                        }
                    }
                },
            }
        }

        if client.try_disconnect().is_err() {
            tracing::debug!("MQTT disconnect request dropped");
        }
        self.set_unregistered();
    }

    fn handle_packet(&mut self, client: &AsyncClient, packet: Packet) {
        match packet {
            Packet::ConnAck(connack) => {
                tracing::debug!(?connack, "MQTT connected");
                for filter in [self.layout.write_filter(), self.layout.execute_filter()] {
                    if let Err(e) = client.try_subscribe(filter, QoS::AtLeastOnce) {
                        tracing::warn!(error = %e, "MQTT subscribe request dropped");
                    }
                }
                if let Err(e) = client.try_publish(
                    self.layout.objects_topic(),
                    QoS::AtLeastOnce,
                    true,
                    self.objects.clone(),
                ) {
                    tracing::warn!(error = %e, "MQTT resource list publish dropped");
                }
                self.registered = true;
                self.events.on_registered();
            }
            Packet::SubAck(suback) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Packet::PingResp => {
                if self.registered {
                    self.events.on_registration_updated();
                }
            }
            Packet::Publish(publish) => {
                let Ok(payload) = std::str::from_utf8(&publish.payload) else {
                    tracing::warn!(topic = %publish.topic, "Ignoring non UTF-8 payload");
                    return;
                };
                tracing::debug!(topic = %publish.topic, payload = %payload, "Received MQTT message");
                match self.layout.parse(&publish.topic) {
                    Some(TopicAction::Write(coord)) => {
                        self.events.on_resource_write(coord, payload);
                    }
                    Some(TopicAction::Execute(coord)) => {
                        let argument = (!payload.is_empty()).then_some(payload);
                        self.events.on_resource_execute(coord, argument);
                    }
                    None => {}
                }
            }
            Packet::Disconnect => {
                tracing::debug!("MQTT broker sent disconnect");
                self.set_unregistered();
            }
            _ => {}
        }
    }

    fn handle_error(&mut self, error: &ConnectionError) {
        let kind = classify(error);
        tracing::error!(error = %error, kind = %kind, "MQTT event loop error");
        self.events.on_error(kind.code(), Some(&error.to_string()));
        self.set_unregistered();
    }

    fn set_unregistered(&mut self) {
        if std::mem::take(&mut self.registered) {
            self.events.on_unregistered();
        }
    }
}

/// Maps an event loop failure onto the connector error table.
fn classify(error: &ConnectionError) -> ConnectorErrorKind {
    match error {
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => {
            ConnectorErrorKind::Timeout
        }
        ConnectionError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            ConnectorErrorKind::Timeout
        }
        ConnectionError::Io(_) | ConnectionError::MqttState(_) => ConnectorErrorKind::NetworkError,
        ConnectionError::ConnectionRefused(code) => match code {
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
                ConnectorErrorKind::NotAllowed
            }
            ConnectReturnCode::BadClientId | ConnectReturnCode::RefusedProtocolVersion => {
                ConnectorErrorKind::InvalidParameters
            }
            _ => ConnectorErrorKind::NetworkError,
        },
        ConnectionError::NotConnAck(_) => ConnectorErrorKind::ResponseParseFailed,
        _ => ConnectorErrorKind::UnknownError,
    }
}
