// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT cloud client using mockforge-mqtt.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use enebular_connector::mqtt::{MqttClientBuilder, MqttCloudClient};
use enebular_connector::{
    CloudClient, Connector, ConnectorHandle, LogLevel, LoopState, MemoryLogger, StartupError,
    Subscribable,
};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use parking_lot::Mutex;
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

/// Polls `condition` for up to five seconds.
async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..50 {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100)).await;
    }
    condition()
}

fn client(port: u16) -> MqttCloudClient {
    MqttClientBuilder::new()
        .broker(format!("mqtt://127.0.0.1:{port}"))
        .endpoint_name("it-gateway")
        .keep_alive(Duration::from_secs(5))
        .reconnect_delay(Duration::from_millis(100))
        .build()
        .unwrap()
}

/// Starts the connector and runs its loop on a separate thread.
fn run(
    mut connector: Connector<MqttCloudClient>,
) -> (ConnectorHandle, thread::JoinHandle<Connector<MqttCloudClient>>) {
    connector.startup(()).unwrap();
    let handle = connector.handle();
    let worker = thread::spawn(move || {
        connector.run().unwrap();
        connector
    });
    (handle, worker)
}

// ============================================================================
// Registration
// ============================================================================

mod registration {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connack_registers_device() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let logger = Arc::new(MemoryLogger::new());
        let connector = Connector::builder(client(port))
            .with_logger(logger.clone())
            .build()
            .unwrap();
        assert_eq!(connector.endpoint_name().as_deref(), Some("it-gateway"));

        let states = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&states);
        connector.on_connection_state(move |registered| seen.lock().push(registered));

        let (handle, worker) = run(connector);
        assert!(eventually(|| handle.is_connected()).await);
        assert!(eventually(|| states.lock().first() == Some(&true)).await);
        assert!(logger.contains(LogLevel::Info, "Client registered"));

        assert!(handle.halt());
        let mut connector = worker.join().unwrap();
        assert_eq!(connector.state(), LoopState::Stopped);

        connector.shutdown().unwrap();
        assert!(!connector.client().is_running());
        assert!(!connector.is_connected());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn device_id_is_client_id() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let client = MqttClientBuilder::new()
            .broker(format!("127.0.0.1:{port}"))
            .client_id("enebular-it-client")
            .build()
            .unwrap();
        let connector = Connector::builder(client)
            .with_logger(Arc::new(MemoryLogger::new()))
            .build()
            .unwrap();
        assert_eq!(connector.device_id().as_deref(), Some("enebular-it-client"));

        let (handle, worker) = run(connector);
        assert!(eventually(|| handle.is_connected()).await);

        handle.halt();
        worker.join().unwrap().shutdown().unwrap();
    }
}

// ============================================================================
// Resource writes
// ============================================================================

mod writes {
    use super::*;
    use enebular_connector::AgentResources;
    use rumqttc::{AsyncClient, MqttOptions, QoS};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Connects a second client that plays the device-management server.
    fn server_client(port: u16) -> AsyncClient {
        let options = MqttOptions::new("it-server", "127.0.0.1", port);
        let (client, mut event_loop) = AsyncClient::new(options, 10);
        tokio::spawn(async move {
            while event_loop.poll().await.is_ok() {}
        });
        client
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn published_download_url_reaches_subscriber_as_deploy() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let connector = Connector::builder(client(port))
            .with_logger(Arc::new(MemoryLogger::new()))
            .build()
            .unwrap();
        let topic = connector
            .client()
            .topics()
            .resource_topic(AgentResources::coord("deploy", "downloadUrl").unwrap());
        assert_eq!(topic, "enebular/it-gateway/26242/0/26241");

        let (tx, mut rx) = mpsc::unbounded_channel();
        connector.on_agent_message(move |kind, content| {
            let _ = tx.send((kind.to_string(), content.to_string()));
        });

        let (handle, worker) = run(connector);
        assert!(eventually(|| handle.is_connected()).await);

        // Retry until the connector's subscription is active on the broker.
        let server = server_client(port);
        let mut delivered = None;
        for _ in 0..10 {
            server
                .publish(&topic, QoS::AtLeastOnce, false, "https://flows/42")
                .await
                .unwrap();
            if let Ok(Some(message)) = timeout(Duration::from_millis(500), rx.recv()).await {
                delivered = Some(message);
                break;
            }
        }

        assert_eq!(
            delivered,
            Some((
                "deploy".to_string(),
                r#"{"downloadUrl":"https://flows/42"}"#.to_string()
            ))
        );

        handle.halt();
        worker.join().unwrap().shutdown().unwrap();
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_broker_reports_errors() {
        // Nothing listens on this port
        let port = get_test_port();

        let logger = Arc::new(MemoryLogger::new());
        let connector = Connector::builder(client(port))
            .with_logger(logger.clone())
            .build()
            .unwrap();

        let (handle, worker) = run(connector);
        assert!(eventually(|| logger.contains(LogLevel::Error, "Client error occurred")).await);
        assert!(!handle.is_connected());
        assert_eq!(handle.state(), LoopState::Running);

        handle.halt();
        worker.join().unwrap().shutdown().unwrap();
    }

    #[test]
    fn invalid_broker_is_rejected_before_connecting() {
        let err = MqttClientBuilder::new()
            .broker("mqtt://127.0.0.1:not-a-port")
            .build()
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidAddress(_)));
    }

    #[test]
    fn sub_second_keep_alive_is_rejected_before_connecting() {
        let err = MqttClientBuilder::new()
            .broker("127.0.0.1:1")
            .keep_alive(Duration::from_millis(500))
            .build()
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidConfig(_)));
    }

    #[test]
    fn connect_twice_is_rejected() {
        let mut client = client(get_test_port());
        client
            .setup(&[], Arc::new(NullEvents))
            .unwrap();
        client.connect(()).unwrap();

        assert!(matches!(
            client.connect(()),
            Err(StartupError::Connection(_))
        ));
        client.disconnect();
        assert!(!client.is_running());
    }

    struct NullEvents;

    impl enebular_connector::ClientEvents for NullEvents {
        fn on_registered(&self) {}
        fn on_registration_updated(&self) {}
        fn on_unregistered(&self) {}
        fn on_error(&self, _code: i32, _details: Option<&str>) {}
        fn on_resource_write(&self, _coord: enebular_connector::ResourceCoord, _value: &str) {}
        fn on_resource_execute(
            &self,
            _coord: enebular_connector::ResourceCoord,
            _argument: Option<&str>,
        ) {
        }
    }
}
