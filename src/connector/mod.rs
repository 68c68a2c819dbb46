// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The single-threaded event loop.
//!
//! A [`Connector`] owns the cloud client and the bridge components. Producer
//! threads (the client's workers) only touch the queue, the tracker and the
//! wake signal; every subscriber callback runs on the thread that calls
//! [`Connector::run`].
//!
//! ```no_run
//! use std::thread;
//! # use std::sync::Arc;
//! # use enebular_connector::client::{ClientEvents, CloudClient, EndpointInfo};
//! # use enebular_connector::error::StartupError;
//! # use enebular_connector::resource::ResourceDescriptor;
//! use enebular_connector::Connector;
//! use enebular_connector::subscription::Subscribable;
//!
//! # struct Client;
//! # impl CloudClient for Client {
//! #     type Interface = ();
//! #     fn setup(&mut self, _: &[ResourceDescriptor], _: Arc<dyn ClientEvents>) -> Result<(), StartupError> { Ok(()) }
//! #     fn connect(&mut self, _: ()) -> Result<(), StartupError> { Ok(()) }
//! #     fn disconnect(&mut self) {}
//! #     fn endpoint_info(&self) -> Option<EndpointInfo> { None }
//! # }
//! # fn main() -> enebular_connector::Result<()> {
//! let mut connector = Connector::builder(Client).build()?;
//! connector.on_agent_message(|kind, content| println!("{kind}: {content}"));
//! connector.on_connection_state(|registered| println!("registered: {registered}"));
//!
//! connector.startup(())?;
//! let handle = connector.handle();
//! let worker = thread::spawn(move || {
//!     connector.run()?;
//!     connector.shutdown()
//! });
//!
//! // Later, from any thread:
//! handle.halt();
//! # let _ = worker.join();
//! # Ok(())
//! # }
//! ```

mod builder;
#[cfg(all(unix, feature = "signals"))]
mod signals;
mod state;

pub use builder::ConnectorBuilder;
#[cfg(all(unix, feature = "signals"))]
pub use signals::SignalGuard;
pub use state::LoopState;

use std::fmt;
use std::sync::Arc;

use state::SharedState;

use crate::bridge::ResourceBridge;
use crate::client::{ClientCallbacks, CloudClient};
use crate::config::ConnectorConfig;
use crate::connection::ConnectionTracker;
use crate::error::Error;
use crate::logger::{LogLevel, SharedLogger};
use crate::resource::AgentResources;
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::wake::{SharedWaker, WakeSignal, Waker};

/// An additional readiness source serviced by the loop.
///
/// The source is handed the loop's waker when registered and kicks it when it
/// has work. The loop then calls [`service`](Self::service) on every tick.
pub trait WaitSource: Send {
    /// Stores the waker to kick when ready.
    fn attach(&mut self, waker: SharedWaker);

    /// Handles whatever became ready. Called on the loop thread.
    fn service(&mut self);

    /// Releases the source. Called once from [`Connector::shutdown`].
    fn release(&mut self) {}
}

/// Bridges a cloud client to a single-threaded agent.
pub struct Connector<C: CloudClient> {
    client: C,
    config: ConnectorConfig,
    logger: SharedLogger,
    signal: Arc<WakeSignal>,
    bridge: Arc<ResourceBridge>,
    tracker: Arc<ConnectionTracker>,
    callbacks: Arc<CallbackRegistry>,
    agent: AgentResources,
    state: SharedState,
    wait_sources: Vec<Box<dyn WaitSource>>,
    shut_down: bool,
}

impl<C: CloudClient> Connector<C> {
    /// Creates a builder around `client`.
    #[must_use]
    pub fn builder(client: C) -> ConnectorBuilder<C> {
        ConnectorBuilder::new(client)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Hands the resource tree to the client and starts connecting.
    ///
    /// Registration completes later and is reported through the connection
    /// state callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the connector is idle, and
    /// [`Error::Startup`] if the client fails to set up or connect. A failed
    /// startup leaves the connector stopped.
    pub fn startup(&mut self, iface: C::Interface) -> Result<(), Error> {
        self.expect_state("start", LoopState::Idle)?;

        let events = Arc::new(ClientCallbacks::new(
            Arc::clone(&self.bridge),
            Arc::clone(&self.tracker),
            Arc::clone(&self.logger),
        ));
        let descriptors = self.bridge.descriptors();

        let result = self
            .client
            .setup(&descriptors, events)
            .and_then(|()| self.client.connect(iface));
        if let Err(e) = result {
            self.state.set(LoopState::Stopped);
            self.logger
                .log(LogLevel::Error, &format!("Connector startup failed: {e}"));
            return Err(e.into());
        }

        self.state.set(LoopState::Running);
        self.logger.log(LogLevel::Info, "Connector started");
        Ok(())
    }

    /// Runs the loop on the calling thread until halted.
    ///
    /// Each wake runs one [`tick`](Self::tick). A wake that finds the loop
    /// halting exits without ticking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the connector is running.
    pub fn run(&mut self) -> Result<(), Error> {
        if !matches!(self.state(), LoopState::Running | LoopState::Halting) {
            return Err(self.invalid_state("run"));
        }

        while self.state() == LoopState::Running {
            if !self.signal.wait() || self.state() != LoopState::Running {
                break;
            }
            self.tick();
        }

        self.state.set(LoopState::Stopped);
        self.logger.log(LogLevel::Info, "Connector stopped");
        Ok(())
    }

    /// Services wait sources, dispatches queued messages, then notifies the
    /// latest connection state if it changed.
    pub fn tick(&mut self) {
        for source in &mut self.wait_sources {
            source.service();
        }

        for message in self.bridge.queue().drain() {
            self.callbacks
                .dispatch_message(message.kind(), message.content());
        }

        if let Some(registered) = self.tracker.take_change() {
            self.callbacks.dispatch_connection_state(registered);
        }
    }

    /// Wakes the loop.
    pub fn kick(&self) {
        self.signal.kick();
    }

    /// Asks a running loop to stop. Has no effect in any other state.
    ///
    /// Returns `false` if the loop was not running.
    pub fn halt(&self) -> bool {
        self.handle().halt()
    }

    /// Disconnects the client and releases the wake signal and wait sources.
    ///
    /// Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while the loop is running or halting.
    pub fn shutdown(&mut self) -> Result<(), Error> {
        match self.state() {
            LoopState::Running | LoopState::Halting => return Err(self.invalid_state("shut down")),
            LoopState::Idle => self.state.set(LoopState::Stopped),
            LoopState::Stopped => {}
        }
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        self.client.disconnect();
        for mut source in self.wait_sources.drain(..) {
            source.release();
        }
        self.signal.release();
        self.logger.log(LogLevel::Info, "Connector shut down");
        Ok(())
    }

    /// Adds a readiness source to the loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] once the connector has stopped.
    pub fn register_wait_source(&mut self, mut source: Box<dyn WaitSource>) -> Result<(), Error> {
        if self.state() == LoopState::Stopped {
            return Err(self.invalid_state("register a wait source"));
        }
        source.attach(self.signal.clone());
        self.wait_sources.push(source);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns `true` if the client is registered. Safe to call from any
    /// thread through a [`ConnectorHandle`].
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.tracker.is_connected()
    }

    /// Returns the loop state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Returns a cloneable handle for other threads.
    #[must_use]
    pub fn handle(&self) -> ConnectorHandle {
        ConnectorHandle {
            state: self.state.clone(),
            signal: Arc::clone(&self.signal),
            tracker: Arc::clone(&self.tracker),
        }
    }

    /// Returns the device id assigned by the service, once known.
    #[must_use]
    pub fn device_id(&self) -> Option<String> {
        self.client
            .endpoint_info()
            .map(|info| info.internal_endpoint_name)
    }

    /// Returns the endpoint name. The configured name wins over the client's.
    #[must_use]
    pub fn endpoint_name(&self) -> Option<String> {
        self.config
            .endpoint_name
            .clone()
            .or_else(|| self.client.endpoint_info().map(|info| info.endpoint_name))
    }

    /// Returns the number of messages waiting for the next tick.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.bridge.queue().len()
    }

    /// Returns the resource bridge.
    #[must_use]
    pub fn bridge(&self) -> &Arc<ResourceBridge> {
        &self.bridge
    }

    /// Returns the handles of the installed agent resources.
    #[must_use]
    pub fn agent_resources(&self) -> &AgentResources {
        &self.agent
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Returns the cloud client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    fn expect_state(&self, operation: &'static str, expected: LoopState) -> Result<(), Error> {
        if self.state() == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state().name(),
        }
    }
}

impl<C: CloudClient> Subscribable for Connector<C> {
    fn on_agent_message<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.callbacks.on_agent_message(callback)
    }

    fn on_connection_state<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.callbacks.on_connection_state(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks.unsubscribe(id)
    }
}

impl<C: CloudClient> fmt::Debug for Connector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("state", &self.state())
            .field("tracker", &self.tracker)
            .field("bridge", &self.bridge)
            .field("callbacks", &self.callbacks)
            .field("wait_sources", &self.wait_sources.len())
            .finish_non_exhaustive()
    }
}

/// Thread-safe control handle for a [`Connector`].
///
/// Every method may be called from any thread, but none of them is
/// async-signal-safe: [`kick`](Self::kick) and [`halt`](Self::halt) lock the
/// wake signal. Use `halt_on_signals` (feature `signals`, Unix only) to stop
/// the loop on `SIGINT`/`SIGTERM`.
#[derive(Clone)]
pub struct ConnectorHandle {
    state: SharedState,
    signal: Arc<WakeSignal>,
    tracker: Arc<ConnectionTracker>,
}

impl ConnectorHandle {
    /// Wakes the loop.
    pub fn kick(&self) {
        self.signal.kick();
    }

    /// Asks a running loop to stop and wakes it.
    ///
    /// Returns `false` if the loop was not running.
    pub fn halt(&self) -> bool {
        let halted = self.state.transition(LoopState::Running, LoopState::Halting);
        if halted {
            self.signal.kick();
        }
        halted
    }

    /// Returns `true` if the client is registered.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.tracker.is_connected()
    }

    /// Returns the loop state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.state.get()
    }
}

impl fmt::Debug for ConnectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorHandle")
            .field("state", &self.state())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientEvents, EndpointInfo};
    use crate::clock::ManualClock;
    use crate::error::StartupError;
    use crate::logger::MemoryLogger;
    use crate::resource::{AgentResources, ResourceDescriptor};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct StubClient {
        events: Option<Arc<dyn ClientEvents>>,
        descriptors: usize,
        fail_connect: bool,
        disconnects: usize,
    }

    impl CloudClient for StubClient {
        type Interface = &'static str;

        fn setup(
            &mut self,
            resources: &[ResourceDescriptor],
            events: Arc<dyn ClientEvents>,
        ) -> Result<(), StartupError> {
            self.descriptors = resources.len();
            self.events = Some(events);
            Ok(())
        }

        fn connect(&mut self, iface: &'static str) -> Result<(), StartupError> {
            if self.fail_connect {
                return Err(StartupError::Connection(format!("{iface} is down")));
            }
            Ok(())
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
        }

        fn endpoint_info(&self) -> Option<EndpointInfo> {
            Some(EndpointInfo {
                endpoint_name: "stub-endpoint".to_string(),
                internal_endpoint_name: "0161d2c0".to_string(),
            })
        }
    }

    fn connector(client: StubClient) -> (Connector<StubClient>, Arc<MemoryLogger>) {
        let logger = Arc::new(MemoryLogger::new());
        let connector = Connector::builder(client)
            .with_logger(logger.clone())
            .with_clock(Arc::new(ManualClock::new(1_000)))
            .build()
            .unwrap();
        (connector, logger)
    }

    fn events(connector: &Connector<StubClient>) -> Arc<dyn ClientEvents> {
        Arc::clone(connector.client().events.as_ref().unwrap())
    }

    #[test]
    fn startup_hands_over_descriptors() {
        let (mut connector, logger) = connector(StubClient::default());
        connector.startup("eth0").unwrap();

        assert_eq!(connector.state(), LoopState::Running);
        assert_eq!(connector.client().descriptors, 8);
        assert!(logger.contains(LogLevel::Info, "Connector started"));
    }

    #[test]
    fn startup_failure_stops_connector() {
        let (mut connector, logger) = connector(StubClient {
            fail_connect: true,
            ..StubClient::default()
        });

        let err = connector.startup("wlan0").unwrap_err();
        assert!(matches!(
            err,
            Error::Startup(StartupError::Connection(ref msg)) if msg == "wlan0 is down"
        ));
        assert_eq!(connector.state(), LoopState::Stopped);
        assert!(logger.contains(LogLevel::Error, "startup failed"));
    }

    #[test]
    fn startup_twice_is_invalid() {
        let (mut connector, _) = connector(StubClient::default());
        connector.startup("eth0").unwrap();
        assert!(matches!(
            connector.startup("eth0"),
            Err(Error::InvalidState { state: "running", .. })
        ));
    }

    #[test]
    fn run_before_startup_is_invalid() {
        let (mut connector, _) = connector(StubClient::default());
        assert!(matches!(
            connector.run(),
            Err(Error::InvalidState { operation: "run", state: "idle" })
        ));
    }

    #[test]
    fn tick_dispatches_messages_before_state() {
        let (mut connector, _) = connector(StubClient::default());
        connector.startup("eth0").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_msg = Arc::clone(&seen);
        connector.on_agent_message(move |kind, _| seen_msg.lock().push(kind.to_string()));
        let seen_state = Arc::clone(&seen);
        connector.on_connection_state(move |registered| {
            seen_state.lock().push(format!("state:{registered}"));
        });

        let events = events(&connector);
        events.on_registered();
        events.on_resource_write(
            AgentResources::coord("deploy", "downloadUrl").unwrap(),
            "https://example.com/flow",
        );
        assert_eq!(connector.pending_messages(), 1);

        connector.tick();
        assert_eq!(*seen.lock(), ["deploy", "state:true"]);
        assert_eq!(connector.pending_messages(), 0);

        connector.tick();
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn halt_before_run_exits_without_tick() {
        let (mut connector, _) = connector(StubClient::default());
        connector.startup("eth0").unwrap();

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        connector.on_agent_message(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        events(&connector).on_resource_write(
            AgentResources::coord("deploy", "downloadUrl").unwrap(),
            "u",
        );

        assert!(connector.handle().halt());
        connector.run().unwrap();

        assert_eq!(connector.state(), LoopState::Stopped);
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert_eq!(connector.pending_messages(), 1);
    }

    #[test]
    fn halt_outside_running_is_ignored() {
        let (connector, _) = connector(StubClient::default());
        assert!(!connector.handle().halt());
        assert_eq!(connector.state(), LoopState::Idle);
    }

    #[test]
    fn shutdown_only_after_stop() {
        let (mut connector, logger) = connector(StubClient::default());
        connector.startup("eth0").unwrap();
        assert!(matches!(
            connector.shutdown(),
            Err(Error::InvalidState { operation: "shut down", .. })
        ));

        connector.halt();
        connector.run().unwrap();
        connector.shutdown().unwrap();
        connector.shutdown().unwrap();

        assert_eq!(connector.client().disconnects, 1);
        assert!(logger.contains(LogLevel::Info, "Connector shut down"));
    }

    #[test]
    fn endpoint_names() {
        let (connector, _) = connector(StubClient::default());
        assert_eq!(connector.device_id().as_deref(), Some("0161d2c0"));
        assert_eq!(connector.endpoint_name().as_deref(), Some("stub-endpoint"));

        let overridden = Connector::builder(StubClient::default())
            .with_config(ConnectorConfig::default().with_endpoint_name("gateway-7"))
            .with_logger(Arc::new(MemoryLogger::new()))
            .build()
            .unwrap();
        assert_eq!(overridden.endpoint_name().as_deref(), Some("gateway-7"));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = ConnectorConfig {
            coalescing_window_secs: 0,
            ..ConnectorConfig::default()
        };
        let result = Connector::builder(StubClient::default())
            .with_config(config)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    struct CountingSource {
        waker: Option<SharedWaker>,
        serviced: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
    }

    impl WaitSource for CountingSource {
        fn attach(&mut self, waker: SharedWaker) {
            self.waker = Some(waker);
        }

        fn service(&mut self) {
            self.serviced.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn wait_sources_are_serviced_and_released() {
        let (mut connector, _) = connector(StubClient::default());
        let serviced = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        connector
            .register_wait_source(Box::new(CountingSource {
                waker: None,
                serviced: Arc::clone(&serviced),
                released: Arc::clone(&released),
            }))
            .unwrap();

        connector.tick();
        connector.tick();
        assert_eq!(serviced.load(Ordering::SeqCst), 2);

        connector.shutdown().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(connector.register_wait_source(Box::new(CountingSource {
            waker: None,
            serviced,
            released,
        }))
        .is_err());
    }

    #[test]
    fn unsubscribe_through_connector() {
        let (mut connector, _) = connector(StubClient::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = connector.on_connection_state(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(connector.unsubscribe(id));

        connector.startup("eth0").unwrap();
        events(&connector).on_registered();
        connector.tick();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(connector.is_connected());
    }

    #[test]
    fn debug_output() {
        let (connector, _) = connector(StubClient::default());
        let debug = format!("{connector:?}");
        assert!(debug.contains("Connector"));
        assert!(debug.contains("Idle"));
        assert!(format!("{:?}", connector.handle()).contains("ConnectorHandle"));
    }
}
