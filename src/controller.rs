//! Connection lifecycle controller.
//!
//! [`SensorController`] owns the session for the currently connected anthill
//! sensor and drives scan/connect/disconnect decisions in response to
//! transport events. Inbound telemetry is decoded and accumulated into the
//! active session, and two change notifications are published to interested
//! observers: active-device-changed and readings-changed.
//!
//! The controller is single-threaded by design: events are consumed from one
//! queue and each transition completes, including all notifications, before
//! the next event is handled. Direct observers run synchronously inside
//! event processing, so a slow observer stalls the queue; broadcast
//! subscribers receive cloned snapshots and run on their own tasks.
//!
//! There is no terminal state. After a disconnect the controller returns to
//! scanning, so the link is self-healing for the life of the process.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::data::{Reading, Session, UploadRecord};
use crate::error::{Error, Result};
use crate::protocol;
use crate::transport::{Peripheral, Transport, TransportEvent};

/// How long a scan runs before the transport gives up.
///
/// One constant for every scan the controller issues, initial and resumed
/// alike.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Notification topic for active device changes.
pub const TOPIC_ACTIVE_DEVICE_CHANGED: &str = "ActiveDeviceChanged";
/// Notification topic for reading accumulation.
pub const TOPIC_READINGS_CHANGED: &str = "ReadingsChanged";

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Scan timeout handed to the transport on every scan.
    pub scan_timeout: Duration,
    /// Opaque device-install identifier used as `userid` in upload records.
    pub install_id: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            install_id: None,
        }
    }
}

/// The controller's position in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    /// Transport not yet ready.
    Idle,
    /// Transport initialized, not scanning.
    Ready,
    /// Scanning for anthill sensors.
    Scanning,
    /// Connection attempt in flight.
    Connecting {
        /// The peripheral the attempt targets.
        peripheral_id: String,
    },
    /// Connected; exactly one session is active.
    Connected,
}

impl ControllerState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Ready => write!(f, "Ready"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting { peripheral_id } => write!(f, "Connecting({peripheral_id})"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// A change notification broadcast to subscribers.
///
/// Mirrors the [`SensorObserver`] contract for collaborators that prefer a
/// channel over implementing the trait. Each variant is published under its
/// named topic (see [`Notification::topic`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The active device changed; carries the new session identity.
    ActiveDeviceChanged(Option<String>),
    /// Readings were appended; carries a snapshot of all readings of the
    /// active session and its identity.
    ReadingsChanged {
        /// All readings of the active session at notification time.
        readings: Vec<Reading>,
        /// The active session identity.
        session: Option<String>,
    },
}

impl Notification {
    /// The process-wide topic name this notification is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::ActiveDeviceChanged(_) => TOPIC_ACTIVE_DEVICE_CHANGED,
            Self::ReadingsChanged { .. } => TOPIC_READINGS_CHANGED,
        }
    }
}

/// Observer contract for session and reading changes.
///
/// Observers are invoked synchronously from within event processing and must
/// not block indefinitely. The session reference is a read-only snapshot
/// taken at notification time.
pub trait SensorObserver: Send + Sync {
    /// The active device changed. `None` means the device disconnected.
    fn on_active_device_changed(&self, session: Option<&Session>);

    /// Readings were appended to the active session. `readings` holds all
    /// readings of that session in arrival order.
    fn on_readings_changed(&self, readings: &[Reading], session: Option<&Session>);
}

/// The connection/session controller.
///
/// Construct one instance in the host process's top-level wiring and hand
/// out references; there is deliberately no globally reachable instance.
pub struct SensorController {
    /// Command half of the transport.
    transport: Arc<dyn Transport>,
    /// Configuration.
    config: ControllerConfig,
    /// Lifecycle state.
    state: ControllerState,
    /// The active session, present iff `state` is `Connected`.
    active_session: Option<Session>,
    /// Synchronously invoked observers.
    observers: Vec<Arc<dyn SensorObserver>>,
    /// Broadcast channel for change notifications.
    notification_tx: broadcast::Sender<Notification>,
}

impl SensorController {
    /// Create a controller with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ControllerConfig::default())
    }

    /// Create a controller with an explicit configuration.
    pub fn with_config(transport: Arc<dyn Transport>, config: ControllerConfig) -> Self {
        let (notification_tx, _) = broadcast::channel(64);

        Self {
            transport,
            config,
            state: ControllerState::Idle,
            active_session: None,
            observers: Vec::new(),
            notification_tx,
        }
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Get the active session, if a device is connected.
    pub fn active_session(&self) -> Option<&Session> {
        self.active_session.as_ref()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notification_tx.subscribe()
    }

    /// Register an observer. Observers run synchronously inside event
    /// processing, in registration order.
    pub fn add_observer(&mut self, observer: Arc<dyn SensorObserver>) {
        self.observers.push(observer);
    }

    /// Export the active session's readings as upload records.
    pub fn upload_records(&self) -> Vec<UploadRecord> {
        let install_id = self.config.install_id.as_deref();
        self.active_session
            .as_ref()
            .map(|session| {
                session
                    .readings
                    .iter()
                    .map(|reading| reading.upload_record(install_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Consume transport events until the queue closes.
    ///
    /// Events are processed strictly one at a time; failures are reported
    /// and the loop continues, since every failure path leaves the
    /// controller in a recoverable state.
    pub async fn run(&mut self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(error) = self.handle_event(event).await {
                warn!(%error, "Transport event was not fully processed");
            }
        }
        debug!("Transport event queue closed");
    }

    /// Process one transport event to completion.
    ///
    /// # Errors
    ///
    /// Transport faults, dropped packets, and contract violations are
    /// surfaced to the caller. None of them leave the controller stuck: bad
    /// packets are dropped and connection-level failures resolve back to
    /// scanning.
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Ready => self.on_ready().await,
            TransportEvent::Discovered(peripheral) => self.on_discovered(peripheral).await,
            TransportEvent::Connected(peripheral) => self.on_connected(peripheral).await,
            TransportEvent::Disconnected(peripheral) => self.on_disconnected(peripheral).await,
            TransportEvent::Data { peripheral, payload } => self.on_data(peripheral, &payload),
        }
    }

    /// Stop an active scan and rest in `Ready`.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != ControllerState::Scanning {
            debug!(state = %self.state, "Ignoring stop request");
            return Ok(());
        }

        self.transport.stop_scanning().await?;
        self.state = ControllerState::Ready;
        Ok(())
    }

    async fn on_ready(&mut self) -> Result<()> {
        if self.state != ControllerState::Idle {
            debug!(state = %self.state, "Ignoring transport-ready");
            return Ok(());
        }

        info!("Transport ready, scanning for anthills");
        self.state = ControllerState::Ready;
        self.start_scanning().await
    }

    async fn on_discovered(&mut self, peripheral: Peripheral) -> Result<()> {
        if self.state != ControllerState::Scanning {
            debug!(state = %self.state, %peripheral, "Ignoring discovery");
            return Ok(());
        }

        // Connect to the first discovered peripheral; there is no ranking.
        info!(%peripheral, "Discovered anthill, connecting");
        let peripheral_id = peripheral.id.clone();

        match self.transport.connect(peripheral).await {
            Ok(true) => {
                self.state = ControllerState::Connecting { peripheral_id };
                Ok(())
            }
            Ok(false) => {
                warn!(%peripheral_id, "Transport declined connection, still scanning");
                Err(Error::ConnectionFailed {
                    reason: format!("transport declined connection to {peripheral_id}"),
                })
            }
            Err(error) => {
                warn!(%peripheral_id, %error, "Connection attempt failed, still scanning");
                Err(error)
            }
        }
    }

    async fn on_connected(&mut self, peripheral: Peripheral) -> Result<()> {
        if !matches!(self.state, ControllerState::Connecting { .. }) {
            debug!(state = %self.state, %peripheral, "Ignoring connection report");
            return Ok(());
        }

        let name = match peripheral.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                // A session cannot be keyed without a device identifier.
                // Drop the link and go back to scanning.
                warn!(%peripheral, "Connected peripheral has no usable name, resuming scan");
                if let Err(error) = self.transport.disconnect().await {
                    warn!(%error, "Disconnect of nameless peripheral failed");
                }
                if let Err(error) = self.start_scanning().await {
                    warn!(%error, "Failed to resume scanning");
                }
                return Err(Error::MissingIdentifier);
            }
        };

        info!(session = %name, "Connected to anthill");
        self.active_session = Some(Session::new(name));
        self.state = ControllerState::Connected;
        self.notify_active_device_changed();
        Ok(())
    }

    async fn on_disconnected(&mut self, peripheral: Peripheral) -> Result<()> {
        if self.state != ControllerState::Connected {
            debug!(state = %self.state, %peripheral, "Ignoring disconnection report");
            return Ok(());
        }

        info!(%peripheral, "Anthill disconnected, resuming scan");
        self.active_session = None;
        self.notify_active_device_changed();
        self.start_scanning().await
    }

    fn on_data(&mut self, peripheral: Peripheral, payload: &[u8]) -> Result<()> {
        if self.active_session.is_none() {
            warn!(
                len = payload.len(),
                "Dropping data received with no active session"
            );
            return Err(Error::DataWithNoActiveSession);
        }

        match protocol::decode(payload) {
            Ok(packet) => {
                let reading = packet.into_reading(peripheral.name.clone());
                debug!(%reading, "Decoded reading");
                if let Some(session) = self.active_session.as_mut() {
                    session.push_reading(reading);
                }
                self.notify_readings_changed();
                Ok(())
            }
            Err(error) => {
                // The session is untouched; one bad packet is never fatal.
                warn!(%error, "Dropping undecodable packet");
                Err(error.into())
            }
        }
    }

    async fn start_scanning(&mut self) -> Result<()> {
        self.transport.start_scanning(self.config.scan_timeout).await?;
        self.state = ControllerState::Scanning;
        Ok(())
    }

    fn notify_active_device_changed(&self) {
        let session = self.active_session.as_ref();
        for observer in &self.observers {
            observer.on_active_device_changed(session);
        }
        let _ = self.notification_tx.send(Notification::ActiveDeviceChanged(
            session.map(|s| s.name.clone()),
        ));
    }

    fn notify_readings_changed(&self) {
        let session = self.active_session.as_ref();
        let readings = session.map(|s| s.readings.clone()).unwrap_or_default();
        for observer in &self.observers {
            observer.on_readings_changed(&readings, session);
        }
        let _ = self.notification_tx.send(Notification::ReadingsChanged {
            readings,
            session: session.map(|s| s.name.clone()),
        });
    }
}

impl std::fmt::Debug for SensorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorController")
            .field("state", &self.state)
            .field("active_session", &self.active_session.as_ref().map(|s| &s.name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ReadingKind;
    use crate::error::DecodeError;
    use crate::transport::MockTransport;
    use mockall::predicate::eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast::error::TryRecvError;

    fn anthill(name: Option<&str>) -> Peripheral {
        Peripheral::new("AA:BB:CC:DD", name.map(String::from), Some(-42))
    }

    fn data_event(peripheral: Peripheral, payload: &[u8]) -> TransportEvent {
        TransportEvent::Data {
            peripheral,
            payload: payload.to_vec(),
        }
    }

    /// Transport expecting the happy path: one initial scan, one accepted
    /// connection.
    fn connectable_transport() -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .with(eq(DEFAULT_SCAN_TIMEOUT))
            .times(1)
            .returning(|_| Ok(()));
        transport
            .expect_connect()
            .times(1)
            .returning(|_| Ok(true));
        transport
    }

    async fn connected_controller(transport: MockTransport) -> SensorController {
        let mut controller = SensorController::new(Arc::new(transport));
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Connected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
    }

    fn assert_session_invariant(controller: &SensorController) {
        assert_eq!(
            controller.active_session().is_some(),
            controller.state().is_connected(),
        );
    }

    #[derive(Default)]
    struct CountingObserver {
        device_changes: AtomicUsize,
        reading_changes: AtomicUsize,
    }

    impl SensorObserver for CountingObserver {
        fn on_active_device_changed(&self, _session: Option<&Session>) {
            self.device_changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_readings_changed(&self, _readings: &[Reading], _session: Option<&Session>) {
            self.reading_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_ready_starts_scanning_once() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .with(eq(DEFAULT_SCAN_TIMEOUT))
            .times(1)
            .returning(|_| Ok(()));

        let mut controller = SensorController::new(Arc::new(transport));
        assert_eq!(controller.state(), &ControllerState::Idle);

        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        assert_eq!(controller.state(), &ControllerState::Scanning);

        // A second ready report is a no-op
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        assert_eq!(controller.state(), &ControllerState::Scanning);
    }

    #[tokio::test]
    async fn test_connect_and_first_temperature_reading() {
        let controller = connected_controller(connectable_transport()).await;

        assert_eq!(controller.state(), &ControllerState::Connected);
        let session = controller.active_session().unwrap();
        assert_eq!(session.name, "Anthill-A");
        assert!(session.readings.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_temperature_packet_accumulates() {
        let mut controller = connected_controller(connectable_transport()).await;

        controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"T25.0#"))
            .await
            .unwrap();

        let session = controller.active_session().unwrap();
        assert_eq!(session.reading_count(), 1);

        let reading = &session.readings[0];
        assert_eq!(reading.kind, ReadingKind::Temperature);
        assert!((reading.value - 77.0).abs() < 1e-9);
        assert_eq!(reading.sensor_id.as_deref(), Some("Anthill-A"));
    }

    #[tokio::test]
    async fn test_scenario_unknown_packet_leaves_session_unchanged() {
        let mut controller = connected_controller(connectable_transport()).await;

        controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"H55.3#"))
            .await
            .unwrap();

        let result = controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"Q10#"))
            .await;
        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::UnknownKind(b'Q')))
        ));

        let session = controller.active_session().unwrap();
        assert_eq!(session.reading_count(), 1);
        assert_eq!(session.readings[0].kind, ReadingKind::Humidity);
        assert!((session.readings[0].value - 55.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_scenario_disconnect_resumes_scanning() {
        let mut transport = MockTransport::new();
        // Initial scan plus the resumed scan after disconnect
        transport
            .expect_start_scanning()
            .with(eq(DEFAULT_SCAN_TIMEOUT))
            .times(2)
            .returning(|_| Ok(()));
        transport
            .expect_connect()
            .times(1)
            .returning(|_| Ok(true));

        let mut controller = connected_controller(transport).await;
        let mut notifications = controller.subscribe();

        controller
            .handle_event(TransportEvent::Disconnected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();

        assert_eq!(controller.state(), &ControllerState::Scanning);
        assert!(controller.active_session().is_none());
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::ActiveDeviceChanged(None)
        );
    }

    #[tokio::test]
    async fn test_notifications_fire_exactly_once_per_change() {
        let mut transport = connectable_transport();
        transport
            .expect_start_scanning()
            .times(1)
            .returning(|_| Ok(()));

        let observer = Arc::new(CountingObserver::default());
        let mut controller = SensorController::new(Arc::new(transport));
        controller.add_observer(observer.clone());
        let mut notifications = controller.subscribe();

        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Connected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"H55.3#"))
            .await
            .unwrap();
        // Undecodable packet: reported, but no readings-changed
        let _ = controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"Q10#"))
            .await;
        controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"T25.0#"))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Disconnected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();

        // One per connect, one per disconnect
        assert_eq!(observer.device_changes.load(Ordering::SeqCst), 2);
        // One per successful decode
        assert_eq!(observer.reading_changes.load(Ordering::SeqCst), 2);

        // Broadcast mirrors the observer calls
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::ActiveDeviceChanged(Some("Anthill-A".to_string()))
        );
        match notifications.try_recv().unwrap() {
            Notification::ReadingsChanged { readings, session } => {
                assert_eq!(readings.len(), 1);
                assert_eq!(session.as_deref(), Some("Anthill-A"));
            }
            other => panic!("unexpected notification: {other:?}"),
        }
        match notifications.try_recv().unwrap() {
            Notification::ReadingsChanged { readings, .. } => assert_eq!(readings.len(), 2),
            other => panic!("unexpected notification: {other:?}"),
        }
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::ActiveDeviceChanged(None)
        );
        assert!(matches!(
            notifications.try_recv(),
            Err(TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_notification_topics() {
        assert_eq!(
            Notification::ActiveDeviceChanged(None).topic(),
            TOPIC_ACTIVE_DEVICE_CHANGED
        );
        assert_eq!(
            Notification::ReadingsChanged {
                readings: Vec::new(),
                session: None,
            }
            .topic(),
            TOPIC_READINGS_CHANGED
        );
    }

    #[tokio::test]
    async fn test_nameless_peripheral_resumes_scanning() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .times(2)
            .returning(|_| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(true));
        transport.expect_disconnect().times(1).returning(|| Ok(()));

        let mut controller = SensorController::new(Arc::new(transport));
        let mut notifications = controller.subscribe();

        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(None)))
            .await
            .unwrap();

        let result = controller
            .handle_event(TransportEvent::Connected(anthill(None)))
            .await;
        assert!(matches!(result, Err(Error::MissingIdentifier)));

        assert_eq!(controller.state(), &ControllerState::Scanning);
        assert!(controller.active_session().is_none());
        // No session was created, so no device-changed notification
        assert!(matches!(
            notifications.try_recv(),
            Err(TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_empty_name_is_treated_as_missing() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .times(2)
            .returning(|_| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(true));
        transport.expect_disconnect().times(1).returning(|| Ok(()));

        let mut controller = SensorController::new(Arc::new(transport));
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(Some(""))))
            .await
            .unwrap();

        let result = controller
            .handle_event(TransportEvent::Connected(anthill(Some(""))))
            .await;
        assert!(matches!(result, Err(Error::MissingIdentifier)));
    }

    #[tokio::test]
    async fn test_data_with_no_active_session_is_reported() {
        let transport = MockTransport::new();
        let mut controller = SensorController::new(Arc::new(transport));

        let result = controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"T25.0#"))
            .await;
        assert!(matches!(result, Err(Error::DataWithNoActiveSession)));
        assert_eq!(controller.state(), &ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_declined_connection_keeps_scanning() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .times(1)
            .returning(|_| Ok(()));
        transport
            .expect_connect()
            .times(1)
            .returning(|_| Ok(false));

        let mut controller = SensorController::new(Arc::new(transport));
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();

        let result = controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await;
        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        assert_eq!(controller.state(), &ControllerState::Scanning);
    }

    #[tokio::test]
    async fn test_events_out_of_state_are_ignored() {
        // No expectations set: any transport call would panic the mock.
        let transport = MockTransport::new();
        let mut controller = SensorController::new(Arc::new(transport));

        controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Connected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Disconnected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();

        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(controller.active_session().is_none());
    }

    #[tokio::test]
    async fn test_session_invariant_holds_across_lifecycle() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .times(2)
            .returning(|_| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(true));

        let mut controller = SensorController::new(Arc::new(transport));
        assert_session_invariant(&controller);

        let events = [
            TransportEvent::Ready,
            TransportEvent::Discovered(anthill(Some("Anthill-A"))),
            TransportEvent::Connected(anthill(Some("Anthill-A"))),
            data_event(anthill(Some("Anthill-A")), b"H55.3#"),
            TransportEvent::Disconnected(anthill(Some("Anthill-A"))),
            data_event(anthill(Some("Anthill-A")), b"H55.3#"),
        ];

        for event in events {
            let _ = controller.handle_event(event).await;
            assert_session_invariant(&controller);
        }
    }

    #[tokio::test]
    async fn test_stop_returns_to_ready() {
        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .times(1)
            .returning(|_| Ok(()));
        transport
            .expect_stop_scanning()
            .times(1)
            .returning(|| Ok(()));

        let mut controller = SensorController::new(Arc::new(transport));
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        assert_eq!(controller.state(), &ControllerState::Scanning);

        controller.stop().await.unwrap();
        assert_eq!(controller.state(), &ControllerState::Ready);

        // Stop when not scanning is a no-op
        controller.stop().await.unwrap();
        assert_eq!(controller.state(), &ControllerState::Ready);
    }

    #[tokio::test]
    async fn test_custom_scan_timeout_is_used_everywhere() {
        let timeout = Duration::from_millis(2_500);

        let mut transport = MockTransport::new();
        transport
            .expect_start_scanning()
            .with(eq(timeout))
            .times(2)
            .returning(|_| Ok(()));
        transport.expect_connect().times(1).returning(|_| Ok(true));

        let config = ControllerConfig {
            scan_timeout: timeout,
            install_id: None,
        };
        let mut controller = SensorController::with_config(Arc::new(transport), config);

        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Connected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Disconnected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_records_use_install_id() {
        let transport = connectable_transport();

        let config = ControllerConfig {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            install_id: Some("install-1234".to_string()),
        };
        let mut controller = SensorController::with_config(Arc::new(transport), config);
        controller
            .handle_event(TransportEvent::Ready)
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Discovered(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(TransportEvent::Connected(anthill(Some("Anthill-A"))))
            .await
            .unwrap();
        controller
            .handle_event(data_event(anthill(Some("Anthill-A")), b"T25.0#"))
            .await
            .unwrap();

        let records = controller.upload_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].userid, "install-1234");
        assert_eq!(records[0].sensorid, "Anthill-A");
        assert_eq!(records[0].type_code, 1);
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_survives_bad_packets() {
        let transport = connectable_transport();
        let mut controller = SensorController::new(Arc::new(transport));

        let (tx, rx) = mpsc::channel(16);
        for event in [
            TransportEvent::Ready,
            TransportEvent::Discovered(anthill(Some("Anthill-A"))),
            TransportEvent::Connected(anthill(Some("Anthill-A"))),
            data_event(anthill(Some("Anthill-A")), b"Q10#"),
            data_event(anthill(Some("Anthill-A")), b"T25.0#"),
        ] {
            tx.send(event).await.unwrap();
        }
        drop(tx);

        controller.run(rx).await;

        let session = controller.active_session().unwrap();
        assert_eq!(session.reading_count(), 1);
        assert!((session.readings[0].value - 77.0).abs() < 1e-9);
    }
}
