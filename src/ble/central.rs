//! btleplug-backed transport implementation.
//!
//! [`BleCentral`] is the bundled implementation of the
//! [`Transport`](crate::transport::Transport) contract. It marshals
//! btleplug's central events, which may fire from platform-native threads,
//! onto the single event queue the controller consumes, so the controller
//! never observes two events concurrently.

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::ble::uuids::{ANTHILL_NAME_PREFIX, TELEMETRY_SERVICE_UUID, TELEMETRY_TX_UUID};
use crate::error::{Error, Result};
use crate::transport::{Peripheral, Transport, TransportEvent};

/// Queue depth for marshaled transport events.
const EVENT_QUEUE_DEPTH: usize = 32;

/// A peripheral we have surfaced to the controller.
#[derive(Clone)]
struct KnownDevice {
    handle: PlatformPeripheral,
    descriptor: Peripheral,
}

/// BLE central adapter for anthill sensors.
pub struct BleCentral {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Queue of marshaled transport events.
    event_tx: mpsc::Sender<TransportEvent>,
    /// Peripherals surfaced to the controller, by identifier.
    discovered: Arc<RwLock<HashMap<String, KnownDevice>>>,
    /// The currently connected peripheral, if any.
    connected: Arc<RwLock<Option<KnownDevice>>>,
    /// Whether scanning is currently active.
    is_scanning: Arc<RwLock<bool>>,
    /// Bumped on every scan start so stale timeout tasks stand down.
    scan_generation: Arc<AtomicU64>,
}

impl BleCentral {
    /// Create a new BLE central and the event queue it feeds.
    ///
    /// Emits [`TransportEvent::Ready`] once the adapter is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        let events = adapter.events().await.map_err(Error::Bluetooth)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        let central = Self {
            adapter,
            event_tx,
            discovered: Arc::new(RwLock::new(HashMap::new())),
            connected: Arc::new(RwLock::new(None)),
            is_scanning: Arc::new(RwLock::new(false)),
            scan_generation: Arc::new(AtomicU64::new(0)),
        };

        central.spawn_event_pump(events);

        // The adapter is initialized at this point; some platforms never
        // replay the initial power-on state through the event stream.
        let _ = central.event_tx.send(TransportEvent::Ready).await;

        Ok((central, event_rx))
    }

    /// Pump adapter events onto the single transport queue.
    fn spawn_event_pump(
        &self,
        mut events: impl futures::Stream<Item = CentralEvent> + Send + Unpin + 'static,
    ) {
        let adapter = self.adapter.clone();
        let discovered = self.discovered.clone();
        let connected = self.connected.clone();
        let is_scanning = self.is_scanning.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        if !*is_scanning.read() {
                            continue;
                        }
                        Self::process_discovery(&adapter, id, &discovered, &event_tx).await;
                    }
                    CentralEvent::DeviceConnected(id) => {
                        let known = discovered.read().get(&id.to_string()).cloned();
                        if let Some(device) = known {
                            debug!(peripheral = %device.descriptor, "Device connected");
                            let _ = event_tx
                                .send(TransportEvent::Connected(device.descriptor))
                                .await;
                        }
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        let known = discovered.read().get(&id.to_string()).cloned();
                        if let Some(device) = known {
                            debug!(peripheral = %device.descriptor, "Device disconnected");
                            connected.write().take();
                            let _ = event_tx
                                .send(TransportEvent::Disconnected(device.descriptor))
                                .await;
                        }
                    }
                    CentralEvent::StateUpdate(state) => {
                        debug!(?state, "Adapter state update");
                    }
                    other => {
                        trace!(?other, "Ignoring central event");
                    }
                }
            }

            debug!("Adapter event stream ended");
        });
    }

    /// Surface a discovered peripheral if it looks like an anthill sensor.
    async fn process_discovery(
        adapter: &Adapter,
        id: PeripheralId,
        discovered: &Arc<RwLock<HashMap<String, KnownDevice>>>,
        event_tx: &mpsc::Sender<TransportEvent>,
    ) {
        let handle = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match handle.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        if !is_anthill_device(properties.local_name.as_deref(), &properties.services) {
            return;
        }

        let descriptor = Peripheral::new(
            id.to_string(),
            properties.local_name.clone(),
            properties.rssi,
        );

        trace!(peripheral = %descriptor, "Anthill advertisement");

        discovered.write().insert(
            descriptor.id.clone(),
            KnownDevice {
                handle,
                descriptor: descriptor.clone(),
            },
        );

        let _ = event_tx.send(TransportEvent::Discovered(descriptor)).await;
    }

    /// Subscribe to the telemetry characteristic and pump its notifications.
    async fn start_telemetry(&self, device: &KnownDevice) -> Result<()> {
        if let Err(e) = device.handle.discover_services().await {
            warn!("Failed to discover services: {}", e);
        }

        let characteristic = device
            .handle
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == TELEMETRY_TX_UUID)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: TELEMETRY_TX_UUID.to_string(),
            })?;

        device
            .handle
            .subscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        let mut notifications = device
            .handle
            .notifications()
            .await
            .map_err(Error::Bluetooth)?;

        let descriptor = device.descriptor.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != TELEMETRY_TX_UUID {
                    continue;
                }

                trace!(
                    len = notification.value.len(),
                    "Telemetry notification received"
                );

                let event = TransportEvent::Data {
                    peripheral: descriptor.clone(),
                    payload: notification.value,
                };

                if event_tx.send(event).await.is_err() {
                    break;
                }
            }

            debug!("Telemetry notification stream ended");
        });

        Ok(())
    }
}

#[async_trait]
impl Transport for BleCentral {
    async fn start_scanning(&self, timeout: Duration) -> Result<()> {
        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!(?timeout, "Starting BLE scan for anthills");

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        *self.is_scanning.write() = true;

        // Bound the scan: stop after the timeout unless a newer scan (or an
        // explicit stop) got there first.
        let generation = self.scan_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let adapter = self.adapter.clone();
        let is_scanning = self.is_scanning.clone();
        let scan_generation = self.scan_generation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            if scan_generation.load(Ordering::SeqCst) != generation || !*is_scanning.read() {
                return;
            }

            debug!("Scan timeout elapsed, stopping scan");
            *is_scanning.write() = false;
            if let Err(e) = adapter.stop_scan().await {
                error!("Failed to stop timed-out scan: {}", e);
            }
        });

        Ok(())
    }

    async fn stop_scanning(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        *self.is_scanning.write() = false;
        self.adapter.stop_scan().await.map_err(Error::Bluetooth)
    }

    async fn connect(&self, peripheral: Peripheral) -> Result<bool> {
        let device = self.discovered.read().get(&peripheral.id).cloned();

        let Some(device) = device else {
            // Vanished between discovery and the connect request
            warn!(%peripheral, "Peripheral no longer known, declining connect");
            return Ok(false);
        };

        info!(%peripheral, "Connecting to anthill");

        device.handle.connect().await.map_err(Error::Bluetooth)?;

        if let Err(e) = self.start_telemetry(&device).await {
            // Connected but mute; tear the link down rather than hold it
            warn!(%peripheral, error = %e, "Telemetry setup failed, disconnecting");
            if let Err(disconnect_err) = device.handle.disconnect().await {
                warn!("Disconnect after failed setup also failed: {}", disconnect_err);
            }
            return Err(e);
        }

        *self.connected.write() = Some(device);

        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        let device = self.connected.write().take();

        if let Some(device) = device {
            info!(peripheral = %device.descriptor, "Disconnecting");
            device.handle.disconnect().await.map_err(Error::Bluetooth)?;
        }

        Ok(())
    }
}

impl Drop for BleCentral {
    fn drop(&mut self) {
        *self.is_scanning.write() = false;
    }
}

/// Check whether advertisement data identifies an anthill sensor.
fn is_anthill_device(local_name: Option<&str>, services: &[uuid::Uuid]) -> bool {
    services.contains(&TELEMETRY_SERVICE_UUID)
        || local_name
            .map(|n| n.starts_with(ANTHILL_NAME_PREFIX))
            .unwrap_or(false)
}
