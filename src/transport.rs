//! Transport contract consumed by the sensor controller.
//!
//! The controller never talks to a BLE stack directly. It issues commands
//! through the [`Transport`] capability set and consumes [`TransportEvent`]s
//! from a single-consumer queue. Native transport callbacks, which may fire
//! from multiple threads, must be marshaled onto that one queue before they
//! reach the controller; [`crate::ble::BleCentral`] is the bundled
//! implementation, and test doubles plug in the same way.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// A peripheral identity as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peripheral {
    /// Transport-level identifier, unique for the lifetime of the process.
    pub id: String,
    /// Advertised device name, if the transport observed one.
    pub name: Option<String>,
    /// Signal strength in dBm at last observation.
    pub rssi: Option<i16>,
}

impl Peripheral {
    /// Create a peripheral descriptor.
    pub fn new(id: impl Into<String>, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi,
        }
    }
}

impl std::fmt::Display for Peripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Events delivered by a transport implementation.
///
/// Events arrive on one queue and are processed strictly one at a time; the
/// ordering a transport emits is the ordering the controller observes.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The transport finished initializing and can scan.
    Ready,
    /// A peripheral was discovered while scanning.
    Discovered(Peripheral),
    /// A connection to the peripheral was established.
    Connected(Peripheral),
    /// The connection to the peripheral was lost or closed.
    Disconnected(Peripheral),
    /// Raw bytes arrived from the connected peripheral.
    Data {
        /// The peripheral the bytes came from.
        peripheral: Peripheral,
        /// The raw packet payload.
        payload: Vec<u8>,
    },
}

/// The command half of the transport contract.
///
/// Implementations must be safe to call from the controller's event loop;
/// long-running work belongs on the implementation's own tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin scanning for peripherals, stopping after `timeout` if still
    /// scanning by then.
    async fn start_scanning(&self, timeout: Duration) -> Result<()>;

    /// Stop an active scan. A no-op when not scanning.
    async fn stop_scanning(&self) -> Result<()>;

    /// Attempt to connect to the peripheral.
    ///
    /// Returns `Ok(false)` when the transport declined the attempt without a
    /// hard failure (e.g. the peripheral vanished between discovery and
    /// connect).
    async fn connect(&self, peripheral: Peripheral) -> Result<bool>;

    /// Tear down the current connection, if any.
    async fn disconnect(&self) -> Result<()>;
}
