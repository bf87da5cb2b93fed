// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # anthill-ble
//!
//! A cross-platform Rust library for acquiring environmental telemetry
//! (temperature, humidity) from Anthill sensors via Bluetooth Low Energy.
//!
//! The library decodes the sensors' minimal ASCII wire protocol and
//! accumulates readings into a session keyed by the currently connected
//! device. The connection is self-healing: after a disconnect the
//! controller returns to scanning and reconnects to the next sensor it
//! finds.
//!
//! ## Features
//!
//! - **Sensor Discovery**: Automatically discover nearby anthill sensors
//! - **Self-healing Link**: Scan, connect, and reconnect for the process
//!   lifetime
//! - **Telemetry Decoding**: Temperature (°F) and humidity (%) readings
//!   from the ASCII packet stream
//! - **Session Accumulation**: Arrival-ordered reading history per
//!   connected device
//! - **Change Notifications**: Observer callbacks plus broadcast topics for
//!   active-device and reading changes
//! - **Upload Export**: Per-reading records in the ingestion service's
//!   exact wire shape
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anthill_ble::{BleCentral, Notification, Result, SensorController};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Wire the transport to the controller
//!     let (central, events) = BleCentral::new().await?;
//!     let mut controller = SensorController::new(Arc::new(central));
//!
//!     // Watch readings arrive
//!     let mut notifications = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(notification) = notifications.recv().await {
//!             if let Notification::ReadingsChanged { readings, session } = notification {
//!                 println!("{:?}: {} readings", session, readings.len());
//!             }
//!         }
//!     });
//!
//!     // Process transport events until shutdown
//!     controller.run(events).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.

// Public modules
pub mod ble;
pub mod controller;
pub mod data;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

// Re-exports for convenience
pub use ble::BleCentral;
pub use controller::{
    ControllerConfig, ControllerState, Notification, SensorController, SensorObserver,
    DEFAULT_SCAN_TIMEOUT, TOPIC_ACTIVE_DEVICE_CHANGED, TOPIC_READINGS_CHANGED,
};
pub use data::{Reading, ReadingKind, Session, UploadRecord};
pub use error::{DecodeError, Error, Result};
pub use protocol::{decode, DecodedPacket};
pub use transport::{Peripheral, Transport, TransportEvent};
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};
