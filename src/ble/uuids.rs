//! BLE Service and Characteristic UUIDs.
//!
//! Anthill sensors stream their ASCII telemetry over the Nordic UART
//! Service, notifying packets on the TX characteristic.

use uuid::Uuid;

/// Telemetry service UUID (Nordic UART Service).
pub const TELEMETRY_SERVICE_UUID: Uuid = Uuid::from_u128(0x6e40_0001_b5a3_f393_e0a9_e50e24dcca9e);
/// Telemetry characteristic UUID (notifications from the sensor).
pub const TELEMETRY_TX_UUID: Uuid = Uuid::from_u128(0x6e40_0003_b5a3_f393_e0a9_e50e24dcca9e);

/// Advertised local-name prefix used by anthill firmware.
pub const ANTHILL_NAME_PREFIX: &str = "Anthill";

/// Check if a service UUID is the anthill telemetry service.
pub fn is_telemetry_service(uuid: &Uuid) -> bool {
    *uuid == TELEMETRY_SERVICE_UUID
}
