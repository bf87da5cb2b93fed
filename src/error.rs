//! Error types for the anthill-ble crate.

use thiserror::Error;

/// Failure to decode a single telemetry packet.
///
/// Decode failures are never fatal: the offending packet is dropped and
/// reported, and the session is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The packet is too short to hold both framing bytes.
    #[error("Packet too short: {len} bytes (need at least 2)")]
    TooShort {
        /// Length of the received buffer.
        len: usize,
    },

    /// The packet is not valid printable ASCII text.
    #[error("Packet is not ASCII text")]
    Encoding,

    /// The payload between the framing bytes is not a finite number.
    #[error("Packet payload is not a number: {payload:?}")]
    NotANumber {
        /// The payload text that failed to parse.
        payload: String,
    },

    /// The leading type byte names no known reading kind.
    #[error("Unknown reading kind byte: {0:#04x}")]
    UnknownKind(u8),
}

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Failed to establish a connection to the sensor.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// A telemetry packet could not be decoded.
    #[error("Telemetry decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// The transport reported a connected peripheral without a name.
    ///
    /// Session names come from the peripheral identifier, so a nameless
    /// peripheral cannot become a session. The controller reports this and
    /// returns to scanning.
    #[error("Connected peripheral reported no identifier")]
    MissingIdentifier,

    /// Data arrived while no session was active.
    ///
    /// The transport contract only delivers data for an open connection, so
    /// this indicates a contract violation rather than a decodable packet.
    #[error("Received data with no active session")]
    DataWithNoActiveSession,

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
