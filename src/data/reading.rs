//! Reading data structures.
//!
//! Contains the reading kind taxonomy, the immutable [`Reading`] value, and
//! the upload record used when exporting readings to an ingestion service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a decoded sensor reading.
///
/// This is a closed set: every site that produces or displays readings
/// matches it exhaustively. The integer codes used by the upload contract
/// are fixed and must not change (see [`ReadingKind::type_code`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    /// The sensor reported an error condition.
    Error,
    /// A temperature reading, stored in degrees Fahrenheit.
    Temperature,
    /// A relative humidity reading, stored in percent.
    Humidity,
    /// A reading whose kind could not be determined.
    Unknown,
}

impl ReadingKind {
    /// Get the integer code used by the upload contract.
    ///
    /// These values are a boundary contract with the ingestion service:
    /// Error=0, Temperature=1, Humidity=2, Unknown=-1.
    pub fn type_code(self) -> i32 {
        match self {
            Self::Error => 0,
            Self::Temperature => 1,
            Self::Humidity => 2,
            Self::Unknown => -1,
        }
    }

    /// Create from an upload contract type code.
    ///
    /// Unrecognized codes map to [`ReadingKind::Unknown`].
    pub fn from_type_code(code: i32) -> Self {
        match code {
            0 => Self::Error,
            1 => Self::Temperature,
            2 => Self::Humidity,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Temperature => write!(f, "Temperature"),
            Self::Humidity => write!(f, "Humidity"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Placeholder used in upload records when an identifier is unavailable.
const NO_IDENTIFIER: &str = "NONE";

/// A single decoded sensor measurement.
///
/// Readings are immutable once created. The value is stored in the reading's
/// native unit: degrees Fahrenheit for temperature, percent for humidity.
/// The timestamp is captured at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// The kind of measurement.
    pub kind: ReadingKind,
    /// The measured value, post-conversion.
    pub value: f64,
    /// When the reading was decoded.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the originating device, if the transport reported one.
    pub sensor_id: Option<String>,
}

impl Reading {
    /// Create a new reading stamped with the current time.
    pub fn new(kind: ReadingKind, value: f64, sensor_id: Option<String>) -> Self {
        Self {
            kind,
            value,
            timestamp: Utc::now(),
            sensor_id,
        }
    }

    /// Build the upload record for this reading.
    ///
    /// `install_id` is the opaque device-install identifier of the host
    /// application; it lands in the `userid` field, falling back to the
    /// literal `"NONE"` when unavailable, as does a missing sensor id.
    pub fn upload_record(&self, install_id: Option<&str>) -> UploadRecord {
        UploadRecord {
            value: self.value,
            type_code: self.kind.type_code(),
            timestamp: self.timestamp.timestamp_millis() as f64 / 1000.0,
            userid: install_id.unwrap_or(NO_IDENTIFIER).to_string(),
            sensorid: self
                .sensor_id
                .clone()
                .unwrap_or_else(|| NO_IDENTIFIER.to_string()),
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ReadingKind::Temperature => write!(f, "{:.2}°F", self.value),
            ReadingKind::Humidity => write!(f, "{:.2}%", self.value),
            kind => write!(f, "{kind}"),
        }
    }
}

/// The wire shape of a reading exported to an ingestion service.
///
/// Field names and the integer `type` codes are a boundary contract and must
/// be reproduced exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// The measured value.
    pub value: f64,
    /// The reading kind code: Error=0, Temperature=1, Humidity=2, Unknown=-1.
    #[serde(rename = "type")]
    pub type_code: i32,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Device-install identifier, or `"NONE"`.
    pub userid: String,
    /// Originating sensor identifier, or `"NONE"`.
    pub sensorid: String,
}
