//! Telemetry packet decoding.
//!
//! Anthill sensors stream a minimal ASCII protocol. Each packet is a fixed
//! three-part frame:
//! - Byte 0: reading kind (`'T'` temperature, `'H'` humidity)
//! - Bytes 1..len-1: decimal numeric literal (optionally signed/fractional)
//! - Byte len-1: trailing framing byte, discarded without inspection
//!
//! Temperature payloads are Celsius on the wire and convert to Fahrenheit;
//! humidity payloads are percent and pass through unchanged.
//!
//! Decoding is a pure function: no state, no I/O, and no panics on any
//! input.

use tracing::trace;

use crate::data::{Reading, ReadingKind};
use crate::error::DecodeError;
use crate::utils::celsius_to_fahrenheit;

/// A successfully decoded packet, before unit conversion and timestamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedPacket {
    /// The reading kind named by the leading type byte.
    pub kind: ReadingKind,
    /// The numeric payload as it appeared on the wire.
    pub value: f64,
    /// Whether the wire value still needs Celsius-to-Fahrenheit conversion.
    pub needs_conversion: bool,
}

impl DecodedPacket {
    /// Convert into a timestamped [`Reading`], applying unit conversion.
    pub fn into_reading(self, sensor_id: Option<String>) -> Reading {
        let value = if self.needs_conversion {
            celsius_to_fahrenheit(self.value)
        } else {
            self.value
        };
        Reading::new(self.kind, value, sensor_id)
    }
}

/// Decode a raw telemetry packet.
///
/// # Errors
///
/// - [`DecodeError::TooShort`] if the buffer cannot hold both framing bytes
/// - [`DecodeError::Encoding`] if the buffer is not ASCII text
/// - [`DecodeError::NotANumber`] if the payload is not a finite decimal
/// - [`DecodeError::UnknownKind`] if the leading byte is neither `'H'` nor
///   `'T'`
pub fn decode(bytes: &[u8]) -> Result<DecodedPacket, DecodeError> {
    if bytes.len() < 2 {
        trace!(len = bytes.len(), "Dropping undersized packet");
        return Err(DecodeError::TooShort { len: bytes.len() });
    }

    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::Encoding)?;
    if !text.is_ascii() {
        return Err(DecodeError::Encoding);
    }

    // ASCII verified above, so byte offsets are character offsets.
    let payload = &text[1..text.len() - 1];
    let value: f64 = payload.parse().map_err(|_| DecodeError::NotANumber {
        payload: payload.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DecodeError::NotANumber {
            payload: payload.to_string(),
        });
    }

    match bytes[0] {
        b'H' => Ok(DecodedPacket {
            kind: ReadingKind::Humidity,
            value,
            needs_conversion: false,
        }),
        b'T' => Ok(DecodedPacket {
            kind: ReadingKind::Temperature,
            value,
            needs_conversion: true,
        }),
        other => {
            trace!(byte = other, "Dropping packet with unknown kind byte");
            Err(DecodeError::UnknownKind(other))
        }
    }
}
