//! Protocol module for decoding sensor telemetry.
//!
//! This module contains the decoder for the ASCII packet format that
//! anthill sensors stream over the telemetry characteristic.

pub mod packet;

pub use packet::{decode, DecodedPacket};
