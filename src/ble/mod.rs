//! BLE communication module.
//!
//! Contains the bundled btleplug-backed implementation of the transport
//! contract and the GATT constants it speaks.

pub mod central;
pub mod uuids;

pub use central::BleCentral;
pub use uuids::*;
