//! Data structures for sensor telemetry.
//!
//! This module contains the core data types used to represent decoded
//! readings, their export shape, and per-device sessions.

pub mod reading;
pub mod session;

pub use reading::{Reading, ReadingKind, UploadRecord};
pub use session::Session;
