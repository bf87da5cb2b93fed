//! Session data structures.
//!
//! A session represents one continuous connection to a single anthill sensor
//! and the readings accumulated over its lifetime.

use crate::data::reading::Reading;

/// One connected device's lifetime and its accumulated readings.
///
/// A session is created only when a device connection succeeds and is
/// discarded when that device disconnects; its readings are not persisted.
/// Readings are kept in arrival order, unbounded, never reordered or
/// deduplicated.
///
/// Two sessions are equal iff their names are equal. Equality and hashing
/// deliberately ignore the reading history.
#[derive(Debug, Clone)]
pub struct Session {
    /// The device identifier the session was created from. Never empty.
    pub name: String,
    /// Accumulated readings, insertion order = arrival order.
    pub readings: Vec<Reading>,
}

impl Session {
    /// Create a new, empty session for the named device.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readings: Vec::new(),
        }
    }

    /// Append a reading, preserving arrival order.
    pub fn push_reading(&mut self, reading: Reading) {
        self.readings.push(reading);
    }

    /// Number of readings accumulated so far.
    pub fn reading_count(&self) -> usize {
        self.readings.len()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Session {}

impl std::hash::Hash for Session {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
