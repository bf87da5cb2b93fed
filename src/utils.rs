//! Utility functions for the anthill-ble crate.

/// Convert Celsius to Fahrenheit.
///
/// Anthill sensors report temperature in Celsius on the wire; readings are
/// stored in Fahrenheit.
///
/// # Example
///
/// ```
/// use anthill_ble::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(25.0);
/// assert!((fahrenheit - 77.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Convert Fahrenheit to Celsius.
///
/// # Example
///
/// ```
/// use anthill_ble::fahrenheit_to_celsius;
///
/// let celsius = fahrenheit_to_celsius(77.0);
/// assert!((celsius - 25.0).abs() < 0.001);
/// ```
#[inline]
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) / 1.8
}
