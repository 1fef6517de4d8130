//! Shared sensor state and text formatting for readings.

use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

/// One temperature and humidity measurement.
///
/// `NAN` values mean the sensor has not produced that reading (yet, or at
/// all); they render as `Unknown` in text and JSON and as `NAN` samples
/// in metrics.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub humidity: f32,
    /// When the measurement was taken. `None` until the first one lands.
    pub measured_at: Option<Instant>,
}

impl Measurement {
    /// Temperature with two decimals, or `Unknown`.
    #[inline]
    pub fn temperature_text(&self) -> String {
        float_to_string(self.temperature, 2)
    }

    /// Humidity with two decimals, or `Unknown`.
    #[inline]
    pub fn humidity_text(&self) -> String {
        float_to_string(self.humidity, 2)
    }

    /// Age of the measurement as `HH:MM:SS.mmm`, or `Unknown` before the
    /// first measurement.
    pub fn age_text(&self) -> String {
        match self.measured_at {
            Some(at) => timespan_to_string(at.elapsed()),
            None => String::from("Unknown"),
        }
    }

    /// Temperature rounded to two decimals as a JSON value, `"Unknown"`
    /// when not measured.
    pub fn temperature_json(&self) -> serde_json::Value {
        float_to_json(self.temperature)
    }

    /// Humidity rounded to two decimals as a JSON value, `"Unknown"`
    /// when not measured.
    pub fn humidity_json(&self) -> serde_json::Value {
        float_to_json(self.humidity)
    }
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            temperature: f32::NAN,
            humidity: f32::NAN,
            measured_at: None,
        }
    }
}

/// The latest measurement, shared between the measurement loop and the
/// web workers.
///
/// Readers take a snapshot; writers replace the whole measurement. The
/// lock is held only for the copy.
#[derive(Debug, Default)]
pub struct Readings {
    current: RwLock<Measurement>,
}

impl Readings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fresh measurement, stamping it with the current time.
    pub fn record(&self, temperature: f32, humidity: f32) {
        let measurement = Measurement {
            temperature,
            humidity,
            measured_at: Some(Instant::now()),
        };

        // A poisoned lock means a writer panicked mid-copy; the copy is
        // still a valid Measurement, so keep serving.
        match self.current.write() {
            Ok(mut slot) => *slot = measurement,
            Err(poisoned) => *poisoned.into_inner() = measurement,
        }
    }

    /// Returns a copy of the latest measurement.
    pub fn snapshot(&self) -> Measurement {
        match self.current.read() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Formats a float with a fixed number of decimals, or `Unknown` for
/// `NAN` and infinities.
pub fn float_to_string(value: f32, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        String::from("Unknown")
    }
}

// JSON carries a number (two decimals), not the formatted string.
fn float_to_json(value: f32) -> serde_json::Value {
    if !value.is_finite() {
        return serde_json::Value::from("Unknown");
    }

    let rounded = (value as f64 * 100.0).round() / 100.0;
    serde_json::Value::from(rounded)
}

/// Formats a duration as `HH:MM:SS.mmm`, wrapping at 100 hours so the
/// field width stays fixed.
pub fn timespan_to_string(span: Duration) -> String {
    let millis = span.as_millis() % (100 * 60 * 60 * 1000);

    format!(
        "{:02}:{:02}:{:02}.{:03}",
        millis / (60 * 60 * 1000),
        millis / (60 * 1000) % 60,
        millis / 1000 % 60,
        millis % 1000,
    )
}


#[cfg(test)]
mod timespan_tests {
    use super::*;

    #[test]
    fn formatting() {
        let cases = [
            (Duration::ZERO, "00:00:00.000"),
            (Duration::from_millis(1), "00:00:00.001"),
            (Duration::from_secs(61), "00:01:01.000"),
            (Duration::from_secs(3600 * 12 + 34 * 60 + 56), "12:34:56.000"),
            // Wraps at 100 hours.
            (Duration::from_secs(3600 * 101), "01:00:00.000"),
        ];

        for (span, result) in cases {
            assert_eq!(timespan_to_string(span), result);
        }
    }
}
