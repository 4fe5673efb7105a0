//! Range checks for values written to a device.
//!
//! The sensors silently misbehave when given thresholds or offsets outside
//! what their firmware accepts, so every setter validates first and writes
//! nothing when a check fails.
//!
//! | Setting | Accepted range |
//! |---------|----------------|
//! | Humidity alarm | lower `0.0..=99.9`, upper `0.1..=100.0` |
//! | Temperature alarm | lower `-20.0..=59.9`, upper `-19.9..=60.0` |
//! | Humidity offset | `-20.0..=20.0` |
//! | Temperature offset | `-3.0..=3.0` |

use std::ops::RangeInclusive;

use govee_types::{AlarmConfig, Quantity};
use tracing::error;

use crate::error::{Error, Result};

/// Accepted humidity offset.
pub const HUMIDITY_OFFSET_RANGE: RangeInclusive<f64> = -20.0..=20.0;

/// Accepted temperature offset.
pub const TEMPERATURE_OFFSET_RANGE: RangeInclusive<f64> = -3.0..=3.0;

/// Accepted lower and upper humidity alarm thresholds.
pub const HUMIDITY_ALARM_RANGE: (RangeInclusive<f64>, RangeInclusive<f64>) =
    (0.0..=99.9, 0.1..=100.0);

/// Accepted lower and upper temperature alarm thresholds.
pub const TEMPERATURE_ALARM_RANGE: (RangeInclusive<f64>, RangeInclusive<f64>) =
    (-20.0..=59.9, -19.9..=60.0);

/// Accepted offset range for `quantity`.
#[must_use]
pub fn offset_range(quantity: Quantity) -> RangeInclusive<f64> {
    match quantity {
        Quantity::Humidity => HUMIDITY_OFFSET_RANGE,
        Quantity::Temperature => TEMPERATURE_OFFSET_RANGE,
    }
}

/// Accepted `(lower, upper)` alarm ranges for `quantity`.
#[must_use]
pub fn alarm_range(quantity: Quantity) -> (RangeInclusive<f64>, RangeInclusive<f64>) {
    match quantity {
        Quantity::Humidity => HUMIDITY_ALARM_RANGE,
        Quantity::Temperature => TEMPERATURE_ALARM_RANGE,
    }
}

/// Check a calibration offset.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] when the offset is outside the range the
/// device accepts.
pub fn validate_offset(quantity: Quantity, offset: f64) -> Result<()> {
    let range = offset_range(quantity);
    if range.contains(&offset) {
        return Ok(());
    }
    error!(%quantity, offset, "Offset out of range");
    Err(Error::invalid_config(format!(
        "{quantity} offset {offset} outside {:.1}..={:.1}",
        range.start(),
        range.end()
    )))
}

/// Check both thresholds of an alarm configuration.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] naming the first threshold that is out
/// of range.
pub fn validate_alarm(alarm: &AlarmConfig) -> Result<()> {
    let (lower, upper) = alarm_range(alarm.quantity);
    for (label, value, range) in [("lower", alarm.lower, lower), ("upper", alarm.upper, upper)] {
        if !range.contains(&value) {
            error!(quantity = %alarm.quantity, threshold = label, value, "Alarm threshold out of range");
            return Err(Error::invalid_config(format!(
                "{} alarm {label} threshold {value} outside {:.1}..={:.1}",
                alarm.quantity,
                range.start(),
                range.end()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- offsets ---

    #[test]
    fn test_offset_bounds_are_inclusive() {
        assert!(validate_offset(Quantity::Temperature, 3.0).is_ok());
        assert!(validate_offset(Quantity::Temperature, -3.0).is_ok());
        assert!(validate_offset(Quantity::Humidity, 20.0).is_ok());
        assert!(validate_offset(Quantity::Humidity, -20.0).is_ok());
    }

    #[test]
    fn test_offset_out_of_range() {
        let err = validate_offset(Quantity::Temperature, 3.1).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(validate_offset(Quantity::Humidity, -20.5).is_err());
    }

    #[test]
    fn test_offset_nan_is_rejected() {
        assert!(validate_offset(Quantity::Humidity, f64::NAN).is_err());
    }

    // --- alarms ---

    #[test]
    fn test_humidity_alarm_bounds() {
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Humidity, true, 0.0, 100.0)).is_ok());
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Humidity, true, 99.9, 0.1)).is_ok());
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Humidity, true, -0.1, 50.0)).is_err());
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Humidity, true, 10.0, 0.0)).is_err());
    }

    #[test]
    fn test_temperature_alarm_bounds() {
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Temperature, false, -20.0, 60.0)).is_ok());
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Temperature, true, 60.0, 60.0)).is_err());
        assert!(validate_alarm(&AlarmConfig::new(Quantity::Temperature, true, -20.0, -20.0)).is_err());
    }

    #[test]
    fn test_alarm_error_names_threshold() {
        let err = validate_alarm(&AlarmConfig::new(Quantity::Temperature, true, 0.0, 75.0)).unwrap_err();
        assert!(err.to_string().contains("upper"));
    }
}
