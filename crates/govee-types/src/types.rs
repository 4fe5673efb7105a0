//! Core types for Govee sensor data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ParseError;

/// The physical quantity an alarm or calibration offset applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Quantity {
    /// Relative humidity in percent.
    Humidity,
    /// Temperature in degrees Celsius.
    Temperature,
}

impl Quantity {
    /// Display unit for thresholds and offsets of this quantity.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Quantity::Humidity => "%",
            Quantity::Temperature => "°C",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Humidity => write!(f, "humidity"),
            Quantity::Temperature => write!(f, "temperature"),
        }
    }
}

impl FromStr for Quantity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "humidity" | "hum" | "rh" => Ok(Quantity::Humidity),
            "temperature" | "temp" | "t" => Ok(Quantity::Temperature),
            other => Err(ParseError::UnknownValue(other.to_string())),
        }
    }
}

/// Calibration offsets added to raw readings before derived values are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    /// Offset added to relative humidity, in percentage points.
    #[cfg_attr(feature = "serde", serde(default))]
    pub humidity: f64,
    /// Offset added to temperature, in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(default))]
    pub temperature: f64,
}

impl Calibration {
    /// Create a calibration from explicit offsets.
    #[must_use]
    pub fn new(humidity: f64, temperature: f64) -> Self {
        Self {
            humidity,
            temperature,
        }
    }

    /// Offset for the given quantity.
    #[must_use]
    pub fn offset(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Humidity => self.humidity,
            Quantity::Temperature => self.temperature,
        }
    }

    /// Returns `true` when both offsets are zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.humidity == 0.0 && self.temperature == 0.0
    }
}

/// Convert degrees Celsius to degrees Fahrenheit.
#[must_use]
pub fn to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// A single temperature/humidity sample with its derived values.
///
/// Offsets are applied once at construction, and absolute humidity, dew
/// point and steam pressure are derived from the corrected values at the
/// same time. The fields are private so a sample can never drift out of
/// sync with its derived values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Measurement {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    timestamp: OffsetDateTime,
    temperature: f64,
    temperature_f: f64,
    humidity: f64,
    calibration: Calibration,
    absolute_humidity: f64,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    dew_point: Option<f64>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    dew_point_f: Option<f64>,
    steam_pressure: f64,
}

impl Measurement {
    /// Build a sample from raw sensor values, applying `calibration` first.
    #[must_use]
    pub fn new(
        timestamp: OffsetDateTime,
        temperature: f64,
        humidity: f64,
        calibration: Calibration,
    ) -> Self {
        let temperature = temperature + calibration.temperature;
        let humidity = humidity + calibration.humidity;

        // Magnus-type approximation with base-10 constants.
        let z1 = (7.45 * temperature) / (235.0 + temperature);
        let es = 6.1 * (z1 * 2.302_585_1).exp();
        let e = es * humidity / 100.0;

        let absolute_humidity = ((216.7 * e) / (273.15 + temperature) * 10.0).round() / 10.0;
        let steam_pressure = (e * 10.0).trunc() / 10.0;

        let dew_point = if e > 0.0 {
            let z3 = 0.434_292_289 * (e / 6.1).ln();
            Some(((235.0 * z3) / (7.45 - z3) * 10.0).trunc() / 10.0)
        } else {
            None
        };

        Self {
            timestamp,
            temperature,
            temperature_f: to_fahrenheit(temperature),
            humidity,
            calibration,
            absolute_humidity,
            dew_point,
            dew_point_f: dew_point.map(to_fahrenheit),
            steam_pressure,
        }
    }

    /// Time the sample was taken.
    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Temperature in °C, offset applied.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Temperature in °F, offset applied.
    #[must_use]
    pub fn temperature_f(&self) -> f64 {
        self.temperature_f
    }

    /// Relative humidity in %, offset applied.
    #[must_use]
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Offsets that were applied to this sample.
    #[must_use]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Absolute humidity in g/m³.
    #[must_use]
    pub fn absolute_humidity(&self) -> f64 {
        self.absolute_humidity
    }

    /// Dew point in °C. `None` at 0 % relative humidity.
    #[must_use]
    pub fn dew_point(&self) -> Option<f64> {
        self.dew_point
    }

    /// Dew point in °F.
    #[must_use]
    pub fn dew_point_f(&self) -> Option<f64> {
        self.dew_point_f
    }

    /// Water vapour partial pressure in mbar.
    #[must_use]
    pub fn steam_pressure(&self) -> f64 {
        self.steam_pressure
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Temperature:          {:.1} °C / {:.1} °F",
            self.temperature, self.temperature_f
        )?;
        if self.calibration.temperature != 0.0 {
            writeln!(
                f,
                "Temperature offset:   {:.1} °C",
                self.calibration.temperature
            )?;
        }
        writeln!(f, "Rel. humidity:        {:.1} %", self.humidity)?;
        if self.calibration.humidity != 0.0 {
            writeln!(f, "Rel. humidity offset: {:.1} %", self.calibration.humidity)?;
        }
        match (self.dew_point, self.dew_point_f) {
            (Some(c), Some(fahrenheit)) => {
                writeln!(f, "Dew point:            {c:.1} °C / {fahrenheit:.1} °F")?
            }
            _ => writeln!(f, "Dew point:            n/a")?,
        }
        writeln!(f, "Abs. humidity:        {:.1} g/m³", self.absolute_humidity)?;
        write!(f, "Steam pressure:       {:.1} mbar", self.steam_pressure)
    }
}

/// Alarm thresholds for one quantity.
///
/// Range checks against what the device accepts happen when the alarm is
/// written, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlarmConfig {
    /// Whether the alarm is enabled.
    pub active: bool,
    /// Lower threshold.
    pub lower: f64,
    /// Upper threshold.
    pub upper: f64,
    /// Quantity the thresholds apply to.
    pub quantity: Quantity,
}

impl AlarmConfig {
    /// Create a new alarm configuration.
    #[must_use]
    pub fn new(quantity: Quantity, active: bool, lower: f64, upper: f64) -> Self {
        Self {
            active,
            lower,
            upper,
            quantity,
        }
    }

    /// Parse an alarm specification of the form `"on|off LOWER UPPER"`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidFormat`] when the active flag is missing
    /// or not `on`/`off`, and [`ParseError::InvalidNumber`] for a threshold
    /// that is not a number.
    pub fn parse(quantity: Quantity, spec: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = spec.split_whitespace().collect();
        let [flag, lower, upper] = parts.as_slice() else {
            return Err(ParseError::InvalidFormat(format!(
                "expected 'on|off LOWER UPPER', got '{spec}'"
            )));
        };

        let active = match flag.to_lowercase().as_str() {
            "on" => true,
            "off" => false,
            other => {
                return Err(ParseError::InvalidFormat(format!(
                    "alarm must start with 'on' or 'off', got '{other}'"
                )));
            }
        };

        let number = |field: &'static str, value: &str| {
            value.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                field,
                value: value.to_string(),
            })
        };

        Ok(Self::new(
            quantity,
            active,
            number("lower threshold", lower)?,
            number("upper threshold", upper)?,
        ))
    }
}

impl fmt::Display for AlarmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.quantity.unit();
        write!(
            f,
            "{}, lower threshold: {:.1} {unit}, upper threshold: {:.1} {unit}",
            if self.active { "active" } else { "inactive" },
            self.lower,
            self.upper,
        )
    }
}

/// MAC address and serial number as reported by the device itself.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MacAndSerial {
    /// Canonical upper-case, colon separated MAC address.
    pub mac: String,
    /// Device serial number.
    pub serial: i16,
}

impl fmt::Display for MacAndSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.mac, self.serial)
    }
}

/// Manufacturer and model sliced out of an advertised device name.
///
/// `GVH5075_1234` yields `GV` / `H5075`; `Govee_H5074_ABCD` and
/// `Govee_H5179_ABCD` yield `Govee` / `H5074` and `Govee` / `H5179`.
/// Anything else is reported as `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceName {
    /// Full name as read from the device.
    pub name: String,
    /// Manufacturer prefix.
    pub manufacturer: String,
    /// Model designation.
    pub model: String,
}

impl DeviceName {
    /// Split a display name into manufacturer and model.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let slice = |start: usize, end: usize| -> String {
            name.chars().skip(start).take(end - start).collect()
        };

        let (manufacturer, model) = if name.contains("H5075") {
            (slice(0, 2), slice(2, 7))
        } else if name.contains("H5074") || name.contains("H5179") {
            (slice(0, 5), slice(6, 11))
        } else {
            ("Unknown".to_string(), "Unknown".to_string())
        };

        Self {
            name: name.to_string(),
            manufacturer,
            model,
        }
    }
}

/// Everything known about a device after an interrogation.
///
/// Every field except the address is optional: a value is absent when the
/// device did not answer the corresponding request in time.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DeviceInfo {
    /// Device name.
    pub name: Option<String>,
    /// Platform address used to connect.
    pub address: String,
    /// Manufacturer sliced from the name.
    pub manufacturer: Option<String>,
    /// Model sliced from the name.
    pub model: Option<String>,
    /// Hardware revision.
    pub hardware: Option<String>,
    /// Firmware revision.
    pub firmware: Option<String>,
    /// Battery level in percent.
    pub battery: Option<u8>,
    /// Humidity alarm configuration.
    pub humidity_alarm: Option<AlarmConfig>,
    /// Temperature alarm configuration.
    pub temperature_alarm: Option<AlarmConfig>,
    /// Humidity calibration offset.
    pub humidity_offset: Option<f64>,
    /// Temperature calibration offset.
    pub temperature_offset: Option<f64>,
    /// MAC address reported by the device.
    pub mac: Option<String>,
    /// MAC address and serial number.
    pub mac_and_serial: Option<MacAndSerial>,
    /// Current measurement.
    pub current_measurement: Option<Measurement>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            writeln!(f, "Devicename:           {name}")?;
        }
        writeln!(f, "Address:              {}", self.address)?;
        if let Some(manufacturer) = &self.manufacturer {
            writeln!(f, "Manufacturer:         {manufacturer}")?;
        }
        if let Some(model) = &self.model {
            writeln!(f, "Model:                {model}")?;
        }
        if let Some(hardware) = &self.hardware {
            writeln!(f, "Hardware-Rev.:        {hardware}")?;
        }
        if let Some(firmware) = &self.firmware {
            writeln!(f, "Firmware-Rev.:        {firmware}")?;
        }
        if let Some(mac) = &self.mac_and_serial {
            writeln!(f, "MAC / serial:         {mac}")?;
        } else if let Some(mac) = &self.mac {
            writeln!(f, "MAC:                  {mac}")?;
        }
        if let Some(battery) = self.battery {
            writeln!(f, "Battery level:        {battery} %")?;
        }
        if let Some(alarm) = &self.humidity_alarm {
            writeln!(f, "Humidity alarm:       {alarm}")?;
        }
        if let Some(alarm) = &self.temperature_alarm {
            writeln!(f, "Temperature alarm:    {alarm}")?;
        }
        if let Some(offset) = self.humidity_offset {
            writeln!(f, "Humidity offset:      {offset:.1} %")?;
        }
        if let Some(offset) = self.temperature_offset {
            writeln!(f, "Temperature offset:   {offset:.1} °C")?;
        }
        if let Some(measurement) = &self.current_measurement {
            writeln!(f)?;
            writeln!(f, "{measurement}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_epoch(temperature: f64, humidity: f64) -> Measurement {
        Measurement::new(
            OffsetDateTime::UNIX_EPOCH,
            temperature,
            humidity,
            Calibration::default(),
        )
    }

    // --- Measurement derivation tests ---

    #[test]
    fn test_derived_values_at_room_conditions() {
        let m = at_epoch(25.0, 50.0);
        let dew = m.dew_point().unwrap();
        assert!(dew > 12.0 && dew < 14.0, "dew point {dew}");
        assert!(
            m.absolute_humidity() > 11.0 && m.absolute_humidity() < 12.0,
            "absolute humidity {}",
            m.absolute_humidity()
        );
        assert!((m.temperature_f() - 77.0).abs() < 1e-9);
        assert!(m.steam_pressure() > 15.0 && m.steam_pressure() < 16.5);
    }

    #[test]
    fn test_offsets_are_applied_before_derivation() {
        let raw = at_epoch(25.0, 50.0);
        let shifted = Measurement::new(
            OffsetDateTime::UNIX_EPOCH,
            24.0,
            45.0,
            Calibration::new(5.0, 1.0),
        );
        assert!((shifted.temperature() - 25.0).abs() < 1e-9);
        assert!((shifted.humidity() - 50.0).abs() < 1e-9);
        assert_eq!(shifted.dew_point(), raw.dew_point());
        assert_eq!(shifted.absolute_humidity(), raw.absolute_humidity());
        assert_eq!(shifted.calibration(), Calibration::new(5.0, 1.0));
    }

    #[test]
    fn test_dew_point_absent_at_zero_humidity() {
        let m = at_epoch(20.0, 0.0);
        assert_eq!(m.dew_point(), None);
        assert_eq!(m.dew_point_f(), None);
        assert_eq!(m.steam_pressure(), 0.0);
    }

    #[test]
    fn test_dew_point_is_truncated_to_one_decimal() {
        let m = at_epoch(21.3, 47.8);
        let dew = m.dew_point().unwrap();
        assert!(((dew * 10.0).round() - dew * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_fahrenheit() {
        assert_eq!(to_fahrenheit(0.0), 32.0);
        assert_eq!(to_fahrenheit(100.0), 212.0);
        assert_eq!(to_fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn test_measurement_display_contains_units() {
        let text = at_epoch(25.0, 50.0).to_string();
        assert!(text.contains("25.0 °C / 77.0 °F"));
        assert!(text.contains("50.0 %"));
        assert!(text.contains("g/m³"));
        assert!(!text.contains("offset"));
    }

    // --- AlarmConfig tests ---

    #[test]
    fn test_parse_alarm_spec() {
        let alarm = AlarmConfig::parse(Quantity::Humidity, "on 30.0 70.5").unwrap();
        assert!(alarm.active);
        assert_eq!(alarm.lower, 30.0);
        assert_eq!(alarm.upper, 70.5);

        let alarm = AlarmConfig::parse(Quantity::Temperature, "OFF -5.0 25.0").unwrap();
        assert!(!alarm.active);
        assert_eq!(alarm.lower, -5.0);
    }

    #[test]
    fn test_parse_alarm_spec_rejects_missing_flag() {
        let err = AlarmConfig::parse(Quantity::Humidity, "30.0 70.0").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));

        let err = AlarmConfig::parse(Quantity::Humidity, "maybe 30.0 70.0").unwrap_err();
        assert!(matches!(err, ParseError::InvalidFormat(_)));
    }

    #[test]
    fn test_parse_alarm_spec_rejects_bad_number() {
        let err = AlarmConfig::parse(Quantity::Humidity, "on low 70.0").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                field: "lower threshold",
                value: "low".to_string()
            }
        );
    }

    #[test]
    fn test_alarm_display() {
        let alarm = AlarmConfig::new(Quantity::Temperature, true, -1.5, 30.0);
        assert_eq!(
            alarm.to_string(),
            "active, lower threshold: -1.5 °C, upper threshold: 30.0 °C"
        );
    }

    // --- DeviceName tests ---

    #[test]
    fn test_device_name_h5075() {
        let name = DeviceName::parse("GVH5075_1A2B");
        assert_eq!(name.manufacturer, "GV");
        assert_eq!(name.model, "H5075");
    }

    #[test]
    fn test_device_name_h5074_and_h5179() {
        let name = DeviceName::parse("Govee_H5074_C3D4");
        assert_eq!(name.manufacturer, "Govee");
        assert_eq!(name.model, "H5074");

        let name = DeviceName::parse("Govee_H5179_0F0F");
        assert_eq!(name.model, "H5179");
    }

    #[test]
    fn test_device_name_unknown() {
        let name = DeviceName::parse("Thermo");
        assert_eq!(name.manufacturer, "Unknown");
        assert_eq!(name.model, "Unknown");
        assert_eq!(name.name, "Thermo");
    }

    #[test]
    fn test_device_name_short_input_does_not_panic() {
        let name = DeviceName::parse("H5075");
        assert_eq!(name.manufacturer, "H5");
        assert_eq!(name.model, "075");
    }

    // --- Quantity / Calibration tests ---

    #[test]
    fn test_quantity_from_str() {
        assert_eq!("Humidity".parse::<Quantity>(), Ok(Quantity::Humidity));
        assert_eq!("temp".parse::<Quantity>(), Ok(Quantity::Temperature));
        assert!("pressure".parse::<Quantity>().is_err());
    }

    #[test]
    fn test_calibration_offset_lookup() {
        let cal = Calibration::new(-2.5, 0.4);
        assert_eq!(cal.offset(Quantity::Humidity), -2.5);
        assert_eq!(cal.offset(Quantity::Temperature), 0.4);
        assert!(!cal.is_zero());
        assert!(Calibration::default().is_zero());
    }

    #[test]
    fn test_device_info_display_skips_missing_fields() {
        let info = DeviceInfo {
            address: "A4:C1:38:00:11:22".to_string(),
            battery: Some(87),
            ..Default::default()
        };
        let text = info.to_string();
        assert!(text.contains("Address:              A4:C1:38:00:11:22"));
        assert!(text.contains("Battery level:        87 %"));
        assert!(!text.contains("Firmware"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_measurement_serializes_camel_case() {
        let json = serde_json::to_value(at_epoch(25.0, 50.0)).unwrap();
        assert_eq!(json["temperature"], 25.0);
        assert!(json.get("absoluteHumidity").is_some());
        assert!(json.get("dewPoint").is_some());
        assert_eq!(json["timestamp"], "1970-01-01T00:00:00Z");
    }
}
