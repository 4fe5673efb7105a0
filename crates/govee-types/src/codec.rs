//! Byte-level encoding and decoding of Govee payloads.
//!
//! Every function here is pure. Decoders take exactly the bytes of the
//! field they decode (callers slice the notification) and return `None`
//! when the slice has the wrong length.
//!
//! Three measurement layouts exist and are kept deliberately separate:
//!
//! | Layout | Size | Temperature | Used by |
//! |--------|------|-------------|---------|
//! | fixed pair | 4 bytes | `i16` / 100, either byte order | current readings |
//! | sign-magnitude | 3 bytes | bit 23 is the sign | H507x history and adverts |
//! | two's complement | 4 bytes LE | `u16` two's complement / 100 | H5179 history and adverts |

use bytes::Buf;
use time::{Duration, OffsetDateTime};

use crate::profile::{DeviceProfile, HistoryDialect, HistoryFraming};
use crate::types::{AlarmConfig, Calibration, MacAndSerial, Measurement, Quantity};

/// Byte order of a 4-byte fixed-pair measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    /// Most significant byte first.
    Big,
    /// Least significant byte first.
    Little,
}

/// Leading byte of a history slot that holds no sample.
pub const EMPTY_SLOT: u8 = 0xFF;

const SIGN_BIT_24: u32 = 0x80_0000;

/// Interpret the low `bits` bits of `value` as a two's complement integer.
///
/// ```
/// use govee_types::codec::twos_complement;
///
/// assert_eq!(twos_complement(0xFF38, 16), -200);
/// assert_eq!(twos_complement(0x00C8, 16), 200);
/// ```
#[must_use]
pub fn twos_complement(value: u32, bits: u32) -> i32 {
    let value = i64::from(value);
    if value & (1 << (bits - 1)) != 0 {
        (value - (1 << bits)) as i32
    } else {
        value as i32
    }
}

/// Decode two signed 16-bit fixed-point values (temperature, humidity), each
/// scaled by 100.
#[must_use]
pub fn decode_fixed_pair(bytes: &[u8], endian: Endian) -> Option<(f64, f64)> {
    if bytes.len() != 4 {
        return None;
    }
    let mut buf = bytes;
    let (temperature, humidity) = match endian {
        Endian::Big => (buf.get_i16(), buf.get_i16()),
        Endian::Little => (buf.get_i16_le(), buf.get_i16_le()),
    };
    Some((f64::from(temperature) / 100.0, f64::from(humidity) / 100.0))
}

/// Inverse of [`decode_fixed_pair`]. Values are rounded to the nearest hundredth.
#[must_use]
pub fn encode_fixed_pair(temperature: f64, humidity: f64, endian: Endian) -> [u8; 4] {
    let t = hundredths(temperature);
    let h = hundredths(humidity);
    let (t, h) = match endian {
        Endian::Big => (t.to_be_bytes(), h.to_be_bytes()),
        Endian::Little => (t.to_le_bytes(), h.to_le_bytes()),
    };
    [t[0], t[1], h[0], h[1]]
}

/// Decode the 3-byte sign-magnitude layout.
///
/// The value is a 24-bit big-endian integer. If bit 23 is set it is cleared
/// and the temperature negated. Temperature is `floor(v / 1000) / 10`,
/// humidity is `(v % 1000) / 10`.
///
/// ```
/// use govee_types::codec::decode_sign_magnitude;
///
/// assert_eq!(decode_sign_magnitude(&[0x01, 0x00, 0x64]), Some((6.5, 63.6)));
/// ```
#[must_use]
pub fn decode_sign_magnitude(bytes: &[u8]) -> Option<(f64, f64)> {
    let &[a, b, c] = bytes else {
        return None;
    };
    let mut raw = u32::from_be_bytes([0, a, b, c]);
    let negative = raw & SIGN_BIT_24 != 0;
    raw &= !SIGN_BIT_24;

    let magnitude = f64::from(raw / 1000) / 10.0;
    let temperature = if negative { -magnitude } else { magnitude };
    let humidity = f64::from(raw % 1000) / 10.0;
    Some((temperature, humidity))
}

/// Inverse of [`decode_sign_magnitude`] at its one-decimal resolution.
///
/// Humidity is clamped to `0.0..=99.9` so it cannot spill into the
/// temperature digits.
#[must_use]
pub fn encode_sign_magnitude(temperature: f64, humidity: f64) -> [u8; 3] {
    let tenths = |v: f64| (v * 10.0).round().abs() as u32;
    let mut raw = tenths(temperature) * 1000 + tenths(humidity.clamp(0.0, 99.9));
    if temperature < 0.0 {
        raw |= SIGN_BIT_24;
    }
    let [_, a, b, c] = raw.to_be_bytes();
    [a, b, c]
}

/// Decode the 4-byte two's complement layout: little-endian `u16`
/// temperature (two's complement) and `u16` humidity, both scaled by 100.
#[must_use]
pub fn decode_twos_complement_pair(bytes: &[u8]) -> Option<(f64, f64)> {
    if bytes.len() != 4 {
        return None;
    }
    let mut buf = bytes;
    let temperature = twos_complement(u32::from(buf.get_u16_le()), 16);
    let humidity = buf.get_u16_le();
    Some((f64::from(temperature) / 100.0, f64::from(humidity) / 100.0))
}

/// Inverse of [`decode_twos_complement_pair`].
#[must_use]
pub fn encode_twos_complement_pair(temperature: f64, humidity: f64) -> [u8; 4] {
    let t = hundredths(temperature).to_le_bytes();
    let h = ((humidity * 100.0).round() as u16).to_le_bytes();
    [t[0], t[1], h[0], h[1]]
}

/// Decode a current-reading payload into a [`Measurement`].
///
/// Four bytes use the fixed-pair layout in the given byte order, three bytes
/// the sign-magnitude layout. Any other length yields `None`.
#[must_use]
pub fn decode_measurement(
    bytes: &[u8],
    endian: Endian,
    timestamp: OffsetDateTime,
    calibration: Calibration,
) -> Option<Measurement> {
    let (temperature, humidity) = match bytes.len() {
        4 => decode_fixed_pair(bytes, endian)?,
        3 => decode_sign_magnitude(bytes)?,
        _ => return None,
    };
    Some(Measurement::new(timestamp, temperature, humidity, calibration))
}

/// Decode a 5-byte alarm block: active flag, then lower and upper
/// thresholds as little-endian `i16` scaled by 100.
#[must_use]
pub fn decode_alarm(bytes: &[u8], quantity: Quantity) -> Option<AlarmConfig> {
    if bytes.len() != 5 {
        return None;
    }
    let mut buf = bytes;
    let active = buf.get_u8() != 0;
    let lower = f64::from(buf.get_i16_le()) / 100.0;
    let upper = f64::from(buf.get_i16_le()) / 100.0;
    Some(AlarmConfig::new(quantity, active, lower, upper))
}

/// Inverse of [`decode_alarm`].
#[must_use]
pub fn encode_alarm(alarm: &AlarmConfig) -> [u8; 5] {
    let lower = hundredths(alarm.lower).to_le_bytes();
    let upper = hundredths(alarm.upper).to_le_bytes();
    [
        u8::from(alarm.active),
        lower[0],
        lower[1],
        upper[0],
        upper[1],
    ]
}

/// Decode a calibration offset: little-endian `i16` scaled by 100.
#[must_use]
pub fn decode_offset(bytes: &[u8]) -> Option<f64> {
    let &[lo, hi] = bytes else {
        return None;
    };
    Some(f64::from(i16::from_le_bytes([lo, hi])) / 100.0)
}

/// Inverse of [`decode_offset`].
#[must_use]
pub fn encode_offset(offset: f64) -> [u8; 2] {
    hundredths(offset).to_le_bytes()
}

/// Decode a 6-byte MAC address transmitted least significant octet first.
///
/// ```
/// use govee_types::codec::decode_mac;
///
/// let mac = decode_mac(&[0x66, 0x55, 0x44, 0x38, 0xC1, 0xA4]).unwrap();
/// assert_eq!(mac, "A4:C1:38:44:55:66");
/// ```
#[must_use]
pub fn decode_mac(bytes: &[u8]) -> Option<String> {
    if bytes.len() != 6 {
        return None;
    }
    let octets: Vec<String> = bytes.iter().rev().map(|b| format!("{b:02X}")).collect();
    Some(octets.join(":"))
}

/// Decode an 8-byte MAC-and-serial block: reversed MAC followed by a
/// little-endian `i16` serial number.
#[must_use]
pub fn decode_mac_and_serial(bytes: &[u8]) -> Option<MacAndSerial> {
    if bytes.len() != 8 {
        return None;
    }
    let mac = decode_mac(&bytes[..6])?;
    let serial = i16::from_le_bytes([bytes[6], bytes[7]]);
    Some(MacAndSerial { mac, serial })
}

/// Decode a fixed-length ASCII field, dropping NUL padding. Any other
/// byte, whitespace included, is kept.
#[must_use]
pub fn decode_ascii(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(bytes).replace('\0', ""))
}

/// Minutes between 1970-01-01T00:00 and `at`, as used by H5179 history
/// requests and batches.
#[must_use]
pub fn epoch_minutes(at: OffsetDateTime) -> u32 {
    let minutes = (at - OffsetDateTime::UNIX_EPOCH).whole_minutes();
    u32::try_from(minutes.max(0)).unwrap_or(u32::MAX)
}

/// Time reference carried in the header of a history notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTime {
    /// Minutes before the request was issued, for slot 0.
    MinutesAgo(u16),
    /// Absolute time of slot 0.
    Absolute(OffsetDateTime),
}

/// One decoded, not yet calibrated, history slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Slot index inside the notification.
    pub slot: usize,
    /// Temperature in °C.
    pub temperature: f64,
    /// Relative humidity in %.
    pub humidity: f64,
}

/// The contents of one history-data notification.
///
/// Slots whose first byte is [`EMPTY_SLOT`] are skipped. A notification that
/// ends in the middle of a slot ends the batch there.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBatch {
    /// Header time reference.
    pub time: BatchTime,
    /// Present samples in slot order.
    pub samples: Vec<RawSample>,
}

impl HistoryBatch {
    /// Decode a history notification using the profile's layout.
    ///
    /// Returns `None` only when the header is missing or names a time
    /// outside the representable range.
    #[must_use]
    pub fn decode(bytes: &[u8], profile: &DeviceProfile) -> Option<Self> {
        let (time, header_len) = match profile.history_framing {
            HistoryFraming::MinutesAgo => {
                let header: [u8; 2] = bytes.get(..2)?.try_into().ok()?;
                (BatchTime::MinutesAgo(u16::from_be_bytes(header)), 2)
            }
            HistoryFraming::EpochMinutes => {
                let header: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
                let minutes = i64::from(u32::from_le_bytes(header));
                let at = OffsetDateTime::UNIX_EPOCH.checked_add(Duration::minutes(minutes))?;
                (BatchTime::Absolute(at), 4)
            }
        };

        let slot_len = match profile.history_dialect {
            HistoryDialect::SignMagnitude24 => 3,
            HistoryDialect::TwosComplement16 => 4,
        };

        let mut samples = Vec::new();
        for slot in 0..profile.records_per_notification as usize {
            let start = header_len + slot * slot_len;
            let Some(record) = bytes.get(start..start + slot_len) else {
                break;
            };
            if record[0] == EMPTY_SLOT {
                continue;
            }
            let decoded = match profile.history_dialect {
                HistoryDialect::SignMagnitude24 => decode_sign_magnitude(record),
                HistoryDialect::TwosComplement16 => decode_twos_complement_pair(record),
            };
            if let Some((temperature, humidity)) = decoded {
                samples.push(RawSample {
                    slot,
                    temperature,
                    humidity,
                });
            }
        }

        Some(Self { time, samples })
    }

    /// Timestamp of `slot`, given the time the transfer was requested.
    ///
    /// For "minutes ago" batches slot `i` is `minutes - i` minutes before
    /// `requested_at`; absolute batches step back one minute per slot.
    #[must_use]
    pub fn timestamp_of(&self, slot: usize, requested_at: OffsetDateTime) -> OffsetDateTime {
        let slot = slot as i64;
        match self.time {
            BatchTime::MinutesAgo(minutes) => {
                requested_at - Duration::minutes(i64::from(minutes) - slot)
            }
            BatchTime::Absolute(at) => at - Duration::minutes(slot),
        }
    }

    /// Build calibrated measurements for every present slot.
    #[must_use]
    pub fn into_measurements(
        self,
        requested_at: OffsetDateTime,
        calibration: Calibration,
    ) -> Vec<Measurement> {
        self.samples
            .iter()
            .map(|s| {
                Measurement::new(
                    self.timestamp_of(s.slot, requested_at),
                    s.temperature,
                    s.humidity,
                    calibration,
                )
            })
            .collect()
    }
}

fn hundredths(value: f64) -> i16 {
    (value * 100.0).round() as i16
}
