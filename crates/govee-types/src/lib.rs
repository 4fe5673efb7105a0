//! Platform-agnostic types for Govee thermometer/hygrometer sensors.
//!
//! This crate holds everything about the Govee protocol that does not need
//! a Bluetooth stack: the data model, the per-family [`DeviceProfile`]s,
//! the characteristic UUIDs and the byte-level [`codec`].
//!
//! # Features
//!
//! - Measurement samples with derived dew point, absolute humidity and
//!   steam pressure
//! - Alarm, calibration and identity records
//! - Pure decoders for all three measurement layouts and for history batches
//! - UUID and manufacturer-data constants
//!
//! # Example
//!
//! ```
//! use govee_types::{Calibration, codec};
//! use time::OffsetDateTime;
//!
//! let m = codec::decode_measurement(
//!     &[0x01, 0x00, 0x64],
//!     codec::Endian::Big,
//!     OffsetDateTime::UNIX_EPOCH,
//!     Calibration::default(),
//! )
//! .unwrap();
//! assert_eq!(m.temperature(), 6.5);
//! ```

pub mod codec;
pub mod error;
pub mod profile;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use profile::{
    CurrentReadingVariant, DeviceFamily, DeviceModel, DeviceProfile, HistoryDialect,
    HistoryFraming,
};
pub use types::{
    AlarmConfig, Calibration, DeviceInfo, DeviceName, MacAndSerial, Measurement, Quantity,
    to_fahrenheit,
};
pub use uuid as uuids;
