//! Error types for govee-core.
//!
//! Only transport problems and rejected input are errors. The protocol's
//! own "soft" outcomes are values instead:
//!
//! | Situation | Surfaced as |
//! |-----------|-------------|
//! | Payload too short or unknown opcode | ignored, field stays `None` |
//! | Device did not answer a field request in time | `Ok(None)` |
//! | Device did not acknowledge a setting in time | [`crate::Acknowledgement::TimedOut`] |
//! | History transfer counted a different number of messages | [`crate::TransferOutcome::PartialMismatch`] |
//! | History transfer never finished | [`crate::TransferOutcome::TimedOut`] |
//! | Alarm or offset out of the device's range | [`Error::InvalidConfig`], nothing written |
//! | Connect, write, read or disconnect failure | one of the transport variants below |
//!
//! ## Recommended Timeouts
//!
//! | Operation | Recommended Timeout | Notes |
//! |-----------|---------------------|-------|
//! | Device scan | 10-20 seconds | Sensors advertise every 2s or so |
//! | Connection | 10-15 seconds | May take longer if device is busy |
//! | Field request | 5 seconds | Usually answered in <300ms |
//! | History download | 60 seconds | Roughly 1s per day of history |


use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to a sensor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Scanning ended without a matching sensor.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// The transport was disconnected before the call.
    #[error("Not connected to device")]
    NotConnected,

    /// A Govee characteristic is missing from the discovered GATT table.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound { uuid: String, service_count: usize },

    /// The sensor sent something the engine cannot use.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A single BLE operation exceeded its bound.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed { uuid: String, reason: String },

    /// A setting the device would not accept; nothing was written.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a scan did not produce the requested sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No address or name matched the identifier.
    NotFound { identifier: String },
    /// The host has no Bluetooth adapter.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "no sensor matching '{identifier}'"),
            Self::NoAdapter => f.write_str("no Bluetooth adapter available"),
        }
    }
}

impl Error {
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<govee_types::ParseError> for Error {
    fn from(err: govee_types::ParseError) -> Self {
        Error::InvalidData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
