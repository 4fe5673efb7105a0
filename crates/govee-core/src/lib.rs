//! Core BLE library for Govee thermometer/hygrometer sensors.
//!
//! This crate speaks the notification-based request/response protocol of the
//! Govee H5074, H5075 and H5179 over Bluetooth Low Energy, and decodes the
//! readings they broadcast in advertisements.
//!
//! # Features
//!
//! - **Device discovery**: Scan for nearby Govee sensors via BLE
//! - **Current readings**: temperature, humidity, battery and derived values
//! - **Historical data**: Download up to 20 days of minute-by-minute history
//! - **Device settings**: Read/write humidity and temperature alarms and calibration offsets
//! - **Passive monitoring**: Decode advertisements without connecting
//! - **Testability**: A [`MockTransport`] simulates a sensor for tests
//!
//! # Supported Devices
//!
//! | Device | Current reading | History framing |
//! |--------|-----------------|-----------------|
//! | H5074 | `AA 01` with battery | minutes ago, 6 records per message |
//! | H5075 | `AA 01` with battery | minutes ago, 6 records per message |
//! | H5179 | `AA 0A`, battery via `AA 08` | epoch minutes, 4 records per message |
//!
//! Unknown models are treated like the H5074/H5075.
//!
//! # Platform Differences
//!
//! - **macOS**: Devices are identified by a UUID assigned by CoreBluetooth and
//!   MAC addresses are not exposed, so discovery also accepts sensors whose
//!   name looks like a Govee model.
//! - **Linux/Windows**: Devices are identified by their Bluetooth MAC address.
//!
//! # Quick Start
//!
//! ```no_run
//! use govee_core::{ConnectionConfig, EngineConfig, Hygrometer, scan};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = scan::scan_for_devices().await?;
//!     println!("Found {} devices", devices.len());
//!
//!     let mut sensor = Hygrometer::connect(
//!         "A4:C1:38:12:34:56",
//!         ConnectionConfig::default(),
//!         EngineConfig::default(),
//!     )
//!     .await?;
//!
//!     let info = sensor.request_device_info().await?;
//!     println!("{info}");
//!
//!     sensor.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod advertisement;
pub mod commands;
pub mod device;
pub mod engine;
pub mod error;
pub mod guard;
pub mod mock;
pub mod notification;
pub mod passive;
pub mod scan;
pub mod state;
pub mod traits;
pub mod transfer;
pub mod util;
pub mod validation;

// Core exports
pub use device::{ConnectionConfig, Device};
pub use engine::{
    Acknowledgement, CurrentReading, EngineConfig, HistoryRange, Hygrometer, MAX_HISTORY_MINUTES,
    history_command,
};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use scan::{DiscoveredDevice, ScanOptions, scan_for_devices};
pub use traits::{GattTransport, NotificationCallback};

pub use advertisement::{AdvertisementData, parse_advertisement, parse_manufacturer_data};
pub use commands::{Command, Opcode};
pub use guard::ConnectionGuard;
pub use mock::{MockTransport, MockTransportBuilder};
pub use notification::{Channel, Notification};
pub use passive::{PassiveMonitor, PassiveMonitorOptions, PassiveReading};
pub use state::DeviceState;
pub use transfer::{HistoryDownload, TransferOutcome, TransferSession, TransferStatus};
pub use util::{create_identifier, format_peripheral_id, to_hex};
pub use validation::{validate_alarm, validate_offset};

// Re-export from govee-types
pub use govee_types::uuid as uuids;
pub use govee_types::{
    AlarmConfig, Calibration, DeviceInfo, DeviceModel, DeviceName, DeviceProfile, MacAndSerial,
    Measurement, Quantity,
};
