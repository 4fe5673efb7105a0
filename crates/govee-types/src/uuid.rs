//! Bluetooth UUIDs and advertisement identifiers for Govee sensors.
//!
//! All three vendor characteristics live in the same custom service and
//! share the `494e5445-4c4c-495f-524f-434b535f20xx` base ("INTELLI_ROCKS_").

use uuid::{Uuid, uuid};

// --- Govee Characteristic UUIDs ---

/// Device-data channel: alarms, offsets, battery, identity and the
/// measurement-only current reading are requested and answered here.
pub const DEVICE_DATA: Uuid = uuid!("494e5445-4c4c-495f-524f-434b535f2011");

/// Command channel: history requests, transfer acknowledgements and the
/// measurement-plus-battery current reading.
pub const COMMAND: Uuid = uuid!("494e5445-4c4c-495f-524f-434b535f2012");

/// History-data channel: bulk history batches, notification only.
pub const HISTORY_DATA: Uuid = uuid!("494e5445-4c4c-495f-524f-434b535f2013");

// --- Standard BLE Characteristic UUIDs ---

/// GAP device name characteristic.
pub const DEVICE_NAME: Uuid = uuid!("00002a00-0000-1000-8000-00805f9b34fb");

// --- Advertisement identifiers ---

/// Manufacturer-data key used by H5074 and H5075 advertisements.
pub const MANUFACTURER_ID_H507X: u16 = 0xEC88;

/// Manufacturer-data key used by H5179 advertisements.
pub const MANUFACTURER_ID_H5179: u16 = 0x8801;

/// OUI prefixes observed on Govee hygrometers.
pub const MAC_PREFIXES: [&str; 2] = ["A4:C1:38:", "1C:9F:24:"];
