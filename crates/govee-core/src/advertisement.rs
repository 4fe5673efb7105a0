//! BLE advertisement data parsing for passive monitoring.
//!
//! Govee sensors broadcast their current reading in manufacturer-specific
//! advertisement data, so a reading can be taken without connecting.
//!
//! | Manufacturer ID | Model | Layout |
//! |-----------------|-------|--------|
//! | `0xEC88` | H5074 | `i16` LE temperature and humidity at 1..5 (÷100), battery at 5 |
//! | `0xEC88` | H5075 | 3-byte sign-magnitude value at 1..4, battery at 4 |
//! | `0x8801` | H5179 | `u16` LE two's complement temperature and `u16` LE humidity at 4..8 (÷100), battery at 8 |
//!
//! Calibration offsets are applied to H5075 readings only.

use std::collections::HashMap;

use bytes::Buf;
use serde::Serialize;
use time::OffsetDateTime;

use govee_types::codec::{self, Endian};
use govee_types::{Calibration, DeviceModel, Measurement, uuids};

/// Sensor data decoded from one advertisement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementData {
    /// Layout the data was decoded with.
    pub model: DeviceModel,
    /// The reading, stamped with the receive time.
    pub measurement: Measurement,
    /// Battery level in percent.
    pub battery: u8,
}

/// Decode the manufacturer data of an advertisement.
///
/// `manufacturer_data` is keyed by manufacturer ID, as btleplug reports it.
/// Returns `None` when neither Govee ID is present or the blob is too short.
pub fn parse_manufacturer_data(
    manufacturer_data: &HashMap<u16, Vec<u8>>,
    name: Option<&str>,
    calibration: Calibration,
    received_at: OffsetDateTime,
) -> Option<AdvertisementData> {
    if let Some(data) = manufacturer_data.get(&uuids::MANUFACTURER_ID_H507X) {
        parse_advertisement(uuids::MANUFACTURER_ID_H507X, data, name, calibration, received_at)
    } else if let Some(data) = manufacturer_data.get(&uuids::MANUFACTURER_ID_H5179) {
        parse_advertisement(uuids::MANUFACTURER_ID_H5179, data, name, calibration, received_at)
    } else {
        None
    }
}

/// Decode one manufacturer data blob.
///
/// The H5074 and H5075 share a manufacturer ID and are told apart by name.
pub fn parse_advertisement(
    manufacturer_id: u16,
    data: &[u8],
    name: Option<&str>,
    calibration: Calibration,
    received_at: OffsetDateTime,
) -> Option<AdvertisementData> {
    match manufacturer_id {
        uuids::MANUFACTURER_ID_H507X if name.is_some_and(|n| n.contains("H5074")) => {
            parse_h5074(data, received_at)
        }
        uuids::MANUFACTURER_ID_H507X => parse_h5075(data, calibration, received_at),
        uuids::MANUFACTURER_ID_H5179 => parse_h5179(data, received_at),
        _ => None,
    }
}

fn parse_h5074(data: &[u8], received_at: OffsetDateTime) -> Option<AdvertisementData> {
    let (temperature, humidity) = codec::decode_fixed_pair(data.get(1..5)?, Endian::Little)?;
    let battery = *data.get(5)?;
    Some(AdvertisementData {
        model: DeviceModel::H5074,
        measurement: Measurement::new(
            received_at,
            one_decimal(temperature),
            one_decimal(humidity),
            Calibration::default(),
        ),
        battery,
    })
}

fn parse_h5075(
    data: &[u8],
    calibration: Calibration,
    received_at: OffsetDateTime,
) -> Option<AdvertisementData> {
    let (temperature, humidity) = codec::decode_sign_magnitude(data.get(1..4)?)?;
    let battery = *data.get(4)?;
    Some(AdvertisementData {
        model: DeviceModel::H5075,
        measurement: Measurement::new(received_at, temperature, humidity, calibration),
        battery,
    })
}

fn parse_h5179(data: &[u8], received_at: OffsetDateTime) -> Option<AdvertisementData> {
    let mut buf = data.get(4..9)?;
    let temperature = codec::twos_complement(u32::from(buf.get_u16_le()), 16);
    let humidity = buf.get_u16_le();
    let battery = buf.get_u8();
    Some(AdvertisementData {
        model: DeviceModel::H5179,
        measurement: Measurement::new(
            received_at,
            f64::from(temperature) / 100.0,
            f64::from(humidity) / 100.0,
            Calibration::default(),
        ),
        battery,
    })
}

fn one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
