//! Classification of inbound notifications.
//!
//! Every notification is routed by its leading two-byte opcode into a
//! [`Notification`]. The channel it arrived on only matters for history data,
//! which carries no opcode at all.

use govee_types::codec::{self, Endian, HistoryBatch};
use govee_types::{AlarmConfig, DeviceProfile, MacAndSerial, Quantity, uuids};
use uuid::Uuid;

use crate::commands::{self, Opcode};

/// The three subscribed characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Field requests and their answers.
    DeviceData,
    /// Measurement-and-battery, history control and acknowledgements.
    CommandAck,
    /// History batches.
    HistoryData,
}

impl Channel {
    /// All channels in subscription order.
    pub const ALL: [Channel; 3] = [Channel::DeviceData, Channel::CommandAck, Channel::HistoryData];

    /// Characteristic UUID backing this channel.
    #[must_use]
    pub fn characteristic(&self) -> Uuid {
        match self {
            Channel::DeviceData => uuids::DEVICE_DATA,
            Channel::CommandAck => uuids::COMMAND,
            Channel::HistoryData => uuids::HISTORY_DATA,
        }
    }

    /// Channel for a characteristic UUID, if it is one of ours.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.characteristic() == uuid)
    }
}

/// A decoded inbound notification.
///
/// Measurement values are raw: calibration is applied when the message is
/// applied to device state.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// `AA 01`: measurement plus battery.
    MeasurementAndBattery {
        temperature: f64,
        humidity: f64,
        battery: u8,
    },
    /// `AA 0A`: measurement only.
    Measurement { temperature: f64, humidity: f64 },
    /// `AA 08`: battery level in percent.
    Battery(u8),
    /// `AA 03` / `AA 04`: alarm configuration.
    Alarm(AlarmConfig),
    /// `AA 06` / `AA 07`: calibration offset.
    Offset(Quantity, f64),
    /// `AA 0C`: MAC address and serial number.
    MacAndSerial(MacAndSerial),
    /// `AA 0D`: hardware revision.
    Hardware(String),
    /// `AA 0E`: firmware revision.
    Firmware(String),
    /// `AA 0F`: MAC address.
    MacAddress(String),
    /// Echo of a set opcode.
    SettingAcknowledged(Opcode),
    /// `33 01`: the device started a history transfer.
    TransferStarted,
    /// `EE 01`: the device finished a history transfer after sending
    /// `reported` messages.
    TransferComplete { reported: u16 },
    /// One history batch.
    HistoryBatch(HistoryBatch),
    /// Opcode we do not know.
    Unknown { channel: Channel, opcode: Opcode },
    /// Known opcode with a payload too short to decode.
    Malformed { opcode: Opcode },
}

impl Notification {
    /// Classify a notification.
    #[must_use]
    pub fn decode(channel: Channel, bytes: &[u8], profile: &DeviceProfile) -> Self {
        if channel == Channel::HistoryData {
            return match HistoryBatch::decode(bytes, profile) {
                Some(batch) => Notification::HistoryBatch(batch),
                None => Notification::Malformed { opcode: leading_opcode(bytes) },
            };
        }

        let opcode = leading_opcode(bytes);
        decode_payload(opcode, bytes).unwrap_or_else(|| match opcode {
            commands::REQUEST_MEASUREMENT_AND_BATTERY
            | commands::REQUEST_MEASUREMENT
            | commands::REQUEST_BATTERY
            | commands::REQUEST_HUMIDITY_ALARM
            | commands::REQUEST_TEMPERATURE_ALARM
            | commands::REQUEST_HUMIDITY_OFFSET
            | commands::REQUEST_TEMPERATURE_OFFSET
            | commands::REQUEST_MAC_AND_SERIAL
            | commands::REQUEST_HARDWARE
            | commands::REQUEST_FIRMWARE
            | commands::REQUEST_MAC_ADDRESS
            | commands::HISTORY_COMPLETE => Notification::Malformed { opcode },
            _ => Notification::Unknown { channel, opcode },
        })
    }

    /// Whether the message carries nothing the engine acts on.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            Notification::Unknown { .. } | Notification::Malformed { .. }
        )
    }
}

fn leading_opcode(bytes: &[u8]) -> Opcode {
    [
        bytes.first().copied().unwrap_or(0),
        bytes.get(1).copied().unwrap_or(0),
    ]
}

fn decode_payload(opcode: Opcode, bytes: &[u8]) -> Option<Notification> {
    if bytes.len() < 2 {
        return None;
    }
    let notification = match opcode {
        commands::REQUEST_MEASUREMENT_AND_BATTERY => {
            let (temperature, humidity) = codec::decode_fixed_pair(bytes.get(2..6)?, Endian::Big)?;
            Notification::MeasurementAndBattery {
                temperature,
                humidity,
                battery: *bytes.get(6)?,
            }
        }
        commands::REQUEST_MEASUREMENT => {
            let (temperature, humidity) =
                codec::decode_fixed_pair(bytes.get(2..6)?, Endian::Little)?;
            Notification::Measurement {
                temperature,
                humidity,
            }
        }
        commands::REQUEST_BATTERY => Notification::Battery(*bytes.get(2)?),
        commands::REQUEST_HUMIDITY_ALARM => {
            Notification::Alarm(codec::decode_alarm(bytes.get(2..7)?, Quantity::Humidity)?)
        }
        commands::REQUEST_TEMPERATURE_ALARM => {
            Notification::Alarm(codec::decode_alarm(bytes.get(2..7)?, Quantity::Temperature)?)
        }
        commands::REQUEST_HUMIDITY_OFFSET => {
            Notification::Offset(Quantity::Humidity, codec::decode_offset(bytes.get(2..4)?)?)
        }
        commands::REQUEST_TEMPERATURE_OFFSET => {
            Notification::Offset(Quantity::Temperature, codec::decode_offset(bytes.get(2..4)?)?)
        }
        commands::REQUEST_MAC_AND_SERIAL => {
            Notification::MacAndSerial(codec::decode_mac_and_serial(bytes.get(2..10)?)?)
        }
        commands::REQUEST_HARDWARE => Notification::Hardware(codec::decode_ascii(bytes.get(2..9)?)?),
        commands::REQUEST_FIRMWARE => Notification::Firmware(codec::decode_ascii(bytes.get(2..9)?)?),
        commands::REQUEST_MAC_ADDRESS => {
            Notification::MacAddress(codec::decode_mac(bytes.get(2..8)?)?)
        }
        commands::SET_HUMIDITY_ALARM
        | commands::SET_TEMPERATURE_ALARM
        | commands::SET_HUMIDITY_OFFSET
        | commands::SET_TEMPERATURE_OFFSET => Notification::SettingAcknowledged(opcode),
        commands::REQUEST_HISTORY => Notification::TransferStarted,
        commands::HISTORY_COMPLETE => {
            let count: [u8; 2] = bytes.get(2..4)?.try_into().ok()?;
            Notification::TransferComplete {
                reported: u16::from_be_bytes(count),
            }
        }
        _ => return None,
    };
    Some(notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(prefix: &[u8]) -> Vec<u8> {
        let mut bytes = prefix.to_vec();
        bytes.resize(20, 0);
        bytes
    }

    fn decode(channel: Channel, bytes: &[u8]) -> Notification {
        Notification::decode(channel, bytes, &DeviceProfile::H507X)
    }

    // --- channels ---

    #[test]
    fn test_channel_uuid_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_uuid(channel.characteristic()), Some(channel));
        }
        assert_eq!(Channel::from_uuid(uuids::DEVICE_NAME), None);
    }

    // --- field answers ---

    #[test]
    fn test_measurement_and_battery() {
        let bytes = frame(&[0xAA, 0x01, 0x09, 0xC4, 0x13, 0x88, 0x55]);
        assert_eq!(
            decode(Channel::CommandAck, &bytes),
            Notification::MeasurementAndBattery {
                temperature: 25.0,
                humidity: 50.0,
                battery: 0x55
            }
        );
    }

    #[test]
    fn test_measurement_only_is_little_endian() {
        let bytes = frame(&[0xAA, 0x0A, 0xC4, 0x09, 0x88, 0x13]);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::Measurement {
                temperature: 25.0,
                humidity: 50.0
            }
        );
    }

    #[test]
    fn test_battery() {
        let bytes = frame(&[0xAA, 0x08, 87]);
        assert_eq!(decode(Channel::DeviceData, &bytes), Notification::Battery(87));
    }

    #[test]
    fn test_alarm() {
        // on, 30.00, 70.00
        let bytes = frame(&[0xAA, 0x03, 0x01, 0xB8, 0x0B, 0x58, 0x1B]);
        let Notification::Alarm(alarm) = decode(Channel::DeviceData, &bytes) else {
            panic!("expected alarm");
        };
        assert_eq!(alarm, AlarmConfig::new(Quantity::Humidity, true, 30.0, 70.0));
    }

    #[test]
    fn test_offset() {
        let bytes = frame(&[0xAA, 0x07, 0x9C, 0xFF]);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::Offset(Quantity::Temperature, -1.0)
        );
    }

    #[test]
    fn test_mac_and_serial() {
        let bytes = frame(&[0xAA, 0x0C, 0x66, 0x55, 0x44, 0x38, 0xC1, 0xA4, 0x2A, 0x00]);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::MacAndSerial(MacAndSerial {
                mac: "A4:C1:38:44:55:66".to_string(),
                serial: 42
            })
        );
    }

    #[test]
    fn test_versions_strip_padding() {
        let bytes = frame(&[0xAA, 0x0E, b'1', b'.', b'0', b'3', b'.', b'0', b'2']);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::Firmware("1.03.02".to_string())
        );
        let bytes = frame(&[0xAA, 0x0D, b'5', b'0', b'7', b'5']);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::Hardware("5075".to_string())
        );
    }

    #[test]
    fn test_mac_only() {
        let bytes = frame(&[0xAA, 0x0F, 0x01, 0x02, 0x03, 0x38, 0xC1, 0xA4]);
        assert_eq!(
            decode(Channel::DeviceData, &bytes),
            Notification::MacAddress("A4:C1:38:03:02:01".to_string())
        );
    }

    // --- control messages ---

    #[test]
    fn test_acknowledgements() {
        for opcode in [
            commands::SET_HUMIDITY_ALARM,
            commands::SET_TEMPERATURE_ALARM,
            commands::SET_HUMIDITY_OFFSET,
            commands::SET_TEMPERATURE_OFFSET,
        ] {
            assert_eq!(
                decode(Channel::DeviceData, &frame(&opcode)),
                Notification::SettingAcknowledged(opcode)
            );
        }
    }

    #[test]
    fn test_transfer_control() {
        assert_eq!(
            decode(Channel::CommandAck, &frame(&[0x33, 0x01])),
            Notification::TransferStarted
        );
        assert_eq!(
            decode(Channel::CommandAck, &frame(&[0xEE, 0x01, 0x01, 0x02])),
            Notification::TransferComplete { reported: 0x0102 }
        );
    }

    #[test]
    fn test_dispatch_ignores_channel_for_opcodes() {
        let bytes = frame(&[0xAA, 0x08, 50]);
        assert_eq!(decode(Channel::CommandAck, &bytes), Notification::Battery(50));
    }

    // --- history data ---

    #[test]
    fn test_history_channel_uses_profile() {
        let bytes = [0x00, 0x05, 0x01, 0x00, 0x64];
        let Notification::HistoryBatch(batch) = decode(Channel::HistoryData, &bytes) else {
            panic!("expected history batch");
        };
        assert_eq!(batch.time, codec::BatchTime::MinutesAgo(5));
        assert_eq!(batch.samples.len(), 1);
    }

    #[test]
    fn test_history_without_header_is_malformed() {
        assert!(decode(Channel::HistoryData, &[0x00]).is_ignored());
    }

    // --- unknown and short payloads ---

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(
            decode(Channel::DeviceData, &frame(&[0xAA, 0x99])),
            Notification::Unknown {
                channel: Channel::DeviceData,
                opcode: [0xAA, 0x99]
            }
        );
    }

    #[test]
    fn test_short_payloads_are_malformed() {
        assert_eq!(
            decode(Channel::CommandAck, &[0xAA, 0x01, 0x09]),
            Notification::Malformed { opcode: [0xAA, 0x01] }
        );
        assert_eq!(
            decode(Channel::DeviceData, &[0xAA, 0x08]),
            Notification::Malformed { opcode: [0xAA, 0x08] }
        );
        assert!(decode(Channel::DeviceData, &[]).is_ignored());
    }
}
