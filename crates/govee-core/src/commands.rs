//! Outbound commands and their wire framing.
//!
//! Every request starts with a two-byte opcode. The device answers a get
//! request with a notification that starts with the same opcode; set
//! requests are acknowledged by an echo of the set opcode.

use govee_types::codec;
use govee_types::{AlarmConfig, Quantity};

use crate::notification::Channel;

/// Two-byte command identifier.
pub type Opcode = [u8; 2];

/// Length of a padded frame including the checksum byte.
pub const FRAME_LEN: usize = 20;

/// Current measurement and battery, answered on the command channel.
pub const REQUEST_MEASUREMENT_AND_BATTERY: Opcode = [0xAA, 0x01];

/// Humidity alarm configuration.
pub const REQUEST_HUMIDITY_ALARM: Opcode = [0xAA, 0x03];

/// Temperature alarm configuration.
pub const REQUEST_TEMPERATURE_ALARM: Opcode = [0xAA, 0x04];

/// Humidity calibration offset.
pub const REQUEST_HUMIDITY_OFFSET: Opcode = [0xAA, 0x06];

/// Temperature calibration offset.
pub const REQUEST_TEMPERATURE_OFFSET: Opcode = [0xAA, 0x07];

/// Battery level.
pub const REQUEST_BATTERY: Opcode = [0xAA, 0x08];

/// Current measurement only, answered on the device channel.
pub const REQUEST_MEASUREMENT: Opcode = [0xAA, 0x0A];

/// MAC address and serial number.
pub const REQUEST_MAC_AND_SERIAL: Opcode = [0xAA, 0x0C];

/// Hardware revision.
pub const REQUEST_HARDWARE: Opcode = [0xAA, 0x0D];

/// Firmware revision.
pub const REQUEST_FIRMWARE: Opcode = [0xAA, 0x0E];

/// MAC address.
pub const REQUEST_MAC_ADDRESS: Opcode = [0xAA, 0x0F];

/// History request, minutes-ago range. The device echoes it when the transfer begins.
pub const REQUEST_HISTORY: Opcode = [0x33, 0x01];

/// Set humidity alarm.
pub const SET_HUMIDITY_ALARM: Opcode = [0x33, 0x03];

/// Set temperature alarm.
pub const SET_TEMPERATURE_ALARM: Opcode = [0x33, 0x04];

/// Set humidity offset.
pub const SET_HUMIDITY_OFFSET: Opcode = [0x33, 0x06];

/// Set temperature offset.
pub const SET_TEMPERATURE_OFFSET: Opcode = [0x33, 0x07];

/// History request, epoch-minute range (H5179).
pub const REQUEST_HISTORY_EPOCH: Opcode = [0x00, 0x00];

/// End of a history transfer, carrying the device's message count.
pub const HISTORY_COMPLETE: Opcode = [0xEE, 0x01];

/// A request the engine can send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Measurement and battery in one answer.
    MeasurementAndBattery,
    /// Measurement only.
    Measurement,
    /// Battery level.
    Battery,
    /// Alarm configuration.
    Alarm(Quantity),
    /// Calibration offset.
    Offset(Quantity),
    /// MAC address and serial number.
    MacAndSerial,
    /// Hardware revision.
    Hardware,
    /// Firmware revision.
    Firmware,
    /// MAC address.
    MacAddress,
    /// Write an alarm configuration.
    SetAlarm(AlarmConfig),
    /// Write a calibration offset.
    SetOffset(Quantity, f64),
    /// History for a range of minutes before now, `start >= end`.
    History { start: u16, end: u16 },
    /// History for a range of minutes since 1970, `start <= end`.
    HistoryEpoch { start: u32, end: u32 },
}

impl Command {
    /// Opcode prefix of this command.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::MeasurementAndBattery => REQUEST_MEASUREMENT_AND_BATTERY,
            Command::Measurement => REQUEST_MEASUREMENT,
            Command::Battery => REQUEST_BATTERY,
            Command::Alarm(Quantity::Humidity) => REQUEST_HUMIDITY_ALARM,
            Command::Alarm(Quantity::Temperature) => REQUEST_TEMPERATURE_ALARM,
            Command::Offset(Quantity::Humidity) => REQUEST_HUMIDITY_OFFSET,
            Command::Offset(Quantity::Temperature) => REQUEST_TEMPERATURE_OFFSET,
            Command::MacAndSerial => REQUEST_MAC_AND_SERIAL,
            Command::Hardware => REQUEST_HARDWARE,
            Command::Firmware => REQUEST_FIRMWARE,
            Command::MacAddress => REQUEST_MAC_ADDRESS,
            Command::SetAlarm(alarm) => set_alarm_opcode(alarm.quantity),
            Command::SetOffset(quantity, _) => set_offset_opcode(*quantity),
            Command::History { .. } => REQUEST_HISTORY,
            Command::HistoryEpoch { .. } => REQUEST_HISTORY_EPOCH,
        }
    }

    /// Channel whose characteristic the command is written to.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Command::MeasurementAndBattery
            | Command::History { .. }
            | Command::HistoryEpoch { .. } => Channel::CommandAck,
            _ => Channel::DeviceData,
        }
    }

    /// Encode the full frame to write.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let opcode = self.opcode();
        match self {
            Command::SetAlarm(alarm) => padded_frame(opcode, &codec::encode_alarm(alarm)),
            Command::SetOffset(_, offset) => padded_frame(opcode, &codec::encode_offset(*offset)),
            Command::History { start, end } => {
                let [s_hi, s_lo] = start.to_be_bytes();
                let [e_hi, e_lo] = end.to_be_bytes();
                padded_frame(opcode, &[s_hi, s_lo, e_hi, e_lo])
            }
            Command::HistoryEpoch { start, end } => {
                let mut frame = opcode.to_vec();
                frame.extend_from_slice(&start.to_le_bytes());
                frame.extend_from_slice(&end.to_le_bytes());
                frame
            }
            _ => padded_frame(opcode, &[]),
        }
    }
}

/// Opcode that writes the alarm for `quantity`.
#[must_use]
pub fn set_alarm_opcode(quantity: Quantity) -> Opcode {
    match quantity {
        Quantity::Humidity => SET_HUMIDITY_ALARM,
        Quantity::Temperature => SET_TEMPERATURE_ALARM,
    }
}

/// Opcode that writes the offset for `quantity`.
#[must_use]
pub fn set_offset_opcode(quantity: Quantity) -> Opcode {
    match quantity {
        Quantity::Humidity => SET_HUMIDITY_OFFSET,
        Quantity::Temperature => SET_TEMPERATURE_OFFSET,
    }
}

/// XOR of all bytes.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build a padded frame: opcode, params, zero padding up to
/// `FRAME_LEN - 1` bytes, then the XOR checksum of everything before it.
///
/// Frames that are already `FRAME_LEN` bytes or longer are sent as-is.
#[must_use]
pub fn padded_frame(opcode: Opcode, params: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(&opcode);
    frame.extend_from_slice(params);
    if frame.len() < FRAME_LEN {
        frame.resize(FRAME_LEN - 1, 0);
        frame.push(checksum(&frame));
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_request_frame() {
        let frame = Command::Battery.encode();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(&frame[..2], &[0xAA, 0x08]);
        assert!(frame[2..19].iter().all(|b| *b == 0));
        assert_eq!(frame[19], 0xAA ^ 0x08);
    }

    #[test]
    fn test_frame_xor_is_zero() {
        let frames = [
            Command::MeasurementAndBattery.encode(),
            Command::Alarm(Quantity::Temperature).encode(),
            Command::SetOffset(Quantity::Humidity, -2.5).encode(),
            Command::SetAlarm(AlarmConfig::new(Quantity::Humidity, true, 30.0, 70.0)).encode(),
            Command::History { start: 480, end: 0 }.encode(),
        ];
        for frame in frames {
            assert_eq!(frame.len(), FRAME_LEN);
            assert_eq!(checksum(&frame), 0, "frame {frame:02x?}");
        }
    }

    #[test]
    fn test_history_frame_is_big_endian() {
        let frame = Command::History {
            start: 0x0102,
            end: 0x0304,
        }
        .encode();
        assert_eq!(&frame[..6], &[0x33, 0x01, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_epoch_history_frame_is_unpadded_little_endian() {
        let frame = Command::HistoryEpoch {
            start: 0x0A0B0C0D,
            end: 0x01020304,
        }
        .encode();
        assert_eq!(
            frame,
            vec![0x00, 0x00, 0x0D, 0x0C, 0x0B, 0x0A, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_set_alarm_payload() {
        let alarm = AlarmConfig::new(Quantity::Temperature, false, -20.0, 60.0);
        let frame = Command::SetAlarm(alarm).encode();
        assert_eq!(&frame[..7], &[0x33, 0x04, 0x00, 0x30, 0xF8, 0x70, 0x17]);
    }

    #[test]
    fn test_command_channels() {
        assert_eq!(Command::MeasurementAndBattery.channel(), Channel::CommandAck);
        assert_eq!(Command::History { start: 1, end: 0 }.channel(), Channel::CommandAck);
        assert_eq!(Command::HistoryEpoch { start: 0, end: 1 }.channel(), Channel::CommandAck);
        assert_eq!(Command::Measurement.channel(), Channel::DeviceData);
        assert_eq!(Command::Offset(Quantity::Humidity).channel(), Channel::DeviceData);
        assert_eq!(
            Command::SetOffset(Quantity::Temperature, 1.0).channel(),
            Channel::DeviceData
        );
    }

    #[test]
    fn test_get_and_set_opcodes_differ() {
        for q in [Quantity::Humidity, Quantity::Temperature] {
            assert_ne!(Command::Alarm(q).opcode(), set_alarm_opcode(q));
            assert_ne!(Command::Offset(q).opcode(), set_offset_opcode(q));
        }
    }

    #[test]
    fn test_oversized_frame_is_not_padded() {
        let frame = padded_frame([0x33, 0x01], &[0u8; 20]);
        assert_eq!(frame.len(), 22);
    }

    proptest! {
        #[test]
        fn prop_padded_frames_self_cancel(a in any::<u8>(), b in any::<u8>(), params in proptest::collection::vec(any::<u8>(), 0..17)) {
            let frame = padded_frame([a, b], &params);
            prop_assert_eq!(frame.len(), FRAME_LEN);
            prop_assert_eq!(frame[FRAME_LEN - 1], checksum(&frame[..FRAME_LEN - 1]));
            prop_assert_eq!(checksum(&frame), 0);
        }
    }
}
