//! Device state owned by the engine.
//!
//! Routed notifications are applied here and nowhere else. Every field
//! starts out `None` and is filled in as answers arrive.

use std::collections::HashSet;

use govee_types::{AlarmConfig, Calibration, DeviceName, MacAndSerial, Measurement, Quantity};
use time::OffsetDateTime;
use tracing::{debug, trace};

use crate::commands::Opcode;
use crate::notification::Notification;
use crate::transfer::TransferSession;

/// Everything the engine has learned about one device.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    /// Name and the manufacturer/model sliced from it.
    pub name: Option<DeviceName>,
    /// Battery level in percent.
    pub battery: Option<u8>,
    /// Most recent current measurement.
    pub measurement: Option<Measurement>,
    /// Humidity alarm.
    pub humidity_alarm: Option<AlarmConfig>,
    /// Temperature alarm.
    pub temperature_alarm: Option<AlarmConfig>,
    /// Humidity calibration offset.
    pub humidity_offset: Option<f64>,
    /// Temperature calibration offset.
    pub temperature_offset: Option<f64>,
    /// MAC address and serial number.
    pub mac_and_serial: Option<MacAndSerial>,
    /// MAC address.
    pub mac: Option<String>,
    /// Hardware revision.
    pub hardware: Option<String>,
    /// Firmware revision.
    pub firmware: Option<String>,
    /// Set opcodes acknowledged since they were last cleared.
    pub acknowledged: HashSet<Opcode>,
    /// History transfer in progress, if any.
    pub transfer: Option<TransferSession>,
}

impl DeviceState {
    /// Create an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offsets known so far, zero where unknown.
    #[must_use]
    pub fn calibration(&self) -> Calibration {
        Calibration::new(
            self.humidity_offset.unwrap_or(0.0),
            self.temperature_offset.unwrap_or(0.0),
        )
    }

    /// Alarm for `quantity`.
    #[must_use]
    pub fn alarm(&self, quantity: Quantity) -> Option<AlarmConfig> {
        match quantity {
            Quantity::Humidity => self.humidity_alarm,
            Quantity::Temperature => self.temperature_alarm,
        }
    }

    /// Offset for `quantity`.
    #[must_use]
    pub fn offset(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Humidity => self.humidity_offset,
            Quantity::Temperature => self.temperature_offset,
        }
    }

    pub(crate) fn alarm_mut(&mut self, quantity: Quantity) -> &mut Option<AlarmConfig> {
        match quantity {
            Quantity::Humidity => &mut self.humidity_alarm,
            Quantity::Temperature => &mut self.temperature_alarm,
        }
    }

    pub(crate) fn offset_mut(&mut self, quantity: Quantity) -> &mut Option<f64> {
        match quantity {
            Quantity::Humidity => &mut self.humidity_offset,
            Quantity::Temperature => &mut self.temperature_offset,
        }
    }

    /// Apply a routed notification received at `now`.
    pub fn apply(&mut self, notification: Notification, now: OffsetDateTime) {
        match notification {
            Notification::MeasurementAndBattery {
                temperature,
                humidity,
                battery,
            } => {
                let m = Measurement::new(now, temperature, humidity, self.calibration());
                debug!(temperature = m.temperature(), humidity = m.humidity(), battery, "Measurement");
                self.measurement = Some(m);
                self.battery = Some(battery);
            }
            Notification::Measurement {
                temperature,
                humidity,
            } => {
                let m = Measurement::new(now, temperature, humidity, self.calibration());
                debug!(temperature = m.temperature(), humidity = m.humidity(), "Measurement");
                self.measurement = Some(m);
            }
            Notification::Battery(level) => {
                debug!(level, "Battery");
                self.battery = Some(level);
            }
            Notification::Alarm(alarm) => {
                debug!(%alarm, quantity = %alarm.quantity, "Alarm");
                *self.alarm_mut(alarm.quantity) = Some(alarm);
            }
            Notification::Offset(quantity, offset) => {
                debug!(%quantity, offset, "Offset");
                *self.offset_mut(quantity) = Some(offset);
            }
            Notification::MacAndSerial(mac_and_serial) => {
                debug!(mac = %mac_and_serial.mac, serial = mac_and_serial.serial, "MAC and serial");
                self.mac_and_serial = Some(mac_and_serial);
            }
            Notification::Hardware(hardware) => {
                debug!(%hardware, "Hardware revision");
                self.hardware = Some(hardware);
            }
            Notification::Firmware(firmware) => {
                debug!(%firmware, "Firmware revision");
                self.firmware = Some(firmware);
            }
            Notification::MacAddress(mac) => {
                debug!(%mac, "MAC address");
                self.mac = Some(mac);
            }
            Notification::SettingAcknowledged(opcode) => {
                debug!(opcode = ?opcode, "Setting acknowledged");
                self.acknowledged.insert(opcode);
            }
            Notification::TransferStarted => match self.transfer.as_mut() {
                Some(session) => {
                    debug!("History transfer started");
                    session.mark_started();
                }
                None => trace!("Transfer start without a session"),
            },
            Notification::TransferComplete { reported } => match self.transfer.as_mut() {
                Some(session) => {
                    session.finish(reported);
                    debug!(
                        reported,
                        counted = session.counted(),
                        status = ?session.status(),
                        "History transfer finished"
                    );
                }
                None => trace!(reported, "Transfer end without a session"),
            },
            Notification::HistoryBatch(batch) => match self.transfer.as_mut() {
                Some(session) => {
                    trace!(samples = batch.samples.len(), "History batch");
                    session.record_batch(batch);
                }
                None => trace!("History batch without a session"),
            },
            Notification::Unknown { channel, opcode } => {
                trace!(?channel, opcode = ?opcode, "Ignoring unknown notification");
            }
            Notification::Malformed { opcode } => {
                trace!(opcode = ?opcode, "Ignoring short notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Channel;
    use crate::transfer::TransferStatus;
    use govee_types::DeviceProfile;
    use govee_types::codec::HistoryBatch;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

    // --- field updates ---

    #[test]
    fn test_measurement_uses_known_offsets() {
        let mut state = DeviceState::new();
        state.apply(Notification::Offset(Quantity::Temperature, -1.0), NOW);
        state.apply(Notification::Offset(Quantity::Humidity, 2.0), NOW);
        state.apply(
            Notification::Measurement {
                temperature: 25.0,
                humidity: 50.0,
            },
            NOW,
        );

        let m = state.measurement.expect("measurement");
        assert_eq!(m.temperature(), 24.0);
        assert_eq!(m.humidity(), 52.0);
        assert_eq!(m.timestamp(), NOW);
    }

    #[test]
    fn test_measurement_and_battery() {
        let mut state = DeviceState::new();
        state.apply(
            Notification::MeasurementAndBattery {
                temperature: 21.5,
                humidity: 40.0,
                battery: 77,
            },
            NOW,
        );
        assert_eq!(state.battery, Some(77));
        assert_eq!(state.measurement.map(|m| m.temperature()), Some(21.5));
    }

    #[test]
    fn test_alarm_routed_by_quantity() {
        let mut state = DeviceState::new();
        let alarm = AlarmConfig::new(Quantity::Temperature, true, -5.0, 30.0);
        state.apply(Notification::Alarm(alarm), NOW);
        assert_eq!(state.alarm(Quantity::Temperature), Some(alarm));
        assert_eq!(state.alarm(Quantity::Humidity), None);
    }

    #[test]
    fn test_acknowledgements_accumulate() {
        let mut state = DeviceState::new();
        state.apply(Notification::SettingAcknowledged([0x33, 0x06]), NOW);
        assert!(state.acknowledged.contains(&[0x33, 0x06]));
        assert!(!state.acknowledged.contains(&[0x33, 0x07]));
    }

    #[test]
    fn test_ignored_messages_change_nothing() {
        let mut state = DeviceState::new();
        state.apply(
            Notification::Unknown {
                channel: Channel::DeviceData,
                opcode: [0xAA, 0x99],
            },
            NOW,
        );
        state.apply(Notification::Malformed { opcode: [0xAA, 0x08] }, NOW);
        assert_eq!(state.battery, None);
        assert!(state.acknowledged.is_empty());
    }

    // --- history ---

    #[test]
    fn test_history_without_session_is_dropped() {
        let mut state = DeviceState::new();
        let batch = HistoryBatch::decode(&[0x00, 0x01, 0x01, 0x00, 0x64], &DeviceProfile::H507X)
            .expect("batch");
        state.apply(Notification::HistoryBatch(batch), NOW);
        state.apply(Notification::TransferComplete { reported: 1 }, NOW);
        assert!(state.transfer.is_none());
    }

    #[test]
    fn test_history_session_lifecycle() {
        let mut state = DeviceState::new();
        state.transfer = Some(TransferSession::new(NOW, 1, state.calibration()));
        let batch = HistoryBatch::decode(&[0x00, 0x01, 0x01, 0x00, 0x64], &DeviceProfile::H507X)
            .expect("batch");

        state.apply(Notification::TransferStarted, NOW);
        state.apply(Notification::HistoryBatch(batch), NOW);
        state.apply(Notification::TransferComplete { reported: 1 }, NOW);

        let session = state.transfer.expect("session");
        assert_eq!(session.status(), TransferStatus::Complete);
        assert_eq!(session.samples().len(), 1);
    }

    #[test]
    fn test_calibration_defaults_to_zero() {
        let state = DeviceState::new();
        assert!(state.calibration().is_zero());
    }
}
