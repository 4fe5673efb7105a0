//! Mock transport for testing.
//!
//! [`MockTransport`] implements [`GattTransport`] over a small simulated
//! sensor, so the engine can be exercised without BLE hardware. Every write
//! is recorded, and the simulated sensor answers synchronously through the
//! subscribed callbacks the way a real device answers with notifications.
//!
//! # Features
//!
//! - **Field answers**: measurement, battery, alarms, offsets, MAC, serial and revisions
//! - **Settings**: alarm and offset writes are stored and echoed
//! - **History**: both history framings, with sentinel slots outside the range
//! - **Failure injection**: silence, ignored opcodes, dropped batches and a missing end marker
//!
//! # Example
//!
//! ```
//! use govee_core::{EngineConfig, Hygrometer, MockTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = MockTransport::builder().temperature(21.5).humidity(40.0).build();
//!     let mut sensor = Hygrometer::attach(transport, EngineConfig::default()).await.unwrap();
//!
//!     let current = sensor.request_current().await.unwrap().unwrap();
//!     assert_eq!(current.measurement.temperature(), 21.5);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use govee_types::codec::{self, EMPTY_SLOT, Endian};
use govee_types::{AlarmConfig, DeviceProfile, Quantity, uuids};
use uuid::Uuid;

use crate::commands::{self, Opcode, padded_frame};
use crate::engine::MAX_HISTORY_MINUTES;
use crate::error::{Error, Result};
use crate::traits::{GattTransport, NotificationCallback};

/// A simulated Govee sensor behind the [`GattTransport`] interface.
///
/// Clones share the same simulated device.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    address: String,
    connected: AtomicBool,
    sensor: Mutex<Sensor>,
    callbacks: Mutex<HashMap<Uuid, Arc<NotificationCallback>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
}

#[derive(Debug, Clone)]
struct Sensor {
    profile: DeviceProfile,
    temperature: f64,
    humidity: f64,
    battery: u8,
    humidity_alarm: AlarmConfig,
    temperature_alarm: AlarmConfig,
    humidity_offset: f64,
    temperature_offset: f64,
    mac: [u8; 6],
    serial: i16,
    hardware: String,
    firmware: String,
    silent: bool,
    ignored: HashSet<Opcode>,
    dropped_batches: u32,
    omit_history_end: bool,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("name", &self.inner.name)
            .field("address", &self.inner.address)
            .field("connected", &self.inner.connected.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Start building a mock transport. Defaults to an H5075.
    #[must_use]
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// All writes so far, as `(characteristic, frame)`.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        lock(&self.inner.writes).clone()
    }

    /// Number of writes so far.
    pub fn write_count(&self) -> usize {
        lock(&self.inner.writes).len()
    }

    /// Stop or resume answering every request.
    pub fn set_silent(&self, silent: bool) {
        lock(&self.inner.sensor).silent = silent;
    }

    /// Change the raw reading the sensor reports.
    pub fn set_reading(&self, temperature: f64, humidity: f64) {
        let mut sensor = lock(&self.inner.sensor);
        sensor.temperature = temperature;
        sensor.humidity = humidity;
    }

    /// The alarm currently stored on the simulated sensor.
    pub fn alarm(&self, quantity: Quantity) -> AlarmConfig {
        let sensor = lock(&self.inner.sensor);
        match quantity {
            Quantity::Humidity => sensor.humidity_alarm,
            Quantity::Temperature => sensor.temperature_alarm,
        }
    }

    /// The offset currently stored on the simulated sensor.
    pub fn offset(&self, quantity: Quantity) -> f64 {
        let sensor = lock(&self.inner.sensor);
        match quantity {
            Quantity::Humidity => sensor.humidity_offset,
            Quantity::Temperature => sensor.temperature_offset,
        }
    }

    /// Deliver an arbitrary notification on `characteristic`.
    ///
    /// Does nothing if nobody subscribed to it.
    pub fn notify(&self, characteristic: Uuid, value: &[u8]) {
        let callback = lock(&self.inner.callbacks).get(&characteristic).cloned();
        if let Some(callback) = callback {
            callback(value);
        }
    }

    fn respond(&self, characteristic: Uuid, frame: &[u8]) {
        let responses = lock(&self.inner.sensor).answer(characteristic, frame);
        for (uuid, value) in responses {
            self.notify(uuid, &value);
        }
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    fn address(&self) -> &str {
        &self.inner.address
    }

    fn name(&self) -> Option<&str> {
        Some(self.inner.name.as_str())
    }

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if uuid == uuids::DEVICE_NAME {
            let mut value = self.inner.name.as_bytes().to_vec();
            value.push(0);
            return Ok(value);
        }
        Err(Error::characteristic_not_found(uuid.to_string(), 1))
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if uuid != uuids::DEVICE_DATA && uuid != uuids::COMMAND {
            return Err(Error::characteristic_not_found(uuid.to_string(), 1));
        }
        lock(&self.inner.writes).push((uuid, data.to_vec()));
        self.respond(uuid, data);
        Ok(())
    }

    async fn subscribe(&self, uuid: Uuid, callback: NotificationCallback) -> Result<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if ![uuids::DEVICE_DATA, uuids::COMMAND, uuids::HISTORY_DATA].contains(&uuid) {
            return Err(Error::characteristic_not_found(uuid.to_string(), 1));
        }
        lock(&self.inner.callbacks).insert(uuid, Arc::new(callback));
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.connected.store(false, Ordering::SeqCst);
        lock(&self.inner.callbacks).clear();
        Ok(())
    }
}

impl Sensor {
    /// Notifications the sensor sends in reply to `frame`.
    fn answer(&mut self, characteristic: Uuid, frame: &[u8]) -> Vec<(Uuid, Vec<u8>)> {
        let (Some(&a), Some(&b)) = (frame.first(), frame.get(1)) else {
            return Vec::new();
        };
        let opcode: Opcode = [a, b];
        if self.silent || self.ignored.contains(&opcode) {
            return Vec::new();
        }

        match opcode {
            commands::REQUEST_MEASUREMENT_AND_BATTERY => {
                let mut params =
                    codec::encode_fixed_pair(self.temperature, self.humidity, Endian::Big).to_vec();
                params.push(self.battery);
                vec![(uuids::COMMAND, padded_frame(opcode, &params))]
            }
            commands::REQUEST_MEASUREMENT => {
                let params = codec::encode_fixed_pair(self.temperature, self.humidity, Endian::Little);
                device_data(opcode, &params)
            }
            commands::REQUEST_BATTERY => device_data(opcode, &[self.battery]),
            commands::REQUEST_HUMIDITY_ALARM => {
                device_data(opcode, &codec::encode_alarm(&self.humidity_alarm))
            }
            commands::REQUEST_TEMPERATURE_ALARM => {
                device_data(opcode, &codec::encode_alarm(&self.temperature_alarm))
            }
            commands::REQUEST_HUMIDITY_OFFSET => {
                device_data(opcode, &codec::encode_offset(self.humidity_offset))
            }
            commands::REQUEST_TEMPERATURE_OFFSET => {
                device_data(opcode, &codec::encode_offset(self.temperature_offset))
            }
            commands::REQUEST_MAC_AND_SERIAL => {
                let mut params = self.reversed_mac().to_vec();
                params.extend_from_slice(&self.serial.to_le_bytes());
                device_data(opcode, &params)
            }
            commands::REQUEST_HARDWARE => device_data(opcode, &ascii7(&self.hardware)),
            commands::REQUEST_FIRMWARE => device_data(opcode, &ascii7(&self.firmware)),
            commands::REQUEST_MAC_ADDRESS => device_data(opcode, &self.reversed_mac()),
            commands::SET_HUMIDITY_ALARM | commands::SET_TEMPERATURE_ALARM => {
                let quantity = if opcode == commands::SET_HUMIDITY_ALARM {
                    Quantity::Humidity
                } else {
                    Quantity::Temperature
                };
                match frame.get(2..7).and_then(|p| codec::decode_alarm(p, quantity)) {
                    Some(alarm) if quantity == Quantity::Humidity => self.humidity_alarm = alarm,
                    Some(alarm) => self.temperature_alarm = alarm,
                    None => return Vec::new(),
                }
                device_data(opcode, &[])
            }
            commands::SET_HUMIDITY_OFFSET | commands::SET_TEMPERATURE_OFFSET => {
                let Some(offset) = frame.get(2..4).and_then(codec::decode_offset) else {
                    return Vec::new();
                };
                if opcode == commands::SET_HUMIDITY_OFFSET {
                    self.humidity_offset = offset;
                } else {
                    self.temperature_offset = offset;
                }
                device_data(opcode, &[])
            }
            commands::REQUEST_HISTORY if characteristic == uuids::COMMAND => {
                let word = |at: usize| {
                    frame
                        .get(at..at + 2)
                        .and_then(|b| <[u8; 2]>::try_from(b).ok())
                        .map(u16::from_be_bytes)
                };
                match (word(2), word(4)) {
                    (Some(start), Some(end)) => self.minutes_ago_history(start, end),
                    _ => Vec::new(),
                }
            }
            commands::REQUEST_HISTORY_EPOCH if characteristic == uuids::COMMAND => {
                let word = |at: usize| {
                    frame
                        .get(at..at + 4)
                        .and_then(|b| <[u8; 4]>::try_from(b).ok())
                        .map(u32::from_le_bytes)
                };
                match (word(2), word(6)) {
                    (Some(start), Some(end)) => self.epoch_history(start, end),
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn reversed_mac(&self) -> [u8; 6] {
        let mut mac = self.mac;
        mac.reverse();
        mac
    }

    fn minutes_ago_history(&self, start: u16, end: u16) -> Vec<(Uuid, Vec<u8>)> {
        let per = self.profile.records_per_notification;
        let count = self.profile.expected_messages(u32::from(start.abs_diff(end)));
        let record = codec::encode_sign_magnitude(self.temperature, self.humidity);

        let batches = (0..count).map(|k| {
            let first = i64::from(start) - i64::from(k) * i64::from(per);
            let mut value = u16::try_from(first.max(0)).unwrap_or(0).to_be_bytes().to_vec();
            for slot in 0..i64::from(per) {
                if first - slot < i64::from(end) {
                    value.extend_from_slice(&[EMPTY_SLOT; 3]);
                } else {
                    value.extend_from_slice(&record);
                }
            }
            value
        });
        self.transfer(count, batches)
    }

    /// The sensor only holds the newest [`MAX_HISTORY_MINUTES`] minutes.
    fn epoch_history(&self, start: u32, end: u32) -> Vec<(Uuid, Vec<u8>)> {
        let start = start.max(end.saturating_sub(u32::from(MAX_HISTORY_MINUTES)));
        let per = self.profile.records_per_notification;
        let count = self.profile.expected_messages(start.abs_diff(end));
        let record = codec::encode_twos_complement_pair(self.temperature, self.humidity);

        let batches = (0..count).map(|k| {
            let first = i64::from(end) - i64::from(k) * i64::from(per);
            let mut value = u32::try_from(first.max(0)).unwrap_or(0).to_le_bytes().to_vec();
            for slot in 0..i64::from(per) {
                if first - slot < i64::from(start) {
                    value.extend_from_slice(&[EMPTY_SLOT; 4]);
                } else {
                    value.extend_from_slice(&record);
                }
            }
            value
        });
        self.transfer(count, batches)
    }

    /// Begin echo, batches minus the dropped tail, then the end marker with
    /// the full count.
    fn transfer(
        &self,
        count: u32,
        batches: impl Iterator<Item = Vec<u8>>,
    ) -> Vec<(Uuid, Vec<u8>)> {
        let mut out = vec![(uuids::COMMAND, padded_frame(commands::REQUEST_HISTORY, &[]))];
        let delivered = count.saturating_sub(self.dropped_batches) as usize;
        out.extend(batches.take(delivered).map(|b| (uuids::HISTORY_DATA, b)));
        if !self.omit_history_end {
            let reported = u16::try_from(count).unwrap_or(u16::MAX).to_be_bytes();
            out.push((
                uuids::COMMAND,
                padded_frame(commands::HISTORY_COMPLETE, &reported),
            ));
        }
        out
    }
}

fn device_data(opcode: Opcode, params: &[u8]) -> Vec<(Uuid, Vec<u8>)> {
    vec![(uuids::DEVICE_DATA, padded_frame(opcode, params))]
}

fn ascii7(text: &str) -> [u8; 7] {
    let mut field = [0u8; 7];
    for (dst, src) in field.iter_mut().zip(text.bytes()) {
        *dst = src;
    }
    field
}

fn parse_mac(mac: &str) -> [u8; 6] {
    let mut octets = [0u8; 6];
    for (dst, part) in octets.iter_mut().zip(mac.split(':')) {
        *dst = u8::from_str_radix(part, 16).unwrap_or(0);
    }
    octets
}

/// Builder for creating mock transports with custom settings.
#[derive(Debug)]
pub struct MockTransportBuilder {
    name: String,
    address: String,
    temperature: f64,
    humidity: f64,
    battery: u8,
    humidity_alarm: AlarmConfig,
    temperature_alarm: AlarmConfig,
    humidity_offset: f64,
    temperature_offset: f64,
    serial: i16,
    hardware: String,
    firmware: String,
    silent: bool,
    ignored: HashSet<Opcode>,
    dropped_batches: u32,
    omit_history_end: bool,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            name: "GVH5075_1A2B".to_string(),
            address: "A4:C1:38:00:1A:2B".to_string(),
            temperature: 21.5,
            humidity: 45.6,
            battery: 87,
            humidity_alarm: AlarmConfig::new(Quantity::Humidity, false, 0.0, 100.0),
            temperature_alarm: AlarmConfig::new(Quantity::Temperature, false, -20.0, 60.0),
            humidity_offset: 0.0,
            temperature_offset: 0.0,
            serial: 4242,
            hardware: "1.00.01".to_string(),
            firmware: "1.04.06".to_string(),
            silent: false,
            ignored: HashSet::new(),
            dropped_batches: 0,
            omit_history_end: false,
        }
    }
}

impl MockTransportBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the advertised and GATT name. Also selects the simulated family.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the address, also reported as the MAC.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    /// Set the raw temperature in °C.
    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the raw relative humidity in %.
    #[must_use]
    pub fn humidity(mut self, humidity: f64) -> Self {
        self.humidity = humidity;
        self
    }

    /// Set the battery level.
    #[must_use]
    pub fn battery(mut self, battery: u8) -> Self {
        self.battery = battery;
        self
    }

    /// Set a stored alarm.
    #[must_use]
    pub fn alarm(mut self, alarm: AlarmConfig) -> Self {
        match alarm.quantity {
            Quantity::Humidity => self.humidity_alarm = alarm,
            Quantity::Temperature => self.temperature_alarm = alarm,
        }
        self
    }

    /// Set a stored calibration offset.
    #[must_use]
    pub fn offset(mut self, quantity: Quantity, offset: f64) -> Self {
        match quantity {
            Quantity::Humidity => self.humidity_offset = offset,
            Quantity::Temperature => self.temperature_offset = offset,
        }
        self
    }

    /// Set the serial number.
    #[must_use]
    pub fn serial(mut self, serial: i16) -> Self {
        self.serial = serial;
        self
    }

    /// Set the hardware revision (at most 7 characters are sent).
    #[must_use]
    pub fn hardware(mut self, hardware: &str) -> Self {
        self.hardware = hardware.to_string();
        self
    }

    /// Set the firmware revision (at most 7 characters are sent).
    #[must_use]
    pub fn firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_string();
        self
    }

    /// Never answer anything.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Never answer requests starting with `opcode`.
    #[must_use]
    pub fn ignore(mut self, opcode: Opcode) -> Self {
        self.ignored.insert(opcode);
        self
    }

    /// Leave out the last `count` history batches while still reporting the
    /// full count at the end.
    #[must_use]
    pub fn drop_history_batches(mut self, count: u32) -> Self {
        self.dropped_batches = count;
        self
    }

    /// Never send the end-of-transfer marker.
    #[must_use]
    pub fn omit_history_end(mut self) -> Self {
        self.omit_history_end = true;
        self
    }

    /// Build the mock transport, already connected.
    #[must_use]
    pub fn build(self) -> MockTransport {
        let sensor = Sensor {
            profile: DeviceProfile::for_name(&self.name),
            temperature: self.temperature,
            humidity: self.humidity,
            battery: self.battery,
            humidity_alarm: self.humidity_alarm,
            temperature_alarm: self.temperature_alarm,
            humidity_offset: self.humidity_offset,
            temperature_offset: self.temperature_offset,
            mac: parse_mac(&self.address),
            serial: self.serial,
            hardware: self.hardware,
            firmware: self.firmware,
            silent: self.silent,
            ignored: self.ignored,
            dropped_batches: self.dropped_batches,
            omit_history_end: self.omit_history_end,
        };

        MockTransport {
            inner: Arc::new(Inner {
                name: self.name,
                address: self.address,
                connected: AtomicBool::new(true),
                sensor: Mutex::new(sensor),
                callbacks: Mutex::new(HashMap::new()),
                writes: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Unit tests for the simulated sensor.
///
/// Engine-level behaviour is covered in `tests/engine.rs`.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use std::sync::atomic::AtomicUsize;

    fn collect(transport: &MockTransport, uuid: Uuid) -> Arc<Mutex<Vec<Vec<u8>>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: NotificationCallback = Box::new(move |value: &[u8]| {
            sink.lock().unwrap().push(value.to_vec());
        });
        lock(&transport.inner.callbacks).insert(uuid, Arc::new(callback));
        seen
    }

    // --- connection ---

    #[tokio::test]
    async fn test_disconnect_rejects_operations() {
        let transport = MockTransport::builder().build();
        assert!(transport.is_connected().await);
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
        let err = transport
            .write_characteristic(uuids::DEVICE_DATA, &Command::Battery.encode())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_read_device_name() {
        let transport = MockTransport::builder().name("Govee_H5179_0F0F").build();
        let raw = transport.read_characteristic(uuids::DEVICE_NAME).await.unwrap();
        assert_eq!(raw, b"Govee_H5179_0F0F\0");
        assert!(transport.read_characteristic(uuids::COMMAND).await.is_err());
    }

    // --- answers ---

    #[tokio::test]
    async fn test_battery_answer() {
        let transport = MockTransport::builder().battery(64).build();
        let seen = collect(&transport, uuids::DEVICE_DATA);
        transport
            .write_characteristic(uuids::DEVICE_DATA, &Command::Battery.encode())
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0][..3], &[0xAA, 0x08, 64]);
        assert_eq!(transport.write_count(), 1);
    }

    #[tokio::test]
    async fn test_ignored_opcode_is_recorded_but_not_answered() {
        let transport = MockTransport::builder()
            .ignore(commands::REQUEST_BATTERY)
            .build();
        let seen = collect(&transport, uuids::DEVICE_DATA);
        transport
            .write_characteristic(uuids::DEVICE_DATA, &Command::Battery.encode())
            .await
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(transport.writes()[0].0, uuids::DEVICE_DATA);
    }

    #[tokio::test]
    async fn test_set_offset_is_stored_and_echoed() {
        let transport = MockTransport::builder().build();
        let seen = collect(&transport, uuids::DEVICE_DATA);
        transport
            .write_characteristic(
                uuids::DEVICE_DATA,
                &Command::SetOffset(Quantity::Temperature, -1.25).encode(),
            )
            .await
            .unwrap();
        assert_eq!(transport.offset(Quantity::Temperature), -1.25);
        assert_eq!(&seen.lock().unwrap()[0][..2], &commands::SET_TEMPERATURE_OFFSET);
    }

    // --- history ---

    #[tokio::test]
    async fn test_minutes_ago_history_layout() {
        let transport = MockTransport::builder().build();
        let control = collect(&transport, uuids::COMMAND);
        let batches = collect(&transport, uuids::HISTORY_DATA);
        transport
            .write_characteristic(uuids::COMMAND, &Command::History { start: 7, end: 0 }.encode())
            .await
            .unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(&batches[0][..2], &[0x00, 0x07]);
        assert_eq!(&batches[1][..2], &[0x00, 0x01]);
        // minutes 1 and 0 are present, the rest of the second batch is sentinel
        assert_ne!(batches[1][2 + 3], EMPTY_SLOT);
        assert_eq!(batches[1][2 + 6], EMPTY_SLOT);

        let control = control.lock().unwrap();
        assert_eq!(&control[0][..2], &commands::REQUEST_HISTORY);
        assert_eq!(&control[1][..4], &[0xEE, 0x01, 0x00, 0x02]);
    }

    #[tokio::test]
    async fn test_dropped_batches_still_report_full_count() {
        let transport = MockTransport::builder().drop_history_batches(1).build();
        let control = collect(&transport, uuids::COMMAND);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let callback: NotificationCallback = Box::new(move |_: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        lock(&transport.inner.callbacks).insert(uuids::HISTORY_DATA, Arc::new(callback));

        transport
            .write_characteristic(uuids::COMMAND, &Command::History { start: 11, end: 0 }.encode())
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(&control.lock().unwrap()[1][..4], &[0xEE, 0x01, 0x00, 0x02]);
    }

    #[tokio::test]
    async fn test_epoch_history_serves_at_most_the_stored_window() {
        let transport = MockTransport::builder().name("Govee_H5179_0F0F").build();
        let control = collect(&transport, uuids::COMMAND);
        let batches = collect(&transport, uuids::HISTORY_DATA);
        transport
            .write_characteristic(
                uuids::COMMAND,
                &Command::HistoryEpoch {
                    start: 0,
                    end: u32::MAX,
                }
                .encode(),
            )
            .await
            .unwrap();

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 7_201);
        assert_eq!(&batches[0][..4], &u32::MAX.to_le_bytes());
        let control = control.lock().unwrap();
        assert_eq!(&control[1][..4], &[0xEE, 0x01, 0x1C, 0x21]);
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(
            parse_mac("A4:C1:38:00:1A:2B"),
            [0xA4, 0xC1, 0x38, 0x00, 0x1A, 0x2B]
        );
        assert_eq!(parse_mac("not a mac"), [0; 6]);
    }
}
