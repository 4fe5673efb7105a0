//! The request/response protocol engine.
//!
//! A [`Hygrometer`] owns one connected transport, the receiving end of its
//! notification channel and the [`DeviceState`] built from it. Every
//! operation has the same shape: encode a [`Command`], write it, then poll
//! the state until the answer shows up or a cap runs out.
//!
//! Notifications are handed over from the transport's callbacks through an
//! unbounded channel and applied only inside the engine's own wait loop, so
//! the state never needs a lock.
//!
//! # Example
//!
//! ```ignore
//! use govee_core::{ConnectionConfig, EngineConfig, HistoryRange, Hygrometer};
//!
//! #[tokio::main]
//! async fn main() -> govee_core::Result<()> {
//!     let mut sensor = Hygrometer::connect(
//!         "A4:C1:38:12:34:56",
//!         ConnectionConfig::default(),
//!         EngineConfig::default(),
//!     )
//!     .await?;
//!
//!     if let Some(current) = sensor.request_current().await? {
//!         println!("{:.1} °C", current.measurement.temperature());
//!     }
//!
//!     let download = sensor.request_history(HistoryRange::minutes_ago(60, 0)).await?;
//!     println!("{} samples ({:?})", download.samples.len(), download.outcome);
//!
//!     sensor.disconnect().await
//! }
//! ```

use std::time::Duration;

use govee_types::codec;
use govee_types::{
    AlarmConfig, Calibration, CurrentReadingVariant, DeviceInfo, DeviceName, DeviceProfile,
    HistoryFraming, MacAndSerial, Measurement, Quantity, uuids,
};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::commands::{Command, Opcode};
use crate::device::{ConnectionConfig, Device};
use crate::error::{Error, Result};
use crate::notification::{Channel, Notification};
use crate::state::DeviceState;
use crate::traits::GattTransport;
use crate::transfer::{HistoryDownload, TransferSession};
use crate::util::to_hex;
use crate::validation::{validate_alarm, validate_offset};

/// Largest minutes-ago value the sensors keep history for (20 days).
pub const MAX_HISTORY_MINUTES: u16 = 28_800;

/// Default interval between state checks while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default cap for a history transfer.
pub const DEFAULT_HISTORY_WAIT: Duration = Duration::from_secs(60);

/// Default cap for a setting acknowledgement.
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(60);

/// Default cap for a single field request.
pub const DEFAULT_FIELD_WAIT: Duration = Duration::from_secs(5);

/// Default pause after subscribing before the first request.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(200);

/// Timing knobs for the engine's wait loops.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between state checks.
    pub poll_interval: Duration,
    /// Cap for a history transfer to finish.
    pub history_wait: Duration,
    /// Cap for a setting to be acknowledged.
    pub ack_wait: Duration,
    /// Cap for a field request to be answered.
    pub field_wait: Duration,
    /// Pause after subscribing, before the first request.
    pub settle_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_wait: DEFAULT_HISTORY_WAIT,
            ack_wait: DEFAULT_ACK_WAIT,
            field_wait: DEFAULT_FIELD_WAIT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default timings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the history transfer cap.
    #[must_use]
    pub fn history_wait(mut self, wait: Duration) -> Self {
        self.history_wait = wait;
        self
    }

    /// Set the acknowledgement cap.
    #[must_use]
    pub fn ack_wait(mut self, wait: Duration) -> Self {
        self.ack_wait = wait;
        self
    }

    /// Set the field request cap.
    #[must_use]
    pub fn field_wait(mut self, wait: Duration) -> Self {
        self.field_wait = wait;
        self
    }

    /// Set the settle delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Whether the device echoed a setting before the cap ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Acknowledgement {
    /// The set opcode was echoed.
    Confirmed,
    /// No echo arrived. The device may or may not have applied the value.
    TimedOut,
}

impl Acknowledgement {
    /// Whether the echo arrived.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Acknowledgement::Confirmed)
    }
}

/// A current measurement with the battery level, when the device sent one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentReading {
    /// The calibrated measurement.
    pub measurement: Measurement,
    /// Battery level in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,
}

/// Range of history to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryRange {
    /// Minutes before now, `start >= end`.
    MinutesAgo { start: u16, end: u16 },
    /// Minutes since 1970-01-01, `start <= end`.
    EpochMinutes { start: u32, end: u32 },
}

impl HistoryRange {
    /// Range of minutes before now, clamped to [`MAX_HISTORY_MINUTES`] and
    /// ordered so the start is the older end.
    #[must_use]
    pub fn minutes_ago(start: u32, end: u32) -> Self {
        let start = clamp_minutes(start);
        let end = clamp_minutes(end);
        HistoryRange::MinutesAgo {
            start: start.max(end),
            end: start.min(end),
        }
    }

    /// Range of absolute epoch minutes, ordered so the start is the older
    /// end. Only the newest [`MAX_HISTORY_MINUTES`] of the range are kept.
    #[must_use]
    pub fn epoch_minutes(start: u32, end: u32) -> Self {
        let (start, end) = (start.min(end), start.max(end));
        HistoryRange::EpochMinutes {
            start: clamp_epoch_start(start, end),
            end,
        }
    }
}

fn clamp_minutes(minutes: u32) -> u16 {
    u16::try_from(minutes.min(u32::from(MAX_HISTORY_MINUTES))).unwrap_or(MAX_HISTORY_MINUTES)
}

fn clamp_epoch_start(start: u32, end: u32) -> u32 {
    start.max(end.saturating_sub(u32::from(MAX_HISTORY_MINUTES)))
}

/// Build the history request for `range` in the framing the device expects.
///
/// `now` is the current time in epoch minutes and is used to convert between
/// the two range forms.
#[must_use]
pub fn history_command(range: HistoryRange, framing: HistoryFraming, now: u32) -> Command {
    match (framing, range) {
        (HistoryFraming::MinutesAgo, HistoryRange::MinutesAgo { start, end }) => {
            Command::History { start, end }
        }
        (HistoryFraming::MinutesAgo, HistoryRange::EpochMinutes { start, end }) => {
            Command::History {
                start: clamp_minutes(now.saturating_sub(start)),
                end: clamp_minutes(now.saturating_sub(end)),
            }
        }
        (HistoryFraming::EpochMinutes, HistoryRange::MinutesAgo { start, end }) => {
            Command::HistoryEpoch {
                start: now.saturating_sub(u32::from(start)),
                end: now.saturating_sub(u32::from(end)),
            }
        }
        (HistoryFraming::EpochMinutes, HistoryRange::EpochMinutes { start, end }) => {
            Command::HistoryEpoch {
                start: clamp_epoch_start(start, end),
                end,
            }
        }
    }
}

fn history_span(command: &Command) -> u32 {
    match *command {
        Command::History { start, end } => u32::from(start.abs_diff(end)),
        Command::HistoryEpoch { start, end } => start.abs_diff(end),
        _ => 0,
    }
}

type Inbox = mpsc::UnboundedReceiver<(Channel, Vec<u8>)>;

/// Protocol engine for one connected thermometer/hygrometer.
pub struct Hygrometer<T: GattTransport> {
    transport: T,
    inbox: Inbox,
    state: DeviceState,
    profile: DeviceProfile,
    config: EngineConfig,
}

impl Hygrometer<Device> {
    /// Connect to a device by address or name and attach an engine to it.
    ///
    /// The device is disconnected again if subscribing fails.
    #[tracing::instrument(level = "info", skip_all, fields(identifier = %identifier))]
    pub async fn connect(
        identifier: &str,
        connection: ConnectionConfig,
        config: EngineConfig,
    ) -> Result<Self> {
        let device = Device::connect(identifier, connection).await?;
        let inbox = match subscribe_all(&device).await {
            Ok(inbox) => inbox,
            Err(e) => {
                warn!(error = %e, "Subscribing failed, disconnecting");
                if let Err(err) = device.disconnect().await {
                    warn!(error = %err, "Disconnect after failed subscribe also failed");
                }
                return Err(e);
            }
        };
        Ok(Self::from_parts(device, inbox, config).await)
    }
}

impl<T: GattTransport> Hygrometer<T> {
    /// Subscribe to all three channels of a connected transport.
    ///
    /// The profile is chosen from the advertised name until
    /// [`request_device_name`](Self::request_device_name) reads the real one.
    #[tracing::instrument(level = "info", skip_all, fields(address = %transport.address()))]
    pub async fn attach(transport: T, config: EngineConfig) -> Result<Self> {
        let inbox = subscribe_all(&transport).await?;
        Ok(Self::from_parts(transport, inbox, config).await)
    }

    async fn from_parts(transport: T, inbox: Inbox, config: EngineConfig) -> Self {
        tokio::time::sleep(config.settle_delay).await;
        let profile = transport
            .name()
            .map(DeviceProfile::for_name)
            .unwrap_or_default();
        debug!(family = ?profile.family, "Engine attached");
        Self {
            transport,
            inbox,
            state: DeviceState::new(),
            profile,
            config,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Everything learned from the device so far.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// The profile in use.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// The engine timings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Address of the connected device.
    pub fn address(&self) -> &str {
        self.transport.address()
    }

    /// Disconnect the transport.
    pub async fn disconnect(&self) -> Result<()> {
        info!(address = %self.transport.address(), "Disconnecting");
        self.transport.disconnect().await
    }

    // --- identity ---

    /// Read the GATT device name and select the matching profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] when the characteristic is empty.
    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.transport.address()))]
    pub async fn request_device_name(&mut self) -> Result<DeviceName> {
        let raw = self.transport.read_characteristic(uuids::DEVICE_NAME).await?;
        let text = codec::decode_ascii(&raw)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidData("device name is empty".to_string()))?;
        let name = DeviceName::parse(&text);
        self.profile = DeviceProfile::for_name(&text);
        debug!(name = %text, family = ?self.profile.family, "Device name");
        self.state.name = Some(name.clone());
        Ok(name)
    }

    /// Request the hardware revision.
    pub async fn request_hardware(&mut self) -> Result<Option<String>> {
        self.request_field(Command::Hardware, |s| s.hardware = None, |s| s.hardware.clone())
            .await
    }

    /// Request the firmware revision.
    pub async fn request_firmware(&mut self) -> Result<Option<String>> {
        self.request_field(Command::Firmware, |s| s.firmware = None, |s| s.firmware.clone())
            .await
    }

    /// Request the MAC address.
    pub async fn request_mac_address(&mut self) -> Result<Option<String>> {
        self.request_field(Command::MacAddress, |s| s.mac = None, |s| s.mac.clone())
            .await
    }

    /// Request the MAC address and serial number.
    pub async fn request_mac_and_serial(&mut self) -> Result<Option<MacAndSerial>> {
        self.request_field(
            Command::MacAndSerial,
            |s| s.mac_and_serial = None,
            |s| s.mac_and_serial.clone(),
        )
        .await
    }

    /// Request the battery level.
    pub async fn request_battery(&mut self) -> Result<Option<u8>> {
        self.request_field(Command::Battery, |s| s.battery = None, |s| s.battery)
            .await
    }

    // --- measurements ---

    /// Request the current measurement on its own (`AA 0A`).
    pub async fn request_measurement(&mut self) -> Result<Option<Measurement>> {
        self.request_field(
            Command::Measurement,
            |s| s.measurement = None,
            |s| s.measurement.clone(),
        )
        .await
    }

    /// Request the current measurement and battery in one go (`AA 01`).
    pub async fn request_measurement_and_battery(&mut self) -> Result<Option<CurrentReading>> {
        self.request_field(
            Command::MeasurementAndBattery,
            |s| {
                s.measurement = None;
                s.battery = None;
            },
            |s| {
                let measurement = s.measurement.clone()?;
                let battery = s.battery?;
                Some(CurrentReading {
                    measurement,
                    battery: Some(battery),
                })
            },
        )
        .await
    }

    /// Request the current reading the way the profile prescribes.
    ///
    /// Families without a combined request get the battery from a second
    /// request; a missing battery answer leaves `battery` as `None`.
    #[tracing::instrument(level = "debug", skip_all, fields(address = %self.transport.address()))]
    pub async fn request_current(&mut self) -> Result<Option<CurrentReading>> {
        match self.profile.current_reading {
            CurrentReadingVariant::WithBattery => self.request_measurement_and_battery().await,
            CurrentReadingVariant::MeasurementOnly => {
                let Some(measurement) = self.request_measurement().await? else {
                    return Ok(None);
                };
                let battery = self.request_battery().await?;
                Ok(Some(CurrentReading {
                    measurement,
                    battery,
                }))
            }
        }
    }

    // --- configuration ---

    /// Request the alarm configuration for `quantity`.
    pub async fn request_alarm(&mut self, quantity: Quantity) -> Result<Option<AlarmConfig>> {
        self.request_field(
            Command::Alarm(quantity),
            |s| *s.alarm_mut(quantity) = None,
            |s| s.alarm(quantity),
        )
        .await
    }

    /// Request the calibration offset for `quantity`.
    pub async fn request_offset(&mut self, quantity: Quantity) -> Result<Option<f64>> {
        self.request_field(
            Command::Offset(quantity),
            |s| *s.offset_mut(quantity) = None,
            |s| s.offset(quantity),
        )
        .await
    }

    /// Request both offsets. Unanswered offsets count as zero.
    pub async fn request_calibration(&mut self) -> Result<Calibration> {
        let humidity = self.request_offset(Quantity::Humidity).await?;
        let temperature = self.request_offset(Quantity::Temperature).await?;
        Ok(Calibration::new(
            humidity.unwrap_or(0.0),
            temperature.unwrap_or(0.0),
        ))
    }

    /// Write an alarm configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without writing anything when a
    /// threshold is outside what the device accepts.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.transport.address(), quantity = %alarm.quantity))]
    pub async fn set_alarm(&mut self, alarm: AlarmConfig) -> Result<Acknowledgement> {
        validate_alarm(&alarm)?;
        let ack = self.send_setting(Command::SetAlarm(alarm)).await?;
        if ack.is_confirmed() {
            *self.state.alarm_mut(alarm.quantity) = Some(alarm);
        }
        Ok(ack)
    }

    /// Write a calibration offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without writing anything when the
    /// offset is outside what the device accepts.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.transport.address(), quantity = %quantity))]
    pub async fn set_offset(&mut self, quantity: Quantity, offset: f64) -> Result<Acknowledgement> {
        validate_offset(quantity, offset)?;
        let ack = self.send_setting(Command::SetOffset(quantity, offset)).await?;
        if ack.is_confirmed() {
            *self.state.offset_mut(quantity) = Some(offset);
        }
        Ok(ack)
    }

    // --- aggregate ---

    /// Interrogate every identity, configuration and measurement field.
    ///
    /// Fields the device did not answer are left `None`.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.transport.address()))]
    pub async fn request_device_info(&mut self) -> Result<DeviceInfo> {
        let name = self.request_device_name().await?;
        let hardware = self.request_hardware().await?;
        let firmware = self.request_firmware().await?;
        let mac_and_serial = self.request_mac_and_serial().await?;
        let mac = self.request_mac_address().await?;
        let battery = self.request_battery().await?;
        let humidity_alarm = self.request_alarm(Quantity::Humidity).await?;
        let temperature_alarm = self.request_alarm(Quantity::Temperature).await?;
        let humidity_offset = self.request_offset(Quantity::Humidity).await?;
        let temperature_offset = self.request_offset(Quantity::Temperature).await?;
        let current = self.request_current().await?;

        let battery = current.as_ref().and_then(|c| c.battery).or(battery);
        Ok(DeviceInfo {
            name: Some(name.name),
            address: self.transport.address().to_string(),
            manufacturer: Some(name.manufacturer),
            model: Some(name.model),
            hardware,
            firmware,
            battery,
            humidity_alarm,
            temperature_alarm,
            humidity_offset,
            temperature_offset,
            mac,
            mac_and_serial,
            current_measurement: current.map(|c| c.measurement),
        })
    }

    // --- history ---

    /// Download history for `range`.
    ///
    /// Samples are returned whatever the outcome; check
    /// [`HistoryDownload::outcome`] to see whether the transfer finished and
    /// whether the device's count matched. Incomplete transfers are not
    /// retried.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.transport.address(), ?range))]
    pub async fn request_history(&mut self, range: HistoryRange) -> Result<HistoryDownload> {
        let requested_at = OffsetDateTime::now_utc();
        let command = history_command(
            range,
            self.profile.history_framing,
            codec::epoch_minutes(requested_at),
        );
        let expected = self.profile.expected_messages(history_span(&command));
        let calibration = self.state.calibration();

        self.drain();
        self.state.transfer = Some(TransferSession::new(requested_at, expected, calibration));
        self.send(&command).await?;

        let cap = self.config.history_wait;
        let finished = self
            .wait_until(cap, |s| {
                s.transfer
                    .as_ref()
                    .is_some_and(|t| t.status().is_terminal())
            })
            .await;

        let download = self
            .state
            .transfer
            .take()
            .unwrap_or_else(|| TransferSession::new(requested_at, expected, calibration))
            .into_download();

        if download.outcome.is_complete() {
            info!(
                samples = download.samples.len(),
                messages = download.counted_messages,
                "History downloaded"
            );
        } else {
            warn!(
                finished,
                outcome = ?download.outcome,
                expected = download.expected_messages,
                counted = download.counted_messages,
                samples = download.samples.len(),
                "History transfer incomplete"
            );
        }
        Ok(download)
    }

    // --- plumbing ---

    /// Apply every notification received so far.
    fn drain(&mut self) {
        while let Ok((channel, bytes)) = self.inbox.try_recv() {
            debug!(?channel, payload = %to_hex(&bytes), "Notification");
            let notification = Notification::decode(channel, &bytes, &self.profile);
            self.state.apply(notification, OffsetDateTime::now_utc());
        }
    }

    /// Poll until `done` holds or `cap` elapses. Returns whether it held.
    async fn wait_until<F>(&mut self, cap: Duration, mut done: F) -> bool
    where
        F: FnMut(&DeviceState) -> bool,
    {
        let deadline = Instant::now() + cap;
        loop {
            self.drain();
            if done(&self.state) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn send(&self, command: &Command) -> Result<()> {
        let frame = command.encode();
        let channel = command.channel();
        debug!(?command, ?channel, payload = %to_hex(&frame), "Writing command");
        self.transport
            .write_characteristic(channel.characteristic(), &frame)
            .await
    }

    async fn request_field<V, C, R>(&mut self, command: Command, clear: C, read: R) -> Result<Option<V>>
    where
        C: FnOnce(&mut DeviceState),
        R: Fn(&DeviceState) -> Option<V>,
    {
        self.drain();
        clear(&mut self.state);
        self.send(&command).await?;

        let cap = self.config.field_wait;
        if self.wait_until(cap, |s| read(s).is_some()).await {
            Ok(read(&self.state))
        } else {
            warn!(?command, ?cap, "No answer before timeout");
            Ok(None)
        }
    }

    async fn send_setting(&mut self, command: Command) -> Result<Acknowledgement> {
        let opcode: Opcode = command.opcode();
        self.drain();
        self.state.acknowledged.remove(&opcode);
        self.send(&command).await?;

        let cap = self.config.ack_wait;
        if self.wait_until(cap, |s| s.acknowledged.contains(&opcode)).await {
            info!(opcode = ?opcode, "Setting acknowledged");
            Ok(Acknowledgement::Confirmed)
        } else {
            warn!(opcode = ?opcode, ?cap, "Setting not acknowledged before timeout");
            Ok(Acknowledgement::TimedOut)
        }
    }
}

async fn subscribe_all<T: GattTransport>(transport: &T) -> Result<Inbox> {
    let (tx, inbox) = mpsc::unbounded_channel();
    for channel in Channel::ALL {
        let tx = tx.clone();
        transport
            .subscribe(
                channel.characteristic(),
                Box::new(move |bytes: &[u8]| {
                    // The engine is gone once the receiver is dropped.
                    let _ = tx.send((channel, bytes.to_vec()));
                }),
            )
            .await?;
    }
    Ok(inbox)
}
