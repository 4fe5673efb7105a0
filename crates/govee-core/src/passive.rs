//! Listening to sensor advertisements without connecting.
//!
//! Every Govee hygrometer broadcasts its latest reading a few times a
//! minute. [`PassiveMonitor`] scans in cycles, decodes those broadcasts and
//! publishes them on a broadcast channel.
//!
//!
//! ```ignore
//! use std::sync::Arc;
//! use govee_core::passive::{PassiveMonitor, PassiveMonitorOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let monitor = Arc::new(PassiveMonitor::new(PassiveMonitorOptions::default().unique(true)));
//! let cancel = CancellationToken::new();
//!
//! let mut rx = monitor.subscribe();
//! let handle = monitor.start(cancel.clone());
//!
//! while let Ok(reading) = rx.recv().await {
//!     println!("{} {}", reading.device_id, reading.data.measurement);
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::PeripheralId;
use futures::{Stream, StreamExt};
use govee_types::Calibration;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{RwLock, broadcast};
use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::advertisement::{AdvertisementData, parse_manufacturer_data};
use crate::error::Result;
use crate::scan::{get_adapter, is_govee_device};

/// One decoded advertisement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassiveReading {
    /// MAC address, or the CoreBluetooth UUID on macOS.
    pub device_id: String,
    pub device_name: Option<String>,
    pub rssi: Option<i16>,
    pub data: AdvertisementData,
}

#[derive(Debug, Clone)]
pub struct PassiveMonitorOptions {
    /// Listening time per cycle.
    pub scan_duration: Duration,
    /// Pause after each cycle.
    pub scan_interval: Duration,
    pub channel_capacity: usize,
    /// Publish each sensor at most once.
    pub unique: bool,
    /// Accepted device IDs; empty accepts every Govee sensor.
    pub device_filter: Vec<String>,
    /// Offsets applied to H5075 advertisements, keyed by device ID.
    pub calibrations: HashMap<String, Calibration>,
}

impl Default for PassiveMonitorOptions {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(5),
            scan_interval: Duration::from_secs(1),
            channel_capacity: 100,
            unique: false,
            device_filter: Vec::new(),
            calibrations: HashMap::new(),
        }
    }
}

impl PassiveMonitorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    #[must_use]
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    #[must_use]
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Only publish these device IDs, compared case-insensitively.
    #[must_use]
    pub fn filter_devices(mut self, device_ids: Vec<String>) -> Self {
        self.device_filter = device_ids;
        self
    }

    /// Apply `calibration` to readings from `device_id`.
    #[must_use]
    pub fn calibration(mut self, device_id: impl Into<String>, calibration: Calibration) -> Self {
        self.calibrations.insert(device_id.into(), calibration);
        self
    }
}

/// Advertisement listener publishing [`PassiveReading`]s.
pub struct PassiveMonitor {
    options: PassiveMonitorOptions,
    sender: broadcast::Sender<PassiveReading>,
    reported: Arc<RwLock<HashSet<String>>>,
}

impl PassiveMonitor {
    pub fn new(options: PassiveMonitorOptions) -> Self {
        let (sender, _) = broadcast::channel(options.channel_capacity);
        Self {
            options,
            sender,
            reported: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PassiveReading> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Spawn the scan loop; it runs until `cancel_token` fires.
    pub fn start(self: &Arc<Self>, cancel_token: CancellationToken) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);

        tokio::spawn(async move {
            info!(unique = monitor.options.unique, "Listening for advertisements");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Advertisement listener stopped");
                        break;
                    }
                    result = monitor.scan_cycle() => {
                        if let Err(e) = result {
                            warn!(error = %e, "Scan cycle failed");
                        }
                        sleep(monitor.options.scan_interval).await;
                    }
                }
            }
        })
    }

    async fn scan_cycle(&self) -> Result<()> {
        let adapter = get_adapter().await?;

        let events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;
        let deadline = Instant::now() + self.options.scan_duration;
        let heard = collect_until(events, deadline, advertised_peripheral).await;
        adapter.stop_scan().await?;

        // The adapter keeps properties from earlier cycles; only peripherals
        // that advertised during this window carry a current reading.
        for peripheral in adapter.peripherals().await? {
            if !heard.contains(&peripheral.id()) {
                continue;
            }
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let device_id =
                crate::util::create_identifier(&props.address.to_string(), &peripheral.id());
            if !is_govee_device(&device_id, props.local_name.as_deref(), &props.manufacturer_data)
            {
                continue;
            }
            self.handle_advertisement(
                &device_id,
                props.local_name.as_deref(),
                props.rssi,
                &props.manufacturer_data,
            )
            .await;
        }

        Ok(())
    }

    /// Decode one advertisement and publish it.
    ///
    /// `None` when the device is filtered out, was already reported in
    /// unique mode, or sent nothing decodable.
    pub async fn handle_advertisement(
        &self,
        device_id: &str,
        device_name: Option<&str>,
        rssi: Option<i16>,
        manufacturer_data: &HashMap<u16, Vec<u8>>,
    ) -> Option<PassiveReading> {
        if !self.options.device_filter.is_empty()
            && !self
                .options
                .device_filter
                .iter()
                .any(|id| id.eq_ignore_ascii_case(device_id))
        {
            return None;
        }

        if self.options.unique && self.reported.read().await.contains(device_id) {
            return None;
        }

        let calibration = self
            .options
            .calibrations
            .get(device_id)
            .copied()
            .unwrap_or_default();
        let Some(data) = parse_manufacturer_data(
            manufacturer_data,
            device_name,
            calibration,
            OffsetDateTime::now_utc(),
        ) else {
            debug!(device_id, "Advertisement without decodable sensor data");
            return None;
        };

        debug!(
            device_id,
            temperature = data.measurement.temperature(),
            humidity = data.measurement.humidity(),
            battery = data.battery,
            "Advertisement"
        );

        if self.options.unique && !self.reported.write().await.insert(device_id.to_string()) {
            return None;
        }

        let reading = PassiveReading {
            device_id: device_id.to_string(),
            device_name: device_name.map(str::to_string),
            rssi,
            data,
        };
        let _ = self.sender.send(reading.clone());
        Some(reading)
    }

    /// Device IDs published so far in unique mode.
    pub async fn reported_devices(&self) -> Vec<String> {
        self.reported.read().await.iter().cloned().collect()
    }
}

fn advertised_peripheral(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::ManufacturerDataAdvertisement { id, .. }
        | CentralEvent::DeviceDiscovered(id)
        | CentralEvent::DeviceUpdated(id) => Some(id),
        _ => None,
    }
}

/// Keys produced by `events` until `deadline` or the end of the stream.
async fn collect_until<S, K>(
    mut events: S,
    deadline: Instant,
    key: impl Fn(S::Item) -> Option<K>,
) -> HashSet<K>
where
    S: Stream + Unpin,
    K: Eq + Hash,
{
    let mut keys = HashSet::new();
    while let Ok(Some(event)) = timeout_at(deadline, events.next()).await {
        keys.extend(key(event));
    }
    keys
}

impl Default for PassiveMonitor {
    fn default() -> Self {
        Self::new(PassiveMonitorOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govee_types::uuids;

    fn h5075_data(raw: u32, battery: u8) -> HashMap<u16, Vec<u8>> {
        let [_, a, b, c] = raw.to_be_bytes();
        HashMap::from([(uuids::MANUFACTURER_ID_H507X, vec![0x00, a, b, c, battery, 0x00])])
    }

    #[test]
    fn test_passive_monitor_options_default() {
        let opts = PassiveMonitorOptions::default();
        assert_eq!(opts.scan_duration, Duration::from_secs(5));
        assert!(!opts.unique);
        assert!(opts.device_filter.is_empty());
    }

    #[test]
    fn test_passive_monitor_options_builder() {
        let opts = PassiveMonitorOptions::new()
            .scan_duration(Duration::from_secs(10))
            .unique(true)
            .filter_devices(vec!["A4:C1:38:00:00:01".to_string()])
            .calibration("A4:C1:38:00:00:01", Calibration::new(1.0, -0.5));

        assert_eq!(opts.scan_duration, Duration::from_secs(10));
        assert!(opts.unique);
        assert_eq!(opts.device_filter, vec!["A4:C1:38:00:00:01"]);
        assert_eq!(
            opts.calibrations.get("A4:C1:38:00:00:01"),
            Some(&Calibration::new(1.0, -0.5))
        );
    }

    #[test]
    fn test_passive_monitor_subscribe() {
        let monitor = Arc::new(PassiveMonitor::default());
        let _rx1 = monitor.subscribe();
        let _rx2 = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 2);
    }

    // --- scan window ---

    #[tokio::test(start_paused = true)]
    async fn test_only_events_inside_window_are_collected() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<u32>();
        let events = tokio_stream_from(rx);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        tx.send(1).unwrap();
        tx.send(99).unwrap();

        let late = tx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            let _ = late.send(3);
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let keys = collect_until(events, deadline, |n| (n < 50).then_some(n)).await;
        assert_eq!(keys, HashSet::from([1, 2]));
        drop(tx);
    }

    #[tokio::test]
    async fn test_collection_stops_when_stream_ends() {
        let events = futures::stream::iter([4u32, 5]);
        let deadline = Instant::now() + Duration::from_secs(3600);
        let keys = collect_until(events, deadline, Some).await;
        assert_eq!(keys, HashSet::from([4, 5]));
    }

    fn tokio_stream_from(
        mut rx: tokio::sync::mpsc::UnboundedReceiver<u32>,
    ) -> impl Stream<Item = u32> + Unpin {
        Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }

    #[tokio::test]
    async fn test_readings_are_broadcast() {
        let monitor = PassiveMonitor::default();
        let mut rx = monitor.subscribe();

        let reading = monitor
            .handle_advertisement(
                "A4:C1:38:00:00:01",
                Some("GVH5075_0001"),
                Some(-60),
                &h5075_data(215_456, 80),
            )
            .await
            .expect("reading");
        assert_eq!(reading.data.battery, 80);

        let received = rx.recv().await.expect("broadcast");
        assert_eq!(received.device_id, "A4:C1:38:00:00:01");
        assert_eq!(received.data.measurement.temperature(), 21.5);
    }

    #[tokio::test]
    async fn test_unique_mode_reports_once() {
        let monitor = PassiveMonitor::new(PassiveMonitorOptions::new().unique(true));
        let data = h5075_data(215_456, 80);

        assert!(monitor
            .handle_advertisement("A4:C1:38:00:00:01", Some("GVH5075_0001"), None, &data)
            .await
            .is_some());
        assert!(monitor
            .handle_advertisement("A4:C1:38:00:00:01", Some("GVH5075_0001"), None, &data)
            .await
            .is_none());
        assert!(monitor
            .handle_advertisement("A4:C1:38:00:00:02", Some("GVH5075_0002"), None, &data)
            .await
            .is_some());
        assert_eq!(monitor.reported_devices().await.len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_mode_reports_every_time() {
        let monitor = PassiveMonitor::default();
        let data = h5075_data(215_456, 80);
        for _ in 0..3 {
            assert!(monitor
                .handle_advertisement("A4:C1:38:00:00:01", Some("GVH5075_0001"), None, &data)
                .await
                .is_some());
        }
    }

    #[tokio::test]
    async fn test_device_filter_and_calibration() {
        let monitor = PassiveMonitor::new(
            PassiveMonitorOptions::new()
                .filter_devices(vec!["a4:c1:38:00:00:01".to_string()])
                .calibration("A4:C1:38:00:00:01", Calibration::new(0.0, -1.5)),
        );
        let data = h5075_data(215_456, 80);

        assert!(monitor
            .handle_advertisement("A4:C1:38:00:00:02", Some("GVH5075_0002"), None, &data)
            .await
            .is_none());

        let reading = monitor
            .handle_advertisement("A4:C1:38:00:00:01", Some("GVH5075_0001"), None, &data)
            .await
            .expect("reading");
        assert_eq!(reading.data.measurement.temperature(), 20.0);
    }

    #[tokio::test]
    async fn test_undecodable_advertisement_is_skipped() {
        let monitor = PassiveMonitor::new(PassiveMonitorOptions::new().unique(true));
        let data = HashMap::from([(uuids::MANUFACTURER_ID_H507X, vec![0x00, 0x01])]);
        assert!(monitor
            .handle_advertisement("A4:C1:38:00:00:01", Some("GVH5075_0001"), None, &data)
            .await
            .is_none());
        assert!(monitor.reported_devices().await.is_empty());
    }
}
