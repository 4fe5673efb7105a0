//! Govee device connection over btleplug.
//!
//! [`Device`] is the production [`GattTransport`]: it finds the sensor,
//! connects, discovers its characteristics once and forwards notifications
//! from spawned tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scan::{ScanOptions, find_device_with_options};
use crate::traits::{GattTransport, NotificationCallback};
use crate::util::{create_identifier, format_peripheral_id, to_hex};

/// Default time allowed to find and connect to a sensor.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default time allowed for service discovery.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single characteristic read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single characteristic write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport timeouts.
///
/// These bound individual BLE operations. How long the engine waits for a
/// sensor to answer is configured separately in
/// [`EngineConfig`](crate::EngineConfig).
///
/// ```
/// use std::time::Duration;
/// use govee_core::ConnectionConfig;
///
/// let config = ConnectionConfig::default().connection_timeout(Duration::from_secs(30));
/// assert_eq!(config.connection_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Scan-and-connect bound.
    pub connection_timeout: Duration,
    /// Service discovery bound.
    pub discovery_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longer timeouts for sensors behind walls, outdoors or in a fridge.
    pub fn challenging_environment() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(20),
            read_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(15),
        }
    }

    /// Shorter timeouts for a sensor next to the adapter.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(8),
            discovery_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// A connected sensor.
///
/// Not `Clone`: it owns the connection and the notification tasks. Call
/// [`GattTransport::disconnect`] when done; a device dropped while still
/// connected disconnects in the background and logs a warning.
pub struct Device {
    /// Held so the platform adapter outlives the peripheral.
    _adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    /// MAC address on Linux/Windows, UUID on macOS.
    address: String,
    characteristics: HashMap<Uuid, Characteristic>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    disconnected: AtomicBool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Find a sensor by address or name and connect to it.
    #[tracing::instrument(level = "info", skip_all, fields(identifier = %identifier))]
    pub async fn connect(identifier: &str, config: ConnectionConfig) -> Result<Self> {
        let options = ScanOptions::default()
            .duration(config.connection_timeout)
            .all_devices();
        let (adapter, peripheral) = find_device_with_options(identifier, options).await?;
        Self::from_peripheral(adapter, peripheral, config).await
    }

    /// Connect to an already-discovered peripheral and discover its characteristics.
    #[tracing::instrument(level = "info", skip_all, fields(connect_timeout = ?config.connection_timeout))]
    pub async fn from_peripheral(
        adapter: Adapter,
        peripheral: Peripheral,
        config: ConnectionConfig,
    ) -> Result<Self> {
        timeout(config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", config.connection_timeout))??;

        let (characteristics, name, address) =
            release_on_error(inspect(&peripheral, &config), || peripheral.disconnect()).await?;

        info!(
            %address,
            name = ?name,
            characteristics = characteristics.len(),
            "Connected"
        );

        Ok(Self {
            _adapter: adapter,
            peripheral,
            name,
            address,
            characteristics,
            tasks: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
            config,
        })
    }

    /// Transport timeouts in effect.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .get(&uuid)
            .ok_or_else(|| {
                Error::characteristic_not_found(uuid.to_string(), self.peripheral.services().len())
            })
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(Error::NotConnected)
        } else {
            Ok(())
        }
    }
}

/// Discover the GATT table and identify a freshly connected peripheral.
async fn inspect(
    peripheral: &Peripheral,
    config: &ConnectionConfig,
) -> Result<(HashMap<Uuid, Characteristic>, Option<String>, String)> {
    timeout(config.discovery_timeout, peripheral.discover_services())
        .await
        .map_err(|_| Error::timeout("discover services", config.discovery_timeout))??;

    let characteristics = peripheral
        .services()
        .into_iter()
        .flat_map(|service| service.characteristics)
        .map(|c| (c.uuid, c))
        .collect();

    let properties = peripheral.properties().await?;
    let name = properties.as_ref().and_then(|p| p.local_name.clone());
    // macOS reports an all-zero address; the peripheral ID stands in.
    let address = properties
        .as_ref()
        .map(|p| create_identifier(&p.address.to_string(), &peripheral.id()))
        .unwrap_or_else(|| format_peripheral_id(&peripheral.id()));

    Ok((characteristics, name, address))
}

/// Await `setup`; when it fails, run `release` before handing back its error.
async fn release_on_error<T, R, F>(setup: impl Future<Output = Result<T>>, release: R) -> Result<T>
where
    R: FnOnce() -> F,
    F: Future<Output = std::result::Result<(), btleplug::Error>>,
{
    match setup.await {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Err(release_err) = release().await {
                debug!(error = %release_err, "Disconnect after failed setup failed");
            }
            Err(e)
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(
            address = %self.address,
            "Device dropped without disconnect, cleaning up in the background"
        );

        if let Ok(mut tasks) = self.tasks.try_lock() {
            tasks.drain(..).for_each(|task| task.abort());
        }

        let peripheral = self.peripheral.clone();
        let address = self.address.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = peripheral.disconnect().await {
                    debug!(%address, error = %e, "Background disconnect failed");
                }
            });
        }
    }
}

#[async_trait]
impl GattTransport for Device {
    fn address(&self) -> &str {
        &self.address
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let characteristic = self.characteristic(uuid)?;
        let read_timeout = self.config.read_timeout;
        let data = timeout(read_timeout, self.peripheral.read(characteristic))
            .await
            .map_err(|_| Error::timeout(format!("read {uuid}"), read_timeout))??;
        debug!(%uuid, payload = %to_hex(&data), "Read");
        Ok(data)
    }

    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        let characteristic = self.characteristic(uuid)?;
        let write_timeout = self.config.write_timeout;
        debug!(%uuid, payload = %to_hex(data), "Write");
        timeout(
            write_timeout,
            self.peripheral
                .write(characteristic, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| Error::timeout(format!("write {uuid}"), write_timeout))?
        .map_err(|e| Error::WriteFailed {
            uuid: uuid.to_string(),
            reason: e.to_string(),
        })
    }

    /// Each subscription gets its own task filtering the shared
    /// notification stream by characteristic.
    async fn subscribe(&self, uuid: Uuid, callback: NotificationCallback) -> Result<()> {
        self.ensure_connected()?;
        let characteristic = self.characteristic(uuid)?.clone();
        self.peripheral.subscribe(&characteristic).await?;

        let mut stream = self.peripheral.notifications().await?;
        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == uuid {
                    callback(&notification.value);
                }
            }
        });
        self.tasks.lock().await.push(task);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
            && self.peripheral.is_connected().await.unwrap_or(false)
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    async fn disconnect(&self) -> Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.tasks.lock().await.drain(..).for_each(|task| task.abort());
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
