//! One-shot discovery of Govee sensors and lookup of a single sensor by
//! address or name before connecting.

use std::collections::HashMap;
use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use govee_types::{DeviceModel, uuids};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::util::{create_identifier, format_peripheral_id};

/// An advertiser seen during a scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Local name, e.g. `GVH5075_1A2B`.
    pub name: Option<String>,
    pub id: PeripheralId,
    /// All zeros on macOS.
    pub address: String,
    /// What to pass to [`crate::Device::connect`].
    pub identifier: String,
    pub rssi: Option<i16>,
    pub model: Option<DeviceModel>,
    pub is_govee: bool,
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub duration: Duration,
    /// Drop advertisers that fail [`is_govee_device`].
    pub filter_govee_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            filter_govee_only: true,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    #[must_use]
    pub fn filter_govee_only(mut self, filter: bool) -> Self {
        self.filter_govee_only = filter;
        self
    }

    /// Keep every advertiser, Govee or not.
    #[must_use]
    pub fn all_devices(self) -> Self {
        self.filter_govee_only(false)
    }
}

/// The host's first Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    Manager::new()
        .await?
        .adapters()
        .await?
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Scan for five seconds and list the Govee sensors heard.
///
/// An empty list is not an error.
pub async fn scan_for_devices() -> Result<Vec<DiscoveredDevice>> {
    scan_with_options(ScanOptions::default()).await
}

pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, options).await
}

/// Scan on `adapter` for `options.duration`, then collect what the adapter saw.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!(duration = ?options.duration, "Scanning");

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match describe_peripheral(&peripheral, options.filter_govee_only).await {
            Ok(Some(device)) => {
                debug!(identifier = %device.identifier, name = ?device.name, "Discovered");
                discovered.push(device);
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping peripheral"),
        }
    }

    info!(count = discovered.len(), "Scan finished");
    Ok(discovered)
}

async fn describe_peripheral(
    peripheral: &Peripheral,
    filter_govee_only: bool,
) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let id = peripheral.id();
    let address = properties.address.to_string();
    let identifier = create_identifier(&address, &id);
    let name = properties.local_name.clone();

    let is_govee = is_govee_device(&identifier, name.as_deref(), &properties.manufacturer_data);
    if filter_govee_only && !is_govee {
        return Ok(None);
    }

    Ok(Some(DiscoveredDevice {
        model: name.as_deref().and_then(DeviceModel::from_name),
        name,
        id,
        address,
        identifier,
        rssi: properties.rssi,
        is_govee,
        manufacturer_data: properties.manufacturer_data,
    }))
}

/// Whether an advertiser looks like a Govee thermometer/hygrometer.
///
/// The device must advertise a name, carry Govee manufacturer data, and
/// either use a Govee MAC prefix or have a known model in its name. The
/// name check covers macOS, where addresses are hidden.
pub fn is_govee_device(
    address: &str,
    name: Option<&str>,
    manufacturer_data: &HashMap<u16, Vec<u8>>,
) -> bool {
    let Some(name) = name else {
        return false;
    };
    let has_sensor_data = manufacturer_data.contains_key(&uuids::MANUFACTURER_ID_H507X)
        || manufacturer_data.contains_key(&uuids::MANUFACTURER_ID_H5179);
    let address = address.to_uppercase();
    let known_prefix = uuids::MAC_PREFIXES
        .iter()
        .any(|prefix| address.starts_with(prefix));

    has_sensor_data && (known_prefix || DeviceModel::from_name(name).is_some())
}

/// Locate one sensor by address, peripheral ID or name.
///
/// Peripherals the adapter already knows are checked first. Otherwise up to
/// three scans run, each longer than the last.
pub async fn find_device_with_options(
    identifier: &str,
    options: ScanOptions,
) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;
    let identifier_lower = identifier.to_lowercase();

    if let Some(peripheral) = find_peripheral_by_identifier(&adapter, &identifier_lower).await? {
        debug!(%identifier, "Already known to the adapter");
        return Ok((adapter, peripheral));
    }

    const ATTEMPTS: u32 = 3;
    let step = (options.duration / 2).max(Duration::from_secs(2));

    for attempt in 1..=ATTEMPTS {
        let scan_duration = step * attempt;
        info!(%identifier, attempt, duration = ?scan_duration, "Searching");

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(scan_duration).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) =
            find_peripheral_by_identifier(&adapter, &identifier_lower).await?
        {
            return Ok((adapter, peripheral));
        }
    }

    warn!(%identifier, attempts = ATTEMPTS, "Sensor not found");
    Err(Error::device_not_found(identifier))
}

async fn find_peripheral_by_identifier(
    adapter: &Adapter,
    identifier_lower: &str,
) -> Result<Option<Peripheral>> {
    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Ok(Some(props)) = peripheral.properties().await {
            let address = props.address.to_string().to_lowercase();
            let peripheral_id = format_peripheral_id(&peripheral.id()).to_lowercase();

            if matches_identifier(&address, &peripheral_id, props.local_name.as_deref(), identifier_lower) {
                return Ok(Some(peripheral));
            }
        }
    }

    Ok(None)
}

/// Address match ignores colons; names match on a substring.
fn matches_identifier(
    address: &str,
    peripheral_id: &str,
    name: Option<&str>,
    identifier_lower: &str,
) -> bool {
    if peripheral_id.contains(identifier_lower) {
        return true;
    }
    if address != "00:00:00:00:00:00"
        && (address == identifier_lower
            || address.replace(':', "") == identifier_lower.replace(':', ""))
    {
        return true;
    }
    name.is_some_and(|n| n.to_lowercase().contains(identifier_lower))
}
