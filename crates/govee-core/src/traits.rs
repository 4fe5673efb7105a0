//! Transport abstraction for the protocol engine.
//!
//! This module provides the [`GattTransport`] trait that abstracts over
//! real Bluetooth devices and the mock transport used in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Callback invoked with the raw value of every notification on a
/// subscribed characteristic.
pub type NotificationCallback = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// The GATT operations the engine needs from a connected peripheral.
///
/// # Example
///
/// ```ignore
/// use govee_core::{GattTransport, Result};
/// use govee_core::uuids::DEVICE_NAME;
///
/// async fn print_name<T: GattTransport>(transport: &T) -> Result<()> {
///     let raw = transport.read_characteristic(DEVICE_NAME).await?;
///     println!("{}", String::from_utf8_lossy(&raw));
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait GattTransport: Send + Sync {
    // --- Identity ---

    /// Get the device address or identifier.
    ///
    /// On Linux/Windows this is typically the MAC address.
    /// On macOS this is a UUID since MAC addresses are not exposed.
    fn address(&self) -> &str;

    /// Get the advertised name, if available.
    fn name(&self) -> Option<&str>;

    // --- GATT ---

    /// Read a characteristic value.
    async fn read_characteristic(&self, uuid: Uuid) -> Result<Vec<u8>>;

    /// Write a value to a characteristic, with response.
    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<()>;

    /// Subscribe to notifications on a characteristic.
    async fn subscribe(&self, uuid: Uuid, callback: NotificationCallback) -> Result<()>;

    // --- Connection Management ---

    /// Check if the peripheral is connected.
    async fn is_connected(&self) -> bool;

    /// Disconnect from the peripheral.
    async fn disconnect(&self) -> Result<()>;
}
