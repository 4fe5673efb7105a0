//! Connection guard for automatic disconnect on drop.
//!
//! This module provides RAII-style connection management for an engine,
//! ensuring that the connection is closed when the guard goes out of scope.

use std::ops::{Deref, DerefMut};

use tokio::runtime::Handle;
use tracing::warn;

use crate::engine::Hygrometer;
use crate::traits::GattTransport;

/// A guard that disconnects the engine's transport when dropped.
///
/// Dropping cannot await, so the disconnect is spawned on the current
/// tokio runtime. Prefer an explicit [`Hygrometer::disconnect`] where the
/// result matters.
///
/// # Example
///
/// ```ignore
/// use govee_core::{ConnectionConfig, ConnectionGuard, EngineConfig, Hygrometer};
///
/// async fn battery() -> govee_core::Result<Option<u8>> {
///     let sensor = Hygrometer::connect(
///         "A4:C1:38:12:34:56",
///         ConnectionConfig::default(),
///         EngineConfig::default(),
///     )
///     .await?;
///     let mut guard = ConnectionGuard::new(sensor);
///
///     // Disconnects when `guard` goes out of scope, even on early return.
///     guard.request_battery().await
/// }
/// ```
pub struct ConnectionGuard<T: GattTransport + 'static> {
    engine: Option<Hygrometer<T>>,
}

impl<T: GattTransport + 'static> ConnectionGuard<T> {
    /// Create a new connection guard.
    pub fn new(engine: Hygrometer<T>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    /// Take ownership of the engine, preventing automatic disconnect.
    ///
    /// After calling this, you are responsible for disconnecting.
    pub fn into_inner(mut self) -> Hygrometer<T> {
        match self.engine.take() {
            Some(engine) => engine,
            None => unreachable!("connection guard emptied before use"),
        }
    }
}

impl<T: GattTransport + 'static> Deref for ConnectionGuard<T> {
    type Target = Hygrometer<T>;

    fn deref(&self) -> &Self::Target {
        match &self.engine {
            Some(engine) => engine,
            None => unreachable!("connection guard emptied before use"),
        }
    }
}

impl<T: GattTransport + 'static> DerefMut for ConnectionGuard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.engine {
            Some(engine) => engine,
            None => unreachable!("connection guard emptied before use"),
        }
    }
}

impl<T: GattTransport + 'static> Drop for ConnectionGuard<T> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = engine.disconnect().await {
                        warn!("Failed to disconnect in guard drop: {}", e);
                    }
                });
            } else {
                warn!("No tokio runtime available for disconnect in guard drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::mock::MockTransport;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig::default().settle_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_guard_disconnects_on_drop() {
        let transport = MockTransport::builder().build();
        let engine = Hygrometer::attach(transport.clone(), config()).await.unwrap();
        {
            let guard = ConnectionGuard::new(engine);
            assert_eq!(guard.address(), "A4:C1:38:00:1A:2B");
        }
        // let the spawned disconnect run
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_into_inner_keeps_connection() {
        let transport = MockTransport::builder().build();
        let engine = Hygrometer::attach(transport.clone(), config()).await.unwrap();
        let engine = ConnectionGuard::new(engine).into_inner();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(transport.is_connected().await);
        engine.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_guard_derefs_to_engine() {
        let transport = MockTransport::builder().battery(55).build();
        let engine = Hygrometer::attach(transport, config()).await.unwrap();
        let mut guard = ConnectionGuard::new(engine);
        assert_eq!(guard.request_battery().await.unwrap(), Some(55));
    }
}
