//! Utility functions for CLI operations.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use govee_core::{Device, GattTransport, Hygrometer};
use tracing::warn;

use crate::config::{Config, resolve_device};

/// Get device identifier from arg, env var or config, with helpful error message.
pub fn require_device(device: Option<String>, config: &Config) -> Result<String> {
    resolve_device(device, config).ok_or_else(|| {
        anyhow!(
            "No device specified. Use --device <ADDRESS> or set GOVEE_DEVICE environment variable.\n\
             Run 'govee scan' to find nearby devices."
        )
    })
}

/// Connect to a device using the configured timeouts.
pub async fn connect(
    identifier: &str,
    config: &Config,
    timeout: Option<u64>,
) -> Result<Hygrometer<Device>> {
    Hygrometer::connect(
        identifier,
        config.connection_config(timeout),
        config.engine_config(),
    )
    .await
    .with_context(|| format!("Failed to connect to {}", identifier))
}

/// Disconnect, logging rather than failing; the command's own result wins.
pub async fn disconnect<T: GattTransport>(sensor: &Hygrometer<T>) {
    if let Err(e) = sensor.disconnect().await {
        warn!("Failed to disconnect from {}: {}", sensor.address(), e);
    }
}

/// Destination for command output: a file given with `--output`, or stdout.
pub struct Output {
    writer: Box<dyn Write + Send>,
}

impl Output {
    pub fn open(path: Option<&PathBuf>) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match path {
            Some(path) => Box::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            ),
            None => Box::new(io::stdout()),
        };
        Ok(Self { writer })
    }

    /// Write and flush, so streamed lines appear immediately.
    pub fn write_str(&mut self, content: &str) -> Result<()> {
        self.writer
            .write_all(content.as_bytes())
            .and_then(|()| self.writer.flush())
            .context("Failed to write output")
    }
}

/// Write output to file or stdout.
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    Output::open(output)?.write_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_device_with_some() {
        let result = require_device(Some("A4:C1:38:00:1A:2B".to_string()), &Config::default());
        assert_eq!(result.unwrap(), "A4:C1:38:00:1A:2B");
    }

    #[test]
    fn test_require_device_with_none() {
        let err = require_device(None, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("GOVEE_DEVICE"));
    }

    #[test]
    fn test_write_output_to_file() {
        let path = std::env::temp_dir().join(format!("govee-cli-test-{}.txt", std::process::id()));
        write_output(Some(&path), "hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_ignores_second_call() {
        let transport = govee_core::MockTransport::builder().build();
        let config = govee_core::EngineConfig::default()
            .settle_delay(std::time::Duration::ZERO);
        let sensor = Hygrometer::attach(transport.clone(), config).await.unwrap();
        disconnect(&sensor).await;
        assert!(!transport.is_connected().await);
        // already disconnected: only logged
        disconnect(&sensor).await;
    }
}
