//! Status command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use govee_core::{CurrentReading, GattTransport, Hygrometer};

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::format::{as_json, format_current_text};
use crate::util::{connect, disconnect, require_device, write_output};

pub async fn cmd_status(
    device: DeviceArgs,
    format: OutputFormat,
    output: Option<&PathBuf>,
    config: &Config,
) -> Result<()> {
    let identifier = require_device(device.device, config)?;
    let mut sensor = connect(&identifier, config, device.timeout).await?;
    let result = read_status(&mut sensor).await;
    disconnect(&sensor).await;
    let reading = result?;

    let content = match format {
        OutputFormat::Json => as_json(&reading)?,
        OutputFormat::Text => format_current_text(&reading),
    };
    write_output(output, &content)
}

/// Offsets first, so the measurement comes back calibrated.
pub(crate) async fn read_status<T: GattTransport>(
    sensor: &mut Hygrometer<T>,
) -> Result<CurrentReading> {
    sensor
        .request_calibration()
        .await
        .context("Failed to read calibration offsets")?;
    sensor
        .request_current()
        .await
        .context("Failed to request measurement")?
        .ok_or_else(|| {
            anyhow!(
                "{} did not report a measurement within {:?}",
                sensor.address(),
                sensor.config().field_wait
            )
        })
}
