//! Info command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::format::as_json;
use crate::util::{connect, disconnect, require_device, write_output};

pub async fn cmd_info(
    device: DeviceArgs,
    format: OutputFormat,
    output: Option<&PathBuf>,
    config: &Config,
) -> Result<()> {
    let identifier = require_device(device.device, config)?;
    let mut sensor = connect(&identifier, config, device.timeout).await?;
    let result = sensor
        .request_device_info()
        .await
        .context("Failed to read device info");
    disconnect(&sensor).await;
    let info = result?;

    let content = match format {
        OutputFormat::Json => as_json(&info)?,
        OutputFormat::Text => info.to_string(),
    };
    write_output(output, &content)
}
