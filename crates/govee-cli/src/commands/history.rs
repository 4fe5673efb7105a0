//! History command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use govee_core::{GattTransport, HistoryDownload, HistoryRange, Hygrometer};

use crate::cli::{DeviceArgs, OutputFormat};
use crate::config::Config;
use crate::format::{as_json, describe_outcome, format_history_text};
use crate::util::{connect, disconnect, require_device, write_output};

/// Minutes before now used when `--start` is omitted.
pub const DEFAULT_START_MINUTES: u32 = 60;

/// Arguments for the history command.
pub struct HistoryArgs {
    pub device: DeviceArgs,
    pub format: OutputFormat,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

/// The requested window, clamped and ordered.
pub fn history_range(start: Option<u32>, end: Option<u32>) -> HistoryRange {
    HistoryRange::minutes_ago(start.unwrap_or(DEFAULT_START_MINUTES), end.unwrap_or(0))
}

pub async fn cmd_history(
    args: HistoryArgs,
    output: Option<&PathBuf>,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let range = history_range(args.start, args.end);
    let identifier = require_device(args.device.device, config)?;

    let mut sensor = connect(&identifier, config, args.device.timeout).await?;
    let result = download(&mut sensor, range).await;
    disconnect(&sensor).await;
    let download = result?;

    if !quiet {
        if let Some(note) = describe_outcome(&download) {
            eprintln!("Warning: {}", note);
        }
    }

    let content = match args.format {
        OutputFormat::Json => as_json(&download)?,
        OutputFormat::Text => format_history_text(&download),
    };
    write_output(output, &content)
}

/// Identify the model, read the offsets, then transfer.
pub(crate) async fn download<T: GattTransport>(
    sensor: &mut Hygrometer<T>,
    range: HistoryRange,
) -> Result<HistoryDownload> {
    sensor
        .request_device_name()
        .await
        .context("Failed to read device name")?;
    sensor
        .request_calibration()
        .await
        .context("Failed to read calibration offsets")?;
    sensor
        .request_history(range)
        .await
        .context("Failed to download history")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use govee_core::{EngineConfig, MAX_HISTORY_MINUTES, MockTransport, Quantity, TransferOutcome};

    async fn sensor(transport: MockTransport) -> Hygrometer<MockTransport> {
        let config = EngineConfig::default().settle_delay(Duration::ZERO);
        Hygrometer::attach(transport, config).await.unwrap()
    }

    // --- range ---

    #[test]
    fn test_default_range_is_last_hour() {
        assert_eq!(
            history_range(None, None),
            HistoryRange::MinutesAgo { start: 60, end: 0 }
        );
    }

    #[test]
    fn test_range_is_clamped_and_ordered() {
        assert_eq!(
            history_range(Some(30), Some(90)),
            HistoryRange::MinutesAgo { start: 90, end: 30 }
        );
        assert_eq!(
            history_range(Some(100_000), None),
            HistoryRange::MinutesAgo {
                start: MAX_HISTORY_MINUTES,
                end: 0
            }
        );
    }

    // --- transfer ---

    #[tokio::test(start_paused = true)]
    async fn test_download_applies_offsets() {
        let transport = MockTransport::builder()
            .temperature(20.0)
            .offset(Quantity::Temperature, 1.0)
            .build();
        let mut sensor = sensor(transport).await;

        let download = download(&mut sensor, history_range(Some(10), None))
            .await
            .unwrap();
        assert_eq!(download.outcome, TransferOutcome::Complete);
        assert_eq!(download.samples.len(), 11);
        assert!(download.samples.iter().all(|m| m.temperature() == 21.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_reports_mismatch() {
        let transport = MockTransport::builder().drop_history_batches(1).build();
        let mut sensor = sensor(transport).await;

        let download = download(&mut sensor, history_range(None, None))
            .await
            .unwrap();
        assert!(matches!(
            download.outcome,
            TransferOutcome::PartialMismatch { reported: 11, counted: 10 }
        ));
        assert!(describe_outcome(&download).is_some());
    }
}
