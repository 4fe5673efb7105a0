//! Scan and measure command implementations.
//!
//! Both listen to advertisements without connecting. `scan` reports each
//! sensor once and stops after a timeout; `measure` prints every
//! advertisement until interrupted.

use std::future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use govee_core::{PassiveMonitor, PassiveMonitorOptions, PassiveReading};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::format::{as_json_line, format_passive_header, format_passive_line};
use crate::util::Output;

/// Longest single scan cycle during `scan`, so sensors show up as they are found.
const SCAN_CYCLE: Duration = Duration::from_secs(5);

pub async fn cmd_scan(
    timeout: u64,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let timeout = Duration::from_secs(timeout);
    let options = monitor_options(config)
        .unique(true)
        .scan_duration(timeout.min(SCAN_CYCLE))
        .scan_interval(Duration::ZERO);

    if !quiet {
        eprintln!("Scanning for {}s...", timeout.as_secs());
    }
    let found = run_monitor(options, Some(timeout), format, output, config, false).await?;
    if !quiet {
        eprintln!("{} device(s) found", found);
    }
    Ok(())
}

pub async fn cmd_measure(
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    if !quiet {
        eprintln!("Listening for advertisements, press Ctrl-C to stop");
    }
    run_monitor(monitor_options(config), None, format, output, config, true).await?;
    Ok(())
}

/// Monitor options with the configured calibration for each known device.
fn monitor_options(config: &Config) -> PassiveMonitorOptions {
    config
        .calibrations()
        .fold(PassiveMonitorOptions::default(), |options, (address, calibration)| {
            options.calibration(address.to_ascii_uppercase(), calibration)
        })
}

/// Print readings until `limit` elapses, Ctrl-C, or the monitor stops.
/// Returns the number of readings printed.
async fn run_monitor(
    options: PassiveMonitorOptions,
    limit: Option<Duration>,
    format: OutputFormat,
    output: Option<&PathBuf>,
    config: &Config,
    timestamped: bool,
) -> Result<usize> {
    let mut out = Output::open(output)?;
    if format == OutputFormat::Text {
        out.write_str(&format_passive_header(timestamped))?;
    }

    let monitor = Arc::new(PassiveMonitor::new(options));
    let mut rx = monitor.subscribe();
    let cancel = CancellationToken::new();
    let handle = monitor.start(cancel.clone());

    let deadline = async {
        match limit {
            Some(limit) => sleep(limit).await,
            None => future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut printed = 0;
    let result = loop {
        tokio::select! {
            _ = &mut deadline => break Ok(()),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break Ok(());
            }
            received = rx.recv() => match received {
                Ok(reading) => {
                    let line = match render(&reading, format, config, timestamped) {
                        Ok(line) => line,
                        Err(e) => break Err(e),
                    };
                    if let Err(e) = out.write_str(&line) {
                        break Err(e);
                    }
                    printed += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Output fell behind, readings dropped");
                }
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    cancel.cancel();
    if let Err(e) = handle.await {
        warn!("Passive monitor task failed: {}", e);
    }
    result.map(|()| printed)
}

fn render(
    reading: &PassiveReading,
    format: OutputFormat,
    config: &Config,
    timestamped: bool,
) -> Result<String> {
    match format {
        OutputFormat::Json => as_json_line(reading),
        OutputFormat::Text => Ok(format_passive_line(
            reading,
            config.label(&reading.device_id),
            timestamped,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use govee_core::{Calibration, uuids};

    const CONFIG: &str = r#"
[devices."a4:c1:38:00:1a:2b"]
alias = "kitchen"
temperature = -1.0
"#;

    fn h5075_advertisement() -> HashMap<u16, Vec<u8>> {
        // 21.5 °C / 45.6 %: 215456 = 0x0349A0, battery 87
        HashMap::from([(
            uuids::MANUFACTURER_ID_H507X,
            vec![0x00, 0x03, 0x49, 0xA0, 87, 0x00],
        )])
    }

    #[test]
    fn test_monitor_options_use_uppercase_addresses() {
        let config = Config::parse(CONFIG).unwrap();
        let options = monitor_options(&config);
        assert_eq!(
            options.calibrations.get("A4:C1:38:00:1A:2B"),
            Some(&Calibration::new(0.0, -1.0))
        );
    }

    #[tokio::test]
    async fn test_render_applies_alias_and_calibration() {
        let config = Config::parse(CONFIG).unwrap();
        let monitor = PassiveMonitor::new(monitor_options(&config));

        let reading = monitor
            .handle_advertisement(
                "A4:C1:38:00:1A:2B",
                Some("GVH5075_1A2B"),
                Some(-70),
                &h5075_advertisement(),
            )
            .await
            .expect("decodable advertisement");
        assert!((reading.data.measurement.temperature() - 20.5).abs() < 0.05);

        let text = render(&reading, OutputFormat::Text, &config, false).unwrap();
        assert!(text.starts_with("kitchen"));
        assert!(text.contains("20.5°C"));

        let json = render(&reading, OutputFormat::Json, &config, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["deviceId"], "A4:C1:38:00:1A:2B");
        assert_eq!(value["data"]["battery"], 87);
    }
}
