//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device address (MAC address or UUID) or alias, or use GOVEE_DEVICE env var
    #[arg(short, long, env = "GOVEE_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format (defaults to the configured format, then text)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

impl OutputArgs {
    /// Resolve the format: explicit flag overrides config
    pub fn resolve(&self, config_format: Option<OutputFormat>) -> OutputFormat {
        self.format.or(config_format).unwrap_or_default()
    }
}

#[derive(Parser)]
#[command(name = "govee")]
#[command(author, version, about = "CLI for Govee thermometer/hygrometer sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan advertisements and report each nearby sensor once
    Scan {
        /// Scan timeout in seconds
        #[arg(short, long, default_value = "20")]
        timeout: u64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print every advertised measurement until interrupted
    Measure {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Read offsets and the current measurement from a device
    Status {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Display device information and configuration
    Info {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configure alarms and calibration offsets
    Set {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        settings: SettingArgs,
    },

    /// Download recorded measurements
    History {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Start of the range as time before now, e.g. 480:00 (max. 20 days)
        #[arg(long, value_name = "hhh:mm", value_parser = parse_time_before_now)]
        start: Option<u32>,

        /// End of the range as time before now, e.g. 0:30
        #[arg(long, value_name = "hhh:mm", value_parser = parse_time_before_now)]
        end: Option<u32>,
    },
}

/// Device settings; any combination may be given.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingArgs {
    /// Humidity alarm, e.g. "on 30.0 75.0" (0.0 to 100.0)
    #[arg(long, value_name = "on|off LOWER UPPER")]
    pub humidity_alarm: Option<String>,

    /// Temperature alarm, e.g. "on 15.0 26.0" (-20.0 to 60.0)
    #[arg(long, value_name = "on|off LOWER UPPER", allow_hyphen_values = true)]
    pub temperature_alarm: Option<String>,

    /// Humidity calibration offset (-20.0 to 20.0)
    #[arg(long, value_name = "OFFSET", allow_hyphen_values = true)]
    pub humidity_offset: Option<f64>,

    /// Temperature calibration offset (-3.0 to 3.0)
    #[arg(long, value_name = "OFFSET", allow_hyphen_values = true)]
    pub temperature_offset: Option<f64>,
}

impl SettingArgs {
    pub fn is_empty(&self) -> bool {
        self.humidity_alarm.is_none()
            && self.temperature_alarm.is_none()
            && self.humidity_offset.is_none()
            && self.temperature_offset.is_none()
    }
}

/// Parse a `hhh:mm` expression (or plain minutes) into minutes before now.
pub fn parse_time_before_now(s: &str) -> Result<u32, String> {
    let number = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a valid time expression, expected hhh:mm", s))
    };

    match s.split_once(':') {
        Some((hours, minutes)) => {
            let hours = number(hours)?;
            let minutes = number(minutes)?;
            if minutes >= 60 {
                return Err(format!("Invalid minutes in '{}', expected 0 to 59", s));
            }
            hours
                .checked_mul(60)
                .and_then(|m| m.checked_add(minutes))
                .ok_or_else(|| format!("'{}' is out of range", s))
        }
        None => number(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    // --- time expressions ---

    #[test]
    fn test_parse_hours_and_minutes() {
        assert_eq!(parse_time_before_now("480:00"), Ok(28_800));
        assert_eq!(parse_time_before_now("1:30"), Ok(90));
        assert_eq!(parse_time_before_now("0:00"), Ok(0));
    }

    #[test]
    fn test_parse_plain_minutes() {
        assert_eq!(parse_time_before_now("60"), Ok(60));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_time_before_now("abc").is_err());
        assert!(parse_time_before_now("1:xx").is_err());
        assert!(parse_time_before_now("1:75").is_err());
        assert!(parse_time_before_now("-1:00").is_err());
    }

    // --- argument parsing ---

    #[test]
    fn test_history_arguments() {
        let cli = Cli::try_parse_from([
            "govee",
            "history",
            "-d",
            "A4:C1:38:00:1A:2B",
            "--start",
            "2:00",
            "--end",
            "0:30",
        ])
        .unwrap();
        match cli.command {
            Commands::History {
                device, start, end, ..
            } => {
                assert_eq!(device.device.as_deref(), Some("A4:C1:38:00:1A:2B"));
                assert_eq!(start, Some(120));
                assert_eq!(end, Some(30));
            }
            _ => panic!("expected history"),
        }
    }

    #[test]
    fn test_set_accepts_negative_values() {
        let cli = Cli::try_parse_from([
            "govee",
            "set",
            "-d",
            "kitchen",
            "--temperature-offset",
            "-1.5",
            "--temperature-alarm",
            "on -5.0 30.0",
        ])
        .unwrap();
        match cli.command {
            Commands::Set { settings, .. } => {
                assert_eq!(settings.temperature_offset, Some(-1.5));
                assert_eq!(settings.temperature_alarm.as_deref(), Some("on -5.0 30.0"));
                assert!(!settings.is_empty());
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_scan_default_timeout() {
        let cli = Cli::try_parse_from(["govee", "scan"]).unwrap();
        match cli.command {
            Commands::Scan { timeout, output } => {
                assert_eq!(timeout, 20);
                assert_eq!(output.format, None);
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_output_format_resolution() {
        let explicit = OutputArgs {
            format: Some(OutputFormat::Text),
        };
        assert_eq!(explicit.resolve(Some(OutputFormat::Json)), OutputFormat::Text);

        let unset = OutputArgs { format: None };
        assert_eq!(unset.resolve(Some(OutputFormat::Json)), OutputFormat::Json);
        assert_eq!(unset.resolve(None), OutputFormat::Text);
    }
}
