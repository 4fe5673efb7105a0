//! Output formatting utilities for text and JSON output.

use anyhow::Result;
use govee_core::{CurrentReading, HistoryDownload, Measurement, PassiveReading, TransferOutcome};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const MINUTE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const SECOND_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const MEASUREMENT_COLUMNS: &str =
    "Temperature  Dew point  Temperature  Dew point  Rel. humidity  Abs. humidity  Steam pressure";

/// Pretty-printed JSON followed by a newline.
pub fn as_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}

/// Compact single-line JSON, for streamed records.
pub fn as_json_line<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)? + "\n")
}

fn format_timestamp(timestamp: OffsetDateTime, with_seconds: bool) -> String {
    let format = if with_seconds {
        SECOND_FORMAT
    } else {
        MINUTE_FORMAT
    };
    timestamp
        .format(format)
        .unwrap_or_else(|_| timestamp.to_string())
}

fn dew_point(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1}{unit}"),
        None => "n/a".to_string(),
    }
}

/// The derived columns shared by every tabular listing.
fn measurement_columns(m: &Measurement) -> String {
    format!(
        "{:>9}  {:>9}  {:>11}  {:>9}  {:>13}  {:>13}  {:>14}",
        format!("{:.1}°C", m.temperature()),
        dew_point(m.dew_point(), "°C"),
        format!("{:.1}°F", m.temperature_f()),
        dew_point(m.dew_point_f(), "°F"),
        format!("{:.1}%", m.humidity()),
        format!("{:.1} g/m³", m.absolute_humidity()),
        format!("{:.1} mbar", m.steam_pressure()),
    )
}

// --- passive listings ---

/// Header for scan (`timestamped == false`) and measure listings.
#[must_use]
pub fn format_passive_header(timestamped: bool) -> String {
    let prefix = if timestamped {
        format!("{:<19}  ", "Timestamp")
    } else {
        String::new()
    };
    format!(
        "{prefix}{:<21} {:<13} {MEASUREMENT_COLUMNS}  Battery\n",
        "MAC-Address/Alias", "Device name"
    )
}

/// One advertisement as a table row.
#[must_use]
pub fn format_passive_line(reading: &PassiveReading, label: &str, timestamped: bool) -> String {
    let measurement = &reading.data.measurement;
    let prefix = if timestamped {
        format!("{}  ", format_timestamp(measurement.timestamp(), true))
    } else {
        String::new()
    };
    format!(
        "{prefix}{:<21} {:<13} {}  {:>6}%\n",
        label,
        reading.device_name.as_deref().unwrap_or("Unknown"),
        measurement_columns(measurement),
        reading.data.battery,
    )
}

// --- status ---

#[must_use]
pub fn format_current_text(reading: &CurrentReading) -> String {
    let mut out = format!("{}\n", reading.measurement);
    if let Some(battery) = reading.battery {
        out.push_str(&format!("Battery level:        {battery} %\n"));
    }
    out
}

// --- history ---

#[must_use]
pub fn format_history_text(download: &HistoryDownload) -> String {
    let mut out = format!("{:<16}  {MEASUREMENT_COLUMNS}\n", "Timestamp");
    for sample in &download.samples {
        out.push_str(&format!(
            "{:<16}  {}\n",
            format_timestamp(sample.timestamp(), false),
            measurement_columns(sample)
        ));
    }
    out
}

/// A one-line note for a transfer that did not complete cleanly.
#[must_use]
pub fn describe_outcome(download: &HistoryDownload) -> Option<String> {
    match download.outcome {
        TransferOutcome::Complete => None,
        TransferOutcome::PartialMismatch { reported, counted } => Some(format!(
            "Device reported {reported} messages but {counted} arrived; {} samples may be incomplete",
            download.samples.len()
        )),
        TransferOutcome::TimedOut { status } => Some(format!(
            "Transfer did not finish (last state: {status:?}); {} of {} messages received",
            download.counted_messages, download.expected_messages
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govee_core::{AdvertisementData, Calibration, DeviceModel};
    use time::macros::datetime;

    fn measurement() -> Measurement {
        Measurement::new(
            datetime!(2024-03-01 12:34:56 UTC),
            21.5,
            45.6,
            Calibration::default(),
        )
    }

    fn download(outcome: TransferOutcome) -> HistoryDownload {
        HistoryDownload {
            samples: vec![measurement(), measurement()],
            outcome,
            expected_messages: 11,
            counted_messages: 10,
        }
    }

    // --- passive ---

    #[test]
    fn test_passive_line_columns() {
        let reading = PassiveReading {
            device_id: "A4:C1:38:00:1A:2B".to_string(),
            device_name: Some("GVH5075_1A2B".to_string()),
            rssi: Some(-60),
            data: AdvertisementData {
                model: DeviceModel::H5075,
                measurement: measurement(),
                battery: 87,
            },
        };

        let line = format_passive_line(&reading, "kitchen", false);
        assert!(line.starts_with("kitchen "));
        assert!(line.contains("GVH5075_1A2B"));
        assert!(line.contains("21.5°C"));
        assert!(line.contains("70.7°F"));
        assert!(line.contains("45.6%"));
        assert!(line.trim_end().ends_with("87%"));

        let timed = format_passive_line(&reading, "kitchen", true);
        assert!(timed.starts_with("2024-03-01 12:34:56  kitchen"));
    }

    #[test]
    fn test_header_matches_timestamp_width() {
        let plain = format_passive_header(false);
        let timed = format_passive_header(true);
        assert!(plain.starts_with("MAC-Address/Alias"));
        assert_eq!(timed.len() - plain.len(), 21);
    }

    #[test]
    fn test_dew_point_not_available() {
        assert_eq!(dew_point(None, "°C"), "n/a");
        assert_eq!(dew_point(Some(10.04), "°C"), "10.0°C");
    }

    // --- history ---

    #[test]
    fn test_history_rows() {
        let text = format_history_text(&download(TransferOutcome::Complete));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Timestamp"));
        assert!(lines[1].starts_with("2024-03-01 12:34 "));
    }

    #[test]
    fn test_describe_outcome() {
        assert_eq!(describe_outcome(&download(TransferOutcome::Complete)), None);

        let mismatch = describe_outcome(&download(TransferOutcome::PartialMismatch {
            reported: 11,
            counted: 10,
        }))
        .unwrap();
        assert!(mismatch.contains("reported 11"));
        assert!(mismatch.contains("10 arrived"));
    }

    // --- json ---

    #[test]
    fn test_json_outputs_end_with_newline() {
        let value = serde_json::json!({ "a": 1 });
        assert_eq!(as_json_line(&value).unwrap(), "{\"a\":1}\n");
        assert!(as_json(&value).unwrap().ends_with("}\n"));
    }
}
