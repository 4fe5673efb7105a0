//! Set command implementation.

use anyhow::{Context, Result, bail};
use govee_core::{
    Acknowledgement, AlarmConfig, GattTransport, Hygrometer, Quantity, validate_alarm,
    validate_offset,
};
use tracing::warn;

use crate::cli::{DeviceArgs, SettingArgs};
use crate::config::Config;
use crate::util::{connect, disconnect, require_device};

/// Settings parsed and range-checked before any connection is made.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub humidity_alarm: Option<AlarmConfig>,
    pub temperature_alarm: Option<AlarmConfig>,
    pub humidity_offset: Option<f64>,
    pub temperature_offset: Option<f64>,
}

impl Changes {
    /// Parse and validate every requested setting; the first invalid one fails.
    pub fn from_args(args: &SettingArgs) -> Result<Self> {
        if args.is_empty() {
            bail!(
                "Nothing to set. Use --humidity-alarm, --temperature-alarm, \
                 --humidity-offset or --temperature-offset."
            );
        }

        let alarm = |quantity: Quantity, spec: &Option<String>| -> Result<Option<AlarmConfig>> {
            let Some(spec) = spec else {
                return Ok(None);
            };
            let alarm = AlarmConfig::parse(quantity, spec)
                .with_context(|| format!("Invalid {} alarm '{}'", quantity, spec))?;
            validate_alarm(&alarm)?;
            Ok(Some(alarm))
        };
        let offset = |quantity: Quantity, value: Option<f64>| -> Result<Option<f64>> {
            if let Some(value) = value {
                validate_offset(quantity, value)?;
            }
            Ok(value)
        };

        Ok(Self {
            humidity_alarm: alarm(Quantity::Humidity, &args.humidity_alarm)?,
            temperature_alarm: alarm(Quantity::Temperature, &args.temperature_alarm)?,
            humidity_offset: offset(Quantity::Humidity, args.humidity_offset)?,
            temperature_offset: offset(Quantity::Temperature, args.temperature_offset)?,
        })
    }
}

/// What was written and whether the device echoed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub description: String,
    pub ack: Acknowledgement,
}

pub async fn cmd_set(
    device: DeviceArgs,
    settings: SettingArgs,
    quiet: bool,
    config: &Config,
) -> Result<()> {
    let changes = Changes::from_args(&settings)?;
    let identifier = require_device(device.device, config)?;

    let mut sensor = connect(&identifier, config, device.timeout).await?;
    let result = apply(&mut sensor, &changes).await;
    disconnect(&sensor).await;
    let applied = result?;

    if !quiet {
        for change in &applied {
            let status = match change.ack {
                Acknowledgement::Confirmed => "confirmed",
                Acknowledgement::TimedOut => "not acknowledged",
            };
            println!("{}: {}", change.description, status);
        }
    }

    let unconfirmed = applied.iter().filter(|c| !c.ack.is_confirmed()).count();
    if unconfirmed > 0 {
        bail!(
            "{} of {} setting(s) were not acknowledged by {}",
            unconfirmed,
            applied.len(),
            identifier
        );
    }
    Ok(())
}

/// Write each change in turn: alarms first, then offsets.
pub(crate) async fn apply<T: GattTransport>(
    sensor: &mut Hygrometer<T>,
    changes: &Changes,
) -> Result<Vec<Applied>> {
    let mut applied = Vec::new();

    for alarm in [changes.humidity_alarm, changes.temperature_alarm]
        .into_iter()
        .flatten()
    {
        let ack = sensor
            .set_alarm(alarm)
            .await
            .with_context(|| format!("Failed to set {} alarm", alarm.quantity))?;
        if !ack.is_confirmed() {
            warn!(quantity = %alarm.quantity, "Alarm not acknowledged");
        }
        applied.push(Applied {
            description: format!("{} alarm {}", capitalize(alarm.quantity), alarm),
            ack,
        });
    }

    let offsets = [
        (Quantity::Humidity, changes.humidity_offset),
        (Quantity::Temperature, changes.temperature_offset),
    ];
    for (quantity, offset) in offsets {
        let Some(offset) = offset else {
            continue;
        };
        let ack = sensor
            .set_offset(quantity, offset)
            .await
            .with_context(|| format!("Failed to set {} offset", quantity))?;
        if !ack.is_confirmed() {
            warn!(quantity = %quantity, "Offset not acknowledged");
        }
        applied.push(Applied {
            description: format!(
                "{} offset {:.1} {}",
                capitalize(quantity),
                offset,
                quantity.unit()
            ),
            ack,
        });
    }

    Ok(applied)
}

fn capitalize(quantity: Quantity) -> String {
    let name = quantity.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}
