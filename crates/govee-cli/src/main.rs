//! `govee`: command-line interface for Govee H5074, H5075 and H5179
//! thermometer/hygrometer sensors.

mod cli;
mod commands;
mod config;
mod format;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{
    HistoryArgs, cmd_history, cmd_info, cmd_measure, cmd_scan, cmd_set, cmd_status,
};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let output = cli.output.as_ref();

    match cli.command {
        Commands::Scan {
            timeout,
            output: format,
        } => {
            let format = format.resolve(config.format);
            cmd_scan(timeout, format, output, cli.quiet, &config).await
        }
        Commands::Measure { output: format } => {
            let format = format.resolve(config.format);
            cmd_measure(format, output, cli.quiet, &config).await
        }
        Commands::Status {
            device,
            output: format,
        } => {
            let format = format.resolve(config.format);
            cmd_status(device, format, output, &config).await
        }
        Commands::Info {
            device,
            output: format,
        } => {
            let format = format.resolve(config.format);
            cmd_info(device, format, output, &config).await
        }
        Commands::Set { device, settings } => cmd_set(device, settings, cli.quiet, &config).await,
        Commands::History {
            device,
            output: format,
            start,
            end,
        } => {
            let args = HistoryArgs {
                device,
                format: format.resolve(config.format),
                start,
                end,
            };
            cmd_history(args, output, cli.quiet, &config).await
        }
    }
}
