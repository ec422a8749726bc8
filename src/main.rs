use std::fs;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, LevelFilter};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use routeros_backup::cli::Args;
use routeros_backup::config::{load_env_file, DestinationType, Settings};
use routeros_backup::orchestrator::{BackupCycle, CycleReport};
use routeros_backup::remote::ssh::SshConnector;
use routeros_backup::storage::s3::S3Connector;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        process::exit(1);
    }

    Ok(())
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    TermLogger::init(log_level, config, TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Resolve settings, run one backup cycle and write the report
fn run(args: &Args) -> Result<()> {
    load_env_file(args.env_file.as_deref())?;
    let settings = Settings::from_env().context("Invalid configuration")?;
    debug!("Resolved settings: {:?}", settings);

    if args.check_config {
        info!("Configuration is valid");
        return Ok(());
    }

    let report = match settings.destination {
        DestinationType::S3 => {
            let remote = SshConnector::new(&settings.router);
            let storage = S3Connector::new(&settings.s3);
            BackupCycle::new(&settings, &remote, &storage)
                .run()
                .map_err(|e| {
                    if e.artifact_stored() {
                        error!("Backup was stored, but the cycle failed afterwards");
                    }
                    let stage = e.stage();
                    anyhow::Error::new(e).context(format!("Backup cycle failed at stage {}", stage))
                })?
        }
    };

    info!(
        "Backup {} stored as {} ({} old backup(s) pruned)",
        report.artifact,
        report.storage_key,
        report.pruned.len()
    );

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }

    Ok(())
}

/// Write the cycle report as pretty-printed JSON
fn write_report(report: &CycleReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize cycle report")?;
    fs::write(path, json).context(format!("Failed to write report to {}", path.display()))?;
    info!("Cycle report written to {}", path.display());
    Ok(())
}
