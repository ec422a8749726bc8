//! # routeros-backup
//!
//! Unattended configuration backups of MikroTik RouterOS appliances to
//! S3-compatible object storage.
//!
//! ## Overview
//!
//! One invocation runs one backup cycle and exits:
//!
//! 1. Open an SSH session to the router (key authentication)
//! 2. Run `/system backup save` for a date-stamped backup name
//! 3. Download the file over SFTP
//! 4. Remove the file from the router (failures only warn)
//! 5. Close the SSH session
//! 6. Verify the object store, upload the backup
//! 7. Prune stored backups beyond the configured retention count
//!
//! Scheduling, retries and timeouts are left to whatever runs the binary
//! (cron, a systemd timer, a Kubernetes CronJob).
//!
//! ## Usage
//!
//! ```no_run
//! use routeros_backup::config::Settings;
//! use routeros_backup::orchestrator::BackupCycle;
//! use routeros_backup::remote::ssh::SshConnector;
//! use routeros_backup::storage::s3::S3Connector;
//!
//! # fn main() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! let remote = SshConnector::new(&settings.router);
//! let storage = S3Connector::new(&settings.s3);
//!
//! let report = BackupCycle::new(&settings, &remote, &storage).run()?;
//! println!("Stored {} as {}", report.artifact, report.storage_key);
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Settings come from environment variables, optionally seeded from a
//! `.env` file. See [`config::Settings`] for the full list.
//!
//! ## Secrets
//!
//! The backup password and the S3 keys are held as [`security::Secret`],
//! which formats as `***`. Log lines therefore never contain them, without
//! any filtering of the log output.

pub mod cli;
pub mod config;
pub mod constants;
pub mod naming;
pub mod orchestrator;
pub mod remote;
pub mod retention;
pub mod security;
pub mod storage;
