//! Settings snapshot resolved once at process start.
//!
//! Every component receives the part of [`Settings`] it needs through its
//! constructor; nothing reads the environment after [`Settings::from_env`]
//! returns.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::config::process_env;
use crate::constants::{
    DEFAULT_BACKUP_PREFIX, DEFAULT_DEST_TYPE, DEFAULT_LOCAL_DIR, DEFAULT_SSH_PORT,
};
use crate::security::Secret;

/// Fatal configuration problems, detected before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),

    #[error("setting {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unsupported BACKUP_DEST_TYPE: {0}")]
    UnsupportedDestination(String),

    #[error("failed to load environment file {}: {reason}", path.display())]
    EnvFile { path: PathBuf, reason: String },
}

/// Where the backup is stored after download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationType {
    S3,
}

impl FromStr for DestinationType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3" => Ok(DestinationType::S3),
            other => Err(ConfigurationError::UnsupportedDestination(other.to_string())),
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationType::S3 => write!(f, "s3"),
        }
    }
}

/// SSH access to the appliance and backup naming.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub ssh_key_path: PathBuf,
    pub backup_name_prefix: String,
    /// Encryption password for the backup file; empty means unencrypted
    pub backup_password: Secret,
}

/// S3-compatible destination.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub access_key: Secret,
    pub secret_key: Secret,
    pub bucket: String,
    /// Prepended verbatim to the artifact name to form the object key
    pub prefix: String,
    pub region: Option<String>,
}

/// Immutable configuration snapshot for one backup cycle.
#[derive(Debug, Clone)]
pub struct Settings {
    pub router: RouterSettings,
    pub destination: DestinationType,
    pub s3: S3Settings,
    /// Number of newest stored backups to keep; `None` or 0 disables pruning
    pub retention_points: Option<u32>,
    /// Directory the artifact is downloaded into
    pub local_dir: PathBuf,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(process_env)
    }

    /// Resolve settings from an arbitrary key lookup.
    ///
    /// The lookup must return `None` for unset keys. The destination type is
    /// checked first so that an unsupported destination is reported even when
    /// the S3 fields are absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigurationError::Missing(name));

        let destination: DestinationType = lookup("BACKUP_DEST_TYPE")
            .unwrap_or_else(|| DEFAULT_DEST_TYPE.to_string())
            .parse()?;

        let router = RouterSettings {
            host: required("ROUTER_HOST")?,
            port: parse_optional(&lookup, "ROUTER_PORT")?.unwrap_or(DEFAULT_SSH_PORT),
            user: required("ROUTER_USER")?,
            ssh_key_path: PathBuf::from(required("SSH_KEY_PATH")?),
            backup_name_prefix: lookup("BACKUPNAME_PREFIX")
                .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string()),
            backup_password: lookup("BACKUP_PASSWORD").map(Secret::from).unwrap_or_default(),
        };

        let s3 = S3Settings {
            endpoint: required("S3_ENDPOINT")?,
            access_key: Secret::from(required("S3_ACCESS_KEY")?),
            secret_key: Secret::from(required("S3_SECRET_KEY")?),
            bucket: required("S3_BUCKET")?,
            prefix: lookup("S3_PREFIX").unwrap_or_default(),
            region: lookup("S3_REGION"),
        };

        let retention_points = parse_optional(&lookup, "RETENTION_POINTS")?;

        let local_dir = lookup("BACKUP_LOCAL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DIR));

        Ok(Settings {
            router,
            destination,
            s3,
            retention_points,
            local_dir,
        })
    }
}

fn parse_optional<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigurationError::Invalid {
                name,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
