//! Global constants for the routeros-backup application.
//!
//! This module centralizes the defaults and fixed protocol strings so the
//! settings loader and the components agree on them.

// Appliance defaults
/// Default backup file name prefix
pub const DEFAULT_BACKUP_PREFIX: &str = "routeros";

/// File extension RouterOS gives binary backups
pub const BACKUP_EXTENSION: &str = "backup";

/// Default SSH port on the appliance
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Local directory the artifact is downloaded into
pub const DEFAULT_LOCAL_DIR: &str = "/tmp";

// Storage defaults
/// Destination type accepted by `BACKUP_DEST_TYPE`
pub const DEFAULT_DEST_TYPE: &str = "s3";

/// Region used when none is configured
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Hostname suffix of the default cloud provider's endpoints
pub const AWS_ENDPOINT_MARKER: &str = "amazonaws.com";

// Logging
/// Fixed mask written in place of secret values
pub const REDACTION_MASK: &str = "***";

/// Default `.env` file consulted at startup
pub const DEFAULT_ENV_FILE: &str = ".env";
